// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Core ADS types: endpoint addresses, handles, and notification attributes.
//!
//! # Address Format
//!
//! An ADS endpoint is an AMS Net ID (six octets) plus an AMS port:
//!
//! ```text
//! 5.62.215.36.1.1:851
//! └──────┬──────┘ └┬┘
//!    AmsNetId    AmsPort
//! ```
//!
//! # Examples
//!
//! ```
//! use amelas_ads::types::AmsAddr;
//!
//! let addr: AmsAddr = "1.2.3.4.5.6:801".parse().unwrap();
//! assert_eq!(addr.net_id().octets(), [1, 2, 3, 4, 5, 6]);
//! assert_eq!(addr.port(), 801);
//! assert_eq!(addr.to_string(), "1.2.3.4.5.6:801");
//! ```

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::AddressParseError;

/// Default minimum period between two change notifications.
pub const DEFAULT_NOTIFICATION_PERIOD: Duration = Duration::from_millis(1000);

/// AMS port of the first TwinCAT 2 PLC runtime.
pub const PORT_TC2_PLC: u16 = 801;

/// AMS port of the first TwinCAT 3 PLC runtime.
pub const PORT_TC3_PLC: u16 = 851;

// =============================================================================
// AmsNetId
// =============================================================================

/// Six-octet AMS network identifier of an ADS device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct AmsNetId([u8; 6]);

impl AmsNetId {
    /// Creates a Net ID from its octets.
    pub const fn new(octets: [u8; 6]) -> Self {
        Self(octets)
    }

    /// Returns the octets.
    pub const fn octets(&self) -> [u8; 6] {
        self.0
    }

    /// Returns `true` for the all-zero Net ID.
    pub fn is_unspecified(&self) -> bool {
        self.0 == [0; 6]
    }
}

impl From<[u8; 6]> for AmsNetId {
    fn from(octets: [u8; 6]) -> Self {
        Self(octets)
    }
}

impl fmt::Display for AmsNetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a}.{b}.{c}.{d}.{e}.{g}")
    }
}

impl FromStr for AmsNetId {
    type Err = AddressParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let parts: Vec<&str> = s.split('.').collect();
        if parts.len() != 6 {
            return Err(AddressParseError::octet_count(s, parts.len()));
        }

        let mut octets = [0u8; 6];
        for (i, part) in parts.iter().enumerate() {
            // `u8::from_str` accepts a leading '+', which is not part of the format.
            if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
                return Err(AddressParseError::invalid_octet(s, i, *part));
            }
            octets[i] = part
                .parse()
                .map_err(|_| AddressParseError::invalid_octet(s, i, *part))?;
        }

        Ok(Self(octets))
    }
}

// =============================================================================
// AmsAddr
// =============================================================================

/// Full ADS endpoint address: Net ID plus AMS port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AmsAddr {
    net_id: AmsNetId,
    port: u16,
}

impl AmsAddr {
    /// Creates an address from a Net ID and a port.
    pub const fn new(net_id: AmsNetId, port: u16) -> Self {
        Self { net_id, port }
    }

    /// Returns the Net ID.
    pub const fn net_id(&self) -> AmsNetId {
        self.net_id
    }

    /// Returns the AMS port.
    pub const fn port(&self) -> u16 {
        self.port
    }
}

impl fmt::Display for AmsAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.net_id, self.port)
    }
}

impl FromStr for AmsAddr {
    type Err = AddressParseError;

    /// Parses `o1.o2.o3.o4.o5.o6:port`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let mut pieces = s.split(':');
        let (net_id, port) = match (pieces.next(), pieces.next(), pieces.next()) {
            (Some(net_id), Some(port), None) => (net_id, port),
            _ => return Err(AddressParseError::missing_port(s)),
        };

        let net_id = net_id.parse::<AmsNetId>().map_err(|e| e.with_input(s))?;

        if port.is_empty() || !port.bytes().all(|b| b.is_ascii_digit()) {
            return Err(AddressParseError::invalid_port(s, port));
        }
        let port = port
            .parse::<u16>()
            .map_err(|_| AddressParseError::invalid_port(s, port))?;

        Ok(Self { net_id, port })
    }
}

impl Serialize for AmsAddr {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for AmsAddr {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

// =============================================================================
// Handles
// =============================================================================

/// Device handle of a resolved symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SymbolHandle(pub u32);

impl SymbolHandle {
    /// Returns the raw handle value.
    #[inline]
    pub const fn value(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for SymbolHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08X}", self.0)
    }
}

/// Device handle of an active change-notification registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NotificationHandle(pub u32);

impl NotificationHandle {
    /// Returns the raw handle value.
    #[inline]
    pub const fn value(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for NotificationHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =============================================================================
// Connection State
// =============================================================================

/// Connection state of a client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// No session is open.
    #[default]
    Disconnected,
    /// A session to the given endpoint is open.
    Connected(AmsAddr),
}

impl ConnectionState {
    /// Returns `true` if a session is open.
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected(_))
    }

    /// Returns the connected endpoint, if any.
    pub fn target(&self) -> Option<AmsAddr> {
        match self {
            Self::Connected(addr) => Some(*addr),
            Self::Disconnected => None,
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => write!(f, "disconnected"),
            Self::Connected(addr) => write!(f, "connected to {addr}"),
        }
    }
}

// =============================================================================
// Notification Attributes
// =============================================================================

/// When the device sends a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransmissionMode {
    /// Sent when the value changes, at most once per cycle time.
    #[default]
    ServerOnChange,
    /// Sent every cycle time, changed or not.
    ServerCycle,
}

impl fmt::Display for TransmissionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ServerOnChange => write!(f, "server_on_change"),
            Self::ServerCycle => write!(f, "server_cycle"),
        }
    }
}

impl FromStr for TransmissionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "server_on_change" | "on_change" => Ok(Self::ServerOnChange),
            "server_cycle" | "cycle" => Ok(Self::ServerCycle),
            other => Err(format!("unknown transmission mode '{other}'")),
        }
    }
}

/// Parameters of a device-side change notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NotificationAttributes {
    /// Number of value bytes carried by each notification.
    pub length: usize,
    /// Transmission mode.
    pub mode: TransmissionMode,
    /// Maximum time the device may hold back a notification.
    pub max_delay: Duration,
    /// Minimum period between two notifications; faster changes are coalesced
    /// by the device.
    pub cycle_time: Duration,
}

impl NotificationAttributes {
    /// Creates on-change attributes for a value of `length` bytes.
    pub fn on_change(length: usize, cycle_time: Duration) -> Self {
        Self {
            length,
            mode: TransmissionMode::ServerOnChange,
            max_delay: Duration::ZERO,
            cycle_time,
        }
    }

    /// Sets the transmission mode.
    pub fn with_mode(mut self, mode: TransmissionMode) -> Self {
        self.mode = mode;
        self
    }

    /// Sets the maximum delay.
    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }
}

// =============================================================================
// Tests
// =============================================================================
