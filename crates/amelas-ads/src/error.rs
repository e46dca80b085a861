// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! ADS client error types.
//!
//! # Error Categories
//!
//! ```text
//! AdsError
//! ├── Address        - Malformed endpoint address string
//! ├── Transport      - Session open/close failures
//! ├── Resolution     - Symbol name could not be resolved to a handle
//! ├── Read / Write   - Typed I/O rejected by the device
//! ├── Subscribe      - Notification registration rejected
//! ├── Unsubscribe    - Notification cancellation rejected
//! ├── Release        - Symbol handle release rejected
//! ├── NotConnected   - Data operation attempted without a session
//! ├── Conversion     - Payload does not match the requested value type
//! └── Configuration  - Invalid or unreadable client configuration
//! ```
//!
//! Every device-side failure carries the [`AdsReturnCode`] the device reported.
//!
//! # Examples
//!
//! ```
//! use amelas_ads::error::{AdsError, AdsReturnCode};
//!
//! let error = AdsError::read("MAIN.speed", AdsReturnCode::SYMBOL_NOT_FOUND);
//! assert_eq!(error.device_code(), Some(AdsReturnCode::SYMBOL_NOT_FOUND));
//! assert_eq!(error.category(), "read");
//! ```

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;
use tracing::Level;

use crate::types::{AmsAddr, NotificationHandle};

/// Result alias for ADS client operations.
pub type AdsResult<T> = Result<T, AdsError>;

// =============================================================================
// AdsReturnCode
// =============================================================================

/// Return code reported by an ADS device. Zero means success.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AdsReturnCode(pub u32);

impl AdsReturnCode {
    /// No error.
    pub const OK: Self = Self(0x000);
    /// Internal error.
    pub const INTERNAL: Self = Self(0x001);
    /// Target port not found.
    pub const TARGET_PORT_NOT_FOUND: Self = Self(0x006);
    /// Target machine not found.
    pub const TARGET_MACHINE_NOT_FOUND: Self = Self(0x007);
    /// General device error.
    pub const DEVICE_ERROR: Self = Self(0x700);
    /// Service is not supported by the server.
    pub const SERVICE_NOT_SUPPORTED: Self = Self(0x701);
    /// Invalid index group.
    pub const INVALID_INDEX_GROUP: Self = Self(0x702);
    /// Invalid index offset.
    pub const INVALID_INDEX_OFFSET: Self = Self(0x703);
    /// Reading or writing not permitted.
    pub const ACCESS_DENIED: Self = Self(0x704);
    /// Parameter size not correct.
    pub const INVALID_SIZE: Self = Self(0x705);
    /// Invalid data values.
    pub const INVALID_DATA: Self = Self(0x706);
    /// Device is not ready to operate.
    pub const NOT_READY: Self = Self(0x707);
    /// Device is busy.
    pub const BUSY: Self = Self(0x708);
    /// Symbol not found.
    pub const SYMBOL_NOT_FOUND: Self = Self(0x710);
    /// Symbol version invalid.
    pub const SYMBOL_VERSION_INVALID: Self = Self(0x711);
    /// Device is in an invalid state.
    pub const INVALID_STATE: Self = Self(0x712);
    /// Transmission mode not supported.
    pub const TRANSMODE_NOT_SUPPORTED: Self = Self(0x713);
    /// Notification handle is invalid.
    pub const INVALID_NOTIFICATION_HANDLE: Self = Self(0x714);
    /// Notification client not registered.
    pub const NOTIFICATION_CLIENT_NOT_REGISTERED: Self = Self(0x715);
    /// No further notification handles available.
    pub const NO_MORE_NOTIFICATION_HANDLES: Self = Self(0x716);
    /// Notification size too large.
    pub const NOTIFICATION_SIZE_TOO_LARGE: Self = Self(0x717);
    /// Device has not been initialized.
    pub const NOT_INITIALIZED: Self = Self(0x718);
    /// Device has a timeout.
    pub const DEVICE_TIMEOUT: Self = Self(0x719);
    /// Timeout elapsed waiting for the response.
    pub const CLIENT_TIMEOUT: Self = Self(0x745);
    /// Local ADS port not opened.
    pub const PORT_NOT_OPEN: Self = Self(0x748);

    /// Returns `true` for the success code.
    #[inline]
    pub const fn is_ok(&self) -> bool {
        self.0 == 0
    }

    /// Returns the raw code.
    #[inline]
    pub const fn value(&self) -> u32 {
        self.0
    }

    /// Returns the documented meaning of this code, if known.
    pub fn description(&self) -> Option<&'static str> {
        let text = match self.0 {
            0x000 => "no error",
            0x001 => "internal error",
            0x006 => "target port not found",
            0x007 => "target machine not found",
            0x700 => "general device error",
            0x701 => "service is not supported by the server",
            0x702 => "invalid index group",
            0x703 => "invalid index offset",
            0x704 => "reading or writing not permitted",
            0x705 => "parameter size not correct",
            0x706 => "invalid data values",
            0x707 => "device is not ready to operate",
            0x708 => "device is busy",
            0x710 => "symbol not found",
            0x711 => "symbol version invalid",
            0x712 => "device is in an invalid state",
            0x713 => "transmission mode not supported",
            0x714 => "notification handle is invalid",
            0x715 => "notification client not registered",
            0x716 => "no further notification handle available",
            0x717 => "notification size too large",
            0x718 => "device not initialized",
            0x719 => "device has a timeout",
            0x745 => "timeout elapsed",
            0x748 => "ads port not opened",
            _ => return None,
        };
        Some(text)
    }

    /// Returns `true` if the code indicates the symbol table no longer matches.
    pub fn is_stale_symbol(&self) -> bool {
        matches!(*self, Self::SYMBOL_NOT_FOUND | Self::SYMBOL_VERSION_INVALID)
    }
}

impl fmt::Display for AdsReturnCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.description() {
            Some(text) => write!(f, "ADS error 0x{:X} ({})", self.0, text),
            None => write!(f, "ADS error 0x{:X}", self.0),
        }
    }
}

impl From<u32> for AdsReturnCode {
    fn from(code: u32) -> Self {
        Self(code)
    }
}

// =============================================================================
// AdsError - Main Error Type
// =============================================================================

/// The main error type for ADS client operations.
#[derive(Debug, Error)]
pub enum AdsError {
    /// Malformed endpoint address.
    #[error("{0}")]
    Address(#[from] AddressParseError),

    /// Session open/close failure.
    #[error("{0}")]
    Transport(#[from] TransportError),

    /// Symbol resolution rejected by the device.
    #[error("Failed to resolve symbol '{symbol}': {code}")]
    Resolution {
        /// Symbol name.
        symbol: String,
        /// Device return code.
        code: AdsReturnCode,
    },

    /// Read rejected by the device.
    #[error("Failed to read symbol '{symbol}': {code}")]
    Read {
        /// Symbol name.
        symbol: String,
        /// Device return code.
        code: AdsReturnCode,
    },

    /// Write rejected by the device.
    #[error("Failed to write symbol '{symbol}': {code}")]
    Write {
        /// Symbol name.
        symbol: String,
        /// Device return code.
        code: AdsReturnCode,
    },

    /// Notification registration rejected by the device.
    #[error("Failed to subscribe to symbol '{symbol}': {code}")]
    Subscribe {
        /// Symbol name.
        symbol: String,
        /// Device return code.
        code: AdsReturnCode,
    },

    /// Notification cancellation rejected by the device.
    #[error("Failed to cancel notification {handle}: {code}")]
    Unsubscribe {
        /// Notification handle.
        handle: NotificationHandle,
        /// Device return code.
        code: AdsReturnCode,
    },

    /// Handle release rejected by the device.
    #[error("Failed to release handle of symbol '{symbol}': {code}")]
    Release {
        /// Symbol name.
        symbol: String,
        /// Device return code.
        code: AdsReturnCode,
    },

    /// Operation attempted without an open session.
    #[error("Not connected to an ADS device")]
    NotConnected,

    /// Payload could not be converted.
    #[error("{0}")]
    Conversion(#[from] ConversionError),

    /// Invalid configuration.
    #[error("{0}")]
    Configuration(#[from] ConfigurationError),
}

impl AdsError {
    // =========================================================================
    // Factory Methods
    // =========================================================================

    /// Creates a resolution error.
    pub fn resolution(symbol: impl Into<String>, code: AdsReturnCode) -> Self {
        Self::Resolution {
            symbol: symbol.into(),
            code,
        }
    }

    /// Creates a read error.
    pub fn read(symbol: impl Into<String>, code: AdsReturnCode) -> Self {
        Self::Read {
            symbol: symbol.into(),
            code,
        }
    }

    /// Creates a write error.
    pub fn write(symbol: impl Into<String>, code: AdsReturnCode) -> Self {
        Self::Write {
            symbol: symbol.into(),
            code,
        }
    }

    /// Creates a subscribe error.
    pub fn subscribe(symbol: impl Into<String>, code: AdsReturnCode) -> Self {
        Self::Subscribe {
            symbol: symbol.into(),
            code,
        }
    }

    /// Creates an unsubscribe error.
    pub fn unsubscribe(handle: NotificationHandle, code: AdsReturnCode) -> Self {
        Self::Unsubscribe { handle, code }
    }

    /// Creates a handle release error.
    pub fn release(symbol: impl Into<String>, code: AdsReturnCode) -> Self {
        Self::Release {
            symbol: symbol.into(),
            code,
        }
    }

    /// Creates a not connected error.
    pub fn not_connected() -> Self {
        Self::NotConnected
    }

    // =========================================================================
    // Error Properties
    // =========================================================================

    /// Returns `true` if this is a [`AdsError::NotConnected`] error.
    pub fn is_not_connected(&self) -> bool {
        matches!(self, Self::NotConnected)
    }

    /// Returns the device return code carried by this error, if any.
    pub fn device_code(&self) -> Option<AdsReturnCode> {
        match self {
            Self::Transport(e) => e.device_code(),
            Self::Resolution { code, .. }
            | Self::Read { code, .. }
            | Self::Write { code, .. }
            | Self::Subscribe { code, .. }
            | Self::Unsubscribe { code, .. }
            | Self::Release { code, .. } => Some(*code),
            Self::Address(_)
            | Self::NotConnected
            | Self::Conversion(_)
            | Self::Configuration(_) => None,
        }
    }

    /// Returns the symbol this error refers to, if any.
    pub fn symbol(&self) -> Option<&str> {
        match self {
            Self::Resolution { symbol, .. }
            | Self::Read { symbol, .. }
            | Self::Write { symbol, .. }
            | Self::Subscribe { symbol, .. }
            | Self::Release { symbol, .. } => Some(symbol),
            _ => None,
        }
    }

    /// Returns the severity level of this error.
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Address(_) | Self::Configuration(_) => ErrorSeverity::Critical,
            Self::Transport(_) => ErrorSeverity::Error,
            Self::Unsubscribe { .. } | Self::Release { .. } => ErrorSeverity::Warning,
            Self::NotConnected => ErrorSeverity::Warning,
            _ => ErrorSeverity::Error,
        }
    }

    /// Returns the error category for logging.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Address(_) => "address",
            Self::Transport(_) => "transport",
            Self::Resolution { .. } => "resolution",
            Self::Read { .. } => "read",
            Self::Write { .. } => "write",
            Self::Subscribe { .. } => "subscribe",
            Self::Unsubscribe { .. } => "unsubscribe",
            Self::Release { .. } => "release",
            Self::NotConnected => "not_connected",
            Self::Conversion(_) => "conversion",
            Self::Configuration(_) => "configuration",
        }
    }

    /// Returns the tracing level for this error.
    pub fn tracing_level(&self) -> Level {
        self.severity().to_tracing_level()
    }

    /// Logs this error with appropriate level and context.
    pub fn log(&self, context: &str) {
        let code = self.device_code().map(|c| c.value());
        match self.tracing_level() {
            Level::ERROR => tracing::error!(
                category = self.category(),
                device_code = ?code,
                context = context,
                "{self}"
            ),
            Level::WARN => tracing::warn!(
                category = self.category(),
                device_code = ?code,
                context = context,
                "{self}"
            ),
            _ => tracing::debug!(
                category = self.category(),
                device_code = ?code,
                context = context,
                "{self}"
            ),
        }
    }
}

// =============================================================================
// AddressParseError
// =============================================================================

/// Malformed `o1.o2.o3.o4.o5.o6:port` endpoint string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressParseError {
    /// The Net ID does not have six octets.
    #[error("Invalid AMS address '{input}': expected 6 octets, found {found}")]
    OctetCount {
        /// Offending input.
        input: String,
        /// Number of octets found.
        found: usize,
    },

    /// An octet is empty, non-numeric, or above 255.
    #[error("Invalid AMS address '{input}': octet {index} ('{octet}') is not a number in 0..=255")]
    InvalidOctet {
        /// Offending input.
        input: String,
        /// Zero-based octet position.
        index: usize,
        /// Octet text.
        octet: String,
    },

    /// The `:port` part is missing or duplicated.
    #[error("Invalid AMS address '{input}': expected exactly one ':port' suffix")]
    MissingPort {
        /// Offending input.
        input: String,
    },

    /// The port is empty, non-numeric, or above 65535.
    #[error("Invalid AMS address '{input}': port '{port}' is not a number in 0..=65535")]
    InvalidPort {
        /// Offending input.
        input: String,
        /// Port text.
        port: String,
    },
}

impl AddressParseError {
    /// Creates an octet count error.
    pub fn octet_count(input: impl Into<String>, found: usize) -> Self {
        Self::OctetCount {
            input: input.into(),
            found,
        }
    }

    /// Creates an invalid octet error.
    pub fn invalid_octet(input: impl Into<String>, index: usize, octet: impl Into<String>) -> Self {
        Self::InvalidOctet {
            input: input.into(),
            index,
            octet: octet.into(),
        }
    }

    /// Creates a missing port error.
    pub fn missing_port(input: impl Into<String>) -> Self {
        Self::MissingPort {
            input: input.into(),
        }
    }

    /// Creates an invalid port error.
    pub fn invalid_port(input: impl Into<String>, port: impl Into<String>) -> Self {
        Self::InvalidPort {
            input: input.into(),
            port: port.into(),
        }
    }

    /// Replaces the reported input with the full address string.
    pub(crate) fn with_input(mut self, full: &str) -> Self {
        match &mut self {
            Self::OctetCount { input, .. }
            | Self::InvalidOctet { input, .. }
            | Self::MissingPort { input }
            | Self::InvalidPort { input, .. } => *input = full.to_string(),
        }
        self
    }
}

// =============================================================================
// TransportError
// =============================================================================

/// Session-level failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// Opening the session failed.
    #[error("Failed to open ADS session to {target}: {code}")]
    Open {
        /// Target endpoint.
        target: AmsAddr,
        /// Device return code.
        code: AdsReturnCode,
    },

    /// Closing the session failed. The client is disconnected regardless.
    #[error("Failed to close ADS session: {code}")]
    Close {
        /// Device return code.
        code: AdsReturnCode,
    },

    /// A session is already open.
    #[error("Already connected to {target}")]
    AlreadyConnected {
        /// Currently connected endpoint.
        target: AmsAddr,
    },
}

impl TransportError {
    /// Returns the device return code, if any.
    pub fn device_code(&self) -> Option<AdsReturnCode> {
        match self {
            Self::Open { code, .. } | Self::Close { code } => Some(*code),
            Self::AlreadyConnected { .. } => None,
        }
    }
}

// =============================================================================
// ConversionError
// =============================================================================

/// A device payload does not fit the requested value type.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConversionError {
    /// Payload length differs from the type size.
    #[error("Cannot decode {type_name}: expected {expected} bytes, got {actual}")]
    SizeMismatch {
        /// Requested type.
        type_name: &'static str,
        /// Type size in bytes.
        expected: usize,
        /// Payload size in bytes.
        actual: usize,
    },
}

impl ConversionError {
    /// Creates a size mismatch error.
    pub fn size_mismatch(type_name: &'static str, expected: usize, actual: usize) -> Self {
        Self::SizeMismatch {
            type_name,
            expected,
            actual,
        }
    }
}

// =============================================================================
// ConfigurationError
// =============================================================================

/// Invalid or unreadable client configuration.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    /// Configuration file does not exist.
    #[error("Configuration file not found: {}", .path.display())]
    FileNotFound {
        /// File path.
        path: PathBuf,
    },

    /// Configuration file could not be read.
    #[error("Failed to read configuration file {}: {source}", .path.display())]
    Io {
        /// File path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// File extension does not name a supported format.
    #[error("Unsupported configuration format: {extension}")]
    UnsupportedFormat {
        /// File extension.
        extension: String,
    },

    /// Content could not be deserialized.
    #[error("Failed to parse configuration: {message}")]
    Parse {
        /// Parser message.
        message: String,
    },

    /// A field holds an invalid value.
    #[error("Invalid value for '{field}': {message}")]
    InvalidValue {
        /// Field name.
        field: String,
        /// Reason.
        message: String,
    },

    /// A required value is missing.
    #[error("Missing required configuration value: {field}")]
    Missing {
        /// Field name.
        field: String,
    },
}

impl ConfigurationError {
    /// Creates a parse error.
    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse {
            message: message.into(),
        }
    }

    /// Creates an invalid value error.
    pub fn invalid_value(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Creates a missing value error.
    pub fn missing(field: impl Into<String>) -> Self {
        Self::Missing {
            field: field.into(),
        }
    }
}

// =============================================================================
// ErrorSeverity
// =============================================================================

/// Error severity levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ErrorSeverity {
    /// Informational - no action required.
    Info,
    /// Warning - action may be required.
    Warning,
    /// Error - action required, but recoverable.
    Error,
    /// Critical - immediate action required.
    Critical,
}

impl ErrorSeverity {
    /// Converts to tracing level.
    pub fn to_tracing_level(self) -> Level {
        match self {
            Self::Info => Level::INFO,
            Self::Warning => Level::WARN,
            Self::Error | Self::Critical => Level::ERROR,
        }
    }

    /// Returns the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
            Self::Critical => "critical",
        }
    }
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_return_code_display() {
        assert_eq!(
            AdsReturnCode::SYMBOL_NOT_FOUND.to_string(),
            "ADS error 0x710 (symbol not found)"
        );
        assert_eq!(AdsReturnCode(0x9999).to_string(), "ADS error 0x9999");
        assert!(AdsReturnCode::OK.is_ok());
        assert!(!AdsReturnCode::DEVICE_ERROR.is_ok());
    }

    #[test]
    fn test_stale_symbol_codes() {
        assert!(AdsReturnCode::SYMBOL_NOT_FOUND.is_stale_symbol());
        assert!(AdsReturnCode::SYMBOL_VERSION_INVALID.is_stale_symbol());
        assert!(!AdsReturnCode::BUSY.is_stale_symbol());
    }

    #[test]
    fn test_error_carries_symbol_and_code() {
        let error = AdsError::write("MAIN.target", AdsReturnCode::ACCESS_DENIED);
        assert_eq!(error.symbol(), Some("MAIN.target"));
        assert_eq!(error.device_code(), Some(AdsReturnCode::ACCESS_DENIED));
        assert_eq!(error.category(), "write");
        assert!(error.to_string().contains("MAIN.target"));
        assert!(error.to_string().contains("0x704"));
    }

    #[test]
    fn test_transport_error_code() {
        let target = "1.2.3.4.5.6:851".parse().unwrap();
        let error = AdsError::from(TransportError::Open {
            target,
            code: AdsReturnCode::TARGET_MACHINE_NOT_FOUND,
        });
        assert_eq!(error.device_code(), Some(AdsReturnCode::TARGET_MACHINE_NOT_FOUND));
        assert_eq!(error.category(), "transport");
        assert!(error.to_string().contains("1.2.3.4.5.6:851"));
    }

    #[test]
    fn test_not_connected_properties() {
        let error = AdsError::not_connected();
        assert!(error.is_not_connected());
        assert_eq!(error.device_code(), None);
        assert_eq!(error.severity(), ErrorSeverity::Warning);
    }

    #[test]
    fn test_severity_levels() {
        assert_eq!(ErrorSeverity::Warning.to_tracing_level(), Level::WARN);
        assert_eq!(ErrorSeverity::Critical.to_tracing_level(), Level::ERROR);
        assert!(ErrorSeverity::Critical > ErrorSeverity::Warning);
        assert_eq!(
            AdsError::from(AddressParseError::missing_port("x")).severity(),
            ErrorSeverity::Critical
        );
    }
}
