// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # amelas-ads
//!
//! Symbol-oriented ADS client for the AMELAS telescope control system.
//!
//! The PLCs driving the mount expose their variables by name over ADS
//! (Beckhoff's Automation Device Specification). This crate provides:
//!
//! - **Endpoint addressing**: `o1.o2.o3.o4.o5.o6:port` parsing into [`AmsAddr`]
//! - **Handle cache**: each symbol is resolved on the device once per session
//! - **Typed I/O**: read and write any [`PlcValue`] by symbol name
//! - **Notifications**: typed change callbacks with a minimum period, cancelled
//!   individually or per symbol
//! - **Deterministic teardown**: disconnect releases every device registration
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                          AdsClient                              │
//! │            (symbol-level read/write/subscribe API)              │
//! └─────────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        AdsTransport                             │
//! │           (one device round trip per method, raw codes)         │
//! └─────────────────────────────────────────────────────────────────┘
//!            │                                     │
//!            ▼                                     ▼
//! ┌─────────────────────┐             ┌─────────────────────┐
//! │   router / AMS-TCP  │             │    test transport   │
//! │  (application side) │             │   (amelas-tests)    │
//! └─────────────────────┘             └─────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::time::Duration;
//! use amelas_ads::{AdsClient, AdsClientConfig};
//!
//! let config = AdsClientConfig::builder()
//!     .target("5.62.215.36.1.1:851")
//!     .default_cycle_time(Duration::from_millis(250))
//!     .build()?;
//!
//! let client = AdsClient::with_config(transport, config);
//! client.connect_configured().await?;
//!
//! let enabled: bool = client.read("MAIN.bEnable").await?;
//! client.write("MAIN.fTargetEl", 45.0f64).await?;
//!
//! let (_handle, mut positions) = client
//!     .subscribe_channel::<f64>("MAIN.fActualEl", Duration::from_millis(100))
//!     .await?;
//! while let Some(elevation) = positions.recv().await {
//!     println!("elevation {elevation}");
//! }
//! ```
//!
//! ### Error Handling
//!
//! ```rust,ignore
//! use amelas_ads::{AdsError, AdsReturnCode};
//!
//! match client.read::<i32>("MAIN.nCounter").await {
//!     Ok(value) => println!("counter {value}"),
//!     Err(e) if e.device_code() == Some(AdsReturnCode::SYMBOL_NOT_FOUND) => {
//!         println!("symbol missing: {}", e.symbol().unwrap_or("?"));
//!     }
//!     Err(e) => e.log("read counter"),
//! }
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![deny(unsafe_code)]

// =============================================================================
// Modules
// =============================================================================

pub mod client;
pub mod config;
pub mod error;
pub mod types;
pub mod value;

// =============================================================================
// Re-exports - Error Module
// =============================================================================

pub use error::{
    // Main error type
    AdsError,
    AdsResult,
    // Error categories
    AddressParseError,
    ConfigurationError,
    ConversionError,
    TransportError,
    // Error metadata
    AdsReturnCode,
    ErrorSeverity,
};

// =============================================================================
// Re-exports - Types Module
// =============================================================================

pub use types::{
    // Addressing
    AmsAddr,
    AmsNetId,
    PORT_TC2_PLC,
    PORT_TC3_PLC,
    // Handles
    NotificationHandle,
    SymbolHandle,
    // Session
    ConnectionState,
    // Notifications
    NotificationAttributes,
    TransmissionMode,
    DEFAULT_NOTIFICATION_PERIOD,
};

// =============================================================================
// Re-exports - Client Module
// =============================================================================

pub use client::{
    // Client
    AdsClient,
    ClientStats,
    HandleCache,
    // Subscriptions
    SubscriptionInfo,
    SubscriptionTable,
    // Transport
    AdsTransport,
    Notification,
    NotificationSink,
    TransportResult,
};

pub use config::{AdsClientConfig, AdsClientConfigBuilder, ConfigFormat, ConfigLoader, TARGET_ENV_VAR};
pub use value::PlcValue;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name.
pub const NAME: &str = env!("CARGO_PKG_NAME");
