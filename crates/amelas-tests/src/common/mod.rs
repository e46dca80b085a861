// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Common Test Utilities
//!
//! Shared helpers for the integration suites.
//!
//! ## Module Structure
//!
//! - `fixtures`: Symbol names, endpoints, and configuration documents
//! - `mocks`: In-memory ADS device, its transport, and a callback recorder

pub mod fixtures;
pub mod mocks;

// Re-exports for convenience
pub use fixtures::*;
pub use mocks::*;

use std::sync::{Arc, Once};

use amelas_ads::{AdsClient, AdsClientConfig};
use tracing_subscriber::EnvFilter;

static INIT: Once = Once::new();

/// Initialize test logging. Call this at the start of each test.
pub fn init_test_logging() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| EnvFilter::new("warn,amelas_ads=debug")),
            )
            .with_test_writer()
            .init();
    });
}

/// Creates a client connected to a standard mock device.
pub async fn connected_client() -> (AdsClient<MockAdsTransport>, Arc<MockDevice>) {
    connected_client_with(AdsClientConfig::default()).await
}

/// Creates a client with `config`, connected to a standard mock device.
pub async fn connected_client_with(
    config: AdsClientConfig,
) -> (AdsClient<MockAdsTransport>, Arc<MockDevice>) {
    init_test_logging();
    let device = SymbolFixtures::standard_device();
    let client = AdsClient::with_config(MockAdsTransport::with_device(Arc::clone(&device)), config);
    client
        .connect(AddressFixtures::TC3_PLC)
        .await
        .expect("mock device accepts the session");
    (client, device)
}

/// Create a temporary directory for test data.
pub fn temp_test_dir(prefix: &str) -> tempfile::TempDir {
    tempfile::Builder::new()
        .prefix(prefix)
        .tempdir()
        .expect("Failed to create temp directory")
}
