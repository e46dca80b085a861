// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # amelas-ads Integration Tests
//!
//! Test utilities and integration suites for the `amelas-ads` client.
//!
//! ## Module Structure
//!
//! - [`common`]: Shared test utilities
//!   - `fixtures`: Symbol names, endpoints, and configuration documents
//!   - `mocks`: [`MockDevice`](common::MockDevice), its transport, and a
//!     callback recorder
//!
//! ## Running Tests
//!
//! ```bash
//! # Run all integration tests
//! cargo test -p amelas-tests
//!
//! # Run specific test suite
//! cargo test -p amelas-tests --test integration_client
//! cargo test -p amelas-tests --test integration_subscription
//! cargo test -p amelas-tests --test integration_config
//!
//! # Show client logs
//! RUST_LOG=amelas_ads=trace cargo test -p amelas-tests -- --nocapture
//! ```
//!
//! ## Writing New Tests
//!
//! ```rust,ignore
//! use amelas_tests::prelude::*;
//!
//! #[tokio::test]
//! async fn test_something() {
//!     let (client, device) = connected_client().await;
//!     device.set_value(SymbolFixtures::COUNTER, 7i32);
//!     assert_eq!(client.read::<i32>(SymbolFixtures::COUNTER).await.unwrap(), 7);
//! }
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod common;

/// Re-export commonly used items for convenience.
pub mod prelude {
    pub use crate::common::fixtures::*;
    pub use crate::common::mocks::*;
    pub use crate::common::{connected_client, connected_client_with, init_test_logging, temp_test_dir};
}
