// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Test Fixtures
//!
//! Symbol names, endpoints, and configuration documents shared by the
//! integration suites.

use std::sync::Arc;

use crate::common::mocks::MockDevice;

// =============================================================================
// Symbol Fixtures
// =============================================================================

/// Variables of the standard mock PLC program.
pub struct SymbolFixtures;

impl SymbolFixtures {
    /// BOOL, initially `false`.
    pub const PULSE: &'static str = "MAIN.pulse";
    /// DINT, initially `0`.
    pub const COUNTER: &'static str = "MAIN.counter";
    /// LREAL, initially `0.0`.
    pub const SPEED: &'static str = "MAIN.speed";
    /// UINT, initially `0`.
    pub const STATUS_WORD: &'static str = "GVL.statusWord";
    /// Never defined.
    pub const MISSING: &'static str = "MAIN.doesNotExist";

    /// Creates a device running the standard program.
    pub fn standard_device() -> Arc<MockDevice> {
        let device = MockDevice::shared();
        device.define(Self::PULSE, false);
        device.define(Self::COUNTER, 0i32);
        device.define(Self::SPEED, 0.0f64);
        device.define(Self::STATUS_WORD, 0u16);
        device
    }
}

// =============================================================================
// Address Fixtures
// =============================================================================

/// Endpoint strings.
pub struct AddressFixtures;

impl AddressFixtures {
    /// TwinCAT 3 runtime of the mount PLC.
    pub const TC3_PLC: &'static str = "5.62.215.36.1.1:851";
    /// TwinCAT 2 runtime.
    pub const TC2_PLC: &'static str = "1.2.3.4.5.6:801";

    /// Strings that must not parse.
    pub fn malformed() -> Vec<&'static str> {
        vec![
            "",
            "1.2.3.4.5:801",
            "1.2.3.4.5.6.7:801",
            "1.2.3.4.5.6",
            "1.2.3.4.5.256:801",
            "1.2.3.4.5.6:70000",
            "1.2.3.4.5.6:",
            "a.b.c.d.e.f:851",
            "1.2.3.4.5.6:851:1",
        ]
    }
}

// =============================================================================
// Config Fixtures
// =============================================================================

/// Configuration documents.
pub struct ConfigFixtures;

impl ConfigFixtures {
    /// Complete TOML configuration.
    pub fn toml() -> &'static str {
        r#"
target = "5.62.215.36.1.1:851"
default_cycle_time = "250ms"
max_delay = "50ms"
transmission_mode = "server_on_change"
release_handles_on_disconnect = true
"#
    }

    /// Complete YAML configuration.
    pub fn yaml() -> &'static str {
        r#"
target: "5.62.215.36.1.1:851"
default_cycle_time: 2s
transmission_mode: server_cycle
release_handles_on_disconnect: false
"#
    }

    /// Complete JSON configuration.
    pub fn json() -> &'static str {
        r#"{
  "target": "1.2.3.4.5.6:801",
  "default_cycle_time": "100ms"
}"#
    }
}
