// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Environment Integration Tests
//!
//! Environment-dependent configuration loading. Everything that touches the
//! process environment runs in a single test to keep the variables stable.

use std::env;
use std::fs;

use amelas_ads::{ConfigFormat, ConfigLoader, TARGET_ENV_VAR};
use amelas_tests::prelude::*;

#[test]
fn test_environment_overrides() {
    let dir = temp_test_dir("amelas_env");
    let path = dir.path().join("ads.toml");
    fs::write(&path, ConfigFixtures::toml()).unwrap();

    // Placeholder resolved from the environment.
    env::set_var("AMELAS_TEST_PLC_PORT", "801");
    let config = ConfigLoader::new()
        .load_str("target = \"1.2.3.4.5.6:${AMELAS_TEST_PLC_PORT}\"", ConfigFormat::Toml)
        .unwrap();
    assert_eq!(config.target.as_deref(), Some(AddressFixtures::TC2_PLC));

    // Placeholder without default and without value.
    env::remove_var("AMELAS_TEST_PLC_PORT");
    assert!(ConfigLoader::new()
        .load_str("target = \"1.2.3.4.5.6:${AMELAS_TEST_PLC_PORT}\"", ConfigFormat::Toml)
        .is_err());

    // Placeholders left alone when resolution is disabled.
    let err = ConfigLoader::new()
        .with_env_vars(false)
        .load_str("target = \"${AMELAS_TEST_PLC_PORT:x}\"", ConfigFormat::Toml)
        .unwrap_err();
    assert!(err.to_string().contains("target"));

    // Target override.
    env::set_var(TARGET_ENV_VAR, AddressFixtures::TC2_PLC);
    let config = ConfigLoader::new().load(&path).unwrap();
    assert_eq!(config.target.as_deref(), Some(AddressFixtures::TC2_PLC));

    let config = ConfigLoader::new()
        .with_env_override(false)
        .load(&path)
        .unwrap();
    assert_eq!(config.target.as_deref(), Some(AddressFixtures::TC3_PLC));

    // A malformed override fails validation.
    env::set_var(TARGET_ENV_VAR, "not-an-address");
    assert!(ConfigLoader::new().load(&path).is_err());

    env::remove_var(TARGET_ENV_VAR);
}
