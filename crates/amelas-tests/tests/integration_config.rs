// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Configuration Integration Tests
//!
//! Loading `AdsClientConfig` from files in every supported format.
//!
//! ## Test Categories
//!
//! - `test_load_*`: File loading
//! - `test_validate_*`: Validation rules
//!
//! The `AMELAS_ADS_TARGET` override is covered in `integration_env.rs` so that
//! no test here observes a variable set by another.

use std::fs;
use std::time::Duration;

use amelas_ads::{
    AdsClient, AdsClientConfig, AdsError, ConfigLoader, ConfigurationError, TransmissionMode,
};
use amelas_tests::prelude::*;

fn loader() -> ConfigLoader {
    ConfigLoader::new().with_env_override(false)
}

// =============================================================================
// Load Tests
// =============================================================================

#[test]
fn test_load_toml_file() {
    let dir = temp_test_dir("amelas_config");
    let path = dir.path().join("ads.toml");
    fs::write(&path, ConfigFixtures::toml()).unwrap();

    let config = loader().load(&path).unwrap();

    assert_eq!(config.target.as_deref(), Some(AddressFixtures::TC3_PLC));
    assert_eq!(config.default_cycle_time, Duration::from_millis(250));
    assert_eq!(config.max_delay, Duration::from_millis(50));
    assert_eq!(config.transmission_mode, TransmissionMode::ServerOnChange);
    assert!(config.release_handles_on_disconnect);
}

#[test]
fn test_load_yaml_file() {
    let dir = temp_test_dir("amelas_config");
    let path = dir.path().join("ads.yml");
    fs::write(&path, ConfigFixtures::yaml()).unwrap();

    let config = loader().load(&path).unwrap();

    assert_eq!(config.default_cycle_time, Duration::from_secs(2));
    assert_eq!(config.transmission_mode, TransmissionMode::ServerCycle);
    assert!(!config.release_handles_on_disconnect);
}

#[test]
fn test_load_json_file_fills_defaults() {
    let dir = temp_test_dir("amelas_config");
    let path = dir.path().join("ads.json");
    fs::write(&path, ConfigFixtures::json()).unwrap();

    let config = loader().load(&path).unwrap();

    assert_eq!(config.target.as_deref(), Some(AddressFixtures::TC2_PLC));
    assert_eq!(config.default_cycle_time, Duration::from_millis(100));
    assert_eq!(config.max_delay, Duration::ZERO);
    assert!(config.release_handles_on_disconnect);
}

#[test]
fn test_load_missing_file() {
    let dir = temp_test_dir("amelas_config");

    let err = loader().load(dir.path().join("absent.toml")).unwrap_err();

    assert!(matches!(
        err,
        AdsError::Configuration(ConfigurationError::FileNotFound { .. })
    ));
}

#[test]
fn test_load_unsupported_extension() {
    let dir = temp_test_dir("amelas_config");
    let path = dir.path().join("ads.ini");
    fs::write(&path, "target = 1").unwrap();

    let err = loader().load(&path).unwrap_err();

    assert!(matches!(
        err,
        AdsError::Configuration(ConfigurationError::UnsupportedFormat { .. })
    ));
}

#[test]
fn test_load_syntax_error() {
    let dir = temp_test_dir("amelas_config");
    let path = dir.path().join("ads.toml");
    fs::write(&path, "target = [").unwrap();

    let err = loader().load(&path).unwrap_err();

    assert!(matches!(err, AdsError::Configuration(ConfigurationError::Parse { .. })));
}

#[test]
fn test_load_placeholder_default() {
    let dir = temp_test_dir("amelas_config");
    let path = dir.path().join("ads.toml");
    fs::write(
        &path,
        "target = \"${AMELAS_TEST_UNSET_TARGET_7F3A:1.2.3.4.5.6:801}\"\n",
    )
    .unwrap();

    let config = loader().load(&path).unwrap();

    assert_eq!(config.target.as_deref(), Some(AddressFixtures::TC2_PLC));
}

#[tokio::test]
async fn test_load_then_connect_configured() {
    init_test_logging();
    let dir = temp_test_dir("amelas_config");
    let path = dir.path().join("ads.toml");
    fs::write(&path, ConfigFixtures::toml()).unwrap();
    let config = loader().load(&path).unwrap();

    let device = SymbolFixtures::standard_device();
    let client = AdsClient::with_config(MockAdsTransport::with_device(device.clone()), config);
    client.connect_configured().await.unwrap();

    assert_eq!(
        device.session_target(),
        Some(AddressFixtures::TC3_PLC.parse().unwrap())
    );
    client.disconnect().await.unwrap();
}

// =============================================================================
// Validation Tests
// =============================================================================

#[test]
fn test_validate_rejects_bad_target() {
    let err = loader()
        .load_str("target = \"1.2.3.4.5:801\"", amelas_ads::ConfigFormat::Toml)
        .unwrap_err();

    assert!(matches!(
        err,
        AdsError::Configuration(ConfigurationError::InvalidValue { .. })
    ));
}

#[test]
fn test_validate_rejects_zero_cycle_time() {
    let err = AdsClientConfig::builder()
        .default_cycle_time(Duration::ZERO)
        .build()
        .unwrap_err();

    assert!(matches!(err, AdsError::Configuration(_)));
}

#[test]
fn test_validate_rejects_unknown_field() {
    let err = loader()
        .load_str("cycle = \"1s\"", amelas_ads::ConfigFormat::Toml)
        .unwrap_err();

    assert!(matches!(err, AdsError::Configuration(ConfigurationError::Parse { .. })));
}
