// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Client configuration and loading.
//!
//! # Example (TOML)
//!
//! ```toml
//! target = "5.62.215.36.1.1:851"
//! default_cycle_time = "250ms"
//! max_delay = "0s"
//! transmission_mode = "server_on_change"
//! release_handles_on_disconnect = true
//! ```
//!
//! # Loading Pipeline
//!
//! 1. Detect the format from the file extension (`.toml`, `.yaml`/`.yml`, `.json`)
//! 2. Resolve `${VAR}` / `${VAR:default}` placeholders in the raw content
//! 3. Deserialize
//! 4. Apply the `AMELAS_ADS_TARGET` environment override
//! 5. Validate

use std::env;
use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{AdsError, AdsResult, ConfigurationError};
use crate::types::{
    AmsAddr, NotificationAttributes, TransmissionMode, DEFAULT_NOTIFICATION_PERIOD,
};

/// Environment variable overriding [`AdsClientConfig::target`].
pub const TARGET_ENV_VAR: &str = "AMELAS_ADS_TARGET";

// =============================================================================
// AdsClientConfig
// =============================================================================

/// Configuration of an [`AdsClient`](crate::client::AdsClient).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AdsClientConfig {
    /// Endpoint used by `connect_configured`, as `o1.o2.o3.o4.o5.o6:port`.
    pub target: Option<String>,

    /// Minimum notification period used when a subscription does not name one.
    #[serde(with = "humantime_serde")]
    pub default_cycle_time: Duration,

    /// Maximum time the device may hold back a notification.
    #[serde(with = "humantime_serde")]
    pub max_delay: Duration,

    /// Transmission mode of new notifications.
    pub transmission_mode: TransmissionMode,

    /// Release cached symbol handles on the device when disconnecting.
    pub release_handles_on_disconnect: bool,
}

impl Default for AdsClientConfig {
    fn default() -> Self {
        Self {
            target: None,
            default_cycle_time: DEFAULT_NOTIFICATION_PERIOD,
            max_delay: Duration::ZERO,
            transmission_mode: TransmissionMode::ServerOnChange,
            release_handles_on_disconnect: true,
        }
    }
}

impl AdsClientConfig {
    /// Creates a configuration builder.
    pub fn builder() -> AdsClientConfigBuilder {
        AdsClientConfigBuilder::default()
    }

    /// Parses the configured target.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if no target is set, or an address
    /// error if it is malformed.
    pub fn target_addr(&self) -> AdsResult<AmsAddr> {
        let target = self
            .target
            .as_deref()
            .ok_or_else(|| ConfigurationError::missing("target"))?;
        Ok(target.parse()?)
    }

    /// Builds notification attributes for a value of `length` bytes.
    pub fn notification_attributes(
        &self,
        length: usize,
        cycle_time: Duration,
    ) -> NotificationAttributes {
        NotificationAttributes::on_change(length, cycle_time)
            .with_mode(self.transmission_mode)
            .with_max_delay(self.max_delay)
    }

    /// Validates the configuration.
    pub fn validate(&self) -> AdsResult<()> {
        if let Some(target) = &self.target {
            target.parse::<AmsAddr>().map_err(|e| {
                AdsError::from(ConfigurationError::invalid_value("target", e.to_string()))
            })?;
        }

        if self.default_cycle_time.is_zero() {
            return Err(ConfigurationError::invalid_value(
                "default_cycle_time",
                "must be greater than zero",
            )
            .into());
        }

        Ok(())
    }

    /// Loads a configuration file.
    pub fn from_file(path: impl AsRef<Path>) -> AdsResult<Self> {
        ConfigLoader::new().load(path)
    }

    /// Parses configuration content in the given format.
    pub fn from_str_with_format(content: &str, format: ConfigFormat) -> AdsResult<Self> {
        ConfigLoader::new().load_str(content, format)
    }
}

// =============================================================================
// AdsClientConfigBuilder
// =============================================================================

/// Builder for [`AdsClientConfig`].
#[derive(Debug, Default)]
pub struct AdsClientConfigBuilder {
    config: AdsClientConfig,
}

impl AdsClientConfigBuilder {
    /// Sets the target endpoint.
    pub fn target(mut self, target: impl Into<String>) -> Self {
        self.config.target = Some(target.into());
        self
    }

    /// Sets the default notification period.
    pub fn default_cycle_time(mut self, period: Duration) -> Self {
        self.config.default_cycle_time = period;
        self
    }

    /// Sets the maximum notification delay.
    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.config.max_delay = delay;
        self
    }

    /// Sets the transmission mode.
    pub fn transmission_mode(mut self, mode: TransmissionMode) -> Self {
        self.config.transmission_mode = mode;
        self
    }

    /// Enables or disables handle release on disconnect.
    pub fn release_handles_on_disconnect(mut self, enabled: bool) -> Self {
        self.config.release_handles_on_disconnect = enabled;
        self
    }

    /// Validates and returns the configuration.
    pub fn build(self) -> AdsResult<AdsClientConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

// =============================================================================
// ConfigFormat
// =============================================================================

/// Supported configuration file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// TOML.
    Toml,
    /// YAML.
    Yaml,
    /// JSON.
    Json,
}

impl ConfigFormat {
    /// Detects the format from a file extension.
    pub fn from_path(path: &Path) -> AdsResult<Self> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default()
            .to_lowercase();
        match extension.as_str() {
            "toml" => Ok(Self::Toml),
            "yaml" | "yml" => Ok(Self::Yaml),
            "json" => Ok(Self::Json),
            _ => Err(ConfigurationError::UnsupportedFormat { extension }.into()),
        }
    }
}

// =============================================================================
// ConfigLoader
// =============================================================================

/// Loads [`AdsClientConfig`] from files or strings.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    resolve_env_vars: bool,
    env_override: bool,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// Creates a loader with placeholder resolution and env override enabled.
    pub fn new() -> Self {
        Self {
            resolve_env_vars: true,
            env_override: true,
        }
    }

    /// Enables or disables `${VAR}` placeholder resolution.
    pub fn with_env_vars(mut self, enabled: bool) -> Self {
        self.resolve_env_vars = enabled;
        self
    }

    /// Enables or disables the `AMELAS_ADS_TARGET` override.
    pub fn with_env_override(mut self, enabled: bool) -> Self {
        self.env_override = enabled;
        self
    }

    /// Loads and validates a configuration file.
    pub fn load(&self, path: impl AsRef<Path>) -> AdsResult<AdsClientConfig> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigurationError::FileNotFound {
                path: path.to_path_buf(),
            }
            .into());
        }

        let format = ConfigFormat::from_path(path)?;
        let content = fs::read_to_string(path).map_err(|source| ConfigurationError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        debug!(path = %path.display(), ?format, "Loading ADS client configuration");
        self.load_str(&content, format)
    }

    /// Parses and validates configuration content.
    pub fn load_str(&self, content: &str, format: ConfigFormat) -> AdsResult<AdsClientConfig> {
        let content = if self.resolve_env_vars {
            resolve_env_placeholders(content)?
        } else {
            content.to_string()
        };

        let mut config: AdsClientConfig = parse_str(&content, format)?;

        if self.env_override {
            if let Ok(target) = env::var(TARGET_ENV_VAR) {
                debug!(addr = %target, "Applying {} override", TARGET_ENV_VAR);
                config.target = Some(target);
            }
        }

        config.validate()?;
        Ok(config)
    }
}

fn parse_str<T: DeserializeOwned>(content: &str, format: ConfigFormat) -> AdsResult<T> {
    let parsed = match format {
        ConfigFormat::Toml => toml::from_str(content).map_err(|e| e.to_string()),
        ConfigFormat::Yaml => serde_yaml::from_str(content).map_err(|e| e.to_string()),
        ConfigFormat::Json => serde_json::from_str(content).map_err(|e| e.to_string()),
    };
    parsed.map_err(|message| ConfigurationError::parse(message).into())
}

/// Resolves `${VAR}` and `${VAR:default}` placeholders.
///
/// An unset variable without a default is an error. An unterminated `${`
/// is kept verbatim.
fn resolve_env_placeholders(content: &str) -> AdsResult<String> {
    let mut result = String::with_capacity(content.len());
    let mut rest = content;

    while let Some(start) = rest.find("${") {
        result.push_str(&rest[..start]);
        let after = &rest[start + 2..];

        let Some(end) = after.find('}') else {
            result.push_str(&rest[start..]);
            return Ok(result);
        };

        let body = &after[..end];
        let (name, default) = match body.split_once(':') {
            Some((name, default)) => (name, Some(default)),
            None => (body, None),
        };

        match (env::var(name), default) {
            (Ok(value), _) => result.push_str(&value),
            (Err(_), Some(default)) => result.push_str(default),
            (Err(_), None) => {
                return Err(ConfigurationError::invalid_value(
                    name,
                    "environment variable is not set and has no default",
                )
                .into())
            }
        }

        rest = &after[end + 1..];
    }

    result.push_str(rest);
    Ok(result)
}

// =============================================================================
// Tests
// =============================================================================
