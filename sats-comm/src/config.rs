// Sats Comm - Satellite communication daemon
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Daemon configuration
//!
//! Read from an optional TOML file; every section and key may be omitted.
//! Command-line flags override file values.
//!
//! ```toml
//! startup_delay_secs = 60
//!
//! [modem]
//! port = "/dev/ttyUSB0"
//!
//! [link]
//! output_rest_secs = 120
//! input_rest_secs = 10
//! max_attempts = 10
//! retry_delay_ms = 100
//!
//! [mavlink]
//! base_url = "http://127.0.0.1:6040"
//! ```

use sats_link::{DispatcherConfig, ModemConfig, RetryPolicy, SessionConfig};
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Errors loading the configuration file
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Cannot read {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("Invalid configuration: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Complete daemon configuration
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    /// Wait before the first modem access, letting sensors boot
    pub startup_delay_secs: u64,
    pub modem: ModemConfig,
    pub link: LinkConfig,
    pub dispatcher: DispatcherSection,
    pub mavlink: MavlinkConfig,
    pub sensors: SensorConfig,
    pub status: StatusConfig,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            startup_delay_secs: 60,
            modem: ModemConfig::default(),
            link: LinkConfig::default(),
            dispatcher: DispatcherSection::default(),
            mavlink: MavlinkConfig::default(),
            sensors: SensorConfig::default(),
            status: StatusConfig::default(),
        }
    }
}

/// Store-and-forward settings
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    pub output_rest_secs: u64,
    pub input_rest_secs: u64,
    pub max_attempts: u32,
    pub retry_delay_ms: u64,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            output_rest_secs: 120,
            input_rest_secs: 10,
            max_attempts: 10,
            retry_delay_ms: 100,
        }
    }
}

/// Waypoint settle delays, in seconds
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DispatcherSection {
    pub param_settle_secs: u64,
    pub mode_settle_secs: u64,
    pub waypoint_settle_secs: u64,
}

impl Default for DispatcherSection {
    fn default() -> Self {
        Self {
            param_settle_secs: 10,
            mode_settle_secs: 10,
            waypoint_settle_secs: 5,
        }
    }
}

/// Mavlink2Rest bridge
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct MavlinkConfig {
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for MavlinkConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:6040".to_string(),
            timeout_secs: 10,
        }
    }
}

/// Payload sensor services
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SensorConfig {
    /// Solar charge controller service
    pub solar_url: String,
    /// Companion computer system service
    pub system_url: String,
    pub timeout_secs: u64,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            solar_url: "http://127.0.0.1:9991/data".to_string(),
            system_url: "http://127.0.0.1:6030/system".to_string(),
            timeout_secs: 5,
        }
    }
}

/// Status endpoint
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct StatusConfig {
    pub host: String,
    pub port: u16,
}

impl Default for StatusConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 9992,
        }
    }
}

impl DaemonConfig {
    pub fn from_toml(input: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(input)?)
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml(&contents)
    }

    /// Session settings for the link library
    pub fn session(&self) -> SessionConfig {
        SessionConfig::with_retry(RetryPolicy::new(
            self.link.max_attempts,
            Duration::from_millis(self.link.retry_delay_ms),
        ))
        .with_rest(
            Duration::from_secs(self.link.output_rest_secs),
            Duration::from_secs(self.link.input_rest_secs),
        )
    }

    /// Dispatcher settings for the link library
    pub fn dispatcher(&self) -> DispatcherConfig {
        DispatcherConfig {
            param_settle: Duration::from_secs(self.dispatcher.param_settle_secs),
            mode_settle: Duration::from_secs(self.dispatcher.mode_settle_secs),
            waypoint_settle: Duration::from_secs(self.dispatcher.waypoint_settle_secs),
        }
    }
}
