use crate::{DeviceCategory, UnknownCategory};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Failure to load a [`Config`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file couldn't be read.
    #[error("couldn't read {}", .path.display())]
    Io {
        /// File that was being read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The contents aren't valid TOML for this configuration.
    #[error(transparent)]
    Parse(#[from] toml::de::Error),
    /// A `[devices.<name>]` table names an unknown category.
    #[error(transparent)]
    UnknownCategory(#[from] UnknownCategory),
    /// The category can't be reached over Alpaca.
    #[error("{0} devices have no Alpaca device type")]
    NoAlpacaType(DeviceCategory),
    /// Two `[devices.<name>]` tables name the same category.
    #[error("{0} is configured more than once")]
    DuplicateCategory(DeviceCategory),
    /// `poll_interval` must be at least one second.
    #[error("poll_interval must be at least 1 second")]
    ZeroPollInterval,
}

const fn default_poll_interval() -> u64 {
    2
}

/// Where to reach one Alpaca device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeviceEndpoint {
    /// Base URL of the Alpaca server, e.g. `http://localhost:11111/`.
    pub url: String,
    /// Device number on that server.
    #[serde(default)]
    pub device_number: usize,
}

/// Which devices to connect to and how often to poll them.
///
/// ```toml
/// poll_interval = 5
///
/// [devices.telescope]
/// url = "http://localhost:11111/"
///
/// [devices.flat_device]
/// url = "http://localhost:11111/"
/// device_number = 1
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Seconds between connection state polls.
    #[serde(default = "default_poll_interval")]
    pub poll_interval: u64,
    /// Endpoints keyed by category name.
    #[serde(default)]
    pub devices: BTreeMap<String, DeviceEndpoint>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            poll_interval: default_poll_interval(),
            devices: BTreeMap::new(),
        }
    }
}

impl Config {
    /// Parse a configuration and check its poll interval and device table.
    pub fn from_toml_str(toml: &str) -> Result<Self, ConfigError> {
        let config = toml::from_str::<Self>(toml)?;
        if config.poll_interval == 0 {
            return Err(ConfigError::ZeroPollInterval);
        }
        let _ = config.endpoints()?;
        Ok(config)
    }

    /// Read and parse a configuration file.
    #[tracing::instrument(level = "debug")]
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_owned(),
            source,
        })?;
        let config = Self::from_toml_str(&contents)?;
        tracing::debug!(devices = config.devices.len(), "Loaded configuration");
        Ok(config)
    }

    /// Configured endpoints with their categories resolved.
    pub fn endpoints(&self) -> Result<Vec<(DeviceCategory, &DeviceEndpoint)>, ConfigError> {
        let mut endpoints = Vec::with_capacity(self.devices.len());
        for (name, endpoint) in &self.devices {
            let category = name.parse::<DeviceCategory>()?;
            if category.alpaca_path().is_none() {
                return Err(ConfigError::NoAlpacaType(category));
            }
            if endpoints.iter().any(|&(seen, _)| seen == category) {
                return Err(ConfigError::DuplicateCategory(category));
            }
            endpoints.push((category, endpoint));
        }
        Ok(endpoints)
    }

    /// Interval between connection state polls.
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval)
    }
}
