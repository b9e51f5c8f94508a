//! Configuration types for the device inventory
//!
//! This module defines all configuration structures used throughout the crate.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DevinvConfig {
    /// Device source configuration
    #[serde(default)]
    pub source: SourceConfig,

    /// Inventory settings
    #[serde(default)]
    pub inventory: InventoryConfig,
}

impl DevinvConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        self.source.validate()?;
        self.inventory.validate()?;
        Ok(())
    }
}

/// Device source configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SourceConfig {
    /// In-process source fed by the embedding application
    #[default]
    Memory,

    /// Vendor REST endpoint returning a JSON device list
    Http {
        /// Endpoint URL
        url: String,
        /// Per-request timeout in seconds
        #[serde(default = "default_http_timeout_secs")]
        timeout_secs: u64,
    },

    /// Custom source
    Custom {
        /// Factory name to use
        factory: String,
        /// Custom configuration data
        config: serde_json::Value,
    },
}

impl SourceConfig {
    /// Validate the source configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            SourceConfig::Memory => Ok(()),
            SourceConfig::Http { url, timeout_secs } => {
                if url.is_empty() {
                    return Err(crate::Error::config("HTTP source URL cannot be empty"));
                }
                if !url.starts_with("http://") && !url.starts_with("https://") {
                    return Err(crate::Error::config(format!(
                        "HTTP source URL must use http or https scheme: {}",
                        url
                    )));
                }
                if *timeout_secs == 0 {
                    return Err(crate::Error::config("HTTP source timeout must be > 0"));
                }
                Ok(())
            }
            SourceConfig::Custom { factory, config } => {
                if factory.is_empty() {
                    return Err(crate::Error::config("Custom source factory cannot be empty"));
                }
                if config.is_null() {
                    return Err(crate::Error::config("Custom source config cannot be null"));
                }
                Ok(())
            }
        }
    }

    /// Get the source type name used for registry lookup
    pub fn type_name(&self) -> &str {
        match self {
            SourceConfig::Memory => "memory",
            SourceConfig::Http { .. } => "http",
            SourceConfig::Custom { factory, .. } => factory,
        }
    }
}

/// Inventory configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventoryConfig {
    /// Delay between the end of one refresh cycle and the start of the next
    #[serde(default = "default_refresh_interval_secs")]
    pub refresh_interval_secs: u64,

    /// Delay before the first refresh cycle
    #[serde(default)]
    pub initial_delay_secs: u64,

    /// Upper bound on a single device listing
    ///
    /// A hung vendor call is abandoned after this long and the cycle skipped.
    #[serde(default = "default_source_timeout_secs")]
    pub source_timeout_secs: u64,

    /// Capacity of the monitoring event channel
    ///
    /// When full, new events are dropped (with a warning log).
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

impl InventoryConfig {
    /// Validate the inventory configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.refresh_interval_secs == 0 {
            return Err(crate::Error::config("Refresh interval must be > 0"));
        }
        if self.source_timeout_secs == 0 {
            return Err(crate::Error::config("Source timeout must be > 0"));
        }
        if self.event_channel_capacity == 0 {
            return Err(crate::Error::config("Event channel capacity must be > 0"));
        }
        Ok(())
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }

    pub fn initial_delay(&self) -> Duration {
        Duration::from_secs(self.initial_delay_secs)
    }

    pub fn source_timeout(&self) -> Duration {
        Duration::from_secs(self.source_timeout_secs)
    }
}

impl Default for InventoryConfig {
    fn default() -> Self {
        Self {
            refresh_interval_secs: default_refresh_interval_secs(),
            initial_delay_secs: 0,
            source_timeout_secs: default_source_timeout_secs(),
            event_channel_capacity: default_event_channel_capacity(),
        }
    }
}

fn default_refresh_interval_secs() -> u64 {
    10
}

fn default_source_timeout_secs() -> u64 {
    30
}

fn default_http_timeout_secs() -> u64 {
    10
}

fn default_event_channel_capacity() -> usize {
    1000
}
