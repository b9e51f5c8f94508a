//! Plugin-based device source registry
//!
//! The registry maps a source type name to a factory so the daemon can build
//! the configured source once, at startup, without a hardcoded match on
//! vendor names.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use devinv_core::registry::SourceRegistry;
//! use devinv_core::config::SourceConfig;
//!
//! let registry = SourceRegistry::with_builtin_sources();
//! devinv_source_http::register(&registry);
//!
//! let source = registry.create_source(&SourceConfig::Http {
//!     url: "https://hub.local/api/devices".into(),
//!     timeout_secs: 10,
//! })?;
//! ```
//!
//! ## Registration
//!
//! Source crates expose a `register()` function:
//!
//! ```rust,ignore
//! pub fn register(registry: &SourceRegistry) {
//!     registry.register_source("http", Box::new(HttpDeviceSourceFactory));
//! }
//! ```

use parking_lot::RwLock;
use std::collections::HashMap;

use crate::config::SourceConfig;
use crate::error::{Error, Result};
use crate::source::MemoryDeviceSourceFactory;
use crate::traits::{DeviceSource, DeviceSourceFactory};

/// Registry of device source factories
///
/// ## Thread Safety
///
/// The registry uses interior mutability with RwLock, allowing concurrent
/// reads and exclusive writes.
#[derive(Default)]
pub struct SourceRegistry {
    sources: RwLock<HashMap<String, Box<dyn DeviceSourceFactory>>>,
}

impl SourceRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with the sources built into this crate (`"memory"`)
    pub fn with_builtin_sources() -> Self {
        let registry = Self::new();
        registry.register_source("memory", Box::new(MemoryDeviceSourceFactory));
        registry
    }

    /// Register a device source factory
    ///
    /// Registering a name twice replaces the earlier factory.
    pub fn register_source(&self, name: impl Into<String>, factory: Box<dyn DeviceSourceFactory>) {
        self.sources.write().insert(name.into(), factory);
    }

    /// Create a device source from configuration
    ///
    /// # Returns
    ///
    /// - `Ok(Box<dyn DeviceSource>)`: Created source instance
    /// - `Err(Error)`: If the source type is not registered or creation fails
    pub fn create_source(&self, config: &SourceConfig) -> Result<Box<dyn DeviceSource>> {
        config.validate()?;

        let source_type = config.type_name();
        let sources = self.sources.read();

        let factory = sources
            .get(source_type)
            .ok_or_else(|| Error::config(format!("Unknown device source type: {}", source_type)))?;

        factory.create(config)
    }

    /// List all registered source types
    pub fn list_sources(&self) -> Vec<String> {
        let mut names: Vec<String> = self.sources.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Check if a source type is registered
    pub fn has_source(&self, name: &str) -> bool {
        self.sources.read().contains_key(name)
    }
}
