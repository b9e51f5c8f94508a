// # Memory Device Source
//
// In-process implementation of DeviceSource.
//
// ## Purpose
//
// The embedding application decides which devices are visible by calling
// `set_device` / `remove_device`. Every listing hands out fresh handles, just
// like a vendor stack handing out new proxy objects per scan.
//
// ## When to Use
//
// - Testing environments
// - Bridging a stack whose scan results arrive by callback rather than by poll
// - Demonstrations of the inventory without real hardware

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

use crate::config::SourceConfig;
use crate::traits::{DeviceSighting, DeviceSource, DeviceSourceFactory, VendorHandle};
use crate::{Error, Result};

#[derive(Debug, Default)]
struct MemoryState {
    /// Visible devices in listing order
    devices: Vec<(String, Option<i16>)>,
    unavailable: bool,
    handles_created: usize,
    disposed: HashMap<String, usize>,
}

/// In-memory device source
///
/// Cloning shares the underlying state, so the application can keep a clone
/// to drive the snapshot after handing another clone to the inventory.
///
/// # Example
///
/// ```rust
/// use devinv_core::source::MemoryDeviceSource;
/// use devinv_core::traits::{DeviceSource, VendorHandle};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let source = MemoryDeviceSource::new();
///     source.set_device("AA:BB:CC:DD:EE:FF", Some(-52));
///
///     let devices = source.list_current_devices().await?;
///     assert_eq!(devices.len(), 1);
///     assert_eq!(devices[0].handle.signal_strength(), Some(-52));
///
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryDeviceSource {
    inner: Arc<RwLock<MemoryState>>,
}

impl MemoryDeviceSource {
    /// Create a source with no visible devices
    pub fn new() -> Self {
        Self::default()
    }

    /// Make a device visible, or update its signal strength
    pub fn set_device(&self, address: impl Into<String>, signal_strength: Option<i16>) {
        let address = address.into();
        let mut state = self.inner.write();
        match state.devices.iter_mut().find(|(a, _)| *a == address) {
            Some(entry) => entry.1 = signal_strength,
            None => state.devices.push((address, signal_strength)),
        }
    }

    /// Hide a device; returns `false` if it was not visible
    pub fn remove_device(&self, address: &str) -> bool {
        let mut state = self.inner.write();
        let before = state.devices.len();
        state.devices.retain(|(a, _)| a != address);
        state.devices.len() != before
    }

    /// Hide every device
    pub fn clear(&self) {
        self.inner.write().devices.clear();
    }

    /// Simulate the vendor stack going away (listings fail) or coming back
    pub fn set_available(&self, available: bool) {
        self.inner.write().unavailable = !available;
    }

    pub fn device_count(&self) -> usize {
        self.inner.read().devices.len()
    }

    /// Number of handles handed out so far
    pub fn handles_created(&self) -> usize {
        self.inner.read().handles_created
    }

    /// Number of handles disposed for `address`
    pub fn dispose_count(&self, address: &str) -> usize {
        self.inner.read().disposed.get(address).copied().unwrap_or(0)
    }

    /// Number of handles disposed across all devices
    pub fn total_disposed(&self) -> usize {
        self.inner.read().disposed.values().sum()
    }
}

#[async_trait]
impl DeviceSource for MemoryDeviceSource {
    async fn open(&self) -> Result<()> {
        Ok(())
    }

    async fn list_current_devices(&self) -> Result<Vec<DeviceSighting>> {
        let mut state = self.inner.write();
        if state.unavailable {
            return Err(Error::source_unavailable("memory source marked unavailable"));
        }

        state.handles_created += state.devices.len();
        let sightings = state
            .devices
            .iter()
            .map(|(address, signal_strength)| {
                let handle = MemoryHandle {
                    address: address.clone(),
                    signal_strength: *signal_strength,
                    source: self.inner.clone(),
                };
                DeviceSighting::new(address.clone(), Box::new(handle))
            })
            .collect();

        Ok(sightings)
    }

    fn source_name(&self) -> &'static str {
        "memory"
    }
}

/// Handle handed out by [`MemoryDeviceSource`]
#[derive(Debug)]
pub struct MemoryHandle {
    address: String,
    signal_strength: Option<i16>,
    source: Arc<RwLock<MemoryState>>,
}

impl VendorHandle for MemoryHandle {
    fn signal_strength(&self) -> Option<i16> {
        self.signal_strength
    }

    fn dispose(&mut self) -> Result<()> {
        let mut state = self.source.write();
        *state.disposed.entry(self.address.clone()).or_insert(0) += 1;
        Ok(())
    }
}

/// Factory for creating memory device sources
pub struct MemoryDeviceSourceFactory;

impl DeviceSourceFactory for MemoryDeviceSourceFactory {
    fn create(&self, config: &SourceConfig) -> Result<Box<dyn DeviceSource>> {
        match config {
            SourceConfig::Memory => Ok(Box::new(MemoryDeviceSource::new())),
            _ => Err(Error::config("Invalid config for memory device source")),
        }
    }
}
