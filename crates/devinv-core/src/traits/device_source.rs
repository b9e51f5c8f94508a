// # Device Source Trait
//
// Defines the interface for pulling a point-in-time snapshot of the devices
// currently visible to a vendor stack.
//
// ## Implementations
//
// - In-memory: `MemoryDeviceSource` in this crate
// - Vendor REST endpoint: `devinv-source-http` crate
// - Future: BlueZ/D-Bus, UPnP search, serial gateways
//
// ## Usage
//
// ```rust,ignore
// use devinv_core::DeviceSource;
//
// #[tokio::main]
// async fn main() -> anyhow::Result<()> {
//     let source = /* DeviceSource implementation */;
//
//     source.open().await?;
//     for sighting in source.list_current_devices().await? {
//         println!("saw {} (rssi {:?})", sighting.address, sighting.handle.signal_strength());
//     }
//     source.close().await?;
//
//     Ok(())
// }
// ```

use async_trait::async_trait;
use std::fmt;

use crate::traits::VendorHandle;

/// One device observed by a source during a single listing
pub struct DeviceSighting {
    /// Stable device address (hardware address or vendor device ID)
    pub address: String,
    /// Live vendor resource for the device, handed over to the inventory
    pub handle: Box<dyn VendorHandle>,
}

impl DeviceSighting {
    /// Create a new sighting
    pub fn new(address: impl Into<String>, handle: Box<dyn VendorHandle>) -> Self {
        Self {
            address: address.into(),
            handle,
        }
    }
}

impl fmt::Debug for DeviceSighting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceSighting")
            .field("address", &self.address)
            .field("signal_strength", &self.handle.signal_strength())
            .finish()
    }
}

/// Trait for device source implementations
///
/// A source is an explicitly constructed, explicitly owned resource. It is
/// opened once before the inventory starts and closed when the inventory is
/// disposed; it never lives in process-wide static state.
///
/// # Trust Level: Semi-Trusted
///
/// ## Allowed Capabilities
/// - ✅ Perform vendor-specific I/O (D-Bus, sockets, HTTP)
/// - ✅ Enforce its own per-request timeout policy
/// - ✅ Hand ownership of fresh vendor handles to the caller
///
/// ## Forbidden Capabilities
/// - ❌ Retain references to handles it returned (the inventory owns them)
/// - ❌ Decide which devices are evicted (owned by `DeviceInventory`)
/// - ❌ Notify discovery listeners (owned by `DiscoveryNotifier`)
/// - ❌ Spawn its own polling loop (owned by the `Scheduler`)
#[async_trait]
pub trait DeviceSource: Send + Sync {
    /// Open the connection to the vendor stack
    ///
    /// Called exactly once before the first refresh cycle. Failing here is
    /// fatal to the inventory: implementations should return
    /// [`Error::SourceInit`](crate::Error::SourceInit).
    async fn open(&self) -> Result<(), crate::Error>;

    /// List the devices currently visible
    ///
    /// # Returns
    ///
    /// - `Ok(Vec<DeviceSighting>)`: the complete snapshot for this cycle
    /// - `Err(Error)`: the stack is transiently unavailable; the cycle is skipped
    async fn list_current_devices(&self) -> Result<Vec<DeviceSighting>, crate::Error>;

    /// Release the connection to the vendor stack
    async fn close(&self) -> Result<(), crate::Error> {
        Ok(())
    }

    /// Get the source name (for logging/debugging)
    fn source_name(&self) -> &'static str;
}

/// Helper trait for constructing device sources from configuration
pub trait DeviceSourceFactory: Send + Sync {
    /// Create a DeviceSource instance from configuration
    fn create(
        &self,
        config: &crate::config::SourceConfig,
    ) -> Result<Box<dyn DeviceSource>, crate::Error>;
}
