// # devinv-core
//
// Core library for device inventory reconciliation and discovery
// notification.
//
// ## Architecture Overview
//
// - **DeviceSource**: Trait for pulling a snapshot of visible devices
// - **VendorHandle**: Trait for the per-device vendor resource a record owns
// - **Scheduler**: Trait for running the refresh cycle at a fixed delay
// - **DeviceInventory**: Reconciles snapshots into the address → record map
// - **DiscoveryNotifier**: Filters by reachability and fans out to listeners
// - **SourceRegistry**: Plugin-based registry for device sources
//
// ## Design Principles
//
// 1. **Separation of Concerns**: Vendor I/O lives behind `DeviceSource`
// 2. **Explicit Ownership**: Sources and handles are injected, never static
// 3. **Plugin-Based**: Sources are resolved once from configuration
// 4. **Library-First**: The daemon is a thin wrapper around this crate
// 5. **Stale-but-Consistent**: A failed cycle never applies a partial update

pub mod config;
pub mod discovery;
pub mod error;
pub mod inventory;
pub mod record;
pub mod registry;
pub mod scheduler;
pub mod source;
pub mod traits;

// Re-export core types for convenience
pub use config::{DevinvConfig, InventoryConfig, SourceConfig};
pub use discovery::DiscoveryNotifier;
pub use error::{Error, Result};
pub use inventory::{CycleOutcome, CycleReport, DeviceInventory, InventoryEvent};
pub use record::{DeviceRecord, DeviceSnapshot};
pub use registry::SourceRegistry;
pub use scheduler::TokioScheduler;
pub use source::MemoryDeviceSource;
pub use traits::{DeviceSighting, DeviceSource, DiscoveryListener, Scheduler, VendorHandle};
