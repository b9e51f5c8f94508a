//! Core traits for the device inventory
//!
//! This module defines the collaborator interfaces the inventory consumes
//! and the listener interface it exposes.
//!
//! - [`DeviceSource`]: Snapshot of currently visible devices
//! - [`VendorHandle`]: Per-device vendor resource
//! - [`Scheduler`]: Periodic fixed-delay execution of the refresh cycle
//! - [`DiscoveryListener`]: Receives discovery notifications

pub mod device_source;
pub mod discovery_listener;
pub mod scheduler;
pub mod vendor_handle;

pub use device_source::{DeviceSighting, DeviceSource, DeviceSourceFactory};
pub use discovery_listener::DiscoveryListener;
pub use scheduler::{PeriodicTask, ScheduledTask, Scheduler, TaskFuture};
pub use vendor_handle::VendorHandle;
