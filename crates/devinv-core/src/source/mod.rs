// # Device Source Implementations
//
// This module provides implementations of the DeviceSource trait that do not
// depend on any vendor stack.

pub mod memory;

pub use memory::{MemoryDeviceSource, MemoryDeviceSourceFactory, MemoryHandle};
