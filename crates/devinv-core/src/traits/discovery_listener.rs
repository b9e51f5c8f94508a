use crate::record::DeviceRecord;

/// Callback interface for components interested in discovered devices
///
/// `device_discovered` is invoked at least once per refresh cycle for every
/// reachable device, with no ordering guarantee between listeners or across
/// cycles. Removal of a device is not reported.
///
/// Callbacks run on the refresh-cycle task and should return quickly.
pub trait DiscoveryListener: Send + Sync {
    /// A reachable device was sighted in the current cycle
    fn device_discovered(&self, record: &DeviceRecord);
}
