// # Vendor Handle Trait
//
// Opaque per-device resource (a D-Bus object proxy, an open socket, a cloud
// session) owned by exactly one `DeviceRecord`.

/// Trait for per-device vendor resources
///
/// # Ownership
///
/// The inventory guarantees `dispose()` is called at most once per handle:
/// when the record is evicted, when a newer handle supersedes it, or when the
/// inventory is disposed. Implementations do not need to be idempotent.
pub trait VendorHandle: Send + Sync {
    /// Latest signal strength reported by the vendor stack (e.g. RSSI in dBm)
    ///
    /// `None` when the stack has not measured the device yet.
    fn signal_strength(&self) -> Option<i16>;

    /// Release the vendor resource
    fn dispose(&mut self) -> Result<(), crate::Error>;
}
