//! Reachability gate
//!
//! Some listings report a device address before the stack has measured its
//! signal. Such records are tracked but not announced.

/// A device is reachable iff it carries a present, non-zero signal reading
pub fn is_reachable(signal_strength: Option<i16>) -> bool {
    matches!(signal_strength, Some(rssi) if rssi != 0)
}
