//! Locally tracked device records
//!
//! A [`DeviceRecord`] is shared as `Arc<DeviceRecord>` between the inventory,
//! listeners and callers of [`DeviceInventory::get`](crate::DeviceInventory::get).
//! Its mutable fields sit behind an internal lock so a refresh updates the
//! record in place and every holder keeps observing the same identity.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::discovery::reachability;
use crate::traits::VendorHandle;

struct RecordState {
    signal_strength: Option<i16>,
    last_seen: Option<DateTime<Utc>>,
    handle: Option<Box<dyn VendorHandle>>,
}

/// One physical device known to the inventory
pub struct DeviceRecord {
    address: String,
    state: Mutex<RecordState>,
}

/// Point-in-time, serializable view of a record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceSnapshot {
    pub address: String,
    pub signal_strength: Option<i16>,
    pub last_seen: Option<DateTime<Utc>>,
    pub resolved: bool,
    pub reachable: bool,
}

impl DeviceRecord {
    /// Record for a sighted device, taking ownership of its vendor handle
    pub fn new(address: impl Into<String>, handle: Box<dyn VendorHandle>) -> Self {
        Self {
            address: address.into(),
            state: Mutex::new(RecordState {
                signal_strength: handle.signal_strength(),
                last_seen: Some(Utc::now()),
                handle: Some(handle),
            }),
        }
    }

    /// Unresolved record: no vendor handle, unknown signal, never seen
    pub(crate) fn placeholder(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            state: Mutex::new(RecordState {
                signal_strength: None,
                last_seen: None,
                handle: None,
            }),
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn signal_strength(&self) -> Option<i16> {
        self.state.lock().signal_strength
    }

    pub fn last_seen(&self) -> Option<DateTime<Utc>> {
        self.state.lock().last_seen
    }

    /// Last sighting as milliseconds since the Unix epoch
    pub fn last_seen_epoch_millis(&self) -> Option<i64> {
        self.last_seen().map(|ts| ts.timestamp_millis())
    }

    /// Whether the record currently owns a vendor handle
    pub fn is_resolved(&self) -> bool {
        self.state.lock().handle.is_some()
    }

    /// Whether the record carries a usable signal reading
    pub fn is_reachable(&self) -> bool {
        reachability::is_reachable(self.signal_strength())
    }

    pub fn snapshot(&self) -> DeviceSnapshot {
        let state = self.state.lock();
        DeviceSnapshot {
            address: self.address.clone(),
            signal_strength: state.signal_strength,
            last_seen: state.last_seen,
            resolved: state.handle.is_some(),
            reachable: reachability::is_reachable(state.signal_strength),
        }
    }

    /// Apply a new sighting in place
    ///
    /// Returns the superseded handle, if any; the caller must dispose it.
    pub(crate) fn refresh(&self, handle: Box<dyn VendorHandle>) -> Option<Box<dyn VendorHandle>> {
        let mut state = self.state.lock();
        state.signal_strength = handle.signal_strength();
        state.last_seen = Some(Utc::now());
        state.handle.replace(handle)
    }

    /// Detach the vendor handle so it can be disposed exactly once
    pub(crate) fn take_handle(&self) -> Option<Box<dyn VendorHandle>> {
        self.state.lock().handle.take()
    }
}

impl fmt::Debug for DeviceRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("DeviceRecord")
            .field("address", &self.address)
            .field("signal_strength", &state.signal_strength)
            .field("last_seen", &state.last_seen)
            .field("resolved", &state.handle.is_some())
            .finish()
    }
}
