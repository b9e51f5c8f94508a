//! Discovery notification fan-out
//!
//! The [`DiscoveryNotifier`] receives every record touched by a refresh
//! cycle, drops the ones that fail the [reachability](reachability) gate and
//! forwards the rest to all registered [`DiscoveryListener`]s.
//!
//! ## Listener set
//!
//! Listeners are compared by identity (the data pointer of their `Arc`), so
//! registering the same listener twice does not double-dispatch. Dispatch
//! iterates over a snapshot taken when `notify` starts and calls listeners
//! without holding the lock: listeners may add or remove listeners from
//! inside a callback, and a listener removed concurrently with an in-flight
//! `notify` may still receive that one call. A panicking listener is logged
//! and skipped so it cannot abort the refresh cycle that triggered it.

pub mod reachability;

use parking_lot::RwLock;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{error, trace};

use crate::record::DeviceRecord;
use crate::traits::DiscoveryListener;

/// Fans discovery events out to registered listeners
#[derive(Default)]
pub struct DiscoveryNotifier {
    listeners: RwLock<Vec<Arc<dyn DiscoveryListener>>>,
}

fn same_listener(a: &Arc<dyn DiscoveryListener>, b: &Arc<dyn DiscoveryListener>) -> bool {
    // Compare data pointers only; vtable pointers are not unique per type.
    std::ptr::eq(
        Arc::as_ptr(a) as *const (),
        Arc::as_ptr(b) as *const (),
    )
}

impl DiscoveryNotifier {
    /// Create a notifier with no listeners
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener
    ///
    /// Returns `false` if this exact listener was already registered.
    pub fn add_listener(&self, listener: Arc<dyn DiscoveryListener>) -> bool {
        let mut listeners = self.listeners.write();
        if listeners.iter().any(|l| same_listener(l, &listener)) {
            return false;
        }
        listeners.push(listener);
        true
    }

    /// Unregister a listener
    ///
    /// Returns `false` if the listener was not registered.
    pub fn remove_listener(&self, listener: &Arc<dyn DiscoveryListener>) -> bool {
        let mut listeners = self.listeners.write();
        let before = listeners.len();
        listeners.retain(|l| !same_listener(l, listener));
        listeners.len() != before
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.read().len()
    }

    /// Announce a record to every listener if it is reachable
    ///
    /// # Returns
    ///
    /// The number of listeners that handled the record (0 when it was
    /// filtered out). A listener that panics is logged and skipped; the
    /// remaining listeners are still called.
    pub fn notify(&self, record: &DeviceRecord) -> usize {
        if !record.is_reachable() {
            trace!("Device {} not reachable, not announcing", record.address());
            return 0;
        }

        let snapshot: Vec<Arc<dyn DiscoveryListener>> = self.listeners.read().clone();
        let mut delivered = 0;
        for listener in &snapshot {
            match panic::catch_unwind(AssertUnwindSafe(|| listener.device_discovered(record))) {
                Ok(()) => delivered += 1,
                Err(payload) => {
                    error!(
                        "Discovery listener panicked on {}: {}",
                        record.address(),
                        panic_message(payload.as_ref())
                    );
                }
            }
        }
        delivered
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        *msg
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.as_str()
    } else {
        "non-string panic payload"
    }
}
