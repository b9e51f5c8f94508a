//! Device inventory
//!
//! The DeviceInventory is responsible for:
//! - Holding the authoritative address → [`DeviceRecord`] map
//! - Reconciling it against the device source once per refresh cycle
//! - Handing every sighted record to the [`DiscoveryNotifier`]
//! - Disposing vendor handles of devices that disappeared
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐  tick   ┌─────────────────┐  snapshot  ┌──────────────┐
//! │  Scheduler  │────────▶│ DeviceInventory │◀───────────│ DeviceSource │
//! └─────────────┘         └─────────────────┘            └──────────────┘
//!                                  │
//!                ┌─────────────────┼──────────────────┐
//!                ▼                 ▼                  ▼
//!      ┌───────────────────┐ ┌────────────┐  ┌────────────────┐
//!      │ DiscoveryNotifier │ │  evict +   │  │ InventoryEvent │
//!      │ (reachable only)  │ │  dispose   │  │   (monitor)    │
//!      └───────────────────┘ └────────────┘  └────────────────┘
//! ```
//!
//! ## Cycle Flow
//!
//! 1. Pull the snapshot (bounded by the source timeout). On failure the cycle
//!    is skipped and the inventory is left exactly as it was.
//! 2. Create records for new addresses, refresh known ones in place.
//! 3. Notify once per sighted record; every cycle restates the full inventory.
//! 4. Evict addresses missing from the snapshot. Listeners are not told.

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, error, info, trace, warn};

use crate::config::InventoryConfig;
use crate::discovery::DiscoveryNotifier;
use crate::error::{Error, Result};
use crate::record::{DeviceRecord, DeviceSnapshot};
use crate::traits::{
    DeviceSighting, DeviceSource, PeriodicTask, ScheduledTask, Scheduler, TaskFuture,
    VendorHandle,
};

/// Events emitted by the DeviceInventory for monitoring
///
/// This stream is separate from discovery listeners; in particular
/// `DeviceEvicted` is only visible here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InventoryEvent {
    /// Inventory started and the refresh cycle is scheduled
    Started { refresh_interval: Duration },

    /// A new address was sighted
    DeviceAdded { address: String },

    /// A known address was sighted again
    DeviceUpdated {
        address: String,
        signal_strength: Option<i16>,
    },

    /// An address vanished from the snapshot and was removed
    DeviceEvicted { address: String },

    /// A refresh cycle finished
    CycleCompleted { devices: usize, notified: usize },

    /// A refresh cycle was skipped and the inventory left unchanged
    CycleSkipped { reason: String },

    /// Inventory torn down
    Disposed { evicted: usize },
}

/// Counters for one completed refresh cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Distinct addresses in the snapshot
    pub sighted: usize,
    pub added: usize,
    pub updated: usize,
    pub evicted: usize,
    /// Listener invocations
    pub notified: usize,
}

/// Result of [`DeviceInventory::refresh_cycle`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    Completed(CycleReport),
    Skipped { reason: String },
}

impl CycleOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, CycleOutcome::Completed(_))
    }

    pub fn report(&self) -> Option<&CycleReport> {
        match self {
            CycleOutcome::Completed(report) => Some(report),
            CycleOutcome::Skipped { .. } => None,
        }
    }
}

/// Authoritative map of locally tracked devices
///
/// ## Lifecycle
///
/// 1. Create and schedule with [`DeviceInventory::start()`]
/// 2. The scheduler runs [`DeviceInventory::refresh_cycle()`] at a fixed delay
/// 3. Tear down with [`DeviceInventory::dispose()`]
///
/// Dropping the last handle without `dispose()` still cancels the schedule and
/// disposes the vendor handles, but leaves the source open.
///
/// ## Threading
///
/// `get`, `find` and listener registration may be called from any thread
/// while a cycle runs. At most one cycle executes at a time, even if the
/// scheduler fires overlapping ticks.
pub struct DeviceInventory {
    source: Box<dyn DeviceSource>,
    notifier: Arc<DiscoveryNotifier>,
    devices: DashMap<String, Arc<DeviceRecord>>,
    cycle_lock: tokio::sync::Mutex<()>,
    schedule: Mutex<Option<Box<dyn ScheduledTask>>>,
    disposed: AtomicBool,
    source_timeout: Duration,
    event_tx: mpsc::Sender<InventoryEvent>,
}

impl DeviceInventory {
    /// Open the source and schedule the refresh cycle
    ///
    /// # Parameters
    ///
    /// - `source`: Device source; opened here and closed by `dispose()`
    /// - `notifier`: Receives every record sighted by a cycle
    /// - `scheduler`: Runs the refresh cycle at `config.refresh_interval()`
    /// - `config`: Inventory configuration
    ///
    /// # Returns
    ///
    /// A tuple of (inventory, event_receiver). If the source cannot be opened
    /// this fails with [`Error::SourceInit`] and no inventory exists.
    pub async fn start(
        source: Box<dyn DeviceSource>,
        notifier: Arc<DiscoveryNotifier>,
        scheduler: &dyn Scheduler,
        config: InventoryConfig,
    ) -> Result<(Arc<Self>, mpsc::Receiver<InventoryEvent>)> {
        config.validate()?;

        let source_name = source.source_name();
        source.open().await.map_err(|e| match e {
            Error::SourceInit(_) => e,
            other => Error::source_init(format!("{}: {}", source_name, other)),
        })?;
        info!("Device source {} opened", source_name);

        let (event_tx, event_rx) = mpsc::channel(config.event_channel_capacity);
        let inventory = Arc::new(Self {
            source,
            notifier,
            devices: DashMap::new(),
            cycle_lock: tokio::sync::Mutex::new(()),
            schedule: Mutex::new(None),
            disposed: AtomicBool::new(false),
            source_timeout: config.source_timeout(),
            event_tx,
        });

        let weak = Arc::downgrade(&inventory);
        let task: PeriodicTask = Arc::new(move || -> TaskFuture {
            let weak = weak.clone();
            Box::pin(async move {
                if let Some(inventory) = weak.upgrade() {
                    inventory.refresh_cycle().await;
                }
            })
        });

        let handle = match scheduler.schedule_with_fixed_delay(
            task,
            config.initial_delay(),
            config.refresh_interval(),
        ) {
            Ok(handle) => handle,
            Err(e) => {
                if let Err(close_err) = inventory.source.close().await {
                    warn!("Failed to close device source {}: {}", source_name, close_err);
                }
                inventory.disposed.store(true, Ordering::SeqCst);
                return Err(e);
            }
        };
        *inventory.schedule.lock() = Some(handle);

        info!(
            "Device inventory started (source={}, interval={:?})",
            source_name,
            config.refresh_interval()
        );
        inventory.emit_event(InventoryEvent::Started {
            refresh_interval: config.refresh_interval(),
        });

        Ok((inventory, event_rx))
    }

    /// Run one reconciliation pass against the device source
    ///
    /// Never fails: an unavailable source yields [`CycleOutcome::Skipped`]
    /// and leaves the inventory untouched.
    pub async fn refresh_cycle(&self) -> CycleOutcome {
        let _cycle = self.cycle_lock.lock().await;

        if self.disposed.load(Ordering::SeqCst) {
            return self.skip("inventory disposed");
        }

        let listing = tokio::time::timeout(self.source_timeout, self.source.list_current_devices());
        let sightings = match listing.await {
            Ok(Ok(sightings)) => sightings,
            Ok(Err(e)) => {
                warn!("Skipping refresh cycle, {} unavailable: {}", self.source.source_name(), e);
                return self.skip(e.to_string());
            }
            Err(_) => {
                let e = Error::timeout(format!(
                    "listing devices from {} took longer than {:?}",
                    self.source.source_name(),
                    self.source_timeout
                ));
                warn!("Skipping refresh cycle: {}", e);
                return self.skip(e.to_string());
            }
        };

        let mut report = CycleReport::default();
        let mut seen: HashSet<String> = HashSet::with_capacity(sightings.len());
        let mut touched: Vec<(Arc<DeviceRecord>, bool)> = Vec::with_capacity(sightings.len());

        for DeviceSighting { address, handle } in sightings {
            let first_this_cycle = seen.insert(address.clone());
            let (record, superseded, is_new) = match self.devices.entry(address.clone()) {
                Entry::Occupied(entry) => {
                    let record = entry.get().clone();
                    let superseded = record.refresh(handle);
                    (record, superseded, false)
                }
                Entry::Vacant(entry) => {
                    let record = Arc::new(DeviceRecord::new(address.clone(), handle));
                    entry.insert(record.clone());
                    (record, None, true)
                }
            };

            if let Some(old) = superseded {
                dispose_handle(&address, old);
            }

            if first_this_cycle {
                debug!("Sighted {} (signal {:?})", address, record.signal_strength());
                if is_new {
                    report.added += 1;
                } else {
                    report.updated += 1;
                }
                touched.push((record, is_new));
            } else {
                trace!("Duplicate sighting of {} in one snapshot", address);
            }
        }
        report.sighted = seen.len();

        for (record, _) in &touched {
            report.notified += self.notifier.notify(record);
        }

        let stale: Vec<String> = self
            .devices
            .iter()
            .filter(|entry| !seen.contains(entry.key()))
            .map(|entry| entry.key().clone())
            .collect();

        for address in stale {
            if let Some((_, record)) = self.devices.remove(&address) {
                self.evict(&record);
                report.evicted += 1;
            }
        }

        for (record, is_new) in &touched {
            let address = record.address().to_string();
            self.emit_event(if *is_new {
                InventoryEvent::DeviceAdded { address }
            } else {
                InventoryEvent::DeviceUpdated {
                    address,
                    signal_strength: record.signal_strength(),
                }
            });
        }
        self.emit_event(InventoryEvent::CycleCompleted {
            devices: self.devices.len(),
            notified: report.notified,
        });
        debug!(
            "Refresh cycle done: {} sighted, {} added, {} updated, {} evicted, {} notifications",
            report.sighted, report.added, report.updated, report.evicted, report.notified
        );

        CycleOutcome::Completed(report)
    }

    /// Get the record for `address`, inserting an unresolved placeholder if
    /// the address is unknown
    ///
    /// Never returns "absent". The placeholder has no vendor handle and no
    /// signal, so it is not reachable; the next cycle resolves it in place if
    /// the device is sighted, or evicts it otherwise.
    pub fn get(&self, address: &str) -> Arc<DeviceRecord> {
        self.devices
            .entry(address.to_string())
            .or_insert_with(|| {
                debug!("Creating placeholder record for {}", address);
                Arc::new(DeviceRecord::placeholder(address))
            })
            .value()
            .clone()
    }

    /// Get the record for `address` without creating one
    pub fn find(&self, address: &str) -> Option<Arc<DeviceRecord>> {
        self.devices.get(address).map(|entry| entry.value().clone())
    }

    /// Known addresses, sorted
    pub fn addresses(&self) -> Vec<String> {
        let mut addresses: Vec<String> = self.devices.iter().map(|e| e.key().clone()).collect();
        addresses.sort();
        addresses
    }

    /// Serializable view of every record, sorted by address
    pub fn snapshot(&self) -> Vec<DeviceSnapshot> {
        let mut records: Vec<DeviceSnapshot> =
            self.devices.iter().map(|e| e.value().snapshot()).collect();
        records.sort_by(|a, b| a.address.cmp(&b.address));
        records
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    pub fn notifier(&self) -> &Arc<DiscoveryNotifier> {
        &self.notifier
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    /// Tear the inventory down
    ///
    /// Cancels the schedule first, waits for a cycle already in flight to
    /// finish, then evicts every record and closes the source. Calling it
    /// again is a no-op.
    pub async fn dispose(&self) {
        let scheduled = self.schedule.lock().take();
        if let Some(task) = scheduled {
            task.cancel();
        }

        if self.disposed.swap(true, Ordering::SeqCst) {
            debug!("Device inventory already disposed");
            return;
        }

        let _cycle = self.cycle_lock.lock().await;

        let addresses: Vec<String> = self.devices.iter().map(|e| e.key().clone()).collect();
        let mut evicted = 0;
        for address in addresses {
            if let Some((_, record)) = self.devices.remove(&address) {
                self.evict(&record);
                evicted += 1;
            }
        }
        self.devices.clear();

        if let Err(e) = self.source.close().await {
            warn!("Failed to close device source {}: {}", self.source.source_name(), e);
        }

        info!("Device inventory disposed ({} record(s) evicted)", evicted);
        self.emit_event(InventoryEvent::Disposed { evicted });
    }

    fn evict(&self, record: &DeviceRecord) {
        debug!("Evicting {}", record.address());
        if let Some(handle) = record.take_handle() {
            dispose_handle(record.address(), handle);
        }
        self.emit_event(InventoryEvent::DeviceEvicted {
            address: record.address().to_string(),
        });
    }

    fn skip(&self, reason: impl Into<String>) -> CycleOutcome {
        let reason = reason.into();
        self.emit_event(InventoryEvent::CycleSkipped {
            reason: reason.clone(),
        });
        CycleOutcome::Skipped { reason }
    }

    fn emit_event(&self, event: InventoryEvent) {
        match self.event_tx.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                warn!("Event channel full, dropping event. Consider increasing event_channel_capacity.");
            }
            Err(TrySendError::Closed(_)) => {
                trace!("Event receiver dropped");
            }
        }
    }
}

/// Dispose a vendor handle, logging instead of propagating failures so one
/// bad handle never stops the remaining evictions
fn dispose_handle(address: &str, mut handle: Box<dyn VendorHandle>) {
    if let Err(e) = handle.dispose() {
        let e = match e {
            Error::Dispose { .. } => e,
            other => Error::dispose(address, other.to_string()),
        };
        error!("{}", e);
    }
}

impl fmt::Debug for DeviceInventory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceInventory")
            .field("source", &self.source.source_name())
            .field("devices", &self.devices.len())
            .field("listeners", &self.notifier.listener_count())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

impl Drop for DeviceInventory {
    /// Best-effort teardown when `dispose()` was never awaited
    ///
    /// Cancels the schedule and disposes every vendor handle still held. The
    /// source cannot be closed here because `close()` is async.
    fn drop(&mut self) {
        if self.disposed.load(Ordering::SeqCst) {
            return;
        }

        if let Some(task) = self.schedule.get_mut().take() {
            task.cancel();
        }

        if !self.devices.is_empty() {
            warn!(
                "Device inventory dropped without dispose(); releasing {} vendor handle(s)",
                self.devices.len()
            );
        }
        for entry in self.devices.iter() {
            if let Some(handle) = entry.value().take_handle() {
                dispose_handle(entry.key(), handle);
            }
        }
    }
}
