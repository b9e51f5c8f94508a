//! Test doubles and common utilities for inventory contract tests
//!
//! This module provides minimal test doubles that make the inventory's
//! collaborators observable without any vendor stack.

#![allow(dead_code)]

use devinv_core::error::{Error, Result};
use devinv_core::traits::{
    DeviceSighting, DeviceSource, DiscoveryListener, PeriodicTask, ScheduledTask, Scheduler,
    VendorHandle,
};
use devinv_core::{DeviceRecord, InventoryConfig};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// What the next listing returns
#[derive(Debug, Clone)]
enum Listing {
    Devices(Vec<(String, Option<i16>)>),
    Unavailable,
}

/// Bookkeeping for one handle handed out by [`ScriptedSource`]
#[derive(Debug, Clone)]
pub struct HandleTracker {
    pub id: usize,
    pub address: String,
    dispose_count: Arc<AtomicUsize>,
    listings_at_dispose: Arc<Mutex<Option<usize>>>,
}

impl HandleTracker {
    pub fn dispose_count(&self) -> usize {
        self.dispose_count.load(Ordering::SeqCst)
    }

    /// How many listings the source had started when this handle was
    /// last disposed
    pub fn listings_at_dispose(&self) -> Option<usize> {
        *self.listings_at_dispose.lock().unwrap()
    }
}

#[derive(Debug)]
struct ScriptState {
    listing: Listing,
    delay: Option<Duration>,
    fail_open: bool,
    failing_dispose: Vec<String>,
    handles: Vec<HandleTracker>,
}

/// A DeviceSource whose next snapshot is set by the test
#[derive(Clone)]
pub struct ScriptedSource {
    state: Arc<Mutex<ScriptState>>,
    open_count: Arc<AtomicUsize>,
    close_count: Arc<AtomicUsize>,
    list_count: Arc<AtomicUsize>,
    listings_in_flight: Arc<AtomicUsize>,
    max_listings_in_flight: Arc<AtomicUsize>,
}

/// Decrements the in-flight counter even when a listing is cancelled by a timeout
struct InFlight(Arc<AtomicUsize>);

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(ScriptState {
                listing: Listing::Devices(Vec::new()),
                delay: None,
                fail_open: false,
                failing_dispose: Vec::new(),
                handles: Vec::new(),
            })),
            open_count: Arc::new(AtomicUsize::new(0)),
            close_count: Arc::new(AtomicUsize::new(0)),
            list_count: Arc::new(AtomicUsize::new(0)),
            listings_in_flight: Arc::new(AtomicUsize::new(0)),
            max_listings_in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// A source whose `open()` fails
    pub fn failing_open() -> Self {
        let source = Self::new();
        source.state.lock().unwrap().fail_open = true;
        source
    }

    /// Set the devices returned by subsequent listings
    pub fn set_snapshot(&self, devices: &[(&str, Option<i16>)]) {
        self.state.lock().unwrap().listing = Listing::Devices(
            devices
                .iter()
                .map(|(address, signal)| (address.to_string(), *signal))
                .collect(),
        );
    }

    /// Make subsequent listings fail with `SourceUnavailable`
    pub fn set_unavailable(&self) {
        self.state.lock().unwrap().listing = Listing::Unavailable;
    }

    /// Delay every listing (to simulate a slow or hung stack)
    pub fn set_delay(&self, delay: Duration) {
        self.state.lock().unwrap().delay = Some(delay);
    }

    /// Make handles for `address` fail to dispose
    pub fn fail_dispose_for(&self, address: &str) {
        self.state
            .lock()
            .unwrap()
            .failing_dispose
            .push(address.to_string());
    }

    /// All handles ever handed out for `address`, oldest first
    pub fn handles_for(&self, address: &str) -> Vec<HandleTracker> {
        self.state
            .lock()
            .unwrap()
            .handles
            .iter()
            .filter(|h| h.address == address)
            .cloned()
            .collect()
    }

    /// Handles that were disposed more than once (must always be empty)
    pub fn double_disposed(&self) -> Vec<HandleTracker> {
        self.state
            .lock()
            .unwrap()
            .handles
            .iter()
            .filter(|h| h.dispose_count() > 1)
            .cloned()
            .collect()
    }

    pub fn open_count(&self) -> usize {
        self.open_count.load(Ordering::SeqCst)
    }

    pub fn close_count(&self) -> usize {
        self.close_count.load(Ordering::SeqCst)
    }

    pub fn list_count(&self) -> usize {
        self.list_count.load(Ordering::SeqCst)
    }

    /// Highest number of listings that were running at the same time
    pub fn max_listings_in_flight(&self) -> usize {
        self.max_listings_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl DeviceSource for ScriptedSource {
    async fn open(&self) -> Result<()> {
        self.open_count.fetch_add(1, Ordering::SeqCst);
        if self.state.lock().unwrap().fail_open {
            return Err(Error::source_unavailable("adapter not powered"));
        }
        Ok(())
    }

    async fn list_current_devices(&self) -> Result<Vec<DeviceSighting>> {
        self.list_count.fetch_add(1, Ordering::SeqCst);
        let running = self.listings_in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_listings_in_flight.fetch_max(running, Ordering::SeqCst);
        let _in_flight = InFlight(self.listings_in_flight.clone());

        let delay = self.state.lock().unwrap().delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state.lock().unwrap();
        let devices = match &state.listing {
            Listing::Devices(devices) => devices.clone(),
            Listing::Unavailable => {
                return Err(Error::source_unavailable("stack not running"));
            }
        };

        let mut sightings = Vec::with_capacity(devices.len());
        for (address, signal) in devices {
            let tracker = HandleTracker {
                id: state.handles.len(),
                address: address.clone(),
                dispose_count: Arc::new(AtomicUsize::new(0)),
                listings_at_dispose: Arc::new(Mutex::new(None)),
            };
            let handle = CountingHandle {
                signal,
                fail_dispose: state.failing_dispose.contains(&address),
                dispose_count: tracker.dispose_count.clone(),
                listings: self.list_count.clone(),
                listings_at_dispose: tracker.listings_at_dispose.clone(),
            };
            state.handles.push(tracker);
            sightings.push(DeviceSighting::new(address, Box::new(handle)));
        }

        Ok(sightings)
    }

    async fn close(&self) -> Result<()> {
        self.close_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn source_name(&self) -> &'static str {
        "scripted"
    }
}

/// A vendor handle that counts disposals
pub struct CountingHandle {
    signal: Option<i16>,
    fail_dispose: bool,
    dispose_count: Arc<AtomicUsize>,
    listings: Arc<AtomicUsize>,
    listings_at_dispose: Arc<Mutex<Option<usize>>>,
}

impl VendorHandle for CountingHandle {
    fn signal_strength(&self) -> Option<i16> {
        self.signal
    }

    fn dispose(&mut self) -> Result<()> {
        self.dispose_count.fetch_add(1, Ordering::SeqCst);
        *self.listings_at_dispose.lock().unwrap() = Some(self.listings.load(Ordering::SeqCst));
        if self.fail_dispose {
            return Err(Error::Other("device busy".to_string()));
        }
        Ok(())
    }
}

/// A listener that records every address it was told about
#[derive(Default)]
pub struct RecordingListener {
    seen: Mutex<Vec<String>>,
}

impl RecordingListener {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> usize {
        self.seen.lock().unwrap().len()
    }

    pub fn calls_for(&self, address: &str) -> usize {
        self.seen
            .lock()
            .unwrap()
            .iter()
            .filter(|a| a.as_str() == address)
            .count()
    }

    pub fn reset(&self) {
        self.seen.lock().unwrap().clear();
    }
}

impl DiscoveryListener for RecordingListener {
    fn device_discovered(&self, record: &DeviceRecord) {
        self.seen.lock().unwrap().push(record.address().to_string());
    }
}

/// Shared cancellation flag behind [`ManualScheduler`] handles
pub struct ManualTask {
    cancelled: Arc<AtomicBool>,
}

impl ScheduledTask for ManualTask {
    fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// A scheduler that only runs the task when the test calls `tick()`
#[derive(Clone, Default)]
pub struct ManualScheduler {
    task: Arc<Mutex<Option<PeriodicTask>>>,
    cancelled: Arc<AtomicBool>,
    schedule_calls: Arc<Mutex<Vec<(Duration, Duration)>>>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run the scheduled task once, as the real scheduler would
    ///
    /// Returns `false` (without running anything) if the schedule was cancelled.
    pub async fn tick(&self) -> bool {
        if self.is_cancelled() {
            return false;
        }
        let task = self.task.lock().unwrap().clone();
        match task {
            Some(task) => {
                task().await;
                true
            }
            None => false,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// `(initial_delay, period)` of every schedule request
    pub fn schedule_calls(&self) -> Vec<(Duration, Duration)> {
        self.schedule_calls.lock().unwrap().clone()
    }
}

impl Scheduler for ManualScheduler {
    fn schedule_with_fixed_delay(
        &self,
        task: PeriodicTask,
        initial_delay: Duration,
        period: Duration,
    ) -> Result<Box<dyn ScheduledTask>> {
        *self.task.lock().unwrap() = Some(task);
        self.schedule_calls
            .lock()
            .unwrap()
            .push((initial_delay, period));
        Ok(Box::new(ManualTask {
            cancelled: self.cancelled.clone(),
        }))
    }
}

/// A scheduler that refuses every request
pub struct RejectingScheduler;

impl Scheduler for RejectingScheduler {
    fn schedule_with_fixed_delay(
        &self,
        _task: PeriodicTask,
        _initial_delay: Duration,
        _period: Duration,
    ) -> Result<Box<dyn ScheduledTask>> {
        Err(Error::scheduler("executor shut down"))
    }
}

/// Helper to create an InventoryConfig for testing
pub fn test_config() -> InventoryConfig {
    InventoryConfig {
        refresh_interval_secs: 10,
        initial_delay_secs: 0,
        source_timeout_secs: 5,
        event_channel_capacity: 100,
    }
}
