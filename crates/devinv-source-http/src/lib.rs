// # HTTP Device Source
//
// This crate provides a `DeviceSource` for vendors that expose their device
// list over a REST endpoint (cloud bridges, hub appliances).
//
// ## Wire Format
//
// `GET <url>` must answer `2xx` with either a bare JSON array or an object
// wrapping it:
//
// ```json
// [{ "address": "AA:BB:CC:DD:EE:FF", "rssi": -61 }]
// { "devices": [{ "address": "AA:BB:CC:DD:EE:FF", "rssi": -61 }] }
// ```
//
// `rssi` may be missing or null when the bridge has no reading.
//
// ## Failure Mapping
//
// - `open()` issues one initial request; any failure is `SourceInit`
// - During cycles, transport errors, non-2xx answers and malformed bodies are
//   `SourceUnavailable`, so the inventory skips the cycle and keeps its state

use devinv_core::SourceRegistry;
use devinv_core::config::SourceConfig;
use devinv_core::traits::{DeviceSighting, DeviceSource, DeviceSourceFactory, VendorHandle};
use devinv_core::{Error, Result};

use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info, trace};

/// One entry of the vendor's device list
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DeviceEntry {
    pub address: String,
    #[serde(default)]
    pub rssi: Option<i16>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum DeviceListBody {
    Bare(Vec<DeviceEntry>),
    Wrapped { devices: Vec<DeviceEntry> },
}

/// Parse a device list response body
///
/// Entries with an empty address are dropped.
pub fn parse_device_list(body: &str) -> Result<Vec<DeviceEntry>> {
    let parsed: DeviceListBody = serde_json::from_str(body)
        .map_err(|e| Error::source_unavailable(format!("Malformed device list: {}", e)))?;

    let entries = match parsed {
        DeviceListBody::Bare(entries) => entries,
        DeviceListBody::Wrapped { devices } => devices,
    };

    Ok(entries
        .into_iter()
        .filter(|entry| !entry.address.trim().is_empty())
        .collect())
}

/// Device source backed by a vendor REST endpoint
pub struct HttpDeviceSource {
    /// Device list endpoint
    url: String,

    /// HTTP client (carries the request timeout)
    client: reqwest::Client,
}

impl HttpDeviceSource {
    /// Create a new HTTP device source
    ///
    /// # Parameters
    ///
    /// - `url`: Device list endpoint (e.g., "http://hub.local/api/devices")
    /// - `timeout`: Per-request timeout
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::http(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            url: url.into(),
            client,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Fetch and parse the current device list
    async fn fetch_devices(&self) -> Result<Vec<DeviceEntry>> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| Error::source_unavailable(format!("Request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::source_unavailable(format!(
                "{} answered {}",
                self.url, status
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| Error::source_unavailable(format!("Failed to read response: {}", e)))?;

        parse_device_list(&body)
    }
}

#[async_trait::async_trait]
impl DeviceSource for HttpDeviceSource {
    async fn open(&self) -> Result<()> {
        let devices = self
            .fetch_devices()
            .await
            .map_err(|e| Error::source_init(format!("Initial request to {} failed: {}", self.url, e)))?;

        info!(
            "HTTP device source ready (url={}, {} device(s) visible)",
            self.url,
            devices.len()
        );
        Ok(())
    }

    async fn list_current_devices(&self) -> Result<Vec<DeviceSighting>> {
        let devices = self.fetch_devices().await?;
        debug!("Fetched {} device(s) from {}", devices.len(), self.url);

        Ok(devices
            .into_iter()
            .map(|entry| {
                let handle = HttpDeviceHandle {
                    address: entry.address.clone(),
                    rssi: entry.rssi,
                };
                DeviceSighting::new(entry.address, Box::new(handle))
            })
            .collect())
    }

    fn source_name(&self) -> &'static str {
        "http"
    }
}

/// Per-device handle for a REST-listed device
///
/// The endpoint holds no per-device session, so disposal only releases the
/// local reading.
#[derive(Debug)]
pub struct HttpDeviceHandle {
    address: String,
    rssi: Option<i16>,
}

impl VendorHandle for HttpDeviceHandle {
    fn signal_strength(&self) -> Option<i16> {
        self.rssi
    }

    fn dispose(&mut self) -> Result<()> {
        trace!("Released HTTP device handle for {}", self.address);
        self.rssi = None;
        Ok(())
    }
}

/// Factory for creating HTTP device sources
pub struct HttpDeviceSourceFactory;

impl DeviceSourceFactory for HttpDeviceSourceFactory {
    fn create(&self, config: &SourceConfig) -> Result<Box<dyn DeviceSource>> {
        match config {
            SourceConfig::Http { url, timeout_secs } => Ok(Box::new(HttpDeviceSource::new(
                url.clone(),
                Duration::from_secs(*timeout_secs),
            )?)),
            _ => Err(Error::config("Invalid config for HTTP device source")),
        }
    }
}

/// Register the HTTP device source with a registry
pub fn register(registry: &SourceRegistry) {
    registry.register_source("http", Box::new(HttpDeviceSourceFactory));
}
