// # devinvd - Device Inventory Daemon
//
// Thin integration layer around devinv-core. All reconciliation and
// notification logic lives in the library; this binary only:
// 1. Reads configuration from environment variables
// 2. Initializes logging and the runtime
// 3. Resolves the device source from the registry (once)
// 4. Starts the inventory and disposes it on SIGTERM/SIGINT
//
// ## Configuration
//
// ### Device Source
// - `DEVINV_SOURCE_TYPE`: Source type (memory, http). Default: memory
//   (nothing fills the memory source inside the daemon, so it only serves
//   smoke tests and logs a warning at startup)
// - `DEVINV_SOURCE_URL`: Device list endpoint (for http)
// - `DEVINV_SOURCE_TIMEOUT_SECS`: Per-request and per-cycle listing timeout
//
// ### Inventory
// - `DEVINV_REFRESH_INTERVAL_SECS`: Delay between refresh cycles. Default: 10
// - `DEVINV_INITIAL_DELAY_SECS`: Delay before the first cycle. Default: 0
//
// ### Logging
// - `DEVINV_LOG_LEVEL`: trace, debug, info, warn, error. Default: info
//
// ## Example
//
// ```bash
// export DEVINV_SOURCE_TYPE=http
// export DEVINV_SOURCE_URL=http://hub.local/api/devices
// export DEVINV_REFRESH_INTERVAL_SECS=10
//
// devinvd
// ```

use anyhow::{Context, Result};
use devinv_core::traits::DiscoveryListener;
use devinv_core::{
    DevinvConfig, DeviceInventory, DeviceRecord, DeviceSource, DiscoveryNotifier, InventoryConfig,
    InventoryEvent, SourceConfig, SourceRegistry, TokioScheduler,
};
use std::env;
use std::process::ExitCode;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{Level, debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// Upper bound for `dispose()` once a shutdown signal arrived
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean shutdown
/// - 1: Configuration or startup error
/// - 2: Runtime error (unexpected)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DevinvExitCode {
    /// Clean shutdown (normal exit)
    CleanShutdown = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error (unexpected failure)
    RuntimeError = 2,
}

impl From<DevinvExitCode> for ExitCode {
    fn from(code: DevinvExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Daemon configuration
#[derive(Debug)]
struct Config {
    inventory: DevinvConfig,
    log_level: String,
}

fn parse_var<T>(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    lookup(name)
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .with_context(|| format!("{} has an invalid value: '{}'", name, raw))
        })
        .transpose()
}

impl Config {
    /// Load configuration from environment variables
    fn from_env() -> Result<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let source_type = lookup("DEVINV_SOURCE_TYPE").unwrap_or_else(|| "memory".to_string());
        let source_timeout: Option<u64> = parse_var(&lookup, "DEVINV_SOURCE_TIMEOUT_SECS")?;

        let source = match source_type.to_lowercase().as_str() {
            "memory" => SourceConfig::Memory,
            "http" => SourceConfig::Http {
                url: lookup("DEVINV_SOURCE_URL").unwrap_or_default(),
                timeout_secs: source_timeout.unwrap_or(10),
            },
            other => anyhow::bail!(
                "DEVINV_SOURCE_TYPE '{}' is not supported. \
                Supported types: memory, http",
                other
            ),
        };

        let defaults = InventoryConfig::default();
        let inventory = InventoryConfig {
            refresh_interval_secs: parse_var(&lookup, "DEVINV_REFRESH_INTERVAL_SECS")?
                .unwrap_or(defaults.refresh_interval_secs),
            initial_delay_secs: parse_var(&lookup, "DEVINV_INITIAL_DELAY_SECS")?
                .unwrap_or(defaults.initial_delay_secs),
            source_timeout_secs: source_timeout.unwrap_or(defaults.source_timeout_secs),
            ..defaults
        };

        Ok(Self {
            inventory: DevinvConfig { source, inventory },
            log_level: lookup("DEVINV_LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
        })
    }

    /// Validate the configuration
    fn validate(&self) -> Result<()> {
        if let SourceConfig::Http { url, .. } = &self.inventory.source
            && url.is_empty()
        {
            anyhow::bail!("DEVINV_SOURCE_URL is required when DEVINV_SOURCE_TYPE=http");
        }

        self.inventory.validate()?;

        if self.inventory.inventory.refresh_interval_secs > 3600 {
            anyhow::bail!(
                "DEVINV_REFRESH_INTERVAL_SECS must be between 1 and 3600 seconds. Got: {}",
                self.inventory.inventory.refresh_interval_secs
            );
        }

        self.log_level()?;
        Ok(())
    }

    /// Settings that are valid but probably not what the operator wants
    fn warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        if matches!(self.inventory.source, SourceConfig::Memory) {
            warnings.push(
                "Memory device source selected; nothing feeds it in devinvd, so the \
                inventory stays empty. Set DEVINV_SOURCE_TYPE=http for a real source"
                    .to_string(),
            );
        }
        warnings
    }

    fn log_level(&self) -> Result<Level> {
        match self.log_level.to_lowercase().as_str() {
            "trace" => Ok(Level::TRACE),
            "debug" => Ok(Level::DEBUG),
            "info" => Ok(Level::INFO),
            "warn" => Ok(Level::WARN),
            "error" => Ok(Level::ERROR),
            _ => anyhow::bail!(
                "DEVINV_LOG_LEVEL '{}' is not valid. \
                Valid levels: trace, debug, info, warn, error",
                self.log_level
            ),
        }
    }
}

/// Logs every discovery notification
struct LoggingListener;

impl DiscoveryListener for LoggingListener {
    fn device_discovered(&self, record: &DeviceRecord) {
        info!(
            "Device {} reachable (rssi={:?})",
            record.address(),
            record.signal_strength()
        );
    }
}

fn build_registry() -> SourceRegistry {
    let registry = SourceRegistry::with_builtin_sources();

    #[cfg(feature = "http")]
    {
        info!("Registering HTTP device source");
        devinv_source_http::register(&registry);
    }

    registry
}

fn main() -> ExitCode {
    // Load configuration from environment
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {:#}", e);
            return DevinvExitCode::ConfigError.into();
        }
    };

    // Validate configuration
    if let Err(e) = config.validate() {
        eprintln!("Configuration validation error: {:#}", e);
        return DevinvExitCode::ConfigError.into();
    }

    // Initialize tracing
    let log_level = config.log_level().unwrap_or(Level::INFO);
    let subscriber = FmtSubscriber::builder().with_max_level(log_level).finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return DevinvExitCode::ConfigError.into();
    }

    info!("Starting devinvd daemon");
    for warning in config.warnings() {
        warn!("{}", warning);
    }

    // Resolve the device source once; it is never re-switched afterwards
    let registry = build_registry();
    info!("Available device sources: {}", registry.list_sources().join(", "));
    let source = match registry.create_source(&config.inventory.source) {
        Ok(source) => source,
        Err(e) => {
            error!("Failed to create device source: {}", e);
            return DevinvExitCode::ConfigError.into();
        }
    };

    // Enter tokio runtime
    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return DevinvExitCode::RuntimeError.into();
        }
    };

    let result = rt.block_on(run_daemon(source, config.inventory.inventory));
    result.into()
}

/// Run the daemon until a shutdown signal arrives
async fn run_daemon(source: Box<dyn DeviceSource>, config: InventoryConfig) -> DevinvExitCode {
    let notifier = Arc::new(DiscoveryNotifier::new());
    notifier.add_listener(Arc::new(LoggingListener));

    let scheduler = TokioScheduler::new();
    let (inventory, events) = match DeviceInventory::start(source, notifier, &scheduler, config).await
    {
        Ok(started) => started,
        Err(e) => {
            error!("Failed to start device inventory: {}", e);
            return DevinvExitCode::ConfigError;
        }
    };

    let monitor = tokio::spawn(log_events(events));
    info!("Daemon initialized successfully");

    let exit = match wait_for_shutdown().await {
        Ok(signal) => {
            info!("Received shutdown signal: {}", signal);
            DevinvExitCode::CleanShutdown
        }
        Err(e) => {
            error!("Shutdown error: {:#}", e);
            DevinvExitCode::RuntimeError
        }
    };

    info!("Shutting down daemon");
    if tokio::time::timeout(SHUTDOWN_TIMEOUT, inventory.dispose())
        .await
        .is_err()
    {
        error!("Device inventory did not dispose within {:?}", SHUTDOWN_TIMEOUT);
        return DevinvExitCode::RuntimeError;
    }

    drop(inventory);
    monitor.abort();
    exit
}

/// Log inventory monitoring events until the inventory is gone
async fn log_events(mut events: mpsc::Receiver<InventoryEvent>) {
    while let Some(event) = events.recv().await {
        match event {
            InventoryEvent::Started { refresh_interval } => {
                info!("Inventory refreshing every {:?}", refresh_interval)
            }
            InventoryEvent::DeviceAdded { address } => info!("Device {} added", address),
            InventoryEvent::DeviceUpdated {
                address,
                signal_strength,
            } => debug!("Device {} updated (rssi={:?})", address, signal_strength),
            InventoryEvent::DeviceEvicted { address } => info!("Device {} evicted", address),
            InventoryEvent::CycleCompleted { devices, notified } => {
                debug!("Cycle completed: {} device(s), {} notification(s)", devices, notified)
            }
            InventoryEvent::CycleSkipped { reason } => warn!("Cycle skipped: {}", reason),
            InventoryEvent::Disposed { evicted } => {
                info!("Inventory disposed, {} device(s) released", evicted)
            }
        }
    }
}

/// Wait for shutdown signals (SIGTERM, SIGINT)
///
/// # Returns
///
/// Returns the name of the signal received.
#[cfg(unix)]
async fn wait_for_shutdown() -> Result<&'static str> {
    let mut sigterm =
        signal(SignalKind::terminate()).context("Failed to setup SIGTERM handler")?;
    let mut sigint = signal(SignalKind::interrupt()).context("Failed to setup SIGINT handler")?;

    let name = tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    };
    Ok(name)
}

/// Wait for shutdown signals (SIGINT only)
///
/// Fallback implementation for non-Unix platforms.
#[cfg(not(unix))]
async fn wait_for_shutdown() -> Result<&'static str> {
    tokio::signal::ctrl_c()
        .await
        .context("Failed to wait for CTRL-C")?;
    Ok("SIGINT")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(move |name| vars.get(name).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[]).unwrap();

        assert!(matches!(config.inventory.source, SourceConfig::Memory));
        assert_eq!(config.inventory.inventory.refresh_interval_secs, 10);
        assert_eq!(config.log_level().unwrap(), Level::INFO);
        assert!(config.validate().is_ok());
        assert_eq!(config.warnings().len(), 1);
        assert!(config.warnings()[0].contains("DEVINV_SOURCE_TYPE=http"));
    }

    #[test]
    fn test_only_memory_source_warns() {
        let memory = config_from(&[("DEVINV_SOURCE_TYPE", "MEMORY")]).unwrap();
        assert_eq!(memory.warnings().len(), 1);

        let http = config_from(&[
            ("DEVINV_SOURCE_TYPE", "http"),
            ("DEVINV_SOURCE_URL", "http://hub.local/api/devices"),
        ])
        .unwrap();
        assert!(http.warnings().is_empty());
    }

    #[test]
    fn test_http_source_from_env() {
        let config = config_from(&[
            ("DEVINV_SOURCE_TYPE", "http"),
            ("DEVINV_SOURCE_URL", "http://hub.local/api/devices"),
            ("DEVINV_SOURCE_TIMEOUT_SECS", "4"),
            ("DEVINV_REFRESH_INTERVAL_SECS", "30"),
        ])
        .unwrap();

        match &config.inventory.source {
            SourceConfig::Http { url, timeout_secs } => {
                assert_eq!(url, "http://hub.local/api/devices");
                assert_eq!(*timeout_secs, 4);
            }
            other => panic!("expected http source, got {:?}", other),
        }
        assert_eq!(config.inventory.inventory.source_timeout_secs, 4);
        assert_eq!(config.inventory.inventory.refresh_interval_secs, 30);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_http_source_requires_url() {
        let config = config_from(&[("DEVINV_SOURCE_TYPE", "http")]).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(config_from(&[("DEVINV_REFRESH_INTERVAL_SECS", "soon")]).is_err());
        assert!(config_from(&[("DEVINV_SOURCE_TYPE", "bluetooth")]).is_err());

        let config = config_from(&[("DEVINV_REFRESH_INTERVAL_SECS", "0")]).unwrap();
        assert!(config.validate().is_err());

        let config = config_from(&[("DEVINV_LOG_LEVEL", "loud")]).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(DevinvExitCode::CleanShutdown as u8, 0);
        assert_eq!(DevinvExitCode::ConfigError as u8, 1);
        assert_eq!(DevinvExitCode::RuntimeError as u8, 2);
    }
}
