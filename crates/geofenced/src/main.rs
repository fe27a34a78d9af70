// # geofenced - Geofence Bridge Daemon
//
// Thin integration layer over geofence-core. Registry, persistence and
// transition logic all live in the core crate; this binary only wires the
// pieces together and moves bytes.
//
// The geofenced daemon is responsible for:
// 1. Reading configuration from environment variables
// 2. Constructing the region store, provider, notification policy,
//    coordinator and transition handler
// 3. Re-arming stored regions once at startup
// 4. Serving the call bridge over stdin/stdout
//
// ## Protocol
//
// Input is newline-delimited JSON on stdin. Each line is either a method call
//
//   {"method": "registerGeofence", "arguments": {"id": "home", "lat": 37.0, "lng": -122.0, "radiusMeters": 100}}
//
// or a transition notification to inject into the local provider
//
//   {"event": {"transition": 1, "regionIds": ["home"]}}
//
// Every method call produces exactly one response line on stdout, in order.
// Logs go to stderr.
//
// ## Configuration
//
// - `GEOFENCE_STORE_TYPE`: Type of region store (file, memory)
// - `GEOFENCE_STORE_PATH`: Path to the storage slot (for file store)
// - `GEOFENCE_PROVIDER_TIMEOUT_SECS`: Upper bound on provider calls (0 = none)
// - `GEOFENCE_POLICY_ACCESS`: Whether notification policy access is granted
// - `GEOFENCE_LOG_LEVEL`: trace, debug, info, warn, error
//
// ## Example
//
// ```bash
// export GEOFENCE_STORE_PATH=/var/lib/geofence/saved_geofences.json
// echo '{"method":"getStoredGeofences"}' | geofenced
// ```

use anyhow::{Context, Result};
use geofence_core::bridge::RawMethodCall;
use geofence_core::config::DEFAULT_STORE_FILE;
use geofence_core::provider::TransitionSender;
use geofence_core::traits::{RegionStore, TransitionNotification};
use geofence_core::{
    CallBridge, CoordinatorConfig, FileRegionStore, GeofenceConfig, LocalGeofenceProvider,
    LocalNotificationPolicy, MemoryRegionStore, RegistryCoordinator, StoreConfig, TransitionHandler,
};
use serde::Deserialize;
use std::env;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::oneshot;
use tracing::{Level, debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean shutdown
/// - 1: Configuration or startup error
/// - 2: Runtime error (unexpected)
#[derive(Debug, Clone, Copy)]
enum GeofenceExitCode {
    /// Clean shutdown (EOF or signal)
    CleanShutdown = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error (unexpected failure)
    RuntimeError = 2,
}

impl From<GeofenceExitCode> for ExitCode {
    fn from(code: GeofenceExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Application configuration
struct Config {
    geofence: GeofenceConfig,
    policy_access: bool,
    log_level: String,
}

impl Config {
    /// Load configuration from environment variables
    fn from_env() -> Result<Self> {
        let store = match env::var("GEOFENCE_STORE_TYPE")
            .unwrap_or_else(|_| "file".to_string())
            .as_str()
        {
            "file" => StoreConfig::File {
                path: env::var("GEOFENCE_STORE_PATH")
                    .unwrap_or_else(|_| format!("./{}", DEFAULT_STORE_FILE)),
            },
            "memory" => StoreConfig::Memory,
            other => anyhow::bail!(
                "GEOFENCE_STORE_TYPE '{}' is not supported. \
                Supported types: file, memory",
                other
            ),
        };

        let provider_timeout_secs = match env::var("GEOFENCE_PROVIDER_TIMEOUT_SECS") {
            Ok(raw) => raw.trim().parse().with_context(|| {
                format!(
                    "GEOFENCE_PROVIDER_TIMEOUT_SECS must be a whole number of seconds. Got: {}",
                    raw
                )
            })?,
            Err(_) => 0,
        };

        let policy_access = match env::var("GEOFENCE_POLICY_ACCESS") {
            Ok(raw) => match raw.trim().to_lowercase().as_str() {
                "true" | "1" => true,
                "false" | "0" => false,
                _ => anyhow::bail!(
                    "GEOFENCE_POLICY_ACCESS must be true or false. Got: {}",
                    raw
                ),
            },
            Err(_) => true,
        };

        Ok(Self {
            geofence: GeofenceConfig {
                store,
                coordinator: CoordinatorConfig {
                    provider_timeout_secs,
                    ..CoordinatorConfig::default()
                },
            },
            policy_access,
            log_level: env::var("GEOFENCE_LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
        })
    }

    /// Validate the configuration
    fn validate(&self) -> Result<()> {
        self.geofence.validate()?;

        if let StoreConfig::File { path } = &self.geofence.store
            && let Some(parent) = std::path::Path::new(path).parent()
            && !parent.as_os_str().is_empty()
            && parent.is_file()
        {
            anyhow::bail!(
                "GEOFENCE_STORE_PATH parent is a file, not a directory: {}",
                parent.display()
            );
        }

        match self.log_level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => anyhow::bail!(
                "GEOFENCE_LOG_LEVEL '{}' is not valid. \
                Valid levels: trace, debug, info, warn, error",
                self.log_level
            ),
        }

        Ok(())
    }
}

/// One line of daemon input
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum InputLine {
    /// Transition notification for the local provider
    Transition { event: TransitionNotification },
    /// Call bridge method call
    Call(RawMethodCall),
}

/// Everything the serve loop needs
struct Daemon {
    bridge: CallBridge,
    transitions: TransitionSender,
    handler_shutdown: oneshot::Sender<()>,
    handler_task: tokio::task::JoinHandle<usize>,
}

fn main() -> ExitCode {
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {:#}", e);
            return GeofenceExitCode::ConfigError.into();
        }
    };

    if let Err(e) = config.validate() {
        eprintln!("Configuration validation error: {:#}", e);
        return GeofenceExitCode::ConfigError.into();
    }

    let log_level = match config.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return GeofenceExitCode::ConfigError.into();
    }

    info!("Starting geofenced daemon");
    info!("Region store type: {}", config.geofence.store.type_name());

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return GeofenceExitCode::RuntimeError.into();
        }
    };

    let result = rt.block_on(async {
        let daemon = match start_daemon(config).await {
            Ok(daemon) => daemon,
            Err(e) => {
                error!("Startup error: {:#}", e);
                return GeofenceExitCode::ConfigError;
            }
        };

        match serve(daemon).await {
            Ok(()) => GeofenceExitCode::CleanShutdown,
            Err(e) => {
                error!("Daemon error: {:#}", e);
                GeofenceExitCode::RuntimeError
            }
        }
    });

    result.into()
}

/// Build the registry, re-arm stored regions and start the transition handler
async fn start_daemon(config: Config) -> Result<Daemon> {
    let store: Box<dyn RegionStore> = match &config.geofence.store {
        StoreConfig::File { path } => Box::new(
            FileRegionStore::new(path)
                .await
                .with_context(|| format!("Failed to open region store at {}", path))?,
        ),
        StoreConfig::Memory => Box::new(MemoryRegionStore::new()),
    };

    let (provider, transitions) = LocalGeofenceProvider::new();
    let (coordinator, mut registry_events) = RegistryCoordinator::new(
        Box::new(provider),
        store,
        config.geofence.coordinator.clone(),
    )?;
    let coordinator = Arc::new(coordinator);

    tokio::spawn(async move {
        while let Some(event) = registry_events.recv().await {
            debug!("Registry event: {:?}", event);
        }
    });

    // The coordinator logs the outcome itself
    let outcome = coordinator.resynchronize().await;
    debug!("Startup resynchronize: {:?}", outcome);

    if !config.policy_access {
        warn!("Notification policy access not granted; transitions will not change the filter");
    }
    let handler = TransitionHandler::new(Box::new(LocalNotificationPolicy::new(
        config.policy_access,
    )));
    let stream = coordinator.transitions();
    let (handler_shutdown, shutdown_rx) = oneshot::channel();
    let handler_task =
        tokio::spawn(async move { handler.run_with_shutdown(stream, shutdown_rx).await });

    Ok(Daemon {
        bridge: CallBridge::new(coordinator),
        transitions,
        handler_shutdown,
        handler_task,
    })
}

/// Serve stdin until EOF or a shutdown signal
async fn serve(daemon: Daemon) -> Result<()> {
    let Daemon {
        bridge,
        transitions,
        handler_shutdown,
        handler_task,
    } = daemon;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    let shutdown = wait_for_shutdown();
    tokio::pin!(shutdown);

    info!("Ready to serve geofence calls on stdin");

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("Failed to read stdin")? else {
                    info!("Input closed, shutting down");
                    break;
                };
                if line.trim().is_empty() {
                    continue;
                }
                if let Some(response) = handle_line(&bridge, &transitions, &line).await {
                    let mut encoded = serde_json::to_string(&response)
                        .context("Failed to encode response")?;
                    encoded.push('\n');
                    stdout
                        .write_all(encoded.as_bytes())
                        .await
                        .context("Failed to write response")?;
                    stdout.flush().await.context("Failed to flush stdout")?;
                }
            }

            signal = &mut shutdown => {
                info!("Received shutdown signal: {}", signal?);
                break;
            }
        }
    }

    let _ = handler_shutdown.send(());
    let handled = handler_task
        .await
        .context("Transition handler task failed")?;
    info!("Transition handler stopped after {} event(s)", handled);

    Ok(())
}

/// Dispatch one input line
///
/// Returns the response to write, or `None` for injected transitions.
async fn handle_line(
    bridge: &CallBridge,
    transitions: &TransitionSender,
    line: &str,
) -> Option<geofence_core::MethodResponse> {
    match serde_json::from_str::<InputLine>(line) {
        Ok(InputLine::Call(call)) => Some(bridge.handle_raw(call).await),
        Ok(InputLine::Transition { event }) => {
            if !transitions.deliver(event) {
                warn!("Transition handler is not running; notification dropped");
            }
            None
        }
        // Not a recognizable line; let the bridge report the decode error.
        Err(_) => Some(bridge.handle_json(line).await),
    }
}

/// Wait for shutdown signals (SIGTERM, SIGINT)
///
/// # Returns
///
/// Returns the name of the signal received.
#[cfg(unix)]
async fn wait_for_shutdown() -> Result<&'static str> {
    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGINT handler: {}", e))?;

    let signal = tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    };
    Ok(signal)
}

/// Wait for shutdown signals (SIGINT only)
///
/// Fallback implementation for non-Unix platforms.
#[cfg(not(unix))]
async fn wait_for_shutdown() -> Result<&'static str> {
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to wait for CTRL-C: {}", e))?;
    Ok("SIGINT")
}
