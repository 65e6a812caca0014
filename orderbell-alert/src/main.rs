//! OrderBell Alert Service (orderbell-alert) - Main entry point
//!
//! Wires the settings bridge, playback engine and arrival coordinator
//! together and serves the HTTP control surface.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use orderbell_alert::api::{self, AppContext};
use orderbell_alert::arrival::ArrivalCoordinator;
use orderbell_alert::config::{Config, CoordinatorConfig, PlaybackTimings, DEFAULT_PORT};
use orderbell_alert::control::{AlertControl, EventAlertCallback};
use orderbell_alert::db::{SqliteOrderRepository, SqliteSettingsStore};
use orderbell_alert::device::{SimulatedDevice, SimulatedDeviceConfig};
use orderbell_alert::playback::resources::SoundCatalog;
use orderbell_alert::playback::AlertPlaybackEngine;
use orderbell_alert::settings::AlertSettings;
use orderbell_alert::SharedState;
use orderbell_common::config::{database_path, resolve_root_folder, TomlConfig};
use orderbell_common::time::millis_to_duration;
use tokio::signal;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Arrival channel depth
const ARRIVAL_CHANNEL_CAPACITY: usize = 256;

/// Command-line arguments for orderbell-alert
#[derive(Parser, Debug)]
#[command(name = "orderbell-alert")]
#[command(about = "Order alert delivery service for OrderBell")]
#[command(version)]
struct Args {
    /// Port to listen on
    #[arg(short, long, env = "ORDERBELL_PORT")]
    port: Option<u16>,

    /// Root folder holding orderbell.db (ORDERBELL_ROOT_FOLDER also honored)
    #[arg(short, long)]
    root_folder: Option<String>,

    /// Arrivals within this many ms after start are never alerted
    #[arg(long)]
    startup_quiet_ms: Option<u64>,

    /// Batching window for arrivals
    #[arg(long)]
    batch_delay_ms: Option<u64>,

    /// Log filter used when RUST_LOG is unset
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let toml_config = TomlConfig::load_default();

    // Initialize tracing
    let default_filter = args
        .log_level
        .clone()
        .or_else(|| toml_config.log_level.clone())
        .unwrap_or_else(|| "orderbell_alert=debug,orderbell_common=info,tower_http=debug".into());
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let root_folder =
        resolve_root_folder(args.root_folder.as_deref(), "ORDERBELL_ROOT_FOLDER", &toml_config);
    let port = args.port.or(toml_config.port).unwrap_or(DEFAULT_PORT);

    let mut coordinator_config = CoordinatorConfig::default();
    if let Some(ms) = args.startup_quiet_ms.or(toml_config.startup_quiet_ms) {
        coordinator_config.startup_quiet = millis_to_duration(ms);
    }
    if let Some(ms) = args.batch_delay_ms.or(toml_config.batch_delay_ms) {
        coordinator_config.batch_delay = millis_to_duration(ms);
    }

    let config = Config {
        db_path: database_path(&root_folder),
        root_folder,
        bind_addr: format!("0.0.0.0:{}", port),
        playback: PlaybackTimings::default(),
        coordinator: coordinator_config,
    };

    info!("Starting OrderBell alert service on port {}", port);
    info!("Root folder: {}", config.root_folder.display());

    // Database
    let db = orderbell_common::db::init_database(&config.db_path)
        .await
        .with_context(|| format!("Failed to open database {}", config.db_path.display()))?;
    info!("Database ready: {}", config.db_path.display());

    // Services
    let state = Arc::new(SharedState::new());
    let settings = Arc::new(AlertSettings::load(Arc::new(SqliteSettingsStore::new(db.clone()))).await);

    let device = Arc::new(SimulatedDevice::new(SimulatedDeviceConfig::default()));
    let engine = AlertPlaybackEngine::new(
        device,
        settings.subscribe(),
        SoundCatalog::default(),
        config.playback,
        state.clone(),
    );

    let orders = Arc::new(SqliteOrderRepository::new(db));
    let coordinator = ArrivalCoordinator::new(
        config.coordinator,
        orders.clone(),
        Arc::new(engine.clone()),
    );
    coordinator.register_callback(Arc::new(EventAlertCallback::new(state.clone())));
    coordinator.preload_processed_ids().await;

    let control = AlertControl::new(
        settings,
        engine.clone(),
        coordinator.clone(),
        state.clone(),
    );

    // Background tasks
    let cancel = CancellationToken::new();
    let (arrivals_tx, arrivals_rx) = mpsc::channel(ARRIVAL_CHANNEL_CAPACITY);
    let event_loop = {
        let coordinator = coordinator.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move { coordinator.run_event_loop(arrivals_rx, cancel).await })
    };
    let maintenance = coordinator.start_maintenance(cancel.clone());

    let ctx = AppContext {
        state,
        control: control.clone(),
        coordinator,
        engine,
        orders,
        arrivals: arrivals_tx,
    };

    let shutdown = {
        let cancel = cancel.clone();
        async move {
            shutdown_signal().await;
            cancel.cancel();
        }
    };
    api::run(&config, ctx, shutdown)
        .await
        .context("HTTP server failed")?;

    // Give the output level back before exiting
    cancel.cancel();
    control.stop_all().await;
    let _ = event_loop.await;
    let _ = maintenance.await;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
