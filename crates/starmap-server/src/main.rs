//! Server binary for the Starmap movement engine.
//!
//! Wires configuration, logging, the `PostgreSQL` store, the due-movement
//! scheduler and the HTTP API together and runs them until `Ctrl-C`.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `starmap-config.yaml`
//! 2. Initialize structured logging (tracing)
//! 3. Connect to `PostgreSQL` and run migrations
//! 4. Seed and load the unit catalog
//! 5. Build the movement service
//! 6. Spawn the scheduler
//! 7. Serve the HTTP API until shutdown, then stop the scheduler
//! 8. Close the pool

mod error;

use std::path::Path;
use std::sync::Arc;

use starmap_api::{AppState, ServerConfig, start_server};
use starmap_core::config::LoggingConfig;
use starmap_core::scheduler::Scheduler;
use starmap_core::{MovementService, MovementStore, StarmapConfig, UnitCatalog};
use starmap_db::{PgMovementStore, PostgresConfig, PostgresPool};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::error::ServerError;

/// Configuration file, relative to the working directory.
const CONFIG_PATH: &str = "starmap-config.yaml";

/// Application entry point.
///
/// # Errors
///
/// Returns an error if any initialization step fails or the HTTP server
/// stops abnormally.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Load configuration.
    let config = StarmapConfig::load_or_default(Path::new(CONFIG_PATH)).map_err(ServerError::from)?;

    // 2. Initialize structured logging.
    init_logging(&config.logging);
    info!(
        seconds_per_distance = config.travel.seconds_per_distance,
        speed_factor = config.travel.speed_factor,
        settler_count = config.occupation.settler_count,
        poll_interval_ms = config.scheduler.poll_interval_ms,
        tie_break = config.scheduler.tie_break.as_str(),
        "starmap-server starting"
    );

    // 3. Connect to PostgreSQL.
    let pool = PostgresPool::connect(&PostgresConfig::from_infrastructure(&config.infrastructure))
        .await
        .map_err(ServerError::from)?;
    pool.run_migrations().await.map_err(ServerError::from)?;
    pool.ping().await.map_err(ServerError::from)?;

    // 4. Unit catalog: seed the standard units, then use what the table holds.
    let store = Arc::new(PgMovementStore::new(&pool));
    let catalog = load_catalog(&store).await?;
    info!(units = catalog.len(), "Unit catalog loaded");

    // 5. Movement service.
    let service = Arc::new(MovementService::new(store, catalog, &config));

    // 6. Scheduler.
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let scheduler = Scheduler::new(Arc::clone(&service), config.scheduler.clone());
    let scheduler_handle = tokio::spawn(async move { scheduler.run(shutdown_rx).await });

    let signal_tx = shutdown_tx.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl-C, shutting down");
        }
        info!("Shutdown requested");
        if signal_tx.send(true).is_err() {
            warn!("No shutdown listeners remain");
        }
    });

    // 7. HTTP API, then stop the scheduler.
    let server_config = ServerConfig {
        host: config.infrastructure.http_host.clone(),
        port: config.infrastructure.http_port,
    };
    let served = serve_and_drain(&server_config, service, &shutdown_tx, scheduler_handle).await;

    // 8. Close the pool.
    pool.close().await;
    served?;

    info!("starmap-server shutdown complete");
    Ok(())
}

/// Serve the HTTP API until `shutdown` flips, then stop the scheduler.
///
/// The scheduler is signalled and awaited whether or not the server ever
/// started listening.
async fn serve_and_drain(
    server_config: &ServerConfig,
    service: Arc<MovementService>,
    shutdown: &watch::Sender<bool>,
    scheduler: JoinHandle<()>,
) -> Result<(), ServerError> {
    let mut http_shutdown = shutdown.subscribe();
    let served = start_server(
        server_config,
        Arc::new(AppState::new(service)),
        async move {
            if http_shutdown.wait_for(|stop| *stop).await.is_err() {
                warn!("Shutdown channel closed");
            }
        },
    )
    .await;

    shutdown.send_replace(true);
    scheduler.await.map_err(|e| ServerError::Scheduler {
        message: format!("{e}"),
    })?;
    served.map_err(ServerError::from)
}

/// Install the global tracing subscriber.
///
/// `RUST_LOG` takes precedence over the configured level.
fn init_logging(config: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));
    if config.json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    }
}

/// Seed the standard catalog and read back the `units` table, which may
/// carry operator-tuned stats.
async fn load_catalog(store: &PgMovementStore) -> Result<UnitCatalog, ServerError> {
    let seeded = store.seed_units(&UnitCatalog::standard()).await?;
    if seeded > 0 {
        info!(seeded, "Seeded standard units");
    }
    let units = store.units().await?;
    if units.is_empty() {
        warn!("Units table is empty, using the standard catalog");
        return Ok(UnitCatalog::standard());
    }
    Ok(UnitCatalog::from_units(units))
}
