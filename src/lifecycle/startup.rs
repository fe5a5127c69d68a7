//! Startup orchestration.
//!
//! # Responsibilities
//! - Load the storage snapshot
//! - Initialize subsystems in dependency order
//! - Start background tasks (metrics, rate-limit sweep)
//! - Bind listeners and serve until a shutdown signal
//! - Persist the snapshot on the way out
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Listeners start last (traffic only when ready)
//! - Draining is bounded by `SHUTDOWN_GRACE`

use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::admin::setup_admin_router;
use crate::config::InboxConfig;
use crate::http::{AppState, HttpServer};
use crate::lifecycle::{signals, Shutdown};
use crate::observability::metrics;
use crate::security::RateLimiter;
use crate::storage::{snapshot, MemoryStore, StorageError};

const SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: io::Error,
    },

    #[error("invalid metrics address: {0}")]
    MetricsAddress(String),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("server error: {0}")]
    Serve(#[source] io::Error),
}

/// Run the inbox until SIGINT or SIGTERM.
pub async fn run(config: InboxConfig) -> Result<(), StartupError> {
    let snapshot_path = config.storage.snapshot_path.as_deref().map(PathBuf::from);
    let store = Arc::new(match &snapshot_path {
        Some(path) => snapshot::load(path)?,
        None => MemoryStore::new(),
    });

    if config.observability.metrics_enabled {
        let addr = config
            .observability
            .metrics_address
            .parse()
            .map_err(|_| StartupError::MetricsAddress(config.observability.metrics_address.clone()))?;
        metrics::init_metrics(addr);
    }

    let state = AppState::with_store(&config, store.clone());
    let shutdown = Shutdown::new();

    let listener = bind(&config.listener.bind_address).await?;
    let server = HttpServer::new(state.clone());
    tracing::info!(
        public_url = %state.public_url,
        rate_limit = %state.rate_limiter.describe(),
        max_body_bytes = state.payload_guard.max_bytes(),
        "Webhook ingestion ready"
    );
    let mut ingest = tokio::spawn(server.run(listener, shutdown.subscribe()));

    let mut background: Vec<JoinHandle<()>> = Vec::new();

    if config.admin.enabled {
        let admin_listener = bind(&config.admin.bind_address).await?;
        let router = setup_admin_router(state.clone(), &config.admin.api_key);
        let mut rx = shutdown.subscribe();
        background.push(tokio::spawn(async move {
            let addr = admin_listener.local_addr().ok();
            tracing::info!(address = ?addr, "Management API listening");
            let served = axum::serve(admin_listener, router)
                .with_graceful_shutdown(async move {
                    let _ = rx.recv().await;
                })
                .await;
            if let Err(e) = served {
                tracing::error!(error = %e, "Management API failed");
            }
        }));
    }

    if config.rate_limit.sweep_interval_secs > 0 {
        background.push(spawn_sweep(
            state.rate_limiter.clone(),
            Duration::from_secs(config.rate_limit.sweep_interval_secs),
            shutdown.subscribe(),
        ));
    }

    let served = tokio::select! {
        () = signals::wait_for_signal() => {
            shutdown.trigger();
            drain(&mut ingest).await
        }
        joined = &mut ingest => flatten(joined),
    };
    shutdown.trigger();

    for handle in background {
        if tokio::time::timeout(SHUTDOWN_GRACE, handle).await.is_err() {
            tracing::warn!("Background task did not stop in time");
        }
    }

    if let Some(path) = &snapshot_path {
        snapshot::save(&store, path)?;
        tracing::info!(path = %path.display(), "Snapshot saved");
    }

    served?;
    tracing::info!("Shutdown complete");
    Ok(())
}

async fn bind(address: &str) -> Result<TcpListener, StartupError> {
    TcpListener::bind(address)
        .await
        .map_err(|source| StartupError::Bind {
            address: address.to_string(),
            source,
        })
}

async fn drain(ingest: &mut JoinHandle<io::Result<()>>) -> Result<(), StartupError> {
    match tokio::time::timeout(SHUTDOWN_GRACE, ingest).await {
        Ok(joined) => flatten(joined),
        Err(_) => {
            tracing::warn!(grace_secs = SHUTDOWN_GRACE.as_secs(), "Ingestion server did not drain in time");
            Ok(())
        }
    }
}

fn flatten(joined: Result<io::Result<()>, tokio::task::JoinError>) -> Result<(), StartupError> {
    match joined {
        Ok(result) => result.map_err(StartupError::Serve),
        Err(e) => Err(StartupError::Serve(io::Error::other(e))),
    }
}

/// Periodically drop expired rate-limit records.
pub fn spawn_sweep(
    limiter: Arc<RateLimiter>,
    every: Duration,
    mut shutdown: broadcast::Receiver<()>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let removed = limiter.prune_expired();
                    metrics::record_tracked_keys(limiter.len());
                    if removed > 0 {
                        tracing::debug!(removed, tracked = limiter.len(), "Swept expired rate-limit records");
                    }
                }
                _ = shutdown.recv() => break,
            }
        }
    })
}
