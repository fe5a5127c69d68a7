//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the webhook handlers
//! - Wire up middleware (tracing, request ID, panic capture)
//! - Bind server to listener and stop on the shutdown broadcast

use std::sync::Arc;

use axum::{
    body::Body,
    http::Request,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{catch_panic::CatchPanicLayer, trace::TraceLayer};

use crate::config::InboxConfig;
use crate::http::request::{propagate_request_id_layer, request_id, set_request_id_layer};
use crate::http::response::panic_response;
use crate::ingest::{probe_webhook, receive_webhook};
use crate::security::{PayloadGuard, RateLimiter};
use crate::storage::{EndpointStore, EventStore};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub rate_limiter: Arc<RateLimiter>,
    pub payload_guard: PayloadGuard,
    pub endpoints: Arc<dyn EndpointStore>,
    pub events: Arc<dyn EventStore>,
    /// Base URL used to render webhook URLs.
    pub public_url: Arc<str>,
}

impl AppState {
    pub fn new(
        config: &InboxConfig,
        rate_limiter: Arc<RateLimiter>,
        endpoints: Arc<dyn EndpointStore>,
        events: Arc<dyn EventStore>,
    ) -> Self {
        Self {
            rate_limiter,
            payload_guard: PayloadGuard::from_config(&config.limits, &config.timeouts),
            endpoints,
            events,
            public_url: Arc::from(config.listener.public_url.trim_end_matches('/')),
        }
    }

    /// State backed by one store serving both endpoints and events.
    pub fn with_store<S>(config: &InboxConfig, store: Arc<S>) -> Self
    where
        S: EndpointStore + EventStore + 'static,
    {
        Self::new(
            config,
            Arc::new(RateLimiter::from_config(&config.rate_limit)),
            store.clone(),
            store,
        )
    }

    /// Public URL that senders post to.
    pub fn webhook_url(&self, webhook_id: &str) -> String {
        format!("{}/webhooks/{}", self.public_url, webhook_id)
    }
}

/// HTTP server for webhook ingestion.
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(state: AppState) -> Self {
        Self {
            router: Self::build_router(state),
        }
    }

    /// Build the Axum router with all middleware layers.
    ///
    /// Slow senders are cut off by the payload guard's read deadline, which
    /// answers with a JSON 408 like every other ingestion failure.
    pub fn build_router(state: AppState) -> Router {
        Router::new()
            .route(
                "/webhooks/{webhook_id}",
                post(receive_webhook).get(probe_webhook),
            )
            .route("/health", get(health))
            .with_state(state)
            .layer(CatchPanicLayer::custom(panic_response))
            .layer(propagate_request_id_layer())
            .layer(TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                tracing::info_span!(
                    "http_request",
                    method = %request.method(),
                    uri = %request.uri(),
                    request_id = request_id(request.headers()).unwrap_or("unknown"),
                )
            }))
            .layer(set_request_id_layer())
    }

    /// The configured router, for in-process use.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Run the server until a shutdown signal is broadcast.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
