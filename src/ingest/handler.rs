//! Webhook ingestion and liveness handlers.
//!
//! # Request Flow
//! ```text
//! POST /webhooks/{webhook_id}
//!     → rate limiter (429, body never read)
//!     → declared size (413, body never read)
//!     → bounded body read (413 once the cap is crossed)
//!     → normalize body, capture headers
//!     → resolve endpoint (404)
//!     → record event (500)
//!     → 200 receipt
//! ```
//!
//! Nothing is written until the body has been read in full, so a request
//! abandoned mid-body leaves no trace in storage.

use std::time::Instant;

use axum::{
    body::Body,
    extract::{Path, State},
    http::{Request, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use tracing::{debug, error, info, instrument, warn};

use crate::http::request::request_id;
use crate::http::server::AppState;
use crate::ingest::body::normalize_bytes;
use crate::ingest::error::IngestError;
use crate::ingest::headers::capture_headers;
use crate::observability::metrics;
use crate::security::{Admission, BodyReadError};
use crate::storage::{Endpoint, Event, EventDraft};

/// Body of a successful ingestion response.
#[derive(Debug, Serialize)]
pub struct Receipt {
    pub success: bool,
    pub message: &'static str,
    pub timestamp: String,
}

impl Receipt {
    fn now() -> Self {
        Self {
            success: true,
            message: "Webhook received",
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        }
    }
}

/// Body of the liveness probe.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Probe {
    pub message: &'static str,
    pub webhook_id: String,
    pub method: &'static str,
    pub note: &'static str,
}

impl From<BodyReadError> for IngestError {
    fn from(err: BodyReadError) -> Self {
        match err {
            BodyReadError::TooLarge(err) => IngestError::PayloadTooLarge(err),
            BodyReadError::Transport(err) => IngestError::BodyRead(err),
            BodyReadError::TimedOut { timeout, .. } => IngestError::BodyTimeout(timeout),
        }
    }
}

/// `POST /webhooks/{webhook_id}`
pub async fn receive_webhook(
    State(state): State<AppState>,
    Path(webhook_id): Path<String>,
    request: Request<Body>,
) -> Response {
    let start = Instant::now();

    let response = match ingest(&state, &webhook_id, request).await {
        Ok(receipt) => (StatusCode::OK, Json(receipt)).into_response(),
        Err(err) => err.into_response(),
    };

    metrics::record_request(response.status().as_u16(), start);
    response
}

/// `GET /webhooks/{webhook_id}`
///
/// Pure echo for connectivity checks. Touches neither the rate limiter
/// nor storage, so probing never eats into delivery budget.
pub async fn probe_webhook(Path(webhook_id): Path<String>) -> Json<Probe> {
    Json(Probe {
        message: "Webhook endpoint active",
        webhook_id,
        method: "GET",
        note: "Send POST requests to this URL to create events",
    })
}

#[instrument(
    name = "ingest_webhook",
    skip(state, request),
    fields(
        request_id = %request_id(request.headers()).unwrap_or("unknown"),
        method = %request.method(),
    )
)]
async fn ingest(
    state: &AppState,
    webhook_id: &str,
    request: Request<Body>,
) -> Result<Receipt, IngestError> {
    match state.rate_limiter.admit(webhook_id) {
        Admission::Admitted { remaining } => debug!(remaining, "Admitted"),
        Admission::Refused { retry_after } => {
            metrics::record_rate_limited();
            warn!(retry_after_ms = retry_after.as_millis() as u64, "Rate limit exceeded");
            return Err(IngestError::RateLimited {
                limit: state.rate_limiter.describe(),
                retry_after,
            });
        }
    }
    metrics::record_tracked_keys(state.rate_limiter.len());

    let (parts, body) = request.into_parts();

    if let Err(err) = state.payload_guard.check_declared(&parts.headers) {
        warn!(declared = err.size, limit = err.limit, "Declared payload too large");
        return Err(err.into());
    }

    let bytes = match state.payload_guard.read_body(body).await {
        Ok(bytes) => bytes,
        Err(BodyReadError::TooLarge(err)) => {
            warn!(received = err.size, limit = err.limit, "Payload too large");
            return Err(err.into());
        }
        Err(BodyReadError::TimedOut { timeout, received }) => {
            metrics::record_body_timeout();
            warn!(
                timeout_ms = timeout.as_millis() as u64,
                received,
                "Body read timeout: sender stopped sending data"
            );
            return Err(IngestError::BodyTimeout(timeout));
        }
        Err(err) => {
            warn!(error = %err, "Request body aborted");
            return Err(err.into());
        }
    };
    state.payload_guard.check_actual(bytes.len())?;
    metrics::record_payload_size(bytes.len());

    let body = normalize_bytes(&bytes);
    let headers = capture_headers(&parts.headers);
    debug!(bytes = bytes.len(), json = body.as_json().is_some(), "Body normalized");

    let endpoint = resolve_endpoint(state, webhook_id).await?;
    let draft = EventDraft::accepted(&endpoint, parts.method.as_str(), headers, body);
    let event = record_event(state, draft).await?;

    metrics::record_event_stored();
    info!(event_id = %event.id, endpoint_id = %endpoint.id, "Webhook received");
    Ok(Receipt::now())
}

/// Look up the endpoint. A backend failure is reported to the sender as
/// not found; the log line is the only place the two cases differ.
async fn resolve_endpoint(state: &AppState, webhook_id: &str) -> Result<Endpoint, IngestError> {
    let endpoints = state.endpoints.clone();
    let key = webhook_id.to_owned();
    let lookup = tokio::task::spawn_blocking(move || endpoints.find_by_public_id(&key))
        .await
        .map_err(|e| IngestError::Unexpected(e.to_string()))?;

    match lookup {
        Ok(Some(endpoint)) => Ok(endpoint),
        Ok(None) => {
            info!("Unknown webhook id");
            Err(IngestError::EndpointNotFound)
        }
        Err(e) => {
            error!(error = %e, "Endpoint lookup failed");
            Err(IngestError::EndpointNotFound)
        }
    }
}

async fn record_event(state: &AppState, draft: EventDraft) -> Result<Event, IngestError> {
    let events = state.events.clone();
    let stored = tokio::task::spawn_blocking(move || events.create_event(draft))
        .await
        .map_err(|e| IngestError::Unexpected(e.to_string()))?;

    stored.map_err(|e| {
        error!(error = %e, "Error storing webhook event");
        IngestError::Storage(e)
    })
}
