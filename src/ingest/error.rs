//! Ingestion failures and their HTTP mapping.
//!
//! Every failure is terminal for its request and maps to exactly one
//! status. A body that is not JSON is never a failure; see `body.rs`.

use std::time::Duration;

use axum::{
    http::{header::RETRY_AFTER, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::http::response::error_response;
use crate::security::PayloadTooLarge;
use crate::storage::StorageError;

#[derive(Debug, Error)]
pub enum IngestError {
    /// The endpoint's window is full.
    #[error("rate limit of {limit} exceeded")]
    RateLimited { limit: String, retry_after: Duration },

    #[error(transparent)]
    PayloadTooLarge(#[from] PayloadTooLarge),

    /// The body could not be read to completion.
    #[error("request body could not be read")]
    BodyRead(#[source] axum::Error),

    /// The sender stalled past the read deadline.
    #[error("request body not received within {0:?}")]
    BodyTimeout(Duration),

    /// No endpoint answers to this webhook id (or the lookup failed).
    #[error("webhook endpoint not found")]
    EndpointNotFound,

    #[error("failed to store event: {0}")]
    Storage(#[source] StorageError),

    #[error("unexpected failure: {0}")]
    Unexpected(String),
}

impl IngestError {
    pub fn status(&self) -> StatusCode {
        match self {
            IngestError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            IngestError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            IngestError::BodyRead(_) => StatusCode::BAD_REQUEST,
            IngestError::BodyTimeout(_) => StatusCode::REQUEST_TIMEOUT,
            IngestError::EndpointNotFound => StatusCode::NOT_FOUND,
            IngestError::Storage(_) | IngestError::Unexpected(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Message shown to the sender.
    pub fn public_message(&self) -> String {
        match self {
            IngestError::RateLimited { limit, .. } => {
                format!("Rate limit exceeded. Max {limit}.")
            }
            IngestError::PayloadTooLarge(err) => {
                format!("Payload too large. Max size is {}.", human_size(err.limit))
            }
            IngestError::BodyRead(_) => "Failed to read request body".to_string(),
            IngestError::BodyTimeout(_) => "Request timed out".to_string(),
            IngestError::EndpointNotFound => "Webhook endpoint not found".to_string(),
            IngestError::Storage(_) => "Failed to store event".to_string(),
            IngestError::Unexpected(_) => "Internal server error".to_string(),
        }
    }
}

impl IntoResponse for IngestError {
    fn into_response(self) -> Response {
        let mut response = error_response(self.status(), &self.public_message());
        if let IngestError::RateLimited { retry_after, .. } = &self {
            let secs = retry_after.as_secs() + u64::from(retry_after.subsec_nanos() > 0);
            if let Ok(value) = HeaderValue::from_str(&secs.max(1).to_string()) {
                response.headers_mut().insert(RETRY_AFTER, value);
            }
        }
        response
    }
}

/// Render a byte count the way limits are usually quoted ("1MB", "512KB").
fn human_size(bytes: usize) -> String {
    const KIB: usize = 1024;
    const MIB: usize = 1024 * KIB;
    if bytes >= MIB && bytes % MIB == 0 {
        format!("{}MB", bytes / MIB)
    } else if bytes >= KIB && bytes % KIB == 0 {
        format!("{}KB", bytes / KIB)
    } else {
        format!("{bytes} bytes")
    }
}
