//! Management API: endpoint provisioning and event inspection.
//!
//! Every route requires the admin bearer key. Owner-scoped routes also
//! require `X-Owner-Id`; records belonging to another owner are reported
//! as not found.

pub mod auth;
pub mod handlers;

use std::sync::Arc;

use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use thiserror::Error;
use tower_http::trace::TraceLayer;

use self::auth::admin_auth_middleware;
use self::handlers::*;
use crate::http::response::error_response;
use crate::http::server::AppState;
use crate::storage::StorageError;

/// Failures surfaced by the management API.
#[derive(Debug, Error)]
pub enum AdminError {
    #[error("Unauthorized")]
    Unauthorized,

    #[error("Not authenticated")]
    MissingOwner,

    #[error("Endpoint name must not be empty")]
    InvalidName,

    #[error("{0}")]
    NotFound(&'static str),

    /// A request body or query string that failed to extract.
    #[error("{message}")]
    Rejected { status: StatusCode, message: String },

    #[error("storage failure: {0}")]
    Storage(#[from] StorageError),
}

impl IntoResponse for AdminError {
    fn into_response(self) -> Response {
        match &self {
            AdminError::Unauthorized | AdminError::MissingOwner => {
                error_response(StatusCode::UNAUTHORIZED, &self.to_string())
            }
            AdminError::InvalidName => error_response(StatusCode::BAD_REQUEST, &self.to_string()),
            AdminError::NotFound(message) => error_response(StatusCode::NOT_FOUND, message),
            AdminError::Rejected { status, message } => error_response(*status, message),
            AdminError::Storage(e) => {
                tracing::error!(error = %e, "Management request failed");
                error_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
        }
    }
}

impl From<JsonRejection> for AdminError {
    fn from(rejection: JsonRejection) -> Self {
        AdminError::Rejected {
            status: rejection.status(),
            message: rejection.body_text(),
        }
    }
}

impl From<QueryRejection> for AdminError {
    fn from(rejection: QueryRejection) -> Self {
        AdminError::Rejected {
            status: rejection.status(),
            message: rejection.body_text(),
        }
    }
}

pub fn setup_admin_router(state: AppState, api_key: &str) -> Router {
    Router::new()
        .route("/api/status", get(get_status))
        .route("/api/endpoints", get(list_endpoints).post(create_endpoint))
        .route("/api/endpoints/{id}", get(get_endpoint).delete(delete_endpoint))
        .route("/api/endpoints/{id}/events", get(list_events))
        .route("/api/events/{id}", get(get_event))
        .layer(middleware::from_fn_with_state(
            Arc::<str>::from(api_key),
            admin_auth_middleware,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
