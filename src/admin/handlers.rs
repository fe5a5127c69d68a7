use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::admin::auth::Owner;
use crate::admin::AdminError;
use crate::http::server::AppState;
use crate::storage::{Endpoint, EndpointId, Event, EventId};

const DEFAULT_EVENT_LIMIT: usize = 50;
const MAX_EVENT_LIMIT: usize = 500;
const ENDPOINT_NOT_FOUND: &str = "Endpoint not found or access denied";
const EVENT_NOT_FOUND: &str = "Event not found or access denied";

#[derive(Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub rate_limit: RateLimitStatus,
    pub rate_limited_keys: usize,
}

#[derive(Serialize)]
pub struct RateLimitStatus {
    pub max_requests: u32,
    pub window_secs: u64,
}

#[derive(Debug, Deserialize)]
pub struct CreateEndpoint {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct EventsQuery {
    pub limit: Option<usize>,
}

/// An endpoint as shown to its owner.
#[derive(Debug, Serialize)]
pub struct EndpointView {
    #[serde(flatten)]
    pub endpoint: Endpoint,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_count: Option<usize>,
}

impl EndpointView {
    fn new(state: &AppState, endpoint: Endpoint, event_count: Option<usize>) -> Self {
        let url = state.webhook_url(&endpoint.webhook_id);
        Self {
            endpoint,
            url,
            event_count,
        }
    }
}

pub async fn get_status(State(state): State<AppState>) -> Json<SystemStatus> {
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: "operational",
        rate_limit: RateLimitStatus {
            max_requests: state.rate_limiter.max_requests(),
            window_secs: state.rate_limiter.window().as_secs(),
        },
        rate_limited_keys: state.rate_limiter.len(),
    })
}

pub async fn create_endpoint(
    State(state): State<AppState>,
    Owner(owner): Owner,
    request: Result<Json<CreateEndpoint>, JsonRejection>,
) -> Result<(StatusCode, Json<EndpointView>), AdminError> {
    let Json(request) = request?;
    let name = request.name.trim();
    if name.is_empty() {
        return Err(AdminError::InvalidName);
    }

    let endpoint = state.endpoints.create_endpoint(&owner, name)?;
    tracing::info!(
        endpoint_id = %endpoint.id,
        webhook_id = %endpoint.webhook_id,
        owner = %owner,
        "Endpoint created"
    );
    Ok((
        StatusCode::CREATED,
        Json(EndpointView::new(&state, endpoint, Some(0))),
    ))
}

pub async fn list_endpoints(
    State(state): State<AppState>,
    Owner(owner): Owner,
) -> Result<Json<Vec<EndpointView>>, AdminError> {
    let endpoints = state.endpoints.list_endpoints(&owner)?;
    let mut views = Vec::with_capacity(endpoints.len());
    for endpoint in endpoints {
        let count = state.events.count_events(endpoint.id)?;
        views.push(EndpointView::new(&state, endpoint, Some(count)));
    }
    Ok(Json(views))
}

pub async fn get_endpoint(
    State(state): State<AppState>,
    Owner(owner): Owner,
    Path(id): Path<String>,
) -> Result<Json<EndpointView>, AdminError> {
    let endpoint = owned_endpoint(&state, &owner, &id)?;
    let count = state.events.count_events(endpoint.id)?;
    Ok(Json(EndpointView::new(&state, endpoint, Some(count))))
}

pub async fn delete_endpoint(
    State(state): State<AppState>,
    Owner(owner): Owner,
    Path(id): Path<String>,
) -> Result<StatusCode, AdminError> {
    let endpoint = owned_endpoint(&state, &owner, &id)?;
    if !state.endpoints.delete_endpoint(endpoint.id)? {
        return Err(AdminError::NotFound(ENDPOINT_NOT_FOUND));
    }
    tracing::info!(endpoint_id = %endpoint.id, owner = %owner, "Endpoint deleted");
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_events(
    State(state): State<AppState>,
    Owner(owner): Owner,
    Path(id): Path<String>,
    query: Result<Query<EventsQuery>, QueryRejection>,
) -> Result<Json<Vec<Event>>, AdminError> {
    let Query(query) = query?;
    let endpoint = owned_endpoint(&state, &owner, &id)?;
    let limit = query
        .limit
        .unwrap_or(DEFAULT_EVENT_LIMIT)
        .clamp(1, MAX_EVENT_LIMIT);
    Ok(Json(state.events.list_events(endpoint.id, limit)?))
}

pub async fn get_event(
    State(state): State<AppState>,
    Owner(owner): Owner,
    Path(id): Path<String>,
) -> Result<Json<Event>, AdminError> {
    let id = Uuid::parse_str(&id).map_err(|_| AdminError::NotFound(EVENT_NOT_FOUND))?;
    match state.events.get_event(EventId(id))? {
        Some(event) if event.user_id == owner => Ok(Json(event)),
        _ => Err(AdminError::NotFound(EVENT_NOT_FOUND)),
    }
}

/// Fetch an endpoint, treating another owner's endpoint as absent.
fn owned_endpoint(state: &AppState, owner: &str, id: &str) -> Result<Endpoint, AdminError> {
    let id = Uuid::parse_str(id).map_err(|_| AdminError::NotFound(ENDPOINT_NOT_FOUND))?;
    match state.endpoints.get_endpoint(EndpointId(id))? {
        Some(endpoint) if endpoint.user_id == owner => Ok(endpoint),
        _ => Err(AdminError::NotFound(ENDPOINT_NOT_FOUND)),
    }
}
