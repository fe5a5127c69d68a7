//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{Request, Response};
use axum::Router;
use serde_json::Value;

use webhook_inbox::config::InboxConfig;
use webhook_inbox::http::{AppState, HttpServer};
use webhook_inbox::security::RateLimiter;
use webhook_inbox::storage::{
    Endpoint, EndpointId, EndpointStore, Event, EventDraft, EventId, EventStore, MemoryStore,
    StorageError,
};
use webhook_inbox::time::ManualClock;

pub const API_KEY: &str = "test-admin-key";
pub const OWNER: &str = "user-1";

pub fn test_config() -> InboxConfig {
    let mut config = InboxConfig::default();
    config.listener.bind_address = "127.0.0.1:0".to_string();
    config.listener.public_url = "https://hooks.example.com".to_string();
    config.admin.api_key = API_KEY.to_string();
    config
}

/// An ingestion router over an in-memory store, with a clock the test controls.
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub store: Arc<MemoryStore>,
    pub clock: ManualClock,
}

impl TestApp {
    pub fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        let (state, clock) = state_with(store.clone(), store.clone());
        let router = HttpServer::new(state.clone()).router();
        Self {
            router,
            state,
            store,
            clock,
        }
    }

    pub fn endpoint(&self, name: &str) -> Endpoint {
        self.store.create_endpoint(OWNER, name).unwrap()
    }

    pub fn events(&self, endpoint: &Endpoint) -> Vec<Event> {
        self.store.list_events(endpoint.id, 500).unwrap()
    }
}

/// State over arbitrary stores, rate limited by a `ManualClock`.
pub fn state_with(
    endpoints: Arc<dyn EndpointStore>,
    events: Arc<dyn EventStore>,
) -> (AppState, ManualClock) {
    let config = test_config();
    let clock = ManualClock::new();
    let limiter = Arc::new(RateLimiter::new(
        config.rate_limit.max_requests,
        config.rate_limit.window(),
        Arc::new(clock.clone()),
    ));
    (AppState::new(&config, limiter, endpoints, events), clock)
}

pub fn post(uri: &str, body: impl Into<Body>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .body(body.into())
        .unwrap()
}

pub fn post_json(uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// Event store whose writes always fail.
pub struct FailingEventStore;

impl EventStore for FailingEventStore {
    fn create_event(&self, _draft: EventDraft) -> Result<Event, StorageError> {
        Err(StorageError::Unavailable("disk full".into()))
    }

    fn get_event(&self, _id: EventId) -> Result<Option<Event>, StorageError> {
        Ok(None)
    }

    fn list_events(&self, _endpoint_id: EndpointId, _limit: usize) -> Result<Vec<Event>, StorageError> {
        Ok(Vec::new())
    }

    fn count_events(&self, _endpoint_id: EndpointId) -> Result<usize, StorageError> {
        Ok(0)
    }
}

/// Endpoint store that is unreachable.
pub struct UnreachableEndpointStore;

impl EndpointStore for UnreachableEndpointStore {
    fn create_endpoint(&self, _user_id: &str, _name: &str) -> Result<Endpoint, StorageError> {
        Err(StorageError::Unavailable("connection refused".into()))
    }

    fn find_by_public_id(&self, _webhook_id: &str) -> Result<Option<Endpoint>, StorageError> {
        Err(StorageError::Unavailable("connection refused".into()))
    }

    fn get_endpoint(&self, _id: EndpointId) -> Result<Option<Endpoint>, StorageError> {
        Err(StorageError::Unavailable("connection refused".into()))
    }

    fn list_endpoints(&self, _user_id: &str) -> Result<Vec<Endpoint>, StorageError> {
        Err(StorageError::Unavailable("connection refused".into()))
    }

    fn delete_endpoint(&self, _id: EndpointId) -> Result<bool, StorageError> {
        Err(StorageError::Unavailable("connection refused".into()))
    }
}
