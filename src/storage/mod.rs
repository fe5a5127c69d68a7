//! Storage collaborator.
//!
//! # Data Flow
//! ```text
//! Ingestion:
//!     → EndpointStore::find_by_public_id (resolve webhook id)
//!     → EventStore::create_event (record the request)
//!
//! Management API:
//!     → EndpointStore create / list / delete (cascade)
//!     → EventStore list / get
//! ```
//!
//! # Design Decisions
//! - The core depends only on the two traits; `MemoryStore` is the bundled backend
//! - Calls are synchronous and fallible; callers decide how a failure surfaces
//! - Events are immutable: there is no update operation
//! - Deleting an endpoint removes its events in the same critical section

pub mod memory;
pub mod model;
pub mod snapshot;

use thiserror::Error;

pub use memory::MemoryStore;
pub use model::{Endpoint, EndpointId, Event, EventDraft, EventId};

/// Errors raised by a storage backend.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The backend cannot serve requests.
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    /// An event referenced an endpoint that does not exist.
    #[error("endpoint {0} does not exist")]
    EndpointMissing(EndpointId),

    #[error("snapshot I/O failed: {0}")]
    SnapshotIo(#[from] std::io::Error),

    #[error("snapshot is malformed: {0}")]
    SnapshotFormat(#[from] serde_json::Error),
}

/// Endpoint lookup and lifecycle.
pub trait EndpointStore: Send + Sync {
    /// Create an endpoint with a freshly generated, unique public id.
    fn create_endpoint(&self, user_id: &str, name: &str) -> Result<Endpoint, StorageError>;

    /// Exact-match lookup by public webhook id.
    fn find_by_public_id(&self, webhook_id: &str) -> Result<Option<Endpoint>, StorageError>;

    fn get_endpoint(&self, id: EndpointId) -> Result<Option<Endpoint>, StorageError>;

    /// The user's endpoints, newest first.
    fn list_endpoints(&self, user_id: &str) -> Result<Vec<Endpoint>, StorageError>;

    /// Delete an endpoint and every event it received.
    ///
    /// Returns `false` if no such endpoint existed.
    fn delete_endpoint(&self, id: EndpointId) -> Result<bool, StorageError>;
}

/// Event recording and retrieval.
pub trait EventStore: Send + Sync {
    /// Persist a new event. Fails with `EndpointMissing` if the endpoint is gone.
    fn create_event(&self, draft: EventDraft) -> Result<Event, StorageError>;

    fn get_event(&self, id: EventId) -> Result<Option<Event>, StorageError>;

    /// An endpoint's events, newest first, at most `limit` of them.
    fn list_events(&self, endpoint_id: EndpointId, limit: usize) -> Result<Vec<Event>, StorageError>;

    fn count_events(&self, endpoint_id: EndpointId) -> Result<usize, StorageError>;
}
