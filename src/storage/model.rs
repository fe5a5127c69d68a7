//! Stored records: endpoints and the events they receive.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::ingest::body::StoredBody;

/// Length of generated public webhook identifiers.
pub const PUBLIC_ID_LEN: usize = 8;

const PUBLIC_ID_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Internal endpoint identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EndpointId(pub Uuid);

impl EndpointId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for EndpointId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EndpointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Internal event identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(pub Uuid);

impl EventId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// A webhook receiver owned by one user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Endpoint {
    pub id: EndpointId,
    /// Token used in the public URL. Unique and never changed.
    pub webhook_id: String,
    pub user_id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// One recorded inbound request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub endpoint_id: EndpointId,
    /// Copied from the endpoint when the event is created.
    pub user_id: String,
    pub method: String,
    pub headers: BTreeMap<String, String>,
    pub body: StoredBody,
    /// Status returned to the sender.
    pub status_code: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Everything needed to record an event; ids and timestamps are assigned by the store.
#[derive(Debug, Clone, PartialEq)]
pub struct EventDraft {
    pub endpoint_id: EndpointId,
    pub user_id: String,
    pub method: String,
    pub headers: BTreeMap<String, String>,
    pub body: StoredBody,
    pub status_code: u16,
    pub error_message: Option<String>,
}

impl EventDraft {
    /// Draft for a request accepted from `endpoint`.
    pub fn accepted(
        endpoint: &Endpoint,
        method: impl Into<String>,
        headers: BTreeMap<String, String>,
        body: StoredBody,
    ) -> Self {
        Self {
            endpoint_id: endpoint.id,
            user_id: endpoint.user_id.clone(),
            method: method.into(),
            headers,
            body,
            status_code: 200,
            error_message: None,
        }
    }

    pub(crate) fn into_event(self, id: EventId, created_at: DateTime<Utc>) -> Event {
        Event {
            id,
            endpoint_id: self.endpoint_id,
            user_id: self.user_id,
            method: self.method,
            headers: self.headers,
            body: self.body,
            status_code: self.status_code,
            error_message: self.error_message,
            created_at,
        }
    }
}

/// Generate a short random public identifier from `[0-9a-z]`.
pub fn generate_public_id<R: Rng + ?Sized>(rng: &mut R) -> String {
    (0..PUBLIC_ID_LEN)
        .map(|_| PUBLIC_ID_ALPHABET[rng.gen_range(0..PUBLIC_ID_ALPHABET.len())] as char)
        .collect()
}
