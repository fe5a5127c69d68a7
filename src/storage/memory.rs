//! In-process storage backend.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::Utc;

use crate::storage::model::{
    generate_public_id, Endpoint, EndpointId, Event, EventDraft, EventId,
};
use crate::storage::{EndpointStore, EventStore, StorageError};

/// Rows plus the insertion sequence used to order rows created in the same instant.
#[derive(Debug, Default)]
pub(crate) struct Tables {
    endpoints: HashMap<EndpointId, (u64, Endpoint)>,
    by_webhook_id: HashMap<String, EndpointId>,
    events: HashMap<EventId, (u64, Event)>,
    next_seq: u64,
}

impl Tables {
    fn seq(&mut self) -> u64 {
        self.next_seq += 1;
        self.next_seq
    }

    pub(crate) fn insert_endpoint(&mut self, endpoint: Endpoint) {
        let seq = self.seq();
        self.by_webhook_id
            .insert(endpoint.webhook_id.clone(), endpoint.id);
        self.endpoints.insert(endpoint.id, (seq, endpoint));
    }

    /// Insert an event, rejecting it if its endpoint is unknown.
    pub(crate) fn insert_event(&mut self, event: Event) -> Result<(), StorageError> {
        if !self.endpoints.contains_key(&event.endpoint_id) {
            return Err(StorageError::EndpointMissing(event.endpoint_id));
        }
        let seq = self.seq();
        self.events.insert(event.id, (seq, event));
        Ok(())
    }

    /// All endpoints in insertion order.
    pub(crate) fn endpoints_in_order(&self) -> Vec<Endpoint> {
        let mut rows: Vec<_> = self.endpoints.values().collect();
        rows.sort_by_key(|(seq, _)| *seq);
        rows.into_iter().map(|(_, e)| e.clone()).collect()
    }

    /// All events in insertion order.
    pub(crate) fn events_in_order(&self) -> Vec<Event> {
        let mut rows: Vec<_> = self.events.values().collect();
        rows.sort_by_key(|(seq, _)| *seq);
        rows.into_iter().map(|(_, e)| e.clone()).collect()
    }
}

/// Thread-safe store holding every endpoint and event in memory.
///
/// All tables sit behind one lock, so an event insert and an endpoint
/// delete can never interleave.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn from_tables(tables: Tables) -> Self {
        Self {
            tables: RwLock::new(tables),
        }
    }

    pub(crate) fn read(&self) -> Result<RwLockReadGuard<'_, Tables>, StorageError> {
        self.tables
            .read()
            .map_err(|_| StorageError::Unavailable("storage lock poisoned".into()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Tables>, StorageError> {
        self.tables
            .write()
            .map_err(|_| StorageError::Unavailable("storage lock poisoned".into()))
    }

    /// Total number of stored events.
    pub fn event_count(&self) -> Result<usize, StorageError> {
        Ok(self.read()?.events.len())
    }

    /// Total number of stored endpoints.
    pub fn endpoint_count(&self) -> Result<usize, StorageError> {
        Ok(self.read()?.endpoints.len())
    }
}

impl EndpointStore for MemoryStore {
    fn create_endpoint(&self, user_id: &str, name: &str) -> Result<Endpoint, StorageError> {
        let mut tables = self.write()?;
        let mut rng = rand::thread_rng();

        let webhook_id = loop {
            let candidate = generate_public_id(&mut rng);
            if !tables.by_webhook_id.contains_key(&candidate) {
                break candidate;
            }
        };

        let endpoint = Endpoint {
            id: EndpointId::new(),
            webhook_id,
            user_id: user_id.to_string(),
            name: name.to_string(),
            created_at: Utc::now(),
        };
        tables.insert_endpoint(endpoint.clone());
        Ok(endpoint)
    }

    fn find_by_public_id(&self, webhook_id: &str) -> Result<Option<Endpoint>, StorageError> {
        let tables = self.read()?;
        Ok(tables
            .by_webhook_id
            .get(webhook_id)
            .and_then(|id| tables.endpoints.get(id))
            .map(|(_, endpoint)| endpoint.clone()))
    }

    fn get_endpoint(&self, id: EndpointId) -> Result<Option<Endpoint>, StorageError> {
        Ok(self.read()?.endpoints.get(&id).map(|(_, e)| e.clone()))
    }

    fn list_endpoints(&self, user_id: &str) -> Result<Vec<Endpoint>, StorageError> {
        let tables = self.read()?;
        let mut rows: Vec<_> = tables
            .endpoints
            .values()
            .filter(|(_, e)| e.user_id == user_id)
            .collect();
        rows.sort_by(|(sa, a), (sb, b)| b.created_at.cmp(&a.created_at).then(sb.cmp(sa)));
        Ok(rows.into_iter().map(|(_, e)| e.clone()).collect())
    }

    fn delete_endpoint(&self, id: EndpointId) -> Result<bool, StorageError> {
        let mut tables = self.write()?;
        let Some((_, endpoint)) = tables.endpoints.remove(&id) else {
            return Ok(false);
        };
        tables.by_webhook_id.remove(&endpoint.webhook_id);
        tables.events.retain(|_, (_, event)| event.endpoint_id != id);
        Ok(true)
    }
}

impl EventStore for MemoryStore {
    fn create_event(&self, draft: EventDraft) -> Result<Event, StorageError> {
        let event = draft.into_event(EventId::new(), Utc::now());
        self.write()?.insert_event(event.clone())?;
        Ok(event)
    }

    fn get_event(&self, id: EventId) -> Result<Option<Event>, StorageError> {
        Ok(self.read()?.events.get(&id).map(|(_, e)| e.clone()))
    }

    fn list_events(&self, endpoint_id: EndpointId, limit: usize) -> Result<Vec<Event>, StorageError> {
        let tables = self.read()?;
        let mut rows: Vec<_> = tables
            .events
            .values()
            .filter(|(_, e)| e.endpoint_id == endpoint_id)
            .collect();
        rows.sort_by(|(sa, a), (sb, b)| b.created_at.cmp(&a.created_at).then(sb.cmp(sa)));
        Ok(rows
            .into_iter()
            .take(limit)
            .map(|(_, e)| e.clone())
            .collect())
    }

    fn count_events(&self, endpoint_id: EndpointId) -> Result<usize, StorageError> {
        Ok(self
            .read()?
            .events
            .values()
            .filter(|(_, e)| e.endpoint_id == endpoint_id)
            .count())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::body::StoredBody;
    use serde_json::json;
    use std::collections::{BTreeMap, HashSet};

    fn draft(endpoint: &Endpoint, body: StoredBody) -> EventDraft {
        EventDraft::accepted(endpoint, "POST", BTreeMap::new(), body)
    }

    #[test]
    fn created_endpoint_is_resolvable_by_public_id() {
        let store = MemoryStore::new();
        let endpoint = store.create_endpoint("user-1", "GitHub").unwrap();

        let found = store.find_by_public_id(&endpoint.webhook_id).unwrap();
        assert_eq!(found, Some(endpoint.clone()));
        assert_eq!(store.get_endpoint(endpoint.id).unwrap(), Some(endpoint));
    }

    #[test]
    fn lookup_is_exact_match() {
        let store = MemoryStore::new();
        let endpoint = store.create_endpoint("user-1", "GitHub").unwrap();

        assert!(store
            .find_by_public_id(&endpoint.webhook_id.to_uppercase())
            .unwrap()
            .is_none());
        assert!(store
            .find_by_public_id(&endpoint.webhook_id[..4])
            .unwrap()
            .is_none());
        assert!(store.find_by_public_id("").unwrap().is_none());
    }

    #[test]
    fn public_ids_are_unique() {
        let store = MemoryStore::new();
        let ids: HashSet<_> = (0..500)
            .map(|i| store.create_endpoint("u", &format!("e{i}")).unwrap().webhook_id)
            .collect();
        assert_eq!(ids.len(), 500);
    }

    #[test]
    fn lists_only_owned_endpoints_newest_first() {
        let store = MemoryStore::new();
        let first = store.create_endpoint("alice", "one").unwrap();
        store.create_endpoint("bob", "other").unwrap();
        let second = store.create_endpoint("alice", "two").unwrap();

        let listed = store.list_endpoints("alice").unwrap();
        assert_eq!(listed, vec![second, first]);
        assert!(store.list_endpoints("carol").unwrap().is_empty());
    }

    #[test]
    fn events_are_listed_newest_first_with_limit() {
        let store = MemoryStore::new();
        let endpoint = store.create_endpoint("u", "e").unwrap();

        let ids: Vec<_> = (0..5)
            .map(|i| {
                store
                    .create_event(draft(&endpoint, StoredBody::Json(json!({ "n": i }))))
                    .unwrap()
                    .id
            })
            .collect();

        let listed: Vec<_> = store
            .list_events(endpoint.id, 3)
            .unwrap()
            .into_iter()
            .map(|e| e.id)
            .collect();
        assert_eq!(listed, vec![ids[4], ids[3], ids[2]]);
        assert_eq!(store.count_events(endpoint.id).unwrap(), 5);
    }

    #[test]
    fn event_copies_owner_and_is_retrievable() {
        let store = MemoryStore::new();
        let endpoint = store.create_endpoint("owner-9", "e").unwrap();

        let event = store
            .create_event(draft(&endpoint, StoredBody::Raw("hi".into())))
            .unwrap();

        let fetched = store.get_event(event.id).unwrap().unwrap();
        assert_eq!(fetched.user_id, "owner-9");
        assert_eq!(fetched.endpoint_id, endpoint.id);
        assert_eq!(fetched.body, StoredBody::Raw("hi".into()));
    }

    #[test]
    fn delete_cascades_to_events() {
        let store = MemoryStore::new();
        let doomed = store.create_endpoint("u", "doomed").unwrap();
        let kept = store.create_endpoint("u", "kept").unwrap();

        let doomed_events: Vec<_> = (0..3)
            .map(|_| store.create_event(draft(&doomed, StoredBody::Empty)).unwrap().id)
            .collect();
        let kept_event = store.create_event(draft(&kept, StoredBody::Empty)).unwrap().id;

        assert!(store.delete_endpoint(doomed.id).unwrap());

        assert!(store.get_endpoint(doomed.id).unwrap().is_none());
        assert!(store.find_by_public_id(&doomed.webhook_id).unwrap().is_none());
        for id in doomed_events {
            assert!(store.get_event(id).unwrap().is_none());
        }
        assert!(store.get_event(kept_event).unwrap().is_some());
        assert_eq!(store.event_count().unwrap(), 1);
    }

    #[test]
    fn deleting_missing_endpoint_reports_false() {
        let store = MemoryStore::new();
        assert!(!store.delete_endpoint(EndpointId::new()).unwrap());
    }

    #[test]
    fn event_for_deleted_endpoint_is_rejected() {
        let store = MemoryStore::new();
        let endpoint = store.create_endpoint("u", "e").unwrap();
        store.delete_endpoint(endpoint.id).unwrap();

        let err = store
            .create_event(draft(&endpoint, StoredBody::Empty))
            .unwrap_err();
        assert!(matches!(err, StorageError::EndpointMissing(id) if id == endpoint.id));
        assert_eq!(store.event_count().unwrap(), 0);
    }
}
