//! JSON snapshots of a [`MemoryStore`].
//!
//! The snapshot is read once at startup and written once at shutdown.
//! Rows are stored in insertion order so listing order survives a reload.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::storage::memory::{MemoryStore, Tables};
use crate::storage::model::{Endpoint, Event};
use crate::storage::StorageError;

#[derive(Debug, Serialize, Deserialize)]
struct Snapshot {
    endpoints: Vec<Endpoint>,
    events: Vec<Event>,
}

/// Load a store from `path`, or an empty store if the file does not exist.
///
/// Events whose endpoint is missing from the snapshot are skipped.
pub fn load(path: &Path) -> Result<MemoryStore, StorageError> {
    if !path.exists() {
        tracing::info!(path = %path.display(), "No snapshot found, starting empty");
        return Ok(MemoryStore::new());
    }

    let reader = BufReader::new(File::open(path)?);
    let snapshot: Snapshot = serde_json::from_reader(reader)?;

    let mut tables = Tables::default();
    for endpoint in snapshot.endpoints {
        tables.insert_endpoint(endpoint);
    }

    let mut skipped = 0usize;
    for event in snapshot.events {
        if tables.insert_event(event).is_err() {
            skipped += 1;
        }
    }
    if skipped > 0 {
        tracing::warn!(skipped, "Dropped snapshot events with no endpoint");
    }

    let store = MemoryStore::from_tables(tables);
    tracing::info!(
        path = %path.display(),
        endpoints = store.endpoint_count()?,
        events = store.event_count()?,
        "Loaded snapshot"
    );
    Ok(store)
}

/// Write every endpoint and event in `store` to `path`.
///
/// The file is written next to the target and renamed into place, so a
/// crash mid-write leaves the previous snapshot intact.
pub fn save(store: &MemoryStore, path: &Path) -> Result<(), StorageError> {
    let snapshot = {
        let tables = store.read()?;
        Snapshot {
            endpoints: tables.endpoints_in_order(),
            events: tables.events_in_order(),
        }
    };

    let tmp = path.with_extension("tmp");
    {
        let mut writer = BufWriter::new(File::create(&tmp)?);
        serde_json::to_writer(&mut writer, &snapshot)?;
        writer.flush()?;
    }
    std::fs::rename(&tmp, path)?;

    tracing::info!(
        path = %path.display(),
        endpoints = snapshot.endpoints.len(),
        events = snapshot.events.len(),
        "Saved snapshot"
    );
    Ok(())
}
