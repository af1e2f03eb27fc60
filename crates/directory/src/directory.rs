//! The actor directory.
//!
//! Records are sharded in a `DashMap`, so a mutation only locks the shard
//! holding its key and unrelated actors never contend. Every read hands out
//! an owned clone; callers can never reach the live record.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use intake_core::actor::{ActorId, ActorRecord, Fields};
use tracing::{debug, trace};

/// Concurrency-safe keyed store of staff and client records.
#[derive(Debug, Default)]
pub struct Directory {
    records: DashMap<ActorId, ActorRecord>,
}

impl Directory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create or update a record.
    ///
    /// Returns `(created, record)`. For an unseen id the record is built from
    /// `fields`; well-typed `created_at` / `tags` / `notes` entries seed the
    /// immutable fields, anything else defaults. For an existing id the
    /// mutable fields are merged last-write-wins and any protected keys in
    /// `fields` are discarded.
    pub fn upsert(&self, id: ActorId, fields: Fields) -> (bool, ActorRecord) {
        match self.records.entry(id) {
            Entry::Occupied(mut occupied) => {
                let record = occupied.get_mut();
                for (key, value) in fields {
                    if ActorRecord::is_protected(&key) {
                        trace!(actor_id = id, field = %key, "Discarding protected field on upsert");
                        continue;
                    }
                    record.fields.insert(key, value);
                }
                (false, record.clone())
            }
            Entry::Vacant(vacant) => {
                let record = new_record(id, fields);
                debug!(actor_id = id, fields = record.fields.len(), "Directory record created");
                (true, vacant.insert(record).value().clone())
            }
        }
    }

    /// Get a copy of a record.
    pub fn get(&self, id: ActorId) -> Option<ActorRecord> {
        self.records.get(&id).map(|r| r.value().clone())
    }

    /// Copies of every record, ordered by id. Administrative/debug use only.
    pub fn all(&self) -> BTreeMap<ActorId, ActorRecord> {
        self.records
            .iter()
            .map(|r| (*r.key(), r.value().clone()))
            .collect()
    }

    /// Explicitly delete a record. Returns whether it existed.
    pub fn delete(&self, id: ActorId) -> bool {
        self.records.remove(&id).is_some()
    }

    /// Reset `tags` and `notes` to empty. `created_at` is never cleared.
    pub fn clear_annotations(&self, id: ActorId) -> bool {
        match self.records.get_mut(&id) {
            Some(mut record) => {
                record.tags.clear();
                record.notes.clear();
                true
            }
            None => false,
        }
    }

    /// Empty the store. Test and reset contexts only.
    pub fn clear(&self) {
        self.records.clear();
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Highest id currently stored.
    pub fn max_id(&self) -> Option<ActorId> {
        self.records.iter().map(|r| *r.key()).max()
    }
}

fn new_record(id: ActorId, mut fields: Fields) -> ActorRecord {
    let created_at = fields
        .remove("created_at")
        .and_then(|v| v.as_str().and_then(|s| DateTime::parse_from_rfc3339(s).ok()))
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(Utc::now);

    let tags = match fields.remove("tags") {
        Some(serde_json::Value::Array(items)) => items
            .into_iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect(),
        _ => Vec::new(),
    };

    let notes = match fields.remove("notes") {
        Some(serde_json::Value::String(s)) => s,
        _ => String::new(),
    };

    ActorRecord {
        id,
        fields,
        created_at,
        tags,
        notes,
    }
}
