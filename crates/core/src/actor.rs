//! Actor records — the shape of a directory entry.
//!
//! An actor is any identified participant: a staff member driving the chat,
//! or an end client the application is filed for. Both live in a directory
//! keyed by a positive integer id.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Stable integer identity of a staff user or client.
pub type ActorId = i64;

/// Mutable business fields (name, phone, address, role, language, ...).
pub type Fields = serde_json::Map<String, serde_json::Value>;

/// A directory entry.
///
/// `created_at`, `tags` and `notes` are fixed at creation. A later upsert can
/// never overwrite them; only the directory's dedicated clearing operation
/// resets `tags` and `notes`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActorRecord {
    /// Assigned at first creation, never changes
    pub id: ActorId,

    /// Last-write-wins business fields
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub fields: Fields,

    /// When the record was first created
    pub created_at: DateTime<Utc>,

    /// Ordered labels, empty by default
    #[serde(default)]
    pub tags: Vec<String>,

    /// Free-form note, empty by default
    #[serde(default)]
    pub notes: String,
}

impl ActorRecord {
    /// Field names that are owned by the record itself, not by callers.
    pub const PROTECTED_FIELDS: [&'static str; 3] = ["created_at", "tags", "notes"];

    /// Whether `key` names one of the immutable-after-creation fields.
    pub fn is_protected(key: &str) -> bool {
        Self::PROTECTED_FIELDS.contains(&key)
    }

    /// Read a mutable field as a string, if present and a string.
    pub fn field_str(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(|v| v.as_str())
    }
}
