//! In-memory client backend — useful for testing and the local CLI.

use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use intake_core::actor::{ActorId, ActorRecord, Fields};
use intake_core::client::{ClientBackend, ClientDraft, ClientSummary};
use intake_core::error::CollaboratorError;
use serde_json::json;
use tracing::{debug, info};

const SERVICE: &str = "client backend";

/// A [`ClientBackend`] that keeps clients in a [`Directory`](crate::Directory).
pub struct InMemoryClients {
    directory: Arc<crate::Directory>,
    next_id: AtomicI64,
    offline: AtomicBool,
    /// Held across the duplicate-phone check and the insert in `create`
    creating: Mutex<()>,
}

impl InMemoryClients {
    pub fn new(directory: Arc<crate::Directory>) -> Self {
        let next_id = directory.max_id().unwrap_or(0) + 1;
        Self {
            directory,
            next_id: AtomicI64::new(next_id),
            offline: AtomicBool::new(false),
            creating: Mutex::new(()),
        }
    }

    /// Insert a client directly, bypassing validation. Returns its id.
    pub fn insert(&self, name: &str, phone: &str, address: Option<&str>) -> ActorId {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let mut fields = Fields::new();
        fields.insert("name".into(), json!(name));
        fields.insert("phone".into(), json!(phone));
        if let Some(address) = address {
            fields.insert("address".into(), json!(address));
        }
        self.directory.upsert(id, fields);
        id
    }

    /// Simulate the backend being unreachable.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn directory(&self) -> &Arc<crate::Directory> {
        &self.directory
    }

    fn ensure_online(&self) -> Result<(), CollaboratorError> {
        if self.offline.load(Ordering::SeqCst) {
            Err(CollaboratorError::unavailable(SERVICE, "backend offline"))
        } else {
            Ok(())
        }
    }
}

fn digits(s: &str) -> String {
    s.chars().filter(|c| c.is_ascii_digit()).collect()
}

fn summary(record: &ActorRecord) -> Option<ClientSummary> {
    Some(ClientSummary {
        id: record.id,
        name: record.field_str("name")?.to_string(),
        phone: record.field_str("phone").unwrap_or_default().to_string(),
        address: record.field_str("address").map(str::to_string),
    })
}

fn matches(client: &ClientSummary, query: &str, exact_match: bool) -> bool {
    let query = query.trim();
    let query_digits = digits(query);
    let looks_like_phone = !query_digits.is_empty() && query_digits.len() * 2 >= query.len();

    if looks_like_phone {
        let phone = digits(&client.phone);
        return if exact_match {
            phone == query_digits
        } else {
            phone.contains(&query_digits)
        };
    }

    let name = client.name.to_lowercase();
    let query = query.to_lowercase();
    if exact_match { name == query } else { name.contains(&query) }
}

#[async_trait]
impl ClientBackend for InMemoryClients {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn search(
        &self,
        query: &str,
        exact_match: bool,
    ) -> Result<Vec<ClientSummary>, CollaboratorError> {
        self.ensure_online()?;
        let results: Vec<ClientSummary> = self
            .directory
            .all()
            .values()
            .filter_map(summary)
            .filter(|c| matches(c, query, exact_match))
            .collect();
        debug!(exact_match, hits = results.len(), "Client search");
        Ok(results)
    }

    async fn get_by_id(&self, id: ActorId) -> Result<Option<ClientSummary>, CollaboratorError> {
        self.ensure_online()?;
        Ok(self.directory.get(id).as_ref().and_then(summary))
    }

    async fn create(&self, draft: &ClientDraft) -> Result<ActorId, CollaboratorError> {
        self.ensure_online()?;
        let (Some(name), Some(phone)) = (draft.name.as_deref(), draft.phone.as_deref()) else {
            return Err(CollaboratorError::rejected(SERVICE, "name and phone are required"));
        };

        let wanted = digits(phone);
        let _creating = self.creating.lock().unwrap_or_else(|e| e.into_inner());
        let duplicate = self
            .directory
            .all()
            .values()
            .filter_map(summary)
            .any(|c| digits(&c.phone) == wanted);
        if duplicate {
            return Err(CollaboratorError::rejected(
                SERVICE,
                format!("a client with phone {phone} already exists"),
            ));
        }

        let id = self.insert(name, phone, None);
        info!(client_id = id, "Client created");
        Ok(id)
    }
}
