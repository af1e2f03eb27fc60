//! Client and application collaborators.
//!
//! The conversation engine never talks to storage directly. It depends on two
//! capabilities: a [`ClientBackend`] that can search, look up and create
//! clients, and an [`ApplicationSubmitter`] that accepts a finished
//! application draft. Production wires these to the real backend; tests and
//! the local CLI use the in-memory variants from `intake-directory`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::actor::ActorId;
use crate::error::CollaboratorError;

/// What the engine needs to know about a client to show and select it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientSummary {
    pub id: ActorId,
    pub name: String,
    pub phone: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

/// Fields collected for a client that does not exist yet.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientDraft {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

impl ClientDraft {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.phone.is_none()
    }
}

/// A completed application handed to the submitter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationDraft {
    /// Human-readable, traceable identifier synthesized by the engine
    pub request_id: String,
    /// The staff member filing the application
    pub staff_id: ActorId,
    /// The client the application is for
    pub client_id: ActorId,
    /// Code of the selected application type
    pub application_type: String,
    /// Free-text details entered by the staff member
    pub details: String,
    pub created_at: DateTime<Utc>,
}

/// Client search, lookup and creation.
#[async_trait]
pub trait ClientBackend: Send + Sync {
    /// Backend name for logs (e.g. "in_memory", "crm").
    fn name(&self) -> &str;

    /// Search clients. Phone lookups use `exact_match = true`.
    async fn search(
        &self,
        query: &str,
        exact_match: bool,
    ) -> std::result::Result<Vec<ClientSummary>, CollaboratorError>;

    /// Look up a client by id. `Ok(None)` is a miss, not a failure.
    async fn get_by_id(
        &self,
        id: ActorId,
    ) -> std::result::Result<Option<ClientSummary>, CollaboratorError>;

    /// Create a client and return its new id. Never returns a partial id.
    async fn create(&self, draft: &ClientDraft) -> std::result::Result<ActorId, CollaboratorError>;
}

/// Application submission.
#[async_trait]
pub trait ApplicationSubmitter: Send + Sync {
    fn name(&self) -> &str;

    /// Submit a completed draft and return the request identifier.
    async fn submit(&self, draft: &ApplicationDraft) -> std::result::Result<String, CollaboratorError>;
}
