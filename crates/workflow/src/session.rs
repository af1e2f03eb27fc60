//! Per-actor session: current state plus the typed draft being assembled.

use std::fmt;

use chrono::{DateTime, Utc};
use intake_core::actor::ActorId;
use intake_core::client::{ClientDraft, ClientSummary};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::state::State;

/// How the staff member chose to look a client up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchMethod {
    Phone,
    Name,
    Id,
}

impl SearchMethod {
    /// The data-entry state that collects the query for this method.
    pub fn entry_state(self) -> State {
        match self {
            SearchMethod::Phone => State::EnteringClientPhone,
            SearchMethod::Name => State::EnteringClientName,
            SearchMethod::Id => State::EnteringClientId,
        }
    }
}

/// The session field a data-entry state writes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Phone,
    Name,
    ClientId,
    NewClientName,
    NewClientPhone,
    Details,
}

impl Field {
    pub fn as_str(self) -> &'static str {
        match self {
            Field::Phone => "phone",
            Field::Name => "name",
            Field::ClientId => "client_id",
            Field::NewClientName => "new_client.name",
            Field::NewClientPhone => "new_client.phone",
            Field::Details => "details",
        }
    }
}

/// A validated value ready to be written into [`SessionData`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Captured {
    Text(String),
    Id(ActorId),
}

/// The draft accumulated over one workflow instance.
///
/// Cleared on cancel and on every fresh start, so nothing from a previous
/// instance leaks into the next one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_method: Option<SearchMethod>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<ActorId>,
    /// Every match of the last search, in backend order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub candidates: Vec<ClientSummary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_client: Option<ClientSummary>,
    #[serde(default, skip_serializing_if = "ClientDraft::is_empty")]
    pub new_client: ClientDraft,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub application_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    /// Set once the application has been handed to the submitter
    #[serde(default)]
    pub confirmed: bool,
}

impl SessionData {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Write a validated value into the slot owned by `field`.
    pub fn record(&mut self, field: Field, value: Captured) {
        match (field, value) {
            (Field::ClientId, Captured::Id(id)) => self.client_id = Some(id),
            (Field::Phone, Captured::Text(v)) => self.phone = Some(v),
            (Field::Name, Captured::Text(v)) => self.name = Some(v),
            (Field::NewClientName, Captured::Text(v)) => self.new_client.name = Some(v),
            (Field::NewClientPhone, Captured::Text(v)) => self.new_client.phone = Some(v),
            (Field::Details, Captured::Text(v)) => self.details = Some(v),
            (field, value) => {
                tracing::warn!(field = field.as_str(), ?value, "Captured value does not fit field");
            }
        }
    }

    /// The search query collected for the chosen method, if any.
    pub fn search_query(&self) -> Option<SearchQuery> {
        Some(match self.search_method? {
            SearchMethod::Phone => SearchQuery::Phone(self.phone.clone()?),
            SearchMethod::Name => SearchQuery::Name(self.name.clone()?),
            SearchMethod::Id => SearchQuery::Id(self.client_id?),
        })
    }
}

/// A complete client lookup. Phone numbers match exactly, names by
/// substring.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchQuery {
    Phone(String),
    Name(String),
    Id(ActorId),
}

impl fmt::Display for SearchQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SearchQuery::Phone(q) | SearchQuery::Name(q) => f.write_str(q),
            SearchQuery::Id(id) => write!(f, "ID {id}"),
        }
    }
}

/// One actor's conversation state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationSession {
    pub actor_id: ActorId,
    pub state: State,
    /// Kept intact in `application_created` so a late duplicate confirm
    /// can be re-acknowledged with the same request id
    pub data: SessionData,
    /// Correlates log lines of one workflow instance
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance_id: Option<Uuid>,
    pub updated_at: DateTime<Utc>,
}

impl ConversationSession {
    pub fn new(actor_id: ActorId) -> Self {
        Self {
            actor_id,
            state: State::Idle,
            data: SessionData::default(),
            instance_id: None,
            updated_at: Utc::now(),
        }
    }

    /// Back to `idle` with every field cleared.
    pub fn reset(&mut self) {
        self.state = State::Idle;
        self.data = SessionData::default();
        self.instance_id = None;
    }
}
