//! Workflow states.

use serde::{Deserialize, Serialize};

/// Every state an intake session can be in.
///
/// ```text
/// idle → selecting_search_method → entering_client_{phone,name,id} → searching_client
///      → confirming_client_selection | client_not_found
///      → selecting_application_type → entering_application_details
///      → confirming_application → application_created
///
/// selecting_search_method | client_not_found → entering_new_client_name
///      → entering_new_client_phone → selecting_application_type
///
/// * → idle on cancel
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum State {
    #[default]
    Idle,
    SelectingSearchMethod,
    EnteringClientPhone,
    EnteringClientName,
    EnteringClientId,
    EnteringNewClientName,
    EnteringNewClientPhone,
    SearchingClient,
    ClientNotFound,
    ConfirmingClientSelection,
    SelectingApplicationType,
    EnteringApplicationDetails,
    ConfirmingApplication,
    ApplicationCreated,
}

/// How a state consumes events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateKind {
    /// Accepts only declared action tokens
    Menu,
    /// Accepts validated text, plus cancel
    DataEntry,
    /// Only occupied while a collaborator call is in flight, never committed
    Transient,
    /// End of a workflow instance; accepts follow-up actions only
    Terminal,
}

impl State {
    pub const ALL: [State; 14] = [
        State::Idle,
        State::SelectingSearchMethod,
        State::EnteringClientPhone,
        State::EnteringClientName,
        State::EnteringClientId,
        State::EnteringNewClientName,
        State::EnteringNewClientPhone,
        State::SearchingClient,
        State::ClientNotFound,
        State::ConfirmingClientSelection,
        State::SelectingApplicationType,
        State::EnteringApplicationDetails,
        State::ConfirmingApplication,
        State::ApplicationCreated,
    ];

    pub fn kind(self) -> StateKind {
        match self {
            State::EnteringClientPhone
            | State::EnteringClientName
            | State::EnteringClientId
            | State::EnteringNewClientName
            | State::EnteringNewClientPhone
            | State::EnteringApplicationDetails => StateKind::DataEntry,
            State::SearchingClient => StateKind::Transient,
            State::ApplicationCreated => StateKind::Terminal,
            State::Idle
            | State::SelectingSearchMethod
            | State::ClientNotFound
            | State::ConfirmingClientSelection
            | State::SelectingApplicationType
            | State::ConfirmingApplication => StateKind::Menu,
        }
    }

    pub fn is_data_entry(self) -> bool {
        self.kind() == StateKind::DataEntry
    }

    pub fn as_str(self) -> &'static str {
        match self {
            State::Idle => "idle",
            State::SelectingSearchMethod => "selecting_search_method",
            State::EnteringClientPhone => "entering_client_phone",
            State::EnteringClientName => "entering_client_name",
            State::EnteringClientId => "entering_client_id",
            State::EnteringNewClientName => "entering_new_client_name",
            State::EnteringNewClientPhone => "entering_new_client_phone",
            State::SearchingClient => "searching_client",
            State::ClientNotFound => "client_not_found",
            State::ConfirmingClientSelection => "confirming_client_selection",
            State::SelectingApplicationType => "selecting_application_type",
            State::EnteringApplicationDetails => "entering_application_details",
            State::ConfirmingApplication => "confirming_application",
            State::ApplicationCreated => "application_created",
        }
    }
}

impl std::fmt::Display for State {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
