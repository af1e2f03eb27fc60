//! Engine error types.

use intake_core::error::CollaboratorError;
use intake_core::message::Prompt;

use crate::state::State;

/// Why a dispatch did not advance the session.
///
/// Every variant leaves the session exactly as it was before the event.
#[derive(Debug, thiserror::Error)]
pub enum FlowError {
    /// Bad input in a data-entry state; the same prompt is shown again
    #[error("invalid {field} in {state}: {reason}")]
    Validation {
        state: State,
        field: &'static str,
        reason: String,
    },

    /// Stale or unexpected action token (or text sent to a menu)
    #[error("{received} is not valid in {state}")]
    InvalidAction { state: State, received: String },

    /// An external collaborator failed mid-transition; the actor may retry
    #[error("{operation} failed in {state}: {source}")]
    Collaborator {
        state: State,
        operation: &'static str,
        #[source]
        source: CollaboratorError,
    },

    /// The draft lacks something the transition needs
    #[error("{state}: draft is missing {missing}")]
    IncompleteDraft { state: State, missing: &'static str },
}

impl FlowError {
    /// The state the session stayed in.
    pub fn state(&self) -> State {
        match self {
            Self::Validation { state, .. }
            | Self::InvalidAction { state, .. }
            | Self::Collaborator { state, .. }
            | Self::IncompleteDraft { state, .. } => *state,
        }
    }

    /// Whether re-sending the same event can succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Collaborator { source, .. } => {
                matches!(source, CollaboratorError::Unavailable { .. })
            }
            _ => false,
        }
    }
}

/// A failed dispatch plus the prompt for the state the actor stayed in.
///
/// The prompt is rendered before the actor's turn is released, so a later
/// event from the same actor cannot change what it shows.
#[derive(Debug, thiserror::Error)]
#[error("{error}")]
pub struct Rejection {
    pub error: FlowError,
    pub reprompt: Prompt,
}

/// A defect in how the engine was put together, found at construction.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TableError {
    #[error("duplicate rule for ({state}, {event})")]
    DuplicateRule { state: State, event: String },

    #[error("data-entry state {0} has no text rule")]
    MissingTextRule(State),

    #[error("state {0} accepts text but is not a data-entry state")]
    TextInMenuState(State),

    #[error("transient state {0} must not have rules")]
    RuleInTransientState(State),

    #[error("state {0} has no cancel rule")]
    MissingCancel(State),

    #[error("rule ({state}, {event}) targets transient state {target}")]
    TargetsTransient {
        state: State,
        event: String,
        target: State,
    },

    #[error("no application types configured")]
    NoApplicationTypes,

    #[error("invalid application type code: {0:?}")]
    InvalidTypeCode(String),

    #[error("invalid validation pattern: {0}")]
    InvalidPattern(String),
}
