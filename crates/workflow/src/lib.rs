//! Conversation engine — the per-actor intake workflow.
//!
//! Each staff member has one [`ConversationSession`]. Inbound events are
//! matched against a [`TransitionTable`] keyed by `(state, event shape)`;
//! data-entry states validate text, menu states accept declared action
//! tokens, and every non-transient state accepts `cancel`.
//!
//! ```text
//! Dispatch(actor, event)
//!   → turn lock (per actor)
//!   → rule lookup → validate / apply to a copy
//!   → collaborator call, no session lock held
//!   → commit copy (skipped on any error)
//! ```

pub mod engine;
pub mod error;
pub mod prompts;
pub mod request_id;
pub mod session;
pub mod state;
pub mod store;
pub mod table;
pub mod validate;

pub use engine::{ConversationEngine, Outcome, SideEffect};
pub use error::{FlowError, Rejection, TableError};
pub use prompts::PromptBook;
pub use request_id::RequestIdGenerator;
pub use session::{Captured, ConversationSession, Field, SearchMethod, SearchQuery, SessionData};
pub use state::{State, StateKind};
pub use store::{ActorSlot, SessionStore};
pub use table::{EventShape, Rule, TransitionTable, tokens};
pub use validate::Validator;
