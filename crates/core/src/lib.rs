//! # Intake Core
//!
//! Domain types, traits, and error definitions for the intake desk: the
//! staff-facing chat workflow that locates or creates a client and files a
//! service application on their behalf.
//!
//! This crate has **no framework dependencies** beyond serde/tokio sync
//! primitives. Every collaborator the workflow talks to is a trait here;
//! implementations live in their own crates so tests can swap in doubles.

pub mod actor;
pub mod channel;
pub mod client;
pub mod error;
pub mod event;
pub mod message;

// Re-export key types at crate root for ergonomics
pub use actor::{ActorId, ActorRecord, Fields};
pub use channel::{Channel, ChannelId, ChannelMessage, Payload};
pub use client::{ApplicationDraft, ApplicationSubmitter, ClientBackend, ClientDraft, ClientSummary};
pub use error::{ChannelError, CollaboratorError, Error, Result};
pub use event::{DomainEvent, EventBus};
pub use message::{Choice, InboundEvent, Prompt, PromptTone};
