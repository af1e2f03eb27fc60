//! Actor directory and in-memory collaborators for the intake desk.
//!
//! - [`Directory`] — keyed store of actor records with upsert semantics that
//!   never overwrite the immutable-after-creation fields.
//! - [`InMemoryClients`] — a [`ClientBackend`](intake_core::ClientBackend)
//!   over a `Directory`, used by tests and the local CLI.
//! - [`InMemoryApplicationDesk`] — an
//!   [`ApplicationSubmitter`](intake_core::ApplicationSubmitter) that keeps
//!   submitted drafts in memory.

pub mod clients;
pub mod desk;
pub mod directory;

pub use clients::InMemoryClients;
pub use desk::InMemoryApplicationDesk;
pub use directory::Directory;
