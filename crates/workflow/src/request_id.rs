//! Human-readable application request ids.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use intake_core::actor::ActorId;

/// Produces `{prefix}-{actor}-{YYYYMMDDhhmmss}-{seq}`.
///
/// The timestamp keeps ids traceable; the process-wide sequence keeps them
/// unique when two confirms land in the same second.
#[derive(Debug)]
pub struct RequestIdGenerator {
    prefix: String,
    seq: AtomicU64,
}

impl RequestIdGenerator {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            seq: AtomicU64::new(0),
        }
    }

    pub fn next(&self, actor_id: ActorId, now: DateTime<Utc>) -> String {
        let seq = self.seq.fetch_add(1, Ordering::Relaxed) + 1;
        format!(
            "{}-{actor_id}-{}-{seq:04}",
            self.prefix,
            now.format("%Y%m%d%H%M%S")
        )
    }
}
