//! Per-actor session storage.
//!
//! Each actor owns an [`ActorSlot`] with two locks:
//! - `turn` (async) is held for a whole dispatch, so one actor's events are
//!   applied strictly one after another. It is never shared between actors.
//! - `session` (sync) guards the committed session and is only held for a
//!   clone or a store, never across an await.
//!
//! A slot also remembers when it last received an event, committed or not,
//! so an actor retrying bad input is not swept as idle.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use intake_core::actor::ActorId;
use tokio::sync::MutexGuard;
use tracing::debug;

use crate::session::ConversationSession;

#[derive(Debug)]
pub struct ActorSlot {
    turn: tokio::sync::Mutex<()>,
    session: Mutex<ConversationSession>,
    last_event_at: Mutex<Option<DateTime<Utc>>>,
}

impl ActorSlot {
    fn new(actor_id: ActorId) -> Self {
        Self {
            turn: tokio::sync::Mutex::new(()),
            session: Mutex::new(ConversationSession::new(actor_id)),
            last_event_at: Mutex::new(None),
        }
    }

    /// Record that an event arrived, without touching the session.
    pub fn touch(&self, now: DateTime<Utc>) {
        let mut last = self.last_event_at.lock().unwrap_or_else(|e| e.into_inner());
        *last = Some(last.map_or(now, |seen| seen.max(now)));
    }

    /// The later of the last commit and the last event.
    pub fn last_active(&self) -> DateTime<Utc> {
        let updated_at = self.session.lock().unwrap_or_else(|e| e.into_inner()).updated_at;
        let last_event = *self.last_event_at.lock().unwrap_or_else(|e| e.into_inner());
        last_event.map_or(updated_at, |seen| seen.max(updated_at))
    }

    /// Wait for this actor's previous event to finish.
    pub async fn begin_turn(&self) -> MutexGuard<'_, ()> {
        self.turn.lock().await
    }

    /// Copy of the committed session.
    pub fn snapshot(&self) -> ConversationSession {
        self.session.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn commit(&self, session: ConversationSession) {
        *self.session.lock().unwrap_or_else(|e| e.into_inner()) = session;
    }
}

/// All live sessions, sharded by actor id.
#[derive(Debug, Default)]
pub struct SessionStore {
    slots: DashMap<ActorId, Arc<ActorSlot>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The actor's slot, created on first use.
    pub fn slot(&self, actor_id: ActorId) -> Arc<ActorSlot> {
        self.slots
            .entry(actor_id)
            .or_insert_with(|| Arc::new(ActorSlot::new(actor_id)))
            .clone()
    }

    pub fn snapshot(&self, actor_id: ActorId) -> Option<ConversationSession> {
        self.slots.get(&actor_id).map(|slot| slot.snapshot())
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Drop sessions with no event or commit for longer than `max_idle`. A dropped actor
    /// starts over at `idle` on its next event. Returns how many were dropped.
    ///
    /// A slot someone else holds a handle to is mid-dispatch (or about to
    /// be), so it is kept. `slot()` clones under the same shard lock that
    /// `retain` holds, so the count cannot change under us.
    pub fn sweep_idle(&self, now: DateTime<Utc>, max_idle: Duration) -> usize {
        let max_idle = chrono::Duration::from_std(max_idle).unwrap_or(chrono::Duration::MAX);
        let before = self.slots.len();
        self.slots.retain(|actor_id, slot| {
            if Arc::strong_count(slot) > 1 {
                return true;
            }
            let last_active = slot.last_active();
            let keep = now.signed_duration_since(last_active) <= max_idle;
            if !keep {
                debug!(actor_id, %last_active, "Dropping idle session");
            }
            keep
        });
        before - self.slots.len()
    }
}
