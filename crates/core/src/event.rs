//! Domain event system — decoupled communication between bounded contexts.
//!
//! Events are published when something interesting happens in the intake
//! flow. Audit, metrics or notification hooks subscribe without coupling to
//! the engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::actor::ActorId;

/// All domain events in the system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DomainEvent {
    /// The rate gate dropped an event before it reached the engine
    EventGated {
        actor_id: ActorId,
        lockout: bool,
        timestamp: DateTime<Utc>,
    },

    /// A session moved between workflow states
    StateChanged {
        actor_id: ActorId,
        from: String,
        to: String,
        timestamp: DateTime<Utc>,
    },

    /// A new client was created during the workflow
    ClientCreated {
        actor_id: ActorId,
        client_id: ActorId,
        timestamp: DateTime<Utc>,
    },

    /// An application was handed to the submitter
    ApplicationSubmitted {
        actor_id: ActorId,
        client_id: ActorId,
        request_id: String,
        timestamp: DateTime<Utc>,
    },
}

/// A broadcast-based event bus for domain events.
///
/// Uses `tokio::sync::broadcast` for multi-consumer pub/sub.
pub struct EventBus {
    sender: broadcast::Sender<Arc<DomainEvent>>,
}

impl EventBus {
    /// Create a new event bus with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all subscribers.
    pub fn publish(&self, event: DomainEvent) {
        // No subscribers is fine
        let _ = self.sender.send(Arc::new(event));
    }

    /// Subscribe to receive events.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<DomainEvent>> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
