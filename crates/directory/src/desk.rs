//! In-memory application desk — records submitted applications.

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use intake_core::client::{ApplicationDraft, ApplicationSubmitter};
use intake_core::error::CollaboratorError;
use tracing::{info, warn};

/// An [`ApplicationSubmitter`] that stores drafts in a Vec.
///
/// Submitting the same request id twice stores it once and returns the same
/// id, so an at-least-once caller cannot file a duplicate.
#[derive(Debug, Default)]
pub struct InMemoryApplicationDesk {
    submitted: Mutex<Vec<ApplicationDraft>>,
    offline: AtomicBool,
}

impl InMemoryApplicationDesk {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copies of every stored application, in submission order.
    pub fn submitted(&self) -> Vec<ApplicationDraft> {
        self.submitted
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn count(&self) -> usize {
        self.submitted.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Simulate the desk being unreachable.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }
}

#[async_trait]
impl ApplicationSubmitter for InMemoryApplicationDesk {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn submit(&self, draft: &ApplicationDraft) -> Result<String, CollaboratorError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(CollaboratorError::unavailable("application desk", "desk offline"));
        }

        let mut submitted = self.submitted.lock().unwrap_or_else(|e| e.into_inner());
        if submitted.iter().any(|d| d.request_id == draft.request_id) {
            warn!(request_id = %draft.request_id, "Duplicate submission ignored");
            return Ok(draft.request_id.clone());
        }
        submitted.push(draft.clone());
        info!(
            request_id = %draft.request_id,
            client_id = draft.client_id,
            application_type = %draft.application_type,
            "Application submitted"
        );
        Ok(draft.request_id.clone())
    }
}
