//! Conversation engine — one transition per inbound event.
//!
//! A dispatch runs in three phases:
//! 1. Under the actor's turn lock, read a snapshot and apply the matching
//!    rule to a copy. Validation and stale actions fail here and nothing is
//!    written.
//! 2. If the rule needs a collaborator (search, client creation,
//!    submission), call it. No session lock is held during the call; other
//!    actors proceed freely and this actor's next event waits for its turn.
//! 3. Commit the copy. A failed collaborator call skips the commit, so the
//!    session stays in its pre-transition state with pre-transition data.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use intake_config::AppConfig;
use intake_core::actor::ActorId;
use intake_core::client::{
    ApplicationDraft, ApplicationSubmitter, ClientBackend, ClientDraft, ClientSummary,
};
use intake_core::error::CollaboratorError;
use intake_core::message::{InboundEvent, Prompt};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{FlowError, Rejection, TableError};
use crate::prompts::{self, PromptBook};
use crate::request_id::RequestIdGenerator;
use crate::session::{ConversationSession, SearchQuery};
use crate::state::State;
use crate::store::{ActorSlot, SessionStore};
use crate::table::{After, Rule, TransitionTable};
use crate::validate::Validator;

/// A committed side effect, reported so the boundary can publish it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SideEffect {
    ClientCreated(ActorId),
    ApplicationSubmitted { client_id: ActorId, request_id: String },
}

/// Result of a successful dispatch.
#[derive(Debug, Clone)]
pub struct Outcome {
    /// Prompts to render, in order
    pub prompts: Vec<Prompt>,
    /// The committed session
    pub session: ConversationSession,
    pub previous: State,
    pub side_effect: Option<SideEffect>,
}

impl Outcome {
    pub fn state_changed(&self) -> bool {
        self.previous != self.session.state
    }
}

/// Collaborator work a rule asked for.
enum Effect {
    None,
    Search(SearchQuery),
    CreateClient(ClientDraft),
    Submit(ApplicationDraft),
}

pub struct ConversationEngine {
    table: TransitionTable,
    validator: Validator,
    prompts: PromptBook,
    request_ids: RequestIdGenerator,
    store: Arc<SessionStore>,
    clients: Arc<dyn ClientBackend>,
    submitter: Arc<dyn ApplicationSubmitter>,
}

impl std::fmt::Debug for ConversationEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConversationEngine")
            .field("rules", &self.table.len())
            .field("sessions", &self.store.len())
            .field("clients", &self.clients.name())
            .field("submitter", &self.submitter.name())
            .finish()
    }
}

impl ConversationEngine {
    pub fn new(
        config: &AppConfig,
        clients: Arc<dyn ClientBackend>,
        submitter: Arc<dyn ApplicationSubmitter>,
    ) -> Result<Self, TableError> {
        Ok(Self {
            table: TransitionTable::standard(&config.application_types)?,
            validator: Validator::new(&config.validation)?,
            prompts: PromptBook::new(&config.application_types),
            request_ids: RequestIdGenerator::new(config.request_id_prefix.clone()),
            store: Arc::new(SessionStore::new()),
            clients,
            submitter,
        })
    }

    pub fn table(&self) -> &TransitionTable {
        &self.table
    }

    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    /// Apply `event` to the actor's session.
    pub async fn dispatch(
        &self,
        actor_id: ActorId,
        event: InboundEvent,
    ) -> Result<Outcome, FlowError> {
        self.dispatch_at(actor_id, event, Utc::now()).await
    }

    /// [`dispatch`](Self::dispatch) with an explicit clock, used for request
    /// ids and `updated_at`.
    pub async fn dispatch_at(
        &self,
        actor_id: ActorId,
        event: InboundEvent,
        now: DateTime<Utc>,
    ) -> Result<Outcome, FlowError> {
        self.dispatch_with_reprompt(actor_id, event, now)
            .await
            .map_err(|rejection| rejection.error)
    }

    /// [`dispatch_at`](Self::dispatch_at), but a failure also carries the
    /// prompt to show again, taken from the session the event was rejected
    /// in.
    ///
    /// Every event counts as activity for the idle sweep, even one that is
    /// rejected.
    pub async fn dispatch_with_reprompt(
        &self,
        actor_id: ActorId,
        event: InboundEvent,
        now: DateTime<Utc>,
    ) -> Result<Outcome, Rejection> {
        let slot = self.store.slot(actor_id);
        let _turn = slot.begin_turn().await;
        slot.touch(now);

        self.run_turn(&slot, event, now)
            .await
            .map_err(|error| Rejection {
                reprompt: self.prompts.for_session(&slot.snapshot()),
                error,
            })
    }

    /// One event against a slot whose turn the caller holds.
    async fn run_turn(
        &self,
        slot: &ActorSlot,
        event: InboundEvent,
        now: DateTime<Utc>,
    ) -> Result<Outcome, FlowError> {
        let mut next = slot.snapshot();
        let actor_id = next.actor_id;
        let previous = next.state;

        let Some(rule) = self.table.lookup(previous, &event) else {
            debug!(actor_id, state = %previous, event = %event.describe(), "No rule for event");
            return Err(FlowError::InvalidAction {
                state: previous,
                received: event.describe(),
            });
        };

        let mut notices = Vec::new();
        let effect = self.apply(rule, &mut next, &event, now, &mut notices)?;
        let side_effect = self.perform(effect, &mut next, &mut notices).await?;

        next.updated_at = now;
        slot.commit(next.clone());

        if previous != next.state {
            info!(
                actor_id,
                instance = ?next.instance_id,
                from = %previous,
                to = %next.state,
                "Session transition"
            );
        }

        notices.push(self.prompts.for_session(&next));
        Ok(Outcome {
            prompts: notices,
            session: next,
            previous,
            side_effect,
        })
    }

    /// Phase 1: pure. Mutates only the working copy.
    fn apply(
        &self,
        rule: &Rule,
        next: &mut ConversationSession,
        event: &InboundEvent,
        now: DateTime<Utc>,
        notices: &mut Vec<Prompt>,
    ) -> Result<Effect, FlowError> {
        let state = next.state;

        match rule {
            Rule::Capture { field, then } => {
                let InboundEvent::Text(raw) = event else {
                    return Err(FlowError::InvalidAction {
                        state,
                        received: event.describe(),
                    });
                };
                let value = self.validator.check(*field, raw).map_err(|reason| {
                    debug!(actor_id = next.actor_id, %state, field = field.as_str(), %reason, "Input rejected");
                    FlowError::Validation {
                        state,
                        field: field.as_str(),
                        reason,
                    }
                })?;
                next.data.record(*field, value);

                match then {
                    After::Goto(target) => {
                        next.state = *target;
                        Ok(Effect::None)
                    }
                    After::Search => next
                        .data
                        .search_query()
                        .map(Effect::Search)
                        .ok_or(FlowError::IncompleteDraft {
                            state,
                            missing: "search query",
                        }),
                    After::CreateClient => Ok(Effect::CreateClient(next.data.new_client.clone())),
                }
            }

            Rule::Goto(target) => {
                next.state = *target;
                Ok(Effect::None)
            }

            Rule::ChooseSearch(method) => {
                next.data.search_method = Some(*method);
                next.state = method.entry_state();
                Ok(Effect::None)
            }

            Rule::Start => {
                next.reset();
                next.instance_id = Some(Uuid::new_v4());
                next.state = State::SelectingSearchMethod;
                debug!(actor_id = next.actor_id, instance = ?next.instance_id, "Workflow started");
                Ok(Effect::None)
            }

            Rule::Cancel => {
                next.reset();
                if state != State::Idle {
                    notices.push(prompts::cancelled());
                }
                Ok(Effect::None)
            }

            Rule::RetrySearch => {
                let method = next.data.search_method.ok_or(FlowError::IncompleteDraft {
                    state,
                    missing: "search method",
                })?;
                next.state = method.entry_state();
                Ok(Effect::None)
            }

            Rule::SearchAgain => {
                let data = &mut next.data;
                data.search_method = None;
                data.phone = None;
                data.name = None;
                data.client_id = None;
                data.candidates.clear();
                data.selected_client = None;
                next.state = State::SelectingSearchMethod;
                Ok(Effect::None)
            }

            Rule::NextMatch => {
                let data = &mut next.data;
                if data.candidates.is_empty() {
                    return Err(FlowError::IncompleteDraft {
                        state,
                        missing: "search results",
                    });
                }
                let current = data
                    .selected_client
                    .as_ref()
                    .and_then(|s| data.candidates.iter().position(|c| c.id == s.id));
                let index = current.map_or(0, |i| (i + 1) % data.candidates.len());
                data.selected_client = Some(data.candidates[index].clone());
                Ok(Effect::None)
            }

            Rule::PickType(code) => {
                next.data.application_type = Some(code.clone());
                next.state = State::EnteringApplicationDetails;
                Ok(Effect::None)
            }

            Rule::Submit => {
                if next.data.confirmed {
                    // Double press; the first confirm already submitted
                    let request_id = next.data.request_id.as_deref().unwrap_or_default();
                    info!(actor_id = next.actor_id, %request_id, "Duplicate confirm ignored");
                    notices.push(prompts::already_submitted(request_id));
                    return Ok(Effect::None);
                }
                self.application_draft(next, now).map(Effect::Submit)
            }

            Rule::RepeatReceipt => {
                let request_id = next.data.request_id.as_deref().unwrap_or_default();
                info!(actor_id = next.actor_id, %request_id, "Duplicate confirm after completion");
                notices.push(prompts::already_submitted(request_id));
                Ok(Effect::None)
            }
        }
    }

    fn application_draft(
        &self,
        session: &ConversationSession,
        now: DateTime<Utc>,
    ) -> Result<ApplicationDraft, FlowError> {
        let state = session.state;
        let missing = |missing| FlowError::IncompleteDraft { state, missing };
        let data = &session.data;

        let client = data.selected_client.as_ref().ok_or_else(|| missing("client"))?;
        let application_type = data
            .application_type
            .clone()
            .ok_or_else(|| missing("application type"))?;
        let details = data.details.clone().ok_or_else(|| missing("details"))?;

        Ok(ApplicationDraft {
            request_id: self.request_ids.next(session.actor_id, now),
            staff_id: session.actor_id,
            client_id: client.id,
            application_type,
            details,
            created_at: now,
        })
    }

    /// Phase 2: collaborator I/O. On error the working copy is dropped by
    /// the caller.
    async fn perform(
        &self,
        effect: Effect,
        next: &mut ConversationSession,
        notices: &mut Vec<Prompt>,
    ) -> Result<Option<SideEffect>, FlowError> {
        let actor_id = next.actor_id;
        let state = next.state;
        let failed = |operation: &'static str| {
            move |source: CollaboratorError| {
                warn!(actor_id, %state, operation, error = %source, "Collaborator failed, session unchanged");
                FlowError::Collaborator {
                    state,
                    operation,
                    source,
                }
            }
        };

        match effect {
            Effect::None => Ok(None),

            Effect::Search(lookup) => {
                debug!(actor_id, from = %state, to = %State::SearchingClient, "Searching client");
                let found = self.search(lookup).await.map_err(failed("client search"))?;
                let data = &mut next.data;
                if found.is_empty() {
                    data.candidates.clear();
                    data.selected_client = None;
                    next.state = State::ClientNotFound;
                } else {
                    data.selected_client = found.first().cloned();
                    data.candidates = found;
                    next.state = State::ConfirmingClientSelection;
                }
                Ok(None)
            }

            Effect::CreateClient(draft) => {
                let id = self
                    .clients
                    .create(&draft)
                    .await
                    .map_err(failed("client creation"))?;
                let client = ClientSummary {
                    id,
                    name: draft.name.unwrap_or_default(),
                    phone: draft.phone.unwrap_or_default(),
                    address: None,
                };
                info!(actor_id, client_id = id, "Client created");
                notices.push(prompts::client_created(&client));
                next.data.candidates = vec![client.clone()];
                next.data.selected_client = Some(client);
                next.state = State::SelectingApplicationType;
                Ok(Some(SideEffect::ClientCreated(id)))
            }

            Effect::Submit(draft) => {
                let request_id = self
                    .submitter
                    .submit(&draft)
                    .await
                    .map_err(failed("application submission"))?;
                info!(actor_id, %request_id, client_id = draft.client_id, "Application submitted");
                next.data.confirmed = true;
                next.data.request_id = Some(request_id.clone());
                next.state = State::ApplicationCreated;
                Ok(Some(SideEffect::ApplicationSubmitted {
                    client_id: draft.client_id,
                    request_id,
                }))
            }
        }
    }

    async fn search(&self, query: SearchQuery) -> Result<Vec<ClientSummary>, CollaboratorError> {
        let result = match query {
            SearchQuery::Phone(phone) => self.clients.search(&phone, true).await,
            SearchQuery::Name(name) => self.clients.search(&name, false).await,
            SearchQuery::Id(id) => self
                .clients
                .get_by_id(id)
                .await
                .map(|hit| hit.into_iter().collect()),
        };
        match result {
            Err(CollaboratorError::NotFound(_)) => Ok(Vec::new()),
            other => other,
        }
    }

    /// The actor's committed session (a fresh idle one if never seen).
    pub fn session(&self, actor_id: ActorId) -> ConversationSession {
        self.store
            .snapshot(actor_id)
            .unwrap_or_else(|| ConversationSession::new(actor_id))
    }

    pub fn prompt_for(&self, session: &ConversationSession) -> Prompt {
        self.prompts.for_session(session)
    }

    /// The prompt for the actor's current state.
    pub fn current_prompt(&self, actor_id: ActorId) -> Prompt {
        self.prompt_for(&self.session(actor_id))
    }

    /// Force the actor back to `idle`, waiting for any in-flight event.
    pub async fn reset(&self, actor_id: ActorId) {
        let slot = self.store.slot(actor_id);
        let _turn = slot.begin_turn().await;
        let mut session = slot.snapshot();
        session.reset();
        session.updated_at = Utc::now();
        slot.commit(session);
        info!(actor_id, "Session reset");
    }

    /// Periodically drop sessions idle longer than `max_idle`.
    pub fn start_sweeper(&self, every: Duration, max_idle: Duration) -> JoinHandle<()> {
        let store = Arc::clone(&self.store);
        info!(every_secs = every.as_secs(), max_idle_secs = max_idle.as_secs(), "Session sweeper started");
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let dropped = store.sweep_idle(Utc::now(), max_idle);
                if dropped > 0 {
                    info!(dropped, "Idle sessions swept");
                }
            }
        })
    }
}
