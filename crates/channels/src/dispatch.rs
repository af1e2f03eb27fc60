//! Dispatch boundary — transport messages in, prompts out.
//!
//! The only place an error becomes something a staff member reads. For each
//! inbound message:
//! 1. parse the sender into an actor id (malformed senders are dropped)
//! 2. ask the [`RateGate`]; a denial answers with a wait notice and stops
//! 3. record the staff member in the directory
//! 4. hand the event to the [`ConversationEngine`]
//! 5. translate the outcome or [`Rejection`] into prompts, audit, and
//!    publish domain events

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use intake_core::actor::{ActorId, Fields};
use intake_core::channel::ChannelMessage;
use intake_core::error::{ChannelError, CollaboratorError};
use intake_core::event::{DomainEvent, EventBus};
use intake_core::message::{InboundEvent, Prompt};
use intake_directory::Directory;
use intake_security::{AuditEvent, AuditLogger, AuditOutcome, GateDecision, RateGate, TracingSink};
use intake_workflow::{ConversationEngine, FlowError, Outcome, Rejection, SideEffect};
use serde_json::json;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::registry::ChannelRegistry;

pub struct Dispatcher {
    engine: Arc<ConversationEngine>,
    gate: RateGate,
    staff: Arc<Directory>,
    audit: Arc<AuditLogger>,
    events: Arc<EventBus>,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("engine", &self.engine)
            .field("gate", &self.gate)
            .field("staff", &self.staff.len())
            .finish()
    }
}

impl Dispatcher {
    pub fn new(engine: Arc<ConversationEngine>, gate: RateGate, staff: Arc<Directory>) -> Self {
        Self {
            engine,
            gate,
            staff,
            audit: Arc::new(AuditLogger::with_sinks(vec![Box::new(TracingSink)])),
            events: Arc::new(EventBus::default()),
        }
    }

    pub fn with_audit(mut self, audit: Arc<AuditLogger>) -> Self {
        self.audit = audit;
        self
    }

    pub fn with_events(mut self, events: Arc<EventBus>) -> Self {
        self.events = events;
        self
    }

    pub fn engine(&self) -> &Arc<ConversationEngine> {
        &self.engine
    }

    pub fn gate(&self) -> &RateGate {
        &self.gate
    }

    pub fn staff(&self) -> &Arc<Directory> {
        &self.staff
    }

    pub fn audit(&self) -> &Arc<AuditLogger> {
        &self.audit
    }

    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    /// Handle one transport message. An empty result means nothing should
    /// be sent back.
    pub async fn handle(&self, msg: &ChannelMessage) -> Vec<Prompt> {
        let actor_id = match msg.actor_id() {
            Ok(id) => id,
            Err(e) => {
                warn!(channel = %msg.channel_id, sender = %msg.sender_id, error = %e, "Dropping malformed message");
                return Vec::new();
            }
        };

        if let Some(denied) = self.check_gate(actor_id, Instant::now()) {
            return denied;
        }
        self.touch_staff(actor_id, msg);
        self.dispatch_admitted(actor_id, msg.to_event()).await
    }

    /// Gate and dispatch an already parsed event, with an explicit clock
    /// for the gate.
    pub async fn handle_event_at(
        &self,
        actor_id: ActorId,
        event: InboundEvent,
        now: Instant,
    ) -> Vec<Prompt> {
        if let Some(denied) = self.check_gate(actor_id, now) {
            return denied;
        }
        self.dispatch_admitted(actor_id, event).await
    }

    fn check_gate(&self, actor_id: ActorId, now: Instant) -> Option<Vec<Prompt>> {
        let (lockout, prompt, details) = match self.gate.check(actor_id, now) {
            GateDecision::Allowed => return None,
            GateDecision::SoftWait { remaining } => {
                let secs = remaining.as_secs_f64();
                (
                    false,
                    Prompt::error(format!(
                        "⏳ Please wait {secs:.1}s before sending another message."
                    )),
                    format!("retry in {secs:.1}s"),
                )
            }
            GateDecision::Lockout => (
                true,
                Prompt::error("🚫 Too many messages. Slow down and try again in a moment."),
                "lockout".to_string(),
            ),
        };

        self.audit.log(
            AuditEvent::RateLimited { lockout },
            actor_id,
            AuditOutcome::Denied,
            Some(details),
        );
        self.events.publish(DomainEvent::EventGated {
            actor_id,
            lockout,
            timestamp: Utc::now(),
        });
        Some(vec![prompt])
    }

    fn touch_staff(&self, actor_id: ActorId, msg: &ChannelMessage) {
        let mut fields = Fields::new();
        if let Some(name) = &msg.sender_name {
            fields.insert("display_name".into(), json!(name));
        }
        fields.insert("channel".into(), json!(msg.channel_id.0));
        fields.insert("last_seen_at".into(), json!(msg.received_at.to_rfc3339()));

        let (created, _) = self.staff.upsert(actor_id, fields);
        if created {
            info!(actor_id, channel = %msg.channel_id, "New staff member");
        }
    }

    async fn dispatch_admitted(&self, actor_id: ActorId, event: InboundEvent) -> Vec<Prompt> {
        debug!(actor_id, event = %event.describe(), "Dispatching");
        match self
            .engine
            .dispatch_with_reprompt(actor_id, event, Utc::now())
            .await
        {
            Ok(outcome) => {
                self.record(actor_id, &outcome);
                outcome.prompts
            }
            Err(rejection) => self.translate(actor_id, rejection),
        }
    }

    fn record(&self, actor_id: ActorId, outcome: &Outcome) {
        let timestamp = Utc::now();
        if outcome.state_changed() {
            self.events.publish(DomainEvent::StateChanged {
                actor_id,
                from: outcome.previous.to_string(),
                to: outcome.session.state.to_string(),
                timestamp,
            });
        }

        match &outcome.side_effect {
            None => {}
            Some(SideEffect::ClientCreated(client_id)) => {
                self.audit.log(
                    AuditEvent::ClientCreated { client_id: *client_id },
                    actor_id,
                    AuditOutcome::Success,
                    None,
                );
                self.events.publish(DomainEvent::ClientCreated {
                    actor_id,
                    client_id: *client_id,
                    timestamp,
                });
            }
            Some(SideEffect::ApplicationSubmitted {
                client_id,
                request_id,
            }) => {
                self.audit.log(
                    AuditEvent::ApplicationSubmitted {
                        request_id: request_id.clone(),
                    },
                    actor_id,
                    AuditOutcome::Success,
                    Some(format!("client {client_id}")),
                );
                self.events.publish(DomainEvent::ApplicationSubmitted {
                    actor_id,
                    client_id: *client_id,
                    request_id: request_id.clone(),
                    timestamp,
                });
            }
        }
    }

    /// Every engine error kind becomes prompts here and nowhere else.
    fn translate(&self, actor_id: ActorId, rejection: Rejection) -> Vec<Prompt> {
        let Rejection {
            error: err,
            reprompt: current,
        } = rejection;

        match &err {
            FlowError::Validation { reason, .. } => vec![current.annotated(reason)],

            FlowError::InvalidAction { state, received } => {
                self.audit.log(
                    AuditEvent::InvalidAction {
                        state: state.to_string(),
                        token: received.clone(),
                    },
                    actor_id,
                    AuditOutcome::Denied,
                    None,
                );
                vec![
                    Prompt::error("That is not a valid action right now."),
                    current,
                ]
            }

            FlowError::Collaborator {
                operation, source, ..
            } => {
                self.audit.log(
                    AuditEvent::CollaboratorFailure {
                        operation: operation.to_string(),
                    },
                    actor_id,
                    AuditOutcome::Failure,
                    Some(source.to_string()),
                );
                let annotation = match source {
                    CollaboratorError::Rejected { reason, .. } => {
                        format!("Could not complete {operation}: {reason}")
                    }
                    _ => "The service is temporarily unavailable. Please try again.".to_string(),
                };
                vec![current.annotated(&annotation)]
            }

            FlowError::IncompleteDraft { .. } => {
                error!(actor_id, error = %err, "Draft incomplete at transition");
                vec![current.annotated("Something is missing from this application. Please cancel and start over.")]
            }
        }
    }

    /// Start every channel and serve until all of them close. Each message
    /// is handled on its own task; replies go back to the originating chat.
    pub async fn run(self: Arc<Self>, registry: Arc<ChannelRegistry>) -> Result<(), ChannelError> {
        let mut inbound = registry.start_all().await?;
        let mut in_flight = JoinSet::new();
        info!(channels = registry.len(), "Dispatcher running");

        while let Some((channel, msg)) = inbound.recv().await {
            while in_flight.try_join_next().is_some() {}

            let msg = match msg {
                Ok(msg) => msg,
                Err(e) => {
                    warn!(channel = %channel, error = %e, "Channel error");
                    continue;
                }
            };

            let dispatcher = Arc::clone(&self);
            let registry = Arc::clone(&registry);
            in_flight.spawn(async move {
                let prompts = dispatcher.handle(&msg).await;
                if registry.deliver(&channel, &msg.chat_id, &prompts).await.is_err() {
                    debug!(actor = %msg.sender_id, "Reply dropped");
                }
            });
        }

        while in_flight.join_next().await.is_some() {}
        info!("All channels closed, dispatcher stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telegram::{TelegramChannel, TelegramConfig};
    use intake_config::AppConfig;
    use intake_core::channel::{ChannelId, Payload};
    use intake_core::message::PromptTone;
    use intake_directory::{InMemoryApplicationDesk, InMemoryClients};
    use intake_workflow::State;
    use std::time::Duration;

    const PHONE: &str = "+998901234567";

    struct Fixture {
        dispatcher: Arc<Dispatcher>,
        clients: Arc<InMemoryClients>,
        desk: Arc<InMemoryApplicationDesk>,
    }

    fn fixture(cooldown: Duration) -> Fixture {
        let clients = Arc::new(InMemoryClients::new(Arc::new(Directory::new())));
        clients.insert("Aziz Karimov", PHONE, None);
        let desk = Arc::new(InMemoryApplicationDesk::new());
        let engine = ConversationEngine::new(&AppConfig::default(), clients.clone(), desk.clone())
            .unwrap();
        let dispatcher = Dispatcher::new(
            Arc::new(engine),
            RateGate::new(cooldown, 5),
            Arc::new(Directory::new()),
        )
        .with_audit(Arc::new(AuditLogger::new()));
        Fixture {
            dispatcher: Arc::new(dispatcher),
            clients,
            desk,
        }
    }

    /// Feeds events two seconds apart so the gate always admits them.
    struct Clock(Instant);

    impl Clock {
        fn tick(&mut self) -> Instant {
            self.0 += Duration::from_secs(2);
            self.0
        }
    }

    fn act(token: &str) -> InboundEvent {
        InboundEvent::action(token)
    }

    #[tokio::test]
    async fn soft_wait_stops_event_before_engine() {
        let f = fixture(Duration::from_millis(1500));
        let mut events = f.dispatcher.events().subscribe();
        let t0 = Instant::now();

        f.dispatcher.handle_event_at(42, act("new_application"), t0).await;
        let prompts = f
            .dispatcher
            .handle_event_at(42, act("search_phone"), t0 + Duration::from_millis(500))
            .await;

        assert_eq!(prompts.len(), 1);
        assert_eq!(prompts[0].tone, PromptTone::Error);
        assert!(prompts[0].text.contains("1.0s"));
        assert_eq!(f.dispatcher.engine().session(42).state, State::SelectingSearchMethod);

        let denied = f.dispatcher.audit().entries_by_outcome(&AuditOutcome::Denied);
        assert_eq!(denied[0].event, AuditEvent::RateLimited { lockout: false });

        let mut gated = false;
        while let Ok(ev) = events.try_recv() {
            gated |= matches!(*ev, DomainEvent::EventGated { actor_id: 42, lockout: false, .. });
        }
        assert!(gated);
    }

    #[tokio::test]
    async fn sixth_rapid_event_gets_lockout_notice() {
        let f = fixture(Duration::from_millis(1500));
        let t0 = Instant::now();
        f.dispatcher.handle_event_at(1, act("new_application"), t0).await;
        let mut last = Vec::new();
        for i in 1..=5 {
            last = f
                .dispatcher
                .handle_event_at(1, act("cancel"), t0 + Duration::from_millis(100 * i))
                .await;
        }
        assert!(last[0].text.contains("Too many messages"));
        assert_eq!(
            f.dispatcher.audit().entries().last().unwrap().event,
            AuditEvent::RateLimited { lockout: true }
        );
    }

    #[tokio::test]
    async fn validation_error_reprompts_with_annotation() {
        let f = fixture(Duration::from_millis(1500));
        let mut clock = Clock(Instant::now());
        for token in ["new_application", "search_name"] {
            f.dispatcher.handle_event_at(3, act(token), clock.tick()).await;
        }
        let prompts = f
            .dispatcher
            .handle_event_at(3, InboundEvent::text("A"), clock.tick())
            .await;
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].text.starts_with("⚠️ Name is too short"));
        assert!(prompts[0].offers("cancel"));
        assert_eq!(f.dispatcher.engine().session(3).state, State::EnteringClientName);
    }

    #[tokio::test]
    async fn stale_action_is_acknowledged_and_audited() {
        let f = fixture(Duration::from_millis(1500));
        let prompts = f
            .dispatcher
            .handle_event_at(4, act("confirm"), Instant::now())
            .await;
        assert_eq!(prompts.len(), 2);
        assert!(prompts[0].text.contains("not a valid action"));
        assert!(prompts[1].offers("new_application"));
        assert_eq!(
            f.dispatcher.audit().entries_for(4)[0].event,
            AuditEvent::InvalidAction {
                state: "idle".into(),
                token: "action(confirm)".into()
            }
        );
    }

    #[tokio::test]
    async fn collaborator_failure_is_retryable_prompt() {
        let f = fixture(Duration::from_millis(1500));
        let mut clock = Clock(Instant::now());
        for token in ["new_application", "search_phone"] {
            f.dispatcher.handle_event_at(5, act(token), clock.tick()).await;
        }
        f.clients.set_offline(true);
        let prompts = f
            .dispatcher
            .handle_event_at(5, InboundEvent::text(PHONE), clock.tick())
            .await;
        assert!(prompts[0].text.contains("temporarily unavailable"));
        assert_eq!(f.dispatcher.engine().session(5).state, State::EnteringClientPhone);
        assert_eq!(
            f.dispatcher.audit().entries_by_outcome(&AuditOutcome::Failure).len(),
            1
        );
    }

    #[tokio::test]
    async fn submission_is_audited_and_published() {
        let f = fixture(Duration::from_millis(1500));
        let mut events = f.dispatcher.events().subscribe();
        let mut clock = Clock(Instant::now());
        let script = [
            act("new_application"),
            act("search_phone"),
            InboundEvent::text(PHONE),
            act("confirm"),
            act("type:installation"),
            InboundEvent::text("Install two radiators"),
            act("confirm"),
        ];
        for event in script {
            f.dispatcher.handle_event_at(42, event, clock.tick()).await;
        }

        assert_eq!(f.desk.count(), 1);
        let success = f.dispatcher.audit().entries_by_outcome(&AuditOutcome::Success);
        assert!(matches!(success[0].event, AuditEvent::ApplicationSubmitted { .. }));

        let mut transitions = 0;
        let mut submitted = None;
        while let Ok(ev) = events.try_recv() {
            match &*ev {
                DomainEvent::StateChanged { .. } => transitions += 1,
                DomainEvent::ApplicationSubmitted { request_id, .. } => {
                    submitted = Some(request_id.clone())
                }
                _ => {}
            }
        }
        assert_eq!(transitions, 7);
        assert!(submitted.unwrap().contains("-42-"));
    }

    #[tokio::test]
    async fn malformed_sender_is_dropped() {
        let f = fixture(Duration::from_millis(1500));
        let msg = ChannelMessage::new(
            ChannelId("telegram".into()),
            "not-a-number",
            "chat",
            Payload::Text("hello".into()),
        );
        assert!(f.dispatcher.handle(&msg).await.is_empty());
        assert!(f.dispatcher.staff().is_empty());
        assert!(f.dispatcher.gate().is_empty());
    }

    #[tokio::test]
    async fn admitted_message_touches_staff_directory() {
        let f = fixture(Duration::from_millis(1500));
        let mut msg = ChannelMessage::new(
            ChannelId("telegram".into()),
            "42",
            "chat",
            Payload::Callback("new_application".into()),
        );
        msg.sender_name = Some("Dilnoza".into());

        let prompts = f.dispatcher.handle(&msg).await;
        assert!(prompts[0].offers("search_phone"));

        let record = f.dispatcher.staff().get(42).unwrap();
        assert_eq!(record.field_str("display_name"), Some("Dilnoza"));
        assert_eq!(record.field_str("channel"), Some("telegram"));
        assert!(record.field_str("last_seen_at").is_some());
    }

    #[tokio::test]
    async fn run_serves_registered_channels() {
        let f = fixture(Duration::ZERO);
        let telegram = Arc::new(TelegramChannel::new(TelegramConfig {
            bot_token: "tok".into(),
        }));
        let mut registry = ChannelRegistry::new();
        registry.register(telegram.clone());
        let registry = Arc::new(registry);

        let server = tokio::spawn(f.dispatcher.clone().run(registry.clone()));
        // Wait for start_all to install the inject sender
        let inject = |payload: Payload| {
            ChannelMessage::new(ChannelId("telegram".into()), "42", "chat-42", payload)
        };
        let mut attempts = 0;
        while telegram
            .inject_message(inject(Payload::Callback("new_application".into())))
            .await
            .is_err()
        {
            attempts += 1;
            assert!(attempts < 100, "channel never started");
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        wait_for_outbox(&telegram, 1).await;

        telegram
            .inject_message(inject(Payload::Callback("search_phone".into())))
            .await
            .unwrap();
        wait_for_outbox(&telegram, 2).await;

        let outbox = telegram.outbox();
        assert_eq!(outbox[0].0, "chat-42");
        assert!(outbox[0].1.offers("search_phone"));
        assert!(outbox[1].1.text.contains("phone number"));

        registry.stop_all().await;
        tokio::time::timeout(Duration::from_secs(5), server)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
    }

    async fn wait_for_outbox(channel: &TelegramChannel, count: usize) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while channel.outbox().len() < count {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("prompt was not delivered");
    }
}
