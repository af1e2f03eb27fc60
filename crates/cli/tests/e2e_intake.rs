//! End-to-end tests for the intake desk.
//!
//! These drive the full stack (dispatcher, rate gate, conversation engine,
//! collaborators) through the public crate APIs only.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use intake_channels::Dispatcher;
use intake_config::AppConfig;
use intake_core::actor::ActorId;
use intake_core::channel::{ChannelId, ChannelMessage, Payload};
use intake_core::client::{
    ApplicationDraft, ApplicationSubmitter, ClientBackend, ClientDraft, ClientSummary,
};
use intake_core::error::CollaboratorError;
use intake_core::event::DomainEvent;
use intake_core::message::{InboundEvent, PromptTone};
use intake_directory::{Directory, InMemoryApplicationDesk, InMemoryClients};
use intake_security::{AuditEvent, AuditOutcome, RateGate};
use intake_workflow::{ConversationEngine, FlowError, SideEffect, State};

const PHONE: &str = "+998901234567";

// ── Test doubles ──────────────────────────────────────────────────────────

/// Client backend that answers every search with a fixed result list.
struct ScriptedClients {
    results: Vec<ClientSummary>,
    searches: AtomicUsize,
}

impl ScriptedClients {
    fn one_match() -> Self {
        Self {
            results: vec![ClientSummary {
                id: 501,
                name: "Aziz Karimov".into(),
                phone: PHONE.into(),
                address: Some("Tashkent".into()),
            }],
            searches: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl ClientBackend for ScriptedClients {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn search(
        &self,
        _query: &str,
        _exact_match: bool,
    ) -> Result<Vec<ClientSummary>, CollaboratorError> {
        self.searches.fetch_add(1, Ordering::SeqCst);
        Ok(self.results.clone())
    }

    async fn get_by_id(&self, id: ActorId) -> Result<Option<ClientSummary>, CollaboratorError> {
        Ok(self.results.iter().find(|c| c.id == id).cloned())
    }

    async fn create(&self, _draft: &ClientDraft) -> Result<ActorId, CollaboratorError> {
        Err(CollaboratorError::rejected("scripted", "creation disabled"))
    }
}

/// Submitter that counts calls, can be told to fail, and takes a moment to
/// answer so concurrent confirms overlap.
struct CountingDesk {
    inner: InMemoryApplicationDesk,
    calls: AtomicUsize,
    failing: AtomicBool,
    latency: Duration,
}

impl CountingDesk {
    fn new(latency: Duration) -> Self {
        Self {
            inner: InMemoryApplicationDesk::new(),
            calls: AtomicUsize::new(0),
            failing: AtomicBool::new(false),
            latency,
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ApplicationSubmitter for CountingDesk {
    fn name(&self) -> &str {
        "counting"
    }

    async fn submit(&self, draft: &ApplicationDraft) -> Result<String, CollaboratorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(CollaboratorError::unavailable("counting desk", "timed out"));
        }
        self.inner.submit(draft).await
    }
}

// ── Helpers ───────────────────────────────────────────────────────────────

fn act(token: &str) -> InboundEvent {
    InboundEvent::action(token)
}

fn text(value: &str) -> InboundEvent {
    InboundEvent::text(value)
}

fn scripted_engine(latency: Duration) -> (Arc<ConversationEngine>, Arc<ScriptedClients>, Arc<CountingDesk>) {
    let clients = Arc::new(ScriptedClients::one_match());
    let desk = Arc::new(CountingDesk::new(latency));
    let engine =
        ConversationEngine::new(&AppConfig::default(), clients.clone(), desk.clone()).unwrap();
    (Arc::new(engine), clients, desk)
}

async fn to_confirming_application(engine: &ConversationEngine, actor: ActorId, details: &str) {
    for event in [
        act("new_application"),
        act("search_phone"),
        text(PHONE),
        act("confirm"),
        act("type:installation"),
        text(details),
    ] {
        engine.dispatch(actor, event).await.unwrap();
    }
    assert_eq!(engine.session(actor).state, State::ConfirmingApplication);
}

// ── Scenarios ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn phone_search_to_application_created() {
    let (engine, clients, desk) = scripted_engine(Duration::ZERO);

    engine.dispatch(42, act("new_application")).await.unwrap();
    engine.dispatch(42, act("search_phone")).await.unwrap();
    assert_eq!(engine.session(42).state, State::EnteringClientPhone);

    let found = engine.dispatch(42, text(PHONE)).await.unwrap();
    assert_eq!(found.session.state, State::ConfirmingClientSelection);
    assert_eq!(found.session.data.selected_client.as_ref().unwrap().phone, PHONE);
    assert_eq!(clients.searches.load(Ordering::SeqCst), 1);

    let picked = engine.dispatch(42, act("confirm")).await.unwrap();
    assert_eq!(picked.session.state, State::SelectingApplicationType);

    engine.dispatch(42, act("type:repair")).await.unwrap();
    let ready = engine.dispatch(42, text("Boiler leaks at night")).await.unwrap();
    assert_eq!(ready.session.state, State::ConfirmingApplication);

    let done = engine.dispatch(42, act("confirm")).await.unwrap();
    assert_eq!(done.session.state, State::ApplicationCreated);
    let request_id = done.session.data.request_id.clone().unwrap();
    assert!(!request_id.is_empty());
    assert!(request_id.contains("42"), "{request_id}");
    assert!(done.prompts.last().unwrap().text.contains(&request_id));
    assert_eq!(
        done.side_effect,
        Some(SideEffect::ApplicationSubmitted {
            client_id: 501,
            request_id: request_id.clone(),
        })
    );

    let filed = desk.inner.submitted();
    assert_eq!(filed.len(), 1);
    assert_eq!(filed[0].staff_id, 42);
    assert_eq!(filed[0].client_id, 501);
    assert_eq!(filed[0].application_type, "repair");
}

#[tokio::test]
async fn dispatcher_drives_the_flow_with_audit_and_events() {
    let (engine, _clients, desk) = scripted_engine(Duration::ZERO);
    let dispatcher = Dispatcher::new(engine, RateGate::default(), Arc::new(Directory::new()));
    let mut events = dispatcher.events().subscribe();

    let t0 = Instant::now();
    let script = [
        act("new_application"),
        act("search_phone"),
        text(PHONE),
        act("confirm"),
        act("type:consultation"),
        text("Wants a price for two units"),
        act("confirm"),
    ];
    let mut last = Vec::new();
    for (i, event) in script.into_iter().enumerate() {
        let at = t0 + Duration::from_secs(2 * i as u64);
        last = dispatcher.handle_event_at(42, event, at).await;
    }

    assert_eq!(desk.calls(), 1);
    assert!(last.iter().all(|p| p.tone != PromptTone::Error));
    let request_id = desk.inner.submitted()[0].request_id.clone();
    assert!(last.iter().any(|p| p.text.contains(&request_id)));

    let submitted = dispatcher
        .audit()
        .entries_by_outcome(&AuditOutcome::Success);
    assert_eq!(submitted.len(), 1);
    assert_eq!(
        submitted[0].event,
        AuditEvent::ApplicationSubmitted {
            request_id: request_id.clone()
        }
    );

    let mut transitions = 0;
    let mut announced = None;
    while let Ok(event) = events.try_recv() {
        match event.as_ref() {
            DomainEvent::StateChanged { .. } => transitions += 1,
            DomainEvent::ApplicationSubmitted { request_id, .. } => {
                announced = Some(request_id.clone());
            }
            other => panic!("unexpected event {other:?}"),
        }
    }
    assert_eq!(transitions, 7);
    assert_eq!(announced, Some(request_id));
}

#[tokio::test]
async fn concurrent_confirms_submit_once() {
    let (engine, _clients, desk) = scripted_engine(Duration::from_millis(50));
    to_confirming_application(&engine, 42, "Two split units, 3rd floor").await;

    let (first, second) = tokio::join!(
        engine.dispatch(42, act("confirm")),
        engine.dispatch(42, act("confirm")),
    );
    let first = first.unwrap();
    let second = second.unwrap();

    assert_eq!(desk.calls(), 1);
    assert_eq!(desk.inner.count(), 1);
    assert_eq!(first.session.state, State::ApplicationCreated);
    assert_eq!(second.session.state, State::ApplicationCreated);
    assert_eq!(first.session.data.request_id, second.session.data.request_id);

    let effects = [&first.side_effect, &second.side_effect]
        .into_iter()
        .filter(|e| e.is_some())
        .count();
    assert_eq!(effects, 1);
}

#[tokio::test]
async fn failed_submit_can_be_retried() {
    let (engine, _clients, desk) = scripted_engine(Duration::ZERO);
    to_confirming_application(&engine, 7, "Replace the thermostat").await;
    let before = engine.session(7);

    desk.failing.store(true, Ordering::SeqCst);
    let err = engine.dispatch(7, act("confirm")).await.unwrap_err();
    assert!(matches!(
        err,
        FlowError::Collaborator {
            state: State::ConfirmingApplication,
            ..
        }
    ));
    assert!(err.is_retryable());
    assert_eq!(engine.session(7), before);
    assert_eq!(desk.inner.count(), 0);

    desk.failing.store(false, Ordering::SeqCst);
    let done = engine.dispatch(7, act("confirm")).await.unwrap();
    assert_eq!(done.session.state, State::ApplicationCreated);
    assert_eq!(desk.calls(), 2);
    assert_eq!(desk.inner.count(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn parallel_actors_do_not_share_data() {
    let clients = Arc::new(InMemoryClients::new(Arc::new(Directory::new())));
    clients.insert("Aziz Karimov", PHONE, None);
    let desk = Arc::new(InMemoryApplicationDesk::new());
    let engine = Arc::new(
        ConversationEngine::new(&AppConfig::default(), clients, desk.clone()).unwrap(),
    );

    let mut handles = Vec::new();
    for actor in 100..132 {
        let engine = Arc::clone(&engine);
        handles.push(tokio::spawn(async move {
            to_confirming_application(&engine, actor, &format!("Details for actor {actor}")).await;
            let done = engine.dispatch(actor, act("confirm")).await.unwrap();
            (actor, done.session.data.request_id.unwrap())
        }));
    }

    let mut ids = Vec::new();
    for handle in handles {
        let (actor, request_id) = handle.await.unwrap();
        assert!(request_id.contains(&format!("-{actor}-")), "{request_id}");
        ids.push(request_id);
    }
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), 32);

    let filed = desk.submitted();
    assert_eq!(filed.len(), 32);
    for draft in filed {
        assert_eq!(draft.details, format!("Details for actor {}", draft.staff_id));
    }
    assert_eq!(engine.store().len(), 32);
}

#[tokio::test]
async fn burst_hits_lockout_then_recovers() {
    let (engine, _clients, _desk) = scripted_engine(Duration::ZERO);
    let dispatcher = Dispatcher::new(
        engine,
        RateGate::new(Duration::from_secs(1), 3),
        Arc::new(Directory::new()),
    );
    let t0 = Instant::now();

    let first = dispatcher.handle_event_at(9, act("new_application"), t0).await;
    assert_eq!(first.len(), 1);
    assert_eq!(dispatcher.engine().session(9).state, State::SelectingSearchMethod);

    let wait = dispatcher
        .handle_event_at(9, act("search_phone"), t0 + Duration::from_millis(100))
        .await;
    assert!(wait[0].text.contains("wait"));
    dispatcher
        .handle_event_at(9, act("search_phone"), t0 + Duration::from_millis(200))
        .await;
    let locked = dispatcher
        .handle_event_at(9, act("search_phone"), t0 + Duration::from_millis(300))
        .await;
    assert!(locked[0].text.contains("Too many"));

    // Nothing denied reached the engine
    assert_eq!(dispatcher.engine().session(9).state, State::SelectingSearchMethod);
    let denied = dispatcher.audit().entries_by_outcome(&AuditOutcome::Denied);
    assert_eq!(denied.len(), 3);

    let later = dispatcher
        .handle_event_at(9, act("search_phone"), t0 + Duration::from_secs(5))
        .await;
    assert_ne!(later[0].tone, PromptTone::Error);
    assert_eq!(dispatcher.engine().session(9).state, State::EnteringClientPhone);
    assert_eq!(dispatcher.gate().state(9).unwrap().warning_count, 0);
}

#[tokio::test]
async fn staff_record_keeps_created_at_across_messages() {
    let (engine, _clients, _desk) = scripted_engine(Duration::ZERO);
    let dispatcher = Dispatcher::new(
        engine,
        RateGate::new(Duration::from_millis(1), 5),
        Arc::new(Directory::new()),
    );

    let mut msg = ChannelMessage::new(
        ChannelId("telegram".into()),
        "42",
        "chat-42",
        Payload::Callback("new_application".into()),
    );
    msg.sender_name = Some("Dilnoza".into());
    dispatcher.handle(&msg).await;
    let first = dispatcher.staff().get(42).unwrap();

    tokio::time::sleep(Duration::from_millis(20)).await;
    let mut again = ChannelMessage::new(
        ChannelId("cli".into()),
        "42",
        "cli_session",
        Payload::Callback("search_name".into()),
    );
    again.sender_name = Some("Dilnoza R.".into());
    dispatcher.handle(&again).await;
    let second = dispatcher.staff().get(42).unwrap();

    assert_eq!(second.created_at, first.created_at);
    assert_eq!(second.field_str("display_name"), Some("Dilnoza R."));
    assert_eq!(second.field_str("channel"), Some("cli"));
    assert_eq!(dispatcher.engine().session(42).state, State::EnteringClientName);
}
