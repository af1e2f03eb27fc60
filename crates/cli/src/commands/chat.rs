//! `intake chat` — run the intake workflow as the local operator.
//!
//! Clients and applications live in memory for the length of the session.

use std::sync::Arc;

use intake_channels::{ChannelRegistry, CliChannel, Dispatcher, TelegramConfig};
use intake_config::AppConfig;
use intake_core::channel::Channel;
use intake_directory::{Directory, InMemoryApplicationDesk, InMemoryClients};
use intake_security::RateGate;
use intake_workflow::ConversationEngine;
use tracing::{info, warn};

/// Demo clients loaded by `--seed`.
const DEMO_CLIENTS: [(&str, &str, Option<&str>); 4] = [
    ("Aziz Karimov", "+998901234567", Some("Tashkent, Chilonzor 7")),
    ("Dilnoza Rashidova", "+998935550101", None),
    ("Aziza Karimova", "+998977771122", Some("Samarkand")),
    ("Bekzod Usmonov", "+998909998877", None),
];

pub async fn run(seed: bool) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    let clients = Arc::new(InMemoryClients::new(Arc::new(Directory::new())));
    if seed {
        seed_clients(&clients);
    }
    let desk = Arc::new(InMemoryApplicationDesk::new());

    let engine = Arc::new(ConversationEngine::new(
        &config,
        clients.clone(),
        desk.clone(),
    )?);
    let sweeper = config
        .sessions
        .idle_ttl()
        .map(|ttl| engine.start_sweeper(config.sessions.sweep_interval(), ttl));

    let dispatcher = Arc::new(Dispatcher::new(
        Arc::clone(&engine),
        RateGate::from_config(&config.gate),
        Arc::new(Directory::new()),
    ));

    if TelegramConfig::from_settings(&config.telegram).is_some() {
        warn!("Telegram is configured but `chat` only serves the terminal");
    }

    let cli = Arc::new(CliChannel::from_config(&config.cli));
    let mut registry = ChannelRegistry::new();
    registry.register(cli.clone());
    let registry = Arc::new(registry);

    println!("📋 Intake desk — signed in as {}", config.cli.actor_name);
    println!("   Buttons are typed as /token. Type 'exit' to quit.\n");
    cli.send("cli_session", &engine.current_prompt(config.cli.actor_id))
        .await?;

    dispatcher.run(registry).await?;

    if let Some(sweeper) = sweeper {
        sweeper.abort();
    }

    let submitted = desk.submitted();
    info!(count = submitted.len(), "Chat session ended");
    if submitted.is_empty() {
        println!("👋 No applications filed.");
    } else {
        println!("👋 Applications filed this session:");
        for draft in &submitted {
            println!(
                "   {}  {}  client #{}",
                draft.request_id, draft.application_type, draft.client_id
            );
        }
    }

    Ok(())
}

/// Load [`DEMO_CLIENTS`]. Returns the ids assigned.
pub fn seed_clients(clients: &InMemoryClients) -> Vec<i64> {
    DEMO_CLIENTS
        .iter()
        .map(|(name, phone, address)| clients.insert(name, phone, *address))
        .collect()
}
