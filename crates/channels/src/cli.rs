//! CLI channel — the intake workflow in a terminal.
//!
//! Reads stdin, writes stdout. A line starting with `/` is a button tap
//! (`/confirm` → action `confirm`), anything else is typed text. Prompts are
//! printed with their choices listed as `/token` commands.

use async_trait::async_trait;
use intake_core::actor::ActorId;
use intake_core::channel::{Channel, ChannelId, ChannelMessage, Payload};
use intake_core::error::ChannelError;
use intake_core::message::{Prompt, PromptTone};
use tokio::io::{self, AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::debug;

const CHAT_ID: &str = "cli_session";

/// Interactive CLI channel for a single local operator.
pub struct CliChannel {
    id: ChannelId,
    actor_id: ActorId,
    actor_name: String,
}

impl CliChannel {
    pub fn new(actor_id: ActorId, actor_name: impl Into<String>) -> Self {
        Self {
            id: ChannelId("cli".into()),
            actor_id,
            actor_name: actor_name.into(),
        }
    }

    pub fn from_config(config: &intake_config::CliConfig) -> Self {
        Self::new(config.actor_id, config.actor_name.clone())
    }

    /// Turn one input line into a message. `None` for blank lines.
    pub fn parse_line(&self, line: &str) -> Option<ChannelMessage> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }
        let payload = match line.strip_prefix('/') {
            Some(token) if !token.trim().is_empty() => Payload::Callback(token.trim().to_string()),
            _ => Payload::Text(line.to_string()),
        };
        let mut msg = ChannelMessage::new(
            self.id.clone(),
            self.actor_id.to_string(),
            CHAT_ID,
            payload,
        );
        msg.sender_name = Some(self.actor_name.clone());
        Some(msg)
    }
}

/// Plain-text rendering of a prompt and its choices.
pub fn render(prompt: &Prompt) -> String {
    let mut out = String::new();
    if prompt.tone == PromptTone::Error {
        out.push_str("! ");
    }
    out.push_str(&prompt.text);
    if !prompt.choices.is_empty() {
        out.push('\n');
        for choice in &prompt.choices {
            out.push_str(&format!("\n  /{:<16} {}", choice.token, choice.label));
        }
    }
    out
}

#[async_trait]
impl Channel for CliChannel {
    fn name(&self) -> &str {
        "cli"
    }

    fn id(&self) -> &ChannelId {
        &self.id
    }

    async fn start(
        &self,
    ) -> Result<mpsc::Receiver<Result<ChannelMessage, ChannelError>>, ChannelError> {
        let (tx, rx) = mpsc::channel(32);
        let reader = CliChannel::new(self.actor_id, self.actor_name.clone());

        tokio::spawn(async move {
            let mut lines = BufReader::new(io::stdin()).lines();

            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        if matches!(line.trim(), "exit" | "quit" | "/exit" | "/quit" | ":q") {
                            break;
                        }
                        let Some(msg) = reader.parse_line(&line) else {
                            continue;
                        };
                        if tx.send(Ok(msg)).await.is_err() {
                            break;
                        }
                    }
                    Ok(None) => break, // EOF (Ctrl+D)
                    Err(e) => {
                        let _ = tx.send(Err(ChannelError::ConnectionLost(e.to_string()))).await;
                        break;
                    }
                }
            }
            debug!("CLI input closed");
        });

        Ok(rx)
    }

    async fn send(&self, _chat_id: &str, prompt: &Prompt) -> Result<(), ChannelError> {
        println!("{}\n", render(prompt));
        Ok(())
    }
}
