//! Telegram channel adapter (stub).
//!
//! Implements the Channel trait for the Telegram Bot API. Messages are
//! injected in-process and outbound prompts are kept in an outbox, which is
//! enough to drive the full dispatch path in tests. A production build would
//! long-poll `getUpdates` and map inline keyboard callbacks to
//! `Payload::Callback`.

use std::sync::Mutex;

use async_trait::async_trait;
use intake_config::TelegramSettings;
use intake_core::channel::{Channel, ChannelId, ChannelMessage};
use intake_core::error::ChannelError;
use intake_core::message::Prompt;
use tokio::sync::mpsc;
use tracing::info;

/// Telegram channel configuration.
#[derive(Clone)]
pub struct TelegramConfig {
    /// Bot token from @BotFather.
    pub bot_token: String,
}

impl std::fmt::Debug for TelegramConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramConfig")
            .field("bot_token", &"[REDACTED]")
            .finish()
    }
}

impl TelegramConfig {
    /// `None` unless the transport is enabled and has a token.
    pub fn from_settings(settings: &TelegramSettings) -> Option<Self> {
        if !settings.enabled {
            return None;
        }
        let bot_token = settings.bot_token.clone().filter(|t| !t.is_empty())?;
        Some(Self { bot_token })
    }
}

/// Telegram channel adapter.
pub struct TelegramChannel {
    config: TelegramConfig,
    channel_id: ChannelId,
    /// Sender for injecting inbound messages.
    inject_tx: tokio::sync::Mutex<Option<mpsc::Sender<Result<ChannelMessage, ChannelError>>>>,
    outbox: Mutex<Vec<(String, Prompt)>>,
}

impl TelegramChannel {
    pub fn new(config: TelegramConfig) -> Self {
        Self {
            config,
            channel_id: ChannelId("telegram".into()),
            inject_tx: tokio::sync::Mutex::new(None),
            outbox: Mutex::new(Vec::new()),
        }
    }

    /// Inject a message as if it came from Telegram.
    pub async fn inject_message(&self, msg: ChannelMessage) -> Result<(), ChannelError> {
        let guard = self.inject_tx.lock().await;
        if let Some(tx) = guard.as_ref() {
            tx.send(Ok(msg))
                .await
                .map_err(|_| ChannelError::ConnectionLost("Message channel closed".into()))
        } else {
            Err(ChannelError::ConnectionLost("Channel not started".into()))
        }
    }

    /// Every prompt sent so far, with its chat id.
    pub fn outbox(&self) -> Vec<(String, Prompt)> {
        self.outbox.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait]
impl Channel for TelegramChannel {
    fn name(&self) -> &str {
        "telegram"
    }

    fn id(&self) -> &ChannelId {
        &self.channel_id
    }

    async fn start(
        &self,
    ) -> Result<mpsc::Receiver<Result<ChannelMessage, ChannelError>>, ChannelError> {
        info!("Telegram channel starting (stub mode)");
        let (tx, rx) = mpsc::channel(64);
        *self.inject_tx.lock().await = Some(tx);
        Ok(rx)
    }

    async fn send(&self, chat_id: &str, prompt: &Prompt) -> Result<(), ChannelError> {
        info!(
            chat_id = %chat_id,
            tone = ?prompt.tone,
            buttons = prompt.choices.len(),
            text_len = prompt.text.len(),
            "Telegram send (stub)"
        );
        self.outbox
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((chat_id.to_string(), prompt.clone()));
        Ok(())
    }

    async fn stop(&self) -> Result<(), ChannelError> {
        info!("Telegram channel stopping");
        *self.inject_tx.lock().await = None;
        Ok(())
    }

    async fn health_check(&self) -> Result<bool, ChannelError> {
        Ok(!self.config.bot_token.is_empty())
    }
}
