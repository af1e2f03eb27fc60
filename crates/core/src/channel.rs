//! Channel trait — the abstraction over chat transports.
//!
//! A Channel connects the intake desk to a messaging platform (Telegram, the
//! local CLI, ...). It receives staff messages and button taps, and renders
//! outbound prompts with their choice sets.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::actor::ActorId;
use crate::error::ChannelError;
use crate::message::{InboundEvent, Prompt};

/// Unique identifier for a channel instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChannelId(pub String);

impl std::fmt::Display for ChannelId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What the staff member sent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum Payload {
    /// A typed chat message
    Text(String),
    /// Callback data from a tapped button
    Callback(String),
}

/// A message received from a channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelMessage {
    /// The channel this message belongs to
    pub channel_id: ChannelId,

    /// Sender identifier (platform-specific user ID, numeric for actors)
    pub sender_id: String,

    /// Human-readable sender name (if available)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_name: Option<String>,

    /// The chat/DM identifier within the channel
    pub chat_id: String,

    pub payload: Payload,

    pub received_at: DateTime<Utc>,

    /// Platform-specific metadata
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl ChannelMessage {
    /// Build a message with the current timestamp and no metadata.
    pub fn new(
        channel_id: ChannelId,
        sender_id: impl Into<String>,
        chat_id: impl Into<String>,
        payload: Payload,
    ) -> Self {
        Self {
            channel_id,
            sender_id: sender_id.into(),
            sender_name: None,
            chat_id: chat_id.into(),
            payload,
            received_at: Utc::now(),
            metadata: serde_json::Map::new(),
        }
    }

    /// Parse the sender into an actor id.
    pub fn actor_id(&self) -> std::result::Result<ActorId, ChannelError> {
        match self.sender_id.trim().parse::<ActorId>() {
            Ok(id) if id > 0 => Ok(id),
            _ => Err(ChannelError::InvalidPayload(format!(
                "sender id '{}' is not a positive integer",
                self.sender_id
            ))),
        }
    }

    /// Convert the payload into an engine event.
    pub fn to_event(&self) -> InboundEvent {
        match &self.payload {
            Payload::Text(text) => InboundEvent::Text(text.clone()),
            Payload::Callback(data) => InboundEvent::Action(data.trim().to_string()),
        }
    }
}

/// The core Channel trait.
///
/// Implementations handle platform-specific connection logic and how a
/// prompt's choices are presented (inline keyboard, numbered list, ...).
#[async_trait]
pub trait Channel: Send + Sync {
    /// Human-readable channel name (e.g., "telegram", "cli").
    fn name(&self) -> &str;

    /// Unique ID for this channel instance.
    fn id(&self) -> &ChannelId;

    /// Start listening for incoming messages.
    async fn start(
        &self,
    ) -> std::result::Result<
        tokio::sync::mpsc::Receiver<std::result::Result<ChannelMessage, ChannelError>>,
        ChannelError,
    >;

    /// Render a prompt to a specific chat.
    async fn send(&self, chat_id: &str, prompt: &Prompt) -> std::result::Result<(), ChannelError>;

    /// Stop the channel gracefully.
    async fn stop(&self) -> std::result::Result<(), ChannelError> {
        Ok(())
    }

    /// Whether the channel is connected and operational.
    async fn health_check(&self) -> std::result::Result<bool, ChannelError> {
        Ok(true)
    }
}
