//! Inbound events and outbound prompts.
//!
//! These are the value objects that cross the transport boundary:
//! Staff member taps or types → Channel receives it → Gate admits it →
//! Engine transitions → Prompts go back out through the same channel.

use serde::{Deserialize, Serialize};

/// One event from a staff member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum InboundEvent {
    /// Free text typed into the chat
    Text(String),
    /// An opaque token from a structured choice (menu tap, inline button)
    Action(String),
}

impl InboundEvent {
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    pub fn action(token: impl Into<String>) -> Self {
        Self::Action(token.into())
    }

    /// Short description for logs, never the full text.
    pub fn describe(&self) -> String {
        match self {
            Self::Text(value) => format!("text({} chars)", value.chars().count()),
            Self::Action(token) => format!("action({token})"),
        }
    }
}

/// How the transport should present a prompt.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptTone {
    #[default]
    Info,
    /// Something went wrong but the actor can retry
    Error,
}

/// A selectable option rendered alongside a prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Choice {
    /// The token sent back as `InboundEvent::Action` when selected
    pub token: String,
    /// Label shown to the staff member
    pub label: String,
}

impl Choice {
    pub fn new(token: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            label: label.into(),
        }
    }
}

/// An outbound message for the transport to render.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prompt {
    pub text: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub choices: Vec<Choice>,

    #[serde(default)]
    pub tone: PromptTone,
}

impl Prompt {
    pub fn info(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            choices: Vec::new(),
            tone: PromptTone::Info,
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            choices: Vec::new(),
            tone: PromptTone::Error,
        }
    }

    pub fn with_choices(mut self, choices: Vec<Choice>) -> Self {
        self.choices = choices;
        self
    }

    /// Prefix the prompt with an error annotation, keeping its choices.
    pub fn annotated(mut self, annotation: &str) -> Self {
        self.text = format!("⚠️ {annotation}\n\n{}", self.text);
        self.tone = PromptTone::Error;
        self
    }

    /// Whether `token` is one of this prompt's choices.
    pub fn offers(&self, token: &str) -> bool {
        self.choices.iter().any(|c| c.token == token)
    }
}
