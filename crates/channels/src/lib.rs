//! Chat transports and the dispatch boundary for the intake desk.
//!
//! Each channel connects to a chat platform and relays staff messages to
//! the [`Dispatcher`], which gates them, runs them through the conversation
//! engine and sends the resulting prompts back.
//!
//! Available channels:
//! - **CLI** — Interactive terminal session (stdin/stdout)
//! - **Telegram** — Telegram Bot API (stub, in-process injection)
//! - **Registry** — Central channel manager and message router

pub mod cli;
pub mod dispatch;
pub mod registry;
pub mod telegram;

pub use cli::CliChannel;
pub use dispatch::Dispatcher;
pub use registry::ChannelRegistry;
pub use telegram::{TelegramChannel, TelegramConfig};
