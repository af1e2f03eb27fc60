//! Routing between transports and the dispatcher.
//!
//! Inbound messages from every transport are funnelled into one queue,
//! tagged with the transport name so replies go back to the chat they came
//! from.

use std::collections::BTreeMap;
use std::sync::Arc;

use intake_core::channel::{Channel, ChannelMessage};
use intake_core::error::ChannelError;
use intake_core::message::Prompt;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Bound of the merged inbound queue shared by all transports.
const INBOUND_QUEUE: usize = 256;

/// One inbound item, tagged with the transport it arrived on.
pub type Routed = (String, Result<ChannelMessage, ChannelError>);

/// Transports keyed by name. Iteration order is by name, so startup and
/// shutdown are deterministic.
#[derive(Default)]
pub struct ChannelRegistry {
    channels: BTreeMap<String, Arc<dyn Channel>>,
}

impl ChannelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a transport. A second transport with the same name replaces the
    /// first.
    pub fn register(&mut self, channel: Arc<dyn Channel>) {
        let name = channel.name().to_string();
        if self.channels.insert(name.clone(), channel).is_some() {
            warn!(channel = %name, "Transport replaced");
        } else {
            info!(channel = %name, "Transport registered");
        }
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Start every transport and return the merged inbound queue. The queue
    /// closes once every transport's own stream has ended.
    pub async fn start_all(&self) -> Result<mpsc::Receiver<Routed>, ChannelError> {
        let (merged, inbound) = mpsc::channel(INBOUND_QUEUE);
        for (name, channel) in &self.channels {
            let source = channel.start().await?;
            tokio::spawn(forward(name.clone(), source, merged.clone()));
            info!(channel = %name, "Transport started");
        }
        Ok(inbound)
    }

    /// Send one prompt to a chat on the named transport.
    pub async fn send_to(
        &self,
        channel_name: &str,
        chat_id: &str,
        prompt: &Prompt,
    ) -> Result<(), ChannelError> {
        match self.channels.get(channel_name) {
            Some(channel) => channel.send(chat_id, prompt).await,
            None => Err(ChannelError::NotConfigured(format!(
                "no transport named {channel_name:?}"
            ))),
        }
    }

    /// Send a dispatch result in order, stopping at the first failure so a
    /// chat never sees a later prompt without the one before it. Returns how
    /// many prompts were delivered.
    pub async fn deliver(
        &self,
        channel_name: &str,
        chat_id: &str,
        prompts: &[Prompt],
    ) -> Result<usize, ChannelError> {
        for (sent, prompt) in prompts.iter().enumerate() {
            if let Err(e) = self.send_to(channel_name, chat_id, prompt).await {
                warn!(channel = %channel_name, %chat_id, sent, error = %e, "Delivery interrupted");
                return Err(e);
            }
        }
        Ok(prompts.len())
    }

    /// Ask every transport to stop. Failures are logged, not returned.
    pub async fn stop_all(&self) {
        for (name, channel) in &self.channels {
            match channel.stop().await {
                Ok(()) => debug!(channel = %name, "Transport stopped"),
                Err(e) => warn!(channel = %name, error = %e, "Transport did not stop cleanly"),
            }
        }
    }
}

async fn forward(
    name: String,
    mut source: mpsc::Receiver<Result<ChannelMessage, ChannelError>>,
    merged: mpsc::Sender<Routed>,
) {
    while let Some(item) = source.recv().await {
        if merged.send((name.clone(), item)).await.is_err() {
            // Dispatcher is gone
            return;
        }
    }
    debug!(channel = %name, "Transport stream ended");
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use intake_core::channel::{ChannelId, Payload};
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};

    /// Records sends; `start` yields `greeting` once if set.
    struct FakeTransport {
        id: ChannelId,
        greeting: Option<&'static str>,
        sent: Mutex<Vec<String>>,
        started: AtomicBool,
        stopped: AtomicBool,
    }

    impl FakeTransport {
        fn new(name: &str) -> Arc<Self> {
            Self::greeting(name, None)
        }

        fn greeting(name: &str, greeting: Option<&'static str>) -> Arc<Self> {
            Arc::new(Self {
                id: ChannelId(name.into()),
                greeting,
                sent: Mutex::new(Vec::new()),
                started: AtomicBool::new(false),
                stopped: AtomicBool::new(false),
            })
        }

        fn sent(&self) -> Vec<String> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Channel for FakeTransport {
        fn name(&self) -> &str {
            &self.id.0
        }

        fn id(&self) -> &ChannelId {
            &self.id
        }

        async fn start(&self) -> Result<mpsc::Receiver<Result<ChannelMessage, ChannelError>>, ChannelError> {
            self.started.store(true, Ordering::SeqCst);
            let (tx, rx) = mpsc::channel(1);
            if let Some(text) = self.greeting {
                let msg = ChannelMessage::new(self.id.clone(), "1", "chat", Payload::Text(text.into()));
                tx.send(Ok(msg)).await.unwrap();
            }
            Ok(rx)
        }

        async fn send(&self, chat_id: &str, prompt: &Prompt) -> Result<(), ChannelError> {
            self.sent.lock().unwrap().push(format!("{chat_id}: {}", prompt.text));
            Ok(())
        }

        async fn stop(&self) -> Result<(), ChannelError> {
            self.stopped.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn same_name_replaces_transport() {
        let mut reg = ChannelRegistry::new();
        assert!(reg.is_empty());
        let first = FakeTransport::new("telegram");
        let second = FakeTransport::new("telegram");
        reg.register(first.clone());
        reg.register(second.clone());
        reg.register(FakeTransport::new("cli"));
        assert_eq!(reg.len(), 2);

        reg.send_to("telegram", "c", &Prompt::info("hi")).await.unwrap();
        assert!(first.sent().is_empty());
        assert_eq!(second.sent(), ["c: hi"]);
    }

    #[tokio::test]
    async fn start_and_stop_reach_every_transport() {
        let mut reg = ChannelRegistry::new();
        let a = FakeTransport::new("a");
        let b = FakeTransport::new("b");
        reg.register(a.clone());
        reg.register(b.clone());

        let _inbound = reg.start_all().await.unwrap();
        assert!(a.started.load(Ordering::SeqCst) && b.started.load(Ordering::SeqCst));

        reg.stop_all().await;
        assert!(a.stopped.load(Ordering::SeqCst) && b.stopped.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn unknown_transport_is_not_configured() {
        let reg = ChannelRegistry::new();
        let result = reg.send_to("whatsapp", "c", &Prompt::info("hi")).await;
        assert!(matches!(result, Err(ChannelError::NotConfigured(_))));
    }

    #[tokio::test]
    async fn deliver_keeps_order_and_stops_on_missing_channel() {
        let mut reg = ChannelRegistry::new();
        let ch = FakeTransport::new("test");
        reg.register(ch.clone());

        let prompts = [Prompt::info("one"), Prompt::error("two")];
        assert_eq!(reg.deliver("test", "c", &prompts).await.unwrap(), 2);
        assert_eq!(ch.sent(), ["c: one", "c: two"]);

        assert!(reg.deliver("gone", "c", &prompts).await.is_err());
        assert_eq!(reg.deliver("gone", "c", &[]).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn start_all_tags_and_merges_streams() {
        let mut reg = ChannelRegistry::new();
        reg.register(FakeTransport::greeting("a", Some("from a")));
        reg.register(FakeTransport::greeting("b", Some("from b")));

        let mut inbound = reg.start_all().await.unwrap();
        let mut seen = Vec::new();
        for _ in 0..2 {
            let (name, msg) = inbound.recv().await.unwrap();
            let Payload::Text(text) = msg.unwrap().payload else {
                panic!("expected text");
            };
            seen.push(format!("{name}: {text}"));
        }
        seen.sort();
        assert_eq!(seen, ["a: from a", "b: from b"]);
        // Both sources are exhausted, so the merged stream closes
        assert!(inbound.recv().await.is_none());
    }
}
