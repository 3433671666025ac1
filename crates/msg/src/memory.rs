use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::publisher::Producer;
use crate::{Message, Result};

#[derive(Default)]
struct BrokerState {
    pending: VecDeque<(String, Message)>,
    history: HashMap<String, Vec<Message>>,
}

/// In-process message transport for tests and single-process deployments.
///
/// Sent messages are queued in FIFO order until [`pop`](Self::pop)ped and are
/// also kept in a per-channel history for inspection.
#[derive(Clone, Default)]
pub struct InMemoryBroker {
    state: Arc<RwLock<BrokerState>>,
}

impl InMemoryBroker {
    /// Creates an empty broker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Every message ever sent to `channel`, in send order.
    pub async fn published(&self, channel: &str) -> Vec<Message> {
        self.state
            .read()
            .await
            .history
            .get(channel)
            .cloned()
            .unwrap_or_default()
    }

    /// Number of messages not yet delivered.
    pub async fn pending_count(&self) -> usize {
        self.state.read().await.pending.len()
    }

    /// Takes the oldest undelivered message with its channel.
    pub async fn pop(&self) -> Option<(String, Message)> {
        self.state.write().await.pending.pop_front()
    }

    /// Drops all pending messages and history.
    pub async fn clear(&self) {
        let mut state = self.state.write().await;
        state.pending.clear();
        state.history.clear();
    }
}

#[async_trait]
impl Producer for InMemoryBroker {
    async fn send(&self, channel: &str, message: Message) -> Result<()> {
        let mut state = self.state.write().await;
        state
            .history
            .entry(channel.to_string())
            .or_default()
            .push(message.clone());
        state.pending.push_back((channel.to_string(), message));
        Ok(())
    }
}
