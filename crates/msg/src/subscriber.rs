use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::{InMemoryBroker, Message, MessageReceiver, MsgError, Result};

/// Routes messages to the receiver bound to their channel.
#[derive(Clone, Default)]
pub struct Subscriber {
    receivers: HashMap<String, Arc<dyn MessageReceiver>>,
}

impl Subscriber {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `receiver` to `channel`. A channel takes a single receiver.
    pub fn subscribe(
        &mut self,
        channel: impl Into<String>,
        receiver: Arc<dyn MessageReceiver>,
    ) -> Result<()> {
        let channel = channel.into();
        if self.receivers.contains_key(&channel) {
            return Err(MsgError::AlreadySubscribed(channel));
        }
        self.receivers.insert(channel, receiver);
        Ok(())
    }

    pub fn channels(&self) -> impl Iterator<Item = &str> {
        self.receivers.keys().map(String::as_str)
    }

    /// Hands `message` to the receiver bound to `channel`, if any.
    pub async fn dispatch(&self, channel: &str, message: &Message) -> Result<()> {
        match self.receivers.get(channel) {
            Some(receiver) => receiver.receive_message(message).await,
            None => Ok(()),
        }
    }

    /// Delivers pending broker messages until the broker is empty, including
    /// any published while delivering. Returns how many were delivered.
    ///
    /// Receiver failures are logged and do not stop delivery.
    pub async fn drain(&self, broker: &InMemoryBroker) -> Result<usize> {
        let mut delivered = 0;

        while let Some((channel, message)) = broker.pop().await {
            if let Err(e) = self.dispatch(&channel, &message).await {
                tracing::error!(
                    channel = %channel,
                    message_id = %message.id,
                    error = %e,
                    "Receiver failed to process message"
                );
            }
            delivered += 1;
        }

        Ok(delivered)
    }
}

impl fmt::Debug for Subscriber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscriber")
            .field("channels", &self.receivers.keys().collect::<Vec<_>>())
            .finish()
    }
}
