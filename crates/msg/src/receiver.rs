use std::sync::Arc;

use async_trait::async_trait;

use crate::{Message, Result};

/// Something that consumes messages delivered on a channel.
#[async_trait]
pub trait MessageReceiver: Send + Sync {
    async fn receive_message(&self, message: &Message) -> Result<()>;
}

#[async_trait]
impl<T: MessageReceiver + ?Sized> MessageReceiver for Arc<T> {
    async fn receive_message(&self, message: &Message) -> Result<()> {
        (**self).receive_message(message).await
    }
}
