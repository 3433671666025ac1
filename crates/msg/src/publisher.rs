//! Publishing commands, replies and raw messages.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::instrument;

use crate::headers::{COMMAND_NAME, COMMAND_REPLY_CHANNEL, MESSAGE_CHANNEL, MESSAGE_DATE, REPLY_NAME};
use crate::{DomainCommand, Headers, Message, MsgError, Reply, Result};

/// Transport that moves messages onto a channel.
#[async_trait]
pub trait Producer: Send + Sync {
    /// Sends a message to the given channel.
    async fn send(&self, channel: &str, message: Message) -> Result<()>;

    /// Releases transport resources.
    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

#[async_trait]
pub trait MessagePublisher: Send + Sync {
    /// Publishes a message to the channel named in its `CHANNEL` header.
    async fn publish(&self, message: Message) -> Result<()>;
}

#[async_trait]
pub trait CommandPublisher: Send + Sync {
    /// Publishes a command to its destination, naming `reply_channel` as the
    /// return address.
    async fn publish_command(
        &self,
        reply_channel: &str,
        command: &dyn DomainCommand,
        headers: Headers,
    ) -> Result<()>;
}

#[async_trait]
pub trait ReplyPublisher: Send + Sync {
    /// Publishes a reply. The `CHANNEL` header must be among `headers`.
    async fn publish_reply(&self, reply: &dyn Reply, headers: Headers) -> Result<()>;
}

/// Encodes commands and replies into [`Message`]s and hands them to a
/// [`Producer`].
#[derive(Debug, Clone)]
pub struct Publisher<P> {
    producer: P,
}

impl<P: Producer> Publisher<P> {
    pub fn new(producer: P) -> Self {
        Self { producer }
    }

    pub fn producer(&self) -> &P {
        &self.producer
    }

    /// Closes the underlying producer.
    pub async fn stop(&self) -> Result<()> {
        self.producer.close().await
    }
}

#[async_trait]
impl<P: Producer> MessagePublisher for Publisher<P> {
    #[instrument(skip(self, message), fields(message_id = %message.id))]
    async fn publish(&self, mut message: Message) -> Result<()> {
        let channel = message.headers.get_required(MESSAGE_CHANNEL)?.to_string();
        message
            .headers
            .set(MESSAGE_DATE, chrono::Utc::now().to_rfc3339());

        self.producer.send(&channel, message).await?;

        metrics::counter!("messages_published_total", "channel" => channel.clone()).increment(1);
        tracing::debug!(channel = %channel, "Message published");

        Ok(())
    }
}

#[async_trait]
impl<P: Producer> CommandPublisher for Publisher<P> {
    async fn publish_command(
        &self,
        reply_channel: &str,
        command: &dyn DomainCommand,
        headers: Headers,
    ) -> Result<()> {
        let message = Message::builder()
            .header(COMMAND_NAME, command.command_name())
            .header(COMMAND_REPLY_CHANNEL, reply_channel)
            .destination_channel(command.destination())
            .headers(headers)
            .payload(command.encode()?)
            .build();

        self.publish(message).await
    }
}

#[async_trait]
impl<P: Producer> ReplyPublisher for Publisher<P> {
    async fn publish_reply(&self, reply: &dyn Reply, headers: Headers) -> Result<()> {
        let message = Message::builder()
            .header(REPLY_NAME, reply.reply_name())
            .headers(headers)
            .payload(reply.encode()?)
            .build();

        if message.channel().is_none() {
            return Err(MsgError::MissingHeader(MESSAGE_CHANNEL.to_string()));
        }

        self.publish(message).await
    }
}

#[async_trait]
impl<T: Producer + ?Sized> Producer for Arc<T> {
    async fn send(&self, channel: &str, message: Message) -> Result<()> {
        (**self).send(channel, message).await
    }

    async fn close(&self) -> Result<()> {
        (**self).close().await
    }
}

#[async_trait]
impl<T: MessagePublisher + ?Sized> MessagePublisher for Arc<T> {
    async fn publish(&self, message: Message) -> Result<()> {
        (**self).publish(message).await
    }
}

#[async_trait]
impl<T: CommandPublisher + ?Sized> CommandPublisher for Arc<T> {
    async fn publish_command(
        &self,
        reply_channel: &str,
        command: &dyn DomainCommand,
        headers: Headers,
    ) -> Result<()> {
        (**self)
            .publish_command(reply_channel, command, headers)
            .await
    }
}

#[async_trait]
impl<T: ReplyPublisher + ?Sized> ReplyPublisher for Arc<T> {
    async fn publish_reply(&self, reply: &dyn Reply, headers: Headers) -> Result<()> {
        (**self).publish_reply(reply, headers).await
    }
}
