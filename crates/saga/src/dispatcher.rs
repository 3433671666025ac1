//! Participant-side dispatch of saga commands.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;

use async_trait::async_trait;
use common::SagaId;
use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use msg::headers::{
    COMMAND_NAME, COMMAND_PREFIX, COMMAND_REPLY_CHANNEL, MESSAGE_CHANNEL, REPLY_PREFIX,
};
use msg::{CommandType, Headers, Message, MessageReceiver, ReplyMessage, ReplyPublisher, with_failure};
use tracing::instrument;

use crate::error::StepError;
use crate::headers::{COMMAND_SAGA_ID, COMMAND_SAGA_NAME};

/// A command received from a saga, with the saga it belongs to.
#[derive(Debug, Clone)]
pub struct SagaCommand<C> {
    saga_id: SagaId,
    saga_name: String,
    command: C,
    headers: Headers,
    correlation: Headers,
}

impl<C> SagaCommand<C> {
    pub fn saga_id(&self) -> SagaId {
        self.saga_id
    }

    pub fn saga_name(&self) -> &str {
        &self.saga_name
    }

    pub fn command(&self) -> &C {
        &self.command
    }

    pub fn into_command(self) -> C {
        self.command
    }

    /// Headers of the inbound command message.
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// The saga's `COMMAND_` headers renamed under `REPLY_`, as attached to
    /// every reply.
    pub fn correlation_headers(&self) -> &Headers {
        &self.correlation
    }
}

struct CommandInfo {
    saga_id: SagaId,
    saga_name: String,
    headers: Headers,
    correlation: Headers,
}

type HandlerFuture = BoxFuture<'static, Result<Vec<ReplyMessage>, StepError>>;
type Handler = Box<dyn Fn(CommandInfo, &[u8]) -> serde_json::Result<HandlerFuture> + Send + Sync>;

/// Routes saga commands to handlers and publishes their replies back to the
/// orchestrator.
///
/// Every reply carries the command's `COMMAND_` headers renamed under the
/// `REPLY_` prefix so the orchestrator can correlate it.
pub struct CommandDispatcher<P> {
    publisher: P,
    handlers: HashMap<&'static str, Handler>,
}

impl<P: ReplyPublisher> CommandDispatcher<P> {
    pub fn new(publisher: P) -> Self {
        Self {
            publisher,
            handlers: HashMap::new(),
        }
    }

    /// Registers the handler for commands of type `C`.
    ///
    /// An `Err` from the handler is answered with a generic failure reply.
    pub fn handle<C, F, Fut>(mut self, handler: F) -> Self
    where
        C: CommandType,
        F: Fn(SagaCommand<C>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Vec<ReplyMessage>, StepError>> + Send + 'static,
    {
        let erased: Handler = Box::new(move |info: CommandInfo, payload: &[u8]| {
            let command = serde_json::from_slice::<C>(payload)?;
            Ok(handler(SagaCommand {
                saga_id: info.saga_id,
                saga_name: info.saga_name,
                command,
                headers: info.headers,
                correlation: info.correlation,
            })
            .boxed())
        });

        tracing::debug!(command_name = C::COMMAND_NAME, "Saga command handler added");
        self.handlers.insert(C::COMMAND_NAME, erased);
        self
    }

    pub fn handles(&self, command_name: &str) -> bool {
        self.handlers.contains_key(command_name)
    }

    /// Handles one command message and publishes the replies.
    ///
    /// Malformed commands are logged and dropped; only failures to publish a
    /// reply are returned.
    #[instrument(skip(self, message), fields(message_id = %message.id))]
    pub async fn receive_command(&self, message: &Message) -> msg::Result<()> {
        let headers = &message.headers;
        let (command_name, saga_id, saga_name, reply_channel) = match (
            headers.get_required(COMMAND_NAME),
            headers.get_required(COMMAND_SAGA_ID),
            headers.get_required(COMMAND_SAGA_NAME),
            headers.get_required(COMMAND_REPLY_CHANNEL),
        ) {
            (Ok(command_name), Ok(saga_id), Ok(saga_name), Ok(reply_channel)) => {
                (command_name, saga_id, saga_name, reply_channel)
            }
            (Err(e), ..) | (_, Err(e), ..) | (_, _, Err(e), _) | (.., Err(e)) => {
                tracing::warn!(error = %e, "Dropping saga command");
                return Ok(());
            }
        };

        let Some(handler) = self.handlers.get(command_name) else {
            tracing::trace!(command_name, "No handler registered for command");
            return Ok(());
        };

        let saga_id = match saga_id.parse::<SagaId>() {
            Ok(saga_id) => saga_id,
            Err(e) => {
                tracing::warn!(command_name, saga_id, error = %e, "Dropping saga command with invalid saga id");
                return Ok(());
            }
        };

        tracing::debug!(command_name, saga_name, %saga_id, "Received saga command");

        let correlation = correlation_headers(headers);
        let info = CommandInfo {
            saga_id,
            saga_name: saga_name.to_string(),
            headers: headers.clone(),
            correlation: correlation.clone(),
        };
        let future = match handler(info, message.payload.as_slice()) {
            Ok(future) => future,
            Err(e) => {
                tracing::warn!(command_name, error = %e, "Dropping undecodable saga command");
                return Ok(());
            }
        };

        let replies = match future.await {
            Ok(replies) => replies,
            Err(e) => {
                tracing::warn!(command_name, %saga_id, error = %e, "Saga command handler failed");
                vec![with_failure()]
            }
        };

        metrics::counter!(
            "saga_commands_handled_total",
            "command_name" => command_name.to_string()
        )
        .increment(1);

        for reply in replies {
            let (reply, reply_headers) = reply.into_parts();

            let mut outgoing = correlation.clone();
            outgoing.extend(reply_headers);
            outgoing.set(MESSAGE_CHANNEL, reply_channel);

            if let Err(e) = self.publisher.publish_reply(reply.as_ref(), outgoing).await {
                tracing::error!(command_name, %saga_id, error = %e, "Failed to publish saga reply");
                return Err(e);
            }
        }

        Ok(())
    }
}

/// Renames every `COMMAND_` header except the command name under `REPLY_`.
fn correlation_headers(headers: &Headers) -> Headers {
    headers
        .iter()
        .filter(|(key, _)| *key != COMMAND_NAME)
        .filter_map(|(key, value)| {
            key.strip_prefix(COMMAND_PREFIX)
                .map(|suffix| (format!("{REPLY_PREFIX}{suffix}"), value.to_string()))
        })
        .collect()
}

#[async_trait]
impl<P: ReplyPublisher> MessageReceiver for CommandDispatcher<P> {
    async fn receive_message(&self, message: &Message) -> msg::Result<()> {
        self.receive_command(message).await
    }
}

impl<P> fmt::Debug for CommandDispatcher<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandDispatcher")
            .field("handlers", &self.handlers.keys().collect::<Vec<_>>())
            .finish()
    }
}
