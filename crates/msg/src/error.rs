use thiserror::Error;

/// Errors raised by the messaging layer.
#[derive(Debug, Error)]
pub enum MsgError {
    /// A header required to process the message is absent.
    #[error("Missing required header `{0}`")]
    MissingHeader(String),

    /// No codec is registered for the given type name.
    #[error("`{name}` is not registered as a {kind}")]
    UnregisteredType { kind: &'static str, name: String },

    /// A receiver is already bound to the channel.
    #[error("Channel `{0}` has already been subscribed")]
    AlreadySubscribed(String),

    /// The producer could not hand the message to the transport.
    #[error("Producer error: {0}")]
    Producer(String),

    /// A message receiver failed while processing a message.
    #[error("Receiver error: {0}")]
    Receiver(Box<dyn std::error::Error + Send + Sync>),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl MsgError {
    /// Wraps an arbitrary receiver failure.
    pub fn receiver(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        MsgError::Receiver(Box::new(err))
    }
}

/// Result type for messaging operations.
pub type Result<T> = std::result::Result<T, MsgError>;
