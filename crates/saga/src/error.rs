//! Saga error types.

use instance_store::StoreError;
use msg::MsgError;
use thiserror::Error;

/// Errors that can occur during saga orchestration.
#[derive(Debug, Error)]
pub enum SagaError {
    /// The instance points at a step the definition does not have.
    #[error("Current step {step} is out of bounds for a saga with {len} steps")]
    StepOutOfBounds { step: i32, len: usize },

    /// A failure outcome arrived while the saga was already compensating.
    #[error("Received a failure outcome while compensating step {step}")]
    CompensationFailed { step: i32 },

    /// A step's reply handler rejected the reply.
    #[error("Reply handler for '{reply}' failed: {source}")]
    ReplyHandler {
        reply: String,
        #[source]
        source: StepError,
    },

    /// The stored saga data belongs to a different data type.
    #[error("Saga data mismatch: expected {expected}, found {actual}")]
    SagaDataMismatch { expected: String, actual: String },

    /// Messaging error.
    #[error("Messaging error: {0}")]
    Msg(#[from] MsgError),

    /// Instance store error.
    #[error("Instance store error: {0}")]
    Store(#[from] StoreError),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Failure reported by user code: a local step action or a reply or command
/// handler.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct StepError {
    message: String,
}

impl StepError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<String> for StepError {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

impl From<&str> for StepError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

/// Convenience type alias for saga results.
pub type Result<T> = std::result::Result<T, SagaError>;
