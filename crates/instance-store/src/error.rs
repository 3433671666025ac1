use thiserror::Error;

use crate::SagaId;

/// Errors that can occur when interacting with an instance store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// An instance with the same key has already been saved.
    #[error("Saga instance {saga_name}/{saga_id} already exists")]
    AlreadyExists { saga_name: String, saga_id: SagaId },

    /// The instance to update has never been saved.
    #[error("Saga instance {saga_name}/{saga_id} not found")]
    InstanceNotFound { saga_name: String, saga_id: SagaId },

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for instance store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
