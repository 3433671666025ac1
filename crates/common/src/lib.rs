//! Shared identifier types used across the saga workspace.

pub mod ids;

pub use ids::{MessageId, SagaId};
