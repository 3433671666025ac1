//! Persistence for saga instances.
//!
//! The orchestrator serializes each instance into an [`InstanceRecord`] and
//! hands it to an [`InstanceStore`]. Two implementations are provided: an
//! in-memory store for tests and single-process use, and a PostgreSQL store.

pub mod error;
pub mod memory;
pub mod postgres;
pub mod record;
pub mod store;

pub use common::SagaId;
pub use error::{Result, StoreError};
pub use memory::InMemoryInstanceStore;
pub use postgres::PostgresInstanceStore;
pub use record::InstanceRecord;
pub use store::InstanceStore;
