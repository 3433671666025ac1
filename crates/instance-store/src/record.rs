use serde::{Deserialize, Serialize};

use crate::SagaId;

/// Persisted form of a saga instance.
///
/// `current_step` is `-1` until the first step has been executed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceRecord {
    pub saga_id: SagaId,
    pub saga_name: String,
    /// Type name of the serialized saga data.
    pub saga_data_name: String,
    pub saga_data: serde_json::Value,
    pub current_step: i32,
    pub end_state: bool,
    pub compensating: bool,
}

impl InstanceRecord {
    /// Returns the `(saga_name, saga_id)` key the record is stored under.
    pub fn key(&self) -> (&str, SagaId) {
        (&self.saga_name, self.saga_id)
    }
}
