//! Saga instances and their persisted form.

use std::fmt;

use common::SagaId;
use instance_store::InstanceRecord;
use serde::{Serialize, de::DeserializeOwned};

use crate::error::{Result, SagaError};
use crate::step_context::{NOT_STARTED, StepContext};

/// Data carried through every step of a saga.
pub trait SagaData: Serialize + DeserializeOwned + Clone + fmt::Debug + Send + Sync + 'static {
    /// Stable type name stored alongside the serialized data.
    const SAGA_DATA_NAME: &'static str;
}

/// One execution of a saga definition.
#[derive(Debug, Clone)]
pub struct Instance<D> {
    saga_id: SagaId,
    saga_name: String,
    saga_data: D,
    current_step: i32,
    end_state: bool,
    compensating: bool,
}

impl<D: SagaData> Instance<D> {
    /// Creates an instance that has not executed any step.
    pub fn new(saga_name: impl Into<String>, saga_id: SagaId, saga_data: D) -> Self {
        Self {
            saga_id,
            saga_name: saga_name.into(),
            saga_data,
            current_step: NOT_STARTED,
            end_state: false,
            compensating: false,
        }
    }

    pub fn saga_id(&self) -> SagaId {
        self.saga_id
    }

    pub fn saga_name(&self) -> &str {
        &self.saga_name
    }

    pub fn saga_data(&self) -> &D {
        &self.saga_data
    }

    pub fn into_saga_data(self) -> D {
        self.saga_data
    }

    pub fn current_step(&self) -> i32 {
        self.current_step
    }

    /// Whether the saga has finished, either completed or compensated.
    pub fn end_state(&self) -> bool {
        self.end_state
    }

    pub fn compensating(&self) -> bool {
        self.compensating
    }

    pub fn step_context(&self) -> StepContext {
        StepContext::new(self.current_step, self.compensating, self.end_state)
    }

    pub(crate) fn update_step_context(&mut self, context: StepContext) {
        self.current_step = context.step();
        self.compensating = context.is_compensating();
        self.end_state = context.is_ended();
    }

    pub(crate) fn set_saga_data(&mut self, saga_data: D) {
        self.saga_data = saga_data;
    }

    /// Serializes the instance for the instance store.
    pub fn to_record(&self) -> Result<InstanceRecord> {
        Ok(InstanceRecord {
            saga_id: self.saga_id,
            saga_name: self.saga_name.clone(),
            saga_data_name: D::SAGA_DATA_NAME.to_string(),
            saga_data: serde_json::to_value(&self.saga_data)?,
            current_step: self.current_step,
            end_state: self.end_state,
            compensating: self.compensating,
        })
    }

    /// Restores an instance from the instance store.
    pub fn from_record(record: InstanceRecord) -> Result<Self> {
        if record.saga_data_name != D::SAGA_DATA_NAME {
            return Err(SagaError::SagaDataMismatch {
                expected: D::SAGA_DATA_NAME.to_string(),
                actual: record.saga_data_name,
            });
        }

        Ok(Self {
            saga_id: record.saga_id,
            saga_name: record.saga_name,
            saga_data: serde_json::from_value(record.saga_data)?,
            current_step: record.current_step,
            end_state: record.end_state,
            compensating: record.compensating,
        })
    }
}
