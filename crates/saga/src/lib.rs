//! Saga orchestration.
//!
//! A saga is an ordered list of steps spanning several services. The
//! [`Orchestrator`] runs the steps in order, sending commands for remote steps
//! and waiting for their replies. When a step fails, the steps already
//! completed are compensated in reverse order.
//!
//! Participants answer commands through a [`CommandDispatcher`], which copies
//! the saga correlation headers onto every reply.

pub mod definition;
pub mod dispatcher;
pub mod error;
pub mod headers;
pub mod instance;
pub mod orchestrator;
pub mod step;
pub mod step_context;

pub use common::SagaId;
pub use definition::{Definition, LifecycleHook, SagaDefinition};
pub use dispatcher::{CommandDispatcher, SagaCommand};
pub use error::{Result, SagaError, StepError};
pub use instance::{Instance, SagaData};
pub use orchestrator::Orchestrator;
pub use step::{LocalStep, RemoteStep, ReplyHandler, Step};
pub use step_context::StepContext;
