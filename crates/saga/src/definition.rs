//! Saga definitions and lifecycle hooks.

use std::fmt;

use crate::instance::{Instance, SagaData};
use crate::step::Step;

/// Points in a saga's life at which [`Definition::on_hook`] is called.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleHook {
    SagaStarting,
    SagaCompleted,
    SagaCompensated,
}

impl fmt::Display for LifecycleHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LifecycleHook::SagaStarting => write!(f, "SagaStarting"),
            LifecycleHook::SagaCompleted => write!(f, "SagaCompleted"),
            LifecycleHook::SagaCompensated => write!(f, "SagaCompensated"),
        }
    }
}

/// Describes a saga: its name, where replies arrive and the ordered steps.
pub trait Definition: Send + Sync {
    type Data: SagaData;

    fn saga_name(&self) -> &str;

    /// Channel participants send their replies to.
    fn reply_channel(&self) -> &str;

    fn steps(&self) -> &[Step<Self::Data>];

    fn on_hook(&self, _hook: LifecycleHook, _instance: &Instance<Self::Data>) {}
}

type Hook<D> = Box<dyn Fn(LifecycleHook, &Instance<D>) + Send + Sync>;

/// A [`Definition`] assembled from parts.
///
/// ```ignore
/// let definition = SagaDefinition::new("transfer", "transfer.replies")
///     .step(LocalStep::new(validate))
///     .step(RemoteStep::new().action(debit).compensation(refund));
/// ```
pub struct SagaDefinition<D> {
    saga_name: String,
    reply_channel: String,
    steps: Vec<Step<D>>,
    hook: Option<Hook<D>>,
}

impl<D: SagaData> SagaDefinition<D> {
    pub fn new(saga_name: impl Into<String>, reply_channel: impl Into<String>) -> Self {
        Self {
            saga_name: saga_name.into(),
            reply_channel: reply_channel.into(),
            steps: Vec::new(),
            hook: None,
        }
    }

    /// Appends a step.
    pub fn step(mut self, step: impl Into<Step<D>>) -> Self {
        self.steps.push(step.into());
        self
    }

    /// Sets the lifecycle hook.
    pub fn on_hook<F>(mut self, hook: F) -> Self
    where
        F: Fn(LifecycleHook, &Instance<D>) + Send + Sync + 'static,
    {
        self.hook = Some(Box::new(hook));
        self
    }
}

impl<D: SagaData> Definition for SagaDefinition<D> {
    type Data = D;

    fn saga_name(&self) -> &str {
        &self.saga_name
    }

    fn reply_channel(&self) -> &str {
        &self.reply_channel
    }

    fn steps(&self) -> &[Step<D>] {
        &self.steps
    }

    fn on_hook(&self, hook: LifecycleHook, instance: &Instance<D>) {
        if let Some(f) = &self.hook {
            f(hook, instance);
        }
    }
}

impl<D> fmt::Debug for SagaDefinition<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SagaDefinition")
            .field("saga_name", &self.saga_name)
            .field("reply_channel", &self.reply_channel)
            .field("steps", &self.steps)
            .finish()
    }
}
