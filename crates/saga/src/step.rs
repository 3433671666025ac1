//! Saga steps.
//!
//! A [`LocalStep`] runs in-process and knows its outcome as soon as its action
//! returns. A [`RemoteStep`] only produces a command; its outcome arrives later
//! as a reply. Either kind may leave a direction without an action, in which
//! case traversal skips it in that direction.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use msg::{CommandType, DomainCommand, Reply, ReplyType};

use crate::error::StepError;
use crate::instance::SagaData;
use crate::step_context::StepContext;

type LocalAction<D> = Box<dyn Fn(D) -> BoxFuture<'static, Result<D, StepError>> + Send + Sync>;
type Predicate<D> = Box<dyn Fn(&D) -> bool + Send + Sync>;
type CommandFactory<D> = Box<dyn Fn(&D) -> Box<dyn DomainCommand> + Send + Sync>;

/// Handles a specific reply for a remote step, possibly updating the saga data.
pub type ReplyHandler<D> = Box<dyn Fn(&mut D, &dyn Reply) -> Result<(), StepError> + Send + Sync>;

/// Outcome of executing a single step.
pub(crate) struct StepResults<D> {
    pub(crate) commands: Vec<Box<dyn DomainCommand>>,
    pub(crate) updated_data: D,
    pub(crate) updated_context: StepContext,
    pub(crate) local: bool,
    pub(crate) failure: Option<StepError>,
}

impl<D> StepResults<D> {
    /// Results of a traversal that found no step left to run.
    pub(crate) fn ended(context: StepContext, data: D) -> Self {
        Self {
            commands: Vec::new(),
            updated_data: data,
            updated_context: context.end(),
            local: false,
            failure: None,
        }
    }
}

/// A step of a saga definition.
pub enum Step<D> {
    Local(LocalStep<D>),
    Remote(RemoteStep<D>),
}

impl<D: SagaData> Step<D> {
    pub fn is_local(&self) -> bool {
        matches!(self, Step::Local(_))
    }

    pub(crate) fn is_invocable(&self, data: &D, compensating: bool) -> bool {
        match self {
            Step::Local(step) => step.action_for(compensating).is_some(),
            Step::Remote(step) => step
                .action_for(compensating)
                .is_some_and(|action| action.is_invocable(data)),
        }
    }

    pub(crate) fn reply_handler(
        &self,
        reply_name: &str,
        compensating: bool,
    ) -> Option<&ReplyHandler<D>> {
        match self {
            Step::Local(_) => None,
            Step::Remote(step) => step.replies_for(compensating).get(reply_name),
        }
    }

    /// Runs the step's action for the direction and lands on `context`.
    pub(crate) async fn execute(
        &self,
        data: D,
        compensating: bool,
        context: StepContext,
    ) -> StepResults<D> {
        match self {
            Step::Local(step) => step.execute(data, compensating, context).await,
            Step::Remote(step) => step.execute(data, compensating, context),
        }
    }
}

impl<D> From<LocalStep<D>> for Step<D> {
    fn from(step: LocalStep<D>) -> Self {
        Step::Local(step)
    }
}

impl<D> From<RemoteStep<D>> for Step<D> {
    fn from(step: RemoteStep<D>) -> Self {
        Step::Remote(step)
    }
}

impl<D> fmt::Debug for Step<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::Local(step) => step.fmt(f),
            Step::Remote(step) => step.fmt(f),
        }
    }
}

fn boxed_action<D, F, Fut>(action: F) -> LocalAction<D>
where
    F: Fn(D) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<D, StepError>> + Send + 'static,
{
    Box::new(move |data: D| action(data).boxed())
}

/// A step executed in-process.
///
/// Actions take the saga data by value and return the updated data. When an
/// action fails the data it was given is discarded and the saga compensates
/// with the data as it was before the step.
pub struct LocalStep<D> {
    action: Option<LocalAction<D>>,
    compensation: Option<LocalAction<D>>,
}

impl<D: SagaData> LocalStep<D> {
    pub fn new<F, Fut>(action: F) -> Self
    where
        F: Fn(D) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<D, StepError>> + Send + 'static,
    {
        Self {
            action: Some(boxed_action(action)),
            compensation: None,
        }
    }

    /// Sets the action run while compensating.
    pub fn compensation<F, Fut>(mut self, compensation: F) -> Self
    where
        F: Fn(D) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<D, StepError>> + Send + 'static,
    {
        self.compensation = Some(boxed_action(compensation));
        self
    }

    fn action_for(&self, compensating: bool) -> Option<&LocalAction<D>> {
        if compensating {
            self.compensation.as_ref()
        } else {
            self.action.as_ref()
        }
    }

    async fn execute(&self, data: D, compensating: bool, context: StepContext) -> StepResults<D> {
        let mut results = StepResults {
            commands: Vec::new(),
            updated_data: data,
            updated_context: context,
            local: true,
            failure: None,
        };

        if let Some(action) = self.action_for(compensating) {
            match action(results.updated_data.clone()).await {
                Ok(data) => results.updated_data = data,
                Err(e) => results.failure = Some(e),
            }
        }

        results
    }
}

impl<D> fmt::Debug for LocalStep<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalStep")
            .field("action", &self.action.is_some())
            .field("compensation", &self.compensation.is_some())
            .finish()
    }
}

struct RemoteAction<D> {
    predicate: Option<Predicate<D>>,
    command: CommandFactory<D>,
}

impl<D> RemoteAction<D> {
    fn new<C, F>(predicate: Option<Predicate<D>>, command: F) -> Self
    where
        C: CommandType,
        F: Fn(&D) -> C + Send + Sync + 'static,
    {
        Self {
            predicate,
            command: Box::new(move |data: &D| Box::new(command(data)) as Box<dyn DomainCommand>),
        }
    }

    fn is_invocable(&self, data: &D) -> bool {
        self.predicate.as_ref().is_none_or(|predicate| predicate(data))
    }
}

fn typed_reply_handler<D, R, H>(handler: H) -> ReplyHandler<D>
where
    R: ReplyType,
    H: Fn(&mut D, &R) -> Result<(), StepError> + Send + Sync + 'static,
{
    Box::new(move |data: &mut D, reply: &dyn Reply| match reply.downcast_ref::<R>() {
        Some(reply) => handler(data, reply),
        None => Err(StepError::new(format!(
            "reply '{}' is not a {}",
            reply.reply_name(),
            R::REPLY_NAME
        ))),
    })
}

/// A step that sends a command to a participant and waits for its reply.
pub struct RemoteStep<D> {
    action: Option<RemoteAction<D>>,
    compensation: Option<RemoteAction<D>>,
    action_replies: HashMap<&'static str, ReplyHandler<D>>,
    compensation_replies: HashMap<&'static str, ReplyHandler<D>>,
}

impl<D: SagaData> RemoteStep<D> {
    pub fn new() -> Self {
        Self {
            action: None,
            compensation: None,
            action_replies: HashMap::new(),
            compensation_replies: HashMap::new(),
        }
    }

    /// Sets the command sent while the saga advances.
    pub fn action<C, F>(mut self, command: F) -> Self
    where
        C: CommandType,
        F: Fn(&D) -> C + Send + Sync + 'static,
    {
        self.action = Some(RemoteAction::new(None, command));
        self
    }

    /// Like [`action`](Self::action), but the step is skipped unless
    /// `predicate` holds for the saga data at the time.
    pub fn action_when<C, P, F>(mut self, predicate: P, command: F) -> Self
    where
        C: CommandType,
        P: Fn(&D) -> bool + Send + Sync + 'static,
        F: Fn(&D) -> C + Send + Sync + 'static,
    {
        self.action = Some(RemoteAction::new(Some(Box::new(predicate)), command));
        self
    }

    /// Sets the command sent while the saga compensates.
    pub fn compensation<C, F>(mut self, command: F) -> Self
    where
        C: CommandType,
        F: Fn(&D) -> C + Send + Sync + 'static,
    {
        self.compensation = Some(RemoteAction::new(None, command));
        self
    }

    pub fn compensation_when<C, P, F>(mut self, predicate: P, command: F) -> Self
    where
        C: CommandType,
        P: Fn(&D) -> bool + Send + Sync + 'static,
        F: Fn(&D) -> C + Send + Sync + 'static,
    {
        self.compensation = Some(RemoteAction::new(Some(Box::new(predicate)), command));
        self
    }

    /// Handles an `R` reply to the action command.
    ///
    /// Generic success and failure replies need no handler.
    pub fn on_action_reply<R, H>(mut self, handler: H) -> Self
    where
        R: ReplyType,
        H: Fn(&mut D, &R) -> Result<(), StepError> + Send + Sync + 'static,
    {
        self.action_replies
            .insert(R::REPLY_NAME, typed_reply_handler(handler));
        self
    }

    /// Handles an `R` reply to the compensation command.
    pub fn on_compensation_reply<R, H>(mut self, handler: H) -> Self
    where
        R: ReplyType,
        H: Fn(&mut D, &R) -> Result<(), StepError> + Send + Sync + 'static,
    {
        self.compensation_replies
            .insert(R::REPLY_NAME, typed_reply_handler(handler));
        self
    }

    fn action_for(&self, compensating: bool) -> Option<&RemoteAction<D>> {
        if compensating {
            self.compensation.as_ref()
        } else {
            self.action.as_ref()
        }
    }

    fn replies_for(&self, compensating: bool) -> &HashMap<&'static str, ReplyHandler<D>> {
        if compensating {
            &self.compensation_replies
        } else {
            &self.action_replies
        }
    }

    fn execute(&self, data: D, compensating: bool, context: StepContext) -> StepResults<D> {
        let commands = self
            .action_for(compensating)
            .map(|action| vec![(action.command)(&data)])
            .unwrap_or_default();

        StepResults {
            commands,
            updated_data: data,
            updated_context: context,
            local: false,
            failure: None,
        }
    }
}

impl<D: SagaData> Default for RemoteStep<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D> fmt::Debug for RemoteStep<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteStep")
            .field("action", &self.action.is_some())
            .field("compensation", &self.compensation.is_some())
            .field("action_replies", &self.action_replies.keys().collect::<Vec<_>>())
            .field(
                "compensation_replies",
                &self.compensation_replies.keys().collect::<Vec<_>>(),
            )
            .finish()
    }
}
