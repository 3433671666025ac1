//! Saga orchestrator.
//!
//! Drives saga instances through their definition: runs local steps, publishes
//! commands for remote steps, correlates replies back to the waiting instance
//! and switches to compensation when a step fails.

use async_trait::async_trait;
use common::SagaId;
use instance_store::InstanceStore;
use msg::headers::{OUTCOME_SUCCESS, REPLY_NAME, REPLY_OUTCOME};
use msg::{
    CommandPublisher, Headers, Message, MessageReceiver, MsgError, ReplyMessage, TypeRegistry,
    with_failure, with_success,
};
use tracing::instrument;

use crate::definition::{Definition, LifecycleHook};
use crate::error::{Result, SagaError};
use crate::headers::{COMMAND_SAGA_ID, COMMAND_SAGA_NAME, REPLY_SAGA_ID, REPLY_SAGA_NAME};
use crate::instance::{Instance, SagaData};
use crate::step::StepResults;
use crate::step_context::StepContext;

type Data<Def> = <Def as Definition>::Data;

/// Runs sagas of a single definition.
///
/// The orchestrator holds no per-instance state between calls. Callers must
/// not run two calls for the same instance concurrently.
pub struct Orchestrator<Def, S, P> {
    definition: Def,
    store: S,
    publisher: P,
    registry: TypeRegistry,
}

impl<Def, S, P> Orchestrator<Def, S, P>
where
    Def: Definition,
    S: InstanceStore,
    P: CommandPublisher,
{
    /// Creates an orchestrator. `registry` must know every reply type the
    /// definition's participants send.
    pub fn new(definition: Def, store: S, publisher: P, registry: TypeRegistry) -> Self {
        tracing::debug!(saga_name = definition.saga_name(), "Orchestrator constructed");
        Self {
            definition,
            store,
            publisher,
            registry,
        }
    }

    pub fn definition(&self) -> &Def {
        &self.definition
    }

    pub fn saga_name(&self) -> &str {
        self.definition.saga_name()
    }

    /// Channel replies for this saga are expected on.
    pub fn reply_channel(&self) -> &str {
        self.definition.reply_channel()
    }

    /// Creates a new instance and runs it until it completes or waits on a
    /// remote step.
    #[instrument(skip(self, data), fields(saga_name = %self.saga_name(), saga_id))]
    pub async fn start(&self, data: Data<Def>) -> Result<Instance<Data<Def>>> {
        let started = std::time::Instant::now();
        let saga_name = self.saga_name().to_string();

        let mut instance = Instance::new(saga_name.clone(), SagaId::new(), data);
        tracing::Span::current().record("saga_id", tracing::field::display(instance.saga_id()));

        self.store.save(&instance.to_record()?).await?;
        metrics::counter!("saga_started_total", "saga_name" => saga_name.clone()).increment(1);

        self.definition
            .on_hook(LifecycleHook::SagaStarting, &instance);

        let results = self
            .execute_next_step(StepContext::not_started(), instance.saga_data().clone())
            .await;

        if let Err(e) = self.process_results(&mut instance, results).await {
            tracing::error!(error = %e, "Failed to start saga");
            return Err(e);
        }

        metrics::histogram!("saga_start_duration_seconds", "saga_name" => saga_name)
            .record(started.elapsed().as_secs_f64());
        tracing::info!(
            current_step = instance.current_step(),
            ended = instance.end_state(),
            "Saga started"
        );

        Ok(instance)
    }

    /// Loads an instance of this saga.
    pub async fn find_instance(&self, saga_id: SagaId) -> Result<Option<Instance<Data<Def>>>> {
        self.store
            .find(self.saga_name(), saga_id)
            .await?
            .map(Instance::from_record)
            .transpose()
    }

    /// Correlates a reply with its instance and resumes it.
    ///
    /// Replies that cannot be correlated are logged and dropped. Errors are
    /// returned only when an instance was found but could not be advanced.
    #[instrument(skip(self, message), fields(saga_name = %self.saga_name(), message_id = %message.id))]
    pub async fn receive_reply(&self, message: &Message) -> Result<()> {
        let Some((reply_name, saga_id)) = self.correlate(message) else {
            return Ok(());
        };

        let reply = match self.registry.decode_reply(reply_name, &message.payload) {
            Ok(reply) => reply,
            Err(e) => {
                tracing::warn!(reply_name, error = %e, "Dropping undecodable reply");
                self.record_dropped("undecodable");
                return Ok(());
            }
        };

        let Some(record) = self.store.find(self.saga_name(), saga_id).await? else {
            tracing::warn!(%saga_id, reply_name, "Dropping reply for unknown saga instance");
            self.record_dropped("unknown_instance");
            return Ok(());
        };

        let mut instance = Instance::<Data<Def>>::from_record(record)?;
        if instance.end_state() {
            tracing::warn!(%saga_id, reply_name, "Dropping reply for ended saga instance");
            self.record_dropped("ended");
            return Ok(());
        }

        tracing::debug!(%saga_id, reply_name, step = instance.current_step(), "Received saga reply");

        let reply = ReplyMessage::new(reply, message.headers.clone());
        let results = match self
            .handle_reply(instance.step_context(), instance.saga_data().clone(), &reply)
            .await
        {
            Ok(results) => results,
            Err(e) => {
                tracing::error!(%saga_id, error = %e, "Failed to handle saga reply");
                return Err(e);
            }
        };

        if let Err(e) = self.process_results(&mut instance, results).await {
            tracing::error!(%saga_id, error = %e, "Failed to process saga results");
            return Err(e);
        }

        Ok(())
    }

    /// Reads the reply name and saga id from a reply's headers, or `None` if
    /// the reply is not addressed to an instance of this saga.
    fn correlate<'m>(&self, message: &'m Message) -> Option<(&'m str, SagaId)> {
        let headers = &message.headers;
        let read = |key: &str| match headers.get_required(key) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(error = %e, "Dropping reply");
                None
            }
        };

        let (reply_name, saga_id, saga_name) = match (
            read(REPLY_NAME),
            read(REPLY_SAGA_ID),
            read(REPLY_SAGA_NAME),
        ) {
            (Some(reply_name), Some(saga_id), Some(saga_name)) => (reply_name, saga_id, saga_name),
            _ => {
                self.record_dropped("missing_header");
                return None;
            }
        };

        if saga_name != self.saga_name() {
            tracing::warn!(
                reply_saga_name = saga_name,
                "Dropping reply addressed to another saga"
            );
            self.record_dropped("saga_name_mismatch");
            return None;
        }

        match saga_id.parse::<SagaId>() {
            Ok(saga_id) => Some((reply_name, saga_id)),
            Err(e) => {
                tracing::warn!(saga_id, error = %e, "Dropping reply with invalid saga id");
                self.record_dropped("invalid_saga_id");
                None
            }
        }
    }

    fn record_dropped(&self, reason: &'static str) {
        metrics::counter!(
            "saga_replies_dropped_total",
            "saga_name" => self.saga_name().to_string(),
            "reason" => reason
        )
        .increment(1);
    }

    /// Publishes commands, applies and persists results, and keeps going for
    /// as long as the executed steps are local.
    async fn process_results(
        &self,
        instance: &mut Instance<Data<Def>>,
        mut results: StepResults<Data<Def>>,
    ) -> Result<()> {
        loop {
            if let Some(failure) = results.failure.take() {
                tracing::debug!(
                    step = results.updated_context.step(),
                    error = %failure,
                    "Local step failed"
                );
                results = self
                    .handle_reply(results.updated_context, results.updated_data, &with_failure())
                    .await?;
                continue;
            }

            for command in &results.commands {
                self.publisher
                    .publish_command(self.reply_channel(), command.as_ref(), saga_headers(instance))
                    .await?;
                metrics::counter!(
                    "saga_commands_published_total",
                    "saga_name" => self.saga_name().to_string()
                )
                .increment(1);
            }

            instance.update_step_context(results.updated_context);
            instance.set_saga_data(results.updated_data);

            if results.updated_context.is_ended() {
                self.process_end(instance);
            }

            self.store.update(&instance.to_record()?).await?;

            if !results.local {
                tracing::debug!(step = instance.current_step(), "Awaiting reply");
                break;
            }

            results = self
                .handle_reply(
                    instance.step_context(),
                    instance.saga_data().clone(),
                    &with_success(),
                )
                .await?;
        }

        Ok(())
    }

    fn process_end(&self, instance: &Instance<Data<Def>>) {
        let saga_name = self.saga_name().to_string();

        if instance.compensating() {
            self.definition
                .on_hook(LifecycleHook::SagaCompensated, instance);
            metrics::counter!("saga_compensated_total", "saga_name" => saga_name).increment(1);
            tracing::info!(saga_id = %instance.saga_id(), "Saga compensated");
        } else {
            self.definition
                .on_hook(LifecycleHook::SagaCompleted, instance);
            metrics::counter!("saga_completed_total", "saga_name" => saga_name).increment(1);
            tracing::info!(saga_id = %instance.saga_id(), "Saga completed");
        }
    }

    /// Applies a reply to the step at `context` and moves on in the direction
    /// its outcome calls for.
    async fn handle_reply(
        &self,
        context: StepContext,
        mut data: Data<Def>,
        reply: &ReplyMessage,
    ) -> Result<StepResults<Data<Def>>> {
        let steps = self.definition.steps();
        let step = usize::try_from(context.step())
            .ok()
            .and_then(|index| steps.get(index))
            .ok_or(SagaError::StepOutOfBounds {
                step: context.step(),
                len: steps.len(),
            })?;

        let reply_name = reply.reply().reply_name();
        if let Some(handler) = step.reply_handler(reply_name, context.is_compensating()) {
            handler(&mut data, reply.reply()).map_err(|source| SagaError::ReplyHandler {
                reply: reply_name.to_string(),
                source,
            })?;
        }

        let outcome = reply.headers().get_required(REPLY_OUTCOME)?;

        if outcome == OUTCOME_SUCCESS {
            Ok(self.execute_next_step(context, data).await)
        } else if context.is_compensating() {
            Err(SagaError::CompensationFailed {
                step: context.step(),
            })
        } else {
            tracing::debug!(step = context.step(), "Step failed, compensating");
            Ok(self.execute_next_step(context.compensate(), data).await)
        }
    }

    /// Runs the next step with an action for the current direction, or ends
    /// the saga when there is none.
    async fn execute_next_step(
        &self,
        context: StepContext,
        data: Data<Def>,
    ) -> StepResults<Data<Def>> {
        let steps = self.definition.steps();
        let compensating = context.is_compensating();
        let mut index = context.step() + context.direction();
        let mut delta = 1;

        while let Some(step) = usize::try_from(index).ok().and_then(|i| steps.get(i)) {
            if step.is_invocable(&data, compensating) {
                tracing::debug!(step = index, skipped = delta - 1, compensating, "Executing step");
                return step.execute(data, compensating, context.next(delta)).await;
            }

            delta += 1;
            index += context.direction();
        }

        StepResults::ended(context, data)
    }
}

fn saga_headers<D: SagaData>(instance: &Instance<D>) -> Headers {
    Headers::new()
        .with(COMMAND_SAGA_ID, instance.saga_id().to_string())
        .with(COMMAND_SAGA_NAME, instance.saga_name())
}

#[async_trait]
impl<Def, S, P> MessageReceiver for Orchestrator<Def, S, P>
where
    Def: Definition,
    S: InstanceStore,
    P: CommandPublisher,
{
    async fn receive_message(&self, message: &Message) -> msg::Result<()> {
        self.receive_reply(message).await.map_err(MsgError::receiver)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use instance_store::InMemoryInstanceStore;
    use msg::{CommandType, InMemoryBroker, Publisher};
    use serde::{Deserialize, Serialize};

    use super::*;
    use crate::{LocalStep, RemoteStep, SagaDefinition};

    #[derive(Debug, Clone, Default, Serialize, Deserialize)]
    struct Counter {
        value: i32,
    }

    impl SagaData for Counter {
        const SAGA_DATA_NAME: &'static str = "test.Counter";
    }

    #[derive(Debug, Serialize, Deserialize)]
    struct Ping;

    impl CommandType for Ping {
        const COMMAND_NAME: &'static str = "test.Ping";
        const DESTINATION_CHANNEL: &'static str = "pings";
    }

    fn orchestrator(
        definition: SagaDefinition<Counter>,
    ) -> Orchestrator<SagaDefinition<Counter>, InMemoryInstanceStore, Publisher<InMemoryBroker>>
    {
        Orchestrator::new(
            definition,
            InMemoryInstanceStore::new(),
            Publisher::new(InMemoryBroker::new()),
            TypeRegistry::new(),
        )
    }

    fn increment(counter: Arc<AtomicUsize>) -> LocalStep<Counter> {
        LocalStep::new(move |mut data: Counter| {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                data.value += 1;
                Ok(data)
            }
        })
    }

    #[tokio::test]
    async fn traversal_skips_steps_without_an_action() {
        let definition = SagaDefinition::<Counter>::new("skips", "skips.replies")
            .step(RemoteStep::new().action_when(|_: &Counter| false, |_: &Counter| Ping))
            .step(RemoteStep::new().compensation(|_: &Counter| Ping))
            .step(RemoteStep::new().action(|_: &Counter| Ping));
        let orchestrator = orchestrator(definition);

        let results = orchestrator
            .execute_next_step(StepContext::not_started(), Counter::default())
            .await;

        assert_eq!(results.updated_context.step(), 2);
        assert_eq!(results.commands.len(), 1);
        assert!(!results.local);
    }

    #[tokio::test]
    async fn traversal_past_the_last_step_ends_without_executing() {
        let executed = Arc::new(AtomicUsize::new(0));
        let definition = SagaDefinition::<Counter>::new("ends", "ends.replies")
            .step(increment(executed.clone()))
            .step(RemoteStep::new().compensation(|_: &Counter| Ping));
        let orchestrator = orchestrator(definition);

        let results = orchestrator
            .execute_next_step(StepContext::new(0, false, false), Counter::default())
            .await;

        assert!(results.updated_context.is_ended());
        assert_eq!(results.updated_context.step(), 0);
        assert!(results.commands.is_empty());
        assert_eq!(executed.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn backward_traversal_stops_before_index_zero() {
        let definition = SagaDefinition::<Counter>::new("back", "back.replies")
            .step(RemoteStep::new().action(|_: &Counter| Ping))
            .step(RemoteStep::new().action(|_: &Counter| Ping));
        let orchestrator = orchestrator(definition);

        let results = orchestrator
            .execute_next_step(StepContext::new(1, true, false), Counter::default())
            .await;

        assert!(results.updated_context.is_ended());
        assert!(results.updated_context.is_compensating());
        assert!(results.commands.is_empty());
    }

    #[tokio::test]
    async fn out_of_bounds_step_is_fatal() {
        let definition = SagaDefinition::<Counter>::new("bounds", "bounds.replies")
            .step(increment(Arc::default()));
        let orchestrator = orchestrator(definition);

        let err = orchestrator
            .handle_reply(
                StepContext::new(5, false, false),
                Counter::default(),
                &with_success(),
            )
            .await
            .err()
            .unwrap();
        assert!(matches!(err, SagaError::StepOutOfBounds { step: 5, len: 1 }));

        let err = orchestrator
            .handle_reply(StepContext::not_started(), Counter::default(), &with_success())
            .await
            .err()
            .unwrap();
        assert!(matches!(err, SagaError::StepOutOfBounds { step: -1, .. }));
    }

    #[tokio::test]
    async fn missing_outcome_header_is_fatal() {
        let definition = SagaDefinition::<Counter>::new("outcome", "outcome.replies")
            .step(increment(Arc::default()));
        let orchestrator = orchestrator(definition);

        let reply = ReplyMessage::new(Box::new(msg::Success), Headers::new());
        let err = orchestrator
            .handle_reply(StepContext::new(0, false, false), Counter::default(), &reply)
            .await
            .err()
            .unwrap();
        assert!(matches!(err, SagaError::Msg(MsgError::MissingHeader(_))));
    }
}
