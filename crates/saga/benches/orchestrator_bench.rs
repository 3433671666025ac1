use std::sync::Arc;

use criterion::{Criterion, criterion_group, criterion_main};
use instance_store::InMemoryInstanceStore;
use msg::{
    CommandType, InMemoryBroker, Publisher, ReplyType, Subscriber, TypeRegistry, with_reply,
};
use saga::{
    CommandDispatcher, LocalStep, Orchestrator, RemoteStep, SagaCommand, SagaData, SagaDefinition,
};
use serde::{Deserialize, Serialize};

const REPLY_CHANNEL: &str = "bench.replies";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct BenchData {
    counter: u64,
    ticket: Option<String>,
}

impl SagaData for BenchData {
    const SAGA_DATA_NAME: &'static str = "bench.BenchData";
}

#[derive(Debug, Serialize, Deserialize)]
struct IssueTicket {
    counter: u64,
}

impl CommandType for IssueTicket {
    const COMMAND_NAME: &'static str = "bench.IssueTicket";
    const DESTINATION_CHANNEL: &'static str = "bench.tickets";
}

#[derive(Debug, Serialize, Deserialize)]
struct TicketIssued {
    ticket: String,
}

impl ReplyType for TicketIssued {
    const REPLY_NAME: &'static str = "bench.TicketIssued";
}

fn increment() -> LocalStep<BenchData> {
    LocalStep::new(|mut data: BenchData| async move {
        data.counter += 1;
        Ok(data)
    })
}

fn bench_local_saga(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let definition = SagaDefinition::<BenchData>::new("bench-local", REPLY_CHANNEL)
        .step(increment())
        .step(increment())
        .step(increment());
    let orchestrator = Orchestrator::new(
        definition,
        InMemoryInstanceStore::new(),
        Publisher::new(InMemoryBroker::new()),
        TypeRegistry::new(),
    );

    c.bench_function("saga/start_local_three_steps", |b| {
        b.iter(|| {
            rt.block_on(async {
                orchestrator
                    .start(BenchData {
                        counter: 0,
                        ticket: None,
                    })
                    .await
                    .unwrap();
            });
        });
    });
}

fn bench_remote_round_trip(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let broker = InMemoryBroker::new();

    let definition = SagaDefinition::<BenchData>::new("bench-remote", REPLY_CHANNEL)
        .step(increment())
        .step(
            RemoteStep::new()
                .action(|data: &BenchData| IssueTicket {
                    counter: data.counter,
                })
                .on_action_reply(|data: &mut BenchData, reply: &TicketIssued| {
                    data.ticket = Some(reply.ticket.clone());
                    Ok(())
                }),
        );
    let orchestrator = Arc::new(Orchestrator::new(
        definition,
        InMemoryInstanceStore::new(),
        Publisher::new(broker.clone()),
        TypeRegistry::new().register_reply::<TicketIssued>(),
    ));
    let tickets = CommandDispatcher::new(Publisher::new(broker.clone())).handle(
        |cmd: SagaCommand<IssueTicket>| async move {
            Ok(vec![
                with_reply(TicketIssued {
                    ticket: format!("TCK-{}", cmd.command().counter),
                })
                .success(),
            ])
        },
    );

    let mut subscriber = Subscriber::new();
    subscriber
        .subscribe(REPLY_CHANNEL, orchestrator.clone())
        .unwrap();
    subscriber
        .subscribe("bench.tickets", Arc::new(tickets))
        .unwrap();

    c.bench_function("saga/remote_round_trip", |b| {
        b.iter(|| {
            rt.block_on(async {
                orchestrator
                    .start(BenchData {
                        counter: 0,
                        ticket: None,
                    })
                    .await
                    .unwrap();
                subscriber.drain(&broker).await.unwrap();
                broker.clear().await;
            });
        });
    });
}

criterion_group!(benches, bench_local_saga, bench_remote_round_trip);
criterion_main!(benches);
