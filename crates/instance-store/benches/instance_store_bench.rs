use criterion::{Criterion, criterion_group, criterion_main};
use instance_store::{InMemoryInstanceStore, InstanceRecord, InstanceStore, SagaId};

fn make_record() -> InstanceRecord {
    InstanceRecord {
        saga_id: SagaId::new(),
        saga_name: "fulfillment".to_string(),
        saga_data_name: "bench.FulfillmentData".to_string(),
        saga_data: serde_json::json!({
            "order_id": "ORD-0001",
            "total_cents": 12_500,
            "items": [{"sku": "SKU-1", "quantity": 2}]
        }),
        current_step: 0,
        end_state: false,
        compensating: false,
    }
}

fn bench_save(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    c.bench_function("instance_store/save", |b| {
        b.iter(|| {
            rt.block_on(async {
                let store = InMemoryInstanceStore::new();
                store.save(&make_record()).await.unwrap();
            });
        });
    });
}

fn bench_save_update_find(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    c.bench_function("instance_store/save_update_find", |b| {
        b.iter(|| {
            rt.block_on(async {
                let store = InMemoryInstanceStore::new();
                let mut record = make_record();
                store.save(&record).await.unwrap();

                for step in 1..=4 {
                    record.current_step = step;
                    store.update(&record).await.unwrap();
                }

                store
                    .find(&record.saga_name, record.saga_id)
                    .await
                    .unwrap()
                    .unwrap();
            });
        });
    });
}

criterion_group!(benches, bench_save, bench_save_update_find);
criterion_main!(benches);
