//! Integration tests for the API server.

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use async_trait::async_trait;
use instance_store::{InMemoryInstanceStore, InstanceRecord, InstanceStore, SagaId};
use metrics_exporter_prometheus::PrometheusHandle;
use tower::ServiceExt;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

fn get_metrics_handle() -> PrometheusHandle {
    METRICS_HANDLE
        .get_or_init(|| {
            let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
            builder
                .install_recorder()
                .expect("failed to install Prometheus recorder")
        })
        .clone()
}

fn setup() -> (axum::Router, Arc<api::AppState>) {
    let state = api::create_state(Arc::new(InMemoryInstanceStore::new())).unwrap();
    let app = api::create_app(state.clone(), get_metrics_handle());
    (app, state)
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

async fn start_saga(app: &axum::Router, request: serde_json::Value) -> axum::response::Response {
    app.clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/sagas/fulfillment")
                .header("content-type", "application/json")
                .body(Body::from(serde_json::to_string(&request).unwrap()))
                .unwrap(),
        )
        .await
        .unwrap()
}

fn widget_order() -> serde_json::Value {
    serde_json::json!({
        "lines": [{
            "product_id": "SKU-001",
            "quantity": 2,
            "unit_price_cents": 1000
        }]
    })
}

#[tokio::test]
async fn test_health_check() {
    let (app, _) = setup();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let health = body_json(response).await;
    assert_eq!(health["status"], "ok");
    assert_eq!(health["saga_name"], "order-fulfillment");
    assert_eq!(health["pending_messages"], 0);
}

#[tokio::test]
async fn test_metrics_endpoint_reports_saga_counters() {
    let (app, _) = setup();
    start_saga(&app, widget_order()).await;

    let response = app
        .oneshot(
            Request::builder()
                .uri("/metrics")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(body.to_vec()).unwrap();
    assert!(text.contains("saga_started_total"));
}

#[tokio::test]
async fn test_fulfillment_completes() {
    let (app, state) = setup();

    let response = start_saga(&app, widget_order()).await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let saga = body_json(response).await;
    assert_eq!(saga["state"], "completed");
    assert_eq!(saga["saga_name"], "order-fulfillment");
    assert_eq!(saga["current_step"], 4);
    assert_eq!(saga["order"]["status"], "approved");
    assert_eq!(saga["order"]["reservation_id"], "RES-0001");
    assert_eq!(saga["order"]["payment_id"], "PAY-0001");
    assert_eq!(saga["order"]["tracking_number"], "TRACK-000001");

    assert_eq!(state.inventory.reservation_count().await, 1);
    assert_eq!(state.payment.authorization_count().await, 1);
    assert_eq!(state.shipping.shipment_count().await, 1);
    assert_eq!(state.broker.pending_count().await, 0);
}

#[tokio::test]
async fn test_payment_failure_compensates() {
    let (app, state) = setup();
    state.payment.set_fail_on_authorize(true);

    let response = start_saga(&app, widget_order()).await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let saga = body_json(response).await;
    assert_eq!(saga["state"], "compensated");
    assert_eq!(saga["current_step"], 0);
    assert_eq!(saga["order"]["status"], "rejected");
    assert!(saga["order"]["payment_id"].is_null());

    assert_eq!(state.inventory.reservation_count().await, 0);
    assert_eq!(state.shipping.shipment_count().await, 0);
}

#[tokio::test]
async fn test_shipping_failure_voids_payment_and_releases_inventory() {
    let (app, state) = setup();
    state.shipping.set_fail_on_create(true);

    let saga = body_json(start_saga(&app, widget_order()).await).await;
    assert_eq!(saga["state"], "compensated");
    assert_eq!(saga["order"]["status"], "rejected");

    assert_eq!(state.inventory.reservation_count().await, 0);
    assert_eq!(state.payment.authorization_count().await, 0);
}

#[tokio::test]
async fn test_free_order_skips_payment() {
    let (app, state) = setup();

    let saga = body_json(
        start_saga(
            &app,
            serde_json::json!({
                "lines": [{
                    "product_id": "SAMPLE-001",
                    "quantity": 1,
                    "unit_price_cents": 0
                }]
            }),
        )
        .await,
    )
    .await;

    assert_eq!(saga["state"], "completed");
    assert!(saga["order"]["payment_id"].is_null());
    assert_eq!(state.payment.authorization_count().await, 0);
}

#[tokio::test]
async fn test_empty_order_fails_the_first_step() {
    let (app, state) = setup();

    let saga = body_json(start_saga(&app, serde_json::json!({ "lines": [] })).await).await;

    // Nothing before the failed step needs undoing.
    assert_eq!(saga["state"], "compensated");
    assert_eq!(saga["current_step"], 0);
    assert_eq!(saga["order"]["status"], "new");
    assert_eq!(state.broker.pending_count().await, 0);
    assert_eq!(state.inventory.reservation_count().await, 0);
}

#[tokio::test]
async fn test_get_saga() {
    let (app, _) = setup();

    let created = body_json(start_saga(&app, widget_order()).await).await;
    let saga_id = created["saga_id"].as_str().unwrap();

    let response = app
        .oneshot(
            Request::builder()
                .uri(format!("/sagas/fulfillment/{saga_id}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let saga = body_json(response).await;
    assert_eq!(saga["saga_id"], saga_id);
    assert_eq!(saga["state"], "completed");
    assert_eq!(saga["order"], created["order"]);
}

#[tokio::test]
async fn test_get_unknown_saga() {
    let (app, _) = setup();

    let response = app
        .oneshot(
            Request::builder()
                .uri(format!("/sagas/fulfillment/{}", uuid::Uuid::new_v4()))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_get_saga_with_invalid_id() {
    let (app, _) = setup();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/sagas/fulfillment/not-a-uuid")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_start_with_invalid_customer_id() {
    let (app, _) = setup();

    let response = start_saga(
        &app,
        serde_json::json!({
            "customer_id": "not-a-uuid",
            "lines": [{
                "product_id": "SKU-001",
                "quantity": 1,
                "unit_price_cents": 100
            }]
        }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

/// Delays the update that records the inventory command as sent.
struct SlowReservationStore {
    inner: InMemoryInstanceStore,
    delay: Duration,
}

#[async_trait]
impl InstanceStore for SlowReservationStore {
    async fn find(
        &self,
        saga_name: &str,
        saga_id: SagaId,
    ) -> instance_store::Result<Option<InstanceRecord>> {
        self.inner.find(saga_name, saga_id).await
    }

    async fn save(&self, record: &InstanceRecord) -> instance_store::Result<()> {
        self.inner.save(record).await
    }

    async fn update(&self, record: &InstanceRecord) -> instance_store::Result<()> {
        if record.current_step == 1 && record.saga_data["reservation_id"].is_null() {
            tokio::time::sleep(self.delay).await;
        }
        self.inner.update(record).await
    }
}

#[tokio::test]
async fn test_concurrent_delivery_waits_for_start_to_persist() {
    let state = api::create_state(Arc::new(SlowReservationStore {
        inner: InMemoryInstanceStore::new(),
        delay: Duration::from_millis(300),
    }))
    .unwrap();

    let starting = {
        let state = state.clone();
        tokio::spawn(async move {
            state
                .start_fulfillment(api::fulfillment::OrderData::new(
                    uuid::Uuid::new_v4(),
                    vec![api::fulfillment::OrderLine {
                        product_id: "SKU-001".to_string(),
                        quantity: 1,
                        unit_price_cents: 500,
                    }],
                ))
                .await
        })
    };

    // Lands while the start is still persisting the inventory step.
    tokio::time::sleep(Duration::from_millis(100)).await;
    state.deliver().await.unwrap();

    let instance = starting.await.unwrap().unwrap();
    assert!(instance.end_state());
    assert!(!instance.compensating());

    let reserve_commands = state.broker.published("inventory").await;
    assert_eq!(reserve_commands.len(), 1);
    assert_eq!(state.inventory.reservation_count().await, 1);
    assert_eq!(state.payment.authorization_count().await, 1);
    assert_eq!(state.broker.pending_count().await, 0);
}
