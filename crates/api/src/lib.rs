//! HTTP demo service for the saga orchestrator.
//!
//! Runs an order fulfillment saga whose participants (inventory, payment,
//! shipping) live in the same process and talk to the orchestrator through an
//! in-memory broker. Exposes REST endpoints to start and inspect sagas, with
//! structured logging (tracing) and Prometheus metrics.

pub mod config;
pub mod error;
pub mod fulfillment;
pub mod routes;
pub mod services;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use instance_store::InstanceStore;
use metrics_exporter_prometheus::PrometheusHandle;
use msg::{InMemoryBroker, Publisher, Subscriber};
use saga::{Instance, Orchestrator, SagaDefinition};
use tokio::sync::Mutex;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use error::ApiError;
use fulfillment::OrderData;
use services::{InMemoryInventoryService, InMemoryPaymentService, InMemoryShippingService};

pub type FulfillmentOrchestrator =
    Orchestrator<SagaDefinition<OrderData>, Arc<dyn InstanceStore>, Publisher<InMemoryBroker>>;

/// Shared application state accessible from all handlers.
pub struct AppState {
    pub orchestrator: Arc<FulfillmentOrchestrator>,
    pub broker: InMemoryBroker,
    pub subscriber: Subscriber,
    pub inventory: InMemoryInventoryService,
    pub payment: InMemoryPaymentService,
    pub shipping: InMemoryShippingService,
    delivery: Mutex<()>,
}

impl AppState {
    /// Delivers pending messages until the broker is empty.
    ///
    /// Deliveries are serialized so that no two requests advance the same
    /// saga instance at once.
    pub async fn deliver(&self) -> msg::Result<usize> {
        let _guard = self.delivery.lock().await;
        self.subscriber.drain(&self.broker).await
    }

    /// Starts a fulfillment saga, delivers until the broker is empty and
    /// returns the instance as stored afterwards.
    ///
    /// The delivery lock is held from the first save on, so a concurrent
    /// delivery cannot act on a command whose instance update has not landed.
    pub async fn start_fulfillment(
        &self,
        data: OrderData,
    ) -> Result<Instance<OrderData>, ApiError> {
        let _guard = self.delivery.lock().await;

        let started = self.orchestrator.start(data).await?;
        self.subscriber.drain(&self.broker).await?;

        self.orchestrator
            .find_instance(started.saga_id())
            .await?
            .ok_or_else(|| ApiError::Internal("Saga not found after start".to_string()))
    }
}

/// Creates the Axum application router with all routes and shared state.
pub fn create_app(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route("/sagas/fulfillment", post(routes::sagas::start))
        .route("/sagas/fulfillment/{id}", get(routes::sagas::get))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Wires the orchestrator and the in-process participants onto one broker.
pub fn create_state(store: Arc<dyn InstanceStore>) -> msg::Result<Arc<AppState>> {
    let broker = InMemoryBroker::new();
    let inventory = InMemoryInventoryService::new();
    let payment = InMemoryPaymentService::new();
    let shipping = InMemoryShippingService::new();

    let orchestrator = Arc::new(Orchestrator::new(
        fulfillment::definition(),
        store,
        Publisher::new(broker.clone()),
        fulfillment::registry(),
    ));

    let mut subscriber = Subscriber::new();
    subscriber.subscribe(fulfillment::REPLY_CHANNEL, orchestrator.clone())?;
    subscriber.subscribe(
        fulfillment::INVENTORY_CHANNEL,
        Arc::new(inventory.dispatcher(Publisher::new(broker.clone()))),
    )?;
    subscriber.subscribe(
        fulfillment::PAYMENT_CHANNEL,
        Arc::new(payment.dispatcher(Publisher::new(broker.clone()))),
    )?;
    subscriber.subscribe(
        fulfillment::SHIPPING_CHANNEL,
        Arc::new(shipping.dispatcher(Publisher::new(broker.clone()))),
    )?;

    Ok(Arc::new(AppState {
        orchestrator,
        broker,
        subscriber,
        inventory,
        payment,
        shipping,
        delivery: Mutex::new(()),
    }))
}
