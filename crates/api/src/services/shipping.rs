//! Shipping participant.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use msg::{ReplyPublisher, with_reply};
use saga::{CommandDispatcher, SagaCommand, StepError};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::fulfillment::{CreateShipment, OrderLine, ShipmentCreated};

#[derive(Debug, Default)]
struct ShippingState {
    shipments: HashMap<String, (Uuid, Vec<OrderLine>)>,
    next_id: u32,
}

/// In-memory shipping service.
#[derive(Debug, Clone, Default)]
pub struct InMemoryShippingService {
    state: Arc<RwLock<ShippingState>>,
    fail_on_create: Arc<AtomicBool>,
}

impl InMemoryShippingService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail_on_create(&self, fail: bool) {
        self.fail_on_create.store(fail, Ordering::SeqCst);
    }

    pub async fn shipment_count(&self) -> usize {
        self.state.read().await.shipments.len()
    }

    pub async fn create_shipment(
        &self,
        order_id: Uuid,
        lines: Vec<OrderLine>,
    ) -> Result<String, StepError> {
        if self.fail_on_create.load(Ordering::SeqCst) {
            return Err(StepError::new("no carrier available"));
        }

        let mut state = self.state.write().await;
        state.next_id += 1;
        let tracking_number = format!("TRACK-{:06}", state.next_id);
        state
            .shipments
            .insert(tracking_number.clone(), (order_id, lines));

        tracing::debug!(%order_id, tracking_number, "Shipment created");
        Ok(tracking_number)
    }

    /// Builds the dispatcher answering shipping commands.
    pub fn dispatcher<P: ReplyPublisher>(&self, publisher: P) -> CommandDispatcher<P> {
        let service = self.clone();

        CommandDispatcher::new(publisher).handle(move |cmd: SagaCommand<CreateShipment>| {
            let service = service.clone();
            async move {
                let CreateShipment { order_id, lines } = cmd.into_command();
                let tracking_number = service.create_shipment(order_id, lines).await?;
                Ok(vec![with_reply(ShipmentCreated { tracking_number }).success()])
            }
        })
    }
}
