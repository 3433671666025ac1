//! Inventory participant.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use msg::{ReplyPublisher, with_reply, with_success};
use saga::{CommandDispatcher, SagaCommand, StepError};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::fulfillment::{InventoryReserved, OrderLine, ReleaseInventory, ReserveInventory};

#[derive(Debug, Default)]
struct InventoryState {
    reservations: HashMap<String, (Uuid, Vec<OrderLine>)>,
    next_id: u32,
}

/// In-memory inventory service.
#[derive(Debug, Clone, Default)]
pub struct InMemoryInventoryService {
    state: Arc<RwLock<InventoryState>>,
    fail_on_reserve: Arc<AtomicBool>,
}

impl InMemoryInventoryService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every following reservation fail until reset.
    pub fn set_fail_on_reserve(&self, fail: bool) {
        self.fail_on_reserve.store(fail, Ordering::SeqCst);
    }

    /// Number of active reservations.
    pub async fn reservation_count(&self) -> usize {
        self.state.read().await.reservations.len()
    }

    pub async fn has_reservation(&self, reservation_id: &str) -> bool {
        self.state
            .read()
            .await
            .reservations
            .contains_key(reservation_id)
    }

    pub async fn reserve(&self, order_id: Uuid, lines: Vec<OrderLine>) -> Result<String, StepError> {
        if self.fail_on_reserve.load(Ordering::SeqCst) {
            return Err(StepError::new("insufficient stock"));
        }

        let mut state = self.state.write().await;
        state.next_id += 1;
        let reservation_id = format!("RES-{:04}", state.next_id);
        state
            .reservations
            .insert(reservation_id.clone(), (order_id, lines));

        tracing::debug!(%order_id, reservation_id, "Inventory reserved");
        Ok(reservation_id)
    }

    /// Releases a reservation. Unknown ids are ignored so redelivered
    /// releases succeed.
    pub async fn release(&self, reservation_id: &str) {
        if self
            .state
            .write()
            .await
            .reservations
            .remove(reservation_id)
            .is_some()
        {
            tracing::debug!(reservation_id, "Inventory released");
        }
    }

    /// Builds the dispatcher answering inventory commands.
    pub fn dispatcher<P: ReplyPublisher>(&self, publisher: P) -> CommandDispatcher<P> {
        let reserve = self.clone();
        let release = self.clone();

        CommandDispatcher::new(publisher)
            .handle(move |cmd: SagaCommand<ReserveInventory>| {
                let service = reserve.clone();
                async move {
                    let ReserveInventory { order_id, lines } = cmd.into_command();
                    let reservation_id = service.reserve(order_id, lines).await?;
                    Ok(vec![with_reply(InventoryReserved { reservation_id }).success()])
                }
            })
            .handle(move |cmd: SagaCommand<ReleaseInventory>| {
                let service = release.clone();
                async move {
                    service.release(&cmd.command().reservation_id).await;
                    Ok(vec![with_success()])
                }
            })
    }
}
