//! The order fulfillment saga.
//!
//! Steps:
//! 1. mark the order pending (rejected on compensation)
//! 2. reserve inventory (released on compensation)
//! 3. authorize payment, skipped for free orders (voided on compensation)
//! 4. create the shipment
//! 5. approve the order

use msg::{CommandType, ReplyType, TypeRegistry};
use saga::{Instance, LifecycleHook, LocalStep, RemoteStep, SagaData, SagaDefinition, StepError};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const SAGA_NAME: &str = "order-fulfillment";
pub const REPLY_CHANNEL: &str = "fulfillment.replies";

pub const INVENTORY_CHANNEL: &str = "inventory";
pub const PAYMENT_CHANNEL: &str = "payment";
pub const SHIPPING_CHANNEL: &str = "shipping";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    New,
    Pending,
    Approved,
    Rejected,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub product_id: String,
    pub quantity: u32,
    pub unit_price_cents: i64,
}

/// Saga data carried through every step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderData {
    pub order_id: Uuid,
    pub customer_id: Uuid,
    pub lines: Vec<OrderLine>,
    pub status: OrderStatus,
    pub reservation_id: Option<String>,
    pub payment_id: Option<String>,
    pub tracking_number: Option<String>,
}

impl OrderData {
    pub fn new(customer_id: Uuid, lines: Vec<OrderLine>) -> Self {
        Self {
            order_id: Uuid::new_v4(),
            customer_id,
            lines,
            status: OrderStatus::New,
            reservation_id: None,
            payment_id: None,
            tracking_number: None,
        }
    }

    pub fn total_cents(&self) -> i64 {
        self.lines
            .iter()
            .map(|line| i64::from(line.quantity) * line.unit_price_cents)
            .sum()
    }
}

impl SagaData for OrderData {
    const SAGA_DATA_NAME: &'static str = "fulfillment.OrderData";
}

// -- Commands --

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReserveInventory {
    pub order_id: Uuid,
    pub lines: Vec<OrderLine>,
}

impl CommandType for ReserveInventory {
    const COMMAND_NAME: &'static str = "inventory.ReserveInventory";
    const DESTINATION_CHANNEL: &'static str = INVENTORY_CHANNEL;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReleaseInventory {
    pub reservation_id: String,
}

impl CommandType for ReleaseInventory {
    const COMMAND_NAME: &'static str = "inventory.ReleaseInventory";
    const DESTINATION_CHANNEL: &'static str = INVENTORY_CHANNEL;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorizePayment {
    pub order_id: Uuid,
    pub customer_id: Uuid,
    pub amount_cents: i64,
}

impl CommandType for AuthorizePayment {
    const COMMAND_NAME: &'static str = "payment.AuthorizePayment";
    const DESTINATION_CHANNEL: &'static str = PAYMENT_CHANNEL;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoidPayment {
    pub payment_id: String,
}

impl CommandType for VoidPayment {
    const COMMAND_NAME: &'static str = "payment.VoidPayment";
    const DESTINATION_CHANNEL: &'static str = PAYMENT_CHANNEL;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateShipment {
    pub order_id: Uuid,
    pub lines: Vec<OrderLine>,
}

impl CommandType for CreateShipment {
    const COMMAND_NAME: &'static str = "shipping.CreateShipment";
    const DESTINATION_CHANNEL: &'static str = SHIPPING_CHANNEL;
}

// -- Replies --

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventoryReserved {
    pub reservation_id: String,
}

impl ReplyType for InventoryReserved {
    const REPLY_NAME: &'static str = "inventory.InventoryReserved";
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentAuthorized {
    pub payment_id: String,
}

impl ReplyType for PaymentAuthorized {
    const REPLY_NAME: &'static str = "payment.PaymentAuthorized";
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShipmentCreated {
    pub tracking_number: String,
}

impl ReplyType for ShipmentCreated {
    const REPLY_NAME: &'static str = "shipping.ShipmentCreated";
}

/// Reply types the orchestrator must be able to decode.
pub fn registry() -> TypeRegistry {
    TypeRegistry::new()
        .register_reply::<InventoryReserved>()
        .register_reply::<PaymentAuthorized>()
        .register_reply::<ShipmentCreated>()
}

/// Builds the order fulfillment saga definition.
pub fn definition() -> SagaDefinition<OrderData> {
    SagaDefinition::<OrderData>::new(SAGA_NAME, REPLY_CHANNEL)
        .step(
            LocalStep::new(|mut data: OrderData| async move {
                if data.lines.is_empty() {
                    return Err(StepError::new("order has no lines"));
                }
                data.status = OrderStatus::Pending;
                Ok(data)
            })
            .compensation(|mut data: OrderData| async move {
                data.status = OrderStatus::Rejected;
                Ok(data)
            }),
        )
        .step(
            RemoteStep::new()
                .action(|data: &OrderData| ReserveInventory {
                    order_id: data.order_id,
                    lines: data.lines.clone(),
                })
                .on_action_reply(|data: &mut OrderData, reply: &InventoryReserved| {
                    data.reservation_id = Some(reply.reservation_id.clone());
                    Ok(())
                })
                .compensation_when(
                    |data: &OrderData| data.reservation_id.is_some(),
                    |data: &OrderData| ReleaseInventory {
                        reservation_id: data.reservation_id.clone().unwrap_or_default(),
                    },
                ),
        )
        .step(
            RemoteStep::new()
                .action_when(
                    |data: &OrderData| data.total_cents() > 0,
                    |data: &OrderData| AuthorizePayment {
                        order_id: data.order_id,
                        customer_id: data.customer_id,
                        amount_cents: data.total_cents(),
                    },
                )
                .on_action_reply(|data: &mut OrderData, reply: &PaymentAuthorized| {
                    data.payment_id = Some(reply.payment_id.clone());
                    Ok(())
                })
                .compensation_when(
                    |data: &OrderData| data.payment_id.is_some(),
                    |data: &OrderData| VoidPayment {
                        payment_id: data.payment_id.clone().unwrap_or_default(),
                    },
                ),
        )
        .step(
            RemoteStep::new()
                .action(|data: &OrderData| CreateShipment {
                    order_id: data.order_id,
                    lines: data.lines.clone(),
                })
                .on_action_reply(|data: &mut OrderData, reply: &ShipmentCreated| {
                    data.tracking_number = Some(reply.tracking_number.clone());
                    Ok(())
                }),
        )
        .step(LocalStep::new(|mut data: OrderData| async move {
            data.status = OrderStatus::Approved;
            Ok(data)
        }))
        .on_hook(log_lifecycle)
}

fn log_lifecycle(hook: LifecycleHook, instance: &Instance<OrderData>) {
    tracing::info!(
        %hook,
        saga_id = %instance.saga_id(),
        order_id = %instance.saga_data().order_id,
        "Order fulfillment lifecycle"
    );
}
