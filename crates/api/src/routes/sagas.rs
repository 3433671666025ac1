//! Order fulfillment saga endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use saga::{Instance, SagaId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::AppState;
use crate::error::ApiError;
use crate::fulfillment::{OrderData, OrderLine};

// -- Request types --

#[derive(Deserialize)]
pub struct StartFulfillmentRequest {
    pub customer_id: Option<String>,
    pub lines: Vec<OrderLineRequest>,
}

#[derive(Deserialize)]
pub struct OrderLineRequest {
    pub product_id: String,
    pub quantity: u32,
    pub unit_price_cents: i64,
}

// -- Response types --

#[derive(Serialize)]
pub struct SagaStatusResponse {
    pub saga_id: String,
    pub saga_name: String,
    pub state: &'static str,
    pub current_step: i32,
    pub order: OrderData,
}

impl SagaStatusResponse {
    fn from_instance(instance: &Instance<OrderData>) -> Self {
        let state = match (instance.end_state(), instance.compensating()) {
            (false, false) => "running",
            (false, true) => "compensating",
            (true, false) => "completed",
            (true, true) => "compensated",
        };

        Self {
            saga_id: instance.saga_id().to_string(),
            saga_name: instance.saga_name().to_string(),
            state,
            current_step: instance.current_step(),
            order: instance.saga_data().clone(),
        }
    }
}

// -- Handlers --

/// POST /sagas/fulfillment — start a fulfillment saga and run it as far as
/// the in-process participants take it.
#[tracing::instrument(skip(state, req))]
pub async fn start(
    State(state): State<Arc<AppState>>,
    Json(req): Json<StartFulfillmentRequest>,
) -> Result<(StatusCode, Json<SagaStatusResponse>), ApiError> {
    let customer_id = match req.customer_id {
        Some(ref id) => Uuid::parse_str(id)
            .map_err(|e| ApiError::BadRequest(format!("Invalid customer_id: {e}")))?,
        None => Uuid::new_v4(),
    };

    let lines = req
        .lines
        .into_iter()
        .map(|line| OrderLine {
            product_id: line.product_id,
            quantity: line.quantity,
            unit_price_cents: line.unit_price_cents,
        })
        .collect();

    let instance = state
        .start_fulfillment(OrderData::new(customer_id, lines))
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(SagaStatusResponse::from_instance(&instance)),
    ))
}

/// GET /sagas/fulfillment/:id — current state of a fulfillment saga.
#[tracing::instrument(skip(state))]
pub async fn get(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<SagaStatusResponse>, ApiError> {
    let saga_id: SagaId = id
        .parse()
        .map_err(|e| ApiError::BadRequest(format!("Invalid ID format: {e}")))?;

    let instance = state
        .orchestrator
        .find_instance(saga_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Saga {id} not found")))?;

    Ok(Json(SagaStatusResponse::from_instance(&instance)))
}
