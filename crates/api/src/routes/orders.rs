//! Order creation, confirmation and listing endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use common::{EventId, OrderId, UserId};
use order_store::{Order, OrderStore, ReconciliationLog};
use saga::{
    CatalogService, ConfirmOutcome, CreateOrderRequest, OrderSagaCoordinator, ReservationService,
};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::extract::AppJson;

/// Shared application state accessible from all handlers.
pub struct AppState<O, C, R, L>
where
    O: OrderStore,
    C: CatalogService,
    R: ReservationService,
    L: ReconciliationLog,
{
    pub coordinator: OrderSagaCoordinator<O, C, R, L>,
    pub store: O,
}

// -- Request types --

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderBody {
    pub user_id: String,
    pub event_id: i64,
    pub quantity: i64,
}

// -- Response types --

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderResponse {
    pub id: String,
    pub user_id: String,
    pub event_id: i64,
    pub quantity: u32,
    pub total: f64,
    pub status: String,
    pub needs_reconciliation: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Order> for OrderResponse {
    fn from(order: Order) -> Self {
        Self {
            id: order.id.to_string(),
            user_id: order.user_id.to_string(),
            event_id: order.event_id.as_i64(),
            quantity: order.quantity,
            total: order.total.as_major_units(),
            status: order.status.to_string(),
            needs_reconciliation: order.needs_reconciliation,
            created_at: order.created_at.to_rfc3339(),
            updated_at: order.updated_at.to_rfc3339(),
        }
    }
}

#[derive(Serialize)]
pub struct OrderListResponse {
    pub orders: Vec<OrderResponse>,
}

#[derive(Serialize)]
pub struct ConfirmResponse {
    pub message: String,
    pub status: String,
}

// -- Handlers --

/// POST /orders — run the create-order saga.
#[tracing::instrument(skip(state, body))]
pub async fn create<O, C, R, L>(
    State(state): State<Arc<AppState<O, C, R, L>>>,
    AppJson(body): AppJson<CreateOrderBody>,
) -> Result<(StatusCode, Json<OrderResponse>), ApiError>
where
    O: OrderStore + 'static,
    C: CatalogService + 'static,
    R: ReservationService + 'static,
    L: ReconciliationLog + 'static,
{
    let quantity = u32::try_from(body.quantity)
        .map_err(|_| ApiError::BadRequest("quantity must be positive".to_string()))?;

    let order = state
        .coordinator
        .create_order(CreateOrderRequest {
            user_id: UserId::new(body.user_id),
            event_id: EventId::new(body.event_id),
            quantity,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(order.into())))
}

/// GET /orders — list every order.
#[tracing::instrument(skip(state))]
pub async fn list<O, C, R, L>(
    State(state): State<Arc<AppState<O, C, R, L>>>,
) -> Result<Json<OrderListResponse>, ApiError>
where
    O: OrderStore + 'static,
    C: CatalogService + 'static,
    R: ReservationService + 'static,
    L: ReconciliationLog + 'static,
{
    let orders = state.store.list_all().await?;
    Ok(Json(OrderListResponse {
        orders: orders.into_iter().map(OrderResponse::from).collect(),
    }))
}

/// GET /orders/user/{userId} — list one user's orders, newest first.
#[tracing::instrument(skip(state))]
pub async fn list_by_user<O, C, R, L>(
    State(state): State<Arc<AppState<O, C, R, L>>>,
    Path(user_id): Path<String>,
) -> Result<Json<Vec<OrderResponse>>, ApiError>
where
    O: OrderStore + 'static,
    C: CatalogService + 'static,
    R: ReservationService + 'static,
    L: ReconciliationLog + 'static,
{
    let orders = state.store.list_by_user(&UserId::new(user_id)).await?;
    Ok(Json(orders.into_iter().map(OrderResponse::from).collect()))
}

/// POST /orders/{id}/confirm — run the confirm-payment saga.
#[tracing::instrument(skip(state))]
pub async fn confirm<O, C, R, L>(
    State(state): State<Arc<AppState<O, C, R, L>>>,
    Path(id): Path<String>,
) -> Result<Json<ConfirmResponse>, ApiError>
where
    O: OrderStore + 'static,
    C: CatalogService + 'static,
    R: ReservationService + 'static,
    L: ReconciliationLog + 'static,
{
    let order_id = parse_order_id(&id)?;
    let outcome = state.coordinator.confirm_payment(order_id).await?;

    let message = match outcome {
        ConfirmOutcome::Settled => "payment confirmed, stock synchronized",
        ConfirmOutcome::AlreadySettled => "order already settled",
        ConfirmOutcome::SettledPendingReconciliation => {
            "payment confirmed, downstream sync pending reconciliation"
        }
    };

    Ok(Json(ConfirmResponse {
        message: message.to_string(),
        status: "SUCCESS".to_string(),
    }))
}

fn parse_order_id(id: &str) -> Result<OrderId, ApiError> {
    let uuid = uuid::Uuid::parse_str(id)
        .map_err(|e| ApiError::BadRequest(format!("Invalid order id: {e}")))?;
    Ok(OrderId::from_uuid(uuid))
}
