//! Order read and transition route handlers.

use axum::Json;
use axum::extract::{Path, State};
use serde::{Deserialize, Serialize};

use heron_core::{OrderId, OrderStatus};

use crate::db::OrderRepository;
use crate::error::{AppError, Result};
use crate::models::{Order, OrderItem};
use crate::services::orders::{self, TransitionRequest};
use crate::state::AppState;

/// An order with its line items, as returned to callers.
#[derive(Debug, Serialize)]
pub struct OrderView {
    #[serde(flatten)]
    pub order: Order,
    pub items: Vec<OrderItem>,
}

/// `GET /orders/{id}`.
pub async fn get_order(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<OrderView>> {
    let order_id = OrderId::new(id);
    let (order, items) = OrderRepository::new(state.pool())
        .get_with_items(order_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("order {order_id}")))?;

    Ok(Json(OrderView { order, items }))
}

/// Status update request body.
#[derive(Debug, Deserialize)]
pub struct UpdateStatusBody {
    pub status: OrderStatus,
    #[serde(default)]
    pub tracking_number: Option<String>,
    #[serde(default)]
    pub cancel_reason: Option<String>,
}

/// `PATCH /orders/{id}/status` - administrative transition.
pub async fn update_status(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<UpdateStatusBody>,
) -> Result<Json<Order>> {
    let order = orders::update_status(
        state.pool(),
        OrderId::new(id),
        &TransitionRequest {
            target: body.status,
            tracking_number: body.tracking_number,
            cancel_reason: body.cancel_reason,
        },
    )
    .await?;

    Ok(Json(order))
}

/// Cancellation request body.
#[derive(Debug, Deserialize)]
pub struct CancelBody {
    pub reason: String,
    #[serde(default)]
    pub user_id: Option<i64>,
    #[serde(default)]
    pub guest_email: Option<String>,
}

/// `POST /orders/{id}/cancel` - owner-initiated cancellation.
pub async fn cancel(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<CancelBody>,
) -> Result<Json<Order>> {
    let requester = super::parse_owner(body.user_id, body.guest_email.as_deref())?;
    let order =
        orders::cancel_order(state.pool(), OrderId::new(id), &requester, body.reason).await?;

    Ok(Json(order))
}
