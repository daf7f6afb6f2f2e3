//! Checkout route handler.

use axum::Json;
use axum::extract::State;
use serde::{Deserialize, Serialize};

use heron_core::OrderId;

use crate::error::Result;
use crate::models::Address;
use crate::services::checkout::{self, CartLine, CheckoutRequest};
use crate::state::AppState;

/// Checkout request body.
#[derive(Debug, Deserialize)]
pub struct CheckoutBody {
    #[serde(default)]
    pub user_id: Option<i64>,
    #[serde(default)]
    pub guest_email: Option<String>,
    pub items: Vec<CartLine>,
    pub shipping_address: Address,
}

/// Checkout response body.
#[derive(Debug, Serialize)]
pub struct CheckoutResponse {
    pub order_id: OrderId,
    pub order_number: String,
    /// Where to send the shopper to pay. `null` when payment initiation
    /// failed; the order is still placed and payment can be retried.
    pub payment_redirect: Option<String>,
}

/// `POST /checkout` - reserve stock and create a pending order.
pub async fn checkout(
    State(state): State<AppState>,
    Json(body): Json<CheckoutBody>,
) -> Result<Json<CheckoutResponse>> {
    let owner = super::parse_owner(body.user_id, body.guest_email.as_deref())?;

    let outcome = checkout::place_order(
        state.pool(),
        &state.config().pricing,
        &CheckoutRequest {
            owner,
            items: body.items,
            shipping_address: body.shipping_address,
        },
    )
    .await?;
    let order = outcome.order;

    // The order exists either way; a failed initiation only costs the
    // redirect and is retried by the shopper (or swept after timeout).
    let payment_redirect = match state.payments().initiate(&order).await {
        Ok(session) => Some(session.redirect_url),
        Err(err) => {
            tracing::warn!(
                order_id = %order.id,
                error = %err,
                "payment initiation failed for placed order"
            );
            None
        }
    };

    Ok(Json(CheckoutResponse {
        order_id: order.id,
        order_number: order.order_number,
        payment_redirect,
    }))
}
