//! HTTP routes exposed to the storefront/admin collaborators.

pub mod admin;
pub mod checkout;
pub mod orders;
pub mod webhooks;

use axum::Router;
use axum::routing::{get, patch, post};

use heron_core::{Email, OrderOwner, UserId};

use crate::error::AppError;
use crate::state::AppState;

/// Build the application router.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/checkout", post(checkout::checkout))
        .route("/orders/{id}", get(orders::get_order))
        .route("/orders/{id}/status", patch(orders::update_status))
        .route("/orders/{id}/cancel", post(orders::cancel))
        .route("/webhooks/payment", post(webhooks::payment))
        .route("/admin/sweep", post(admin::sweep))
}

/// Resolve the exactly-one-of identity pair carried in request bodies.
///
/// The identity layer upstream authenticates the caller; the core only
/// insists the claim is coherent.
pub(crate) fn parse_owner(
    user_id: Option<i64>,
    guest_email: Option<&str>,
) -> Result<OrderOwner, AppError> {
    match (user_id, guest_email) {
        (Some(id), None) => Ok(OrderOwner::User(UserId::new(id))),
        (None, Some(email)) => Email::parse(email)
            .map(OrderOwner::Guest)
            .map_err(|e| AppError::BadRequest(format!("invalid guest email: {e}"))),
        (Some(_), Some(_)) => Err(AppError::BadRequest(
            "provide either user_id or guest_email, not both".to_owned(),
        )),
        (None, None) => Err(AppError::BadRequest(
            "an order owner is required: user_id or guest_email".to_owned(),
        )),
    }
}
