//! Payment webhook intake.

use axum::Json;
use axum::extract::State;
use serde::Serialize;

use crate::error::Result;
use crate::services::confirmation::{self, ConfirmationOutcome, PaymentNotification};
use crate::state::AppState;

/// Webhook acknowledgement body.
#[derive(Debug, Serialize)]
pub struct WebhookAck {
    pub status: &'static str,
}

/// `POST /webhooks/payment` - at-least-once provider notifications.
///
/// Always returns 200 for deliveries whose effect is already applied, so
/// the provider stops retrying; verification failures return 4xx and are
/// logged as security-relevant.
pub async fn payment(
    State(state): State<AppState>,
    Json(notification): Json<PaymentNotification>,
) -> Result<Json<WebhookAck>> {
    let outcome = confirmation::handle(state.pool(), &notification).await?;

    let status = match outcome {
        ConfirmationOutcome::Confirmed => "confirmed",
        ConfirmationOutcome::AlreadyProcessed => "already_processed",
        ConfirmationOutcome::Ignored => "ignored",
    };

    Ok(Json(WebhookAck { status }))
}
