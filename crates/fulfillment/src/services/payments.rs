//! Outbound payment-provider client.
//!
//! Checkout hands a created order to the provider to start the external
//! payment step; the order id doubles as the correlation token that the
//! confirmation webhook later carries back.

use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};

use crate::config::PaymentConfig;
use crate::models::Order;

/// Errors from payment initiation.
#[derive(Debug, thiserror::Error)]
pub enum PaymentError {
    #[error("payment provider request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("payment provider returned {status}")]
    Provider { status: reqwest::StatusCode },
}

/// A created payment session.
#[derive(Debug, Deserialize)]
pub struct PaymentSession {
    /// Where to send the shopper to complete payment.
    pub redirect_url: String,
}

#[derive(Debug, Serialize)]
struct CreateSessionRequest<'a> {
    order_id: i64,
    order_number: &'a str,
    /// Minor currency units.
    amount: i64,
    currency: &'a str,
}

/// Client for the external payment provider.
#[derive(Clone)]
pub struct PaymentClient {
    http: reqwest::Client,
    config: PaymentConfig,
}

impl PaymentClient {
    /// Create a new payment client.
    #[must_use]
    pub fn new(config: PaymentConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }

    /// Initiate payment for a freshly created order.
    ///
    /// Failure here does not undo the order: it stays `pending` and
    /// either the shopper retries payment or the expiry sweeper reclaims
    /// the reservation.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError` if the provider is unreachable or rejects
    /// the session.
    pub async fn initiate(&self, order: &Order) -> Result<PaymentSession, PaymentError> {
        let url = format!("{}/sessions", self.config.provider_url.trim_end_matches('/'));
        let response = self
            .http
            .post(&url)
            .bearer_auth(self.config.provider_token.expose_secret())
            .json(&CreateSessionRequest {
                order_id: order.id.as_i64(),
                order_number: &order.order_number,
                amount: order.total.as_minor(),
                currency: "USD",
            })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(PaymentError::Provider {
                status: response.status(),
            });
        }

        Ok(response.json::<PaymentSession>().await?)
    }
}
