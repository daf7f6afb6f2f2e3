//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use crate::config::FulfillmentConfig;
use crate::services::payments::PaymentClient;

/// Application state shared across all handlers.
///
/// Cheaply cloneable via `Arc`; provides access to the database pool,
/// configuration, and the payment-provider client.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: FulfillmentConfig,
    pool: PgPool,
    payments: PaymentClient,
}

impl AppState {
    /// Create a new application state.
    #[must_use]
    pub fn new(config: FulfillmentConfig, pool: PgPool) -> Self {
        let payments = PaymentClient::new(config.payment.clone());
        Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                payments,
            }),
        }
    }

    /// Get a reference to the service configuration.
    #[must_use]
    pub fn config(&self) -> &FulfillmentConfig {
        &self.inner.config
    }

    /// Get a reference to the database connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    /// Get a reference to the payment-provider client.
    #[must_use]
    pub fn payments(&self) -> &PaymentClient {
        &self.inner.payments
    }
}
