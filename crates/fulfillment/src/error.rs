//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures server-side errors to
//! Sentry before responding. All route handlers return
//! `Result<T, AppError>`; the mapping here is the single place that
//! decides which failures shoppers see and which stay internal.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::db::RepositoryError;
use crate::services::checkout::CheckoutError;
use crate::services::confirmation::ConfirmationError;
use crate::services::orders::TransitionError;

/// Application-level error type for the fulfillment service.
#[derive(Debug, Error)]
pub enum AppError {
    /// Checkout failed.
    #[error("Checkout error: {0}")]
    Checkout(#[from] CheckoutError),

    /// Payment webhook processing failed.
    #[error("Confirmation error: {0}")]
    Confirmation(#[from] ConfirmationError),

    /// Administrative order transition failed.
    #[error("Transition error: {0}")]
    Transition(#[from] TransitionError),

    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Missing or invalid operator credential.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Whether this error is the server's fault rather than the
    /// caller's. Server faults are captured to Sentry and masked in the
    /// response body.
    const fn is_server_error(&self) -> bool {
        match self {
            Self::Checkout(err) => matches!(
                err,
                CheckoutError::Ledger(_)
                    | CheckoutError::Repository(_)
                    | CheckoutError::TotalOverflow
            ),
            Self::Confirmation(err) => matches!(
                err,
                ConfirmationError::Ledger(_) | ConfirmationError::Repository(_)
            ),
            Self::Transition(err) => matches!(
                err,
                TransitionError::Ledger(_) | TransitionError::Repository(_)
            ),
            Self::Database(_) | Self::Internal(_) => true,
            Self::NotFound(_) | Self::Unauthorized(_) | Self::BadRequest(_) => false,
        }
    }

    fn status_code(&self) -> StatusCode {
        match self {
            Self::Checkout(err) => match err {
                CheckoutError::EmptyCart
                | CheckoutError::InvalidQuantity { .. }
                | CheckoutError::UnknownProduct { .. } => StatusCode::BAD_REQUEST,
                CheckoutError::ProductUnavailable { .. }
                | CheckoutError::InsufficientStock { .. } => StatusCode::CONFLICT,
                CheckoutError::OrderTooSmall { .. } => StatusCode::UNPROCESSABLE_ENTITY,
                CheckoutError::TotalOverflow
                | CheckoutError::Ledger(_)
                | CheckoutError::Repository(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Confirmation(err) => match err {
                ConfirmationError::OrderNotFound => StatusCode::NOT_FOUND,
                ConfirmationError::OwnershipMismatch | ConfirmationError::AmountMismatch => {
                    StatusCode::FORBIDDEN
                }
                ConfirmationError::ReservationExpired => StatusCode::CONFLICT,
                ConfirmationError::Ledger(_) | ConfirmationError::Repository(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            Self::Transition(err) => match err {
                TransitionError::NotFound => StatusCode::NOT_FOUND,
                TransitionError::InvalidTransition { .. } => StatusCode::CONFLICT,
                TransitionError::OwnershipMismatch => StatusCode::FORBIDDEN,
                TransitionError::Ledger(_) | TransitionError::Repository(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            Self::Database(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        let status = self.status_code();

        // Don't expose internal error details to clients
        let message = if self.is_server_error() {
            "Internal server error".to_string()
        } else {
            self.to_string()
        };

        (status, message).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;
