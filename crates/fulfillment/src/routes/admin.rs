//! Operator-only endpoints.

use axum::Json;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;
use secrecy::{ExposeSecret, SecretString};

use crate::error::{AppError, Result};
use crate::services::sweeper::{self, SweepReport};
use crate::state::AppState;

/// `POST /admin/sweep` - run an expiry sweep on demand.
///
/// Guarded by the operator bearer token; the scheduled sweeper does not
/// go through this endpoint.
pub async fn sweep(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<SweepReport>> {
    authorize_operator(state.config().operator_token.as_ref(), &headers)?;

    let report = sweeper::run_sweep(state.pool(), &state.config().sweeper)
        .await
        .map_err(AppError::Database)?;

    Ok(Json(report))
}

fn authorize_operator(expected: Option<&SecretString>, headers: &HeaderMap) -> Result<()> {
    let Some(expected) = expected else {
        return Err(AppError::Unauthorized(
            "no operator token configured".to_owned(),
        ));
    };

    let presented = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "));

    match presented {
        Some(token) if constant_time_compare(token, expected.expose_secret()) => Ok(()),
        _ => Err(AppError::Unauthorized("invalid operator token".to_owned())),
    }
}

/// Compare the presented token against the configured one in constant
/// time, so response timing reveals nothing about matching prefixes.
fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    a.bytes()
        .zip(b.bytes())
        .fold(0u8, |acc, (x, y)| acc | (x ^ y))
        == 0
}
