//! Cart cleanup.
//!
//! Cart contents are written by the storefront; the fulfillment core only
//! clears a shopper's active cart once their payment is confirmed.

use sqlx::PgConnection;

use heron_core::OrderOwner;

use super::RepositoryError;

/// Delete the items of the owner's active cart, if any.
///
/// Runs inside the payment-confirmation transaction so a rolled-back
/// confirmation leaves the cart intact.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn clear_for_owner(
    conn: &mut PgConnection,
    owner: &OrderOwner,
) -> Result<(), RepositoryError> {
    let query = match owner {
        OrderOwner::User(user_id) => sqlx::query(
            r"
            DELETE FROM store.cart_item
            WHERE cart_id IN (SELECT id FROM store.cart WHERE user_id = $1)
            ",
        )
        .bind(user_id.as_i64()),
        OrderOwner::Guest(email) => sqlx::query(
            r"
            DELETE FROM store.cart_item
            WHERE cart_id IN (SELECT id FROM store.cart WHERE guest_email = $1)
            ",
        )
        .bind(email.as_str()),
    };

    query.execute(&mut *conn).await?;
    Ok(())
}
