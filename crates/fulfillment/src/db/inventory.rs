//! Inventory ledger: atomic reserve / release / commit / restock.
//!
//! Every operation locks the product row (`SELECT ... FOR UPDATE`) before
//! reading the counters, so two concurrent reservations can never both
//! pass the availability check against stale data. Operations take
//! `&mut PgConnection` rather than a pool: the caller owns the
//! transaction, and the ledger mutation shares its atomic boundary with
//! whatever order mutation accompanies it.

use heron_core::ProductId;
use sqlx::{PgConnection, PgPool};

use chrono::{DateTime, Utc};

use crate::models::Product;

/// Errors from ledger operations.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    /// The product row does not exist.
    #[error("product {0} does not exist")]
    ProductMissing(ProductId),

    /// The product exists but is not currently sellable.
    #[error("product '{name}' is unavailable")]
    ProductUnavailable {
        /// Product name, safe to show to shoppers.
        name: String,
    },

    /// Not enough unreserved stock to satisfy the request.
    #[error("insufficient stock for '{name}': {available} available")]
    InsufficientStock {
        name: String,
        /// `stock - reserved` at the time of the check.
        available: i32,
    },

    /// A commit was attempted for more units than are reserved. This is a
    /// logic bug upstream, never a normal runtime condition.
    #[error(
        "reservation underflow for product {product_id}: reserved {reserved}, commit of {requested}"
    )]
    ReservationUnderflow {
        product_id: ProductId,
        reserved: i32,
        requested: i32,
    },

    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[derive(Debug, sqlx::FromRow)]
struct ProductRow {
    id: i64,
    name: String,
    price: i64,
    stock: i32,
    reserved: i32,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Self {
            id: ProductId::new(row.id),
            name: row.name,
            price: heron_core::Money::from_minor(row.price),
            stock: row.stock,
            reserved: row.reserved,
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Lock a product row for the remainder of the current transaction and
/// return its current counters.
async fn lock_product(
    conn: &mut PgConnection,
    product_id: ProductId,
) -> Result<Product, LedgerError> {
    let row = sqlx::query_as::<_, ProductRow>(
        r"
        SELECT id, name, price, stock, reserved, is_active, created_at, updated_at
        FROM store.product
        WHERE id = $1
        FOR UPDATE
        ",
    )
    .bind(product_id.as_i64())
    .fetch_optional(&mut *conn)
    .await?;

    row.map(Product::from)
        .ok_or(LedgerError::ProductMissing(product_id))
}

/// Unlocked snapshot of several products, for reporting outside a
/// transaction. Missing ids are silently absent from the result.
///
/// # Errors
///
/// Returns `LedgerError::Database` if the query fails.
pub async fn get_many(pool: &PgPool, ids: &[ProductId]) -> Result<Vec<Product>, LedgerError> {
    let raw: Vec<i64> = ids.iter().map(|id| id.as_i64()).collect();
    let rows = sqlx::query_as::<_, ProductRow>(
        r"
        SELECT id, name, price, stock, reserved, is_active, created_at, updated_at
        FROM store.product
        WHERE id = ANY($1)
        ",
    )
    .bind(&raw)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(Product::from).collect())
}

/// Reserve `quantity` units of a product.
///
/// Fails if the product is inactive or `stock - reserved < quantity`.
/// On success increments `reserved` and returns the product as it was at
/// the moment of the check (price and name snapshots for the caller).
/// `stock` is untouched; reservation never removes units from the pool.
///
/// # Errors
///
/// `ProductMissing`, `ProductUnavailable`, `InsufficientStock`, or a
/// database error.
pub async fn reserve(
    conn: &mut PgConnection,
    product_id: ProductId,
    quantity: i32,
) -> Result<Product, LedgerError> {
    let product = lock_product(conn, product_id).await?;

    if !product.is_active {
        return Err(LedgerError::ProductUnavailable {
            name: product.name,
        });
    }
    let available = product.available();
    if available < quantity {
        return Err(LedgerError::InsufficientStock {
            name: product.name,
            available,
        });
    }

    sqlx::query("UPDATE store.product SET reserved = reserved + $2, updated_at = now() WHERE id = $1")
        .bind(product_id.as_i64())
        .bind(quantity)
        .execute(&mut *conn)
        .await?;

    Ok(product)
}

/// Release `quantity` reserved units back to the available pool.
///
/// Clamps at zero rather than letting `reserved` go negative: an
/// inconsistent caller gets a warning in the logs, not a broken invariant.
///
/// # Errors
///
/// `ProductMissing` or a database error.
pub async fn release(
    conn: &mut PgConnection,
    product_id: ProductId,
    quantity: i32,
) -> Result<(), LedgerError> {
    let product = lock_product(conn, product_id).await?;

    let actual = quantity.min(product.reserved);
    if actual < quantity {
        tracing::warn!(
            product_id = %product_id,
            reserved = product.reserved,
            requested = quantity,
            "over-release clamped to current reservation"
        );
    }
    if actual == 0 {
        return Ok(());
    }

    sqlx::query("UPDATE store.product SET reserved = reserved - $2, updated_at = now() WHERE id = $1")
        .bind(product_id.as_i64())
        .bind(actual)
        .execute(&mut *conn)
        .await?;

    Ok(())
}

/// Release `quantity` units only if the product currently holds at least
/// that many in reserve; returns whether anything was released.
///
/// Used by the expiry sweeper, where a lower `reserved` count means
/// another process already reclaimed the hold and releasing again would
/// eat someone else's reservation.
///
/// # Errors
///
/// `ProductMissing` or a database error.
pub async fn release_if_held(
    conn: &mut PgConnection,
    product_id: ProductId,
    quantity: i32,
) -> Result<bool, LedgerError> {
    let product = lock_product(conn, product_id).await?;

    if product.reserved < quantity {
        tracing::warn!(
            product_id = %product_id,
            reserved = product.reserved,
            requested = quantity,
            "skipping release: reservation no longer held"
        );
        return Ok(false);
    }

    sqlx::query("UPDATE store.product SET reserved = reserved - $2, updated_at = now() WHERE id = $1")
        .bind(product_id.as_i64())
        .bind(quantity)
        .execute(&mut *conn)
        .await?;

    Ok(true)
}

/// Convert a reservation into a permanent sale: decrement both `stock`
/// and `reserved`. The only operation that removes units from the
/// sellable pool.
///
/// # Errors
///
/// `ReservationUnderflow` if fewer than `quantity` units are reserved -
/// that indicates a bug upstream and fails loudly instead of letting the
/// counters underflow. Also `ProductMissing` or a database error.
pub async fn commit(
    conn: &mut PgConnection,
    product_id: ProductId,
    quantity: i32,
) -> Result<(), LedgerError> {
    let product = lock_product(conn, product_id).await?;

    if product.reserved < quantity {
        return Err(LedgerError::ReservationUnderflow {
            product_id,
            reserved: product.reserved,
            requested: quantity,
        });
    }

    sqlx::query(
        r"
        UPDATE store.product
        SET stock = stock - $2, reserved = reserved - $2, updated_at = now()
        WHERE id = $1
        ",
    )
    .bind(product_id.as_i64())
    .bind(quantity)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Return `quantity` units to the sellable pool after a post-payment
/// cancellation or return.
///
/// Distinct from [`release`]: the units were already committed out of
/// `stock`, so this increments `stock` and leaves `reserved` alone.
///
/// # Errors
///
/// `ProductMissing` or a database error.
pub async fn restock(
    conn: &mut PgConnection,
    product_id: ProductId,
    quantity: i32,
) -> Result<(), LedgerError> {
    // Lock first so the row is known to exist and the update serializes
    // with concurrent ledger operations.
    lock_product(conn, product_id).await?;

    sqlx::query("UPDATE store.product SET stock = stock + $2, updated_at = now() WHERE id = $1")
        .bind(product_id.as_i64())
        .bind(quantity)
        .execute(&mut *conn)
        .await?;

    Ok(())
}
