//! Order repository.
//!
//! Reads go through [`OrderRepository`] against the pool; mutations that
//! must share a transaction with ledger operations are free functions
//! taking `&mut PgConnection`. Status updates are conditional on the
//! expected current state and report whether they matched, so a lost race
//! is a visible `false`, never a silent double-apply.

use chrono::{DateTime, Utc};
use sqlx::postgres::PgExecutor;
use sqlx::{PgConnection, PgPool};

use heron_core::{
    Email, Money, OrderId, OrderItemId, OrderOwner, OrderStatus, PaymentStatus, ProductId, UserId,
};

use super::RepositoryError;
use crate::models::{Address, Order, OrderItem};

// =============================================================================
// Internal Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: i64,
    order_number: String,
    user_id: Option<i64>,
    guest_email: Option<String>,
    status: String,
    payment_status: String,
    subtotal: i64,
    shipping: i64,
    tax: i64,
    total: i64,
    ship_name: String,
    ship_line1: String,
    ship_line2: Option<String>,
    ship_city: String,
    ship_region: String,
    ship_postal_code: String,
    ship_country: String,
    tracking_number: Option<String>,
    cancel_reason: Option<String>,
    created_at: DateTime<Utc>,
    shipped_at: Option<DateTime<Utc>>,
    delivered_at: Option<DateTime<Utc>>,
    cancelled_at: Option<DateTime<Utc>>,
    reservation_released_at: Option<DateTime<Utc>>,
}

const ORDER_COLUMNS: &str = r"
    id, order_number, user_id, guest_email, status, payment_status,
    subtotal, shipping, tax, total,
    ship_name, ship_line1, ship_line2, ship_city, ship_region,
    ship_postal_code, ship_country,
    tracking_number, cancel_reason,
    created_at, shipped_at, delivered_at, cancelled_at, reservation_released_at
";

impl TryFrom<OrderRow> for Order {
    type Error = RepositoryError;

    fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
        let owner = match (row.user_id, row.guest_email) {
            (Some(id), None) => OrderOwner::User(UserId::new(id)),
            (None, Some(email)) => OrderOwner::Guest(Email::parse(&email).map_err(|e| {
                RepositoryError::DataCorruption(format!("invalid guest email in database: {e}"))
            })?),
            _ => {
                return Err(RepositoryError::DataCorruption(format!(
                    "order {} violates the exactly-one-owner rule",
                    row.id
                )));
            }
        };

        let status: OrderStatus = row
            .status
            .parse()
            .map_err(RepositoryError::DataCorruption)?;
        let payment_status: PaymentStatus = row
            .payment_status
            .parse()
            .map_err(RepositoryError::DataCorruption)?;

        Ok(Self {
            id: OrderId::new(row.id),
            order_number: row.order_number,
            owner,
            status,
            payment_status,
            subtotal: Money::from_minor(row.subtotal),
            shipping: Money::from_minor(row.shipping),
            tax: Money::from_minor(row.tax),
            total: Money::from_minor(row.total),
            shipping_address: Address {
                name: row.ship_name,
                line1: row.ship_line1,
                line2: row.ship_line2,
                city: row.ship_city,
                region: row.ship_region,
                postal_code: row.ship_postal_code,
                country: row.ship_country,
            },
            tracking_number: row.tracking_number,
            cancel_reason: row.cancel_reason,
            created_at: row.created_at,
            shipped_at: row.shipped_at,
            delivered_at: row.delivered_at,
            cancelled_at: row.cancelled_at,
            reservation_released_at: row.reservation_released_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct OrderItemRow {
    id: i64,
    order_id: i64,
    product_id: i64,
    product_name: String,
    quantity: i32,
    unit_price: i64,
}

impl From<OrderItemRow> for OrderItem {
    fn from(row: OrderItemRow) -> Self {
        Self {
            id: OrderItemId::new(row.id),
            order_id: OrderId::new(row.order_id),
            product_id: ProductId::new(row.product_id),
            product_name: row.product_name,
            quantity: row.quantity,
            unit_price: Money::from_minor(row.unit_price),
        }
    }
}

// =============================================================================
// Creation
// =============================================================================

/// A line item to insert with a new order.
#[derive(Debug, Clone)]
pub struct NewOrderItem {
    pub product_id: ProductId,
    pub product_name: String,
    pub quantity: i32,
    pub unit_price: Money,
}

/// Everything needed to insert an order in `Pending`.
#[derive(Debug)]
pub struct NewOrder<'a> {
    pub order_number: &'a str,
    pub owner: &'a OrderOwner,
    pub subtotal: Money,
    pub shipping: Money,
    pub tax: Money,
    pub total: Money,
    pub shipping_address: &'a Address,
    pub items: &'a [NewOrderItem],
}

/// Insert an order and its line items inside the caller's transaction.
///
/// # Errors
///
/// `RepositoryError::Conflict` on an order-number collision (the caller
/// regenerates and retries), otherwise `Database` / `DataCorruption`.
pub async fn insert(
    conn: &mut PgConnection,
    new_order: &NewOrder<'_>,
) -> Result<Order, RepositoryError> {
    let (user_id, guest_email) = match new_order.owner {
        OrderOwner::User(id) => (Some(id.as_i64()), None),
        OrderOwner::Guest(email) => (None, Some(email.as_str())),
    };
    let address = new_order.shipping_address;

    let row = sqlx::query_as::<_, OrderRow>(&format!(
        r"
        INSERT INTO store.customer_order (
            order_number, user_id, guest_email,
            subtotal, shipping, tax, total,
            ship_name, ship_line1, ship_line2, ship_city, ship_region,
            ship_postal_code, ship_country
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
        RETURNING {ORDER_COLUMNS}
        "
    ))
    .bind(new_order.order_number)
    .bind(user_id)
    .bind(guest_email)
    .bind(new_order.subtotal.as_minor())
    .bind(new_order.shipping.as_minor())
    .bind(new_order.tax.as_minor())
    .bind(new_order.total.as_minor())
    .bind(&address.name)
    .bind(&address.line1)
    .bind(address.line2.as_deref())
    .bind(&address.city)
    .bind(&address.region)
    .bind(&address.postal_code)
    .bind(&address.country)
    .fetch_one(&mut *conn)
    .await
    .map_err(|e| {
        if super::is_unique_violation(&e) {
            RepositoryError::Conflict(format!(
                "order number {} already exists",
                new_order.order_number
            ))
        } else {
            RepositoryError::Database(e)
        }
    })?;

    let order = Order::try_from(row)?;

    for item in new_order.items {
        sqlx::query(
            r"
            INSERT INTO store.order_item (order_id, product_id, product_name, quantity, unit_price)
            VALUES ($1, $2, $3, $4, $5)
            ",
        )
        .bind(order.id.as_i64())
        .bind(item.product_id.as_i64())
        .bind(&item.product_name)
        .bind(item.quantity)
        .bind(item.unit_price.as_minor())
        .execute(&mut *conn)
        .await?;
    }

    Ok(order)
}

// =============================================================================
// Transactional Reads & Status Updates
// =============================================================================

/// Lock an order row for the remainder of the current transaction.
///
/// All status transitions and ledger effects for one order serialize on
/// this lock.
///
/// # Errors
///
/// Returns `RepositoryError::Database` or `DataCorruption`.
pub async fn lock(
    conn: &mut PgConnection,
    order_id: OrderId,
) -> Result<Option<Order>, RepositoryError> {
    let row = sqlx::query_as::<_, OrderRow>(&format!(
        "SELECT {ORDER_COLUMNS} FROM store.customer_order WHERE id = $1 FOR UPDATE"
    ))
    .bind(order_id.as_i64())
    .fetch_optional(&mut *conn)
    .await?;

    row.map(TryInto::try_into).transpose()
}

/// Fetch the line items of an order.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn items<'e, E: PgExecutor<'e>>(
    executor: E,
    order_id: OrderId,
) -> Result<Vec<OrderItem>, RepositoryError> {
    let rows = sqlx::query_as::<_, OrderItemRow>(
        r"
        SELECT id, order_id, product_id, product_name, quantity, unit_price
        FROM store.order_item
        WHERE order_id = $1
        ORDER BY product_id
        ",
    )
    .bind(order_id.as_i64())
    .fetch_all(executor)
    .await?;

    Ok(rows.into_iter().map(Into::into).collect())
}

/// Transition `pending`/`pending` to `confirmed`/`paid`.
///
/// Conditional on the order still being pending with its reservation
/// held; returns whether the transition applied.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn confirm_payment(
    conn: &mut PgConnection,
    order_id: OrderId,
) -> Result<bool, RepositoryError> {
    let result = sqlx::query(
        r"
        UPDATE store.customer_order
        SET status = 'confirmed', payment_status = 'paid', updated_at = now()
        WHERE id = $1
          AND status = 'pending'
          AND payment_status = 'pending'
          AND reservation_released_at IS NULL
        ",
    )
    .bind(order_id.as_i64())
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Set an order's status within the forward fulfillment path
/// (`confirmed -> processing`).
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn record_processing(
    conn: &mut PgConnection,
    order_id: OrderId,
) -> Result<bool, RepositoryError> {
    let result = sqlx::query(
        r"
        UPDATE store.customer_order
        SET status = 'processing', updated_at = now()
        WHERE id = $1 AND status = 'confirmed'
        ",
    )
    .bind(order_id.as_i64())
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Mark an order shipped, stamping `shipped_at` exactly once.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn record_shipment(
    conn: &mut PgConnection,
    order_id: OrderId,
    tracking_number: &str,
) -> Result<bool, RepositoryError> {
    let result = sqlx::query(
        r"
        UPDATE store.customer_order
        SET status = 'shipped',
            tracking_number = $2,
            shipped_at = COALESCE(shipped_at, now()),
            updated_at = now()
        WHERE id = $1 AND status = 'processing'
        ",
    )
    .bind(order_id.as_i64())
    .bind(tracking_number)
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Mark an order delivered, stamping `delivered_at` exactly once.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn record_delivery(
    conn: &mut PgConnection,
    order_id: OrderId,
) -> Result<bool, RepositoryError> {
    let result = sqlx::query(
        r"
        UPDATE store.customer_order
        SET status = 'delivered',
            delivered_at = COALESCE(delivered_at, now()),
            updated_at = now()
        WHERE id = $1 AND status = 'shipped'
        ",
    )
    .bind(order_id.as_i64())
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Cancel an order with a reason, stamping `cancelled_at` exactly once.
///
/// When `reservation_released` is set the release stamp is recorded too,
/// keeping the order out of future expiry sweeps.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn record_cancellation(
    conn: &mut PgConnection,
    order_id: OrderId,
    reason: &str,
    reservation_released: bool,
) -> Result<bool, RepositoryError> {
    let result = sqlx::query(
        r"
        UPDATE store.customer_order
        SET status = 'cancelled',
            cancel_reason = $2,
            cancelled_at = COALESCE(cancelled_at, now()),
            reservation_released_at = CASE
                WHEN $3 THEN COALESCE(reservation_released_at, now())
                ELSE reservation_released_at
            END,
            updated_at = now()
        WHERE id = $1 AND status IN ('pending', 'confirmed', 'processing')
        ",
    )
    .bind(order_id.as_i64())
    .bind(reason)
    .bind(reservation_released)
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Mark an order refunded.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn record_refund(
    conn: &mut PgConnection,
    order_id: OrderId,
) -> Result<bool, RepositoryError> {
    let result = sqlx::query(
        r"
        UPDATE store.customer_order
        SET status = 'refunded', payment_status = 'refunded', updated_at = now()
        WHERE id = $1 AND status IN ('confirmed', 'processing', 'shipped', 'delivered')
        ",
    )
    .bind(order_id.as_i64())
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Stamp `reservation_released_at` after the sweeper reclaims a hold.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn mark_reservation_released(
    conn: &mut PgConnection,
    order_id: OrderId,
) -> Result<(), RepositoryError> {
    sqlx::query(
        r"
        UPDATE store.customer_order
        SET reservation_released_at = COALESCE(reservation_released_at, now()),
            updated_at = now()
        WHERE id = $1
        ",
    )
    .bind(order_id.as_i64())
    .execute(&mut *conn)
    .await?;

    Ok(())
}

// =============================================================================
// Repository (pool-scoped reads)
// =============================================================================

/// Repository for order reads outside a transaction.
pub struct OrderRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> OrderRepository<'a> {
    /// Create a new order repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get an order with its line items.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if the data is invalid.
    pub async fn get_with_items(
        &self,
        order_id: OrderId,
    ) -> Result<Option<(Order, Vec<OrderItem>)>, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM store.customer_order WHERE id = $1"
        ))
        .bind(order_id.as_i64())
        .fetch_optional(self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let order = Order::try_from(row)?;
        let order_items = items(self.pool, order_id).await?;
        Ok(Some((order, order_items)))
    }

    /// Find pending orders whose reservation has outlived the timeout.
    ///
    /// Only orders that are still awaiting payment and whose hold has not
    /// already been released are candidates, so overlapping sweeps are
    /// harmless.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn find_expired_pending(
        &self,
        cutoff: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<OrderId>, RepositoryError> {
        let ids: Vec<i64> = sqlx::query_scalar(
            r"
            SELECT id FROM store.customer_order
            WHERE status = 'pending'
              AND payment_status = 'pending'
              AND reservation_released_at IS NULL
              AND created_at < $1
            ORDER BY created_at
            LIMIT $2
            ",
        )
        .bind(cutoff)
        .bind(limit)
        .fetch_all(self.pool)
        .await?;

        Ok(ids.into_iter().map(OrderId::new).collect())
    }
}
