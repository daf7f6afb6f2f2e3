//! The reservation guard: checkout as one atomic transaction.
//!
//! Given a cart, re-fetch every product fresh under a row lock, reserve
//! all line items or none, compute totals from server-trusted prices, and
//! create the order in `pending`. Between the availability check and the
//! reservation no other checkout can observe a stale figure, because both
//! happen under the same per-product lock.

use chrono::{DateTime, Utc};
use heron_core::{Money, OrderOwner, ProductId};
use rand::Rng;
use serde::Deserialize;
use sqlx::PgPool;

use crate::config::PricingPolicy;
use crate::db::inventory::LedgerError;
use crate::db::orders::{NewOrder, NewOrderItem};
use crate::db::{self, RepositoryError, inventory, orders};
use crate::models::{Address, Order, Product};

/// Bound on transparent retries after a lost transaction race or an
/// order-number collision.
const MAX_ATTEMPTS: u32 = 3;

/// One requested line of a cart.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct CartLine {
    pub product_id: ProductId,
    pub quantity: i32,
}

/// A validated checkout request.
#[derive(Debug)]
pub struct CheckoutRequest {
    pub owner: OrderOwner,
    pub items: Vec<CartLine>,
    pub shipping_address: Address,
}

/// The order created by a successful checkout.
#[derive(Debug)]
pub struct CheckoutOutcome {
    pub order: Order,
}

/// Errors surfaced by checkout, specific enough for a shopper-facing
/// message without leaking internal identifiers.
#[derive(Debug, thiserror::Error)]
pub enum CheckoutError {
    #[error("cart is empty")]
    EmptyCart,

    #[error("invalid quantity for product {product_id}")]
    InvalidQuantity { product_id: ProductId },

    #[error("unknown product {product_id}")]
    UnknownProduct { product_id: ProductId },

    /// The product was removed or deactivated since the cart was built.
    #[error("'{name}' is no longer available")]
    ProductUnavailable { name: String },

    #[error("not enough stock for '{name}': {available} left")]
    InsufficientStock { name: String, available: i32 },

    #[error("order subtotal is below the {minimum} minimum")]
    OrderTooSmall { minimum: Money },

    #[error("order total overflows")]
    TotalOverflow,

    #[error(transparent)]
    Ledger(LedgerError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl From<LedgerError> for CheckoutError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::ProductMissing(product_id) => Self::UnknownProduct { product_id },
            LedgerError::ProductUnavailable { name } => Self::ProductUnavailable { name },
            LedgerError::InsufficientStock { name, available } => {
                Self::InsufficientStock { name, available }
            }
            other => Self::Ledger(other),
        }
    }
}

/// Order totals computed from server-side prices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Totals {
    pub subtotal: Money,
    pub shipping: Money,
    pub tax: Money,
    pub total: Money,
}

/// Compute order totals under the pricing policy.
///
/// Subtotal from unit-price snapshots, flat shipping waived at the
/// threshold, tax on the subtotal in basis points, and the minimum-order
/// floor. Pure so the policy is testable without a database.
///
/// # Errors
///
/// `OrderTooSmall` below the minimum, `TotalOverflow` on pathological
/// amounts.
pub fn compute_totals(
    lines: &[NewOrderItem],
    policy: &PricingPolicy,
) -> Result<Totals, CheckoutError> {
    let mut subtotal = Money::ZERO;
    for line in lines {
        let line_total = line
            .unit_price
            .checked_mul(i64::from(line.quantity))
            .ok_or(CheckoutError::TotalOverflow)?;
        subtotal = subtotal
            .checked_add(line_total)
            .ok_or(CheckoutError::TotalOverflow)?;
    }

    if subtotal < policy.minimum_order {
        return Err(CheckoutError::OrderTooSmall {
            minimum: policy.minimum_order,
        });
    }

    let shipping = if subtotal >= policy.free_shipping_threshold {
        Money::ZERO
    } else {
        policy.shipping_flat_fee
    };
    let tax = subtotal.tax(policy.tax_basis_points);

    let total = subtotal
        .checked_add(shipping)
        .and_then(|t| t.checked_add(tax))
        .ok_or(CheckoutError::TotalOverflow)?;

    Ok(Totals {
        subtotal,
        shipping,
        tax,
        total,
    })
}

/// Generate a human-shareable order number, e.g. `ORD-20260829-7KQ2MX`.
///
/// Distinct from the internal id; uniqueness is enforced by the database
/// and collisions are regenerated.
fn generate_order_number(now: DateTime<Utc>) -> String {
    // Skips 0/O and 1/I so the number survives being read out loud.
    const ALPHABET: &[u8] = b"23456789ABCDEFGHJKLMNPQRSTUVWXYZ";
    let mut rng = rand::rng();
    let suffix: String = (0..6)
        .map(|_| {
            let idx = rng.random_range(0..ALPHABET.len());
            char::from(ALPHABET[idx])
        })
        .collect();
    format!("ORD-{}-{suffix}", now.format("%Y%m%d"))
}

/// Place an order: reserve stock for every line item and create the order
/// in `pending`, all inside one transaction.
///
/// Transient conflicts (serialization failures, deadlocks, order-number
/// collisions) are retried up to [`MAX_ATTEMPTS`] times; exhaustion
/// surfaces as `InsufficientStock` against the scarcest line, since a
/// shopper who keeps losing the race for the same units experiences the
/// same event as the units being gone.
///
/// # Errors
///
/// See [`CheckoutError`]; validation failures reject the whole cart and
/// leave no partial reservations behind.
pub async fn place_order(
    pool: &PgPool,
    policy: &PricingPolicy,
    request: &CheckoutRequest,
) -> Result<CheckoutOutcome, CheckoutError> {
    if request.items.is_empty() {
        return Err(CheckoutError::EmptyCart);
    }
    for line in &request.items {
        if line.quantity < 1 {
            return Err(CheckoutError::InvalidQuantity {
                product_id: line.product_id,
            });
        }
    }

    // Lock products in a stable order so concurrent checkouts with
    // overlapping carts cannot deadlock.
    let mut lines = request.items.clone();
    lines.sort_by_key(|line| line.product_id);

    let mut attempt = 0;
    loop {
        attempt += 1;
        match try_place_order(pool, policy, request, &lines).await {
            Ok(outcome) => return Ok(outcome),
            Err(err) if attempt < MAX_ATTEMPTS && is_retryable(&err) => {
                tracing::debug!(attempt, error = %err, "checkout transaction retry");
            }
            Err(err) if is_retryable(&err) => {
                tracing::warn!(error = %err, "checkout conflict retries exhausted");
                return Err(stock_contention_error(pool, &lines).await);
            }
            Err(err) => return Err(err),
        }
    }
}

/// Build the `InsufficientStock` error reported when conflict retries run
/// out, from a fresh unlocked snapshot of the cart's products.
async fn stock_contention_error(pool: &PgPool, lines: &[CartLine]) -> CheckoutError {
    let ids: Vec<ProductId> = lines.iter().map(|line| line.product_id).collect();
    let products = inventory::get_many(pool, &ids).await.unwrap_or_default();

    scarcest_line(lines, &products).map_or(
        CheckoutError::InsufficientStock {
            name: "the requested items".to_owned(),
            available: 0,
        },
        |(name, available)| CheckoutError::InsufficientStock { name, available },
    )
}

/// The line to blame under contention: least headroom between current
/// availability and the requested quantity.
fn scarcest_line(lines: &[CartLine], products: &[Product]) -> Option<(String, i32)> {
    lines
        .iter()
        .filter_map(|line| {
            products
                .iter()
                .find(|product| product.id == line.product_id)
                .map(|product| {
                    let available = product.available();
                    (product.name.clone(), available, available - line.quantity)
                })
        })
        .min_by_key(|&(_, _, headroom)| headroom)
        .map(|(name, available, _)| (name, available))
}

fn is_retryable(err: &CheckoutError) -> bool {
    match err {
        CheckoutError::Repository(RepositoryError::Conflict(_)) => true,
        CheckoutError::Repository(RepositoryError::Database(db_err))
        | CheckoutError::Ledger(LedgerError::Database(db_err)) => {
            db::is_retryable_conflict(db_err)
        }
        _ => false,
    }
}

async fn try_place_order(
    pool: &PgPool,
    policy: &PricingPolicy,
    request: &CheckoutRequest,
    lines: &[CartLine],
) -> Result<CheckoutOutcome, CheckoutError> {
    let mut tx = pool.begin().await.map_err(RepositoryError::Database)?;

    // Reserve every line under its row lock; the first failure aborts the
    // transaction and rolls back all earlier holds.
    let mut priced = Vec::with_capacity(lines.len());
    for line in lines {
        let product = inventory::reserve(&mut tx, line.product_id, line.quantity).await?;
        priced.push(NewOrderItem {
            product_id: product.id,
            product_name: product.name,
            quantity: line.quantity,
            unit_price: product.price,
        });
    }

    let totals = compute_totals(&priced, policy)?;
    let order_number = generate_order_number(Utc::now());

    let order = orders::insert(
        &mut tx,
        &NewOrder {
            order_number: &order_number,
            owner: &request.owner,
            subtotal: totals.subtotal,
            shipping: totals.shipping,
            tax: totals.tax,
            total: totals.total,
            shipping_address: &request.shipping_address,
            items: &priced,
        },
    )
    .await?;

    tx.commit().await.map_err(RepositoryError::Database)?;

    tracing::info!(
        order_id = %order.id,
        order_number = %order.order_number,
        owner = %order.owner,
        total = %order.total,
        "order placed"
    );

    Ok(CheckoutOutcome { order })
}
