//! End-to-end ledger tests against a live PostgreSQL database.
//!
//! Ignored by default because they need a real database: point
//! `FULFILLMENT_TEST_DATABASE_URL` (or `DATABASE_URL`) at a scratch
//! database and run with `cargo test -p heron-integration-tests --
//! --ignored`. Each test creates its own products, so the suite is safe
//! to run in parallel and repeatedly against the same database.

#![allow(clippy::unwrap_used)]

use std::time::Duration;

use chrono::{DateTime, Utc};
use heron_core::{OrderId, OrderOwner, ProductId, UserId};
use heron_fulfillment::config::SweeperConfig;
use heron_fulfillment::db::create_pool;
use heron_fulfillment::models::Order;
use heron_fulfillment::services::checkout::{
    CartLine, CheckoutError, CheckoutRequest, place_order,
};
use heron_fulfillment::services::confirmation::{
    self, ConfirmationError, ConfirmationOutcome, PAYMENT_CONFIRMED, PaymentNotification,
};
use heron_fulfillment::services::orders::{self, TransitionRequest};
use heron_fulfillment::services::sweeper;
use heron_integration_tests::fixtures::{default_policy, test_address};
use secrecy::SecretString;
use sqlx::PgPool;

async fn test_pool() -> PgPool {
    let url = std::env::var("FULFILLMENT_TEST_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .expect("set FULFILLMENT_TEST_DATABASE_URL to a scratch database");
    let pool = create_pool(&SecretString::from(url)).await.unwrap();
    sqlx::migrate!("../fulfillment/migrations")
        .run(&pool)
        .await
        .unwrap();
    pool
}

async fn create_product(pool: &PgPool, name: &str, stock: i32) -> ProductId {
    let (id,): (i64,) = sqlx::query_as(
        "INSERT INTO store.product (name, price, stock) VALUES ($1, $2, $3) RETURNING id",
    )
    .bind(name)
    .bind(2400_i64)
    .bind(stock)
    .fetch_one(pool)
    .await
    .unwrap();
    ProductId::new(id)
}

/// Current `(stock, reserved)` counters for a product.
async fn counters(pool: &PgPool, product_id: ProductId) -> (i32, i32) {
    sqlx::query_as("SELECT stock, reserved FROM store.product WHERE id = $1")
        .bind(product_id.as_i64())
        .fetch_one(pool)
        .await
        .unwrap()
}

async fn order_state(
    pool: &PgPool,
    order_id: OrderId,
) -> (String, String, Option<DateTime<Utc>>) {
    sqlx::query_as(
        "SELECT status, payment_status, reservation_released_at
         FROM store.customer_order WHERE id = $1",
    )
    .bind(order_id.as_i64())
    .fetch_one(pool)
    .await
    .unwrap()
}

fn cart(user: i64, product_id: ProductId, quantity: i32) -> CheckoutRequest {
    CheckoutRequest {
        owner: OrderOwner::User(UserId::new(user)),
        items: vec![CartLine {
            product_id,
            quantity,
        }],
        shipping_address: test_address(),
    }
}

fn paid_notification(order: &Order, user: i64) -> PaymentNotification {
    PaymentNotification {
        event_id: format!("evt_live_{}", order.id),
        event_type: PAYMENT_CONFIRMED.to_owned(),
        order_id: order.id,
        amount: order.total,
        user_id: Some(user),
        guest_email: None,
    }
}

fn sweeper_config() -> SweeperConfig {
    SweeperConfig {
        reservation_timeout: Duration::from_secs(30 * 60),
        interval: Duration::from_secs(60),
        expire_to_cancelled: false,
    }
}

/// Backdate an order past the reservation timeout.
async fn age_order(pool: &PgPool, order_id: OrderId) {
    sqlx::query(
        "UPDATE store.customer_order SET created_at = now() - interval '2 hours' WHERE id = $1",
    )
    .bind(order_id.as_i64())
    .execute(pool)
    .await
    .unwrap();
}

#[tokio::test]
#[ignore = "needs a live PostgreSQL database"]
async fn concurrent_checkouts_never_oversell() {
    let pool = test_pool().await;
    let policy = default_policy();
    let product_id = create_product(&pool, "Limited Print", 5).await;

    // Four shoppers race for five units, two each; only two can win.
    let carts = [
        cart(101, product_id, 2),
        cart(102, product_id, 2),
        cart(103, product_id, 2),
        cart(104, product_id, 2),
    ];
    let (a, b, c, d) = tokio::join!(
        place_order(&pool, &policy, &carts[0]),
        place_order(&pool, &policy, &carts[1]),
        place_order(&pool, &policy, &carts[2]),
        place_order(&pool, &policy, &carts[3]),
    );

    let outcomes = [a, b, c, d];
    let placed = outcomes.iter().filter(|r| r.is_ok()).count();
    assert_eq!(placed, 2, "exactly two of four shoppers should win");
    for result in &outcomes {
        if let Err(err) = result {
            assert!(matches!(err, CheckoutError::InsufficientStock { .. }));
        }
    }

    // Reservation holds units without removing them from stock.
    assert_eq!(counters(&pool, product_id).await, (5, 4));
}

#[tokio::test]
#[ignore = "needs a live PostgreSQL database"]
async fn duplicate_webhook_decrements_stock_once() {
    let pool = test_pool().await;
    let user = 111;
    let product_id = create_product(&pool, "Walnut Tray", 5).await;

    let outcome = place_order(&pool, &default_policy(), &cart(user, product_id, 2))
        .await
        .unwrap();
    let notification = paid_notification(&outcome.order, user);

    let first = confirmation::handle(&pool, &notification).await.unwrap();
    assert_eq!(first, ConfirmationOutcome::Confirmed);

    // The provider redelivers the same event; the gate absorbs it.
    let second = confirmation::handle(&pool, &notification).await.unwrap();
    assert_eq!(second, ConfirmationOutcome::AlreadyProcessed);

    assert_eq!(counters(&pool, product_id).await, (3, 0));
    let (status, payment_status, _) = order_state(&pool, outcome.order.id).await;
    assert_eq!(status, "confirmed");
    assert_eq!(payment_status, "paid");
}

#[tokio::test]
#[ignore = "needs a live PostgreSQL database"]
async fn expired_reservation_returns_to_the_pool() {
    let pool = test_pool().await;
    let user = 121;
    let product_id = create_product(&pool, "Linen Apron", 5).await;

    let outcome = place_order(&pool, &default_policy(), &cart(user, product_id, 3))
        .await
        .unwrap();
    assert_eq!(counters(&pool, product_id).await, (5, 3));

    age_order(&pool, outcome.order.id).await;
    sweeper::run_sweep(&pool, &sweeper_config()).await.unwrap();

    // The hold went back to the pool; the order stays pending but its
    // release is stamped so it cannot be released twice.
    assert_eq!(counters(&pool, product_id).await, (5, 0));
    let (status, _, released_at) = order_state(&pool, outcome.order.id).await;
    assert_eq!(status, "pending");
    assert!(released_at.is_some());

    // A sweep finding nothing new for this order leaves it alone.
    sweeper::run_sweep(&pool, &sweeper_config()).await.unwrap();
    assert_eq!(counters(&pool, product_id).await, (5, 0));

    // A payment arriving after the sweep must not confirm stock the
    // order no longer holds.
    let late = confirmation::handle(&pool, &paid_notification(&outcome.order, user)).await;
    assert!(matches!(late, Err(ConfirmationError::ReservationExpired)));
    assert_eq!(counters(&pool, product_id).await, (5, 0));
}

#[tokio::test]
#[ignore = "needs a live PostgreSQL database"]
async fn delivering_one_order_leaves_other_holds_intact() {
    let pool = test_pool().await;
    let policy = default_policy();
    let product_id = create_product(&pool, "Stoneware Bowl", 6).await;

    // Shopper A pays for three units; shopper B holds three more.
    let first = place_order(&pool, &policy, &cart(131, product_id, 3))
        .await
        .unwrap();
    confirmation::handle(&pool, &paid_notification(&first.order, 131))
        .await
        .unwrap();
    let second = place_order(&pool, &policy, &cart(132, product_id, 3))
        .await
        .unwrap();
    assert_eq!(counters(&pool, product_id).await, (3, 3));

    // Walk A's order through to delivery.
    for request in [
        TransitionRequest {
            target: heron_core::OrderStatus::Processing,
            ..TransitionRequest::default()
        },
        TransitionRequest {
            target: heron_core::OrderStatus::Shipped,
            tracking_number: Some("1Z999AA10123456784".to_owned()),
            ..TransitionRequest::default()
        },
        TransitionRequest {
            target: heron_core::OrderStatus::Delivered,
            ..TransitionRequest::default()
        },
    ] {
        orders::update_status(&pool, first.order.id, &request)
            .await
            .unwrap();
    }

    // A's hold was spent at confirmation; delivery must not touch the
    // `reserved` counter that now belongs to B.
    assert_eq!(counters(&pool, product_id).await, (3, 3));

    // B's payment still lands on an intact reservation.
    let confirmed = confirmation::handle(&pool, &paid_notification(&second.order, 132))
        .await
        .unwrap();
    assert_eq!(confirmed, ConfirmationOutcome::Confirmed);
    assert_eq!(counters(&pool, product_id).await, (0, 0));
}

#[tokio::test]
#[ignore = "needs a live PostgreSQL database"]
async fn oversized_order_reports_availability() {
    let pool = test_pool().await;
    let product_id = create_product(&pool, "Cedar Hanger", 5).await;

    let err = place_order(&pool, &default_policy(), &cart(141, product_id, 6))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        CheckoutError::InsufficientStock { available: 5, .. }
    ));

    // A rejected cart holds nothing.
    assert_eq!(counters(&pool, product_id).await, (5, 0));
}
