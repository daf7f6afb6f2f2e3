//! Best-effort post-commit notifications.
//!
//! Confirmation messaging is owned by the external messaging stack; the
//! core only emits a structured record of what to send. Nothing here may
//! fail the financial transition that precedes it - a lost notification
//! is retried out-of-band from the log/event stream, a rolled-back
//! payment is not.

use crate::models::{Order, OrderItem};

/// Emit the order-confirmation notification for a just-paid order.
///
/// Infallible by design: any downstream delivery problem belongs to the
/// messaging layer, not to the webhook handler that calls this.
pub async fn send_order_confirmation(order: &Order, items: &[OrderItem]) {
    let item_count: i32 = items.iter().map(|i| i.quantity).sum();
    tracing::info!(
        order_id = %order.id,
        order_number = %order.order_number,
        owner = %order.owner,
        total = %order.total,
        item_count,
        "order confirmation notification queued"
    );
}
