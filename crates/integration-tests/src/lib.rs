//! Integration tests for Heron fulfillment.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p heron-integration-tests
//! ```
//!
//! # Test Categories
//!
//! - `order_lifecycle` - End-to-end state machine walks over the order
//!   status graph and ledger effect planning
//! - `checkout_pricing` - Pricing policy scenarios across the
//!   free-shipping threshold and minimum-order floor
//! - `payment_confirmation` - Webhook verification and idempotency
//!   classification
//!
//! The tests in `tests/` exercise the pure decision layer of each
//! service cross-crate, with no live database: every database mutation
//! in the fulfillment crate is guarded by one of these pure functions,
//! so this is where the business rules are pinned down.

pub mod fixtures;
