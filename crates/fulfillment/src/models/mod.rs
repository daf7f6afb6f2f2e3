//! Domain models for the fulfillment core.

pub mod order;
pub mod product;

pub use order::{Address, Order, OrderItem};
pub use product::Product;
