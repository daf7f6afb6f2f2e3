//! Shared domain types.

pub mod email;
pub mod id;
pub mod money;
pub mod owner;
pub mod status;

pub use email::{Email, EmailError};
pub use id::{CartId, OrderId, OrderItemId, ProductId, UserId};
pub use money::Money;
pub use owner::OrderOwner;
pub use status::{OrderStatus, PaymentStatus};
