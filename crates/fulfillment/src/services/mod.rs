//! Business logic services.
//!
//! - [`checkout`] - the reservation guard: all-or-nothing stock holds
//! - [`confirmation`] - exactly-once payment webhook processing
//! - [`orders`] - administrative order transitions
//! - [`payments`] - outbound payment-provider client
//! - [`notifications`] - best-effort post-commit messaging
//! - [`sweeper`] - periodic reclamation of abandoned reservations

pub mod checkout;
pub mod confirmation;
pub mod notifications;
pub mod orders;
pub mod payments;
pub mod sweeper;
