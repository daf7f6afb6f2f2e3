//! Heron Core - Shared types library.
//!
//! This crate provides common types used across all Heron components:
//! - `fulfillment` - The inventory reservation and order fulfillment service
//! - `cli` - Command-line tools for migrations and management
//!
//! # Architecture
//!
//! The core crate contains only types and pure logic - no I/O, no database
//! access, no HTTP clients. This keeps it lightweight and allows it to be
//! used anywhere, including tests that never touch a live service.
//!
//! # Modules
//!
//! - [`types`] - Newtype IDs, money in minor currency units, email addresses,
//!   order ownership, and the order/payment status state machines

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
