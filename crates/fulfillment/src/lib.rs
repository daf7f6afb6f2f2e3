//! Heron Fulfillment - inventory reservation and order fulfillment core.
//!
//! The one subsystem of the storefront with real consistency
//! requirements: finite stock must never be oversold under concurrent
//! checkouts, payment confirmation must apply exactly once despite
//! at-least-once webhook delivery, and abandoned checkouts must release
//! their held stock after a bounded time.
//!
//! # Components
//!
//! - [`db::inventory`] - the inventory ledger (`reserve` / `release` /
//!   `commit` / `restock`), every operation under a per-product row lock
//! - [`services::checkout`] - the reservation guard: all-or-nothing stock
//!   holds plus server-priced order creation, in one transaction
//! - [`services::confirmation`] - idempotent payment webhook handling
//! - [`services::orders`] - the administrative order state machine
//! - [`services::sweeper`] - periodic reclamation of expired holds
//!
//! All coordination happens through `PostgreSQL` transactions, never
//! in-process locks; the service can be horizontally replicated.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
