//! Partsmith Core - Shared domain types.
//!
//! This crate provides the types shared by the Partsmith components:
//! - `server` - HTTP API and the background catalog-sync job
//! - `cli` - Command-line tools for migrations and operations
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no database
//! access, no HTTP clients. The order/payment state machine lives here so it
//! can be tested without touching Stripe or Postgres.
//!
//! # Modules
//!
//! - [`types`] - Newtype IDs, validated emails, money conversions, cart
//!   ownership, and the order state machine

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
