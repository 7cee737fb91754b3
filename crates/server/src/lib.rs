//! Partsmith server library.
//!
//! Backend for a headless auto-parts storefront: order placement against
//! Stripe Checkout, webhook-driven payment state, carts, and a background
//! job that mirrors the shop's eBay listings into the local catalog.
//!
//! # Modules
//!
//! - [`config`] - Environment-driven configuration
//! - [`db`] - `PostgreSQL` repositories and migrations
//! - [`ebay`] - eBay Browse/Shopping API client and listing-description parsing
//! - [`error`] - Unified HTTP error type with Sentry capture
//! - [`models`] - Domain rows (products, orders, carts, users)
//! - [`routes`] - Axum handlers
//! - [`services`] - Checkout, cart rules, webhook pipeline, email
//! - [`state`] - Shared application state
//! - [`stripe`] - Stripe Checkout client and webhook signature verification
//! - [`sync`] - The catalog reconciliation sweep and its background job

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod ebay;
pub mod error;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
pub mod stripe;
pub mod sync;
