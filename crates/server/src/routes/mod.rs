//! HTTP route handlers.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health           - Liveness check
//! GET  /health/ready     - Readiness check (verifies database)
//!
//! # Orders
//! POST /order            - Place an order, returns the Stripe payment URL
//! GET  /order/{id}       - Order detail with line items
//! GET  /orders?userId=   - Order history for a user, newest first
//!
//! # Payments
//! POST /stripe-webhook   - Stripe event delivery (signed raw body)
//!
//! # Cart
//! GET  /cart?userId=&session= - Cart contents for an owner
//! POST /cart/plus        - Add one unit, returns the updated cart
//! POST /cart/minus       - Remove one unit, returns the updated cart
//! POST /cart/adopt       - Fold a session cart into a user cart at login
//! ```
//!
//! All responses are JSON; errors come back as `{"error": "..."}`.

pub mod cart;
pub mod health;
pub mod orders;
pub mod webhook;

use axum::{
    Router,
    routing::{get, post},
};

use crate::state::AppState;

/// Create the full application router.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health))
        .route("/health/ready", get(health::readiness))
        .route("/order", post(orders::create))
        .route("/order/{id}", get(orders::show))
        .route("/orders", get(orders::history))
        .route("/stripe-webhook", post(webhook::stripe_webhook))
        .route("/cart", get(cart::show))
        .route("/cart/plus", post(cart::plus))
        .route("/cart/minus", post(cart::minus))
        .route("/cart/adopt", post(cart::adopt))
}
