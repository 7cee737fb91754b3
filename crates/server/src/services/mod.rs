//! Business logic over the repositories and gateways.
//!
//! # Services
//!
//! - `cart` - Cart quantity rules and session adoption
//! - `checkout` - Order form validation and Stripe session creation
//! - `email` - Order email delivery via SMTP
//! - `webhooks` - The payment event pipeline driving order state

pub mod cart;
pub mod checkout;
pub mod email;
pub mod webhooks;

pub use cart::{CartService, CartStore};
pub use checkout::{CheckoutError, CreateOrderRequest, PlacedOrder, place_order};
pub use email::{EmailError, EmailService};
pub use webhooks::{OrderNotifier, OrderStateStore, SessionSource, WebhookProcessor};
