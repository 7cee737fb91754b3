//! Core types for Partsmith.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod checkout;
pub mod email;
pub mod id;
pub mod money;
pub mod order;

pub use checkout::{CartOwner, DeliveryMethod};
pub use email::{Email, EmailError};
pub use id::*;
pub use money::{from_minor_units, to_minor_units};
pub use order::{OrderState, PaymentEvent, Stale, Step, stock_after_purchase, transition};
