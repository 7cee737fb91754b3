//! Stripe integration.
//!
//! Talks plain REST against `https://api.stripe.com/v1` with the secret key
//! as bearer auth; the two calls this service makes do not justify an SDK.
//! Checkout Sessions carry the order id in their own metadata and in the
//! payment intent's metadata, so every later webhook delivery can be
//! correlated back to an order no matter which object it rides on.

pub mod client;
pub mod types;
pub mod webhook;

pub use client::{CheckoutSessionParams, CreatedSession, LineItem, StripeClient};
pub use types::{
    ChargeObject, CheckoutSessionObject, DisputeObject, Event, PaymentIntentObject,
    ShippingDetails,
};
pub use webhook::verify_signature;

use thiserror::Error;

/// Errors from Stripe API calls.
#[derive(Debug, Error)]
pub enum StripeError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Stripe returned a non-2xx response.
    #[error("Stripe API error (HTTP {status}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Message from Stripe's error envelope.
        message: String,
    },

    /// The response parsed but lacked a field we cannot proceed without.
    #[error("Stripe response missing {0}")]
    MissingField(&'static str),
}

/// Webhook signature rejection.
///
/// Kept apart from [`StripeError`]: a bad signature is a request-fatal 400
/// on our side, not a gateway fault.
#[derive(Debug, Error)]
pub enum SignatureError {
    /// The header's timestamp was not an integer.
    #[error("Unable to parse Stripe-Signature header")]
    Malformed,

    /// The header lacked the timestamp or any `v1` signature.
    #[error("Missing timestamp or v1 signature in Stripe-Signature header")]
    MissingParts,

    /// The timestamp is outside the replay tolerance.
    #[error("Timestamp outside the tolerance zone")]
    Timestamp,

    /// No `v1` signature matched the expected digest.
    #[error("No signatures found matching the expected signature for payload")]
    NoMatch,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = StripeError::Api {
            status: 402,
            message: "Your card was declined.".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Stripe API error (HTTP 402): Your card was declined."
        );

        assert_eq!(
            StripeError::MissingField("url").to_string(),
            "Stripe response missing url"
        );
        assert_eq!(
            SignatureError::Timestamp.to_string(),
            "Timestamp outside the tolerance zone"
        );
    }
}
