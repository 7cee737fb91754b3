//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures errors to Sentry before
//! responding to the client. All route handlers return `Result<T, AppError>`.
//! Responses are JSON (`{"error": "..."}`): the storefront talks to this API
//! from the browser.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::db::RepositoryError;
use crate::ebay::EbayError;
use crate::services::checkout::CheckoutError;
use crate::stripe::{SignatureError, StripeError};

/// Application-level error type for the API.
#[derive(Debug, Error)]
pub enum AppError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Stripe API operation failed.
    #[error("Stripe error: {0}")]
    Stripe(#[from] StripeError),

    /// eBay API operation failed.
    #[error("eBay error: {0}")]
    Ebay(#[from] EbayError),

    /// Webhook signature rejected.
    #[error("Webhook Error: {0}")]
    WebhookSignature(#[from] SignatureError),

    /// Webhook processing failed after signature verification; the gateway
    /// retries on 500.
    #[error("Webhook processing failed")]
    WebhookProcessing,

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Bad request from client.
    #[error("{0}")]
    BadRequest(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<CheckoutError> for AppError {
    fn from(err: CheckoutError) -> Self {
        match err {
            CheckoutError::Validation(_) | CheckoutError::UnknownUser | CheckoutError::UnknownProduct(_) => {
                Self::BadRequest(err.to_string())
            }
            CheckoutError::Repository(e) => Self::Database(e),
            CheckoutError::Gateway(e) => Self::Stripe(e),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Capture server errors to Sentry
        if matches!(
            self,
            Self::Database(_)
                | Self::Internal(_)
                | Self::Stripe(_)
                | Self::Ebay(_)
                | Self::WebhookProcessing
        ) {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        let status = match &self {
            Self::Database(_) | Self::Internal(_) | Self::WebhookProcessing => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Self::Stripe(_) | Self::Ebay(_) => StatusCode::BAD_GATEWAY,
            Self::WebhookSignature(_) | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
        };

        // Don't expose internal error details to clients. Signature failures
        // keep the legacy "Webhook Error: <reason>" body that Stripe's
        // endpoint log shows verbatim.
        let message = match &self {
            Self::Database(_) | Self::Internal(_) => "Internal server error".to_string(),
            Self::Stripe(_) | Self::Ebay(_) => "External service error".to_string(),
            _ => self.to_string(),
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;
