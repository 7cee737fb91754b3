//! Stripe webhook endpoint.
//!
//! The raw body is what the signature covers, so this handler takes `Bytes`
//! rather than a typed JSON extractor and parses only after verification.

use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use chrono::Utc;
use serde_json::json;
use tracing::{instrument, warn};

use crate::error::{AppError, Result};
use crate::services::webhooks::PgWebhookProcessor;
use crate::state::AppState;
use crate::stripe::{Event, SignatureError, verify_signature};

/// Handle a Stripe event delivery.
///
/// Bad signatures are answered with the legacy `Webhook Error: <reason>`
/// body Stripe's endpoint log shows; verified events always acknowledge
/// with `{"received": true}` unless processing itself fails, in which case
/// a 500 asks Stripe to redeliver.
#[instrument(skip(state, headers, body))]
pub async fn stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<serde_json::Value>> {
    let signature = headers
        .get("Stripe-Signature")
        .and_then(|value| value.to_str().ok())
        .ok_or(AppError::WebhookSignature(SignatureError::Malformed))?;

    verify_signature(
        &body,
        signature,
        &state.config().stripe.webhook_secret,
        Utc::now(),
    )?;

    let event: Event = serde_json::from_slice(&body).map_err(|error| {
        warn!(%error, "Webhook body failed to parse");
        AppError::BadRequest("Invalid payload".to_owned())
    })?;

    let processor = PgWebhookProcessor::new(
        state.pool().clone(),
        state.stripe().clone(),
        state.mailer().cloned(),
    );
    processor.process(&event).await.map_err(|error| {
        tracing::error!(%error, event_id = %event.id, "Webhook processing failed");
        AppError::WebhookProcessing
    })?;

    Ok(Json(json!({ "received": true })))
}
