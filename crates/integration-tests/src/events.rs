//! Gateway event fixtures shaped like verified webhook payloads.
//!
//! Builders return the inner object as raw JSON so tests can knock fields
//! out (set them to `null`) before wrapping them with [`event`].

use std::sync::atomic::{AtomicU64, Ordering};

use partsmith_core::OrderId;
use partsmith_server::stripe::Event;
use serde_json::{Value, json};

static EVENT_SEQ: AtomicU64 = AtomicU64::new(1);

/// Wrap an object in a webhook envelope with a fresh event id.
#[must_use]
pub fn event(event_type: &str, object: Value) -> Event {
    let seq = EVENT_SEQ.fetch_add(1, Ordering::Relaxed);
    serde_json::from_value(json!({
        "id": format!("evt_{seq}"),
        "type": event_type,
        "data": { "object": object }
    }))
    .unwrap()
}

/// A `checkout.session` carrying totals, a payment intent, and a collected
/// shipping address.
#[must_use]
pub fn completed_session(order_id: OrderId, paid: bool) -> Value {
    json!({
        "id": "cs_test_1",
        "object": "checkout.session",
        "payment_status": if paid { "paid" } else { "unpaid" },
        "payment_intent": "pi_77",
        "metadata": { "orderId": order_id.to_string() },
        "amount_total": 17310,
        "total_details": { "amount_tax": 1312 },
        "shipping_details": {
            "name": "Jordan Wells",
            "address": {
                "line1": "9 Dock Rd",
                "city": "Sparks",
                "state": "NV",
                "postal_code": "89431",
                "country": "US"
            }
        }
    })
}

/// A paid `checkout.session` with nothing but its id and our metadata, the
/// way thin webhook copies arrive.
#[must_use]
pub fn bare_session(order_id: OrderId) -> Value {
    json!({
        "id": "cs_test_1",
        "object": "checkout.session",
        "payment_status": "paid",
        "metadata": { "orderId": order_id.to_string() }
    })
}

/// A `payment_intent` object stamped with our order metadata.
#[must_use]
pub fn payment_intent(order_id: OrderId, intent_id: &str) -> Value {
    json!({
        "id": intent_id,
        "object": "payment_intent",
        "metadata": { "orderId": order_id.to_string() }
    })
}

/// A `charge` object correlated (or not) to a payment intent.
#[must_use]
pub fn charge(intent_id: Option<&str>) -> Value {
    match intent_id {
        Some(id) => json!({ "id": "ch_1", "object": "charge", "payment_intent": id }),
        None => json!({ "id": "ch_1", "object": "charge" }),
    }
}

/// A `dispute` object correlated (or not) to a payment intent.
#[must_use]
pub fn dispute(intent_id: Option<&str>) -> Value {
    match intent_id {
        Some(id) => json!({ "id": "dp_1", "object": "dispute", "payment_intent": id }),
        None => json!({ "id": "dp_1", "object": "dispute" }),
    }
}
