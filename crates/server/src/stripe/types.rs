//! Webhook event envelope and the per-type objects we decode from it.

use serde::{Deserialize, Serialize};

/// A webhook event. The payload object stays raw JSON until the handler
/// knows which shape to decode it as.
#[derive(Debug, Clone, Deserialize)]
pub struct Event {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: EventData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventData {
    pub object: serde_json::Value,
}

/// Our metadata on Stripe objects; `orderId` is the correlation key.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Metadata {
    #[serde(default, rename = "orderId")]
    pub order_id: Option<String>,
}

/// `checkout.session.*` object, pared down to what the handlers read.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutSessionObject {
    pub id: String,
    #[serde(default)]
    pub payment_status: Option<String>,
    #[serde(default)]
    pub payment_intent: Option<String>,
    #[serde(default)]
    pub metadata: Metadata,
    /// Order total in minor units, after tax.
    #[serde(default)]
    pub amount_total: Option<i64>,
    #[serde(default)]
    pub total_details: Option<TotalDetails>,
    #[serde(default)]
    pub shipping_details: Option<ShippingDetails>,
}

impl CheckoutSessionObject {
    /// Whether funds actually settled with this session copy.
    #[must_use]
    pub fn is_paid(&self) -> bool {
        self.payment_status.as_deref() == Some("paid")
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TotalDetails {
    /// Tax portion of the total, minor units.
    #[serde(default)]
    pub amount_tax: Option<i64>,
}

/// Shipping block collected by Checkout. Serializable so it can be stored
/// on the order as JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShippingDetails {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<ShippingAddress>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShippingAddress {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line1: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line2: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub postal_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
}

/// `payment_intent.*` object.
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentIntentObject {
    pub id: String,
    #[serde(default)]
    pub metadata: Metadata,
}

/// `charge.*` object; correlated to an order through its intent.
#[derive(Debug, Clone, Deserialize)]
pub struct ChargeObject {
    pub id: String,
    #[serde(default)]
    pub payment_intent: Option<String>,
}

/// `charge.dispute.*` object; correlated like a charge.
#[derive(Debug, Clone, Deserialize)]
pub struct DisputeObject {
    pub id: String,
    #[serde(default)]
    pub payment_intent: Option<String>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn completed_session_event_decodes() {
        let event: Event = serde_json::from_value(serde_json::json!({
            "id": "evt_1",
            "type": "checkout.session.completed",
            "data": {
                "object": {
                    "id": "cs_test_a1",
                    "object": "checkout.session",
                    "payment_status": "paid",
                    "payment_intent": "pi_123",
                    "metadata": { "orderId": "0d4bd0f4-3c84-44bd-a1e7-2f1bbb8a9d55" },
                    "amount_total": 12999,
                    "total_details": { "amount_tax": 950 },
                    "shipping_details": {
                        "name": "Jordan Diaz",
                        "address": {
                            "line1": "1 Main St",
                            "city": "Austin",
                            "state": "TX",
                            "postal_code": "78701",
                            "country": "US"
                        }
                    }
                }
            }
        }))
        .unwrap();

        assert_eq!(event.event_type, "checkout.session.completed");

        let session: CheckoutSessionObject =
            serde_json::from_value(event.data.object).unwrap();
        assert!(session.is_paid());
        assert_eq!(
            session.metadata.order_id.as_deref(),
            Some("0d4bd0f4-3c84-44bd-a1e7-2f1bbb8a9d55")
        );
        assert_eq!(session.amount_total, Some(12999));
        assert_eq!(
            session.total_details.and_then(|t| t.amount_tax),
            Some(950)
        );
        let shipping = session.shipping_details.unwrap();
        assert_eq!(shipping.address.unwrap().city.as_deref(), Some("Austin"));
    }

    #[test]
    fn bare_session_decodes_with_defaults() {
        let session: CheckoutSessionObject =
            serde_json::from_value(serde_json::json!({ "id": "cs_2" })).unwrap();
        assert!(!session.is_paid());
        assert_eq!(session.metadata.order_id, None);
        assert_eq!(session.amount_total, None);
    }

    #[test]
    fn shipping_round_trips_without_null_noise() {
        let shipping = ShippingDetails {
            name: Some("A".to_string()),
            address: Some(ShippingAddress {
                line1: Some("1 Main St".to_string()),
                line2: None,
                city: Some("Austin".to_string()),
                state: None,
                postal_code: None,
                country: Some("US".to_string()),
            }),
        };

        let value = serde_json::to_value(&shipping).unwrap();
        assert_eq!(value["address"]["line1"], "1 Main St");
        assert!(value["address"].get("line2").is_none());
    }
}
