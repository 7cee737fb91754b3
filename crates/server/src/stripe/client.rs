//! Checkout Session REST calls.

use secrecy::ExposeSecret;
use serde::Deserialize;
use tracing::instrument;

use partsmith_core::OrderId;

use crate::config::StripeConfig;

use super::StripeError;
use super::types::CheckoutSessionObject;

const API_BASE: &str = "https://api.stripe.com/v1";

/// Stripe tax code for tangible goods; every auto part falls under it.
const TAX_CODE_TANGIBLE_GOODS: &str = "txcd_99999999";

/// Stripe API client.
#[derive(Clone)]
pub struct StripeClient {
    client: reqwest::Client,
    config: StripeConfig,
}

/// Input for creating a Checkout Session.
#[derive(Debug, Clone)]
pub struct CheckoutSessionParams {
    /// Order the session pays for; stamped into metadata on the session and
    /// its payment intent.
    pub order_id: OrderId,
    pub customer_email: String,
    pub line_items: Vec<LineItem>,
    /// Whether Checkout should collect a shipping address.
    pub collect_shipping: bool,
}

/// One priced line of a session.
#[derive(Debug, Clone)]
pub struct LineItem {
    pub name: String,
    pub description: Option<String>,
    /// Unit price in minor units (cents).
    pub unit_amount: i64,
    pub quantity: i32,
}

/// What the caller needs back from a created session.
#[derive(Debug, Clone)]
pub struct CreatedSession {
    pub id: String,
    /// Hosted payment page to redirect the buyer to.
    pub url: String,
    pub payment_intent: Option<String>,
}

impl StripeClient {
    /// Creates a new client.
    ///
    /// # Panics
    ///
    /// Panics if the underlying HTTP client cannot be created.
    #[must_use]
    pub fn new(config: StripeConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .expect("Failed to create HTTP client");

        Self { client, config }
    }

    /// Creates a hosted Checkout Session for an order.
    ///
    /// # Errors
    ///
    /// Returns `StripeError::Api` when Stripe rejects the request and
    /// `StripeError::MissingField` when the response lacks an id or URL.
    #[instrument(skip(self, params), fields(order_id = %params.order_id))]
    pub async fn create_checkout_session(
        &self,
        params: &CheckoutSessionParams,
    ) -> Result<CreatedSession, StripeError> {
        let form = session_form(&self.config, params);

        let response = self
            .client
            .post(format!("{API_BASE}/checkout/sessions"))
            .bearer_auth(self.config.secret_key.expose_secret())
            .form(&form)
            .send()
            .await?;
        let response = check_status(response).await?;

        let body: SessionResponse = response.json().await?;
        let id = body.id.ok_or(StripeError::MissingField("id"))?;
        let url = body.url.ok_or(StripeError::MissingField("url"))?;
        Ok(CreatedSession {
            id,
            url,
            payment_intent: body.payment_intent,
        })
    }

    /// Retrieves a full session, for when a webhook copy lacks totals.
    ///
    /// # Errors
    ///
    /// Returns `StripeError::Api` when Stripe rejects the request.
    #[instrument(skip(self))]
    pub async fn checkout_session(&self, id: &str) -> Result<CheckoutSessionObject, StripeError> {
        let response = self
            .client
            .get(format!("{API_BASE}/checkout/sessions/{id}"))
            .bearer_auth(self.config.secret_key.expose_secret())
            .send()
            .await?;
        let response = check_status(response).await?;

        Ok(response.json().await?)
    }
}

/// Builds the form-encoded body for a session create call. Stripe's REST
/// API spells nested structures with indexed bracket keys.
fn session_form(config: &StripeConfig, params: &CheckoutSessionParams) -> Vec<(String, String)> {
    let order_id = params.order_id.to_string();
    let mut form: Vec<(String, String)> = vec![
        ("mode".to_string(), "payment".to_string()),
        ("payment_method_types[0]".to_string(), "card".to_string()),
        (
            "customer_email".to_string(),
            params.customer_email.clone(),
        ),
        (
            "success_url".to_string(),
            format!("{}?session_id={{CHECKOUT_SESSION_ID}}", config.success_url),
        ),
        ("cancel_url".to_string(), config.cancel_url.to_string()),
        ("metadata[orderId]".to_string(), order_id.clone()),
        (
            "payment_intent_data[metadata][orderId]".to_string(),
            order_id,
        ),
    ];

    if config.automatic_tax {
        form.push(("automatic_tax[enabled]".to_string(), "true".to_string()));
    }

    for (i, item) in params.line_items.iter().enumerate() {
        let prefix = format!("line_items[{i}]");
        form.push((
            format!("{prefix}[price_data][currency]"),
            "usd".to_string(),
        ));
        form.push((
            format!("{prefix}[price_data][product_data][name]"),
            item.name.clone(),
        ));
        if let Some(description) = &item.description {
            form.push((
                format!("{prefix}[price_data][product_data][description]"),
                description.clone(),
            ));
        }
        form.push((
            format!("{prefix}[price_data][product_data][tax_code]"),
            TAX_CODE_TANGIBLE_GOODS.to_string(),
        ));
        form.push((
            format!("{prefix}[price_data][unit_amount]"),
            item.unit_amount.to_string(),
        ));
        form.push((format!("{prefix}[quantity]"), item.quantity.to_string()));
    }

    if params.collect_shipping {
        form.push((
            "shipping_address_collection[allowed_countries][0]".to_string(),
            "US".to_string(),
        ));
        form.push((
            "shipping_options[0][shipping_rate_data][type]".to_string(),
            "fixed_amount".to_string(),
        ));
        form.push((
            "shipping_options[0][shipping_rate_data][fixed_amount][amount]".to_string(),
            "0".to_string(),
        ));
        form.push((
            "shipping_options[0][shipping_rate_data][fixed_amount][currency]".to_string(),
            "usd".to_string(),
        ));
        form.push((
            "shipping_options[0][shipping_rate_data][display_name]".to_string(),
            "Standard shipping".to_string(),
        ));
    }

    form
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, StripeError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body: serde_json::Value = response.json().await.unwrap_or_default();
    let message = body["error"]["message"]
        .as_str()
        .unwrap_or("Unknown error")
        .to_string();
    Err(StripeError::Api {
        status: status.as_u16(),
        message,
    })
}

#[derive(Debug, Deserialize)]
struct SessionResponse {
    id: Option<String>,
    url: Option<String>,
    payment_intent: Option<String>,
}
