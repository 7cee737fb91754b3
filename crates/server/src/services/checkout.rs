//! Order placement.
//!
//! Takes the storefront's order form, validates it, persists the order in
//! `pending`, and opens a Stripe Checkout session for it. Everything after
//! that (confirmation, stock, emails) is driven by webhooks.

use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tracing::{info, instrument};

use partsmith_core::{DeliveryMethod, Email, OrderId, ProductId, UserId, to_minor_units};

use crate::db::{OrderRepository, ProductRepository, RepositoryError, UserRepository};
use crate::models::{NewOrder, NewOrderLine, Product};
use crate::stripe::{CheckoutSessionParams, LineItem, StripeClient, StripeError};

/// Validation message for missing or malformed buyer fields.
const ORDER_FORM_MESSAGE: &str = "Please, fill order form";
/// Validation message for a shipped order without a usable address.
const DELIVERY_FORM_MESSAGE: &str = "Please, fill delivery form";

/// Stripe caps `product_data.description`; longer blurbs are cut.
const DESCRIPTION_LIMIT: usize = 500;

/// Errors from order placement.
#[derive(Debug, thiserror::Error)]
pub enum CheckoutError {
    /// The request failed validation; the message is shown to the buyer.
    #[error("{0}")]
    Validation(String),

    /// The order names a user that does not exist.
    #[error("User not found. Please authorize")]
    UnknownUser,

    /// The order names a product that does not exist.
    #[error("Unknown product: {0}")]
    UnknownProduct(ProductId),

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    Gateway(#[from] StripeError),
}

/// `POST /order` request body.
///
/// `delivey_type` is the field name the storefront has always sent; the
/// correctly spelled `delivery_type` is accepted as an alias. The buyer's
/// `state` is stored as the order's region.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateOrderRequest {
    #[serde(default, rename = "userId")]
    pub user_id: Option<i32>,
    #[serde(default)]
    pub products: Vec<OrderProductRequest>,
    #[serde(default, rename = "fullName")]
    pub full_name: Option<String>,
    #[serde(default)]
    pub mail: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default, rename = "delivey_type", alias = "delivery_type")]
    pub delivery_type: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub zip_code: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub address_line_1: Option<String>,
    #[serde(default)]
    pub address_line_2: Option<String>,
    #[serde(default)]
    pub delivery_instructions: Option<String>,
}

/// One product entry in the order form.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OrderProductRequest {
    #[serde(default, rename = "productId")]
    pub product_id: i32,
    #[serde(default)]
    pub count: i32,
    #[serde(default, rename = "selectorValue")]
    pub selector_value: Option<String>,
}

/// An order form that passed validation.
#[derive(Debug, Clone)]
pub struct ValidatedOrder {
    pub user_id: UserId,
    pub lines: Vec<ValidatedLine>,
    pub full_name: String,
    pub mail: Email,
    pub phone: String,
    pub delivery_type: DeliveryMethod,
    pub country: Option<String>,
    pub city: Option<String>,
    pub zip_code: Option<String>,
    pub region: Option<String>,
    pub address_line_1: Option<String>,
    pub address_line_2: Option<String>,
    pub delivery_instructions: Option<String>,
}

/// One validated order line.
#[derive(Debug, Clone)]
pub struct ValidatedLine {
    pub product_id: ProductId,
    pub count: i32,
    pub selector_value: String,
}

impl TryFrom<CreateOrderRequest> for ValidatedOrder {
    type Error = CheckoutError;

    fn try_from(request: CreateOrderRequest) -> Result<Self, Self::Error> {
        let order_form = || CheckoutError::Validation(ORDER_FORM_MESSAGE.to_owned());

        let user_id = request.user_id.filter(|id| *id > 0).ok_or_else(order_form)?;
        let full_name = non_blank(request.full_name).ok_or_else(order_form)?;
        let phone = non_blank(request.phone).ok_or_else(order_form)?;
        let mail = non_blank(request.mail)
            .and_then(|raw| Email::parse(&raw).ok())
            .ok_or_else(order_form)?;
        let delivery_type =
            DeliveryMethod::new(non_blank(request.delivery_type).ok_or_else(order_form)?);

        if request.products.is_empty() {
            return Err(order_form());
        }
        let mut lines = Vec::with_capacity(request.products.len());
        for product in request.products {
            if product.product_id <= 0 || product.count <= 0 {
                return Err(order_form());
            }
            lines.push(ValidatedLine {
                product_id: ProductId::new(product.product_id),
                count: product.count,
                selector_value: product.selector_value.unwrap_or_default(),
            });
        }

        let zip_code = non_blank(request.zip_code);
        let region = non_blank(request.state);
        let address_line_1 = non_blank(request.address_line_1);

        if delivery_type.requires_shipping()
            && (zip_code.is_none() || region.is_none() || address_line_1.is_none())
        {
            return Err(CheckoutError::Validation(DELIVERY_FORM_MESSAGE.to_owned()));
        }

        Ok(Self {
            user_id: UserId::new(user_id),
            lines,
            full_name,
            mail,
            phone,
            delivery_type,
            country: non_blank(request.country),
            city: non_blank(request.city),
            zip_code,
            region,
            address_line_1,
            address_line_2: non_blank(request.address_line_2),
            delivery_instructions: non_blank(request.delivery_instructions),
        })
    }
}

/// `POST /order` response body.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlacedOrder {
    /// The order's ID, which the success page shows as the invoice number.
    pub invoice_id: OrderId,
    /// Order subtotal before tax.
    pub amount: Decimal,
    pub currency: &'static str,
    /// Stripe-hosted payment page to redirect the buyer to.
    pub payment_url: String,
    pub stripe_session_id: String,
}

/// Validate the order form, persist the order, and open a checkout session.
///
/// The order is written in `pending` with its subtotal; tax and the grand
/// total arrive later with the `checkout.session.completed` webhook. The
/// session and the payment intent both carry the order ID in metadata so
/// every later event can be traced back here.
///
/// # Errors
///
/// Returns [`CheckoutError::Validation`] for a bad form,
/// [`CheckoutError::UnknownUser`] / [`CheckoutError::UnknownProduct`] for
/// dangling references, and repository or gateway errors otherwise.
#[instrument(skip(pool, stripe, request))]
pub async fn place_order(
    pool: &PgPool,
    stripe: &StripeClient,
    request: CreateOrderRequest,
) -> Result<PlacedOrder, CheckoutError> {
    let order = ValidatedOrder::try_from(request)?;

    if UserRepository::new(pool).find(order.user_id).await?.is_none() {
        return Err(CheckoutError::UnknownUser);
    }

    let ids: Vec<ProductId> = order.lines.iter().map(|line| line.product_id).collect();
    let products: HashMap<ProductId, Product> = ProductRepository::new(pool)
        .find_many(&ids)
        .await?
        .into_iter()
        .map(|product| (product.id, product))
        .collect();

    let mut sum = Decimal::ZERO;
    let mut weight = Decimal::ZERO;
    let mut new_lines = Vec::with_capacity(order.lines.len());
    let mut gateway_items = Vec::with_capacity(order.lines.len());
    for line in &order.lines {
        let product = products
            .get(&line.product_id)
            .ok_or(CheckoutError::UnknownProduct(line.product_id))?;
        let count = Decimal::from(line.count);
        sum += product.price * count;
        if let Some(unit_weight) = product.weight {
            weight += unit_weight * count;
        }
        gateway_items.push(LineItem {
            name: product.name.clone(),
            description: blurb(&product.description),
            unit_amount: to_minor_units(product.price),
            quantity: line.count,
        });
        new_lines.push(NewOrderLine {
            product_id: line.product_id,
            count: line.count,
            selector_value: line.selector_value.clone(),
        });
    }
    sum = sum.round_dp(2);

    let order_id = OrderId::new();
    let orders = OrderRepository::new(pool);
    orders
        .create(
            &NewOrder {
                id: order_id,
                user_id: order.user_id,
                sum,
                weight,
                full_name: order.full_name,
                mail: order.mail.clone(),
                phone: order.phone,
                delivery_type: order.delivery_type.clone(),
                country: order.country,
                city: order.city,
                zip_code: order.zip_code,
                region: order.region,
                address_line_1: order.address_line_1,
                address_line_2: order.address_line_2,
                delivery_instructions: order.delivery_instructions,
            },
            &new_lines,
        )
        .await?;

    let session = stripe
        .create_checkout_session(&CheckoutSessionParams {
            order_id,
            customer_email: order.mail.into_inner(),
            line_items: gateway_items,
            collect_shipping: order.delivery_type.requires_shipping(),
        })
        .await?;

    orders.set_session(order_id, &session.id).await?;
    if let Some(intent_id) = &session.payment_intent {
        orders.set_payment_intent(order_id, intent_id).await?;
    }

    info!(order_id = %order_id, amount = %sum, "Order placed");

    Ok(PlacedOrder {
        invoice_id: order_id,
        amount: sum,
        currency: "USD",
        payment_url: session.url,
        stripe_session_id: session.id,
    })
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|raw| raw.trim().to_owned())
        .filter(|trimmed| !trimmed.is_empty())
}

/// Product description trimmed down to what Stripe will accept, or `None`
/// when there is nothing to show.
fn blurb(description: &str) -> Option<String> {
    let trimmed = description.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(trimmed.chars().take(DESCRIPTION_LIMIT).collect())
}
