//! Order domain types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use partsmith_core::{DeliveryMethod, Email, OrderId, OrderState, ProductId, UserId};

/// An order as stored.
#[derive(Debug, Clone)]
pub struct Order {
    /// Order ID, also the invoice number shown to the buyer.
    pub id: OrderId,
    /// Buyer account.
    pub user_id: UserId,
    /// Where the order sits in the payment lifecycle.
    pub state: OrderState,
    /// Merchandise subtotal at creation time.
    pub sum: Decimal,
    /// Tax charged; zero until the payment settles.
    pub tax: Decimal,
    /// Amount actually charged; equals `sum` until the payment settles.
    pub total: Decimal,
    /// Combined shipping weight.
    pub weight: Decimal,
    /// Buyer name from the order form.
    pub full_name: String,
    /// Buyer email from the order form.
    pub mail: Email,
    /// Buyer phone from the order form.
    pub phone: String,
    /// Requested delivery method.
    pub delivery_type: DeliveryMethod,
    /// Destination country.
    pub country: Option<String>,
    /// Destination city.
    pub city: Option<String>,
    /// Destination postal code.
    pub zip_code: Option<String>,
    /// Destination state or province.
    pub region: Option<String>,
    /// Street address.
    pub address_line_1: Option<String>,
    /// Apartment, suite, etc.
    pub address_line_2: Option<String>,
    /// Free-form courier notes.
    pub delivery_instructions: Option<String>,
    /// Address the payment gateway collected at checkout, verbatim.
    pub shipping_address: Option<serde_json::Value>,
    /// Checkout session id.
    pub stripe_session_id: Option<String>,
    /// Payment intent id; correlation key for charge and dispute events.
    pub stripe_payment_intent_id: Option<String>,
    /// When the order was placed.
    pub created_at: DateTime<Utc>,
    /// When the order was last written.
    pub updated_at: DateTime<Utc>,
}

/// Payload for inserting a new order.
///
/// The id is generated by the caller so it can be attached to the checkout
/// session before the insert is even visible.
#[derive(Debug, Clone)]
pub struct NewOrder {
    /// Pre-generated order ID.
    pub id: OrderId,
    /// Buyer account.
    pub user_id: UserId,
    /// Merchandise subtotal.
    pub sum: Decimal,
    /// Combined shipping weight.
    pub weight: Decimal,
    /// Buyer name.
    pub full_name: String,
    /// Buyer email.
    pub mail: Email,
    /// Buyer phone.
    pub phone: String,
    /// Requested delivery method.
    pub delivery_type: DeliveryMethod,
    /// Destination country.
    pub country: Option<String>,
    /// Destination city.
    pub city: Option<String>,
    /// Destination postal code.
    pub zip_code: Option<String>,
    /// Destination state or province.
    pub region: Option<String>,
    /// Street address.
    pub address_line_1: Option<String>,
    /// Apartment, suite, etc.
    pub address_line_2: Option<String>,
    /// Free-form courier notes.
    pub delivery_instructions: Option<String>,
}

/// Line payload for a new order.
#[derive(Debug, Clone)]
pub struct NewOrderLine {
    /// Product being ordered.
    pub product_id: ProductId,
    /// Quantity, at least 1.
    pub count: i32,
    /// Buyer-chosen option (side, trim); empty when not applicable.
    pub selector_value: String,
}

/// Order line joined with the product it references.
///
/// Read by the confirmation side effects: stock decrement needs
/// `is_manual`/`available`, the emails need name and price.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct OrderLineDetail {
    /// Product being ordered.
    pub product_id: ProductId,
    /// Product name at read time.
    pub name: String,
    /// Unit price at read time.
    pub price: Decimal,
    /// Quantity ordered.
    pub count: i32,
    /// Buyer-chosen option.
    pub selector_value: String,
    /// Whether the product is operator-managed.
    pub is_manual: bool,
    /// Product stock at read time.
    pub available: Option<i32>,
}
