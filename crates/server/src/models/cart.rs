//! Cart domain types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use partsmith_core::{CartLineId, ProductId};

/// One product in a cart.
///
/// At most one row exists per `(owner_key, product_id, selector_value)`;
/// quantity changes mutate `count` rather than adding rows.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CartLine {
    /// Row ID.
    pub id: CartLineId,
    /// Rendered owner key (`u:{id}` or `s:{token}`).
    pub owner_key: String,
    /// Product in the cart.
    pub product_id: ProductId,
    /// Buyer-chosen option; empty when not applicable.
    pub selector_value: String,
    /// Quantity, always at least 1.
    pub count: i32,
    /// When the line was first added.
    pub created_at: DateTime<Utc>,
}

/// Cart line joined with product display fields, as returned by `GET /cart`.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    /// Cart line ID.
    pub line_id: CartLineId,
    /// Product ID.
    pub product_id: ProductId,
    /// Product name.
    pub name: String,
    /// Unit price.
    pub price: Decimal,
    /// Strike-through price, if any.
    pub old_price: Option<Decimal>,
    /// Product images.
    pub images: Vec<String>,
    /// Quantity in the cart.
    pub count: i32,
    /// Buyer-chosen option.
    pub selector_value: String,
}
