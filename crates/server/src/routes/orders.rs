//! Order route handlers.

use axum::Json;
use axum::extract::{Path, Query, State};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use partsmith_core::{OrderId, ProductId, UserId};

use crate::db::OrderRepository;
use crate::error::{AppError, Result};
use crate::models::{Order, OrderLineDetail};
use crate::services::{CreateOrderRequest, PlacedOrder, place_order};
use crate::state::AppState;

/// Order detail for `GET /order/{id}`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderView {
    pub id: OrderId,
    pub state: String,
    pub sum: Decimal,
    pub tax: Decimal,
    pub total: Decimal,
    pub full_name: String,
    pub mail: String,
    pub phone: String,
    pub delivery_type: String,
    pub country: Option<String>,
    pub city: Option<String>,
    pub zip_code: Option<String>,
    pub region: Option<String>,
    pub address_line_1: Option<String>,
    pub address_line_2: Option<String>,
    pub delivery_instructions: Option<String>,
    pub shipping_address: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub items: Vec<OrderItemView>,
}

/// One line item inside [`OrderView`].
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItemView {
    pub product_id: ProductId,
    pub name: String,
    pub price: Decimal,
    pub count: i32,
    pub selector_value: String,
}

/// Order history entry for `GET /orders`; line items are left to the
/// detail endpoint.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderSummaryView {
    pub id: OrderId,
    pub state: String,
    pub sum: Decimal,
    pub tax: Decimal,
    pub total: Decimal,
    pub delivery_type: String,
    pub created_at: DateTime<Utc>,
}

impl OrderView {
    fn from_parts(order: Order, items: Vec<OrderLineDetail>) -> Self {
        Self {
            id: order.id,
            state: order.state.to_string(),
            sum: order.sum,
            tax: order.tax,
            total: order.total,
            full_name: order.full_name,
            mail: order.mail.into_inner(),
            phone: order.phone,
            delivery_type: order.delivery_type.as_str().to_owned(),
            country: order.country,
            city: order.city,
            zip_code: order.zip_code,
            region: order.region,
            address_line_1: order.address_line_1,
            address_line_2: order.address_line_2,
            delivery_instructions: order.delivery_instructions,
            shipping_address: order.shipping_address,
            created_at: order.created_at,
            items: items.into_iter().map(OrderItemView::from).collect(),
        }
    }
}

impl From<OrderLineDetail> for OrderItemView {
    fn from(line: OrderLineDetail) -> Self {
        Self {
            product_id: line.product_id,
            name: line.name,
            price: line.price,
            count: line.count,
            selector_value: line.selector_value,
        }
    }
}

impl From<Order> for OrderSummaryView {
    fn from(order: Order) -> Self {
        Self {
            id: order.id,
            state: order.state.to_string(),
            sum: order.sum,
            tax: order.tax,
            total: order.total,
            delivery_type: order.delivery_type.as_str().to_owned(),
            created_at: order.created_at,
        }
    }
}

/// Query parameters for `GET /orders`.
#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    #[serde(default, rename = "userId")]
    pub user_id: Option<i32>,
}

/// Place an order and open a Stripe Checkout session for it.
#[instrument(skip(state, request))]
pub async fn create(
    State(state): State<AppState>,
    Json(request): Json<CreateOrderRequest>,
) -> Result<Json<PlacedOrder>> {
    let placed = place_order(state.pool(), state.stripe(), request).await?;
    Ok(Json(placed))
}

/// Order detail with line items.
#[instrument(skip(state))]
pub async fn show(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<OrderView>> {
    let id = OrderId::parse(&id)
        .map_err(|_| AppError::BadRequest("Invalid order id".to_owned()))?;

    let orders = OrderRepository::new(state.pool());
    let order = orders
        .find(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("order {id}")))?;
    let items = orders.line_items(id).await?;

    Ok(Json(OrderView::from_parts(order, items)))
}

/// A user's order history, newest first.
#[instrument(skip(state))]
pub async fn history(
    State(state): State<AppState>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<OrderSummaryView>>> {
    let Some(user_id) = query.user_id.filter(|id| *id > 0) else {
        return Err(AppError::BadRequest("User id is required".to_owned()));
    };

    let orders = OrderRepository::new(state.pool())
        .for_user(UserId::new(user_id))
        .await?;

    Ok(Json(orders.into_iter().map(OrderSummaryView::from).collect()))
}
