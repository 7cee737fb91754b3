//! Order repository.
//!
//! Orders move through their payment lifecycle via `transition_state`, a
//! compare-and-swap on the `state` column. Every lifecycle write goes through
//! it; there is deliberately no unconditional state setter, so duplicate
//! webhook deliveries cannot re-apply a transition.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use partsmith_core::{DeliveryMethod, Email, OrderId, OrderState, UserId};

use super::RepositoryError;
use crate::models::{NewOrder, NewOrderLine, Order, OrderLineDetail};

/// Repository for order database operations.
pub struct OrderRepository<'a> {
    pool: &'a PgPool,
}

const ORDER_COLUMNS: &str = "id, user_id, state, sum, tax, total, weight, full_name, mail, \
     phone, delivery_type, country, city, zip_code, region, address_line_1, address_line_2, \
     delivery_instructions, shipping_address, stripe_session_id, stripe_payment_intent_id, \
     created_at, updated_at";

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: Uuid,
    user_id: i32,
    state: String,
    sum: Decimal,
    tax: Decimal,
    total: Decimal,
    weight: Decimal,
    full_name: String,
    mail: String,
    phone: String,
    delivery_type: String,
    country: Option<String>,
    city: Option<String>,
    zip_code: Option<String>,
    region: Option<String>,
    address_line_1: Option<String>,
    address_line_2: Option<String>,
    delivery_instructions: Option<String>,
    shipping_address: Option<serde_json::Value>,
    stripe_session_id: Option<String>,
    stripe_payment_intent_id: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl OrderRow {
    fn into_order(self) -> Result<Order, RepositoryError> {
        let state: OrderState = self.state.parse().map_err(RepositoryError::DataCorruption)?;
        let mail = Email::parse(&self.mail).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid email in database: {e}"))
        })?;

        Ok(Order {
            id: OrderId::from(self.id),
            user_id: UserId::new(self.user_id),
            state,
            sum: self.sum,
            tax: self.tax,
            total: self.total,
            weight: self.weight,
            full_name: self.full_name,
            mail,
            phone: self.phone,
            delivery_type: DeliveryMethod::new(self.delivery_type),
            country: self.country,
            city: self.city,
            zip_code: self.zip_code,
            region: self.region,
            address_line_1: self.address_line_1,
            address_line_2: self.address_line_2,
            delivery_instructions: self.delivery_instructions,
            shipping_address: self.shipping_address,
            stripe_session_id: self.stripe_session_id,
            stripe_payment_intent_id: self.stripe_payment_intent_id,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

impl<'a> OrderRepository<'a> {
    /// Create a new order repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Insert an order and its line items in one transaction.
    ///
    /// The order starts in `pending` with `tax = 0` and `total = sum`; both
    /// are overwritten when the payment settles.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if any insert fails; nothing is
    /// committed in that case.
    pub async fn create(
        &self,
        order: &NewOrder,
        lines: &[NewOrderLine],
    ) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO orders \
                 (id, user_id, state, sum, tax, total, weight, full_name, mail, phone, \
                  delivery_type, country, city, zip_code, region, address_line_1, \
                  address_line_2, delivery_instructions) \
             VALUES ($1, $2, 'pending', $3, 0, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, \
                     $13, $14, $15)",
        )
        .bind(order.id)
        .bind(order.user_id)
        .bind(order.sum)
        .bind(order.weight)
        .bind(&order.full_name)
        .bind(order.mail.as_str())
        .bind(&order.phone)
        .bind(order.delivery_type.as_str())
        .bind(&order.country)
        .bind(&order.city)
        .bind(&order.zip_code)
        .bind(&order.region)
        .bind(&order.address_line_1)
        .bind(&order.address_line_2)
        .bind(&order.delivery_instructions)
        .execute(&mut *tx)
        .await?;

        for line in lines {
            sqlx::query(
                "INSERT INTO order_products (order_id, product_id, count, selector_value) \
                 VALUES ($1, $2, $3, $4)",
            )
            .bind(order.id)
            .bind(line.product_id)
            .bind(line.count)
            .bind(&line.selector_value)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Get an order by its ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if a stored state or email
    /// does not parse.
    pub async fn find(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        row.map(OrderRow::into_order).transpose()
    }

    /// Find the order correlated with a payment intent.
    ///
    /// Charge and dispute events carry an intent id but no order metadata;
    /// this is their way back to the order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if the stored row is invalid.
    pub async fn find_by_payment_intent(
        &self,
        payment_intent_id: &str,
    ) -> Result<Option<Order>, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE stripe_payment_intent_id = $1"
        ))
        .bind(payment_intent_id)
        .fetch_optional(self.pool)
        .await?;

        row.map(OrderRow::into_order).transpose()
    }

    /// All orders placed by a user, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if a stored row is invalid.
    pub async fn for_user(&self, user_id: UserId) -> Result<Vec<Order>, RepositoryError> {
        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE user_id = $1 ORDER BY created_at DESC"
        ))
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(OrderRow::into_order).collect()
    }

    /// Compare-and-swap the lifecycle state.
    ///
    /// Returns `true` if the order was in `expected` and is now `to`;
    /// `false` means another delivery got there first and the caller must
    /// not apply side effects.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn transition_state(
        &self,
        id: OrderId,
        expected: OrderState,
        to: OrderState,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            "UPDATE orders SET state = $3, updated_at = NOW() WHERE id = $1 AND state = $2",
        )
        .bind(id)
        .bind(expected.to_string())
        .bind(to.to_string())
        .execute(self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Record the checkout session id handed back by the gateway.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn set_session(&self, id: OrderId, session_id: &str) -> Result<(), RepositoryError> {
        sqlx::query("UPDATE orders SET stripe_session_id = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(session_id)
            .execute(self.pool)
            .await?;

        Ok(())
    }

    /// Record the payment intent id once the gateway assigns one.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn set_payment_intent(
        &self,
        id: OrderId,
        payment_intent_id: &str,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            "UPDATE orders SET stripe_payment_intent_id = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(payment_intent_id)
        .execute(self.pool)
        .await?;

        Ok(())
    }

    /// Record settled tax and total amounts.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn record_totals(
        &self,
        id: OrderId,
        tax: Decimal,
        total: Decimal,
    ) -> Result<(), RepositoryError> {
        sqlx::query("UPDATE orders SET tax = $2, total = $3, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(tax)
            .bind(total)
            .execute(self.pool)
            .await?;

        Ok(())
    }

    /// Store the shipping address the gateway collected, verbatim.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn record_shipping(
        &self,
        id: OrderId,
        shipping: &serde_json::Value,
    ) -> Result<(), RepositoryError> {
        sqlx::query("UPDATE orders SET shipping_address = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(shipping)
            .execute(self.pool)
            .await?;

        Ok(())
    }

    /// Line items joined with their products, in insertion order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn line_items(&self, id: OrderId) -> Result<Vec<OrderLineDetail>, RepositoryError> {
        let lines = sqlx::query_as::<_, OrderLineDetail>(
            "SELECT op.product_id, p.name, p.price, op.count, op.selector_value, \
                    p.is_manual, p.count AS available \
             FROM order_products op \
             JOIN products p ON p.id = op.product_id \
             WHERE op.order_id = $1 \
             ORDER BY op.id",
        )
        .bind(id)
        .fetch_all(self.pool)
        .await?;

        Ok(lines)
    }
}
