//! In-memory order store, recording notifier, and canned session source.
//!
//! All three are cheap clones over shared state, the same shape as the
//! production pool and clients, so a test can hand one to the processor and
//! keep a handle for assertions.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;

use partsmith_core::{DeliveryMethod, Email, OrderId, OrderState, ProductId, UserId};
use partsmith_server::db::RepositoryError;
use partsmith_server::models::{Order, OrderLineDetail};
use partsmith_server::services::{EmailError, OrderNotifier, OrderStateStore, SessionSource};
use partsmith_server::stripe::{CheckoutSessionObject, StripeError};

/// In-memory [`OrderStateStore`] with real compare-and-swap semantics.
#[derive(Clone, Default)]
pub struct MemoryOrders {
    inner: Arc<OrdersInner>,
}

#[derive(Default)]
struct OrdersInner {
    orders: Mutex<HashMap<OrderId, Order>>,
    lines: Mutex<HashMap<OrderId, Vec<OrderLineDetail>>>,
    counts: Mutex<HashMap<ProductId, i32>>,
    carts: Mutex<HashMap<String, u64>>,
    cleared: Mutex<Vec<String>>,
    transitions: Mutex<Vec<(OrderId, OrderState, OrderState)>>,
}

impl MemoryOrders {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, order: Order) {
        self.inner.orders.lock().unwrap().insert(order.id, order);
    }

    pub fn add_lines(&self, id: OrderId, lines: Vec<OrderLineDetail>) {
        self.inner.lines.lock().unwrap().insert(id, lines);
    }

    /// Pretend the buyer has cart lines under this owner key.
    pub fn seed_cart(&self, owner_key: &str, line_count: u64) {
        self.inner.carts.lock().unwrap().insert(owner_key.to_string(), line_count);
    }

    /// The stored order; panics when the id is unknown.
    #[must_use]
    pub fn order(&self, id: OrderId) -> Order {
        self.inner.orders.lock().unwrap().get(&id).cloned().unwrap()
    }

    #[must_use]
    pub fn state(&self, id: OrderId) -> OrderState {
        self.order(id).state
    }

    /// Every state switch that won its compare-and-swap, in order.
    #[must_use]
    pub fn transitions(&self) -> Vec<(OrderId, OrderState, OrderState)> {
        self.inner.transitions.lock().unwrap().clone()
    }

    /// The last count written for a product, if any was written.
    #[must_use]
    pub fn count(&self, id: ProductId) -> Option<i32> {
        self.inner.counts.lock().unwrap().get(&id).copied()
    }

    /// Owner keys whose carts were cleared, in order.
    #[must_use]
    pub fn cleared_carts(&self) -> Vec<String> {
        self.inner.cleared.lock().unwrap().clone()
    }

    /// Lines still in the cart under an owner key.
    #[must_use]
    pub fn cart_lines(&self, owner_key: &str) -> u64 {
        self.inner.carts.lock().unwrap().get(owner_key).copied().unwrap_or(0)
    }
}

#[async_trait]
impl OrderStateStore for MemoryOrders {
    async fn find_order(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        Ok(self.inner.orders.lock().unwrap().get(&id).cloned())
    }

    async fn find_by_payment_intent(
        &self,
        intent_id: &str,
    ) -> Result<Option<Order>, RepositoryError> {
        Ok(self
            .inner
            .orders
            .lock()
            .unwrap()
            .values()
            .find(|order| order.stripe_payment_intent_id.as_deref() == Some(intent_id))
            .cloned())
    }

    async fn transition_state(
        &self,
        id: OrderId,
        expected: OrderState,
        to: OrderState,
    ) -> Result<bool, RepositoryError> {
        let mut orders = self.inner.orders.lock().unwrap();
        let Some(order) = orders.get_mut(&id) else {
            return Ok(false);
        };
        if order.state != expected {
            return Ok(false);
        }
        order.state = to;
        order.updated_at = Utc::now();
        self.inner.transitions.lock().unwrap().push((id, expected, to));
        Ok(true)
    }

    async fn set_payment_intent(
        &self,
        id: OrderId,
        intent_id: &str,
    ) -> Result<(), RepositoryError> {
        if let Some(order) = self.inner.orders.lock().unwrap().get_mut(&id) {
            order.stripe_payment_intent_id = Some(intent_id.to_string());
        }
        Ok(())
    }

    async fn record_totals(
        &self,
        id: OrderId,
        tax: Decimal,
        total: Decimal,
    ) -> Result<(), RepositoryError> {
        if let Some(order) = self.inner.orders.lock().unwrap().get_mut(&id) {
            order.tax = tax;
            order.total = total;
        }
        Ok(())
    }

    async fn record_shipping(
        &self,
        id: OrderId,
        shipping: &serde_json::Value,
    ) -> Result<(), RepositoryError> {
        if let Some(order) = self.inner.orders.lock().unwrap().get_mut(&id) {
            order.shipping_address = Some(shipping.clone());
        }
        Ok(())
    }

    async fn line_items(&self, id: OrderId) -> Result<Vec<OrderLineDetail>, RepositoryError> {
        Ok(self.inner.lines.lock().unwrap().get(&id).cloned().unwrap_or_default())
    }

    async fn set_product_count(&self, id: ProductId, count: i32) -> Result<(), RepositoryError> {
        self.inner.counts.lock().unwrap().insert(id, count);
        Ok(())
    }

    async fn clear_cart(&self, owner_key: &str) -> Result<u64, RepositoryError> {
        let removed = self.inner.carts.lock().unwrap().remove(owner_key).unwrap_or(0);
        self.inner.cleared.lock().unwrap().push(owner_key.to_string());
        Ok(removed)
    }
}

/// What the notifier saw when a confirmation fired.
#[derive(Debug, Clone)]
pub struct SentConfirmation {
    pub order_id: OrderId,
    pub line_count: usize,
    /// Total on the order as handed to the mailer.
    pub total: Decimal,
    /// Whether the order carried a gateway shipping address by then.
    pub has_shipping_address: bool,
}

/// Records confirmation sends; build with [`failing`](Self::failing) to
/// exercise the mail-tolerance path.
#[derive(Clone, Default)]
pub struct RecordingNotifier {
    inner: Arc<NotifierInner>,
}

#[derive(Default)]
struct NotifierInner {
    sent: Mutex<Vec<SentConfirmation>>,
    fail: AtomicBool,
}

impl RecordingNotifier {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A notifier whose every send fails.
    #[must_use]
    pub fn failing() -> Self {
        let notifier = Self::default();
        notifier.inner.fail.store(true, Ordering::SeqCst);
        notifier
    }

    #[must_use]
    pub fn sent(&self) -> Vec<SentConfirmation> {
        self.inner.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl OrderNotifier for RecordingNotifier {
    async fn order_confirmed(
        &self,
        order: &Order,
        lines: &[OrderLineDetail],
    ) -> Result<(), EmailError> {
        if self.inner.fail.load(Ordering::SeqCst) {
            return Err(EmailError::InvalidAddress("scripted failure".to_string()));
        }
        self.inner.sent.lock().unwrap().push(SentConfirmation {
            order_id: order.id,
            line_count: lines.len(),
            total: order.total,
            has_shipping_address: order.shipping_address.is_some(),
        });
        Ok(())
    }
}

/// Canned Stripe session read-backs, recording which ids were asked for.
/// Unknown ids fail the way the live API fails for a bogus session id.
#[derive(Clone, Default)]
pub struct StaticSessions {
    inner: Arc<SessionsInner>,
}

#[derive(Default)]
struct SessionsInner {
    sessions: Mutex<HashMap<String, CheckoutSessionObject>>,
    read_backs: Mutex<Vec<String>>,
}

impl StaticSessions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve this session object (keyed by its `id` field) on read-back.
    pub fn script(&self, session: serde_json::Value) {
        let session: CheckoutSessionObject = serde_json::from_value(session).unwrap();
        self.inner.sessions.lock().unwrap().insert(session.id.clone(), session);
    }

    /// Session ids that were read back, in order.
    #[must_use]
    pub fn read_backs(&self) -> Vec<String> {
        self.inner.read_backs.lock().unwrap().clone()
    }
}

#[async_trait]
impl SessionSource for StaticSessions {
    async fn checkout_session(&self, id: &str) -> Result<CheckoutSessionObject, StripeError> {
        self.inner.read_backs.lock().unwrap().push(id.to_string());
        self.inner.sessions.lock().unwrap().get(id).cloned().ok_or(StripeError::Api {
            status: 404,
            message: format!("No such checkout.session: {id}"),
        })
    }
}

/// A pending UPS order with the address block filled from the order form.
#[must_use]
pub fn pending_order(user: i32) -> Order {
    let now = Utc::now();
    Order {
        id: OrderId::new(),
        user_id: UserId::new(user),
        state: OrderState::Pending,
        sum: Decimal::new(15998, 2),
        tax: Decimal::ZERO,
        total: Decimal::new(15998, 2),
        weight: Decimal::new(122, 1),
        full_name: "Jordan Wells".to_string(),
        mail: Email::parse("jordan@example.com").unwrap(),
        phone: "+1 775 555 0101".to_string(),
        delivery_type: DeliveryMethod::new("ups"),
        country: Some("US".to_string()),
        city: Some("Reno".to_string()),
        zip_code: Some("89501".to_string()),
        region: Some("NV".to_string()),
        address_line_1: Some("4 Main St".to_string()),
        address_line_2: None,
        delivery_instructions: None,
        shipping_address: None,
        stripe_session_id: Some("cs_test_1".to_string()),
        stripe_payment_intent_id: None,
        created_at: now,
        updated_at: now,
    }
}

/// A pending pickup order; no address anywhere.
#[must_use]
pub fn pickup_order(user: i32) -> Order {
    Order {
        delivery_type: DeliveryMethod::new("pickup"),
        country: None,
        city: None,
        zip_code: None,
        region: None,
        address_line_1: None,
        ..pending_order(user)
    }
}

/// An order line as the store would join it for the confirmation flow.
#[must_use]
pub fn line(product: i32, count: i32, available: Option<i32>, manual: bool) -> OrderLineDetail {
    OrderLineDetail {
        product_id: ProductId::new(product),
        name: format!("Part {product}"),
        price: Decimal::new(4999, 2),
        count,
        selector_value: String::new(),
        is_manual: manual,
        available,
    }
}
