//! Stripe webhook processing.
//!
//! Every delivery is reduced to a [`PaymentEvent`] and run through the pure
//! state machine in `partsmith_core`; the winner of the compare-and-swap on
//! the order's state runs that state's side effects exactly once. Deliveries
//! the machine rejects as stale, and events we cannot tie to an order, are
//! logged and acknowledged so the gateway stops redelivering them.
//!
//! The processor talks to storage, Stripe, and the mailer through traits, so
//! the whole pipeline runs against in-memory fakes in tests.

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use sqlx::PgPool;
use tracing::{debug, info, instrument, warn};

use partsmith_core::{
    CartOwner, OrderId, OrderState, PaymentEvent, ProductId, Step, from_minor_units,
    stock_after_purchase, transition,
};

use crate::db::{CartRepository, OrderRepository, ProductRepository, RepositoryError};
use crate::models::{Order, OrderLineDetail};
use crate::services::email::{EmailError, EmailService};
use crate::stripe::{
    ChargeObject, CheckoutSessionObject, DisputeObject, Event, PaymentIntentObject, StripeClient,
    StripeError,
};

/// Order and inventory storage as the webhook pipeline sees it.
#[async_trait]
pub trait OrderStateStore: Send + Sync {
    async fn find_order(&self, id: OrderId) -> Result<Option<Order>, RepositoryError>;

    async fn find_by_payment_intent(
        &self,
        intent_id: &str,
    ) -> Result<Option<Order>, RepositoryError>;

    /// Compare-and-swap the order's state; `false` means another delivery
    /// moved it first.
    async fn transition_state(
        &self,
        id: OrderId,
        expected: OrderState,
        to: OrderState,
    ) -> Result<bool, RepositoryError>;

    async fn set_payment_intent(
        &self,
        id: OrderId,
        intent_id: &str,
    ) -> Result<(), RepositoryError>;

    async fn record_totals(
        &self,
        id: OrderId,
        tax: Decimal,
        total: Decimal,
    ) -> Result<(), RepositoryError>;

    async fn record_shipping(
        &self,
        id: OrderId,
        shipping: &serde_json::Value,
    ) -> Result<(), RepositoryError>;

    async fn line_items(&self, id: OrderId) -> Result<Vec<OrderLineDetail>, RepositoryError>;

    async fn set_product_count(&self, id: ProductId, count: i32) -> Result<(), RepositoryError>;

    /// Drop every cart line under an owner key; returns how many went.
    async fn clear_cart(&self, owner_key: &str) -> Result<u64, RepositoryError>;
}

#[async_trait]
impl OrderStateStore for PgPool {
    async fn find_order(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        OrderRepository::new(self).find(id).await
    }

    async fn find_by_payment_intent(
        &self,
        intent_id: &str,
    ) -> Result<Option<Order>, RepositoryError> {
        OrderRepository::new(self).find_by_payment_intent(intent_id).await
    }

    async fn transition_state(
        &self,
        id: OrderId,
        expected: OrderState,
        to: OrderState,
    ) -> Result<bool, RepositoryError> {
        OrderRepository::new(self).transition_state(id, expected, to).await
    }

    async fn set_payment_intent(
        &self,
        id: OrderId,
        intent_id: &str,
    ) -> Result<(), RepositoryError> {
        OrderRepository::new(self).set_payment_intent(id, intent_id).await
    }

    async fn record_totals(
        &self,
        id: OrderId,
        tax: Decimal,
        total: Decimal,
    ) -> Result<(), RepositoryError> {
        OrderRepository::new(self).record_totals(id, tax, total).await
    }

    async fn record_shipping(
        &self,
        id: OrderId,
        shipping: &serde_json::Value,
    ) -> Result<(), RepositoryError> {
        OrderRepository::new(self).record_shipping(id, shipping).await
    }

    async fn line_items(&self, id: OrderId) -> Result<Vec<OrderLineDetail>, RepositoryError> {
        OrderRepository::new(self).line_items(id).await
    }

    async fn set_product_count(&self, id: ProductId, count: i32) -> Result<(), RepositoryError> {
        ProductRepository::new(self).set_count(id, count).await
    }

    async fn clear_cart(&self, owner_key: &str) -> Result<u64, RepositoryError> {
        CartRepository::new(self).clear_owner(owner_key).await
    }
}

/// Read-side Stripe access for filling in what a webhook copy left out.
#[async_trait]
pub trait SessionSource: Send + Sync {
    async fn checkout_session(&self, id: &str) -> Result<CheckoutSessionObject, StripeError>;
}

#[async_trait]
impl SessionSource for StripeClient {
    async fn checkout_session(&self, id: &str) -> Result<CheckoutSessionObject, StripeError> {
        Self::checkout_session(self, id).await
    }
}

/// Sends the confirmation mail pair for a freshly confirmed order.
#[async_trait]
pub trait OrderNotifier: Send + Sync {
    async fn order_confirmed(
        &self,
        order: &Order,
        lines: &[OrderLineDetail],
    ) -> Result<(), EmailError>;
}

/// Applies verified gateway events to orders.
pub struct WebhookProcessor<S, G, N> {
    store: S,
    gateway: G,
    /// `None` when SMTP is not configured; confirmations are then logged
    /// instead of mailed.
    notifier: Option<N>,
}

impl<S, G, N> WebhookProcessor<S, G, N>
where
    S: OrderStateStore,
    G: SessionSource,
    N: OrderNotifier,
{
    pub const fn new(store: S, gateway: G, notifier: Option<N>) -> Self {
        Self { store, gateway, notifier }
    }

    /// Apply one verified event. `Ok` acknowledges the delivery.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` when storage fails mid-flight; the endpoint
    /// answers 500 so the gateway redelivers.
    #[instrument(skip(self, event), fields(event_id = %event.id, event_type = %event.event_type))]
    pub async fn process(&self, event: &Event) -> Result<(), RepositoryError> {
        match event.event_type.as_str() {
            "checkout.session.completed" => {
                let Some(session) = decode_object::<CheckoutSessionObject>(event) else {
                    return Ok(());
                };
                let payment_event = PaymentEvent::SessionCompleted { paid: session.is_paid() };
                self.on_session_event(&session, payment_event).await
            }
            "checkout.session.async_payment_succeeded" => {
                let Some(session) = decode_object::<CheckoutSessionObject>(event) else {
                    return Ok(());
                };
                self.on_session_event(&session, PaymentEvent::AsyncPaymentSucceeded).await
            }
            "checkout.session.async_payment_failed" => {
                let Some(session) = decode_object::<CheckoutSessionObject>(event) else {
                    return Ok(());
                };
                self.on_session_event(&session, PaymentEvent::AsyncPaymentFailed).await
            }
            "checkout.session.expired" => {
                let Some(session) = decode_object::<CheckoutSessionObject>(event) else {
                    return Ok(());
                };
                self.on_session_event(&session, PaymentEvent::SessionExpired).await
            }
            "payment_intent.succeeded" => {
                self.on_intent_event(event, PaymentEvent::IntentSucceeded).await
            }
            "payment_intent.payment_failed" => {
                self.on_intent_event(event, PaymentEvent::IntentFailed).await
            }
            "payment_intent.canceled" => {
                self.on_intent_event(event, PaymentEvent::IntentCanceled).await
            }
            "payment_intent.created" => {
                self.on_intent_event(event, PaymentEvent::IntentCreated).await
            }
            "payment_intent.processing" => {
                self.on_intent_event(event, PaymentEvent::IntentProcessing).await
            }
            "charge.refunded" => {
                let Some(charge) = decode_object::<ChargeObject>(event) else {
                    return Ok(());
                };
                self.on_correlated_event(
                    charge.payment_intent.as_deref(),
                    PaymentEvent::ChargeRefunded,
                )
                .await
            }
            "charge.dispute.created" => {
                let Some(dispute) = decode_object::<DisputeObject>(event) else {
                    return Ok(());
                };
                self.on_correlated_event(
                    dispute.payment_intent.as_deref(),
                    PaymentEvent::DisputeCreated,
                )
                .await
            }
            other => {
                debug!(event_type = other, "Ignoring unhandled event type");
                Ok(())
            }
        }
    }

    /// Checkout-session events: the order ID rides in the session metadata.
    async fn on_session_event(
        &self,
        session: &CheckoutSessionObject,
        payment_event: PaymentEvent,
    ) -> Result<(), RepositoryError> {
        let Some(order) = self.order_from_metadata(session.metadata.order_id.as_deref()).await?
        else {
            return Ok(());
        };

        match transition(order.state, payment_event) {
            Err(stale) => {
                info!(order_id = %order.id, %stale, "Dropping stale delivery");
                Ok(())
            }
            Ok(Step::Stay) => {
                // Completed but unpaid: the async outcome arrives later, but
                // this delivery is the one that carries the address.
                self.capture_shipping(&order, session).await
            }
            Ok(Step::Enter(next)) => {
                if !self.store.transition_state(order.id, order.state, next).await? {
                    info!(order_id = %order.id, "Lost the state race; dropping delivery");
                    return Ok(());
                }
                info!(order_id = %order.id, from = %order.state, to = %next, "Order state changed");
                if next == OrderState::Confirmed {
                    self.confirm_effects(&order, Some(session)).await?;
                }
                Ok(())
            }
        }
    }

    /// Payment-intent events: metadata was stamped onto the intent at
    /// session creation, so resolution works the same way.
    async fn on_intent_event(
        &self,
        event: &Event,
        payment_event: PaymentEvent,
    ) -> Result<(), RepositoryError> {
        let Some(intent) = decode_object::<PaymentIntentObject>(event) else {
            return Ok(());
        };
        let Some(order) = self.order_from_metadata(intent.metadata.order_id.as_deref()).await?
        else {
            return Ok(());
        };

        match transition(order.state, payment_event) {
            Err(stale) => {
                info!(order_id = %order.id, %stale, "Dropping stale delivery");
                Ok(())
            }
            Ok(Step::Stay) => {
                if payment_event == PaymentEvent::IntentCreated {
                    // Correlation key for charge/dispute events that carry no
                    // metadata of their own.
                    self.store.set_payment_intent(order.id, &intent.id).await?;
                }
                Ok(())
            }
            Ok(Step::Enter(next)) => {
                if !self.store.transition_state(order.id, order.state, next).await? {
                    info!(order_id = %order.id, "Lost the state race; dropping delivery");
                    return Ok(());
                }
                info!(order_id = %order.id, from = %order.state, to = %next, "Order state changed");
                if next == OrderState::Confirmed {
                    self.confirm_effects(&order, None).await?;
                }
                Ok(())
            }
        }
    }

    /// Charge and dispute events name no order; they resolve through the
    /// recorded payment intent.
    async fn on_correlated_event(
        &self,
        intent_id: Option<&str>,
        payment_event: PaymentEvent,
    ) -> Result<(), RepositoryError> {
        let Some(intent_id) = intent_id else {
            warn!("Event carries no payment intent; cannot correlate");
            return Ok(());
        };
        let Some(order) = self.store.find_by_payment_intent(intent_id).await? else {
            warn!(intent_id, "No order matches this payment intent");
            return Ok(());
        };

        match transition(order.state, payment_event) {
            Err(stale) => {
                info!(order_id = %order.id, %stale, "Dropping stale delivery");
                Ok(())
            }
            Ok(Step::Stay) => Ok(()),
            Ok(Step::Enter(next)) => {
                if self.store.transition_state(order.id, order.state, next).await? {
                    info!(order_id = %order.id, from = %order.state, to = %next, "Order state changed");
                }
                Ok(())
            }
        }
    }

    async fn order_from_metadata(
        &self,
        order_id: Option<&str>,
    ) -> Result<Option<Order>, RepositoryError> {
        let Some(raw) = order_id else {
            warn!("Event metadata carries no order id");
            return Ok(None);
        };
        let Ok(id) = OrderId::parse(raw) else {
            warn!(order_id = raw, "Metadata order id is not a UUID");
            return Ok(None);
        };

        let order = self.store.find_order(id).await?;
        if order.is_none() {
            warn!(order_id = raw, "Event references an unknown order");
        }
        Ok(order)
    }

    /// Everything a confirmed payment triggers: totals, correlation id,
    /// shipping address, cart teardown, stock, emails.
    ///
    /// Runs only in the delivery that won the compare-and-swap into
    /// `confirmed`, which is what makes replays harmless.
    async fn confirm_effects(
        &self,
        order: &Order,
        session: Option<&CheckoutSessionObject>,
    ) -> Result<(), RepositoryError> {
        if let Some(session) = session {
            self.record_session_financials(order, session).await?;
            self.capture_shipping(order, session).await?;
        }

        let cleared =
            self.store.clear_cart(&CartOwner::User(order.user_id).key()).await?;
        debug!(order_id = %order.id, cleared, "Cart cleared");

        let lines = self.store.line_items(order.id).await?;
        for line in &lines {
            let remaining = stock_after_purchase(line.is_manual, line.available, line.count);
            self.store.set_product_count(line.product_id, remaining).await?;
        }

        if let Some(notifier) = &self.notifier {
            // Re-read so the mail shows the totals and address written above.
            let refreshed =
                self.store.find_order(order.id).await?.unwrap_or_else(|| order.clone());
            if let Err(error) = notifier.order_confirmed(&refreshed, &lines).await {
                warn!(order_id = %order.id, %error, "Confirmation emails failed");
            }
        } else {
            debug!(order_id = %order.id, "No mailer configured; skipping confirmation emails");
        }

        info!(order_id = %order.id, "Order confirmed");
        Ok(())
    }

    /// Write the session's tax and grand total onto the order.
    ///
    /// Webhook payloads occasionally omit the totals; the full session from
    /// the API has them. A failed read-back is logged rather than failing
    /// the delivery, because at this point the state switch has already
    /// happened and a redelivery would be dropped as stale.
    async fn record_session_financials(
        &self,
        order: &Order,
        session: &CheckoutSessionObject,
    ) -> Result<(), RepositoryError> {
        let mut amount_total = session.amount_total;
        let mut amount_tax =
            session.total_details.as_ref().and_then(|details| details.amount_tax);
        let mut payment_intent = session.payment_intent.clone();

        if amount_total.is_none() {
            match self.gateway.checkout_session(&session.id).await {
                Ok(full) => {
                    amount_total = full.amount_total;
                    amount_tax = full.total_details.and_then(|details| details.amount_tax);
                    payment_intent = payment_intent.or(full.payment_intent);
                }
                Err(error) => {
                    warn!(order_id = %order.id, %error, "Could not read back the session; totals not recorded");
                }
            }
        }

        if let Some(total) = amount_total {
            let tax = amount_tax.unwrap_or(0);
            self.store
                .record_totals(order.id, from_minor_units(tax), from_minor_units(total))
                .await?;
        }

        if let Some(intent_id) = &payment_intent {
            self.store.set_payment_intent(order.id, intent_id).await?;
        }
        Ok(())
    }

    /// Persist the address Stripe collected, for orders we actually ship.
    async fn capture_shipping(
        &self,
        order: &Order,
        session: &CheckoutSessionObject,
    ) -> Result<(), RepositoryError> {
        if !order.delivery_type.requires_shipping() {
            return Ok(());
        }
        let Some(shipping) = &session.shipping_details else {
            return Ok(());
        };

        match serde_json::to_value(shipping) {
            Ok(value) => self.store.record_shipping(order.id, &value).await,
            Err(error) => {
                warn!(order_id = %order.id, %error, "Shipping details failed to serialize");
                Ok(())
            }
        }
    }
}

fn decode_object<T: DeserializeOwned>(event: &Event) -> Option<T> {
    match serde_json::from_value(event.data.object.clone()) {
        Ok(object) => Some(object),
        Err(error) => {
            warn!(event_id = %event.id, %error, "Event object failed to decode");
            None
        }
    }
}

/// Convenience alias for the production wiring.
pub type PgWebhookProcessor = WebhookProcessor<PgPool, StripeClient, EmailService>;
