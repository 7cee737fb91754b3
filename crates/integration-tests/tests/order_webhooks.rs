//! Integration tests for the payment webhook pipeline.
//!
//! These drive the real [`WebhookProcessor`] against in-memory fakes and
//! verify the order state machine, the exactly-once confirmation effects,
//! and the handling of deliveries that cannot move anything.

use partsmith_core::{CartOwner, OrderId, OrderState, ProductId, UserId};
use partsmith_server::services::WebhookProcessor;
use rust_decimal::Decimal;
use serde_json::Value;

use partsmith_integration_tests::events;
use partsmith_integration_tests::orders::{
    MemoryOrders, RecordingNotifier, StaticSessions, line, pending_order, pickup_order,
};

type Processor = WebhookProcessor<MemoryOrders, StaticSessions, RecordingNotifier>;

fn harness() -> (MemoryOrders, StaticSessions, RecordingNotifier, Processor) {
    let store = MemoryOrders::new();
    let sessions = StaticSessions::new();
    let notifier = RecordingNotifier::new();
    let processor =
        WebhookProcessor::new(store.clone(), sessions.clone(), Some(notifier.clone()));
    (store, sessions, notifier, processor)
}

// =============================================================================
// Confirmation Effects
// =============================================================================

#[tokio::test]
async fn test_paid_session_confirms_and_runs_all_effects() {
    let (store, sessions, notifier, processor) = harness();
    let order = pending_order(7);
    let id = order.id;
    store.insert(order);
    store.add_lines(
        id,
        vec![
            line(1, 2, Some(10), false), // mirrored: eBay owns the count
            line(2, 2, Some(5), true),   // manual: decremented locally
        ],
    );
    store.seed_cart(&CartOwner::User(UserId::new(7)).key(), 2);

    let event = events::event(
        "checkout.session.completed",
        events::completed_session(id, true),
    );
    processor.process(&event).await.expect("delivery should be acknowledged");

    let order = store.order(id);
    assert_eq!(order.state, OrderState::Confirmed);
    assert_eq!(order.tax, Decimal::new(1312, 2));
    assert_eq!(order.total, Decimal::new(17310, 2));
    assert_eq!(order.stripe_payment_intent_id.as_deref(), Some("pi_77"));

    let shipping = order.shipping_address.expect("gateway address should be stored");
    assert_eq!(shipping["address"]["line1"], "9 Dock Rd");

    assert_eq!(store.cleared_carts(), vec!["u:7".to_string()]);
    assert_eq!(store.cart_lines("u:7"), 0);

    // Mirrored stock drops to zero for the sweep to restore; manual stock
    // is decremented in place.
    assert_eq!(store.count(ProductId::new(1)), Some(0));
    assert_eq!(store.count(ProductId::new(2)), Some(3));

    let sent = notifier.sent();
    assert_eq!(sent.len(), 1, "exactly one confirmation pair");
    assert_eq!(sent[0].order_id, id);
    assert_eq!(sent[0].line_count, 2);
    // The mailer sees the totals and address written moments earlier.
    assert_eq!(sent[0].total, Decimal::new(17310, 2));
    assert!(sent[0].has_shipping_address);

    // The webhook copy carried the totals, so no read-back happened.
    assert!(sessions.read_backs().is_empty());
}

#[tokio::test]
async fn test_replayed_delivery_changes_nothing() {
    let (store, _, notifier, processor) = harness();
    let order = pending_order(3);
    let id = order.id;
    store.insert(order);
    store.add_lines(id, vec![line(1, 1, Some(4), true)]);

    let event = events::event(
        "checkout.session.completed",
        events::completed_session(id, true),
    );
    processor.process(&event).await.expect("first delivery");
    processor.process(&event).await.expect("replay is still acknowledged");

    assert_eq!(store.state(id), OrderState::Confirmed);
    assert_eq!(store.transitions().len(), 1, "only the first delivery moved the order");
    assert_eq!(notifier.sent().len(), 1, "the replay sent no second mail");
}

#[tokio::test]
async fn test_manual_stock_never_goes_negative() {
    let (store, _, _, processor) = harness();
    let order = pending_order(4);
    let id = order.id;
    store.insert(order);
    store.add_lines(id, vec![line(9, 3, Some(1), true)]);

    let event = events::event(
        "checkout.session.completed",
        events::completed_session(id, true),
    );
    processor.process(&event).await.expect("delivery");

    assert_eq!(store.count(ProductId::new(9)), Some(0));
}

#[tokio::test]
async fn test_unpaid_completion_captures_the_address_and_waits() {
    let (store, _, notifier, processor) = harness();
    let order = pending_order(5);
    let id = order.id;
    store.insert(order);
    store.add_lines(id, vec![line(1, 1, Some(2), true)]);
    store.seed_cart("u:5", 1);

    // Delayed payment method: the session completes unpaid, and this is the
    // only delivery that carries the collected address.
    let unpaid = events::event(
        "checkout.session.completed",
        events::completed_session(id, false),
    );
    processor.process(&unpaid).await.expect("unpaid completion");

    let waiting = store.order(id);
    assert_eq!(waiting.state, OrderState::Pending);
    assert!(waiting.shipping_address.is_some(), "address captured while waiting");
    assert_eq!(waiting.tax, Decimal::ZERO, "no totals yet");
    assert!(notifier.sent().is_empty());
    assert_eq!(store.cart_lines("u:5"), 1, "cart survives until payment settles");

    // The bank came through.
    let settled = events::event(
        "checkout.session.async_payment_succeeded",
        events::completed_session(id, true),
    );
    processor.process(&settled).await.expect("async success");

    assert_eq!(store.state(id), OrderState::Confirmed);
    assert_eq!(notifier.sent().len(), 1);
    assert_eq!(store.cart_lines("u:5"), 0);
}

#[tokio::test]
async fn test_async_failure_closes_the_order() {
    let (store, _, notifier, processor) = harness();
    let order = pending_order(6);
    let id = order.id;
    store.insert(order);

    let event = events::event(
        "checkout.session.async_payment_failed",
        events::completed_session(id, false),
    );
    processor.process(&event).await.expect("failure delivery");

    assert_eq!(store.state(id), OrderState::PaymentFailed);
    assert!(notifier.sent().is_empty());
    assert!(store.cleared_carts().is_empty(), "failed orders keep the cart");
}

#[tokio::test]
async fn test_pickup_orders_never_record_an_address() {
    let (store, _, _, processor) = harness();
    let order = pickup_order(8);
    let id = order.id;
    store.insert(order);
    store.add_lines(id, vec![line(1, 1, Some(2), true)]);

    let event = events::event(
        "checkout.session.completed",
        events::completed_session(id, true),
    );
    processor.process(&event).await.expect("delivery");

    let order = store.order(id);
    assert_eq!(order.state, OrderState::Confirmed);
    assert!(order.shipping_address.is_none(), "pickup orders ignore the gateway address");
}

#[tokio::test]
async fn test_mail_failure_does_not_fail_the_delivery() {
    let store = MemoryOrders::new();
    let sessions = StaticSessions::new();
    let notifier = RecordingNotifier::failing();
    let processor =
        WebhookProcessor::new(store.clone(), sessions.clone(), Some(notifier.clone()));

    let order = pending_order(9);
    let id = order.id;
    store.insert(order);

    let event = events::event(
        "checkout.session.completed",
        events::completed_session(id, true),
    );
    processor.process(&event).await.expect("mail trouble must not bounce the webhook");

    assert_eq!(store.state(id), OrderState::Confirmed);
}

#[tokio::test]
async fn test_missing_mailer_confirms_without_sending() {
    let store = MemoryOrders::new();
    let sessions = StaticSessions::new();
    let processor: Processor = WebhookProcessor::new(store.clone(), sessions.clone(), None);

    let order = pending_order(10);
    let id = order.id;
    store.insert(order);

    let event = events::event(
        "checkout.session.completed",
        events::completed_session(id, true),
    );
    processor.process(&event).await.expect("delivery");

    assert_eq!(store.state(id), OrderState::Confirmed);
}

// =============================================================================
// Totals Read-Back
// =============================================================================

#[tokio::test]
async fn test_missing_totals_are_read_back_from_the_gateway() {
    let (store, sessions, _, processor) = harness();
    let order = pending_order(11);
    let id = order.id;
    store.insert(order);

    // The full session lives on the gateway; the webhook copy is thin.
    sessions.script(events::completed_session(id, true));

    let event = events::event("checkout.session.completed", events::bare_session(id));
    processor.process(&event).await.expect("delivery");

    assert_eq!(sessions.read_backs(), vec!["cs_test_1".to_string()]);
    let order = store.order(id);
    assert_eq!(order.state, OrderState::Confirmed);
    assert_eq!(order.tax, Decimal::new(1312, 2));
    assert_eq!(order.total, Decimal::new(17310, 2));
    assert_eq!(order.stripe_payment_intent_id.as_deref(), Some("pi_77"));
}

#[tokio::test]
async fn test_failed_read_back_still_confirms_the_order() {
    let (store, sessions, notifier, processor) = harness();
    let order = pending_order(12);
    let id = order.id;
    store.insert(order.clone());

    // Nothing scripted: the read-back fails.
    let event = events::event("checkout.session.completed", events::bare_session(id));
    processor.process(&event).await.expect("gateway trouble must not bounce the webhook");

    assert_eq!(sessions.read_backs().len(), 1);
    let after = store.order(id);
    assert_eq!(after.state, OrderState::Confirmed);
    assert_eq!(after.total, order.total, "totals stay at their creation values");
    assert_eq!(notifier.sent().len(), 1, "the buyer still hears about the order");
}

// =============================================================================
// Payment Intent Events
// =============================================================================

#[tokio::test]
async fn test_intent_lifecycle_drives_the_same_machine() {
    let (store, _, notifier, processor) = harness();
    let order = pending_order(13);
    let id = order.id;
    store.insert(order);

    let created = events::event(
        "payment_intent.created",
        events::payment_intent(id, "pi_90"),
    );
    processor.process(&created).await.expect("created");
    let order = store.order(id);
    assert_eq!(order.state, OrderState::Pending, "creation moves nothing");
    assert_eq!(
        order.stripe_payment_intent_id.as_deref(),
        Some("pi_90"),
        "but the correlation key is recorded"
    );

    let processing = events::event(
        "payment_intent.processing",
        events::payment_intent(id, "pi_90"),
    );
    processor.process(&processing).await.expect("processing");
    assert_eq!(store.state(id), OrderState::Processing);

    let succeeded = events::event(
        "payment_intent.succeeded",
        events::payment_intent(id, "pi_90"),
    );
    processor.process(&succeeded).await.expect("succeeded");
    assert_eq!(store.state(id), OrderState::Confirmed);
    assert_eq!(notifier.sent().len(), 1);

    assert_eq!(
        store
            .transitions()
            .iter()
            .map(|(_, from, to)| (*from, *to))
            .collect::<Vec<_>>(),
        vec![
            (OrderState::Pending, OrderState::Processing),
            (OrderState::Processing, OrderState::Confirmed),
        ]
    );
}

#[tokio::test]
async fn test_stale_intent_outcomes_do_not_reopen_settled_orders() {
    let (store, _, _, processor) = harness();
    let mut order = pending_order(14);
    order.state = OrderState::Confirmed;
    let id = order.id;
    store.insert(order);

    let failed = events::event(
        "payment_intent.payment_failed",
        events::payment_intent(id, "pi_91"),
    );
    processor.process(&failed).await.expect("stale failure is acknowledged");

    assert_eq!(store.state(id), OrderState::Confirmed);
    assert!(store.transitions().is_empty());
}

// =============================================================================
// Refunds and Disputes
// =============================================================================

#[tokio::test]
async fn test_refunds_resolve_through_the_recorded_intent() {
    let (store, _, _, processor) = harness();
    let mut order = pending_order(15);
    order.state = OrderState::Confirmed;
    order.stripe_payment_intent_id = Some("pi_42".to_string());
    let id = order.id;
    store.insert(order);

    let refund = events::event("charge.refunded", events::charge(Some("pi_42")));
    processor.process(&refund).await.expect("refund");
    assert_eq!(store.state(id), OrderState::Refunded);

    // Partial refunds replay the same event type; once is enough.
    processor.process(&refund).await.expect("replay");
    assert_eq!(store.transitions().len(), 1);
}

#[tokio::test]
async fn test_disputes_resolve_through_the_recorded_intent() {
    let (store, _, _, processor) = harness();
    let mut order = pending_order(16);
    order.state = OrderState::Confirmed;
    order.stripe_payment_intent_id = Some("pi_43".to_string());
    let id = order.id;
    store.insert(order);

    let dispute = events::event("charge.dispute.created", events::dispute(Some("pi_43")));
    processor.process(&dispute).await.expect("dispute");

    assert_eq!(store.state(id), OrderState::Disputed);
}

#[tokio::test]
async fn test_uncorrelated_charges_are_acknowledged() {
    let (store, _, _, processor) = harness();
    let mut order = pending_order(17);
    order.state = OrderState::Confirmed;
    order.stripe_payment_intent_id = Some("pi_44".to_string());
    let id = order.id;
    store.insert(order);

    // No payment intent on the charge at all.
    let anonymous = events::event("charge.refunded", events::charge(None));
    processor.process(&anonymous).await.expect("acknowledged");

    // An intent no order has ever recorded.
    let stranger = events::event("charge.refunded", events::charge(Some("pi_9999")));
    processor.process(&stranger).await.expect("acknowledged");

    assert_eq!(store.state(id), OrderState::Confirmed);
    assert!(store.transitions().is_empty());
}

// =============================================================================
// Deliveries That Move Nothing
// =============================================================================

#[tokio::test]
async fn test_expired_sessions_close_the_order_quietly() {
    let (store, _, notifier, processor) = harness();
    let order = pending_order(18);
    let id = order.id;
    store.insert(order);
    store.seed_cart("u:18", 3);

    let event = events::event(
        "checkout.session.expired",
        events::completed_session(id, false),
    );
    processor.process(&event).await.expect("expiry");

    assert_eq!(store.state(id), OrderState::Expired);
    assert!(notifier.sent().is_empty());
    assert_eq!(store.cart_lines("u:18"), 3, "an abandoned checkout keeps the cart");
}

#[tokio::test]
async fn test_unknown_event_types_are_acknowledged() {
    let (store, _, _, processor) = harness();

    let event = events::event("customer.created", serde_json::json!({ "id": "cus_1" }));
    processor.process(&event).await.expect("unknown types are fine");

    assert!(store.transitions().is_empty());
}

#[tokio::test]
async fn test_events_that_name_no_usable_order_are_acknowledged() {
    let (store, _, _, processor) = harness();
    let order = pending_order(19);
    let id = order.id;
    store.insert(order);

    // Metadata missing entirely.
    let mut object = events::completed_session(id, true);
    object.as_object_mut().unwrap().remove("metadata");
    let no_metadata = events::event("checkout.session.completed", object);
    processor.process(&no_metadata).await.expect("acknowledged");

    // Metadata present but not a UUID.
    let mut object = events::completed_session(id, true);
    object["metadata"]["orderId"] = Value::String("not-a-uuid".to_string());
    let garbled = events::event("checkout.session.completed", object);
    processor.process(&garbled).await.expect("acknowledged");

    // A UUID no order has.
    let unknown = events::event(
        "checkout.session.completed",
        events::completed_session(OrderId::new(), true),
    );
    processor.process(&unknown).await.expect("acknowledged");

    assert_eq!(store.state(id), OrderState::Pending, "the real order never moved");
}

#[tokio::test]
async fn test_undecodable_objects_are_acknowledged() {
    let (store, _, _, processor) = harness();

    // A session object with the wrong shape entirely.
    let event = events::event("checkout.session.completed", Value::String("junk".to_string()));
    processor.process(&event).await.expect("acknowledged");

    assert!(store.transitions().is_empty());
}
