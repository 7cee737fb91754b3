//! Order lifecycle state machine.
//!
//! Orders move through their lifecycle exclusively in response to payment
//! gateway webhook events. The transition rules live here as a pure function
//! over ([`OrderState`], [`PaymentEvent`]) so they can be tested without a
//! database or a gateway, and so every handler shares one source of truth
//! about which deliveries are stale.
//!
//! Webhook systems deliver at-least-once: the same event can arrive twice,
//! and late events can arrive after the order has already settled. The
//! machine is therefore monotonic - once an order reaches a settled state,
//! the only moves left are the post-settlement ones to `Refunded` and
//! `Disputed`. A delivery that would rewind the order is reported as
//! [`Stale`] and must be dropped without side effects; this is what makes
//! the financial side effects of confirmation (stock decrement, cart clear,
//! email) at-most-once.

use serde::{Deserialize, Serialize};

/// Lifecycle state of an order.
///
/// `Pending` is set at creation. `Processing` covers slow payment methods
/// where the gateway has accepted the intent but funds have not settled.
/// The remaining states are settled: no event moves an order out of them,
/// except that a settled order can still become `Refunded` or `Disputed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderState {
    Pending,
    Processing,
    Confirmed,
    PaymentFailed,
    Canceled,
    Expired,
    Refunded,
    Disputed,
}

impl OrderState {
    /// True once payment has been resolved one way or the other.
    ///
    /// Settled orders never move backwards; see [`transition`].
    #[must_use]
    pub const fn is_settled(self) -> bool {
        !matches!(self, Self::Pending | Self::Processing)
    }
}

impl std::fmt::Display for OrderState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Confirmed => "confirmed",
            Self::PaymentFailed => "payment_failed",
            Self::Canceled => "canceled",
            Self::Expired => "expired",
            Self::Refunded => "refunded",
            Self::Disputed => "disputed",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for OrderState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "processing" => Ok(Self::Processing),
            "confirmed" => Ok(Self::Confirmed),
            "payment_failed" => Ok(Self::PaymentFailed),
            "canceled" => Ok(Self::Canceled),
            "expired" => Ok(Self::Expired),
            "refunded" => Ok(Self::Refunded),
            "disputed" => Ok(Self::Disputed),
            _ => Err(format!("invalid order state: {s}")),
        }
    }
}

/// A gateway event, reduced to what the state machine cares about.
///
/// The webhook layer maps Stripe event types onto these variants;
/// `checkout.session.completed` carries its `payment_status` as `paid`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentEvent {
    SessionCompleted { paid: bool },
    AsyncPaymentSucceeded,
    AsyncPaymentFailed,
    SessionExpired,
    IntentSucceeded,
    IntentFailed,
    IntentCanceled,
    IntentCreated,
    IntentProcessing,
    ChargeRefunded,
    DisputeCreated,
}

/// Outcome of a successful transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Move the order to this state (and run the state's side effects).
    Enter(OrderState),
    /// The event is valid for this order but changes no state; ancillary
    /// bookkeeping (correlation id, shipping capture) may still apply.
    Stay,
}

/// A delivery the machine refuses: duplicate or out of order.
///
/// Stale deliveries are logged and acknowledged; running their side effects
/// would re-apply financial state that has already been applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("stale delivery of {event:?} for order in state {current}")]
pub struct Stale {
    /// State the order was observed in.
    pub current: OrderState,
    /// The event that was dropped.
    pub event: PaymentEvent,
}

/// Apply a gateway event to the current order state.
///
/// Pure: callers persist the result with a compare-and-swap on the observed
/// state so concurrent deliveries cannot both win.
///
/// # Errors
///
/// Returns [`Stale`] when the event would rewind the order or duplicate a
/// settled outcome.
pub fn transition(current: OrderState, event: PaymentEvent) -> Result<Step, Stale> {
    use OrderState as S;
    use PaymentEvent as E;

    let stale = Err(Stale { current, event });

    match event {
        // Payment settled in our favor. Only an unsettled order may confirm;
        // a replayed success against a confirmed order is a duplicate.
        E::SessionCompleted { paid: true } | E::AsyncPaymentSucceeded | E::IntentSucceeded => {
            match current {
                S::Pending | S::Processing => Ok(Step::Enter(S::Confirmed)),
                _ => stale,
            }
        }

        // Session completed but the payment method is still settling; the
        // async_payment_* events carry the real outcome later.
        E::SessionCompleted { paid: false } => Ok(Step::Stay),

        E::AsyncPaymentFailed | E::IntentFailed => match current {
            S::Pending | S::Processing => Ok(Step::Enter(S::PaymentFailed)),
            _ => stale,
        },

        E::SessionExpired => match current {
            S::Pending | S::Processing => Ok(Step::Enter(S::Expired)),
            _ => stale,
        },

        E::IntentCanceled => match current {
            S::Pending | S::Processing => Ok(Step::Enter(S::Canceled)),
            _ => stale,
        },

        // Bookkeeping only: the intent id becomes the correlation key for
        // later charge/dispute events.
        E::IntentCreated => Ok(Step::Stay),

        E::IntentProcessing => match current {
            S::Pending => Ok(Step::Enter(S::Processing)),
            _ => stale,
        },

        // Money moved back out after settlement. The gateway is the system
        // of record here, so no predecessor check beyond de-duplication.
        E::ChargeRefunded => match current {
            S::Refunded => stale,
            _ => Ok(Step::Enter(S::Refunded)),
        },

        E::DisputeCreated => match current {
            S::Disputed => stale,
            _ => Ok(Step::Enter(S::Disputed)),
        },
    }
}

/// Stock left on a product after a confirmed order, per line item.
///
/// Remote-sourced products (`is_manual = false`) drop to zero outright: eBay
/// owns their inventory and the next reconciliation sweep restores the real
/// figure. Manually managed stock is decremented by the ordered quantity,
/// floored at zero. A count that was never recorded is treated as zero.
#[must_use]
pub fn stock_after_purchase(is_manual: bool, current_count: Option<i32>, ordered: i32) -> i32 {
    if !is_manual {
        return 0;
    }
    current_count.unwrap_or(0).saturating_sub(ordered.max(0)).max(0)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use OrderState as S;
    use PaymentEvent as E;

    const SUCCESS_EVENTS: [E; 3] = [
        E::SessionCompleted { paid: true },
        E::AsyncPaymentSucceeded,
        E::IntentSucceeded,
    ];

    #[test]
    fn pending_and_processing_confirm_on_success() {
        for event in SUCCESS_EVENTS {
            assert_eq!(
                transition(S::Pending, event),
                Ok(Step::Enter(S::Confirmed))
            );
            assert_eq!(
                transition(S::Processing, event),
                Ok(Step::Enter(S::Confirmed))
            );
        }
    }

    #[test]
    fn replayed_success_is_stale_once_confirmed() {
        for event in SUCCESS_EVENTS {
            let err = transition(S::Confirmed, event).unwrap_err();
            assert_eq!(err.current, S::Confirmed);
        }
    }

    #[test]
    fn success_never_resurrects_a_failed_order() {
        for settled in [S::PaymentFailed, S::Canceled, S::Expired, S::Refunded, S::Disputed] {
            for event in SUCCESS_EVENTS {
                assert!(transition(settled, event).is_err());
            }
        }
    }

    #[test]
    fn unpaid_completion_changes_nothing() {
        for state in [S::Pending, S::Processing, S::Confirmed, S::Expired] {
            assert_eq!(
                transition(state, E::SessionCompleted { paid: false }),
                Ok(Step::Stay)
            );
        }
    }

    #[test]
    fn failure_paths_from_unsettled_states() {
        assert_eq!(
            transition(S::Pending, E::AsyncPaymentFailed),
            Ok(Step::Enter(S::PaymentFailed))
        );
        assert_eq!(
            transition(S::Processing, E::IntentFailed),
            Ok(Step::Enter(S::PaymentFailed))
        );
        assert_eq!(
            transition(S::Pending, E::SessionExpired),
            Ok(Step::Enter(S::Expired))
        );
        assert_eq!(
            transition(S::Processing, E::IntentCanceled),
            Ok(Step::Enter(S::Canceled))
        );
    }

    #[test]
    fn late_failure_after_confirmation_is_stale() {
        for event in [E::AsyncPaymentFailed, E::IntentFailed, E::SessionExpired, E::IntentCanceled]
        {
            assert!(transition(S::Confirmed, event).is_err());
        }
    }

    #[test]
    fn processing_only_enters_from_pending() {
        assert_eq!(
            transition(S::Pending, E::IntentProcessing),
            Ok(Step::Enter(S::Processing))
        );
        // A confirmed order must remain confirmed.
        assert!(transition(S::Confirmed, E::IntentProcessing).is_err());
        assert!(transition(S::Processing, E::IntentProcessing).is_err());
    }

    #[test]
    fn intent_created_is_bookkeeping_everywhere() {
        for state in [S::Pending, S::Processing, S::Confirmed, S::Refunded] {
            assert_eq!(transition(state, E::IntentCreated), Ok(Step::Stay));
        }
    }

    #[test]
    fn refund_and_dispute_apply_after_settlement() {
        assert_eq!(
            transition(S::Confirmed, E::ChargeRefunded),
            Ok(Step::Enter(S::Refunded))
        );
        assert_eq!(
            transition(S::Confirmed, E::DisputeCreated),
            Ok(Step::Enter(S::Disputed))
        );
        // Exact duplicates are dropped.
        assert!(transition(S::Refunded, E::ChargeRefunded).is_err());
        assert!(transition(S::Disputed, E::DisputeCreated).is_err());
        // A disputed order can still end up refunded.
        assert_eq!(
            transition(S::Disputed, E::ChargeRefunded),
            Ok(Step::Enter(S::Refunded))
        );
    }

    #[test]
    fn state_round_trips_through_strings() {
        for state in [
            S::Pending,
            S::Processing,
            S::Confirmed,
            S::PaymentFailed,
            S::Canceled,
            S::Expired,
            S::Refunded,
            S::Disputed,
        ] {
            let text = state.to_string();
            assert_eq!(text.parse::<OrderState>().unwrap(), state);
            // serde and Display agree on the wire form
            assert_eq!(serde_json::to_string(&state).unwrap(), format!("\"{text}\""));
        }
        assert!("paid".parse::<OrderState>().is_err());
    }

    #[test]
    fn settled_classification() {
        assert!(!S::Pending.is_settled());
        assert!(!S::Processing.is_settled());
        for state in [S::Confirmed, S::PaymentFailed, S::Canceled, S::Expired, S::Refunded] {
            assert!(state.is_settled());
        }
    }

    #[test]
    fn remote_stock_zeroes_out() {
        assert_eq!(stock_after_purchase(false, Some(17), 2), 0);
        assert_eq!(stock_after_purchase(false, None, 1), 0);
    }

    #[test]
    fn manual_stock_decrements_with_floor() {
        assert_eq!(stock_after_purchase(true, Some(5), 2), 3);
        assert_eq!(stock_after_purchase(true, Some(2), 5), 0);
        assert_eq!(stock_after_purchase(true, None, 1), 0);
        // A malformed negative quantity cannot inflate stock.
        assert_eq!(stock_after_purchase(true, Some(5), -3), 5);
    }
}
