//! Order aggregate.
//!
//! An order is written once, when a payment settles, and afterwards only its
//! status, external subscription id and forward chain pointer change.

use serde::{Deserialize, Serialize};

use super::{OrderId, OrderStatus};
use crate::domain::foundation::{CustomerId, StateMachine, Timestamp};

/// Hours before expiry inside which a cancelled subscription keeps its status.
pub const CANCELLATION_GRACE_HOURS: i64 = 4;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub order_id: OrderId,
    /// Provider payment reference; unique across the ledger.
    pub payment_id: String,
    pub customer_id: CustomerId,
    pub product_name: String,
    pub status: OrderStatus,
    pub payment_status: String,
    pub quantity: u32,
    /// Service length in days.
    pub length: u32,
    /// Amount paid in minor currency units.
    pub total: i64,
    pub location: Option<String>,
    pub dispatch_time: Option<Timestamp>,
    /// Referral tag.
    pub note: Option<String>,
    pub coupon_name: Option<String>,
    /// Provider subscription id while the subscription is live.
    pub ecom_order_id: Option<String>,
    pub last_chain: Option<OrderId>,
    pub next_chain: Option<OrderId>,
    pub expiry: Option<Timestamp>,
    pub created_at: Timestamp,
}

/// Everything needed to write a new order, minus its number.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderDraft {
    pub payment_id: String,
    pub customer_id: CustomerId,
    pub product_name: String,
    pub status: OrderStatus,
    pub payment_status: String,
    pub quantity: u32,
    pub length: u32,
    pub total: i64,
    pub location: Option<String>,
    pub dispatch_time: Option<Timestamp>,
    pub note: Option<String>,
    pub coupon_name: Option<String>,
    pub ecom_order_id: Option<String>,
}

impl Order {
    /// Materializes a draft under the given number.
    ///
    /// Expiry counts `length` days from dispatch, or from `now` when the
    /// order ships immediately or the dispatch time has already passed.
    pub fn from_draft(
        order_id: OrderId,
        draft: OrderDraft,
        last_chain: Option<OrderId>,
        now: Timestamp,
    ) -> Self {
        let start = match draft.dispatch_time {
            Some(dispatch) if dispatch.is_after(&now) => dispatch,
            _ => now,
        };
        Self {
            order_id,
            payment_id: draft.payment_id,
            customer_id: draft.customer_id,
            product_name: draft.product_name,
            status: draft.status,
            payment_status: draft.payment_status,
            quantity: draft.quantity,
            length: draft.length,
            total: draft.total,
            location: draft.location,
            dispatch_time: draft.dispatch_time,
            note: draft.note,
            coupon_name: draft.coupon_name,
            ecom_order_id: draft.ecom_order_id,
            last_chain,
            next_chain: None,
            expiry: Some(start.plus_days(i64::from(draft.length))),
            created_at: now,
        }
    }

    /// True when this order is the newest link of its chain.
    pub fn is_chain_head(&self) -> bool {
        self.next_chain.is_none()
    }

    /// Status an order moves to when its fraud review closes.
    ///
    /// Returns `None` when the order is no longer under review.
    pub fn review_outcome(&self, approved: bool) -> Option<OrderStatus> {
        if self.status != OrderStatus::Review {
            return None;
        }
        let target = if approved {
            OrderStatus::AwaitingProcessing
        } else {
            OrderStatus::Expired
        };
        self.status.transition_to(target).ok()
    }

    /// Status an order moves to when its subscription is deleted.
    ///
    /// Only orders the status graph lets into `AWAITING_EXPIRY` (active ones)
    /// with more than the grace window left are marked; an order expiring
    /// within the window is left to lapse naturally.
    pub fn cancellation_outcome(&self, now: Timestamp) -> Option<OrderStatus> {
        let threshold = now.plus_hours(CANCELLATION_GRACE_HOURS);
        match self.expiry {
            Some(expiry) if expiry.is_after(&threshold) => {
                self.status.transition_to(OrderStatus::AwaitingExpiry).ok()
            }
            _ => None,
        }
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;

    // ══════════════════════════════════════════════════════════════
    // Creation
    // ══════════════════════════════════════════════════════════════

    #[test]
    fn expiry_counts_from_now_without_dispatch() {
        let now = Timestamp::from_unix_secs(1_700_000_000).unwrap();
        let order = Order::from_draft(OrderId::original(7), draft("pi_a"), None, now);
        assert_eq!(order.expiry, Some(now.plus_days(30)));
        assert!(order.is_chain_head());
        assert_eq!(order.created_at, now);
    }

    #[test]
    fn expiry_counts_from_future_dispatch() {
        let now = Timestamp::from_unix_secs(1_700_000_000).unwrap();
        let dispatch = now.plus_days(3);
        let mut d = draft("pi_b");
        d.dispatch_time = Some(dispatch);
        let order = Order::from_draft(OrderId::original(7), d, None, now);
        assert_eq!(order.expiry, Some(dispatch.plus_days(30)));
    }

    #[test]
    fn renewal_records_predecessor() {
        let order = Order::from_draft(
            OrderId::renewal_of(7, 1),
            draft("pi_c"),
            Some(OrderId::original(7)),
            Timestamp::now(),
        );
        assert_eq!(order.last_chain, Some(OrderId::original(7)));
        assert_eq!(order.next_chain, None);
    }

    // ══════════════════════════════════════════════════════════════
    // Review
    // ══════════════════════════════════════════════════════════════

    #[test]
    fn approved_review_moves_to_processing() {
        let order = order_with(OrderStatus::Review, None);
        assert_eq!(order.review_outcome(true), Some(OrderStatus::AwaitingProcessing));
    }

    #[test]
    fn rejected_review_expires() {
        let order = order_with(OrderStatus::Review, None);
        assert_eq!(order.review_outcome(false), Some(OrderStatus::Expired));
    }

    #[test]
    fn review_outcome_is_noop_outside_review() {
        let order = order_with(OrderStatus::Active, None);
        assert_eq!(order.review_outcome(true), None);
        assert_eq!(order.review_outcome(false), None);
    }

    // ══════════════════════════════════════════════════════════════
    // Cancellation grace window
    // ══════════════════════════════════════════════════════════════

    #[test]
    fn cancellation_marks_active_order_well_before_expiry() {
        let now = Timestamp::from_unix_secs(1_700_000_000).unwrap();
        let order = order_with(OrderStatus::Active, Some(now.plus_days(10)));
        assert_eq!(order.cancellation_outcome(now), Some(OrderStatus::AwaitingExpiry));
    }

    #[test]
    fn cancellation_at_exactly_four_hours_leaves_status() {
        let now = Timestamp::from_unix_secs(1_700_000_000).unwrap();
        let order = order_with(OrderStatus::Active, Some(now.plus_hours(4)));
        assert_eq!(order.cancellation_outcome(now), None);
    }

    #[test]
    fn cancellation_one_second_past_window_marks_order() {
        let now = Timestamp::from_unix_secs(1_700_000_000).unwrap();
        let expiry = Timestamp::from_unix_secs(1_700_000_000 + 4 * 3600 + 1).unwrap();
        let order = order_with(OrderStatus::Active, Some(expiry));
        assert_eq!(order.cancellation_outcome(now), Some(OrderStatus::AwaitingExpiry));
    }

    #[test]
    fn cancellation_ignores_non_active_orders() {
        let now = Timestamp::from_unix_secs(1_700_000_000).unwrap();
        let order = order_with(OrderStatus::AwaitingProcessing, Some(now.plus_days(10)));
        assert_eq!(order.cancellation_outcome(now), None);
    }

    #[test]
    fn cancellation_follows_status_graph() {
        let now = Timestamp::from_unix_secs(1_700_000_000).unwrap();
        let far = Some(now.plus_days(10));
        for status in OrderStatus::ALL {
            let expected = status
                .can_transition_to(&OrderStatus::AwaitingExpiry)
                .then_some(OrderStatus::AwaitingExpiry);
            assert_eq!(order_with(status, far).cancellation_outcome(now), expected, "{}", status);
        }
    }
}
