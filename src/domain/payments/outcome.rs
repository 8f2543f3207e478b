//! Successful results of reconciling one event.

use std::fmt;

use crate::domain::ordering::{OrderId, OrderStatus};

/// Why an event was acknowledged without touching the ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// Object lacks our source marker.
    ForeignSource,
    /// Test-mode event delivered to a live-only endpoint.
    TestModeEvent,
    UnrecognizedEvent(String),
    /// Payment intent not tied to a subscription invoice.
    NotInvoiceLinked,
    /// Subscription checkout whose subscription has no order yet.
    NoOrderReference,
    CartHoldInactive,
    /// Expired checkout that held no stock.
    NoReservation,
    /// Redelivered expiry whose hold was already returned.
    HoldAlreadyReleased,
    /// Checkout mode the storefront never creates.
    UnsupportedMode,
    /// Review or cancellation arrived for an order not in the expected state.
    StatusUnchanged,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::ForeignSource => write!(f, "foreign source"),
            SkipReason::TestModeEvent => write!(f, "test-mode event"),
            SkipReason::UnrecognizedEvent(kind) => write!(f, "unrecognized event type {}", kind),
            SkipReason::NotInvoiceLinked => write!(f, "payment not linked to an invoice"),
            SkipReason::NoOrderReference => write!(f, "no order reference in metadata"),
            SkipReason::CartHoldInactive => write!(f, "cart hold inactive"),
            SkipReason::NoReservation => write!(f, "no stock reservation"),
            SkipReason::HoldAlreadyReleased => write!(f, "hold already released"),
            SkipReason::UnsupportedMode => write!(f, "unsupported checkout mode"),
            SkipReason::StatusUnchanged => write!(f, "status unchanged"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// A new order was written.
    Fulfilled {
        order_id: OrderId,
        payment_id: String,
        renewal: bool,
    },
    /// The payment was already settled by an earlier delivery.
    AlreadyApplied { payment_id: String },
    SubscriptionLinked {
        order_id: OrderId,
        subscription_id: String,
    },
    InventoryReleased { product_name: String, quantity: u32 },
    CancellationRecorded {
        order_id: OrderId,
        status: Option<OrderStatus>,
    },
    InvoiceVoided { invoice_id: String },
    ReviewResolved {
        order_id: OrderId,
        status: OrderStatus,
    },
    Skipped(SkipReason),
}

impl ReconcileOutcome {
    /// Short label for logs and response bodies.
    pub fn label(&self) -> &'static str {
        match self {
            ReconcileOutcome::Fulfilled { .. } => "fulfilled",
            ReconcileOutcome::AlreadyApplied { .. } => "already_applied",
            ReconcileOutcome::SubscriptionLinked { .. } => "subscription_linked",
            ReconcileOutcome::InventoryReleased { .. } => "inventory_released",
            ReconcileOutcome::CancellationRecorded { .. } => "cancellation_recorded",
            ReconcileOutcome::InvoiceVoided { .. } => "invoice_voided",
            ReconcileOutcome::ReviewResolved { .. } => "review_resolved",
            ReconcileOutcome::Skipped(_) => "skipped",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_are_snake_case() {
        let outcome = ReconcileOutcome::AlreadyApplied {
            payment_id: "pi_1".into(),
        };
        assert_eq!(outcome.label(), "already_applied");
        assert_eq!(ReconcileOutcome::Skipped(SkipReason::ForeignSource).label(), "skipped");
    }

    #[test]
    fn skip_reason_display_includes_kind() {
        let reason = SkipReason::UnrecognizedEvent("charge.refunded".into());
        assert_eq!(reason.to_string(), "unrecognized event type charge.refunded");
    }
}
