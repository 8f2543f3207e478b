//! Typed payment events.

use super::errors::ReconcileError;
use super::objects::{CheckoutSession, Invoice, PaymentIntent, Review, Subscription};
use super::stripe_event::StripeEvent;

/// Every event kind the reconciler acts on, plus a catch-all.
#[derive(Debug, Clone, PartialEq)]
pub enum PaymentEvent {
    CheckoutCompleted(CheckoutSession),
    CheckoutExpired(CheckoutSession),
    PaymentSucceeded(PaymentIntent),
    SubscriptionDeleted(Subscription),
    InvoiceUncollectible(Invoice),
    ReviewClosed(Review),
    /// Acknowledged and ignored.
    Unrecognized(String),
}

impl PaymentEvent {
    pub const CHECKOUT_COMPLETED: &'static str = "checkout.session.completed";
    pub const CHECKOUT_EXPIRED: &'static str = "checkout.session.expired";
    pub const PAYMENT_SUCCEEDED: &'static str = "payment_intent.succeeded";
    pub const SUBSCRIPTION_DELETED: &'static str = "customer.subscription.deleted";
    pub const INVOICE_UNCOLLECTIBLE: &'static str = "invoice.marked_uncollectible";
    pub const REVIEW_CLOSED: &'static str = "review.closed";

    /// Decodes the envelope's data object according to its event type.
    pub fn from_envelope(event: &StripeEvent) -> Result<Self, ReconcileError> {
        let malformed = |e: serde_json::Error| {
            ReconcileError::Malformed(format!("{} object: {}", event.event_type, e))
        };

        Ok(match event.event_type.as_str() {
            Self::CHECKOUT_COMPLETED => Self::CheckoutCompleted(event.deserialize_object().map_err(malformed)?),
            Self::CHECKOUT_EXPIRED => Self::CheckoutExpired(event.deserialize_object().map_err(malformed)?),
            Self::PAYMENT_SUCCEEDED => Self::PaymentSucceeded(event.deserialize_object().map_err(malformed)?),
            Self::SUBSCRIPTION_DELETED => {
                Self::SubscriptionDeleted(event.deserialize_object().map_err(malformed)?)
            }
            Self::INVOICE_UNCOLLECTIBLE => {
                Self::InvoiceUncollectible(event.deserialize_object().map_err(malformed)?)
            }
            Self::REVIEW_CLOSED => Self::ReviewClosed(event.deserialize_object().map_err(malformed)?),
            other => Self::Unrecognized(other.to_string()),
        })
    }

    pub fn kind(&self) -> &str {
        match self {
            Self::CheckoutCompleted(_) => Self::CHECKOUT_COMPLETED,
            Self::CheckoutExpired(_) => Self::CHECKOUT_EXPIRED,
            Self::PaymentSucceeded(_) => Self::PAYMENT_SUCCEEDED,
            Self::SubscriptionDeleted(_) => Self::SUBSCRIPTION_DELETED,
            Self::InvoiceUncollectible(_) => Self::INVOICE_UNCOLLECTIBLE,
            Self::ReviewClosed(_) => Self::REVIEW_CLOSED,
            Self::Unrecognized(kind) => kind,
        }
    }
}
