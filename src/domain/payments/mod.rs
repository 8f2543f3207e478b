//! Payments domain - webhook authentication, provider objects and the
//! vocabulary of reconciliation results.

mod errors;
mod event;
mod objects;
mod outcome;
mod stripe_event;
mod verifier;

pub use errors::{ErrorClass, ReconcileError};
pub use event::PaymentEvent;
pub use objects::{
    CheckoutMode, CheckoutSession, CustomerDetails, Expandable, Invoice, PaymentIntent, Review,
    Subscription,
};
pub use outcome::{ReconcileOutcome, SkipReason};
pub use stripe_event::{StripeEvent, StripeEventData};
pub use verifier::{
    sign_payload, SignatureHeader, StripeWebhookVerifier, DEFAULT_TOLERANCE_SECS, SIGNATURE_HEADER,
};

#[cfg(test)]
pub(crate) use stripe_event::StripeEventBuilder;
