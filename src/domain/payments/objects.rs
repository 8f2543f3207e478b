//! Provider objects as they arrive in webhook payloads and API responses.
//!
//! Each struct captures the subset of fields reconciliation reads. Unknown
//! fields are ignored so provider API upgrades do not break parsing.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// A field that is either an id or, when requested with `expand[]`, the object.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum Expandable<T> {
    Id(String),
    Object(Box<T>),
}

// ════════════════════════════════════════════════════════════════════════════════
// Checkout
// ════════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckoutMode {
    Payment,
    Subscription,
    Setup,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct CheckoutSession {
    pub id: String,
    pub mode: CheckoutMode,
    #[serde(default)]
    pub payment_intent: Option<String>,
    #[serde(default)]
    pub subscription: Option<String>,
    /// Provider customer handle (`cus_...`).
    #[serde(default)]
    pub customer: Option<String>,
    #[serde(default)]
    pub customer_details: Option<CustomerDetails>,
    #[serde(default)]
    pub customer_email: Option<String>,
    #[serde(default)]
    pub amount_total: Option<i64>,
    #[serde(default)]
    pub payment_status: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl CheckoutSession {
    pub fn email(&self) -> Option<&str> {
        self.customer_details
            .as_ref()
            .and_then(|d| d.email.as_deref())
            .or(self.customer_email.as_deref())
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct CustomerDetails {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

// ════════════════════════════════════════════════════════════════════════════════
// Payment intents and reviews
// ════════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct PaymentIntent {
    pub id: String,
    #[serde(default)]
    pub amount: i64,
    #[serde(default)]
    pub amount_received: Option<i64>,
    #[serde(default)]
    pub status: Option<String>,
    /// Present when the intent pays a subscription invoice.
    #[serde(default)]
    pub invoice: Option<String>,
    #[serde(default)]
    pub customer: Option<String>,
    #[serde(default)]
    pub receipt_email: Option<String>,
    #[serde(default)]
    pub review: Option<Expandable<Review>>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl PaymentIntent {
    /// True when a fraud review is attached and still open.
    ///
    /// An unexpanded review reference is treated as open.
    pub fn has_open_review(&self) -> bool {
        match &self.review {
            None => false,
            Some(Expandable::Id(_)) => true,
            Some(Expandable::Object(review)) => review.open,
        }
    }

    pub fn amount_paid(&self) -> i64 {
        self.amount_received.unwrap_or(self.amount)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Review {
    pub id: String,
    #[serde(default)]
    pub open: bool,
    /// `approved`, `refunded`, `refunded_as_fraud`, `disputed`, `redacted`, or
    /// the opening reason while still open.
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub payment_intent: Option<String>,
}

impl Review {
    pub fn is_approved(&self) -> bool {
        self.reason == "approved"
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Subscriptions and invoices
// ════════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Subscription {
    pub id: String,
    #[serde(default)]
    pub customer: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub current_period_end: Option<i64>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Invoice {
    pub id: String,
    #[serde(default)]
    pub subscription: Option<String>,
    #[serde(default)]
    pub customer: Option<String>,
    #[serde(default)]
    pub customer_email: Option<String>,
    #[serde(default)]
    pub amount_paid: i64,
    /// `subscription_create`, `subscription_cycle`, ...
    #[serde(default)]
    pub billing_reason: Option<String>,
    #[serde(default)]
    pub payment_intent: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}
