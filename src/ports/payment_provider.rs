//! PaymentProvider port - object reads and writes against the payment provider.
//!
//! Webhooks carry only a snapshot of the triggering object; the reconciler
//! reads related objects (the invoice behind a payment, the subscription
//! behind an invoice) through this port.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::domain::payments::{Invoice, PaymentIntent, ReconcileError, Subscription};

#[async_trait]
pub trait PaymentProvider: Send + Sync {
    async fn get_subscription(&self, subscription_id: &str) -> Result<Subscription, PaymentError>;

    async fn get_invoice(&self, invoice_id: &str) -> Result<Invoice, PaymentError>;

    /// Reads a payment intent with its review expanded.
    async fn get_payment_intent(&self, payment_intent_id: &str) -> Result<PaymentIntent, PaymentError>;

    /// Merges `metadata` into the subscription's metadata.
    async fn update_subscription_metadata(
        &self,
        subscription_id: &str,
        metadata: &HashMap<String, String>,
    ) -> Result<(), PaymentError>;

    async fn void_invoice(&self, invoice_id: &str) -> Result<(), PaymentError>;

    /// Cancels the subscription immediately.
    async fn delete_subscription(&self, subscription_id: &str) -> Result<(), PaymentError>;
}

/// Payment provider error.
#[derive(Debug, Clone)]
pub struct PaymentError {
    pub code: PaymentErrorCode,

    pub message: String,

    /// Provider's own error code, when it sent one.
    pub provider_code: Option<String>,

    /// Whether the operation can be retried.
    pub retryable: bool,
}

impl PaymentError {
    pub fn new(code: PaymentErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            provider_code: None,
            retryable: code.is_retryable(),
        }
    }

    pub fn with_provider_code(mut self, code: impl Into<String>) -> Self {
        self.provider_code = Some(code.into());
        self
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(PaymentErrorCode::NetworkError, message)
    }

    pub fn not_found(resource: &str) -> Self {
        Self::new(PaymentErrorCode::NotFound, format!("{} not found", resource))
    }
}

impl std::fmt::Display for PaymentError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for PaymentError {}

/// Provider failures are reported as transient: the provider redelivers and
/// the read or write is attempted again.
impl From<PaymentError> for ReconcileError {
    fn from(err: PaymentError) -> Self {
        ReconcileError::Provider(err.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentErrorCode {
    NetworkError,
    AuthenticationError,
    RateLimitExceeded,
    NotFound,
    InvalidRequest,
    ProviderError,
}

impl PaymentErrorCode {
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            PaymentErrorCode::NetworkError
                | PaymentErrorCode::RateLimitExceeded
                | PaymentErrorCode::ProviderError
        )
    }
}

impl std::fmt::Display for PaymentErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PaymentErrorCode::NetworkError => "network_error",
            PaymentErrorCode::AuthenticationError => "authentication_error",
            PaymentErrorCode::RateLimitExceeded => "rate_limit_exceeded",
            PaymentErrorCode::NotFound => "not_found",
            PaymentErrorCode::InvalidRequest => "invalid_request",
            PaymentErrorCode::ProviderError => "provider_error",
        };
        write!(f, "{}", s)
    }
}
