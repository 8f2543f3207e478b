//! Reconciliation error taxonomy.
//!
//! Every failure carries a class. The class alone decides the HTTP status
//! returned to the provider, and therefore whether it redelivers.

use axum::http::StatusCode;
use thiserror::Error;

use crate::domain::foundation::{DomainError, ErrorCode, ValidationError};
use crate::domain::ordering::DispatchError;

/// How a failure is reported back to the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Signature or timestamp check failed.
    Authentication,
    /// Payload or header could not be understood.
    Malformed,
    /// Event is well-formed but cannot be applied; redelivery will not help.
    Precondition,
    /// Infrastructure failure; redelivery may succeed.
    Transient,
}

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("Invalid signature")]
    InvalidSignature,

    /// Signed longer ago than the tolerance window.
    #[error("Timestamp out of range")]
    TimestampOutOfRange,

    /// Signed in the future beyond allowed clock skew.
    #[error("Invalid timestamp")]
    InvalidTimestamp,

    #[error("Malformed payload: {0}")]
    Malformed(String),

    #[error("Missing field: {0}")]
    MissingField(&'static str),

    #[error("Malformed metadata: {0}")]
    MalformedMetadata(#[from] ValidationError),

    #[error("Order not found: {0}")]
    OrderNotFound(String),

    #[error("Product not found: {0}")]
    ProductNotFound(String),

    #[error("Product page not found: {0}")]
    ProductPageNotFound(String),

    #[error("Dispatch time missing for product page '{0}'")]
    DispatchTimeMissing(String),

    #[error("Customer could not be resolved: {0}")]
    CustomerUnresolved(String),

    #[error("Invalid state transition: {0}")]
    InvalidTransition(String),

    #[error("Order number contention: gave up after {0} attempts")]
    NumberingExhausted(u32),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Payment provider error: {0}")]
    Provider(String),
}

impl ReconcileError {
    pub fn class(&self) -> ErrorClass {
        use ReconcileError::*;
        match self {
            InvalidSignature | TimestampOutOfRange | InvalidTimestamp => ErrorClass::Authentication,
            Malformed(_) | MissingField(_) => ErrorClass::Malformed,
            MalformedMetadata(_)
            | OrderNotFound(_)
            | ProductNotFound(_)
            | ProductPageNotFound(_)
            | DispatchTimeMissing(_)
            | CustomerUnresolved(_)
            | InvalidTransition(_) => ErrorClass::Precondition,
            NumberingExhausted(_) | Storage(_) | Provider(_) => ErrorClass::Transient,
        }
    }

    /// Returns true if the provider should redeliver the event.
    pub fn is_retryable(&self) -> bool {
        self.class() == ErrorClass::Transient
    }

    /// True when the failure happened before the event was trusted.
    pub fn is_delivery_failure(&self) -> bool {
        matches!(self.class(), ErrorClass::Authentication | ErrorClass::Malformed)
    }

    /// Status code returned to the provider.
    ///
    /// - 2xx: acknowledged, no retry
    /// - 4xx: rejected, no retry
    /// - 5xx: retried with backoff
    pub fn status_code(&self) -> StatusCode {
        match self.class() {
            ErrorClass::Authentication => StatusCode::UNAUTHORIZED,
            ErrorClass::Malformed => StatusCode::BAD_REQUEST,
            ErrorClass::Precondition => StatusCode::OK,
            ErrorClass::Transient => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable machine-readable code for response bodies.
    pub fn code(&self) -> &'static str {
        use ReconcileError::*;
        match self {
            InvalidSignature => "INVALID_SIGNATURE",
            TimestampOutOfRange => "TIMESTAMP_OUT_OF_RANGE",
            InvalidTimestamp => "INVALID_TIMESTAMP",
            Malformed(_) => "MALFORMED_PAYLOAD",
            MissingField(_) => "MISSING_FIELD",
            MalformedMetadata(_) => "MALFORMED_METADATA",
            OrderNotFound(_) => "ORDER_NOT_FOUND",
            ProductNotFound(_) => "PRODUCT_NOT_FOUND",
            ProductPageNotFound(_) => "PRODUCT_PAGE_NOT_FOUND",
            DispatchTimeMissing(_) => "DISPATCH_TIME_MISSING",
            CustomerUnresolved(_) => "CUSTOMER_UNRESOLVED",
            InvalidTransition(_) => "INVALID_TRANSITION",
            NumberingExhausted(_) => "NUMBERING_EXHAUSTED",
            Storage(_) => "STORAGE_ERROR",
            Provider(_) => "PROVIDER_ERROR",
        }
    }
}

impl From<DomainError> for ReconcileError {
    fn from(err: DomainError) -> Self {
        match err.code {
            ErrorCode::OrderNotFound => ReconcileError::OrderNotFound(err.message),
            ErrorCode::ProductNotFound => ReconcileError::ProductNotFound(err.message),
            ErrorCode::ProductPageNotFound => ReconcileError::ProductPageNotFound(err.message),
            ErrorCode::CustomerNotFound => ReconcileError::CustomerUnresolved(err.message),
            ErrorCode::InvalidStateTransition => ReconcileError::InvalidTransition(err.message),
            _ => ReconcileError::Storage(err.to_string()),
        }
    }
}

impl From<DispatchError> for ReconcileError {
    fn from(err: DispatchError) -> Self {
        match err {
            DispatchError::Missing(slug) => ReconcileError::DispatchTimeMissing(slug),
            DispatchError::Invalid(e) => ReconcileError::MalformedMetadata(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ══════════════════════════════════════════════════════════════
    // Classification
    // ══════════════════════════════════════════════════════════════

    #[test]
    fn signature_failures_are_unauthorized() {
        for err in [
            ReconcileError::InvalidSignature,
            ReconcileError::TimestampOutOfRange,
            ReconcileError::InvalidTimestamp,
        ] {
            assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED);
            assert!(err.is_delivery_failure());
            assert!(!err.is_retryable());
        }
    }

    #[test]
    fn malformed_payload_is_bad_request() {
        let err = ReconcileError::Malformed("expected value at line 1".into());
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(ReconcileError::MissingField("payment_intent").class(), ErrorClass::Malformed);
    }

    #[test]
    fn preconditions_are_acknowledged() {
        let err = ReconcileError::DispatchTimeMissing("friday-drop".into());
        assert_eq!(err.status_code(), StatusCode::OK);
        assert!(!err.is_retryable());
        assert!(!err.is_delivery_failure());
    }

    #[test]
    fn infrastructure_failures_are_retried() {
        let err = ReconcileError::Storage("connection refused".into());
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(err.is_retryable());
        assert!(ReconcileError::NumberingExhausted(3).is_retryable());
    }

    // ══════════════════════════════════════════════════════════════
    // Conversions
    // ══════════════════════════════════════════════════════════════

    #[test]
    fn database_domain_error_becomes_storage() {
        let err: ReconcileError = DomainError::database("timeout").into();
        assert!(matches!(err, ReconcileError::Storage(_)));
    }

    #[test]
    fn not_found_domain_error_stays_precondition() {
        let err: ReconcileError = DomainError::new(ErrorCode::OrderNotFound, "P1-0").into();
        assert!(matches!(err, ReconcileError::OrderNotFound(ref id) if id == "P1-0"));
    }

    #[test]
    fn missing_dispatch_maps_to_precondition() {
        let err: ReconcileError = DispatchError::Missing("drop".into()).into();
        assert_eq!(err.code(), "DISPATCH_TIME_MISSING");
        assert_eq!(err.class(), ErrorClass::Precondition);
    }
}
