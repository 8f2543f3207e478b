//! HTTP DTOs for the webhook endpoint.

use serde::Serialize;

use crate::domain::ordering::{OrderId, OrderStatus};
use crate::domain::payments::{ReconcileError, ReconcileOutcome};

/// Acknowledgement returned for every delivery the provider should not retry.
#[derive(Debug, Clone, Serialize)]
pub struct WebhookAck {
    pub received: bool,
    /// Short label of what happened (`fulfilled`, `skipped`, ...).
    pub outcome: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_id: Option<OrderId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<OrderStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl From<&ReconcileOutcome> for WebhookAck {
    fn from(outcome: &ReconcileOutcome) -> Self {
        let (order_id, status, detail) = match outcome {
            ReconcileOutcome::Fulfilled { order_id, .. }
            | ReconcileOutcome::SubscriptionLinked { order_id, .. } => (Some(*order_id), None, None),
            ReconcileOutcome::CancellationRecorded { order_id, status } => {
                (Some(*order_id), *status, None)
            }
            ReconcileOutcome::ReviewResolved { order_id, status } => {
                (Some(*order_id), Some(*status), None)
            }
            ReconcileOutcome::Skipped(reason) => (None, None, Some(reason.to_string())),
            ReconcileOutcome::AlreadyApplied { .. }
            | ReconcileOutcome::InventoryReleased { .. }
            | ReconcileOutcome::InvoiceVoided { .. } => (None, None, None),
        };
        Self {
            received: true,
            outcome: outcome.label().to_string(),
            order_id,
            status,
            detail,
        }
    }
}

/// Standard error response body.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    /// Error code for programmatic handling.
    pub error_code: String,
    /// Human-readable error message.
    pub message: String,
}

impl ErrorResponse {
    pub fn new(error_code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error_code: error_code.into(),
            message: message.into(),
        }
    }
}

impl From<&ReconcileError> for ErrorResponse {
    fn from(err: &ReconcileError) -> Self {
        Self::new(err.code(), err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::payments::SkipReason;

    #[test]
    fn skipped_ack_carries_reason() {
        let ack = WebhookAck::from(&ReconcileOutcome::Skipped(SkipReason::ForeignSource));
        let json = serde_json::to_value(&ack).unwrap();
        assert_eq!(json["outcome"], "skipped");
        assert_eq!(json["detail"], "foreign source");
        assert!(json.get("order_id").is_none());
    }

    #[test]
    fn fulfilled_ack_carries_order_id() {
        let ack = WebhookAck::from(&ReconcileOutcome::Fulfilled {
            order_id: OrderId::original(7),
            payment_id: "pi_1".into(),
            renewal: false,
        });
        let json = serde_json::to_value(&ack).unwrap();
        assert_eq!(json["order_id"], "P7-0");
        assert_eq!(json["received"], true);
    }

    #[test]
    fn error_response_uses_error_code() {
        let body = ErrorResponse::from(&ReconcileError::InvalidSignature);
        assert_eq!(body.error_code, "INVALID_SIGNATURE");
    }
}
