//! HTTP handlers for payment-provider webhooks.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};

use crate::application::{ReconcilePaymentEventCommand, ReconcilePaymentEventHandler};
use crate::domain::payments::{ErrorClass, ReconcileError, SIGNATURE_HEADER};

use super::dto::{ErrorResponse, WebhookAck};

/// Application state for webhook endpoints.
#[derive(Clone)]
pub struct WebhookAppState {
    pub handler: Arc<ReconcilePaymentEventHandler>,
}

impl WebhookAppState {
    pub fn new(handler: ReconcilePaymentEventHandler) -> Self {
        Self {
            handler: Arc::new(handler),
        }
    }
}

/// POST /api/webhooks/stripe - Reconcile one provider event.
///
/// The body is taken as raw bytes; the signature covers the exact payload.
/// A missing or non-ASCII signature header is left for the handler to reject.
pub async fn handle_stripe_webhook(
    State(state): State<WebhookAppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookAck>, WebhookApiError> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let cmd = ReconcilePaymentEventCommand {
        payload: body.to_vec(),
        signature,
    };

    let outcome = state.handler.handle(cmd).await?;
    Ok(Json(WebhookAck::from(&outcome)))
}

/// GET /health - Liveness probe.
pub async fn health() -> impl IntoResponse {
    (StatusCode::OK, Json(serde_json::json!({ "status": "ok" })))
}

// ════════════════════════════════════════════════════════════════════════════════
// Error Handling
// ════════════════════════════════════════════════════════════════════════════════

/// API error type that converts reconciliation failures to HTTP responses.
///
/// Precondition failures are acknowledged with 200 so the provider does not
/// redeliver an event that can never succeed.
#[derive(Debug)]
pub struct WebhookApiError(ReconcileError);

impl From<ReconcileError> for WebhookApiError {
    fn from(err: ReconcileError) -> Self {
        Self(err)
    }
}

impl IntoResponse for WebhookApiError {
    fn into_response(self) -> Response {
        let status = self.0.status_code();
        let body = ErrorResponse::from(&self.0);
        if self.0.class() == ErrorClass::Transient {
            // Internal details stay in the logs.
            let body = ErrorResponse::new(body.error_code, "Reconciliation failed; retry later");
            return (status, Json(body)).into_response();
        }
        (status, Json(body)).into_response()
    }
}
