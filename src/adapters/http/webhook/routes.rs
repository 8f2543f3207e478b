//! Axum router configuration for webhook endpoints.

use axum::{
    routing::{get, post},
    Router,
};

use super::handlers::{handle_stripe_webhook, health, WebhookAppState};

/// Create the webhook router.
///
/// # Routes
/// - `POST /stripe` - Reconcile a Stripe event (signature verified, no auth)
///
/// Other methods on `/stripe` get 405 with `Allow: POST`.
pub fn webhook_routes() -> Router<WebhookAppState> {
    Router::new().route("/stripe", post(handle_stripe_webhook))
}

/// Create the complete router, suitable for serving at the root.
///
/// - `GET /health`
/// - `/api/webhooks/*`
pub fn webhook_router() -> Router<WebhookAppState> {
    Router::new()
        .route("/health", get(health))
        .nest("/api/webhooks", webhook_routes())
}
