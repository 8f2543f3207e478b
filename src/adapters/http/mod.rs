//! HTTP adapters - REST surface of the reconciler.

pub mod webhook;

use std::time::Duration;

use axum::Router;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

pub use webhook::{webhook_router, WebhookAppState};

/// Builds the service router with tracing and a per-request timeout.
pub fn app(state: WebhookAppState, request_timeout: Duration) -> Router {
    webhook_router()
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(request_timeout))
        .with_state(state)
}
