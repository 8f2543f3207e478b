//! HTTP adapter for payment-provider webhooks.
//!
//! - `POST /api/webhooks/stripe` - Reconcile one Stripe event
//! - `GET /health` - Liveness probe

pub mod dto;
pub mod handlers;
pub mod routes;

pub use dto::{ErrorResponse, WebhookAck};
pub use handlers::{WebhookApiError, WebhookAppState};
pub use routes::{webhook_router, webhook_routes};
