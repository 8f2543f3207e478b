//! Adapters - Implementations of port interfaces.
//!
//! - `postgres` - Storage ports backed by PostgreSQL
//! - `memory` - In-memory storage for tests and local runs
//! - `stripe` - Payment provider REST client and test double
//! - `notification` - Chat webhook notifier and a recording double
//! - `http` - Axum webhook endpoint

pub mod http;
pub mod memory;
pub mod notification;
pub mod postgres;
pub mod stripe;

pub use memory::{InMemoryCatalog, InMemoryCustomerDirectory, InMemoryOrderLedger};
pub use notification::{ChatWebhookNotifier, RecordingNotifier};
pub use stripe::{MockPaymentProvider, StripeConfig, StripePaymentAdapter};
