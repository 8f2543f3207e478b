//! Ports - Interfaces between the reconciler and the outside world.
//!
//! Each port is an `async_trait` object so adapters (Postgres, Stripe,
//! chat webhooks, in-memory doubles) can be swapped at wiring time.

mod catalog;
mod customer_directory;
mod notifier;
mod order_ledger;
mod payment_provider;
mod settings_source;

pub use catalog::Catalog;
pub use customer_directory::CustomerDirectory;
pub use notifier::{
    colors, Notification, NotificationChannel, NotificationField, Notifier, NotifyError,
};
pub use order_ledger::{BrokenLink, InsertResult, OrderLedger};
pub use payment_provider::{PaymentError, PaymentErrorCode, PaymentProvider};
pub use settings_source::{SettingsSource, StaticSettings};
