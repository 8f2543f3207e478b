//! Payment reconciliation handlers.
//!
//! Turns verified payment events into ledger writes, stock movements and
//! notifications.

mod fulfillment;
mod idempotency;
mod inventory;
mod notifications;
mod reconcile_payment_event;
mod repair_chains;
mod settings;

pub use fulfillment::{Fulfillment, OrderFulfiller, Purchase, RenewalPayment, MAX_NUMBERING_ATTEMPTS};
pub use idempotency::IdempotencyGuard;
pub use inventory::{InventoryCoordinator, StockMovement};
pub use notifications::{NotificationDispatcher, NotificationPolicy};
pub use reconcile_payment_event::{
    ReconcilePaymentEventCommand, ReconcilePaymentEventHandler, ReconcilerPorts,
};
pub use repair_chains::{RepairChainsCommand, RepairChainsHandler, RepairChainsResult};
pub use settings::{ReconcilerSettings, DEFAULT_PERIOD_DAYS};
