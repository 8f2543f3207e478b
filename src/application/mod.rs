//! Application layer - Commands and Handlers.
//!
//! This layer orchestrates domain operations and coordinates between ports.

pub mod handlers;

pub use handlers::reconciliation::{
    NotificationDispatcher, NotificationPolicy, ReconcilePaymentEventCommand,
    ReconcilePaymentEventHandler, ReconcilerPorts, ReconcilerSettings, RepairChainsCommand,
    RepairChainsHandler, RepairChainsResult,
};
