//! Foundation module - Shared domain primitives.
//!
//! Contains identifiers, time handling, the state machine trait and error
//! types shared by the ordering and payments domains.

mod errors;
mod ids;
mod state_machine;
mod timestamp;

pub use errors::{DomainError, ErrorCode, ValidationError};
pub use ids::CustomerId;
pub use state_machine::StateMachine;
pub use timestamp::{Timestamp, BUSINESS_TIMEZONE};
