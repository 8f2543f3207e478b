//! Order status state machine.
//!
//! The reconciler owns creation, review resolution and the cancellation
//! transition. The remaining edges belong to fulfillment workers outside this
//! service but are declared here so every writer shares one graph.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{StateMachine, ValidationError};

/// Lifecycle status of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    /// Payment flagged by the provider's fraud review.
    Review,

    /// Paid and waiting for a fulfillment worker to provision.
    AwaitingProcessing,

    /// Paid for a product that is not in stock yet.
    Preorder,

    /// Provisioned and in service.
    Active,

    /// Subscription cancelled; service runs until expiry.
    AwaitingExpiry,

    Expired,

    Cancelled,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 7] = [
        OrderStatus::Review,
        OrderStatus::AwaitingProcessing,
        OrderStatus::Preorder,
        OrderStatus::Active,
        OrderStatus::AwaitingExpiry,
        OrderStatus::Expired,
        OrderStatus::Cancelled,
    ];

    /// Status assigned when an order is first written.
    pub fn initial(under_review: bool, preorder_product: bool) -> Self {
        if under_review {
            OrderStatus::Review
        } else if preorder_product {
            OrderStatus::Preorder
        } else {
            OrderStatus::AwaitingProcessing
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Review => "REVIEW",
            OrderStatus::AwaitingProcessing => "AWAITING_PROCESSING",
            OrderStatus::Preorder => "PREORDER",
            OrderStatus::Active => "ACTIVE",
            OrderStatus::AwaitingExpiry => "AWAITING_EXPIRY",
            OrderStatus::Expired => "EXPIRED",
            OrderStatus::Cancelled => "CANCELLED",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OrderStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| ValidationError::invalid_format("status", format!("unknown '{}'", s)))
    }
}

impl StateMachine for OrderStatus {
    fn can_transition_to(&self, target: &Self) -> bool {
        self.valid_transitions().contains(target)
    }

    fn valid_transitions(&self) -> Vec<Self> {
        use OrderStatus::*;
        match self {
            Review => vec![AwaitingProcessing, Expired, Cancelled],
            Preorder => vec![AwaitingProcessing, Cancelled],
            AwaitingProcessing => vec![Active, Cancelled],
            Active => vec![AwaitingExpiry, Expired, Cancelled],
            AwaitingExpiry => vec![Expired, Active, Cancelled],
            Expired | Cancelled => vec![],
        }
    }
}
