//! Duplicate-settlement detection keyed by provider payment id.

use std::sync::Arc;

use crate::domain::foundation::DomainError;
use crate::ports::OrderLedger;

/// First line of defence against redelivered payments.
///
/// The check is advisory: two concurrent deliveries can both pass it, so the
/// ledger's unique `payment_id` constraint settles the race at insert time.
pub struct IdempotencyGuard {
    ledger: Arc<dyn OrderLedger>,
}

impl IdempotencyGuard {
    pub fn new(ledger: Arc<dyn OrderLedger>) -> Self {
        Self { ledger }
    }

    pub async fn already_applied(&self, payment_id: &str) -> Result<bool, DomainError> {
        let applied = self.ledger.exists_by_payment_id(payment_id).await?;
        if applied {
            tracing::info!(payment_id, "Payment already applied");
        }
        Ok(applied)
    }
}
