//! OrderLedger port - canonical storage of orders and their renewal chains.
//!
//! Implementations must enforce uniqueness of both `payment_id` and
//! `order_id` at the storage level; those constraints are the last line of
//! defence against duplicate deliveries racing each other.

use async_trait::async_trait;

use crate::domain::foundation::DomainError;
use crate::domain::ordering::{Order, OrderId, OrderStatus};

/// Result of attempting to write a new order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertResult {
    Inserted,
    /// Another delivery already settled this payment.
    DuplicatePayment,
    /// The order number was taken concurrently; renumber and retry.
    DuplicateOrderId,
}

/// A predecessor whose forward pointer is missing although a successor exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BrokenLink {
    pub predecessor: OrderId,
    pub successor: OrderId,
}

#[async_trait]
pub trait OrderLedger: Send + Sync {
    async fn exists_by_payment_id(&self, payment_id: &str) -> Result<bool, DomainError>;

    async fn find_by_order_id(&self, order_id: &OrderId) -> Result<Option<Order>, DomainError>;

    async fn find_by_payment_id(&self, payment_id: &str) -> Result<Option<Order>, DomainError>;

    /// Highest `n` among originals `P<n>-0`, `None` on an empty ledger.
    async fn highest_original_sequence(&self) -> Result<Option<u64>, DomainError>;

    /// Highest renewal index in family `n`; 0 when only the original exists.
    async fn highest_renewal(&self, sequence: u64) -> Result<u32, DomainError>;

    /// Writes a new order.
    ///
    /// When `order.last_chain` is set, the predecessor's `next_chain` is set
    /// to the new id in the same transaction.
    async fn insert(&self, order: &Order) -> Result<InsertResult, DomainError>;

    /// Compare-and-set status change. Returns false when the current status
    /// is no longer `from`.
    async fn update_status(
        &self,
        order_id: &OrderId,
        from: OrderStatus,
        to: OrderStatus,
    ) -> Result<bool, DomainError>;

    async fn set_ecom_order_id(
        &self,
        order_id: &OrderId,
        ecom_order_id: Option<&str>,
    ) -> Result<(), DomainError>;

    /// Chain links where the successor exists but the predecessor does not
    /// point to it.
    async fn find_broken_links(&self) -> Result<Vec<BrokenLink>, DomainError>;

    /// Sets `next_chain` only if it is currently unset.
    async fn link_next(&self, predecessor: &OrderId, successor: &OrderId) -> Result<bool, DomainError>;
}
