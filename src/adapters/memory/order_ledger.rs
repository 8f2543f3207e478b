//! In-memory order ledger.
//!
//! A single mutex serializes every operation, which gives the same
//! atomicity the Postgres adapter gets from unique indexes and transactions.

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::domain::foundation::{DomainError, ErrorCode};
use crate::domain::ordering::{Order, OrderId, OrderStatus};
use crate::ports::{BrokenLink, InsertResult, OrderLedger};

#[derive(Default)]
pub struct InMemoryOrderLedger {
    orders: Mutex<BTreeMap<OrderId, Order>>,
}

impl InMemoryOrderLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores an order as-is, without touching its predecessor.
    pub fn seed(&self, order: Order) {
        self.lock().insert(order.order_id, order);
    }

    /// Snapshot of every order, ordered by number.
    pub fn all(&self) -> Vec<Order> {
        self.lock().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<OrderId, Order>> {
        self.orders.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn not_found(order_id: &OrderId) -> DomainError {
    DomainError::new(ErrorCode::OrderNotFound, order_id.to_string())
}

#[async_trait]
impl OrderLedger for InMemoryOrderLedger {
    async fn exists_by_payment_id(&self, payment_id: &str) -> Result<bool, DomainError> {
        Ok(self.lock().values().any(|o| o.payment_id == payment_id))
    }

    async fn find_by_order_id(&self, order_id: &OrderId) -> Result<Option<Order>, DomainError> {
        Ok(self.lock().get(order_id).cloned())
    }

    async fn find_by_payment_id(&self, payment_id: &str) -> Result<Option<Order>, DomainError> {
        Ok(self
            .lock()
            .values()
            .find(|o| o.payment_id == payment_id)
            .cloned())
    }

    async fn highest_original_sequence(&self) -> Result<Option<u64>, DomainError> {
        Ok(self.lock().keys().map(OrderId::sequence).max())
    }

    async fn highest_renewal(&self, sequence: u64) -> Result<u32, DomainError> {
        Ok(self
            .lock()
            .keys()
            .filter(|id| id.sequence() == sequence)
            .map(OrderId::renewal)
            .max()
            .unwrap_or(0))
    }

    async fn insert(&self, order: &Order) -> Result<InsertResult, DomainError> {
        let mut orders = self.lock();
        if orders.values().any(|o| o.payment_id == order.payment_id) {
            return Ok(InsertResult::DuplicatePayment);
        }
        if orders.contains_key(&order.order_id) {
            return Ok(InsertResult::DuplicateOrderId);
        }
        if let Some(predecessor) = order.last_chain {
            let prev = orders
                .get_mut(&predecessor)
                .ok_or_else(|| not_found(&predecessor))?;
            // A concurrent renewal already extended this link.
            if prev.next_chain.is_some() {
                return Ok(InsertResult::DuplicateOrderId);
            }
            prev.next_chain = Some(order.order_id);
        }
        orders.insert(order.order_id, order.clone());
        Ok(InsertResult::Inserted)
    }

    async fn update_status(
        &self,
        order_id: &OrderId,
        from: OrderStatus,
        to: OrderStatus,
    ) -> Result<bool, DomainError> {
        let mut orders = self.lock();
        let order = orders.get_mut(order_id).ok_or_else(|| not_found(order_id))?;
        if order.status != from {
            return Ok(false);
        }
        order.status = to;
        Ok(true)
    }

    async fn set_ecom_order_id(
        &self,
        order_id: &OrderId,
        ecom_order_id: Option<&str>,
    ) -> Result<(), DomainError> {
        let mut orders = self.lock();
        let order = orders.get_mut(order_id).ok_or_else(|| not_found(order_id))?;
        order.ecom_order_id = ecom_order_id.map(str::to_string);
        Ok(())
    }

    async fn find_broken_links(&self) -> Result<Vec<BrokenLink>, DomainError> {
        let orders = self.lock();
        Ok(orders
            .values()
            .filter_map(|successor| {
                let predecessor = successor.last_chain?;
                let prev = orders.get(&predecessor)?;
                prev.next_chain.is_none().then_some(BrokenLink {
                    predecessor,
                    successor: successor.order_id,
                })
            })
            .collect())
    }

    async fn link_next(&self, predecessor: &OrderId, successor: &OrderId) -> Result<bool, DomainError> {
        let mut orders = self.lock();
        let prev = orders.get_mut(predecessor).ok_or_else(|| not_found(predecessor))?;
        if prev.next_chain.is_some() {
            return Ok(false);
        }
        prev.next_chain = Some(*successor);
        Ok(true)
    }
}
