//! Stock movements tied to the order lifecycle.
//!
//! Stock is only tracked while cart holds are active. With holds off, both
//! operations are no-ops so counters are left untouched.

use std::sync::Arc;

use crate::domain::foundation::DomainError;
use crate::domain::storefront::StoreSettings;
use crate::ports::Catalog;

/// What a stock operation did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StockMovement {
    Applied(i64),
    HoldInactive,
    AlreadyReleased,
}

pub struct InventoryCoordinator {
    catalog: Arc<dyn Catalog>,
}

impl InventoryCoordinator {
    pub fn new(catalog: Arc<dyn Catalog>) -> Self {
        Self { catalog }
    }

    /// Takes `quantity` units for a first purchase.
    pub async fn commit(
        &self,
        settings: &StoreSettings,
        product_name: &str,
        quantity: u32,
    ) -> Result<StockMovement, DomainError> {
        self.adjust(settings, product_name, -i64::from(quantity)).await
    }

    /// Returns `quantity` units held by a checkout that never completed.
    ///
    /// `hold_id` is the checkout session id; a redelivered expiry is a no-op.
    pub async fn release(
        &self,
        settings: &StoreSettings,
        hold_id: &str,
        product_name: &str,
        quantity: u32,
    ) -> Result<StockMovement, DomainError> {
        if !settings.cart_hold_active {
            return Ok(StockMovement::HoldInactive);
        }
        if !self.catalog.release_hold(hold_id, product_name, quantity).await? {
            tracing::info!(hold_id, product = product_name, "Hold already released");
            return Ok(StockMovement::AlreadyReleased);
        }
        tracing::info!(hold_id, product = product_name, quantity, "Held stock released");
        Ok(StockMovement::Applied(i64::from(quantity)))
    }

    async fn adjust(
        &self,
        settings: &StoreSettings,
        product_name: &str,
        delta: i64,
    ) -> Result<StockMovement, DomainError> {
        if !settings.cart_hold_active {
            return Ok(StockMovement::HoldInactive);
        }
        self.catalog.adjust_stock(product_name, delta).await?;
        tracing::info!(product = product_name, delta, "Stock adjusted");
        Ok(StockMovement::Applied(delta))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemoryCatalog;
    use crate::domain::storefront::Product;

    fn setup() -> (Arc<InMemoryCatalog>, InventoryCoordinator) {
        let catalog = Arc::new(InMemoryCatalog::new());
        catalog.add_product(Product {
            name: "ISP".into(),
            stock: 20,
            preorder: false,
        });
        let coordinator = InventoryCoordinator::new(catalog.clone());
        (catalog, coordinator)
    }

    fn holds(active: bool) -> StoreSettings {
        StoreSettings {
            cart_hold_active: active,
            trial_days: 1,
        }
    }

    #[tokio::test]
    async fn commit_and_release_are_symmetric() {
        let (catalog, coordinator) = setup();
        assert_eq!(
            coordinator.commit(&holds(true), "ISP", 5).await.unwrap(),
            StockMovement::Applied(-5)
        );
        assert_eq!(catalog.stock("ISP"), Some(15));
        coordinator.release(&holds(true), "cs_1", "ISP", 5).await.unwrap();
        assert_eq!(catalog.stock("ISP"), Some(20));
    }

    #[tokio::test]
    async fn redelivered_expiry_releases_once() {
        let (catalog, coordinator) = setup();
        coordinator.release(&holds(true), "cs_1", "ISP", 2).await.unwrap();
        assert_eq!(
            coordinator.release(&holds(true), "cs_1", "ISP", 2).await.unwrap(),
            StockMovement::AlreadyReleased
        );
        assert_eq!(catalog.stock("ISP"), Some(22));
    }

    #[tokio::test]
    async fn inactive_hold_leaves_stock_alone() {
        let (catalog, coordinator) = setup();
        assert_eq!(
            coordinator.commit(&holds(false), "ISP", 5).await.unwrap(),
            StockMovement::HoldInactive
        );
        coordinator.release(&holds(false), "cs_2", "ISP", 3).await.unwrap();
        assert_eq!(catalog.stock("ISP"), Some(20));
    }
}
