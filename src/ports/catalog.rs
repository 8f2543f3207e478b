//! Catalog port - products, stock counters, drop pages and coupons.

use async_trait::async_trait;

use crate::domain::foundation::DomainError;
use crate::domain::ordering::ProductPage;
use crate::domain::storefront::Product;

#[async_trait]
pub trait Catalog: Send + Sync {
    async fn find_product(&self, name: &str) -> Result<Option<Product>, DomainError>;

    /// Atomic relative adjustment (`stock = stock + delta`).
    ///
    /// Fails with `ProductNotFound` if the product does not exist.
    async fn adjust_stock(&self, name: &str, delta: i64) -> Result<(), DomainError>;

    /// Returns a checkout's held units to stock, at most once per `hold_id`.
    ///
    /// Returns false when the hold was already released.
    async fn release_hold(&self, hold_id: &str, name: &str, quantity: u32) -> Result<bool, DomainError>;

    async fn find_product_page(&self, slug: &str) -> Result<Option<ProductPage>, DomainError>;

    /// Atomic usage increment. Unknown coupons are ignored.
    async fn increment_coupon_usage(&self, coupon: &str) -> Result<(), DomainError>;
}
