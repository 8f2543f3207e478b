//! In-memory catalog.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::domain::foundation::{DomainError, ErrorCode};
use crate::domain::ordering::ProductPage;
use crate::domain::storefront::Product;
use crate::ports::Catalog;

#[derive(Default)]
struct State {
    products: HashMap<String, Product>,
    pages: HashMap<String, ProductPage>,
    coupon_usage: HashMap<String, u64>,
    released_holds: HashSet<String>,
}

#[derive(Default)]
pub struct InMemoryCatalog {
    state: Mutex<State>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_product(&self, product: Product) {
        self.lock().products.insert(product.name.clone(), product);
    }

    pub fn add_page(&self, page: ProductPage) {
        self.lock().pages.insert(page.slug.clone(), page);
    }

    pub fn add_coupon(&self, code: &str) {
        self.lock().coupon_usage.insert(code.to_string(), 0);
    }

    pub fn stock(&self, name: &str) -> Option<i64> {
        self.lock().products.get(name).map(|p| p.stock)
    }

    pub fn coupon_usage(&self, code: &str) -> Option<u64> {
        self.lock().coupon_usage.get(code).copied()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl Catalog for InMemoryCatalog {
    async fn find_product(&self, name: &str) -> Result<Option<Product>, DomainError> {
        Ok(self.lock().products.get(name).cloned())
    }

    async fn adjust_stock(&self, name: &str, delta: i64) -> Result<(), DomainError> {
        let mut state = self.lock();
        let product = state
            .products
            .get_mut(name)
            .ok_or_else(|| DomainError::new(ErrorCode::ProductNotFound, name))?;
        product.stock += delta;
        Ok(())
    }

    async fn release_hold(&self, hold_id: &str, name: &str, quantity: u32) -> Result<bool, DomainError> {
        let mut state = self.lock();
        if state.released_holds.contains(hold_id) {
            return Ok(false);
        }
        let product = state
            .products
            .get_mut(name)
            .ok_or_else(|| DomainError::new(ErrorCode::ProductNotFound, name))?;
        product.stock += i64::from(quantity);
        state.released_holds.insert(hold_id.to_string());
        Ok(true)
    }

    async fn find_product_page(&self, slug: &str) -> Result<Option<ProductPage>, DomainError> {
        Ok(self.lock().pages.get(slug).cloned())
    }

    async fn increment_coupon_usage(&self, coupon: &str) -> Result<(), DomainError> {
        if let Some(count) = self.lock().coupon_usage.get_mut(coupon) {
            *count += 1;
        }
        Ok(())
    }
}
