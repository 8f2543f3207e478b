//! In-memory customer directory.

use std::sync::Mutex;

use async_trait::async_trait;

use crate::domain::foundation::{CustomerId, DomainError};
use crate::domain::storefront::{normalize_email, Customer, PotentialCustomer};
use crate::ports::CustomerDirectory;

#[derive(Default)]
struct State {
    customers: Vec<Customer>,
    potential: Vec<PotentialCustomer>,
}

#[derive(Default)]
pub struct InMemoryCustomerDirectory {
    state: Mutex<State>,
}

impl InMemoryCustomerDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_customer(&self, customer: Customer) {
        self.lock().customers.push(customer);
    }

    pub fn add_potential(&self, potential: PotentialCustomer) {
        self.lock().potential.push(potential);
    }

    pub fn customers(&self) -> Vec<Customer> {
        self.lock().customers.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl CustomerDirectory for InMemoryCustomerDirectory {
    async fn find_by_id(&self, id: &CustomerId) -> Result<Option<Customer>, DomainError> {
        Ok(self.lock().customers.iter().find(|c| &c.id == id).cloned())
    }

    async fn find_by_email(&self, email: &str, site: &str) -> Result<Option<Customer>, DomainError> {
        let email = normalize_email(email);
        Ok(self
            .lock()
            .customers
            .iter()
            .find(|c| c.email == email && c.site == site)
            .cloned())
    }

    async fn find_potential(
        &self,
        email: &str,
        site: &str,
    ) -> Result<Option<PotentialCustomer>, DomainError> {
        let email = normalize_email(email);
        Ok(self
            .lock()
            .potential
            .iter()
            .find(|p| normalize_email(&p.email) == email && p.site == site)
            .cloned())
    }

    async fn create(&self, customer: &Customer) -> Result<Customer, DomainError> {
        let mut state = self.lock();
        if let Some(existing) = state
            .customers
            .iter()
            .find(|c| c.email == customer.email && c.site == customer.site)
        {
            return Ok(existing.clone());
        }
        state.customers.push(customer.clone());
        Ok(customer.clone())
    }
}
