//! CustomerDirectory port - customer lookup and lazy creation.

use async_trait::async_trait;

use crate::domain::foundation::{CustomerId, DomainError};
use crate::domain::storefront::{Customer, PotentialCustomer};

#[async_trait]
pub trait CustomerDirectory: Send + Sync {
    async fn find_by_id(&self, id: &CustomerId) -> Result<Option<Customer>, DomainError>;

    /// Lookup by normalized email within a site.
    async fn find_by_email(&self, email: &str, site: &str) -> Result<Option<Customer>, DomainError>;

    async fn find_potential(
        &self,
        email: &str,
        site: &str,
    ) -> Result<Option<PotentialCustomer>, DomainError>;

    /// Creates the customer, or returns the existing one if `(email, site)`
    /// was registered concurrently.
    async fn create(&self, customer: &Customer) -> Result<Customer, DomainError>;
}
