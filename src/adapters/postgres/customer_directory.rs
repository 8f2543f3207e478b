//! PostgreSQL implementation of CustomerDirectory.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::foundation::{CustomerId, DomainError, Timestamp};
use crate::domain::storefront::{normalize_email, Customer, PotentialCustomer};
use crate::ports::CustomerDirectory;

pub struct PostgresCustomerDirectory {
    pool: PgPool,
}

impl PostgresCustomerDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct CustomerRow {
    id: Uuid,
    email: String,
    site: String,
    provider_customer_id: Option<String>,
    name: Option<String>,
    discord_handle: Option<String>,
    marketing_opt_in: bool,
    created_at: DateTime<Utc>,
}

impl From<CustomerRow> for Customer {
    fn from(row: CustomerRow) -> Self {
        Customer {
            id: CustomerId::from_uuid(row.id),
            email: row.email,
            site: row.site,
            provider_customer_id: row.provider_customer_id,
            name: row.name,
            discord_handle: row.discord_handle,
            marketing_opt_in: row.marketing_opt_in,
            created_at: Timestamp::from_datetime(row.created_at),
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct PotentialCustomerRow {
    email: String,
    site: String,
    name: Option<String>,
    discord_handle: Option<String>,
    marketing_opt_in: bool,
}

impl From<PotentialCustomerRow> for PotentialCustomer {
    fn from(row: PotentialCustomerRow) -> Self {
        PotentialCustomer {
            email: row.email,
            site: row.site,
            name: row.name,
            discord_handle: row.discord_handle,
            marketing_opt_in: row.marketing_opt_in,
        }
    }
}

const CUSTOMER_COLUMNS: &str =
    "id, email, site, provider_customer_id, name, discord_handle, marketing_opt_in, created_at";

#[async_trait]
impl CustomerDirectory for PostgresCustomerDirectory {
    async fn find_by_id(&self, id: &CustomerId) -> Result<Option<Customer>, DomainError> {
        let sql = format!("SELECT {} FROM customers WHERE id = $1", CUSTOMER_COLUMNS);
        let row: Option<CustomerRow> = sqlx::query_as(&sql)
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| DomainError::database(format!("Failed to find customer: {}", e)))?;

        Ok(row.map(Customer::from))
    }

    async fn find_by_email(&self, email: &str, site: &str) -> Result<Option<Customer>, DomainError> {
        let sql = format!(
            "SELECT {} FROM customers WHERE email = $1 AND site = $2",
            CUSTOMER_COLUMNS
        );
        let row: Option<CustomerRow> = sqlx::query_as(&sql)
            .bind(normalize_email(email))
            .bind(site)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| DomainError::database(format!("Failed to find customer by email: {}", e)))?;

        Ok(row.map(Customer::from))
    }

    async fn find_potential(
        &self,
        email: &str,
        site: &str,
    ) -> Result<Option<PotentialCustomer>, DomainError> {
        let row: Option<PotentialCustomerRow> = sqlx::query_as(
            r#"
            SELECT email, site, name, discord_handle, marketing_opt_in
            FROM potential_customers
            WHERE lower(trim(email)) = $1 AND site = $2
            "#,
        )
        .bind(normalize_email(email))
        .bind(site)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DomainError::database(format!("Failed to find potential customer: {}", e)))?;

        Ok(row.map(PotentialCustomer::from))
    }

    async fn create(&self, customer: &Customer) -> Result<Customer, DomainError> {
        // The no-op update makes RETURNING yield the existing row on conflict.
        let sql = format!(
            r#"
            INSERT INTO customers (
                id, email, site, provider_customer_id, name, discord_handle,
                marketing_opt_in, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT ON CONSTRAINT customers_email_site_key
            DO UPDATE SET email = EXCLUDED.email
            RETURNING {}
            "#,
            CUSTOMER_COLUMNS
        );
        let row: CustomerRow = sqlx::query_as(&sql)
            .bind(customer.id.as_uuid())
            .bind(normalize_email(&customer.email))
            .bind(&customer.site)
            .bind(&customer.provider_customer_id)
            .bind(&customer.name)
            .bind(&customer.discord_handle)
            .bind(customer.marketing_opt_in)
            .bind(*customer.created_at.as_datetime())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| DomainError::database(format!("Failed to create customer: {}", e)))?;

        Ok(Customer::from(row))
    }
}
