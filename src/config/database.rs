//! Order ledger connection pool.

use serde::Deserialize;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;

use super::error::ValidationError;

const MAX_POOL_SIZE: u32 = 100;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// `postgres://` or `postgresql://` URL.
    pub url: String,

    /// Concurrent deliveries beyond this wait for a connection.
    pub max_connections: u32,

    pub acquire_timeout_secs: u64,

    /// Apply the embedded migrations before serving.
    pub run_migrations: bool,
}

impl DatabaseConfig {
    pub async fn connect(&self) -> Result<PgPool, sqlx::Error> {
        PgPoolOptions::new()
            .max_connections(self.max_connections)
            .acquire_timeout(Duration::from_secs(self.acquire_timeout_secs))
            .connect(&self.url)
            .await
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.url.is_empty() {
            return Err(ValidationError::MissingRequired("DATABASE_URL"));
        }
        if !["postgres://", "postgresql://"]
            .iter()
            .any(|scheme| self.url.starts_with(scheme))
        {
            return Err(ValidationError::InvalidDatabaseUrl);
        }
        if !(1..=MAX_POOL_SIZE).contains(&self.max_connections) {
            return Err(ValidationError::InvalidPoolSize);
        }
        Ok(())
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            // Webhook traffic is bursty but low-volume.
            max_connections: 10,
            acquire_timeout_secs: 10,
            run_migrations: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_url(url: &str) -> DatabaseConfig {
        DatabaseConfig {
            url: url.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn url_is_required() {
        assert_eq!(
            DatabaseConfig::default().validate(),
            Err(ValidationError::MissingRequired("DATABASE_URL"))
        );
    }

    #[test]
    fn only_postgres_urls_are_accepted() {
        assert!(with_url("postgres://shop:pw@localhost:5432/shop").validate().is_ok());
        assert!(with_url("postgresql://localhost/shop").validate().is_ok());
        assert_eq!(
            with_url("mysql://localhost/shop").validate(),
            Err(ValidationError::InvalidDatabaseUrl)
        );
    }

    #[test]
    fn pool_size_is_bounded() {
        for max_connections in [0, MAX_POOL_SIZE + 1] {
            let config = DatabaseConfig {
                max_connections,
                ..with_url("postgresql://localhost/shop")
            };
            assert_eq!(config.validate(), Err(ValidationError::InvalidPoolSize));
        }
    }
}
