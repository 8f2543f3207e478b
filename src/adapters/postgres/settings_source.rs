//! Store settings read from the single-row `store_settings` table.

use async_trait::async_trait;
use sqlx::PgPool;

use crate::domain::foundation::{DomainError, ErrorCode};
use crate::domain::storefront::StoreSettings;
use crate::ports::SettingsSource;

pub struct PostgresSettingsSource {
    pool: PgPool,
}

impl PostgresSettingsSource {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct SettingsRow {
    cart_hold_active: bool,
    trial_days: i32,
}

#[async_trait]
impl SettingsSource for PostgresSettingsSource {
    async fn load(&self) -> Result<StoreSettings, DomainError> {
        let row: Option<SettingsRow> =
            sqlx::query_as("SELECT cart_hold_active, trial_days FROM store_settings WHERE id = 1")
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| DomainError::database(format!("Failed to load store settings: {}", e)))?;

        // A missing row means the store never changed the defaults.
        let Some(row) = row else {
            return Ok(StoreSettings::default());
        };

        let trial_days = u32::try_from(row.trial_days).map_err(|_| {
            DomainError::new(
                ErrorCode::DatabaseError,
                format!("Invalid trial_days: {}", row.trial_days),
            )
        })?;

        Ok(StoreSettings {
            cart_hold_active: row.cart_hold_active,
            trial_days,
        })
    }
}
