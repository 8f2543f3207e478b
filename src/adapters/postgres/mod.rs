//! PostgreSQL adapters - Database implementations of the storage ports.
//!
//! - `PostgresOrderLedger` - Orders and renewal chains
//! - `PostgresCustomerDirectory` - Customers and pre-registrations
//! - `PostgresCatalog` - Products, stock, drop pages and coupons
//! - `PostgresSettingsSource` - Store-wide settings row

mod catalog;
mod customer_directory;
mod order_ledger;
mod settings_source;

pub use catalog::PostgresCatalog;
pub use customer_directory::PostgresCustomerDirectory;
pub use order_ledger::PostgresOrderLedger;
pub use settings_source::PostgresSettingsSource;

use sqlx::PgPool;

/// Applies the embedded migrations in `migrations/`.
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}
