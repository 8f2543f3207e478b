//! PostgreSQL implementation of Catalog.
//!
//! Stock changes are relative `UPDATE ... SET product_stock = product_stock + $n`
//! so concurrent deliveries never overwrite each other.

use async_trait::async_trait;
use chrono::NaiveDateTime;
use sqlx::{PgExecutor, PgPool};

use crate::domain::foundation::{DomainError, ErrorCode};
use crate::domain::ordering::ProductPage;
use crate::domain::storefront::Product;
use crate::ports::Catalog;

pub struct PostgresCatalog {
    pool: PgPool,
}

impl PostgresCatalog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ProductRow {
    name: String,
    product_stock: i64,
    preorder: bool,
}

#[derive(Debug, sqlx::FromRow)]
struct ProductPageRow {
    slug: String,
    dispatch_time: Option<NaiveDateTime>,
}

async fn add_stock<'e>(
    executor: impl PgExecutor<'e>,
    name: &str,
    delta: i64,
) -> Result<(), DomainError> {
    let result = sqlx::query("UPDATE products SET product_stock = product_stock + $2 WHERE name = $1")
        .bind(name)
        .bind(delta)
        .execute(executor)
        .await
        .map_err(|e| DomainError::database(format!("Failed to adjust stock: {}", e)))?;

    if result.rows_affected() == 0 {
        return Err(DomainError::new(ErrorCode::ProductNotFound, name));
    }
    Ok(())
}

#[async_trait]
impl Catalog for PostgresCatalog {
    async fn find_product(&self, name: &str) -> Result<Option<Product>, DomainError> {
        let row: Option<ProductRow> =
            sqlx::query_as("SELECT name, product_stock, preorder FROM products WHERE name = $1")
                .bind(name)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| DomainError::database(format!("Failed to find product: {}", e)))?;

        Ok(row.map(|row| Product {
            name: row.name,
            stock: row.product_stock,
            preorder: row.preorder,
        }))
    }

    async fn adjust_stock(&self, name: &str, delta: i64) -> Result<(), DomainError> {
        add_stock(&self.pool, name, delta).await
    }

    async fn release_hold(&self, hold_id: &str, name: &str, quantity: u32) -> Result<bool, DomainError> {
        let quantity = i32::try_from(quantity).map_err(|_| {
            DomainError::new(ErrorCode::ValidationFailed, format!("quantity out of range: {}", quantity))
        })?;

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| DomainError::database(format!("Failed to begin transaction: {}", e)))?;

        let claimed = sqlx::query(
            r#"
            INSERT INTO stock_releases (hold_id, product_name, quantity)
            VALUES ($1, $2, $3)
            ON CONFLICT (hold_id) DO NOTHING
            "#,
        )
        .bind(hold_id)
        .bind(name)
        .bind(quantity)
        .execute(&mut *tx)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db_err) if db_err.is_foreign_key_violation() => {
                DomainError::new(ErrorCode::ProductNotFound, name)
            }
            e => DomainError::database(format!("Failed to record stock release: {}", e)),
        })?;

        if claimed.rows_affected() == 0 {
            return Ok(false);
        }

        add_stock(&mut *tx, name, i64::from(quantity)).await?;

        tx.commit()
            .await
            .map_err(|e| DomainError::database(format!("Failed to commit stock release: {}", e)))?;
        Ok(true)
    }

    async fn find_product_page(&self, slug: &str) -> Result<Option<ProductPage>, DomainError> {
        let row: Option<ProductPageRow> =
            sqlx::query_as("SELECT slug, dispatch_time FROM product_pages WHERE slug = $1")
                .bind(slug)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| DomainError::database(format!("Failed to find product page: {}", e)))?;

        Ok(row.map(|row| ProductPage {
            slug: row.slug,
            dispatch_time: row.dispatch_time,
        }))
    }

    async fn increment_coupon_usage(&self, coupon: &str) -> Result<(), DomainError> {
        sqlx::query("UPDATE coupons SET usage_count = usage_count + 1 WHERE name = $1")
            .bind(coupon)
            .execute(&self.pool)
            .await
            .map_err(|e| DomainError::database(format!("Failed to increment coupon usage: {}", e)))?;
        Ok(())
    }
}
