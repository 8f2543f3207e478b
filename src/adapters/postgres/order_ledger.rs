//! PostgreSQL implementation of OrderLedger.
//!
//! `payment_id` and `(sequence, renewal)` carry unique constraints; insert
//! races are settled by whichever transaction commits first.

use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::domain::foundation::{CustomerId, DomainError, ErrorCode, Timestamp};
use crate::domain::ordering::{Order, OrderId, OrderStatus};
use crate::ports::{BrokenLink, InsertResult, OrderLedger};

const PAYMENT_ID_CONSTRAINT: &str = "orders_payment_id_key";

pub struct PostgresOrderLedger {
    pool: PgPool,
}

impl PostgresOrderLedger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Database row representation of an order.
#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    order_id: String,
    payment_id: String,
    customer_id: Uuid,
    product_name: String,
    status: String,
    payment_status: String,
    quantity: i32,
    length: i32,
    total: i64,
    location: Option<String>,
    dispatch_time: Option<DateTime<Utc>>,
    note: Option<String>,
    coupon_name: Option<String>,
    ecom_order_id: Option<String>,
    last_chain: Option<String>,
    next_chain: Option<String>,
    expiry: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

const ORDER_COLUMNS: &str = r#"
    order_id, payment_id, customer_id, product_name, status, payment_status,
    quantity, length, total, location, dispatch_time, note, coupon_name,
    ecom_order_id, last_chain, next_chain, expiry, created_at
"#;

impl TryFrom<OrderRow> for Order {
    type Error = DomainError;

    fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
        Ok(Order {
            order_id: parse_order_id(&row.order_id)?,
            payment_id: row.payment_id,
            customer_id: CustomerId::from_uuid(row.customer_id),
            product_name: row.product_name,
            status: OrderStatus::from_str(&row.status).map_err(|e| {
                DomainError::new(ErrorCode::DatabaseError, format!("Invalid status value: {}", e))
            })?,
            payment_status: row.payment_status,
            quantity: from_i32(row.quantity, "quantity")?,
            length: from_i32(row.length, "length")?,
            total: row.total,
            location: row.location,
            dispatch_time: row.dispatch_time.map(Timestamp::from_datetime),
            note: row.note,
            coupon_name: row.coupon_name,
            ecom_order_id: row.ecom_order_id,
            last_chain: row.last_chain.as_deref().map(parse_order_id).transpose()?,
            next_chain: row.next_chain.as_deref().map(parse_order_id).transpose()?,
            expiry: row.expiry.map(Timestamp::from_datetime),
            created_at: Timestamp::from_datetime(row.created_at),
        })
    }
}

fn parse_order_id(raw: &str) -> Result<OrderId, DomainError> {
    raw.parse()
        .map_err(|e| DomainError::new(ErrorCode::DatabaseError, format!("Invalid order id '{}': {}", raw, e)))
}

fn from_i32(value: i32, field: &str) -> Result<u32, DomainError> {
    u32::try_from(value)
        .map_err(|_| DomainError::new(ErrorCode::DatabaseError, format!("Negative {}: {}", field, value)))
}

fn to_i32(value: u32, field: &str) -> Result<i32, DomainError> {
    i32::try_from(value)
        .map_err(|_| DomainError::new(ErrorCode::ValidationFailed, format!("{} out of range: {}", field, value)))
}

fn to_i64(value: u64, field: &str) -> Result<i64, DomainError> {
    i64::try_from(value)
        .map_err(|_| DomainError::new(ErrorCode::ValidationFailed, format!("{} out of range: {}", field, value)))
}

fn db_error(action: &'static str) -> impl Fn(sqlx::Error) -> DomainError {
    move |e| DomainError::database(format!("Failed to {}: {}", action, e))
}

/// Integer columns converted to the widths Postgres stores.
struct OrderNumbers {
    sequence: i64,
    renewal: i32,
    quantity: i32,
    length: i32,
}

impl OrderNumbers {
    fn of(order: &Order) -> Result<Self, DomainError> {
        Ok(Self {
            sequence: to_i64(order.order_id.sequence(), "sequence")?,
            renewal: to_i32(order.order_id.renewal(), "renewal")?,
            quantity: to_i32(order.quantity, "quantity")?,
            length: to_i32(order.length, "length")?,
        })
    }
}

impl PostgresOrderLedger {
    async fn fetch_one_by(&self, column: &str, value: &str) -> Result<Option<Order>, DomainError> {
        let sql = format!("SELECT {} FROM orders WHERE {} = $1", ORDER_COLUMNS, column);
        let row: Option<OrderRow> = sqlx::query_as(&sql)
            .bind(value)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error("find order"))?;

        row.map(Order::try_from).transpose()
    }

    async fn insert_row(
        tx: &mut Transaction<'_, Postgres>,
        order: &Order,
        numbers: &OrderNumbers,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO orders (
                order_id, sequence, renewal, payment_id, customer_id, product_name,
                status, payment_status, quantity, length, total, location,
                dispatch_time, note, coupon_name, ecom_order_id, last_chain,
                next_chain, expiry, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, NULL, $18, $19)
            "#,
        )
        .bind(order.order_id.to_string())
        .bind(numbers.sequence)
        .bind(numbers.renewal)
        .bind(&order.payment_id)
        .bind(order.customer_id.as_uuid())
        .bind(&order.product_name)
        .bind(order.status.as_str())
        .bind(&order.payment_status)
        .bind(numbers.quantity)
        .bind(numbers.length)
        .bind(order.total)
        .bind(&order.location)
        .bind(order.dispatch_time.map(|t| *t.as_datetime()))
        .bind(&order.note)
        .bind(&order.coupon_name)
        .bind(&order.ecom_order_id)
        .bind(order.last_chain.map(|id| id.to_string()))
        .bind(order.expiry.map(|t| *t.as_datetime()))
        .bind(*order.created_at.as_datetime())
        .execute(&mut **tx)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl OrderLedger for PostgresOrderLedger {
    async fn exists_by_payment_id(&self, payment_id: &str) -> Result<bool, DomainError> {
        let (exists,): (bool,) = sqlx::query_as("SELECT EXISTS (SELECT 1 FROM orders WHERE payment_id = $1)")
            .bind(payment_id)
            .fetch_one(&self.pool)
            .await
            .map_err(db_error("check payment"))?;
        Ok(exists)
    }

    async fn find_by_order_id(&self, order_id: &OrderId) -> Result<Option<Order>, DomainError> {
        self.fetch_one_by("order_id", &order_id.to_string()).await
    }

    async fn find_by_payment_id(&self, payment_id: &str) -> Result<Option<Order>, DomainError> {
        self.fetch_one_by("payment_id", payment_id).await
    }

    async fn highest_original_sequence(&self) -> Result<Option<u64>, DomainError> {
        let (highest,): (Option<i64>,) = sqlx::query_as("SELECT MAX(sequence) FROM orders")
            .fetch_one(&self.pool)
            .await
            .map_err(db_error("read highest order number"))?;
        Ok(highest.and_then(|n| u64::try_from(n).ok()))
    }

    async fn highest_renewal(&self, sequence: u64) -> Result<u32, DomainError> {
        let (highest,): (Option<i32>,) = sqlx::query_as("SELECT MAX(renewal) FROM orders WHERE sequence = $1")
            .bind(to_i64(sequence, "sequence")?)
            .fetch_one(&self.pool)
            .await
            .map_err(db_error("read highest renewal"))?;
        highest.map(|n| from_i32(n, "renewal")).transpose().map(Option::unwrap_or_default)
    }

    async fn insert(&self, order: &Order) -> Result<InsertResult, DomainError> {
        let numbers = OrderNumbers::of(order)?;
        let mut tx = self.pool.begin().await.map_err(db_error("begin transaction"))?;

        match Self::insert_row(&mut tx, order, &numbers).await {
            Ok(()) => {}
            Err(sqlx::Error::Database(db_err)) if db_err.constraint() == Some(PAYMENT_ID_CONSTRAINT) => {
                return Ok(InsertResult::DuplicatePayment);
            }
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                // The primary key is checked before the payment constraint.
                drop(tx);
                if self.exists_by_payment_id(&order.payment_id).await? {
                    return Ok(InsertResult::DuplicatePayment);
                }
                return Ok(InsertResult::DuplicateOrderId);
            }
            Err(sqlx::Error::Database(db_err)) if db_err.is_foreign_key_violation() => {
                let missing = order
                    .last_chain
                    .map(|id| id.to_string())
                    .unwrap_or_else(|| order.customer_id.to_string());
                return Err(DomainError::new(ErrorCode::OrderNotFound, missing));
            }
            Err(e) => return Err(db_error("insert order")(e)),
        }

        if let Some(predecessor) = order.last_chain {
            let linked = sqlx::query(
                "UPDATE orders SET next_chain = $2 WHERE order_id = $1 AND next_chain IS NULL",
            )
            .bind(predecessor.to_string())
            .bind(order.order_id.to_string())
            .execute(&mut *tx)
            .await
            .map_err(db_error("link predecessor"))?;

            // Dropping the transaction rolls the insert back.
            if linked.rows_affected() == 0 {
                return Ok(InsertResult::DuplicateOrderId);
            }
        }

        tx.commit().await.map_err(db_error("commit order"))?;
        Ok(InsertResult::Inserted)
    }

    async fn update_status(
        &self,
        order_id: &OrderId,
        from: OrderStatus,
        to: OrderStatus,
    ) -> Result<bool, DomainError> {
        let result = sqlx::query("UPDATE orders SET status = $3 WHERE order_id = $1 AND status = $2")
            .bind(order_id.to_string())
            .bind(from.as_str())
            .bind(to.as_str())
            .execute(&self.pool)
            .await
            .map_err(db_error("update order status"))?;

        if result.rows_affected() == 0 && self.find_by_order_id(order_id).await?.is_none() {
            return Err(DomainError::new(ErrorCode::OrderNotFound, order_id.to_string()));
        }
        Ok(result.rows_affected() > 0)
    }

    async fn set_ecom_order_id(
        &self,
        order_id: &OrderId,
        ecom_order_id: Option<&str>,
    ) -> Result<(), DomainError> {
        let result = sqlx::query("UPDATE orders SET ecom_order_id = $2 WHERE order_id = $1")
            .bind(order_id.to_string())
            .bind(ecom_order_id)
            .execute(&self.pool)
            .await
            .map_err(db_error("update subscription reference"))?;

        if result.rows_affected() == 0 {
            return Err(DomainError::new(ErrorCode::OrderNotFound, order_id.to_string()));
        }
        Ok(())
    }

    async fn find_broken_links(&self) -> Result<Vec<BrokenLink>, DomainError> {
        let rows: Vec<(String, String)> = sqlx::query_as(
            r#"
            SELECT prev.order_id, succ.order_id
            FROM orders succ
            JOIN orders prev ON prev.order_id = succ.last_chain
            WHERE prev.next_chain IS NULL
            ORDER BY succ.sequence, succ.renewal
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("scan renewal chains"))?;

        rows.iter()
            .map(|(predecessor, successor)| {
                Ok(BrokenLink {
                    predecessor: parse_order_id(predecessor)?,
                    successor: parse_order_id(successor)?,
                })
            })
            .collect()
    }

    async fn link_next(&self, predecessor: &OrderId, successor: &OrderId) -> Result<bool, DomainError> {
        let result = sqlx::query("UPDATE orders SET next_chain = $2 WHERE order_id = $1 AND next_chain IS NULL")
            .bind(predecessor.to_string())
            .bind(successor.to_string())
            .execute(&self.pool)
            .await
            .map_err(db_error("repair chain link"))?;
        Ok(result.rows_affected() > 0)
    }
}
