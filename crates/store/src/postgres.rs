use async_trait::async_trait;
use common::{Money, OrderId, ProductId, UserId, Version};
use domain::{Cart, Order, OrderDraft, OrderNumber, Product};
use rust_decimal::Decimal;
use sqlx::{PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use crate::{
    OrderQuery, Result, StoreError,
    store::{CartStore, OrderStore, ProductStore, StockAdjustment},
};

/// PostgreSQL-backed store implementation.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a new PostgreSQL store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        tracing::info!("database migrations applied");
        Ok(())
    }

    fn row_to_product(row: PgRow) -> Result<Product> {
        Ok(Product {
            id: ProductId::from_uuid(row.try_get::<Uuid, _>("id")?),
            name: row.try_get("name")?,
            price: Money::new(row.try_get::<Decimal, _>("price")?),
            stock: stock_from_db(row.try_get("stock")?),
            is_active: row.try_get("is_active")?,
            is_deleted: row.try_get("is_deleted")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn row_to_order(row: PgRow) -> Result<Order> {
        let document: serde_json::Value = row.try_get("document")?;
        let mut order: Order = serde_json::from_value(document)?;
        order.set_version(Version::new(row.try_get("version")?));
        Ok(order)
    }

    async fn current_order_version(&self, id: OrderId) -> Result<Version> {
        let version: Option<i64> = sqlx::query_scalar("SELECT version FROM orders WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;
        Ok(version.map(Version::new).unwrap_or_default())
    }

    async fn current_cart_version(&self, owner_id: UserId) -> Result<Version> {
        let version: Option<i64> =
            sqlx::query_scalar("SELECT version FROM carts WHERE owner_id = $1")
                .bind(owner_id.as_uuid())
                .fetch_optional(&self.pool)
                .await?;
        Ok(version.map(Version::new).unwrap_or_default())
    }
}

fn stock_from_db(stock: i64) -> u32 {
    u32::try_from(stock.max(0)).unwrap_or(u32::MAX)
}

#[async_trait]
impl ProductStore for PostgresStore {
    async fn insert_product(&self, product: Product) -> Result<Product> {
        sqlx::query(
            r#"
            INSERT INTO products (id, name, price, stock, is_active, is_deleted, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (id) DO UPDATE SET
                name = EXCLUDED.name,
                price = EXCLUDED.price,
                stock = EXCLUDED.stock,
                is_active = EXCLUDED.is_active,
                is_deleted = EXCLUDED.is_deleted,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(product.id.as_uuid())
        .bind(&product.name)
        .bind(product.price.amount())
        .bind(i64::from(product.stock))
        .bind(product.is_active)
        .bind(product.is_deleted)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(product)
    }

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>> {
        let row = sqlx::query(
            r#"
            SELECT id, name, price, stock, is_active, is_deleted, created_at, updated_at
            FROM products
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_product).transpose()
    }

    async fn decrement_stock(&self, id: ProductId, quantity: u32) -> Result<StockAdjustment> {
        let remaining: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE products
            SET stock = stock - $2, updated_at = NOW()
            WHERE id = $1 AND stock >= $2 AND is_active AND NOT is_deleted
            RETURNING stock
            "#,
        )
        .bind(id.as_uuid())
        .bind(i64::from(quantity))
        .fetch_optional(&self.pool)
        .await?;

        if let Some(remaining) = remaining {
            return Ok(StockAdjustment::Applied {
                remaining: stock_from_db(remaining),
            });
        }

        // Nothing was updated; report why.
        Ok(match self.get_product(id).await? {
            None => StockAdjustment::NotFound,
            Some(product) if !product.is_available() => StockAdjustment::Unavailable,
            Some(product) => StockAdjustment::Insufficient {
                available: product.stock,
            },
        })
    }

    async fn increment_stock(&self, id: ProductId, quantity: u32) -> Result<StockAdjustment> {
        let remaining: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE products
            SET stock = stock + $2, updated_at = NOW()
            WHERE id = $1
            RETURNING stock
            "#,
        )
        .bind(id.as_uuid())
        .bind(i64::from(quantity))
        .fetch_optional(&self.pool)
        .await?;

        Ok(match remaining {
            Some(remaining) => StockAdjustment::Applied {
                remaining: stock_from_db(remaining),
            },
            None => StockAdjustment::NotFound,
        })
    }
}

#[async_trait]
impl CartStore for PostgresStore {
    async fn get_cart(&self, owner_id: UserId) -> Result<Option<Cart>> {
        let row = sqlx::query("SELECT version, document FROM carts WHERE owner_id = $1")
            .bind(owner_id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let document: serde_json::Value = row.try_get("document")?;
        let mut cart: Cart = serde_json::from_value(document)?;
        cart.set_version(Version::new(row.try_get("version")?));
        Ok(Some(cart))
    }

    async fn save_cart(&self, cart: &Cart) -> Result<Version> {
        let expected = cart.version();
        let next = expected.next();

        let mut stored = cart.clone();
        stored.set_version(next);
        let document = serde_json::to_value(&stored)?;

        let result = if !expected.is_persisted() {
            sqlx::query(
                r#"
                INSERT INTO carts (owner_id, version, document, updated_at)
                VALUES ($1, $2, $3, $4)
                ON CONFLICT (owner_id) DO NOTHING
                "#,
            )
            .bind(cart.owner_id().as_uuid())
            .bind(next.as_i64())
            .bind(document)
            .bind(cart.last_updated())
            .execute(&self.pool)
            .await?
        } else {
            sqlx::query(
                r#"
                UPDATE carts
                SET version = $3, document = $4, updated_at = $5
                WHERE owner_id = $1 AND version = $2
                "#,
            )
            .bind(cart.owner_id().as_uuid())
            .bind(expected.as_i64())
            .bind(next.as_i64())
            .bind(document)
            .bind(cart.last_updated())
            .execute(&self.pool)
            .await?
        };

        if result.rows_affected() == 0 {
            let actual = self.current_cart_version(cart.owner_id()).await?;
            return Err(StoreError::conflict("cart", cart.owner_id(), expected, actual));
        }
        Ok(next)
    }
}

#[async_trait]
impl OrderStore for PostgresStore {
    async fn insert_order(&self, draft: OrderDraft) -> Result<Order> {
        let day = draft.calendar_day();

        let mut tx = self.pool.begin().await?;

        // The row lock on the day's counter serializes concurrent inserts.
        let sequence: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO order_sequences (day, last_value)
            VALUES ($1, 1)
            ON CONFLICT (day) DO UPDATE SET last_value = order_sequences.last_value + 1
            RETURNING last_value
            "#,
        )
        .bind(day)
        .fetch_one(&mut *tx)
        .await?;

        let sequence = u32::try_from(sequence).unwrap_or(u32::MAX);
        let mut order = Order::from_draft(draft, OrderId::new(), OrderNumber::new(day, sequence));
        order.set_version(Version::first());
        let document = serde_json::to_value(&order)?;

        sqlx::query(
            r#"
            INSERT INTO orders (id, owner_id, order_number, status, version, document, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(order.id().as_uuid())
        .bind(order.owner_id().as_uuid())
        .bind(order.order_number().as_str())
        .bind(order.status().as_str())
        .bind(order.version().as_i64())
        .bind(document)
        .bind(order.created_at())
        .bind(order.updated_at())
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.constraint() == Some("unique_order_number")
            {
                return StoreError::DuplicateOrderNumber(order.order_number().to_string());
            }
            StoreError::Database(e)
        })?;

        tx.commit().await?;
        tracing::debug!(
            order_id = %order.id(),
            order_number = %order.order_number(),
            "order inserted"
        );
        Ok(order)
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>> {
        let row = sqlx::query("SELECT version, document FROM orders WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;

        row.map(Self::row_to_order).transpose()
    }

    async fn save_order(&self, order: &Order) -> Result<Version> {
        let expected = order.version();
        let next = expected.next();

        let mut stored = order.clone();
        stored.set_version(next);
        let document = serde_json::to_value(&stored)?;

        let result = sqlx::query(
            r#"
            UPDATE orders
            SET version = $3, status = $4, document = $5, updated_at = $6
            WHERE id = $1 AND version = $2
            "#,
        )
        .bind(order.id().as_uuid())
        .bind(expected.as_i64())
        .bind(next.as_i64())
        .bind(order.status().as_str())
        .bind(document)
        .bind(order.updated_at())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            let actual = self.current_order_version(order.id()).await?;
            return Err(StoreError::conflict("order", order.id(), expected, actual));
        }
        Ok(next)
    }

    async fn find_orders(&self, query: OrderQuery) -> Result<Vec<Order>> {
        let mut sql = String::from("SELECT version, document FROM orders WHERE 1=1");
        let mut param_count = 0;

        // Build dynamic query
        if query.owner_id.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND owner_id = ${param_count}"));
        }
        if query.status.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND status = ${param_count}"));
        }

        sql.push_str(" ORDER BY created_at DESC, order_number DESC");

        if let Some(limit) = query.limit {
            sql.push_str(&format!(" LIMIT {limit}"));
        }
        if let Some(offset) = query.offset {
            sql.push_str(&format!(" OFFSET {offset}"));
        }

        let mut q = sqlx::query(&sql);
        if let Some(owner_id) = query.owner_id {
            q = q.bind(owner_id.as_uuid());
        }
        if let Some(status) = query.status {
            q = q.bind(status.as_str());
        }

        let rows = q.fetch_all(&self.pool).await?;
        rows.into_iter().map(Self::row_to_order).collect()
    }
}
