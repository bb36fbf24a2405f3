use async_trait::async_trait;
use common::ProductId;
use domain::Money;
use sqlx::{PgPool, Row, postgres::PgRow};

use crate::adjustment::{AdjustmentKey, AdjustmentOutcome, InventoryAdjustment};
use crate::error::{InventoryError, Result};
use crate::product::{Product, ProductStatus};
use crate::store::InventoryStore;

/// PostgreSQL-backed inventory store.
///
/// Each adjustment runs in one transaction that inserts the dedupe marker,
/// locks the product row and writes the new stock. A credit whose debit
/// marker is missing, or a debit whose cancellation marker exists, keeps its
/// own marker with a zero delta and leaves the stock alone.
#[derive(Clone)]
pub struct PostgresInventoryStore {
    pool: PgPool,
}

impl PostgresInventoryStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn marker_exists(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        key: &AdjustmentKey,
    ) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM processed_adjustments
                WHERE order_id = $1 AND event_type = $2 AND product_id = $3
            )
            "#,
        )
        .bind(key.order_id.as_uuid())
        .bind(key.event_type.as_str())
        .bind(key.product_id.as_i64())
        .fetch_one(&mut **tx)
        .await?;
        Ok(exists)
    }

    fn row_to_product(row: &PgRow) -> Result<Product> {
        let id: i64 = row.try_get("id")?;
        let product_id = ProductId::new(id);
        let stock: i32 = row.try_get("stock_quantity")?;
        let status: String = row.try_get("status")?;
        Ok(Product {
            id: product_id,
            name: row.try_get("name")?,
            price: Money::from_cents(row.try_get("price_cents")?),
            stock_quantity: u32::try_from(stock)
                .map_err(|_| InventoryError::QuantityOutOfRange(product_id))?,
            status: status
                .parse::<ProductStatus>()
                .map_err(|e| InventoryError::Database(sqlx::Error::Decode(e.into())))?,
        })
    }
}

#[async_trait]
impl InventoryStore for PostgresInventoryStore {
    async fn apply(&self, adjustment: &InventoryAdjustment) -> Result<AdjustmentOutcome> {
        let product_id = adjustment.product_id();
        let delta = i32::try_from(adjustment.delta)
            .map_err(|_| InventoryError::QuantityOutOfRange(product_id))?;
        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query(
            r#"
            INSERT INTO processed_adjustments (order_id, event_type, product_id, delta)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (order_id, event_type, product_id) DO NOTHING
            "#,
        )
        .bind(adjustment.key.order_id.as_uuid())
        .bind(adjustment.key.event_type.as_str())
        .bind(product_id.as_i64())
        .bind(delta)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if inserted == 0 {
            tx.rollback().await?;
            return Ok(AdjustmentOutcome::Duplicate);
        }

        let row = sqlx::query(
            r#"
            SELECT id, name, price_cents, stock_quantity, status
            FROM products
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(product_id.as_i64())
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(InventoryError::ProductNotFound(product_id))?;

        // The product row lock orders this check after any concurrent
        // adjustment of the same product.
        let counterpart_recorded = match adjustment.key.counterpart() {
            Some(key) => Self::marker_exists(&mut tx, &key).await?,
            None => false,
        };
        if let Some(outcome) = adjustment.skipped_outcome(counterpart_recorded) {
            sqlx::query(
                r#"
                UPDATE processed_adjustments
                SET delta = 0
                WHERE order_id = $1 AND event_type = $2 AND product_id = $3
                "#,
            )
            .bind(adjustment.key.order_id.as_uuid())
            .bind(adjustment.key.event_type.as_str())
            .bind(product_id.as_i64())
            .execute(&mut *tx)
            .await?;
            tx.commit().await?;
            return Ok(outcome);
        }

        // Dropping `tx` on error rolls the marker back with the stock change.
        let mut product = Self::row_to_product(&row)?;
        product.apply_delta(adjustment.delta)?;
        let stock = i32::try_from(product.stock_quantity)
            .map_err(|_| InventoryError::QuantityOutOfRange(product_id))?;

        sqlx::query(
            r#"
            UPDATE products
            SET stock_quantity = $2, status = $3, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(product_id.as_i64())
        .bind(stock)
        .bind(product.status.as_str())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(AdjustmentOutcome::Applied {
            new_quantity: product.stock_quantity,
            status: product.status,
        })
    }

    async fn product(&self, product_id: ProductId) -> Result<Option<Product>> {
        let row = sqlx::query(
            r#"
            SELECT id, name, price_cents, stock_quantity, status
            FROM products
            WHERE id = $1
            "#,
        )
        .bind(product_id.as_i64())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::row_to_product).transpose()
    }

    async fn upsert_product(&self, product: &Product) -> Result<()> {
        let stock = i32::try_from(product.stock_quantity)
            .map_err(|_| InventoryError::QuantityOutOfRange(product.id))?;

        sqlx::query(
            r#"
            INSERT INTO products (id, name, price_cents, stock_quantity, status)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (id) DO UPDATE
            SET name = EXCLUDED.name,
                price_cents = EXCLUDED.price_cents,
                stock_quantity = EXCLUDED.stock_quantity,
                status = EXCLUDED.status,
                updated_at = NOW()
            "#,
        )
        .bind(product.id.as_i64())
        .bind(&product.name)
        .bind(product.price.cents())
        .bind(stock)
        .bind(product.status.as_str())
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
