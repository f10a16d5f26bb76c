use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{FromRow, PgPool, Postgres, Row, Transaction};
use tracing::{Span, instrument};
use uuid::Uuid;

use stockline_core::{BatchId, ItemId, MovementId};
use stockline_inventory::{
    BatchStatus, ConsumptionLine, InventoryItem, ItemKind, MovementKind, ProductionBatch, StockMovement,
};

use super::corrupt;
use crate::error::{RepositoryError, RepositoryResult, map_sqlx_error};
use crate::repository::InventoryRepository;

/// Items, movements and batches in Postgres.
#[derive(Debug, Clone)]
pub struct PostgresInventoryRepository {
    pool: Arc<PgPool>,
}

impl PostgresInventoryRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool: Arc::new(pool) }
    }

    /// Lock, validate and apply `movements` inside `tx`.
    async fn apply_in_tx(
        tx: &mut Transaction<'_, Postgres>,
        movements: &[StockMovement],
    ) -> RepositoryResult<Vec<InventoryItem>> {
        let mut order: Vec<ItemId> = Vec::new();
        let mut staged: HashMap<ItemId, InventoryItem> = HashMap::new();

        for movement in movements {
            if !staged.contains_key(&movement.item_id) {
                let row = sqlx::query(
                    r#"
                    SELECT id, kind, name, unit, stock, min_stock, created_at, updated_at
                    FROM inventory_items
                    WHERE id = $1
                    FOR UPDATE
                    "#,
                )
                .bind(movement.item_id.as_uuid())
                .fetch_optional(&mut **tx)
                .await
                .map_err(|e| map_sqlx_error("lock_item", e))?
                .ok_or_else(|| RepositoryError::not_found(format!("item {}", movement.item_id)))?;

                let item = decode_item(&row)?;
                order.push(item.id);
                staged.insert(item.id, item);
            }

            let current = staged
                .get(&movement.item_id)
                .ok_or_else(|| RepositoryError::not_found(format!("item {}", movement.item_id)))?;
            let next = current.with_movement(movement)?;
            staged.insert(movement.item_id, next);

            sqlx::query(
                r#"
                INSERT INTO stock_movements (id, item_id, kind, quantity, reason, batch_id, occurred_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                "#,
            )
            .bind(movement.id.as_uuid())
            .bind(movement.item_id.as_uuid())
            .bind(movement.kind.as_str())
            .bind(movement.quantity)
            .bind(movement.reason.as_deref())
            .bind(movement.batch_id.map(|b| *b.as_uuid()))
            .bind(movement.occurred_at)
            .execute(&mut **tx)
            .await
            .map_err(|e| map_sqlx_error("insert_movement", e))?;
        }

        let mut touched = Vec::with_capacity(order.len());
        for id in order {
            let Some(item) = staged.remove(&id) else { continue };
            sqlx::query("UPDATE inventory_items SET stock = $2, updated_at = $3 WHERE id = $1")
                .bind(item.id.as_uuid())
                .bind(item.stock)
                .bind(item.updated_at)
                .execute(&mut **tx)
                .await
                .map_err(|e| map_sqlx_error("update_stock", e))?;
            touched.push(item);
        }
        Ok(touched)
    }
}

#[async_trait]
impl InventoryRepository for PostgresInventoryRepository {
    #[instrument(skip(self, item), fields(item_id = %item.id), err)]
    async fn insert_item(&self, item: &InventoryItem) -> RepositoryResult<()> {
        sqlx::query(
            r#"
            INSERT INTO inventory_items (id, kind, name, unit, stock, min_stock, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(item.id.as_uuid())
        .bind(item.kind.as_str())
        .bind(&item.name)
        .bind(&item.unit)
        .bind(item.stock)
        .bind(item.min_stock)
        .bind(item.created_at)
        .bind(item.updated_at)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_item", e))?;
        Ok(())
    }

    #[instrument(skip(self), fields(item_id = %id), err)]
    async fn get_item(&self, id: ItemId) -> RepositoryResult<Option<InventoryItem>> {
        let row = sqlx::query(
            r#"
            SELECT id, kind, name, unit, stock, min_stock, created_at, updated_at
            FROM inventory_items
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("get_item", e))?;

        row.as_ref().map(decode_item).transpose()
    }

    #[instrument(skip(self), err)]
    async fn list_items(&self) -> RepositoryResult<Vec<InventoryItem>> {
        let rows = sqlx::query(
            r#"
            SELECT id, kind, name, unit, stock, min_stock, created_at, updated_at
            FROM inventory_items
            ORDER BY name ASC
            "#,
        )
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_items", e))?;

        Span::current().record("item_count", rows.len());
        rows.iter().map(decode_item).collect()
    }

    #[instrument(skip(self, item), fields(item_id = %item.id), err)]
    async fn update_item(&self, item: &InventoryItem) -> RepositoryResult<InventoryItem> {
        let row = sqlx::query(
            r#"
            UPDATE inventory_items
            SET name = $2, unit = $3, min_stock = $4, updated_at = $5
            WHERE id = $1
            RETURNING id, kind, name, unit, stock, min_stock, created_at, updated_at
            "#,
        )
        .bind(item.id.as_uuid())
        .bind(&item.name)
        .bind(&item.unit)
        .bind(item.min_stock)
        .bind(item.updated_at)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("update_item", e))?
        .ok_or_else(|| RepositoryError::not_found(format!("item {}", item.id)))?;

        decode_item(&row)
    }

    #[instrument(skip(self, movements), fields(movement_count = movements.len()), err)]
    async fn apply_movements(&self, movements: &[StockMovement]) -> RepositoryResult<Vec<InventoryItem>> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_apply_movements", e))?;

        let touched = Self::apply_in_tx(&mut tx, movements).await?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_apply_movements", e))?;
        Ok(touched)
    }

    #[instrument(skip(self), fields(item_id = %item_id), err)]
    async fn list_movements(&self, item_id: ItemId) -> RepositoryResult<Vec<StockMovement>> {
        let rows = sqlx::query(
            r#"
            SELECT id, item_id, kind, quantity, reason, batch_id, occurred_at
            FROM stock_movements
            WHERE item_id = $1
            ORDER BY occurred_at ASC, id ASC
            "#,
        )
        .bind(item_id.as_uuid())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_movements", e))?;

        rows.iter().map(decode_movement).collect()
    }

    #[instrument(skip(self, batch), fields(batch_id = %batch.id), err)]
    async fn insert_batch(&self, batch: &ProductionBatch) -> RepositoryResult<()> {
        let consumption =
            serde_json::to_value(&batch.consumption).map_err(|e| RepositoryError::storage(e.to_string()))?;
        sqlx::query(
            r#"
            INSERT INTO production_batches (
                id, code, product_id, planned_quantity, produced_quantity,
                consumption, status, created_at, started_at, completed_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(batch.id.as_uuid())
        .bind(&batch.code)
        .bind(batch.product_id.as_uuid())
        .bind(batch.planned_quantity)
        .bind(batch.produced_quantity)
        .bind(consumption)
        .bind(batch.status.as_str())
        .bind(batch.created_at)
        .bind(batch.started_at)
        .bind(batch.completed_at)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_batch", e))?;
        Ok(())
    }

    #[instrument(skip(self), fields(batch_id = %id), err)]
    async fn get_batch(&self, id: BatchId) -> RepositoryResult<Option<ProductionBatch>> {
        let row = sqlx::query(
            r#"
            SELECT id, code, product_id, planned_quantity, produced_quantity,
                   consumption, status, created_at, started_at, completed_at
            FROM production_batches
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("get_batch", e))?;

        row.as_ref().map(decode_batch).transpose()
    }

    #[instrument(skip(self), err)]
    async fn list_batches(&self) -> RepositoryResult<Vec<ProductionBatch>> {
        let rows = sqlx::query(
            r#"
            SELECT id, code, product_id, planned_quantity, produced_quantity,
                   consumption, status, created_at, started_at, completed_at
            FROM production_batches
            ORDER BY created_at DESC
            "#,
        )
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_batches", e))?;

        rows.iter().map(decode_batch).collect()
    }

    #[instrument(
        skip(self, batch),
        fields(batch_id = %batch.id, status = batch.status.as_str(), expected = expected.as_str()),
        err
    )]
    async fn update_batch(&self, batch: &ProductionBatch, expected: BatchStatus) -> RepositoryResult<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_update_batch", e))?;

        update_batch_row(&mut tx, batch, expected).await?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_update_batch", e))
    }

    #[instrument(
        skip(self, batch, movements),
        fields(batch_id = %batch.id, movement_count = movements.len()),
        err
    )]
    async fn complete_batch(
        &self,
        batch: &ProductionBatch,
        movements: &[StockMovement],
    ) -> RepositoryResult<Vec<InventoryItem>> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_complete_batch", e))?;

        // The conditional update row-locks the batch, so a concurrent completion
        // waits here and then matches zero rows.
        update_batch_row(&mut tx, batch, BatchStatus::InProgress).await?;
        let touched = Self::apply_in_tx(&mut tx, movements).await?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_complete_batch", e))?;
        Ok(touched)
    }
}

/// Compare-and-swap on the stored status.
async fn update_batch_row(
    tx: &mut Transaction<'_, Postgres>,
    batch: &ProductionBatch,
    expected: BatchStatus,
) -> RepositoryResult<()> {
    let result = sqlx::query(
        r#"
        UPDATE production_batches
        SET status = $2, produced_quantity = $3, started_at = $4, completed_at = $5
        WHERE id = $1 AND status = $6
        "#,
    )
    .bind(batch.id.as_uuid())
    .bind(batch.status.as_str())
    .bind(batch.produced_quantity)
    .bind(batch.started_at)
    .bind(batch.completed_at)
    .bind(expected.as_str())
    .execute(&mut **tx)
    .await
    .map_err(|e| map_sqlx_error("update_batch", e))?;

    if result.rows_affected() > 0 {
        return Ok(());
    }

    let stored: Option<String> = sqlx::query_scalar("SELECT status FROM production_batches WHERE id = $1")
        .bind(batch.id.as_uuid())
        .fetch_optional(&mut **tx)
        .await
        .map_err(|e| map_sqlx_error("update_batch_status", e))?;

    match stored {
        None => Err(RepositoryError::not_found(format!("batch {}", batch.id))),
        Some(status) => Err(RepositoryError::Conflict(format!(
            "batch {} is {status}, expected {}",
            batch.id,
            expected.as_str()
        ))),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Row decoding
// ─────────────────────────────────────────────────────────────────────────────

struct ItemRow {
    id: Uuid,
    kind: String,
    name: String,
    unit: String,
    stock: i64,
    min_stock: Option<i64>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl<'r> FromRow<'r, PgRow> for ItemRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(ItemRow {
            id: row.try_get("id")?,
            kind: row.try_get("kind")?,
            name: row.try_get("name")?,
            unit: row.try_get("unit")?,
            stock: row.try_get("stock")?,
            min_stock: row.try_get("min_stock")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

impl TryFrom<ItemRow> for InventoryItem {
    type Error = RepositoryError;

    fn try_from(row: ItemRow) -> Result<Self, Self::Error> {
        Ok(InventoryItem {
            id: ItemId::from_uuid(row.id),
            kind: ItemKind::parse(&row.kind).map_err(|e| corrupt("item", e))?,
            name: row.name,
            unit: row.unit,
            stock: row.stock,
            min_stock: row.min_stock,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn decode_item(row: &PgRow) -> RepositoryResult<InventoryItem> {
    ItemRow::from_row(row).map_err(|e| corrupt("item", e))?.try_into()
}

struct MovementRow {
    id: Uuid,
    item_id: Uuid,
    kind: String,
    quantity: i64,
    reason: Option<String>,
    batch_id: Option<Uuid>,
    occurred_at: DateTime<Utc>,
}

impl<'r> FromRow<'r, PgRow> for MovementRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(MovementRow {
            id: row.try_get("id")?,
            item_id: row.try_get("item_id")?,
            kind: row.try_get("kind")?,
            quantity: row.try_get("quantity")?,
            reason: row.try_get("reason")?,
            batch_id: row.try_get("batch_id")?,
            occurred_at: row.try_get("occurred_at")?,
        })
    }
}

impl TryFrom<MovementRow> for StockMovement {
    type Error = RepositoryError;

    fn try_from(row: MovementRow) -> Result<Self, Self::Error> {
        Ok(StockMovement {
            id: MovementId::from_uuid(row.id),
            item_id: ItemId::from_uuid(row.item_id),
            kind: MovementKind::parse(&row.kind).map_err(|e| corrupt("movement", e))?,
            quantity: row.quantity,
            reason: row.reason,
            batch_id: row.batch_id.map(BatchId::from_uuid),
            occurred_at: row.occurred_at,
        })
    }
}

fn decode_movement(row: &PgRow) -> RepositoryResult<StockMovement> {
    MovementRow::from_row(row).map_err(|e| corrupt("movement", e))?.try_into()
}

fn decode_batch(row: &PgRow) -> RepositoryResult<ProductionBatch> {
    let decode = |e: sqlx::Error| corrupt("batch", e);
    let consumption: serde_json::Value = row.try_get("consumption").map_err(decode)?;
    let consumption: Vec<ConsumptionLine> =
        serde_json::from_value(consumption).map_err(|e| corrupt("batch consumption", e))?;
    let status: String = row.try_get("status").map_err(decode)?;

    Ok(ProductionBatch {
        id: BatchId::from_uuid(row.try_get("id").map_err(decode)?),
        code: row.try_get("code").map_err(decode)?,
        product_id: ItemId::from_uuid(row.try_get("product_id").map_err(decode)?),
        planned_quantity: row.try_get("planned_quantity").map_err(decode)?,
        produced_quantity: row.try_get("produced_quantity").map_err(decode)?,
        consumption,
        status: BatchStatus::parse(&status).map_err(|e| corrupt("batch", e))?,
        created_at: row.try_get("created_at").map_err(decode)?,
        started_at: row.try_get("started_at").map_err(decode)?,
        completed_at: row.try_get("completed_at").map_err(decode)?,
    })
}
