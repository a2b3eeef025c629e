//! Batch ledger service
//!
//! Owns batch records and their derived status. Status is computed in exactly
//! one place, `shared::derive_status`, invoked after every quantity change and
//! by the periodic sweep; `blocked` is the only status set manually and the
//! only one that survives recomputation (depletion aside).

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use shared::{
    derive_status, format_batch_number, validate_batch_dates, validate_batch_number,
    validate_quantity, validate_unit_price, Batch, BatchStatus, BatchStatusChange,
    NEAR_EXPIRY_WINDOW_DAYS,
};

use crate::error::{AppError, AppResult};

use super::sequence;

/// Batch ledger service
#[derive(Clone)]
pub struct BatchService {
    db: PgPool,
    near_expiry_days: i64,
}

/// Row shape shared by all batch queries
pub(crate) type BatchRow = (
    Uuid,
    String,
    Uuid,
    i64,
    i64,
    NaiveDate,
    Option<NaiveDate>,
    Decimal,
    String,
    Option<String>,
    Option<String>,
    DateTime<Utc>,
    DateTime<Utc>,
);

pub(crate) fn batch_from_row(row: BatchRow) -> AppResult<Batch> {
    let status = BatchStatus::from_str(&row.8)
        .ok_or_else(|| AppError::Internal(format!("unknown batch status '{}'", row.8)))?;

    Ok(Batch {
        id: row.0,
        batch_number: row.1,
        product_id: row.2,
        quantity_initial: row.3,
        quantity_available: row.4,
        manufacture_date: row.5,
        expiration_date: row.6,
        unit_cost: row.7,
        status,
        blocked_reason: row.9,
        notes: row.10,
        created_at: row.11,
        updated_at: row.12,
    })
}

/// Input for creating a batch
#[derive(Debug, Deserialize)]
pub struct CreateBatchInput {
    /// Caller-supplied batch number; generated (LOT-YYYY-NNNNN) when omitted
    pub batch_number: Option<String>,
    pub product_id: Uuid,
    pub quantity_initial: i64,
    pub manufacture_date: NaiveDate,
    pub expiration_date: Option<NaiveDate>,
    pub unit_cost: Decimal,
    pub notes: Option<String>,
}

impl BatchService {
    /// Create a new BatchService instance with the default near-expiry window
    pub fn new(db: PgPool) -> Self {
        Self {
            db,
            near_expiry_days: NEAR_EXPIRY_WINDOW_DAYS,
        }
    }

    /// Create with an explicit near-expiry window (days)
    pub fn with_near_expiry_window(db: PgPool, near_expiry_days: i64) -> Self {
        Self {
            db,
            near_expiry_days,
        }
    }

    /// Create a batch.
    ///
    /// A batch created with initial stock also raises the product's aggregate
    /// counter in the same transaction so the aggregate always equals the sum
    /// over batches; receipts that need a ledger entry go through
    /// `MovementService::register_entry` against a batch created empty.
    pub async fn create_batch(&self, input: CreateBatchInput) -> AppResult<Batch> {
        if input.quantity_initial < 0 {
            return Err(AppError::Validation {
                field: "quantity_initial".to_string(),
                message: "Initial quantity cannot be negative".to_string(),
                message_th: "ปริมาณเริ่มต้นต้องไม่ติดลบ".to_string(),
            });
        }

        if let Err(msg) = validate_batch_dates(input.manufacture_date, input.expiration_date) {
            return Err(AppError::Validation {
                field: "expiration_date".to_string(),
                message: msg.to_string(),
                message_th: "วันหมดอายุต้องไม่มาก่อนวันผลิต".to_string(),
            });
        }

        if let Err(msg) = validate_unit_price(input.unit_cost) {
            return Err(AppError::Validation {
                field: "unit_cost".to_string(),
                message: msg.to_string(),
                message_th: "ต้นทุนต่อหน่วยต้องไม่ติดลบ".to_string(),
            });
        }

        let mut tx = self.db.begin().await?;

        // Product row is locked: batch creation with initial stock writes the
        // aggregate counter.
        let is_active = sqlx::query_scalar::<_, bool>(
            "SELECT is_active FROM products WHERE id = $1 FOR UPDATE",
        )
        .bind(input.product_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Product".to_string()))?;

        if !is_active {
            return Err(AppError::InvalidStateTransition(
                "product is inactive".to_string(),
            ));
        }

        let batch_number = match input.batch_number {
            Some(number) => {
                if let Err(msg) = validate_batch_number(&number) {
                    return Err(AppError::Validation {
                        field: "batch_number".to_string(),
                        message: msg.to_string(),
                        message_th: "หมายเลขล็อตไม่ถูกต้อง".to_string(),
                    });
                }

                let exists = sqlx::query_scalar::<_, bool>(
                    "SELECT EXISTS(SELECT 1 FROM batches WHERE batch_number = $1)",
                )
                .bind(&number)
                .fetch_one(&mut *tx)
                .await?;

                if exists {
                    return Err(AppError::DuplicateEntry("batch_number".to_string()));
                }

                number
            }
            None => {
                let year = Utc::now().year();
                let sequence =
                    sequence::next_value(&mut *tx, "LOT", &year.to_string()).await?;
                format_batch_number(year, sequence)
            }
        };

        let today = Utc::now().date_naive();
        let status = derive_status(
            input.quantity_initial,
            input.expiration_date,
            today,
            BatchStatus::Available,
            self.near_expiry_days,
        );

        let row = sqlx::query_as::<_, BatchRow>(
            r#"
            INSERT INTO batches (batch_number, product_id, quantity_initial,
                                 quantity_available, manufacture_date, expiration_date,
                                 unit_cost, status, notes)
            VALUES ($1, $2, $3, $3, $4, $5, $6, $7, $8)
            RETURNING id, batch_number, product_id, quantity_initial, quantity_available,
                      manufacture_date, expiration_date, unit_cost, status,
                      blocked_reason, notes, created_at, updated_at
            "#,
        )
        .bind(&batch_number)
        .bind(input.product_id)
        .bind(input.quantity_initial)
        .bind(input.manufacture_date)
        .bind(input.expiration_date)
        .bind(input.unit_cost)
        .bind(status.as_str())
        .bind(&input.notes)
        .fetch_one(&mut *tx)
        .await?;

        if input.quantity_initial > 0 {
            sqlx::query(
                "UPDATE products SET stock_current = stock_current + $1, updated_at = NOW() WHERE id = $2",
            )
            .bind(input.quantity_initial)
            .bind(input.product_id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        batch_from_row(row)
    }

    /// Add quantity to a batch inside an open transaction.
    ///
    /// Locks the batch row, verifies ownership, grows `quantity_initial` when
    /// the batch receives more than it originally held, and re-derives the
    /// status. The caller owns the product row lock and the aggregate update.
    pub(crate) async fn add_quantity_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        batch_id: Uuid,
        product_id: Uuid,
        quantity: i64,
    ) -> AppResult<Batch> {
        if let Err(msg) = validate_quantity(quantity) {
            return Err(AppError::ValidationError(msg.to_string()));
        }

        let batch = self.lock_batch(tx, batch_id).await?;

        if batch.product_id != product_id {
            return Err(AppError::ValidationError(format!(
                "batch {} does not belong to the product",
                batch.batch_number
            )));
        }

        let quantity_available = batch.quantity_available + quantity;
        let quantity_initial = batch.quantity_initial.max(quantity_available);

        self.store_quantities(tx, &batch, quantity_initial, quantity_available)
            .await
    }

    /// Deduct quantity from a batch inside an open transaction.
    ///
    /// Expired and blocked batches reject deducts; deducting more than the
    /// batch holds fails. Re-derives the status afterwards.
    pub(crate) async fn deduct_quantity_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        batch_id: Uuid,
        product_id: Uuid,
        quantity: i64,
    ) -> AppResult<Batch> {
        if let Err(msg) = validate_quantity(quantity) {
            return Err(AppError::ValidationError(msg.to_string()));
        }

        let batch = self.lock_batch(tx, batch_id).await?;

        if batch.product_id != product_id {
            return Err(AppError::ValidationError(format!(
                "batch {} does not belong to the product",
                batch.batch_number
            )));
        }

        match batch.status {
            BatchStatus::Expired => {
                return Err(AppError::InvalidStateTransition(format!(
                    "batch {} is expired",
                    batch.batch_number
                )));
            }
            BatchStatus::Blocked => {
                return Err(AppError::InvalidStateTransition(format!(
                    "batch {} is blocked",
                    batch.batch_number
                )));
            }
            _ => {}
        }

        if quantity > batch.quantity_available {
            return Err(AppError::InsufficientStock {
                message: format!(
                    "Batch {} has {} available, requested {}",
                    batch.batch_number, batch.quantity_available, quantity
                ),
                message_th: format!(
                    "ล็อต {} คงเหลือ {} แต่ต้องการ {}",
                    batch.batch_number, batch.quantity_available, quantity
                ),
            });
        }

        let quantity_available = batch.quantity_available - quantity;

        self.store_quantities(tx, &batch, batch.quantity_initial, quantity_available)
            .await
    }

    /// Block a batch, recording the reason. Allowed from any status.
    pub async fn block(&self, batch_id: Uuid, reason: &str) -> AppResult<Batch> {
        if reason.trim().is_empty() {
            return Err(AppError::Validation {
                field: "reason".to_string(),
                message: "Block reason cannot be empty".to_string(),
                message_th: "เหตุผลการระงับไม่สามารถว่างได้".to_string(),
            });
        }

        let mut tx = self.db.begin().await?;

        // Lock so a concurrent deduct cannot slip between read and update
        self.lock_batch(&mut tx, batch_id).await?;

        let row = sqlx::query_as::<_, BatchRow>(
            r#"
            UPDATE batches
            SET status = $1, blocked_reason = $2, updated_at = NOW()
            WHERE id = $3
            RETURNING id, batch_number, product_id, quantity_initial, quantity_available,
                      manufacture_date, expiration_date, unit_cost, status,
                      blocked_reason, notes, created_at, updated_at
            "#,
        )
        .bind(BatchStatus::Blocked.as_str())
        .bind(reason)
        .bind(batch_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        batch_from_row(row)
    }

    /// Unblock a batch and re-derive its status. Fails unless blocked.
    pub async fn unblock(&self, batch_id: Uuid) -> AppResult<Batch> {
        let mut tx = self.db.begin().await?;

        let batch = self.lock_batch(&mut tx, batch_id).await?;

        if batch.status != BatchStatus::Blocked {
            return Err(AppError::InvalidStateTransition(format!(
                "batch {} is not blocked",
                batch.batch_number
            )));
        }

        let today = Utc::now().date_naive();
        let status = derive_status(
            batch.quantity_available,
            batch.expiration_date,
            today,
            BatchStatus::Available,
            self.near_expiry_days,
        );

        let row = sqlx::query_as::<_, BatchRow>(
            r#"
            UPDATE batches
            SET status = $1, blocked_reason = NULL, updated_at = NOW()
            WHERE id = $2
            RETURNING id, batch_number, product_id, quantity_initial, quantity_available,
                      manufacture_date, expiration_date, unit_cost, status,
                      blocked_reason, notes, created_at, updated_at
            "#,
        )
        .bind(status.as_str())
        .bind(batch_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        batch_from_row(row)
    }

    /// Delete a batch. Fails while quantity remains.
    pub async fn delete_batch(&self, batch_id: Uuid) -> AppResult<()> {
        let mut tx = self.db.begin().await?;

        let batch = self.lock_batch(&mut tx, batch_id).await?;

        if batch.quantity_available != 0 {
            return Err(AppError::InvalidStateTransition(format!(
                "batch {} still has stock",
                batch.batch_number
            )));
        }

        sqlx::query("DELETE FROM batches WHERE id = $1")
            .bind(batch_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(())
    }

    /// Recompute the status of every batch, one short transaction per batch
    /// so the scan never holds a lock across unrelated rows. Per-batch
    /// failures are logged and skipped. Returns the batches whose status
    /// changed, which feed the alert generator.
    pub async fn sweep_statuses(&self) -> AppResult<Vec<BatchStatusChange>> {
        let ids = sqlx::query_scalar::<_, Uuid>("SELECT id FROM batches ORDER BY created_at")
            .fetch_all(&self.db)
            .await?;

        let today = Utc::now().date_naive();
        let mut changes = Vec::new();

        for batch_id in ids {
            match self.recompute_one(batch_id, today).await {
                Ok(Some(change)) => changes.push(change),
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!("Status recompute failed for batch {}: {}", batch_id, e);
                }
            }
        }

        Ok(changes)
    }

    /// Recompute one batch's status in its own transaction
    async fn recompute_one(
        &self,
        batch_id: Uuid,
        today: NaiveDate,
    ) -> AppResult<Option<BatchStatusChange>> {
        let mut tx = self.db.begin().await?;

        // The batch may have been deleted since the id scan
        let batch = match self.try_lock_batch(&mut tx, batch_id).await? {
            Some(batch) => batch,
            None => return Ok(None),
        };

        let status = derive_status(
            batch.quantity_available,
            batch.expiration_date,
            today,
            batch.status,
            self.near_expiry_days,
        );

        if status == batch.status {
            tx.commit().await?;
            return Ok(None);
        }

        sqlx::query("UPDATE batches SET status = $1, updated_at = NOW() WHERE id = $2")
            .bind(status.as_str())
            .bind(batch_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(Some(BatchStatusChange {
            batch_id,
            product_id: batch.product_id,
            batch_number: batch.batch_number,
            expiration_date: batch.expiration_date,
            previous: batch.status,
            current: status,
        }))
    }

    /// Get a batch by ID
    pub async fn get_batch(&self, batch_id: Uuid) -> AppResult<Batch> {
        let row = sqlx::query_as::<_, BatchRow>(
            r#"
            SELECT id, batch_number, product_id, quantity_initial, quantity_available,
                   manufacture_date, expiration_date, unit_cost, status,
                   blocked_reason, notes, created_at, updated_at
            FROM batches
            WHERE id = $1
            "#,
        )
        .bind(batch_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Batch".to_string()))?;

        batch_from_row(row)
    }

    /// Get a batch by its unique number
    pub async fn get_batch_by_number(&self, batch_number: &str) -> AppResult<Batch> {
        let row = sqlx::query_as::<_, BatchRow>(
            r#"
            SELECT id, batch_number, product_id, quantity_initial, quantity_available,
                   manufacture_date, expiration_date, unit_cost, status,
                   blocked_reason, notes, created_at, updated_at
            FROM batches
            WHERE batch_number = $1
            "#,
        )
        .bind(batch_number)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Batch".to_string()))?;

        batch_from_row(row)
    }

    /// List a product's batches, soonest expiry first
    pub async fn list_batches(&self, product_id: Uuid) -> AppResult<Vec<Batch>> {
        let rows = sqlx::query_as::<_, BatchRow>(
            r#"
            SELECT id, batch_number, product_id, quantity_initial, quantity_available,
                   manufacture_date, expiration_date, unit_cost, status,
                   blocked_reason, notes, created_at, updated_at
            FROM batches
            WHERE product_id = $1
            ORDER BY expiration_date ASC NULLS LAST, created_at ASC
            "#,
        )
        .bind(product_id)
        .fetch_all(&self.db)
        .await?;

        rows.into_iter().map(batch_from_row).collect()
    }

    /// List batches in a given status
    pub async fn list_batches_by_status(&self, status: BatchStatus) -> AppResult<Vec<Batch>> {
        let rows = sqlx::query_as::<_, BatchRow>(
            r#"
            SELECT id, batch_number, product_id, quantity_initial, quantity_available,
                   manufacture_date, expiration_date, unit_cost, status,
                   blocked_reason, notes, created_at, updated_at
            FROM batches
            WHERE status = $1
            ORDER BY expiration_date ASC NULLS LAST, created_at ASC
            "#,
        )
        .bind(status.as_str())
        .fetch_all(&self.db)
        .await?;

        rows.into_iter().map(batch_from_row).collect()
    }

    /// List batches with remaining stock expiring within the given number of
    /// days (today inclusive)
    pub async fn list_expiring_within(&self, days: i32) -> AppResult<Vec<Batch>> {
        let rows = sqlx::query_as::<_, BatchRow>(
            r#"
            SELECT id, batch_number, product_id, quantity_initial, quantity_available,
                   manufacture_date, expiration_date, unit_cost, status,
                   blocked_reason, notes, created_at, updated_at
            FROM batches
            WHERE expiration_date IS NOT NULL
              AND expiration_date <= CURRENT_DATE + $1
              AND quantity_available > 0
            ORDER BY expiration_date ASC, created_at ASC
            "#,
        )
        .bind(days)
        .fetch_all(&self.db)
        .await?;

        rows.into_iter().map(batch_from_row).collect()
    }

    /// Count a product's batches
    pub async fn count_for_product(&self, product_id: Uuid) -> AppResult<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM batches WHERE product_id = $1",
        )
        .bind(product_id)
        .fetch_one(&self.db)
        .await?;

        Ok(count)
    }

    /// Lock a batch row for the remainder of the transaction
    async fn lock_batch(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        batch_id: Uuid,
    ) -> AppResult<Batch> {
        self.try_lock_batch(tx, batch_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Batch".to_string()))
    }

    async fn try_lock_batch(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        batch_id: Uuid,
    ) -> AppResult<Option<Batch>> {
        let row = sqlx::query_as::<_, BatchRow>(
            r#"
            SELECT id, batch_number, product_id, quantity_initial, quantity_available,
                   manufacture_date, expiration_date, unit_cost, status,
                   blocked_reason, notes, created_at, updated_at
            FROM batches
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(batch_id)
        .fetch_optional(&mut **tx)
        .await?;

        row.map(batch_from_row).transpose()
    }

    /// Persist new quantities with a freshly derived status
    async fn store_quantities(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        batch: &Batch,
        quantity_initial: i64,
        quantity_available: i64,
    ) -> AppResult<Batch> {
        let today = Utc::now().date_naive();
        let status = derive_status(
            quantity_available,
            batch.expiration_date,
            today,
            batch.status,
            self.near_expiry_days,
        );

        let row = sqlx::query_as::<_, BatchRow>(
            r#"
            UPDATE batches
            SET quantity_initial = $1, quantity_available = $2, status = $3,
                updated_at = NOW()
            WHERE id = $4
            RETURNING id, batch_number, product_id, quantity_initial, quantity_available,
                      manufacture_date, expiration_date, unit_cost, status,
                      blocked_reason, notes, created_at, updated_at
            "#,
        )
        .bind(quantity_initial)
        .bind(quantity_available)
        .bind(status.as_str())
        .bind(batch.id)
        .fetch_one(&mut **tx)
        .await?;

        batch_from_row(row)
    }
}
