//! Movement recorder service
//!
//! The append-only ledger of stock-affecting events and the only writer of
//! the product aggregate counter. Every registration runs in one transaction
//! with the product row (and any batch rows) locked for the duration, so the
//! aggregate always equals the sum over batches when the transaction commits.
//! Product first, then batches: every caller locks in that order.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use shared::{
    format_movement_number, select_batch, validate_quantity, validate_unit_price, Batch,
    DateRange, Movement, MovementDirection, MovementType, NEAR_EXPIRY_WINDOW_DAYS,
};

use crate::error::{AppError, AppResult};

use super::batch::{batch_from_row, BatchRow, BatchService};
use super::{sequence, AlertService};

/// Movement recorder service
#[derive(Clone)]
pub struct MovementService {
    db: PgPool,
    batches: BatchService,
    alerts: AlertService,
}

/// Row shape shared by all movement queries
type MovementRow = (
    Uuid,
    String,
    String,
    i64,
    Option<Decimal>,
    i64,
    i64,
    Uuid,
    Option<Uuid>,
    Uuid,
    Option<String>,
    DateTime<Utc>,
);

fn movement_from_row(row: MovementRow) -> AppResult<Movement> {
    let movement_type = MovementType::from_str(&row.2)
        .ok_or_else(|| AppError::Internal(format!("unknown movement type '{}'", row.2)))?;

    Ok(Movement {
        id: row.0,
        movement_number: row.1,
        movement_type,
        quantity: row.3,
        unit_price: row.4,
        stock_before: row.5,
        stock_after: row.6,
        product_id: row.7,
        batch_id: row.8,
        performed_by: row.9,
        document_ref: row.10,
        created_at: row.11,
    })
}

/// Product fields read (and locked) at the start of a registration
struct LockedProduct {
    code: String,
    name: String,
    stock_minimum: i64,
    stock_current: i64,
    is_active: bool,
}

/// Input for registering a stock entry
#[derive(Debug, Deserialize)]
pub struct RegisterEntryInput {
    pub product_id: Uuid,
    /// Entries always name the receiving batch
    pub batch_id: Uuid,
    pub movement_type: MovementType,
    pub quantity: i64,
    pub unit_price: Option<Decimal>,
    pub document_ref: Option<String>,
}

/// Input for registering a stock exit
#[derive(Debug, Deserialize)]
pub struct RegisterExitInput {
    pub product_id: Uuid,
    /// When omitted, the allocation engine picks the batch
    pub batch_id: Option<Uuid>,
    pub movement_type: MovementType,
    pub quantity: i64,
    pub unit_price: Option<Decimal>,
    pub document_ref: Option<String>,
}

impl MovementService {
    /// Create a new MovementService instance
    pub fn new(db: PgPool) -> Self {
        Self::with_near_expiry_window(db, NEAR_EXPIRY_WINDOW_DAYS)
    }

    /// Create with an explicit near-expiry window (days)
    pub fn with_near_expiry_window(db: PgPool, near_expiry_days: i64) -> Self {
        Self {
            batches: BatchService::with_near_expiry_window(db.clone(), near_expiry_days),
            alerts: AlertService::with_near_expiry_window(db.clone(), near_expiry_days),
            db,
        }
    }

    /// Register a stock entry: raises the batch quantity and the product
    /// aggregate, and appends the movement record.
    pub async fn register_entry(
        &self,
        performed_by: Uuid,
        input: RegisterEntryInput,
    ) -> AppResult<Movement> {
        if input.movement_type.direction() != MovementDirection::Entry {
            return Err(AppError::Validation {
                field: "movement_type".to_string(),
                message: format!("{} is not an entry type", input.movement_type.as_str()),
                message_th: "ประเภทรายการไม่ใช่การรับเข้า".to_string(),
            });
        }

        self.validate_common(input.quantity, input.unit_price)?;

        let mut tx = self.db.begin().await?;

        let product = self.lock_product(&mut tx, input.product_id).await?;

        let batch = self
            .batches
            .add_quantity_tx(&mut tx, input.batch_id, input.product_id, input.quantity)
            .await?;

        let stock_before = product.stock_current;
        let stock_after = stock_before + input.quantity;

        self.store_stock(&mut tx, input.product_id, stock_after).await?;

        let movement = self
            .insert_movement(
                &mut tx,
                MovementDirection::Entry,
                &input.movement_type,
                input.quantity,
                input.unit_price,
                stock_before,
                stock_after,
                input.product_id,
                Some(batch.id),
                performed_by,
                input.document_ref,
            )
            .await?;

        tx.commit().await?;

        tracing::info!(
            "Registered entry {} for product {}: +{}",
            movement.movement_number,
            product.code,
            input.quantity
        );

        Ok(movement)
    }

    /// Register a stock exit: deducts from an explicit batch, or lets the
    /// allocation engine pick one, and appends the movement record. Evaluates
    /// stock alerts after commit; an alert failure never affects the
    /// registered movement.
    pub async fn register_exit(
        &self,
        performed_by: Uuid,
        input: RegisterExitInput,
    ) -> AppResult<Movement> {
        if input.movement_type.direction() != MovementDirection::Exit {
            return Err(AppError::Validation {
                field: "movement_type".to_string(),
                message: format!("{} is not an exit type", input.movement_type.as_str()),
                message_th: "ประเภทรายการไม่ใช่การจ่ายออก".to_string(),
            });
        }

        self.validate_common(input.quantity, input.unit_price)?;

        let mut tx = self.db.begin().await?;

        let product = self.lock_product(&mut tx, input.product_id).await?;

        if product.stock_current < input.quantity {
            return Err(AppError::InsufficientStock {
                message: format!(
                    "Insufficient stock for {} ({}): requested {}, available {}",
                    product.name, product.code, input.quantity, product.stock_current
                ),
                message_th: format!(
                    "สินค้า {} ({}) มีไม่เพียงพอ: ต้องการ {} คงเหลือ {}",
                    product.name, product.code, input.quantity, product.stock_current
                ),
            });
        }

        let batch = match input.batch_id {
            Some(batch_id) => {
                self.batches
                    .deduct_quantity_tx(&mut tx, batch_id, input.product_id, input.quantity)
                    .await?
            }
            None => {
                let chosen = self
                    .allocate(&mut tx, input.product_id, input.quantity, &product)
                    .await?;
                self.batches
                    .deduct_quantity_tx(&mut tx, chosen.id, input.product_id, input.quantity)
                    .await?
            }
        };

        let stock_before = product.stock_current;
        let stock_after = stock_before - input.quantity;

        self.store_stock(&mut tx, input.product_id, stock_after).await?;

        let movement = self
            .insert_movement(
                &mut tx,
                MovementDirection::Exit,
                &input.movement_type,
                input.quantity,
                input.unit_price,
                stock_before,
                stock_after,
                input.product_id,
                Some(batch.id),
                performed_by,
                input.document_ref,
            )
            .await?;

        tx.commit().await?;

        tracing::info!(
            "Registered exit {} for product {}: -{}",
            movement.movement_number,
            product.code,
            input.quantity
        );

        // Alert evaluation is non-fatal: the movement is committed either way
        if stock_after <= product.stock_minimum {
            if let Err(e) = self.alerts.evaluate_product_stock(input.product_id).await {
                tracing::warn!(
                    "Stock alert evaluation failed for product {}: {}",
                    input.product_id,
                    e
                );
            }
        }

        Ok(movement)
    }

    /// Get a movement by ID
    pub async fn get_movement(&self, movement_id: Uuid) -> AppResult<Movement> {
        let row = sqlx::query_as::<_, MovementRow>(
            r#"
            SELECT id, movement_number, movement_type, quantity, unit_price,
                   stock_before, stock_after, product_id, batch_id, performed_by,
                   document_ref, created_at
            FROM movements
            WHERE id = $1
            "#,
        )
        .bind(movement_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Movement".to_string()))?;

        movement_from_row(row)
    }

    /// Get a movement by its unique number
    pub async fn get_by_number(&self, movement_number: &str) -> AppResult<Movement> {
        let row = sqlx::query_as::<_, MovementRow>(
            r#"
            SELECT id, movement_number, movement_type, quantity, unit_price,
                   stock_before, stock_after, product_id, batch_id, performed_by,
                   document_ref, created_at
            FROM movements
            WHERE movement_number = $1
            "#,
        )
        .bind(movement_number)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Movement".to_string()))?;

        movement_from_row(row)
    }

    /// List a product's movements, newest first
    pub async fn list_by_product(&self, product_id: Uuid) -> AppResult<Vec<Movement>> {
        let rows = sqlx::query_as::<_, MovementRow>(
            r#"
            SELECT id, movement_number, movement_type, quantity, unit_price,
                   stock_before, stock_after, product_id, batch_id, performed_by,
                   document_ref, created_at
            FROM movements
            WHERE product_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(product_id)
        .fetch_all(&self.db)
        .await?;

        rows.into_iter().map(movement_from_row).collect()
    }

    /// List movements of a given type, newest first
    pub async fn list_by_type(&self, movement_type: MovementType) -> AppResult<Vec<Movement>> {
        let rows = sqlx::query_as::<_, MovementRow>(
            r#"
            SELECT id, movement_number, movement_type, quantity, unit_price,
                   stock_before, stock_after, product_id, batch_id, performed_by,
                   document_ref, created_at
            FROM movements
            WHERE movement_type = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(movement_type.as_str())
        .fetch_all(&self.db)
        .await?;

        rows.into_iter().map(movement_from_row).collect()
    }

    /// List movements within an inclusive date range, optionally per product
    pub async fn list_by_date_range(
        &self,
        range: &DateRange,
        product_id: Option<Uuid>,
    ) -> AppResult<Vec<Movement>> {
        let rows = sqlx::query_as::<_, MovementRow>(
            r#"
            SELECT id, movement_number, movement_type, quantity, unit_price,
                   stock_before, stock_after, product_id, batch_id, performed_by,
                   document_ref, created_at
            FROM movements
            WHERE created_at::date BETWEEN $1 AND $2
              AND ($3::uuid IS NULL OR product_id = $3)
            ORDER BY created_at DESC
            "#,
        )
        .bind(range.start)
        .bind(range.end)
        .bind(product_id)
        .fetch_all(&self.db)
        .await?;

        rows.into_iter().map(movement_from_row).collect()
    }

    /// List movements of the last N days, newest first
    pub async fn list_recent(&self, days: i32) -> AppResult<Vec<Movement>> {
        let rows = sqlx::query_as::<_, MovementRow>(
            r#"
            SELECT id, movement_number, movement_type, quantity, unit_price,
                   stock_before, stock_after, product_id, batch_id, performed_by,
                   document_ref, created_at
            FROM movements
            WHERE created_at >= NOW() - make_interval(days => $1)
            ORDER BY created_at DESC
            "#,
        )
        .bind(days)
        .fetch_all(&self.db)
        .await?;

        rows.into_iter().map(movement_from_row).collect()
    }

    /// Count a product's movements
    pub async fn count_for_product(&self, product_id: Uuid) -> AppResult<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM movements WHERE product_id = $1",
        )
        .bind(product_id)
        .fetch_one(&self.db)
        .await?;

        Ok(count)
    }

    fn validate_common(&self, quantity: i64, unit_price: Option<Decimal>) -> AppResult<()> {
        if validate_quantity(quantity).is_err() {
            return Err(AppError::Validation {
                field: "quantity".to_string(),
                message: "Quantity must be positive".to_string(),
                message_th: "ปริมาณต้องเป็นค่าบวก".to_string(),
            });
        }

        if let Some(price) = unit_price {
            if let Err(msg) = validate_unit_price(price) {
                return Err(AppError::Validation {
                    field: "unit_price".to_string(),
                    message: msg.to_string(),
                    message_th: "ราคาต่อหน่วยต้องไม่ติดลบ".to_string(),
                });
            }
        }

        Ok(())
    }

    /// Lock the product row for the remainder of the transaction
    async fn lock_product(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        product_id: Uuid,
    ) -> AppResult<LockedProduct> {
        let row = sqlx::query_as::<_, (String, String, i64, i64, bool)>(
            r#"
            SELECT code, name, stock_minimum, stock_current, is_active
            FROM products
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(product_id)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Product".to_string()))?;

        let product = LockedProduct {
            code: row.0,
            name: row.1,
            stock_minimum: row.2,
            stock_current: row.3,
            is_active: row.4,
        };

        if !product.is_active {
            return Err(AppError::InvalidStateTransition(
                "product is inactive".to_string(),
            ));
        }

        Ok(product)
    }

    /// Pick the batch for a batchless exit. Candidate rows are locked before
    /// selection so the chosen batch cannot be drained concurrently.
    async fn allocate(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        product_id: Uuid,
        quantity: i64,
        product: &LockedProduct,
    ) -> AppResult<Batch> {
        let rows = sqlx::query_as::<_, BatchRow>(
            r#"
            SELECT id, batch_number, product_id, quantity_initial, quantity_available,
                   manufacture_date, expiration_date, unit_cost, status,
                   blocked_reason, notes, created_at, updated_at
            FROM batches
            WHERE product_id = $1
              AND quantity_available > 0
              AND status IN ('available', 'near_expiry')
            ORDER BY expiration_date ASC NULLS LAST, created_at ASC
            FOR UPDATE
            "#,
        )
        .bind(product_id)
        .fetch_all(&mut **tx)
        .await?;

        let candidates = rows
            .into_iter()
            .map(batch_from_row)
            .collect::<AppResult<Vec<Batch>>>()?;

        select_batch(&candidates, quantity)
            .cloned()
            .ok_or_else(|| AppError::NoBatchAvailable {
                message: format!(
                    "No single batch of {} ({}) can satisfy quantity {}",
                    product.name, product.code, quantity
                ),
                message_th: format!(
                    "ไม่มีล็อตใดของ {} ({}) ที่จ่ายจำนวน {} ได้ครบในล็อตเดียว",
                    product.name, product.code, quantity
                ),
            })
    }

    async fn store_stock(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        product_id: Uuid,
        stock_current: i64,
    ) -> AppResult<()> {
        sqlx::query(
            "UPDATE products SET stock_current = $1, updated_at = NOW() WHERE id = $2",
        )
        .bind(stock_current)
        .bind(product_id)
        .execute(&mut **tx)
        .await?;

        Ok(())
    }

    /// Allocate the next movement number and append the record
    #[allow(clippy::too_many_arguments)]
    async fn insert_movement(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        direction: MovementDirection,
        movement_type: &MovementType,
        quantity: i64,
        unit_price: Option<Decimal>,
        stock_before: i64,
        stock_after: i64,
        product_id: Uuid,
        batch_id: Option<Uuid>,
        performed_by: Uuid,
        document_ref: Option<String>,
    ) -> AppResult<Movement> {
        let today: NaiveDate = Utc::now().date_naive();
        let scope = format!("MOV-{}", direction.number_prefix());
        let period = today.format("%Y%m%d").to_string();
        let sequence = sequence::next_value(&mut **tx, &scope, &period).await?;
        let movement_number = format_movement_number(direction, today, sequence);

        let row = sqlx::query_as::<_, (Uuid, DateTime<Utc>)>(
            r#"
            INSERT INTO movements (movement_number, movement_type, quantity, unit_price,
                                   stock_before, stock_after, product_id, batch_id,
                                   performed_by, document_ref)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING id, created_at
            "#,
        )
        .bind(&movement_number)
        .bind(movement_type.as_str())
        .bind(quantity)
        .bind(unit_price)
        .bind(stock_before)
        .bind(stock_after)
        .bind(product_id)
        .bind(batch_id)
        .bind(performed_by)
        .bind(&document_ref)
        .fetch_one(&mut **tx)
        .await?;

        Ok(Movement {
            id: row.0,
            movement_number,
            movement_type: *movement_type,
            quantity,
            unit_price,
            stock_before,
            stock_after,
            product_id,
            batch_id,
            performed_by,
            document_ref,
            created_at: row.1,
        })
    }
}
