//! Alert generator service
//!
//! Derives alerts from catalog and batch state and keeps them deduplicated:
//! at most one unread alert per (product, category) or (batch, category)
//! pair, enforced by partial unique indexes so concurrent sweeps cannot
//! double-insert. Alerts are delivered by an external notifier which calls
//! back through the read-state surface here.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use shared::{
    batch_alert_for, batch_alert_messages, stock_alert_for, stock_alert_messages, Alert,
    AlertCategory, AlertPriority, BatchStatusChange, PaginatedResponse, Pagination,
    PaginationMeta, NEAR_EXPIRY_WINDOW_DAYS,
};

use crate::error::{AppError, AppResult};

use super::batch::BatchService;

/// Alert generator service
#[derive(Clone)]
pub struct AlertService {
    db: PgPool,
    batches: BatchService,
}

/// Row shape shared by all alert queries
type AlertRow = (
    Uuid,
    String,
    String,
    Option<String>,
    String,
    bool,
    Uuid,
    Option<Uuid>,
    DateTime<Utc>,
    Option<DateTime<Utc>>,
);

fn alert_from_row(row: AlertRow) -> AppResult<Alert> {
    let category = AlertCategory::from_str(&row.1)
        .ok_or_else(|| AppError::Internal(format!("unknown alert category '{}'", row.1)))?;
    let priority = AlertPriority::from_str(&row.4)
        .ok_or_else(|| AppError::Internal(format!("unknown alert priority '{}'", row.4)))?;

    Ok(Alert {
        id: row.0,
        category,
        message: row.2,
        message_th: row.3,
        priority,
        is_read: row.5,
        product_id: row.6,
        batch_id: row.7,
        created_at: row.8,
        read_at: row.9,
    })
}

/// Filters for listing unread alerts
#[derive(Debug, Default, Deserialize)]
pub struct UnreadAlertFilter {
    pub priority: Option<AlertPriority>,
    pub product_id: Option<Uuid>,
    /// Only alerts created within the last N days
    pub within_days: Option<i32>,
    #[serde(default)]
    pub pagination: Pagination,
}

/// Outcome of one sweep run
#[derive(Debug, Clone, Serialize)]
pub struct SweepSummary {
    pub statuses_changed: usize,
    pub alerts_created: usize,
}

impl AlertService {
    /// Create a new AlertService instance with the default near-expiry window
    pub fn new(db: PgPool) -> Self {
        Self::with_near_expiry_window(db, NEAR_EXPIRY_WINDOW_DAYS)
    }

    /// Create with an explicit near-expiry window (days)
    pub fn with_near_expiry_window(db: PgPool, near_expiry_days: i64) -> Self {
        Self {
            batches: BatchService::with_near_expiry_window(db.clone(), near_expiry_days),
            db,
        }
    }

    /// Evaluate the stock-level rules for a product and insert the alert the
    /// rules call for, unless an unread one already exists for the pair.
    pub async fn evaluate_product_stock(&self, product_id: Uuid) -> AppResult<Option<Alert>> {
        let row = sqlx::query_as::<_, (String, String, i64, i64)>(
            "SELECT code, name, stock_minimum, stock_current FROM products WHERE id = $1",
        )
        .bind(product_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Product".to_string()))?;

        let (code, name, stock_minimum, stock_current) = row;

        let category = match stock_alert_for(stock_current, stock_minimum) {
            Some(category) => category,
            None => return Ok(None),
        };

        let exists = sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM alerts
                WHERE product_id = $1 AND category = $2
                  AND batch_id IS NULL AND is_read = false
            )
            "#,
        )
        .bind(product_id)
        .bind(category.as_str())
        .fetch_one(&self.db)
        .await?;

        if exists {
            return Ok(None);
        }

        let (message, message_th) =
            stock_alert_messages(category, &name, &code, stock_current, stock_minimum);

        let row = sqlx::query_as::<_, AlertRow>(
            r#"
            INSERT INTO alerts (category, message, message_th, priority, product_id)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (product_id, category) WHERE is_read = false AND batch_id IS NULL
            DO NOTHING
            RETURNING id, category, message, message_th, priority, is_read,
                      product_id, batch_id, created_at, read_at
            "#,
        )
        .bind(category.as_str())
        .bind(&message)
        .bind(&message_th)
        .bind(category.priority().as_str())
        .bind(product_id)
        .fetch_optional(&self.db)
        .await?;

        row.map(alert_from_row).transpose()
    }

    /// Evaluate the expiry rules for a batch status change observed by the
    /// sweep and insert the alert they call for.
    pub async fn evaluate_batch_change(
        &self,
        change: &BatchStatusChange,
    ) -> AppResult<Option<Alert>> {
        let category = match batch_alert_for(change.previous, change.current) {
            Some(category) => category,
            None => return Ok(None),
        };

        let exists = sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM alerts
                WHERE batch_id = $1 AND category = $2 AND is_read = false
            )
            "#,
        )
        .bind(change.batch_id)
        .bind(category.as_str())
        .fetch_one(&self.db)
        .await?;

        if exists {
            return Ok(None);
        }

        let (message, message_th) =
            batch_alert_messages(category, &change.batch_number, change.expiration_date);

        let row = sqlx::query_as::<_, AlertRow>(
            r#"
            INSERT INTO alerts (category, message, message_th, priority, product_id, batch_id)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (batch_id, category) WHERE is_read = false AND batch_id IS NOT NULL
            DO NOTHING
            RETURNING id, category, message, message_th, priority, is_read,
                      product_id, batch_id, created_at, read_at
            "#,
        )
        .bind(category.as_str())
        .bind(&message)
        .bind(&message_th)
        .bind(category.priority().as_str())
        .bind(change.product_id)
        .bind(change.batch_id)
        .fetch_optional(&self.db)
        .await?;

        row.map(alert_from_row).transpose()
    }

    /// Run a full sweep: recompute every batch status, then evaluate the
    /// alert rules for the changed batches and for every active product.
    /// Re-running against unchanged state creates nothing new.
    pub async fn sweep(&self) -> AppResult<SweepSummary> {
        let changes = self.batches.sweep_statuses().await?;
        let mut alerts_created = 0;

        for change in &changes {
            match self.evaluate_batch_change(change).await {
                Ok(Some(_)) => alerts_created += 1,
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(
                        "Batch alert evaluation failed for batch {}: {}",
                        change.batch_id,
                        e
                    );
                }
            }
        }

        let product_ids =
            sqlx::query_scalar::<_, Uuid>("SELECT id FROM products WHERE is_active = true")
                .fetch_all(&self.db)
                .await?;

        for product_id in product_ids {
            match self.evaluate_product_stock(product_id).await {
                Ok(Some(_)) => alerts_created += 1,
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(
                        "Stock alert evaluation failed for product {}: {}",
                        product_id,
                        e
                    );
                }
            }
        }

        let summary = SweepSummary {
            statuses_changed: changes.len(),
            alerts_created,
        };

        tracing::info!(
            "Sweep finished: {} status changes, {} alerts created",
            summary.statuses_changed,
            summary.alerts_created
        );

        Ok(summary)
    }

    /// Get an alert by ID
    pub async fn get_alert(&self, alert_id: Uuid) -> AppResult<Alert> {
        let row = sqlx::query_as::<_, AlertRow>(
            r#"
            SELECT id, category, message, message_th, priority, is_read,
                   product_id, batch_id, created_at, read_at
            FROM alerts
            WHERE id = $1
            "#,
        )
        .bind(alert_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Alert".to_string()))?;

        alert_from_row(row)
    }

    /// Mark an alert as read
    pub async fn mark_read(&self, alert_id: Uuid) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE alerts
            SET is_read = true, read_at = COALESCE(read_at, NOW())
            WHERE id = $1
            "#,
        )
        .bind(alert_id)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Alert".to_string()));
        }

        Ok(())
    }

    /// Mark an alert as unread again. Fails if another unread alert for the
    /// same pair has been raised in the meantime, since only one may exist.
    pub async fn mark_unread(&self, alert_id: Uuid) -> AppResult<()> {
        let mut tx = self.db.begin().await?;

        let row = sqlx::query_as::<_, (String, Uuid, Option<Uuid>, bool)>(
            "SELECT category, product_id, batch_id, is_read FROM alerts WHERE id = $1 FOR UPDATE",
        )
        .bind(alert_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Alert".to_string()))?;

        let (category, product_id, batch_id, is_read) = row;

        if !is_read {
            tx.commit().await?;
            return Ok(());
        }

        let sibling_unread = sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM alerts
                WHERE id <> $1 AND category = $2 AND product_id = $3
                  AND batch_id IS NOT DISTINCT FROM $4 AND is_read = false
            )
            "#,
        )
        .bind(alert_id)
        .bind(&category)
        .bind(product_id)
        .bind(batch_id)
        .fetch_one(&mut *tx)
        .await?;

        if sibling_unread {
            return Err(AppError::InvalidStateTransition(
                "an unread alert already exists for this target and category".to_string(),
            ));
        }

        sqlx::query("UPDATE alerts SET is_read = false, read_at = NULL WHERE id = $1")
            .bind(alert_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(())
    }

    /// Mark every unread alert as read; returns how many were affected
    pub async fn mark_all_read(&self) -> AppResult<i64> {
        let result = sqlx::query(
            r#"
            UPDATE alerts
            SET is_read = true, read_at = NOW()
            WHERE is_read = false
            "#,
        )
        .execute(&self.db)
        .await?;

        Ok(result.rows_affected() as i64)
    }

    /// Count unread alerts
    pub async fn count_unread(&self) -> AppResult<i64> {
        let count =
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM alerts WHERE is_read = false")
                .fetch_one(&self.db)
                .await?;

        Ok(count)
    }

    /// List unread alerts, newest first, filtered by priority, product, and
    /// recency
    pub async fn list_unread(
        &self,
        filter: &UnreadAlertFilter,
    ) -> AppResult<PaginatedResponse<Alert>> {
        let priority = filter.priority.map(|p| p.as_str());

        let total_items = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*)
            FROM alerts
            WHERE is_read = false
              AND ($1::text IS NULL OR priority = $1)
              AND ($2::uuid IS NULL OR product_id = $2)
              AND ($3::int IS NULL OR created_at >= NOW() - make_interval(days => $3))
            "#,
        )
        .bind(priority)
        .bind(filter.product_id)
        .bind(filter.within_days)
        .fetch_one(&self.db)
        .await?;

        let rows = sqlx::query_as::<_, AlertRow>(
            r#"
            SELECT id, category, message, message_th, priority, is_read,
                   product_id, batch_id, created_at, read_at
            FROM alerts
            WHERE is_read = false
              AND ($1::text IS NULL OR priority = $1)
              AND ($2::uuid IS NULL OR product_id = $2)
              AND ($3::int IS NULL OR created_at >= NOW() - make_interval(days => $3))
            ORDER BY created_at DESC
            LIMIT $4 OFFSET $5
            "#,
        )
        .bind(priority)
        .bind(filter.product_id)
        .bind(filter.within_days)
        .bind(filter.pagination.limit())
        .bind(filter.pagination.offset())
        .fetch_all(&self.db)
        .await?;

        let data = rows
            .into_iter()
            .map(alert_from_row)
            .collect::<AppResult<Vec<Alert>>>()?;

        Ok(PaginatedResponse {
            data,
            pagination: PaginationMeta::new(&filter.pagination, total_items as u64),
        })
    }

    /// Delete an alert
    pub async fn delete_alert(&self, alert_id: Uuid) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM alerts WHERE id = $1")
            .bind(alert_id)
            .execute(&self.db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Alert".to_string()));
        }

        Ok(())
    }
}
