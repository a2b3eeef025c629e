//! Product catalog models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A product tracked by the stock core
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub id: Uuid,
    /// Unique product code (e.g., "PRD-2025-0001")
    pub code: String,
    pub name: String,
    pub description: Option<String>,
    /// Reorder threshold: stock at or below this level raises a stock-low alert
    pub stock_minimum: i64,
    /// Aggregate quantity across all of the product's batches.
    /// Written only by the movement recorder.
    pub stock_current: i64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Generate a product code: PRD-YYYY-NNNN
pub fn format_product_code(year: i32, sequence: i64) -> String {
    format!("PRD-{}-{:04}", year, sequence)
}

/// Generate a batch number: LOT-YYYY-NNNNN
pub fn format_batch_number(year: i32, sequence: i64) -> String {
    format!("LOT-{}-{:05}", year, sequence)
}
