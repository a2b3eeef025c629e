//! Alert models and rule evaluation
//!
//! Alerts are derived from catalog and batch state. At most one unread alert
//! may exist per (product, category) or (batch, category) pair; the rules
//! here decide *whether* a condition qualifies, the service layer handles
//! deduplication and persistence.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::BatchStatus;

/// Alert categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertCategory {
    StockLow,
    StockDepleted,
    BatchNearExpiry,
    BatchExpired,
}

impl AlertCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertCategory::StockLow => "stock_low",
            AlertCategory::StockDepleted => "stock_depleted",
            AlertCategory::BatchNearExpiry => "batch_near_expiry",
            AlertCategory::BatchExpired => "batch_expired",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "stock_low" => Some(AlertCategory::StockLow),
            "stock_depleted" => Some(AlertCategory::StockDepleted),
            "batch_near_expiry" => Some(AlertCategory::BatchNearExpiry),
            "batch_expired" => Some(AlertCategory::BatchExpired),
            _ => None,
        }
    }

    /// Priority assigned to alerts of this category
    pub fn priority(&self) -> AlertPriority {
        match self {
            AlertCategory::StockLow => AlertPriority::High,
            AlertCategory::StockDepleted => AlertPriority::Critical,
            AlertCategory::BatchNearExpiry => AlertPriority::Medium,
            AlertCategory::BatchExpired => AlertPriority::Critical,
        }
    }
}

/// Alert priority levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertPriority {
    Critical,
    High,
    Medium,
    Low,
}

impl AlertPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertPriority::Critical => "critical",
            AlertPriority::High => "high",
            AlertPriority::Medium => "medium",
            AlertPriority::Low => "low",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "critical" => Some(AlertPriority::Critical),
            "high" => Some(AlertPriority::High),
            "medium" => Some(AlertPriority::Medium),
            "low" => Some(AlertPriority::Low),
            _ => None,
        }
    }
}

/// An alert raised by the generator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub id: Uuid,
    pub category: AlertCategory,
    pub message: String,
    pub message_th: Option<String>,
    pub priority: AlertPriority,
    pub is_read: bool,
    pub product_id: Uuid,
    pub batch_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub read_at: Option<DateTime<Utc>>,
}

/// Evaluate the stock-level rules for a product.
///
/// Depletion takes priority: a product at zero yields `StockDepleted`, one at
/// or below its reorder threshold (but above zero) yields `StockLow`.
pub fn stock_alert_for(stock_current: i64, stock_minimum: i64) -> Option<AlertCategory> {
    if stock_current == 0 {
        Some(AlertCategory::StockDepleted)
    } else if stock_current <= stock_minimum {
        Some(AlertCategory::StockLow)
    } else {
        None
    }
}

/// Evaluate the batch-transition rules.
///
/// Only a transition *into* `NearExpiry` or `Expired` qualifies; a batch that
/// was already in the state does not raise a new alert.
pub fn batch_alert_for(previous: BatchStatus, current: BatchStatus) -> Option<AlertCategory> {
    match current {
        BatchStatus::NearExpiry if previous != BatchStatus::NearExpiry => {
            Some(AlertCategory::BatchNearExpiry)
        }
        BatchStatus::Expired if previous != BatchStatus::Expired => {
            Some(AlertCategory::BatchExpired)
        }
        _ => None,
    }
}

/// Build the bilingual message pair for a stock-level alert
pub fn stock_alert_messages(
    category: AlertCategory,
    product_name: &str,
    product_code: &str,
    stock_current: i64,
    stock_minimum: i64,
) -> (String, String) {
    match category {
        AlertCategory::StockDepleted => (
            format!("Stock depleted for {} ({})", product_name, product_code),
            format!("สินค้า {} ({}) หมดสต็อกแล้ว", product_name, product_code),
        ),
        _ => (
            format!(
                "Stock low for {} ({}): {} remaining, minimum is {}",
                product_name, product_code, stock_current, stock_minimum
            ),
            format!(
                "สินค้า {} ({}) ใกล้หมดสต็อก: เหลือ {} จากเกณฑ์ขั้นต่ำ {}",
                product_name, product_code, stock_current, stock_minimum
            ),
        ),
    }
}

/// Build the bilingual message pair for a batch-expiry alert
pub fn batch_alert_messages(
    category: AlertCategory,
    batch_number: &str,
    expiration_date: Option<NaiveDate>,
) -> (String, String) {
    let date = expiration_date
        .map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| "-".to_string());
    match category {
        AlertCategory::BatchExpired => (
            format!("Batch {} expired on {}", batch_number, date),
            format!("ล็อต {} หมดอายุแล้วเมื่อ {}", batch_number, date),
        ),
        _ => (
            format!("Batch {} expires on {}", batch_number, date),
            format!("ล็อต {} จะหมดอายุในวันที่ {}", batch_number, date),
        ),
    }
}
