//! Batch models and the status state machine

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Default near-expiry window in days. Deployments may override it via the
/// sweep configuration; every caller passes the window explicitly.
pub const NEAR_EXPIRY_WINDOW_DAYS: i64 = 30;

/// Status of a batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    Available,
    NearExpiry,
    Expired,
    Depleted,
    Blocked,
}

impl BatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BatchStatus::Available => "available",
            BatchStatus::NearExpiry => "near_expiry",
            BatchStatus::Expired => "expired",
            BatchStatus::Depleted => "depleted",
            BatchStatus::Blocked => "blocked",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "available" => Some(BatchStatus::Available),
            "near_expiry" => Some(BatchStatus::NearExpiry),
            "expired" => Some(BatchStatus::Expired),
            "depleted" => Some(BatchStatus::Depleted),
            "blocked" => Some(BatchStatus::Blocked),
            _ => None,
        }
    }

    /// Whether the allocation engine may pick a batch in this status
    pub fn is_allocatable(&self) -> bool {
        matches!(self, BatchStatus::Available | BatchStatus::NearExpiry)
    }
}

impl std::fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Derive the status of a batch from its quantity, expiration date, and the
/// current status.
///
/// Pure and deterministic: recomputing with the same inputs always yields the
/// same result. Rules, in priority order:
///
/// 1. Zero quantity is `Depleted`, regardless of anything else.
/// 2. A blocked batch stays `Blocked` until explicitly unblocked.
/// 3. On or past the expiration date is `Expired`.
/// 4. Within `window_days` of the expiration date is `NearExpiry`
///    (a batch expiring exactly `window_days` from today qualifies).
/// 5. Otherwise `Available`.
pub fn derive_status(
    quantity_available: i64,
    expiration_date: Option<NaiveDate>,
    today: NaiveDate,
    current: BatchStatus,
    window_days: i64,
) -> BatchStatus {
    if quantity_available == 0 {
        return BatchStatus::Depleted;
    }
    if current == BatchStatus::Blocked {
        return BatchStatus::Blocked;
    }
    if let Some(expiry) = expiration_date {
        if today >= expiry {
            return BatchStatus::Expired;
        }
        if (expiry - today).num_days() <= window_days {
            return BatchStatus::NearExpiry;
        }
    }
    BatchStatus::Available
}

/// A batch: a dated, finite-quantity subdivision of a product's stock
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Batch {
    pub id: Uuid,
    /// Unique batch number (e.g., "LOT-2025-00042")
    pub batch_number: String,
    pub product_id: Uuid,
    pub quantity_initial: i64,
    /// Remaining quantity; always within `0..=quantity_initial`
    pub quantity_available: i64,
    pub manufacture_date: NaiveDate,
    pub expiration_date: Option<NaiveDate>,
    pub unit_cost: Decimal,
    pub status: BatchStatus,
    /// Reason recorded when the batch was blocked
    pub blocked_reason: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A status change observed by the sweep, input to the alert generator
#[derive(Debug, Clone, Serialize)]
pub struct BatchStatusChange {
    pub batch_id: Uuid,
    pub product_id: Uuid,
    pub batch_number: String,
    pub expiration_date: Option<NaiveDate>,
    pub previous: BatchStatus,
    pub current: BatchStatus,
}
