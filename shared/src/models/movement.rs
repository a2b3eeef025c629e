//! Stock movement models
//!
//! Movements form an append-only ledger: every stock-affecting event is
//! recorded with a before/after snapshot of the product's aggregate quantity
//! and is never updated or deleted afterwards.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Types of stock movements
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovementType {
    // Entries
    Purchase,
    CustomerReturn,
    EntryAdjustment,
    // Exits
    Sale,
    Consumption,
    WriteOff,
    ExitAdjustment,
    // Recorded by the warehouse-transfer flow, outside this core
    Transfer,
}

impl MovementType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MovementType::Purchase => "purchase",
            MovementType::CustomerReturn => "customer_return",
            MovementType::EntryAdjustment => "entry_adjustment",
            MovementType::Sale => "sale",
            MovementType::Consumption => "consumption",
            MovementType::WriteOff => "write_off",
            MovementType::ExitAdjustment => "exit_adjustment",
            MovementType::Transfer => "transfer",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "purchase" => Some(MovementType::Purchase),
            "customer_return" => Some(MovementType::CustomerReturn),
            "entry_adjustment" => Some(MovementType::EntryAdjustment),
            "sale" => Some(MovementType::Sale),
            "consumption" => Some(MovementType::Consumption),
            "write_off" => Some(MovementType::WriteOff),
            "exit_adjustment" => Some(MovementType::ExitAdjustment),
            "transfer" => Some(MovementType::Transfer),
            _ => None,
        }
    }

    pub fn direction(&self) -> MovementDirection {
        match self {
            MovementType::Purchase
            | MovementType::CustomerReturn
            | MovementType::EntryAdjustment => MovementDirection::Entry,
            MovementType::Sale
            | MovementType::Consumption
            | MovementType::WriteOff
            | MovementType::ExitAdjustment => MovementDirection::Exit,
            MovementType::Transfer => MovementDirection::Transfer,
        }
    }
}

/// Direction of a movement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MovementDirection {
    Entry,
    Exit,
    Transfer,
}

impl MovementDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            MovementDirection::Entry => "entry",
            MovementDirection::Exit => "exit",
            MovementDirection::Transfer => "transfer",
        }
    }

    /// Prefix segment of the movement number for this direction
    pub fn number_prefix(&self) -> &'static str {
        match self {
            MovementDirection::Entry => "ENT",
            MovementDirection::Exit => "SAL",
            MovementDirection::Transfer => "TRF",
        }
    }
}

/// Format a movement number: MOV-{ENT|SAL|TRF}-YYYYMMDD-NNNNN
///
/// The sequence is scoped per direction prefix and day; the caller obtains it
/// from an atomic counter so numbers are unique under concurrent writers.
pub fn format_movement_number(
    direction: MovementDirection,
    date: NaiveDate,
    sequence: i64,
) -> String {
    format!(
        "MOV-{}-{}-{:05}",
        direction.number_prefix(),
        date.format("%Y%m%d"),
        sequence
    )
}

/// An immutable record of a single stock-affecting event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Movement {
    pub id: Uuid,
    /// Unique, immutable number (e.g., "MOV-ENT-20250807-00001")
    pub movement_number: String,
    pub movement_type: MovementType,
    pub quantity: i64,
    pub unit_price: Option<Decimal>,
    /// Product aggregate quantity immediately before this movement
    pub stock_before: i64,
    /// Product aggregate quantity immediately after this movement
    pub stock_after: i64,
    pub product_id: Uuid,
    pub batch_id: Option<Uuid>,
    /// Authenticated user who performed the movement, supplied by the caller
    pub performed_by: Uuid,
    /// External document reference (invoice, delivery note, ...)
    pub document_ref: Option<String>,
    pub created_at: DateTime<Utc>,
}
