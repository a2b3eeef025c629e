//! Alert generator tests
//!
//! Covers:
//! - The rule table: category and priority per condition
//! - Threshold boundaries (at the minimum, above it, at zero)
//! - Unread deduplication: re-evaluating an unchanged condition creates
//!   nothing new
//! - Bilingual message builders

use chrono::NaiveDate;
use proptest::prelude::*;
use uuid::Uuid;

use shared::{
    batch_alert_for, batch_alert_messages, stock_alert_for, stock_alert_messages, AlertCategory,
    AlertPriority, BatchStatus,
};

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod unit_tests {
    use super::*;

    #[test]
    fn test_stock_rule_table() {
        // At or below the minimum, above zero: stock-low
        assert_eq!(stock_alert_for(5, 10), Some(AlertCategory::StockLow));
        assert_eq!(stock_alert_for(10, 10), Some(AlertCategory::StockLow));
        assert_eq!(stock_alert_for(1, 1), Some(AlertCategory::StockLow));
        // Above the minimum: nothing
        assert_eq!(stock_alert_for(11, 10), None);
        // Zero: depleted, regardless of the minimum
        assert_eq!(stock_alert_for(0, 10), Some(AlertCategory::StockDepleted));
        assert_eq!(stock_alert_for(0, 0), Some(AlertCategory::StockDepleted));
        // A zero minimum disables the low rule but not depletion
        assert_eq!(stock_alert_for(1, 0), None);
    }

    #[test]
    fn test_priority_table() {
        assert_eq!(AlertCategory::StockLow.priority(), AlertPriority::High);
        assert_eq!(
            AlertCategory::StockDepleted.priority(),
            AlertPriority::Critical
        );
        assert_eq!(
            AlertCategory::BatchNearExpiry.priority(),
            AlertPriority::Medium
        );
        assert_eq!(
            AlertCategory::BatchExpired.priority(),
            AlertPriority::Critical
        );
    }

    #[test]
    fn test_batch_transition_rules() {
        // Entering near-expiry or expired raises an alert
        assert_eq!(
            batch_alert_for(BatchStatus::Available, BatchStatus::NearExpiry),
            Some(AlertCategory::BatchNearExpiry)
        );
        assert_eq!(
            batch_alert_for(BatchStatus::NearExpiry, BatchStatus::Expired),
            Some(AlertCategory::BatchExpired)
        );
        assert_eq!(
            batch_alert_for(BatchStatus::Available, BatchStatus::Expired),
            Some(AlertCategory::BatchExpired)
        );
    }

    #[test]
    fn test_batch_transitions_without_alert() {
        // Staying in the same state raises nothing
        assert_eq!(
            batch_alert_for(BatchStatus::NearExpiry, BatchStatus::NearExpiry),
            None
        );
        assert_eq!(
            batch_alert_for(BatchStatus::Expired, BatchStatus::Expired),
            None
        );
        // Other transitions are not alert conditions
        assert_eq!(
            batch_alert_for(BatchStatus::Available, BatchStatus::Depleted),
            None
        );
        assert_eq!(
            batch_alert_for(BatchStatus::Blocked, BatchStatus::Available),
            None
        );
        assert_eq!(
            batch_alert_for(BatchStatus::Expired, BatchStatus::Depleted),
            None
        );
    }

    #[test]
    fn test_category_string_roundtrip() {
        let categories = [
            AlertCategory::StockLow,
            AlertCategory::StockDepleted,
            AlertCategory::BatchNearExpiry,
            AlertCategory::BatchExpired,
        ];

        for category in categories {
            assert_eq!(AlertCategory::from_str(category.as_str()), Some(category));
        }
    }

    #[test]
    fn test_priority_string_roundtrip() {
        let priorities = [
            AlertPriority::Critical,
            AlertPriority::High,
            AlertPriority::Medium,
            AlertPriority::Low,
        ];

        for priority in priorities {
            assert_eq!(AlertPriority::from_str(priority.as_str()), Some(priority));
        }
    }

    #[test]
    fn test_stock_messages_are_bilingual() {
        let (message, message_th) =
            stock_alert_messages(AlertCategory::StockLow, "Paracetamol 500mg", "PRD-2025-0001", 5, 10);

        assert!(message.contains("PRD-2025-0001"));
        assert!(message.contains('5'));
        assert!(message.contains("10"));
        assert!(!message_th.is_empty());

        let (depleted, depleted_th) =
            stock_alert_messages(AlertCategory::StockDepleted, "Paracetamol 500mg", "PRD-2025-0001", 0, 10);
        assert!(depleted.contains("depleted"));
        assert!(!depleted_th.is_empty());
    }

    #[test]
    fn test_batch_messages_carry_the_date() {
        let expiry = NaiveDate::from_ymd_opt(2025, 9, 6).unwrap();

        let (message, message_th) =
            batch_alert_messages(AlertCategory::BatchNearExpiry, "LOT-2025-00042", Some(expiry));
        assert!(message.contains("LOT-2025-00042"));
        assert!(message.contains("2025-09-06"));
        assert!(!message_th.is_empty());

        let (expired, _) =
            batch_alert_messages(AlertCategory::BatchExpired, "LOT-2025-00042", Some(expiry));
        assert!(expired.contains("expired"));
    }
}

// ============================================================================
// Deduplication Simulation
// ============================================================================

/// Mirrors the generator's unread bookkeeping: an alert is only inserted when
/// no unread alert exists for the same (product[, batch], category) pair.
#[cfg(test)]
mod dedup_tests {
    use super::*;

    struct AlertBook {
        unread: Vec<(Uuid, Option<Uuid>, AlertCategory)>,
    }

    impl AlertBook {
        fn new() -> Self {
            Self { unread: Vec::new() }
        }

        /// Returns true when a new alert was created
        fn raise(&mut self, product_id: Uuid, batch_id: Option<Uuid>, category: AlertCategory) -> bool {
            let key = (product_id, batch_id, category);
            if self.unread.contains(&key) {
                return false;
            }
            self.unread.push(key);
            true
        }

        fn mark_read(&mut self, product_id: Uuid, batch_id: Option<Uuid>, category: AlertCategory) {
            self.unread
                .retain(|key| *key != (product_id, batch_id, category));
        }
    }

    #[test]
    fn test_same_condition_twice_creates_one_alert() {
        let mut book = AlertBook::new();
        let product = Uuid::new_v4();

        assert!(book.raise(product, None, AlertCategory::StockLow));
        assert!(!book.raise(product, None, AlertCategory::StockLow));
        assert_eq!(book.unread.len(), 1);
    }

    /// Spec scenario: a batch sweeps into near-expiry, the first sweep
    /// creates exactly one medium-priority alert, the second creates none
    #[test]
    fn test_near_expiry_sweep_is_idempotent() {
        let mut book = AlertBook::new();
        let product = Uuid::new_v4();
        let batch = Uuid::new_v4();

        let first = batch_alert_for(BatchStatus::Available, BatchStatus::NearExpiry)
            .map(|category| book.raise(product, Some(batch), category));
        assert_eq!(first, Some(true));
        assert_eq!(AlertCategory::BatchNearExpiry.priority(), AlertPriority::Medium);

        // Second sweep: no transition (already near-expiry), and the dedup
        // check would skip it even if re-evaluated
        assert_eq!(
            batch_alert_for(BatchStatus::NearExpiry, BatchStatus::NearExpiry),
            None
        );
        assert!(!book.raise(product, Some(batch), AlertCategory::BatchNearExpiry));
        assert_eq!(book.unread.len(), 1);
    }

    /// Reading the alert allows the condition to raise a fresh one
    #[test]
    fn test_read_alert_allows_new_one() {
        let mut book = AlertBook::new();
        let product = Uuid::new_v4();

        assert!(book.raise(product, None, AlertCategory::StockDepleted));
        book.mark_read(product, None, AlertCategory::StockDepleted);
        assert!(book.raise(product, None, AlertCategory::StockDepleted));
    }

    /// Different categories or targets never collide
    #[test]
    fn test_dedup_is_per_pair() {
        let mut book = AlertBook::new();
        let product_a = Uuid::new_v4();
        let product_b = Uuid::new_v4();
        let batch = Uuid::new_v4();

        assert!(book.raise(product_a, None, AlertCategory::StockLow));
        assert!(book.raise(product_b, None, AlertCategory::StockLow));
        assert!(book.raise(product_a, Some(batch), AlertCategory::BatchNearExpiry));
        assert!(book.raise(product_a, Some(batch), AlertCategory::BatchExpired));
        assert_eq!(book.unread.len(), 4);
    }
}

// ============================================================================
// Property-Based Tests
// ============================================================================

#[cfg(test)]
mod property_tests {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        /// The stock rules partition the state space: depleted at zero,
        /// low within (0, minimum], nothing above
        #[test]
        fn prop_stock_rules_partition(
            stock_current in 0i64..1000,
            stock_minimum in 0i64..100
        ) {
            let expected = if stock_current == 0 {
                Some(AlertCategory::StockDepleted)
            } else if stock_current <= stock_minimum {
                Some(AlertCategory::StockLow)
            } else {
                None
            };
            prop_assert_eq!(stock_alert_for(stock_current, stock_minimum), expected);
        }

        /// Evaluating twice yields the same outcome (the rules are pure)
        #[test]
        fn prop_stock_rules_deterministic(
            stock_current in 0i64..1000,
            stock_minimum in 0i64..100
        ) {
            prop_assert_eq!(
                stock_alert_for(stock_current, stock_minimum),
                stock_alert_for(stock_current, stock_minimum)
            );
        }

        /// Above the threshold no alert ever fires
        #[test]
        fn prop_no_false_positives(
            stock_minimum in 0i64..100,
            margin in 1i64..1000
        ) {
            prop_assert_eq!(stock_alert_for(stock_minimum + margin, stock_minimum), None);
        }
    }
}
