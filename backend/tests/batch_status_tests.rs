//! Batch status state machine tests
//!
//! Covers:
//! - Rule priority (depletion over expiry, blocked latching)
//! - Expiry boundaries (expiring today, in 30 days, in 31 days)
//! - Determinism and idempotence of the derivation

use chrono::{Duration, NaiveDate};
use proptest::prelude::*;

use shared::{derive_status, BatchStatus, NEAR_EXPIRY_WINDOW_DAYS};

/// Fixed reference date so boundaries are stable
fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 8, 7).unwrap()
}

/// Expiration date a given number of days from the reference date
fn expiry_in(days: i64) -> Option<NaiveDate> {
    Some(today() + Duration::days(days))
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod unit_tests {
    use super::*;

    /// Depletion wins over every other rule
    #[test]
    fn test_depleted_takes_priority() {
        // Fresh batch, no expiry
        assert_eq!(
            derive_status(0, None, today(), BatchStatus::Available, 30),
            BatchStatus::Depleted
        );
        // Even past expiry
        assert_eq!(
            derive_status(0, expiry_in(-10), today(), BatchStatus::Expired, 30),
            BatchStatus::Depleted
        );
        // Even while blocked
        assert_eq!(
            derive_status(0, expiry_in(100), today(), BatchStatus::Blocked, 30),
            BatchStatus::Depleted
        );
    }

    /// A batch expiring exactly today is already expired
    #[test]
    fn test_expires_today_is_expired() {
        assert_eq!(
            derive_status(10, expiry_in(0), today(), BatchStatus::Available, 30),
            BatchStatus::Expired
        );
    }

    #[test]
    fn test_past_expiry_is_expired() {
        assert_eq!(
            derive_status(10, expiry_in(-1), today(), BatchStatus::Available, 30),
            BatchStatus::Expired
        );
        assert_eq!(
            derive_status(10, expiry_in(-365), today(), BatchStatus::NearExpiry, 30),
            BatchStatus::Expired
        );
    }

    /// Exactly 30 days out is near-expiry, 31 days out is available
    #[test]
    fn test_near_expiry_window_boundary() {
        assert_eq!(
            derive_status(10, expiry_in(30), today(), BatchStatus::Available, 30),
            BatchStatus::NearExpiry
        );
        assert_eq!(
            derive_status(10, expiry_in(31), today(), BatchStatus::Available, 30),
            BatchStatus::Available
        );
        assert_eq!(
            derive_status(10, expiry_in(1), today(), BatchStatus::Available, 30),
            BatchStatus::NearExpiry
        );
    }

    /// The window parameter moves the boundary
    #[test]
    fn test_custom_window() {
        assert_eq!(
            derive_status(10, expiry_in(45), today(), BatchStatus::Available, 60),
            BatchStatus::NearExpiry
        );
        assert_eq!(
            derive_status(10, expiry_in(45), today(), BatchStatus::Available, 30),
            BatchStatus::Available
        );
    }

    #[test]
    fn test_no_expiration_is_available() {
        assert_eq!(
            derive_status(10, None, today(), BatchStatus::Available, 30),
            BatchStatus::Available
        );
        // Recovers from a stale near-expiry status too
        assert_eq!(
            derive_status(10, None, today(), BatchStatus::NearExpiry, 30),
            BatchStatus::Available
        );
    }

    /// Blocked suppresses recomputation until explicitly cleared
    #[test]
    fn test_blocked_is_latched() {
        // Far from expiry: stays blocked rather than becoming available
        assert_eq!(
            derive_status(10, expiry_in(100), today(), BatchStatus::Blocked, 30),
            BatchStatus::Blocked
        );
        // Inside the window: stays blocked rather than near-expiry
        assert_eq!(
            derive_status(10, expiry_in(5), today(), BatchStatus::Blocked, 30),
            BatchStatus::Blocked
        );
        // Past expiry: still blocked, only depletion overrides
        assert_eq!(
            derive_status(10, expiry_in(-5), today(), BatchStatus::Blocked, 30),
            BatchStatus::Blocked
        );
    }

    /// A depleted batch that receives stock again is re-derived normally
    #[test]
    fn test_depleted_recovers_when_restocked() {
        assert_eq!(
            derive_status(5, expiry_in(100), today(), BatchStatus::Depleted, 30),
            BatchStatus::Available
        );
        assert_eq!(
            derive_status(5, expiry_in(10), today(), BatchStatus::Depleted, 30),
            BatchStatus::NearExpiry
        );
    }

    #[test]
    fn test_status_string_roundtrip() {
        let statuses = [
            BatchStatus::Available,
            BatchStatus::NearExpiry,
            BatchStatus::Expired,
            BatchStatus::Depleted,
            BatchStatus::Blocked,
        ];

        for status in statuses {
            assert_eq!(BatchStatus::from_str(status.as_str()), Some(status));
        }

        assert_eq!(BatchStatus::from_str("bogus"), None);
    }

    #[test]
    fn test_allocatable_statuses() {
        assert!(BatchStatus::Available.is_allocatable());
        assert!(BatchStatus::NearExpiry.is_allocatable());
        assert!(!BatchStatus::Expired.is_allocatable());
        assert!(!BatchStatus::Depleted.is_allocatable());
        assert!(!BatchStatus::Blocked.is_allocatable());
    }
}

// ============================================================================
// Property-Based Tests
// ============================================================================

#[cfg(test)]
mod property_tests {
    use super::*;

    fn status_strategy() -> impl Strategy<Value = BatchStatus> {
        prop_oneof![
            Just(BatchStatus::Available),
            Just(BatchStatus::NearExpiry),
            Just(BatchStatus::Expired),
            Just(BatchStatus::Depleted),
            Just(BatchStatus::Blocked),
        ]
    }

    fn expiry_strategy() -> impl Strategy<Value = Option<i64>> {
        prop_oneof![Just(None), (-120i64..400).prop_map(Some)]
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        /// Derivation is a pure function: same inputs, same output
        #[test]
        fn prop_derivation_deterministic(
            quantity in 0i64..10_000,
            expiry_days in expiry_strategy(),
            current in status_strategy()
        ) {
            let expiry = expiry_days.and_then(expiry_in);
            let first = derive_status(quantity, expiry, today(), current, NEAR_EXPIRY_WINDOW_DAYS);
            let second = derive_status(quantity, expiry, today(), current, NEAR_EXPIRY_WINDOW_DAYS);
            prop_assert_eq!(first, second);
        }

        /// Re-deriving from the derived status is a fixed point
        #[test]
        fn prop_derivation_idempotent(
            quantity in 0i64..10_000,
            expiry_days in expiry_strategy(),
            current in status_strategy()
        ) {
            let expiry = expiry_days.and_then(expiry_in);
            let derived = derive_status(quantity, expiry, today(), current, NEAR_EXPIRY_WINDOW_DAYS);
            let again = derive_status(quantity, expiry, today(), derived, NEAR_EXPIRY_WINDOW_DAYS);
            prop_assert_eq!(derived, again);
        }

        /// Zero quantity always derives to depleted
        #[test]
        fn prop_zero_quantity_is_depleted(
            expiry_days in expiry_strategy(),
            current in status_strategy()
        ) {
            let expiry = expiry_days.and_then(expiry_in);
            let derived = derive_status(0, expiry, today(), current, NEAR_EXPIRY_WINDOW_DAYS);
            prop_assert_eq!(derived, BatchStatus::Depleted);
        }

        /// A non-blocked batch with stock derives purely from the calendar
        #[test]
        fn prop_calendar_rules(
            quantity in 1i64..10_000,
            expiry_days in -120i64..400
        ) {
            let derived = derive_status(
                quantity,
                expiry_in(expiry_days),
                today(),
                BatchStatus::Available,
                NEAR_EXPIRY_WINDOW_DAYS,
            );

            let expected = if expiry_days <= 0 {
                BatchStatus::Expired
            } else if expiry_days <= NEAR_EXPIRY_WINDOW_DAYS {
                BatchStatus::NearExpiry
            } else {
                BatchStatus::Available
            };

            prop_assert_eq!(derived, expected);
        }

        /// With stock on hand, a blocked batch never leaves blocked
        #[test]
        fn prop_blocked_latches_with_stock(
            quantity in 1i64..10_000,
            expiry_days in expiry_strategy()
        ) {
            let expiry = expiry_days.and_then(expiry_in);
            let derived = derive_status(quantity, expiry, today(), BatchStatus::Blocked, NEAR_EXPIRY_WINDOW_DAYS);
            prop_assert_eq!(derived, BatchStatus::Blocked);
        }
    }
}
