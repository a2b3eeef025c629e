//! Validation utilities for the Stock & Batch Management Platform

use chrono::NaiveDate;
use rust_decimal::Decimal;

// ============================================================================
// Quantity Validations
// ============================================================================

/// Validate a movement or batch quantity (must be strictly positive)
pub fn validate_quantity(quantity: i64) -> Result<(), &'static str> {
    if quantity <= 0 {
        return Err("Quantity must be positive");
    }
    Ok(())
}

/// Validate a reorder threshold (zero disables the stock-low rule)
pub fn validate_stock_minimum(stock_minimum: i64) -> Result<(), &'static str> {
    if stock_minimum < 0 {
        return Err("Reorder threshold cannot be negative");
    }
    Ok(())
}

/// Validate a unit cost or price
pub fn validate_unit_price(price: Decimal) -> Result<(), &'static str> {
    if price < Decimal::ZERO {
        return Err("Unit price cannot be negative");
    }
    Ok(())
}

// ============================================================================
// Code Format Validations
// ============================================================================

/// Validate a caller-supplied product code (3-32 chars, uppercase
/// alphanumeric plus dashes)
pub fn validate_product_code(code: &str) -> Result<(), &'static str> {
    if code.len() < 3 {
        return Err("Product code must be at least 3 characters");
    }
    if code.len() > 32 {
        return Err("Product code must be at most 32 characters");
    }
    if !code
        .chars()
        .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '-')
    {
        return Err("Product code must be uppercase alphanumeric (dashes allowed)");
    }
    Ok(())
}

/// Validate a caller-supplied batch number (same character rules as product
/// codes, up to 40 chars)
pub fn validate_batch_number(number: &str) -> Result<(), &'static str> {
    if number.len() < 3 {
        return Err("Batch number must be at least 3 characters");
    }
    if number.len() > 40 {
        return Err("Batch number must be at most 40 characters");
    }
    if !number
        .chars()
        .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '-')
    {
        return Err("Batch number must be uppercase alphanumeric (dashes allowed)");
    }
    Ok(())
}

// ============================================================================
// Date Validations
// ============================================================================

/// Validate that a batch's manufacture date precedes its expiration date
pub fn validate_batch_dates(
    manufacture_date: NaiveDate,
    expiration_date: Option<NaiveDate>,
) -> Result<(), &'static str> {
    if let Some(expiry) = expiration_date {
        if expiry < manufacture_date {
            return Err("Expiration date cannot precede manufacture date");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    // ========================================================================
    // Quantity Validation Tests
    // ========================================================================

    #[test]
    fn test_validate_quantity_positive() {
        assert!(validate_quantity(1).is_ok());
        assert!(validate_quantity(1_000_000).is_ok());
    }

    #[test]
    fn test_validate_quantity_rejects_zero_and_negative() {
        assert!(validate_quantity(0).is_err());
        assert!(validate_quantity(-5).is_err());
    }

    #[test]
    fn test_validate_stock_minimum() {
        assert!(validate_stock_minimum(0).is_ok());
        assert!(validate_stock_minimum(10).is_ok());
        assert!(validate_stock_minimum(-1).is_err());
    }

    #[test]
    fn test_validate_unit_price() {
        assert!(validate_unit_price(Decimal::ZERO).is_ok());
        assert!(validate_unit_price(Decimal::new(1250, 2)).is_ok());
        assert!(validate_unit_price(Decimal::new(-1, 0)).is_err());
    }

    // ========================================================================
    // Code Format Validation Tests
    // ========================================================================

    #[test]
    fn test_validate_product_code_valid() {
        assert!(validate_product_code("PRD-2025-0001").is_ok());
        assert!(validate_product_code("ABC").is_ok());
        assert!(validate_product_code("A1B2C3").is_ok());
    }

    #[test]
    fn test_validate_product_code_invalid() {
        assert!(validate_product_code("AB").is_err()); // Too short
        assert!(validate_product_code(&"A".repeat(33)).is_err()); // Too long
        assert!(validate_product_code("abc-123").is_err()); // Lowercase
        assert!(validate_product_code("PRD 001").is_err()); // Space
    }

    #[test]
    fn test_validate_batch_number_valid() {
        assert!(validate_batch_number("LOT-2025-00042").is_ok());
        assert!(validate_batch_number("B-1").is_err()); // Too short
        assert!(validate_batch_number("lot-1").is_err()); // Lowercase
    }

    // ========================================================================
    // Date Validation Tests
    // ========================================================================

    #[test]
    fn test_validate_batch_dates() {
        let mfg = NaiveDate::from_ymd_opt(2025, 1, 10).unwrap();
        let expiry = NaiveDate::from_ymd_opt(2025, 6, 10).unwrap();
        assert!(validate_batch_dates(mfg, Some(expiry)).is_ok());
        assert!(validate_batch_dates(mfg, None).is_ok());
        // Same day is allowed
        assert!(validate_batch_dates(mfg, Some(mfg)).is_ok());
        // Expiry before manufacture is not
        assert!(validate_batch_dates(expiry, Some(mfg)).is_err());
    }
}
