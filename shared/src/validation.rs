//! Validation utilities for the B2B Ordering Platform

use rust_decimal::Decimal;

// ============================================================================
// Quantity and Price Validations
// ============================================================================

/// Validate that a quantity or amount is not negative
pub fn validate_non_negative(value: Decimal) -> Result<(), &'static str> {
    if value < Decimal::ZERO {
        return Err("Value cannot be negative");
    }
    Ok(())
}

/// Validate a VAT rate expressed as a fraction (0.20 = 20%)
pub fn validate_vat_rate(rate: Decimal) -> Result<(), &'static str> {
    if rate < Decimal::ZERO || rate > Decimal::ONE {
        return Err("VAT rate must be between 0 and 1");
    }
    Ok(())
}

/// Validate a unit of measure label
pub fn validate_unit(unit: &str) -> Result<(), &'static str> {
    let unit = unit.trim();
    if unit.is_empty() {
        return Err("Unit of measure is required");
    }
    if unit.chars().count() > 16 {
        return Err("Unit of measure must be at most 16 characters");
    }
    Ok(())
}

// ============================================================================
// Order Number Validations
// ============================================================================

/// Validate order number prefix (2-6 uppercase letters)
pub fn validate_order_number_prefix(prefix: &str) -> Result<(), &'static str> {
    if prefix.len() < 2 || prefix.len() > 6 {
        return Err("Order number prefix must be 2 to 6 characters");
    }
    if !prefix.chars().all(|c| c.is_ascii_uppercase()) {
        return Err("Order number prefix must be uppercase letters only");
    }
    Ok(())
}
