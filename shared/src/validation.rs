//! Validation utilities for the stock ledger
//!
//! Field-level checks shared by the ledger operations and the request inputs.

use uuid::Uuid;

// ============================================================================
// Quantity Validations
// ============================================================================

/// Largest quantity a single movement, count or shipment may carry
pub const MAX_QUANTITY: i64 = 1_000_000_000;

/// Validate that a moved quantity is strictly positive and within range
pub fn validate_quantity(quantity: i64) -> Result<(), &'static str> {
    if quantity <= 0 {
        return Err("Quantity must be greater than 0");
    }
    if quantity > MAX_QUANTITY {
        return Err("Quantity exceeds the maximum of 1000000000");
    }
    Ok(())
}

/// Validate a counted (cycle-count) quantity, which may be zero
pub fn validate_counted_quantity(quantity: i64) -> Result<(), &'static str> {
    if quantity < 0 {
        return Err("Counted quantity cannot be negative");
    }
    if quantity > MAX_QUANTITY {
        return Err("Counted quantity exceeds the maximum of 1000000000");
    }
    Ok(())
}

/// Add two stock quantities, failing instead of overflowing
pub fn add_quantities(a: i64, b: i64) -> Result<i64, &'static str> {
    a.checked_add(b).ok_or("Stock quantity out of range")
}

/// Validate a reorder threshold
pub fn validate_reorder_threshold(threshold: i64) -> Result<(), &'static str> {
    if threshold < 0 {
        return Err("Reorder threshold cannot be negative");
    }
    Ok(())
}

/// Validate that a transfer moves stock between two different locations
pub fn validate_transfer_locations(from: Uuid, to: Uuid) -> Result<(), &'static str> {
    if from == to {
        return Err("Source and destination locations must be different");
    }
    Ok(())
}

// ============================================================================
// Identifier Validations
// ============================================================================

/// Validate SKU format: non-empty, no whitespace, at most 64 characters
pub fn validate_sku(sku: &str) -> Result<(), &'static str> {
    if sku.is_empty() {
        return Err("SKU is required");
    }
    if sku.len() > 64 {
        return Err("SKU must be at most 64 characters");
    }
    if sku.chars().any(char::is_whitespace) {
        return Err("SKU cannot contain whitespace");
    }
    Ok(())
}

/// Validate a rack or bin code: non-empty alphanumeric with '-' or '_'
pub fn validate_slot_code(code: &str) -> Result<(), &'static str> {
    if code.is_empty() {
        return Err("Rack and bin are required");
    }
    if !code
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err("Rack and bin may only contain letters, digits, '-' and '_'");
    }
    Ok(())
}

/// Trim user-entered text, returning `None` when nothing is left
pub fn normalize_text(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
