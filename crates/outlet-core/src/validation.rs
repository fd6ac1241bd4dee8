//! # Validation Module
//!
//! Field rules applied before anything reaches the database.
//!
//! ## Validation Layers
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Layer 1: THIS MODULE                                                  │
//! │  ├── Lengths mirror the column sizes (barcode 50, name 200, ...)       │
//! │  └── Quantity, price and date sanity                                   │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: Database (SQLite)                                            │
//! │  ├── UNIQUE (barcode, sale_number, return_number, category name)       │
//! │  ├── CHECK (remaining <= initial, returned <= quantity)                │
//! │  └── FOREIGN KEY ... ON DELETE CASCADE                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::NaiveDate;

use crate::error::ValidationError;
use crate::MAX_ITEM_QUANTITY;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

pub const MAX_BARCODE_LEN: usize = 50;
pub const MAX_PRODUCT_NAME_LEN: usize = 200;
pub const MAX_CATEGORY_NAME_LEN: usize = 100;
pub const MAX_BATCH_NUMBER_LEN: usize = 50;
pub const MAX_USERNAME_LEN: usize = 150;
pub const MAX_STORE_ALIAS_LEN: usize = 32;

fn require_text(field: &str, value: &str, max: usize) -> ValidationResult<()> {
    let value = value.trim();

    if value.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    if value.chars().count() > max {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max,
        });
    }

    Ok(())
}

// =============================================================================
// String Validators
// =============================================================================

/// Validates a product barcode.
///
/// ## Rules
/// - Must not be empty
/// - At most 50 characters
/// - No whitespace (scanners never emit it; a space means a typo)
///
/// ```rust
/// use outlet_core::validation::validate_barcode;
///
/// assert!(validate_barcode("4780012345678").is_ok());
/// assert!(validate_barcode("478 001").is_err());
/// ```
pub fn validate_barcode(barcode: &str) -> ValidationResult<()> {
    require_text("barcode", barcode, MAX_BARCODE_LEN)?;

    if barcode.trim().chars().any(char::is_whitespace) {
        return Err(ValidationError::InvalidFormat {
            field: "barcode".to_string(),
            reason: "must not contain whitespace".to_string(),
        });
    }

    Ok(())
}

pub fn validate_product_name(name: &str) -> ValidationResult<()> {
    require_text("name", name, MAX_PRODUCT_NAME_LEN)
}

pub fn validate_category_name(name: &str) -> ValidationResult<()> {
    require_text("category name", name, MAX_CATEGORY_NAME_LEN)
}

pub fn validate_batch_number(batch_number: &str) -> ValidationResult<()> {
    require_text("batch_number", batch_number, MAX_BATCH_NUMBER_LEN)
}

pub fn validate_username(username: &str) -> ValidationResult<()> {
    require_text("username", username, MAX_USERNAME_LEN)
}

/// Validates a store alias (`store1`, `store2`, ...).
///
/// Aliases appear in URLs, so they are limited to lowercase ASCII letters,
/// digits and underscores.
pub fn validate_store_alias(alias: &str) -> ValidationResult<()> {
    if alias.is_empty() {
        return Err(ValidationError::Required {
            field: "store alias".to_string(),
        });
    }

    if alias.len() > MAX_STORE_ALIAS_LEN {
        return Err(ValidationError::TooLong {
            field: "store alias".to_string(),
            max: MAX_STORE_ALIAS_LEN,
        });
    }

    if !alias
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
    {
        return Err(ValidationError::InvalidFormat {
            field: "store alias".to_string(),
            reason: "must contain only lowercase letters, digits and underscores".to_string(),
        });
    }

    Ok(())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a quantity on a sale or return line.
///
/// ## Rules
/// - Must be positive (> 0)
/// - Must not exceed MAX_ITEM_QUANTITY
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }

    if qty > MAX_ITEM_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_ITEM_QUANTITY,
        });
    }

    Ok(())
}

/// Validates a price in cents. Zero is allowed.
pub fn validate_price_cents(field: &str, cents: i64) -> ValidationResult<()> {
    if cents < 0 {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0,
            max: i64::MAX,
        });
    }

    Ok(())
}

/// Validates the quantities of an arriving batch.
///
/// ## Rules
/// - initial_quantity > 0
/// - 0 <= remaining_quantity <= initial_quantity
pub fn validate_batch_quantities(initial: i64, remaining: i64) -> ValidationResult<()> {
    if initial <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "initial_quantity".to_string(),
        });
    }

    if remaining < 0 || remaining > initial {
        return Err(ValidationError::OutOfRange {
            field: "remaining_quantity".to_string(),
            min: 0,
            max: initial,
        });
    }

    Ok(())
}

/// A batch cannot expire before it arrives.
pub fn validate_batch_dates(arrival: NaiveDate, expiry: NaiveDate) -> ValidationResult<()> {
    if expiry < arrival {
        return Err(ValidationError::Inconsistent {
            field: "expiry_date".to_string(),
            reason: format!("{} is before arrival date {}", expiry, arrival),
        });
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
