//! # Error Types
//!
//! Domain-specific error types for outlet-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  outlet-core errors (this file)                                        │
//! │  ├── CoreError        - Business rule violations                       │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  outlet-db errors (separate crate)                                     │
//! │  └── DbError          - Database operation failures                    │
//! │                                                                         │
//! │  admin app errors                                                      │
//! │  └── ApiError         - What the browser sees (serialized)             │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → DbError → ApiError → HTTP         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Business rule violations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Not enough sellable stock across the product's batches.
    ///
    /// ## When This Occurs
    /// - Requested quantity exceeds the sum of non-expired remaining stock
    /// - A concurrent sale consumed the batch between read and decrement
    #[error("Insufficient stock for {product}: available {available}, requested {requested}")]
    InsufficientStock {
        product: String,
        available: i64,
        requested: i64,
    },

    /// A return line asks for more than is left to return on a sale item.
    #[error("Sale item {sale_item_id}: cannot return {requested}, only {remaining} left")]
    ReturnExceedsSold {
        sale_item_id: i64,
        remaining: i64,
        requested: i64,
    },

    /// Every item of the sale has already been returned.
    #[error("Sale {sale_number} is already fully returned")]
    SaleFullyReturned { sale_number: String },

    /// A return line references a sale item from a different sale.
    #[error("Sale item {sale_item_id} does not belong to sale {sale_id}")]
    ItemNotInSale { sale_item_id: i64, sale_id: i64 },

    /// Checkout or return with no lines.
    #[error("Nothing to process: no lines given")]
    EmptyCart,

    /// Too many lines in one checkout.
    #[error("A sale cannot have more than {max} lines")]
    TooManyLines { max: usize },

    /// Payment amount does not cover the sale.
    #[error("Invalid payment: {reason}")]
    InvalidPayment { reason: String },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Invalid format.
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Value is not in allowed set.
    #[error("{field} must be one of: {allowed:?}")]
    NotAllowed { field: String, allowed: Vec<String> },

    /// Two fields contradict each other.
    #[error("{field} is inconsistent: {reason}")]
    Inconsistent { field: String, reason: String },
}

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CoreError::InsufficientStock {
            product: "Non - 4780001".to_string(),
            available: 3,
            requested: 5,
        };
        assert_eq!(
            err.to_string(),
            "Insufficient stock for Non - 4780001: available 3, requested 5"
        );

        let err = CoreError::ReturnExceedsSold {
            sale_item_id: 7,
            remaining: 1,
            requested: 2,
        };
        assert_eq!(err.to_string(), "Sale item 7: cannot return 2, only 1 left");
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let validation_err = ValidationError::Required {
            field: "barcode".to_string(),
        };
        let core_err: CoreError = validation_err.into();
        assert!(matches!(core_err, CoreError::Validation(_)));
        assert_eq!(core_err.to_string(), "Validation error: barcode is required");
    }
}
