//! # Error Types
//!
//! Domain-specific error types for kidbank-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  kidbank-core errors                                                   │
//! │  ├── CoreError        - Business rule violations (this file)           │
//! │  ├── ValidationError  - Form input failures (this file)                │
//! │  ├── GatewayError     - Remote data failures (gateway.rs)              │
//! │  └── AuthError        - Identity provider failures (identity.rs)       │
//! │                                                                         │
//! │  kidbank-db errors                                                     │
//! │  └── DbError          - SQLite failures, mapped into GatewayError      │
//! │                                                                         │
//! │  kidbank-client errors                                                 │
//! │  └── ClientError      - What a view sees ({code, message})             │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → ClientError → toast               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

use crate::money::Money;

// =============================================================================
// Core Error
// =============================================================================

/// Business rule violations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Kid cannot be found among the signed-in parent's kids.
    #[error("Kid not found: {0}")]
    KidNotFound(String),

    /// Deposit request cannot be found.
    #[error("Request not found: {0}")]
    RequestNotFound(String),

    /// Removing money would take a balance below zero.
    ///
    /// ## When This Occurs
    /// ```text
    /// Remove $8.00 (penalty)
    ///      │
    ///      ▼
    /// Check balance: $5.00
    ///      │
    ///      ▼
    /// InsufficientFunds { available: $5.00, requested: $8.00 }
    ///      │
    ///      ▼
    /// Toast: "Insufficient balance"
    /// ```
    #[error("Insufficient balance: available {available}, requested {requested}")]
    InsufficientFunds { available: Money, requested: Money },

    /// A request was already approved or denied.
    #[error("Request {request_id} was already {status}")]
    RequestAlreadyResolved { request_id: String, status: String },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// The `Display` text of each variant is shown to the user as-is.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too short.
    #[error("{field} must be at least {min} characters")]
    TooShort { field: String, min: usize },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Amount is outside the allowed window.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: Money, max: Money },

    /// Invalid format (e.g. letters in a PIN, three decimals in an amount).
    #[error("{field} {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Two inputs that must agree do not.
    #[error("{field} does not match")]
    Mismatch { field: String },

    /// Value is syntactically fine but refused (e.g. PIN "1234").
    #[error("{field} {reason}")]
    NotAllowed { field: String, reason: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

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
        let err = CoreError::InsufficientFunds {
            available: Money::from_cents(500),
            requested: Money::from_cents(800),
        };
        assert_eq!(
            err.to_string(),
            "Insufficient balance: available $5.00, requested $8.00"
        );
    }

    #[test]
    fn test_validation_error_messages() {
        let err = ValidationError::Required {
            field: "Name".to_string(),
        };
        assert_eq!(err.to_string(), "Name is required");

        let err = ValidationError::InvalidFormat {
            field: "PIN".to_string(),
            reason: "must be exactly 4 digits".to_string(),
        };
        assert_eq!(err.to_string(), "PIN must be exactly 4 digits");
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let validation_err = ValidationError::Mismatch {
            field: "Password".to_string(),
        };
        let core_err: CoreError = validation_err.into();
        assert!(matches!(core_err, CoreError::Validation(_)));
    }
}
