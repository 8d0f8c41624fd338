//! # Error Types
//!
//! Domain-specific error types for billwise-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  billwise-core errors (this file)                                      │
//! │  ├── CoreError        - Business rule violations                       │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  billwise-db errors (separate crate)                                   │
//! │  └── DbError          - Database operation failures                    │
//! │                                                                         │
//! │  billwise-engine errors                                                │
//! │  └── EngineError      - What the result envelope reports               │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → EngineError → CommandResult       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

use crate::types::{DocumentKind, DocumentStatus};

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A status change the state machine does not allow.
    ///
    /// ## When This Occurs
    /// - Moving a declined estimate back to sent
    /// - Asking for `converted` directly instead of running a conversion
    /// - Giving an invoice an estimate-only status
    #[error("Cannot move {kind} {reference} from {from} to {to}")]
    InvalidTransition {
        kind: DocumentKind,
        reference: String,
        from: DocumentStatus,
        to: DocumentStatus,
    },

    /// The estimate has already reached a state that cannot be converted.
    #[error("Estimate {reference} is {status} and cannot be converted")]
    NotConvertible {
        reference: String,
        status: DocumentStatus,
    },

    /// A reference template could not be understood.
    #[error("Invalid reference format '{template}': {reason}")]
    InvalidReferenceFormat { template: String, reason: String },

    /// Validation error (wraps ValidationError).
    #[error("{0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These errors occur when arguments chosen by the model don't meet
/// requirements. They are reported before anything is written.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Value must be positive.
    #[error("{field} must be greater than zero")]
    MustBePositive { field: String },

    /// Value must not be negative.
    #[error("{field} cannot be negative")]
    Negative { field: String },

    /// Value is above what a document can hold.
    #[error("{field} cannot be more than {max}")]
    TooLarge { field: String, max: i64 },

    /// Collection has too many entries.
    #[error("{field} cannot have more than {max} entries")]
    TooMany { field: String, max: usize },

    /// Invalid format (e.g., invalid email, invalid colour).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Value is not in allowed set.
    #[error("{field} must be one of: {}", allowed.join(", "))]
    NotAllowed { field: String, allowed: Vec<String> },
}

impl ValidationError {
    /// Shorthand for [`ValidationError::Required`].
    pub fn required(field: impl Into<String>) -> Self {
        ValidationError::Required {
            field: field.into(),
        }
    }
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
    fn test_transition_message_names_document() {
        let err = CoreError::InvalidTransition {
            kind: DocumentKind::Estimate,
            reference: "EST-004".to_string(),
            from: DocumentStatus::Declined,
            to: DocumentStatus::Sent,
        };
        assert_eq!(
            err.to_string(),
            "Cannot move estimate EST-004 from declined to sent"
        );
    }

    #[test]
    fn test_validation_error_messages() {
        assert_eq!(
            ValidationError::required("client_name").to_string(),
            "client_name is required"
        );

        let err = ValidationError::NotAllowed {
            field: "discount_type".to_string(),
            allowed: vec!["percentage".to_string(), "fixed".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "discount_type must be one of: percentage, fixed"
        );
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let core_err: CoreError = ValidationError::required("name").into();
        assert!(matches!(core_err, CoreError::Validation(_)));
        assert_eq!(core_err.to_string(), "name is required");
    }
}
