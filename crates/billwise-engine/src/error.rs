//! # Engine Error Type
//!
//! Unified error type for every handler.
//!
//! ## Error Handling Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Flow in Billwise                               │
//! │                                                                         │
//! │  Model                       Engine                                     │
//! │  ─────                       ──────                                     │
//! │                                                                         │
//! │  update_invoice({...})                                                  │
//! │         │                                                               │
//! │         ▼                                                               │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │  Handler                                                         │  │
//! │  │  Result<Outcome, EngineError>                                    │  │
//! │  │         │                                                        │  │
//! │  │         ▼                                                        │  │
//! │  │  Database Error? ─── DbError::QueryFailed("...") ──┐            │  │
//! │  │         │                                          │            │  │
//! │  │         ▼                                          ▼            │  │
//! │  │  Rule Error? ─────── CoreError::InvalidTransition ─ EngineError ►│  │
//! │  │         │                                                        │  │
//! │  │         ▼                                                        │  │
//! │  │  Success ──────────────────────────────────────────────────────►│  │
//! │  └──────────────────────────────────────────────────────────────────┘  │
//! │                                                                         │
//! │  ◄── CommandResult { success: false, error, message, code }             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Nothing here is fatal: every variant ends up as an envelope.

use serde::Serialize;
use thiserror::Error;

use billwise_core::{CoreError, ValidationError};
use billwise_db::DbError;

use crate::guard::GuardRejection;

/// Error returned from handlers and the dispatcher itself.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Arguments are missing, malformed or break a business rule.
    #[error("{0}")]
    Validation(String),

    /// The owner has no such document or client.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Guard lock, duplicate name, or an illegal state transition.
    #[error("{0}")]
    Conflict(String),

    /// Part of a multi-step write failed and was rolled back by hand.
    #[error("{0}")]
    PartialFailure(String),

    /// The datastore failed. The underlying message is kept.
    #[error("Database error: {0}")]
    Database(String),

    /// No catalog entry has this name.
    #[error("Function not found")]
    UnknownFunction { name: String },

    /// A handler panicked or something else unexpected happened.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Machine-readable error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    ValidationError,
    NotFound,
    Conflict,
    PartialFailure,
    DatabaseError,
    Internal,
}

impl EngineError {
    pub fn validation(message: impl Into<String>) -> Self {
        EngineError::Validation(message.into())
    }

    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        EngineError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        EngineError::Conflict(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        EngineError::Internal(message.into())
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            EngineError::Validation(_) => ErrorCode::ValidationError,
            EngineError::NotFound { .. } | EngineError::UnknownFunction { .. } => {
                ErrorCode::NotFound
            }
            EngineError::Conflict(_) => ErrorCode::Conflict,
            EngineError::PartialFailure(_) => ErrorCode::PartialFailure,
            EngineError::Database(_) => ErrorCode::DatabaseError,
            EngineError::Internal(_) => ErrorCode::Internal,
        }
    }

    /// Text shown to the person on the other end of the chat.
    pub fn user_message(&self) -> String {
        match self {
            EngineError::UnknownFunction { name } => {
                format!("There is no operation called '{}'.", name)
            }
            EngineError::Database(_) => {
                "Something went wrong while saving. Please try again.".to_string()
            }
            EngineError::Internal(_) => "Something went wrong. Please try again.".to_string(),
            other => other.to_string(),
        }
    }
}

/// Converts database errors to engine errors.
impl From<DbError> for EngineError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => EngineError::NotFound { entity, id },
            DbError::UniqueViolation { field, value } => {
                EngineError::Conflict(format!("{} '{}' already exists", field, value))
            }
            DbError::ForeignKeyViolation { message } => {
                tracing::error!("Foreign key violation: {}", message);
                EngineError::Validation("Invalid reference to another record".to_string())
            }
            other => {
                tracing::error!(error = %other, "Database operation failed");
                EngineError::Database(other.to_string())
            }
        }
    }
}

/// Converts core rule errors to engine errors.
impl From<CoreError> for EngineError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::InvalidTransition { .. } | CoreError::NotConvertible { .. } => {
                EngineError::Conflict(err.to_string())
            }
            CoreError::InvalidReferenceFormat { .. } => EngineError::Validation(err.to_string()),
            CoreError::Validation(e) => EngineError::Validation(e.to_string()),
        }
    }
}

impl From<ValidationError> for EngineError {
    fn from(err: ValidationError) -> Self {
        EngineError::Validation(err.to_string())
    }
}

impl From<GuardRejection> for EngineError {
    fn from(err: GuardRejection) -> Self {
        EngineError::Conflict(err.to_string())
    }
}

/// Result type for handlers.
pub type EngineResult<T> = Result<T, EngineError>;
