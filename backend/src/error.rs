//! Error handling for the Stock & Batch Management Platform
//!
//! Provides consistent error codes in Thai and English. The transport layer
//! that fronts this core maps `code()` to its own status codes; nothing here
//! depends on a particular protocol.

use thiserror::Error;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Validation errors
    #[error("Validation error: {message}")]
    Validation {
        field: String,
        message: String,
        message_th: String,
    },

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Duplicate entry: {0}")]
    DuplicateEntry(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    // Business logic errors
    #[error("Invalid state transition: {0}")]
    InvalidStateTransition(String),

    #[error("Insufficient stock: {message}")]
    InsufficientStock {
        message: String,
        message_th: String,
    },

    #[error("No batch available: {message}")]
    NoBatchAvailable {
        message: String,
        message_th: String,
    },

    #[error("Configuration error: {0}")]
    Configuration(String),

    // Database errors
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    // Internal errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Internal error")]
    InternalError(#[from] anyhow::Error),
}

impl AppError {
    /// Stable error code for the transport layer
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Validation { .. } | AppError::ValidationError(_) => "VALIDATION_ERROR",
            AppError::DuplicateEntry(_) => "DUPLICATE_ENTRY",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::InvalidStateTransition(_) => "INVALID_STATE_TRANSITION",
            AppError::InsufficientStock { .. } => "INSUFFICIENT_STOCK",
            AppError::NoBatchAvailable { .. } => "NO_BATCH_AVAILABLE",
            AppError::Configuration(_) => "CONFIGURATION_ERROR",
            AppError::DatabaseError(_) => "DATABASE_ERROR",
            AppError::Internal(_) | AppError::InternalError(_) => "INTERNAL_ERROR",
        }
    }

    /// Whether the error is caused by the caller's input or the entity state,
    /// as opposed to an infrastructure failure
    pub fn is_client_error(&self) -> bool {
        !matches!(
            self,
            AppError::Configuration(_)
                | AppError::DatabaseError(_)
                | AppError::Internal(_)
                | AppError::InternalError(_)
        )
    }

    /// Thai message for client-facing errors, where one exists
    pub fn message_th(&self) -> Option<&str> {
        match self {
            AppError::Validation { message_th, .. }
            | AppError::InsufficientStock { message_th, .. }
            | AppError::NoBatchAvailable { message_th, .. } => Some(message_th),
            _ => None,
        }
    }
}

/// Result type alias for service operations
pub type AppResult<T> = Result<T, AppError>;
