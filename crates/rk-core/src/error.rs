//! # AppError
//!
//! Centralized error handling for the Rusty-Kanban ecosystem.
//! Maps domain-specific failures to actionable error types.

use thiserror::Error;

/// The primary error type for all rk-core operations.
#[derive(Error, Debug)]
pub enum AppError {
    /// Resource not found (e.g., Board, List, Card)
    #[error("{0} not found with ID {1}")]
    NotFound(String, String),

    /// Precondition failure (e.g., negative position, empty title)
    #[error("validation error: {0}")]
    ValidationError(String),

    /// The store aborted the transaction because a concurrent one touched
    /// the same rows. Safe to retry the whole operation.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Infrastructure failure (e.g., DB down) or a broken position sequence
    #[error("internal service error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn not_found(what: impl Into<String>, id: impl ToString) -> Self {
        AppError::NotFound(what.into(), id.to_string())
    }
}

/// A specialized Result type for Rusty-Kanban logic.
pub type Result<T> = std::result::Result<T, AppError>;
