//! Domain errors raised by the stock ledger

use thiserror::Error;

/// Failures a movement write or an availability read can report to its caller
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// Malformed or out-of-range input, or a reference to a missing record
    #[error("Invalid {field}: {message}")]
    InvalidInput { field: String, message: String },

    /// Role or ownership mismatch
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// The requested stock-out exceeds what the scope has available
    #[error("Insufficient stock: {available} pcs available")]
    InsufficientStock { available: i64 },

    /// Target ledger row is absent or already soft-deleted
    #[error("{0} not found")]
    NotFound(String),
}

impl LedgerError {
    pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        LedgerError::InvalidInput {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        LedgerError::Forbidden(message.into())
    }

    pub fn not_found(resource: impl Into<String>) -> Self {
        LedgerError::NotFound(resource.into())
    }
}

pub type LedgerResult<T> = Result<T, LedgerError>;
