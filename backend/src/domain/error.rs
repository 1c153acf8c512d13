//! Errors surfaced by ledger operations.
use thiserror::Error;

use super::audit_trail::MIN_REASON_CHARS;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Justification must have at least {min} characters (got {actual})")]
    ReasonTooShort { min: usize, actual: usize },
    #[error("Entry {id} is cancelled and can no longer be edited")]
    EntryCancelled { id: String },
    #[error("Entry {id} is already cancelled")]
    AlreadyCancelled { id: String },
    #[error("Invalid change: {0}")]
    InvalidChange(String),
    #[error("Validation failed: {0}")]
    Validation(String),
    #[error("Entry not found: {0}")]
    NotFound(String),
    #[error("Entry {id} changed in the store (expected {expected} history records, found {found})")]
    Conflict {
        id: String,
        expected: usize,
        found: usize,
    },
    #[error("Storage error: {0}")]
    Storage(#[from] anyhow::Error),
}

impl LedgerError {
    pub fn reason_too_short(actual: usize) -> Self {
        LedgerError::ReasonTooShort {
            min: MIN_REASON_CHARS,
            actual,
        }
    }

    /// True for rejections raised before any write was attempted
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            LedgerError::ReasonTooShort { .. }
                | LedgerError::EntryCancelled { .. }
                | LedgerError::AlreadyCancelled { .. }
                | LedgerError::InvalidChange(_)
                | LedgerError::Validation(_)
        )
    }
}

pub type LedgerResult<T> = Result<T, LedgerError>;
