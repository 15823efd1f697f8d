//! Ledger error types.

use thiserror::Error;

use super::models::UserId;
use crate::db::StoreError;

/// Ledger errors
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Storage failure
    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    /// Debit larger than the current balance (or no balance at all)
    #[error("Insufficient funds for user {user_id}: available {available}, required {required}")]
    InsufficientFunds {
        user_id: UserId,
        available: i64,
        required: i64,
    },

    /// User has never had a balance record
    #[error("Balance not found for user {0}")]
    BalanceNotFound(UserId),

    /// Invalid amount (must be positive)
    #[error("Invalid amount: {0}")]
    InvalidAmount(i64),

    /// Credit would overflow the balance
    #[error("Balance overflow for user {0}")]
    BalanceOverflow(UserId),
}

/// Result type for ledger operations
pub type LedgerResult<T> = Result<T, LedgerError>;
