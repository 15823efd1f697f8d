//! Settlement error types.

use chrono::{DateTime, Utc};
use std::time::Duration;
use thiserror::Error;

use crate::db::StoreError;
use crate::ledger::{LedgerError, UserId};
use crate::tournament::{TournamentError, TournamentId};

/// Failure category a transport layer maps to its own status codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    BadRequest,
    Conflict,
    Internal,
}

/// Errors returned by [`super::SettlementEngine`] operations
///
/// Every error means the whole unit of work was rolled back.
#[derive(Debug, Error)]
pub enum SettlementError {
    #[error("Tournament not found: {0}")]
    TournamentNotFound(TournamentId),

    #[error("Tournament {tournament_id} started at {date}")]
    TournamentExpired {
        tournament_id: TournamentId,
        date: DateTime<Utc>,
    },

    #[error("Tournament {0} is already finished")]
    TournamentFinished(TournamentId),

    #[error("Player {player_id} already joined tournament {tournament_id}")]
    AlreadyJoined {
        tournament_id: TournamentId,
        player_id: UserId,
    },

    #[error("Join has no stakeholders")]
    NoStakeholders,

    #[error("Invalid stakeholders: {0}")]
    InvalidStakeholders(String),

    #[error("Stakeholder {0} has no balance")]
    MissingBalance(UserId),

    #[error("Insufficient balance for user {user_id}: available {available}, required {required}")]
    InsufficientBalance {
        user_id: UserId,
        available: i64,
        required: i64,
    },

    #[error("Insufficient funds for user {user_id}: available {available}, required {required}")]
    InsufficientFunds {
        user_id: UserId,
        available: i64,
        required: i64,
    },

    #[error("Balance not found for user {0}")]
    BalanceNotFound(UserId),

    #[error("Player {player_id} is not registered in tournament {tournament_id}")]
    PlayerNotRegistered {
        tournament_id: TournamentId,
        player_id: UserId,
    },

    #[error("Invalid winners: {0}")]
    InvalidWinners(String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(i64),

    #[error("Balance overflow for user {0}")]
    BalanceOverflow(UserId),

    #[error("Invalid tournament deposit: {0}")]
    InvalidDeposit(i64),

    #[error("Tournament date {0} is in the past")]
    DateInPast(DateTime<Utc>),

    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("Storage unavailable: {0}")]
    StorageUnavailable(#[source] StoreError),
}

impl SettlementError {
    /// Category of this failure
    pub fn kind(&self) -> ErrorKind {
        match self {
            SettlementError::TournamentNotFound(_)
            | SettlementError::BalanceNotFound(_)
            | SettlementError::PlayerNotRegistered { .. } => ErrorKind::NotFound,

            SettlementError::AlreadyJoined { .. } | SettlementError::TournamentFinished(_) => {
                ErrorKind::Conflict
            }

            SettlementError::Timeout(_) | SettlementError::StorageUnavailable(_) => {
                ErrorKind::Internal
            }

            SettlementError::TournamentExpired { .. }
            | SettlementError::NoStakeholders
            | SettlementError::InvalidStakeholders(_)
            | SettlementError::MissingBalance(_)
            | SettlementError::InsufficientBalance { .. }
            | SettlementError::InsufficientFunds { .. }
            | SettlementError::InvalidWinners(_)
            | SettlementError::InvalidAmount(_)
            | SettlementError::BalanceOverflow(_)
            | SettlementError::InvalidDeposit(_)
            | SettlementError::DateInPast(_) => ErrorKind::BadRequest,
        }
    }

    /// Get a client-safe error message that doesn't leak sensitive information
    ///
    /// Storage errors are sanitized so SQL details never reach a client.
    pub fn client_message(&self) -> String {
        match self {
            SettlementError::StorageUnavailable(_) => "Internal server error".to_string(),
            SettlementError::Timeout(_) => "Operation timed out".to_string(),
            _ => self.to_string(),
        }
    }
}

impl From<StoreError> for SettlementError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Timeout(duration) => SettlementError::Timeout(duration),
            other => SettlementError::StorageUnavailable(other),
        }
    }
}

impl From<LedgerError> for SettlementError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::Store(err) => err.into(),
            LedgerError::InsufficientFunds {
                user_id,
                available,
                required,
            } => SettlementError::InsufficientFunds {
                user_id,
                available,
                required,
            },
            LedgerError::BalanceNotFound(user_id) => SettlementError::BalanceNotFound(user_id),
            LedgerError::InvalidAmount(amount) => SettlementError::InvalidAmount(amount),
            LedgerError::BalanceOverflow(user_id) => SettlementError::BalanceOverflow(user_id),
        }
    }
}

impl From<TournamentError> for SettlementError {
    fn from(err: TournamentError) -> Self {
        match err {
            TournamentError::Store(err) => err.into(),
            TournamentError::NotFound(id) => SettlementError::TournamentNotFound(id),
            TournamentError::AlreadyFinished(id) => SettlementError::TournamentFinished(id),
            TournamentError::AlreadyJoined {
                tournament_id,
                user_id,
            } => SettlementError::AlreadyJoined {
                tournament_id,
                player_id: user_id,
            },
            TournamentError::InvalidDeposit(deposit) => SettlementError::InvalidDeposit(deposit),
            TournamentError::DateInPast(date) => SettlementError::DateInPast(date),
        }
    }
}

/// Result type for settlement operations
pub type SettlementResult<T> = Result<T, SettlementError>;
