//! Storage traits behind the ledger and settlement engine.
//!
//! A [`Store`] hands out [`StoreTransaction`]s. Everything issued through a
//! transaction becomes visible only after [`StoreTransaction::commit`]; a
//! transaction dropped without a commit discards all of its effects.

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

use crate::ledger::{Balance, NewOperation, PointsOperation, UserId};
use crate::tournament::{
    Backing, NewTournament, Participation, Tournament, TournamentId, WinnerRecord,
};

/// Storage errors
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A uniqueness constraint rejected the write
    #[error("Uniqueness conflict on {0}")]
    Conflict(&'static str),

    /// The unit of work did not finish in time
    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    /// The transaction was already committed
    #[error("Transaction already closed")]
    TransactionClosed,
}

impl StoreError {
    /// Map a sqlx error, turning unique violations into [`StoreError::Conflict`].
    pub fn from_insert(err: sqlx::Error, constraint: &'static str) -> Self {
        match &err {
            sqlx::Error::Database(db) if db.is_unique_violation() => Self::Conflict(constraint),
            _ => Self::Database(err),
        }
    }
}

/// Result type for storage operations
pub type StoreResult<T> = Result<T, StoreError>;

/// A backing store that can open atomic units of work.
#[async_trait]
pub trait Store: Send + Sync {
    /// Open a new transaction.
    async fn begin(&self) -> StoreResult<Box<dyn StoreTransaction>>;

    /// Check that the store is reachable.
    async fn health_check(&self) -> StoreResult<()>;
}

/// Row-level operations available inside one transaction.
///
/// These are storage primitives only. Business rules (positive amounts,
/// lifecycle checks, stake arithmetic) live in the ledger, tournament and
/// settlement modules.
#[async_trait]
pub trait StoreTransaction: Send {
    // ---- balances -------------------------------------------------------

    /// Read one balance.
    async fn fetch_balance(&mut self, user_id: UserId) -> StoreResult<Option<Balance>>;

    /// Read and lock the balances that exist for `user_ids`, ordered by user id.
    async fn fetch_balances(&mut self, user_ids: &[UserId]) -> StoreResult<Vec<Balance>>;

    /// Add `amount` to a balance, creating it at zero first if absent.
    ///
    /// Returns `None` without touching anything if the sum would exceed `i64::MAX`.
    async fn add_to_balance(
        &mut self,
        user_id: UserId,
        amount: i64,
    ) -> StoreResult<Option<Balance>>;

    /// Subtract `amount` if the balance exists and covers it.
    ///
    /// Returns `None` without touching anything otherwise.
    async fn subtract_from_balance(
        &mut self,
        user_id: UserId,
        amount: i64,
    ) -> StoreResult<Option<Balance>>;

    /// Append an audit entry.
    async fn insert_operation(&mut self, operation: NewOperation) -> StoreResult<PointsOperation>;

    /// Most recent audit entries for a user, newest first.
    async fn fetch_operations(
        &mut self,
        user_id: UserId,
        limit: i64,
    ) -> StoreResult<Vec<PointsOperation>>;

    // ---- tournaments ----------------------------------------------------

    /// Insert an open tournament.
    async fn insert_tournament(&mut self, tournament: NewTournament) -> StoreResult<Tournament>;

    /// Read a tournament, optionally locking its row until the transaction ends.
    async fn fetch_tournament(
        &mut self,
        tournament_id: TournamentId,
        for_update: bool,
    ) -> StoreResult<Option<Tournament>>;

    /// Page through tournaments ordered by id.
    async fn fetch_tournaments(&mut self, limit: i64, offset: i64) -> StoreResult<Vec<Tournament>>;

    /// Move an open tournament to finished. Returns `false` if no open row matched.
    async fn mark_finished(&mut self, tournament_id: TournamentId) -> StoreResult<bool>;

    // ---- participation --------------------------------------------------

    /// Player-of-record row for `(tournament_id, user_id)`.
    async fn fetch_participation(
        &mut self,
        tournament_id: TournamentId,
        user_id: UserId,
    ) -> StoreResult<Option<Participation>>;

    /// All players of record for a tournament.
    async fn fetch_participations(
        &mut self,
        tournament_id: TournamentId,
    ) -> StoreResult<Vec<Participation>>;

    /// Insert a player-of-record row. Fails with [`StoreError::Conflict`] on a duplicate.
    async fn insert_participation(
        &mut self,
        tournament_id: TournamentId,
        user_id: UserId,
        deposit_paid: i64,
    ) -> StoreResult<Participation>;

    /// Insert a backing row.
    async fn insert_backing(
        &mut self,
        tournament_id: TournamentId,
        player_id: UserId,
        backer_id: UserId,
        deposit_paid: i64,
    ) -> StoreResult<Backing>;

    /// Backings of a tournament, optionally narrowed to one player.
    async fn fetch_backings(
        &mut self,
        tournament_id: TournamentId,
        player_id: Option<UserId>,
    ) -> StoreResult<Vec<Backing>>;

    /// Insert a winner record.
    async fn insert_winner(
        &mut self,
        tournament_id: TournamentId,
        user_id: UserId,
        prize: i64,
    ) -> StoreResult<WinnerRecord>;

    /// Winner records of a tournament in insertion order.
    async fn fetch_winners(&mut self, tournament_id: TournamentId)
    -> StoreResult<Vec<WinnerRecord>>;

    // ---- lifecycle ------------------------------------------------------

    /// Make every effect of this transaction durable and visible.
    async fn commit(&mut self) -> StoreResult<()>;
}
