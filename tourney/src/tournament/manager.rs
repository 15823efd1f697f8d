//! Tournament registry: creation, lookup and the single OPEN → FINISHED transition.

use super::models::{
    AnnounceRequest, DEFAULT_GAME_ID, NewTournament, Tournament, TournamentId,
};
use crate::db::{StoreError, StoreTransaction};
use crate::ledger::UserId;
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Tournament errors
#[derive(Debug, Error)]
pub enum TournamentError {
    #[error("Tournament not found: {0}")]
    NotFound(TournamentId),

    #[error("Tournament {0} already finished")]
    AlreadyFinished(TournamentId),

    #[error("User {user_id} already plays tournament {tournament_id}")]
    AlreadyJoined {
        tournament_id: TournamentId,
        user_id: UserId,
    },

    #[error("Invalid tournament deposit: {0}")]
    InvalidDeposit(i64),

    #[error("Tournament date {0} is in the past")]
    DateInPast(DateTime<Utc>),

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),
}

pub type TournamentResult<T> = Result<T, TournamentError>;

/// Largest page [`TournamentRegistry::list`] returns
pub const MAX_PAGE_SIZE: i64 = 100;

/// Default page size for listings
pub const DEFAULT_PAGE_SIZE: i64 = 20;

/// Tournament records inside one unit of work
pub struct TournamentRegistry<'t> {
    tx: &'t mut dyn StoreTransaction,
}

impl<'t> TournamentRegistry<'t> {
    pub fn new(tx: &'t mut dyn StoreTransaction) -> Self {
        Self { tx }
    }

    /// Create an OPEN tournament from an announcement.
    ///
    /// A missing date means "starts now"; a missing or non-positive game id
    /// falls back to [`DEFAULT_GAME_ID`].
    pub async fn announce(
        &mut self,
        request: AnnounceRequest,
        now: DateTime<Utc>,
    ) -> TournamentResult<Tournament> {
        if request.deposit <= 0 {
            return Err(TournamentError::InvalidDeposit(request.deposit));
        }

        let date = match request.date {
            Some(date) if date < now => return Err(TournamentError::DateInPast(date)),
            Some(date) => date,
            None => now,
        };

        let game_id = request
            .game_id
            .filter(|id| *id > 0)
            .unwrap_or(DEFAULT_GAME_ID);

        let tournament = self
            .tx
            .insert_tournament(NewTournament {
                date,
                deposit: request.deposit,
                game_id,
            })
            .await?;

        log::info!(
            "Announced tournament {} (deposit {}, game {}, starts {})",
            tournament.id,
            tournament.deposit,
            tournament.game_id,
            tournament.date
        );

        Ok(tournament)
    }

    /// Load a tournament and lock it for the rest of the unit of work.
    ///
    /// Joins and settlements of the same tournament serialize on this lock.
    pub async fn get(&mut self, tournament_id: TournamentId) -> TournamentResult<Tournament> {
        self.tx
            .fetch_tournament(tournament_id, true)
            .await?
            .ok_or(TournamentError::NotFound(tournament_id))
    }

    /// Load a tournament without locking it.
    pub async fn peek(&mut self, tournament_id: TournamentId) -> TournamentResult<Tournament> {
        self.tx
            .fetch_tournament(tournament_id, false)
            .await?
            .ok_or(TournamentError::NotFound(tournament_id))
    }

    /// Page through tournaments ordered by id.
    pub async fn list(&mut self, limit: i64, offset: i64) -> TournamentResult<Vec<Tournament>> {
        let limit = limit.clamp(1, MAX_PAGE_SIZE);
        let offset = offset.max(0);
        Ok(self.tx.fetch_tournaments(limit, offset).await?)
    }

    /// Transition OPEN → FINISHED.
    ///
    /// The update only matches open rows, so of two racing settlements at most
    /// one sees `true`.
    pub async fn finish(&mut self, tournament_id: TournamentId) -> TournamentResult<()> {
        if self.tx.mark_finished(tournament_id).await? {
            return Ok(());
        }

        match self.tx.fetch_tournament(tournament_id, false).await? {
            Some(_) => Err(TournamentError::AlreadyFinished(tournament_id)),
            None => Err(TournamentError::NotFound(tournament_id)),
        }
    }
}
