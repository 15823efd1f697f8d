//! Join-time records: players of record, their backers, and declared winners.

use super::manager::{TournamentError, TournamentResult};
use super::models::{Backing, Participation, TournamentId, WinnerRecord};
use crate::db::{StoreError, StoreTransaction};
use crate::ledger::UserId;

/// Participation, backing and winner rows inside one unit of work
pub struct ParticipationStore<'t> {
    tx: &'t mut dyn StoreTransaction,
}

impl<'t> ParticipationStore<'t> {
    pub fn new(tx: &'t mut dyn StoreTransaction) -> Self {
        Self { tx }
    }

    /// Player-of-record row, if `user_id` joined `tournament_id` as a player.
    pub async fn player(
        &mut self,
        tournament_id: TournamentId,
        user_id: UserId,
    ) -> TournamentResult<Option<Participation>> {
        Ok(self.tx.fetch_participation(tournament_id, user_id).await?)
    }

    /// Record `user_id` as a player of `tournament_id`.
    ///
    /// The store enforces one row per `(tournament_id, user_id)`; a duplicate
    /// becomes [`TournamentError::AlreadyJoined`].
    pub async fn register_player(
        &mut self,
        tournament_id: TournamentId,
        user_id: UserId,
        deposit_paid: i64,
    ) -> TournamentResult<Participation> {
        self.tx
            .insert_participation(tournament_id, user_id, deposit_paid)
            .await
            .map_err(|err| match err {
                StoreError::Conflict(_) => TournamentError::AlreadyJoined {
                    tournament_id,
                    user_id,
                },
                other => TournamentError::Store(other),
            })
    }

    pub async fn add_backing(
        &mut self,
        tournament_id: TournamentId,
        player_id: UserId,
        backer_id: UserId,
        deposit_paid: i64,
    ) -> TournamentResult<Backing> {
        Ok(self
            .tx
            .insert_backing(tournament_id, player_id, backer_id, deposit_paid)
            .await?)
    }

    /// Backers of one player in one tournament.
    pub async fn backers_of(
        &mut self,
        tournament_id: TournamentId,
        player_id: UserId,
    ) -> TournamentResult<Vec<Backing>> {
        Ok(self.tx.fetch_backings(tournament_id, Some(player_id)).await?)
    }

    pub async fn record_winner(
        &mut self,
        tournament_id: TournamentId,
        user_id: UserId,
        prize: i64,
    ) -> TournamentResult<WinnerRecord> {
        Ok(self.tx.insert_winner(tournament_id, user_id, prize).await?)
    }

    pub async fn participants(
        &mut self,
        tournament_id: TournamentId,
    ) -> TournamentResult<Vec<Participation>> {
        Ok(self.tx.fetch_participations(tournament_id).await?)
    }

    pub async fn backings(&mut self, tournament_id: TournamentId) -> TournamentResult<Vec<Backing>> {
        Ok(self.tx.fetch_backings(tournament_id, None).await?)
    }

    pub async fn winners(
        &mut self,
        tournament_id: TournamentId,
    ) -> TournamentResult<Vec<WinnerRecord>> {
        Ok(self.tx.fetch_winners(tournament_id).await?)
    }
}
