//! Settlement engine: joins, settlements and the simple balance operations.

use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use super::{
    coordinator::TransactionCoordinator,
    errors::{SettlementError, SettlementResult},
    models::{
        Clock, JoinOutcome, JoinRequest, SettleRequest, SettlementOutcome, SystemClock,
        WinnerPayout,
    },
};
use crate::db::Store;
use crate::db::timeouts::{DEFAULT_TRANSACTION_TIMEOUT, with_timeout};
use crate::ledger::{Balance, PointsOperation, Posting, UserId};
use crate::tournament::{
    AnnounceRequest, MAX_PAGE_SIZE, Tournament, TournamentDetails, TournamentId,
};

/// Runs every operation inside its own unit of work, bounded by a timeout.
///
/// Cloning is cheap; clones share the store.
#[derive(Clone)]
pub struct SettlementEngine {
    coordinator: TransactionCoordinator,
    clock: Arc<dyn Clock>,
    timeout: Duration,
}

impl SettlementEngine {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            coordinator: TransactionCoordinator::new(store),
            clock: Arc::new(SystemClock),
            timeout: DEFAULT_TRANSACTION_TIMEOUT,
        }
    }

    /// Bound each unit of work by `timeout` instead of the default 10 seconds.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn coordinator(&self) -> &TransactionCoordinator {
        &self.coordinator
    }

    /// Join `request.player_id` to a tournament, collecting an equal stake
    /// from the player and every backer.
    ///
    /// The stake is `deposit / stakeholders` rounded down; the remainder is
    /// not collected from anyone.
    ///
    /// # Errors
    ///
    /// * `SettlementError::InvalidStakeholders` - player among backers, or a backer listed twice
    /// * `SettlementError::TournamentNotFound` - no such tournament
    /// * `SettlementError::TournamentExpired` - tournament start is in the past
    /// * `SettlementError::TournamentFinished` - tournament already settled
    /// * `SettlementError::AlreadyJoined` - player already joined this tournament
    /// * `SettlementError::MissingBalance` - a stakeholder has never had a balance
    /// * `SettlementError::InsufficientBalance` - a stakeholder cannot cover the stake
    pub async fn join_tournament(&self, request: JoinRequest) -> SettlementResult<JoinOutcome> {
        let result = self.run("join_tournament", self.join(&request)).await;
        if let Ok(outcome) = &result {
            log::info!(
                "Player {} joined tournament {} with {} stakeholder(s) at {} each",
                outcome.player_id,
                outcome.tournament_id,
                outcome.stakeholders.len(),
                outcome.stake
            );
        }
        result
    }

    /// Pay every declared winner's prize out to the winner and their backers
    /// and finish the tournament.
    ///
    /// Either every winner is paid and the tournament is finished, or nothing
    /// changes.
    ///
    /// # Errors
    ///
    /// * `SettlementError::InvalidWinners` - no winners, or a non-positive prize
    /// * `SettlementError::TournamentNotFound` - no such tournament
    /// * `SettlementError::TournamentFinished` - tournament already settled
    /// * `SettlementError::PlayerNotRegistered` - a winner never joined as a player
    pub async fn settle_tournament(
        &self,
        request: SettleRequest,
    ) -> SettlementResult<SettlementOutcome> {
        let result = self.run("settle_tournament", self.settle(&request)).await;
        if let Ok(outcome) = &result {
            log::info!(
                "Settled tournament {}: {} winner(s), {} points paid out",
                outcome.tournament_id,
                outcome.winners.len(),
                outcome.paid_out()
            );
        }
        result
    }

    /// Credit `points` to a user, creating the balance if needed.
    pub async fn top_up(&self, user_id: UserId, points: i64) -> SettlementResult<Balance> {
        self.run("top_up", async {
            let mut unit = self.coordinator.begin().await?;
            let balance = unit
                .ledger()
                .credit(user_id, points, Posting::top_up())
                .await?;
            unit.commit().await?;
            Ok(balance)
        })
        .await
    }

    /// Debit `points` from an existing balance.
    ///
    /// # Errors
    ///
    /// * `SettlementError::BalanceNotFound` - user has no balance
    /// * `SettlementError::InsufficientFunds` - balance smaller than `points`
    pub async fn withdraw(&self, user_id: UserId, points: i64) -> SettlementResult<Balance> {
        self.run("withdraw", async {
            let mut unit = self.coordinator.begin().await?;
            unit.ledger().get(user_id).await?;
            let balance = unit
                .ledger()
                .debit(user_id, points, Posting::withdraw())
                .await?;
            unit.commit().await?;
            Ok(balance)
        })
        .await
    }

    pub async fn balance(&self, user_id: UserId) -> SettlementResult<Balance> {
        self.run("balance", async {
            let mut unit = self.coordinator.begin().await?;
            Ok(unit.ledger().get(user_id).await?)
        })
        .await
    }

    /// Most recent operations of a user, newest first. `limit` is clamped to
    /// `1..=MAX_PAGE_SIZE`.
    pub async fn operations(
        &self,
        user_id: UserId,
        limit: i64,
    ) -> SettlementResult<Vec<PointsOperation>> {
        self.run("operations", async {
            let mut unit = self.coordinator.begin().await?;
            let limit = limit.clamp(1, MAX_PAGE_SIZE);
            Ok(unit.ledger().operations(user_id, limit).await?)
        })
        .await
    }

    /// Create an OPEN tournament.
    pub async fn announce(&self, request: AnnounceRequest) -> SettlementResult<Tournament> {
        self.run("announce", async {
            let mut unit = self.coordinator.begin().await?;
            let tournament = unit
                .tournaments()
                .announce(request, self.clock.now())
                .await?;
            unit.commit().await?;
            Ok(tournament)
        })
        .await
    }

    pub async fn list_tournaments(
        &self,
        limit: i64,
        offset: i64,
    ) -> SettlementResult<Vec<Tournament>> {
        self.run("list_tournaments", async {
            let mut unit = self.coordinator.begin().await?;
            Ok(unit.tournaments().list(limit, offset).await?)
        })
        .await
    }

    /// A tournament with its players, backings and winners.
    pub async fn tournament_details(
        &self,
        tournament_id: TournamentId,
    ) -> SettlementResult<TournamentDetails> {
        self.run("tournament_details", async {
            let mut unit = self.coordinator.begin().await?;
            let tournament = unit.tournaments().peek(tournament_id).await?;
            let mut participations = unit.participations();
            Ok(TournamentDetails {
                tournament,
                participants: participations.participants(tournament_id).await?,
                backings: participations.backings(tournament_id).await?,
                winners: participations.winners(tournament_id).await?,
            })
        })
        .await
    }

    pub async fn health_check(&self) -> SettlementResult<()> {
        self.run("health_check", async {
            Ok(self.coordinator.store().health_check().await?)
        })
        .await
    }

    async fn run<T, F>(&self, operation: &'static str, future: F) -> SettlementResult<T>
    where
        F: Future<Output = SettlementResult<T>>,
    {
        let result = with_timeout(self.timeout, future).await;
        if let Err(err) = &result {
            log::warn!("{} failed: {}", operation, err);
        }
        result
    }

    async fn join(&self, request: &JoinRequest) -> SettlementResult<JoinOutcome> {
        let tournament_id = request.tournament_id;
        let player_id = request.player_id;
        let stakeholders = join_stakeholders(request)?;

        let mut unit = self.coordinator.begin().await?;

        // Locks the tournament row until commit or rollback
        let tournament = unit.tournaments().get(tournament_id).await?;
        if tournament.date < self.clock.now() {
            return Err(SettlementError::TournamentExpired {
                tournament_id,
                date: tournament.date,
            });
        }
        if !tournament.is_open() {
            return Err(SettlementError::TournamentFinished(tournament_id));
        }
        if unit
            .participations()
            .player(tournament_id, player_id)
            .await?
            .is_some()
        {
            return Err(SettlementError::AlreadyJoined {
                tournament_id,
                player_id,
            });
        }

        if stakeholders.is_empty() {
            return Err(SettlementError::NoStakeholders);
        }
        let stake = tournament.deposit / stakeholders.len() as i64;

        let balances = unit.ledger().get_many(&stakeholders).await?;
        if let Some(missing) = stakeholders
            .iter()
            .find(|id| !balances.iter().any(|b| b.user_id == **id))
        {
            return Err(SettlementError::MissingBalance(*missing));
        }
        if let Some(short) = balances.iter().find(|b| b.amount < stake) {
            return Err(SettlementError::InsufficientBalance {
                user_id: short.user_id,
                available: short.amount,
                required: stake,
            });
        }

        // Player row first: backings reference it
        unit.participations()
            .register_player(tournament_id, player_id, stake)
            .await?;
        for &backer_id in stakeholders.iter().filter(|id| **id != player_id) {
            unit.participations()
                .add_backing(tournament_id, player_id, backer_id, stake)
                .await?;
        }

        if stake > 0 {
            for &user_id in &stakeholders {
                unit.ledger()
                    .debit(user_id, stake, Posting::stake(tournament_id))
                    .await?;
            }
        }

        unit.commit().await?;

        Ok(JoinOutcome {
            tournament_id,
            player_id,
            stake,
            stakeholders,
        })
    }

    async fn settle(&self, request: &SettleRequest) -> SettlementResult<SettlementOutcome> {
        let tournament_id = request.tournament_id;
        validate_winners(request)?;

        let mut unit = self.coordinator.begin().await?;

        let tournament = unit.tournaments().get(tournament_id).await?;
        if !tournament.is_open() {
            return Err(SettlementError::TournamentFinished(tournament_id));
        }

        let mut payouts = Vec::with_capacity(request.winners.len());
        let mut credits: Vec<(UserId, i64)> = Vec::new();

        for winner in &request.winners {
            let mut participations = unit.participations();
            if participations
                .player(tournament_id, winner.player_id)
                .await?
                .is_none()
            {
                return Err(SettlementError::PlayerNotRegistered {
                    tournament_id,
                    player_id: winner.player_id,
                });
            }

            participations
                .record_winner(tournament_id, winner.player_id, winner.prize)
                .await?;

            let mut group: Vec<UserId> = participations
                .backers_of(tournament_id, winner.player_id)
                .await?
                .into_iter()
                .map(|backing| backing.backer_id)
                .collect();
            group.push(winner.player_id);
            group.sort_unstable();

            let share = winner.prize / group.len() as i64;
            credits.extend(group.iter().map(|&user_id| (user_id, share)));
            payouts.push(WinnerPayout {
                player_id: winner.player_id,
                prize: winner.prize,
                share,
                stakeholders: group,
            });
        }

        // Apply every credit in user id order across all winners
        credits.sort_by_key(|(user_id, _)| *user_id);
        for (user_id, share) in credits {
            if share > 0 {
                unit.ledger()
                    .credit(user_id, share, Posting::prize(tournament_id))
                    .await?;
            }
        }

        unit.tournaments().finish(tournament_id).await?;
        unit.commit().await?;

        Ok(SettlementOutcome {
            tournament_id,
            winners: payouts,
        })
    }
}

/// Player plus backers, ascending by user id.
fn join_stakeholders(request: &JoinRequest) -> SettlementResult<Vec<UserId>> {
    let mut seen = HashSet::with_capacity(request.backer_ids.len() + 1);
    seen.insert(request.player_id);

    for &backer_id in &request.backer_ids {
        if backer_id == request.player_id {
            return Err(SettlementError::InvalidStakeholders(format!(
                "player {} cannot back themselves",
                backer_id
            )));
        }
        if !seen.insert(backer_id) {
            return Err(SettlementError::InvalidStakeholders(format!(
                "backer {} listed more than once",
                backer_id
            )));
        }
    }

    let mut stakeholders: Vec<UserId> = seen.into_iter().collect();
    stakeholders.sort_unstable();
    Ok(stakeholders)
}

fn validate_winners(request: &SettleRequest) -> SettlementResult<()> {
    if request.winners.is_empty() {
        return Err(SettlementError::InvalidWinners(
            "no winners declared".to_string(),
        ));
    }
    if let Some(winner) = request.winners.iter().find(|w| w.prize <= 0) {
        return Err(SettlementError::InvalidWinners(format!(
            "prize {} for player {} must be positive",
            winner.prize, winner.player_id
        )));
    }
    Ok(())
}
