//! In-process store.
//!
//! Transactions are fully serialized: [`MemoryStore::begin`] takes the store
//! lock and keeps it until the transaction is committed or dropped. Writes go
//! to a private working copy that replaces the shared state on commit.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

use super::store::{Store, StoreError, StoreResult, StoreTransaction};
use crate::ledger::{Balance, NewOperation, PointsOperation, UserId};
use crate::tournament::{
    Backing, NewTournament, Participation, Tournament, TournamentId, TournamentState,
    WinnerRecord,
};

#[derive(Debug, Clone, Default)]
struct MemoryState {
    balances: BTreeMap<UserId, Balance>,
    operations: Vec<PointsOperation>,
    tournaments: BTreeMap<TournamentId, Tournament>,
    participations: Vec<Participation>,
    backings: Vec<Backing>,
    winners: Vec<WinnerRecord>,
    last_operation_id: i64,
    last_tournament_id: i64,
}

/// Store kept entirely in memory
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn begin(&self) -> StoreResult<Box<dyn StoreTransaction>> {
        let guard = Arc::clone(&self.state).lock_owned().await;
        let working = guard.clone();
        Ok(Box::new(MemoryTransaction {
            guard: Some(guard),
            working,
        }))
    }

    async fn health_check(&self) -> StoreResult<()> {
        Ok(())
    }
}

/// Open transaction on a [`MemoryStore`]
pub struct MemoryTransaction {
    guard: Option<OwnedMutexGuard<MemoryState>>,
    working: MemoryState,
}

impl MemoryTransaction {
    fn state(&mut self) -> StoreResult<&mut MemoryState> {
        if self.guard.is_none() {
            return Err(StoreError::TransactionClosed);
        }
        Ok(&mut self.working)
    }
}

#[async_trait]
impl StoreTransaction for MemoryTransaction {
    async fn fetch_balance(&mut self, user_id: UserId) -> StoreResult<Option<Balance>> {
        Ok(self.state()?.balances.get(&user_id).cloned())
    }

    async fn fetch_balances(&mut self, user_ids: &[UserId]) -> StoreResult<Vec<Balance>> {
        let state = self.state()?;
        let mut ids = user_ids.to_vec();
        ids.sort_unstable();
        ids.dedup();
        Ok(ids
            .iter()
            .filter_map(|id| state.balances.get(id).cloned())
            .collect())
    }

    async fn add_to_balance(
        &mut self,
        user_id: UserId,
        amount: i64,
    ) -> StoreResult<Option<Balance>> {
        let now = Utc::now();
        let balances = &mut self.state()?.balances;
        let current = balances.get(&user_id).map_or(0, |balance| balance.amount);
        let Some(total) = current.checked_add(amount) else {
            return Ok(None);
        };

        let balance = balances.entry(user_id).or_insert_with(|| Balance {
            user_id,
            amount: 0,
            created_at: now,
            updated_at: now,
        });
        balance.amount = total;
        balance.updated_at = now;
        Ok(Some(balance.clone()))
    }

    async fn subtract_from_balance(
        &mut self,
        user_id: UserId,
        amount: i64,
    ) -> StoreResult<Option<Balance>> {
        match self.state()?.balances.get_mut(&user_id) {
            Some(balance) if balance.amount >= amount => {
                balance.amount -= amount;
                balance.updated_at = Utc::now();
                Ok(Some(balance.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn insert_operation(&mut self, operation: NewOperation) -> StoreResult<PointsOperation> {
        let state = self.state()?;
        state.last_operation_id += 1;
        let record = PointsOperation {
            id: state.last_operation_id,
            user_id: operation.user_id,
            kind: operation.kind,
            amount: operation.amount,
            balance_after: operation.balance_after,
            reason: operation.reason,
            tournament_id: operation.tournament_id,
            created_at: Utc::now(),
        };
        state.operations.push(record.clone());
        Ok(record)
    }

    async fn fetch_operations(
        &mut self,
        user_id: UserId,
        limit: i64,
    ) -> StoreResult<Vec<PointsOperation>> {
        let limit = usize::try_from(limit).unwrap_or(0);
        Ok(self
            .state()?
            .operations
            .iter()
            .rev()
            .filter(|op| op.user_id == user_id)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn insert_tournament(&mut self, tournament: NewTournament) -> StoreResult<Tournament> {
        let state = self.state()?;
        state.last_tournament_id += 1;
        let now = Utc::now();
        let record = Tournament {
            id: state.last_tournament_id,
            date: tournament.date,
            deposit: tournament.deposit,
            game_id: tournament.game_id,
            state: TournamentState::Open,
            created_at: now,
            updated_at: now,
        };
        state.tournaments.insert(record.id, record.clone());
        Ok(record)
    }

    async fn fetch_tournament(
        &mut self,
        tournament_id: TournamentId,
        _for_update: bool,
    ) -> StoreResult<Option<Tournament>> {
        // The whole store is already locked by this transaction
        Ok(self.state()?.tournaments.get(&tournament_id).cloned())
    }

    async fn fetch_tournaments(&mut self, limit: i64, offset: i64) -> StoreResult<Vec<Tournament>> {
        let limit = usize::try_from(limit).unwrap_or(0);
        let offset = usize::try_from(offset).unwrap_or(0);
        Ok(self
            .state()?
            .tournaments
            .values()
            .skip(offset)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn mark_finished(&mut self, tournament_id: TournamentId) -> StoreResult<bool> {
        match self.state()?.tournaments.get_mut(&tournament_id) {
            Some(tournament) if tournament.is_open() => {
                tournament.state = TournamentState::Finished;
                tournament.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn fetch_participation(
        &mut self,
        tournament_id: TournamentId,
        user_id: UserId,
    ) -> StoreResult<Option<Participation>> {
        Ok(self
            .state()?
            .participations
            .iter()
            .find(|p| p.tournament_id == tournament_id && p.user_id == user_id)
            .cloned())
    }

    async fn fetch_participations(
        &mut self,
        tournament_id: TournamentId,
    ) -> StoreResult<Vec<Participation>> {
        Ok(self
            .state()?
            .participations
            .iter()
            .filter(|p| p.tournament_id == tournament_id)
            .cloned()
            .collect())
    }

    async fn insert_participation(
        &mut self,
        tournament_id: TournamentId,
        user_id: UserId,
        deposit_paid: i64,
    ) -> StoreResult<Participation> {
        let state = self.state()?;
        if state
            .participations
            .iter()
            .any(|p| p.tournament_id == tournament_id && p.user_id == user_id)
        {
            return Err(StoreError::Conflict("tournament_players"));
        }

        let record = Participation {
            tournament_id,
            user_id,
            deposit_paid,
            created_at: Utc::now(),
        };
        state.participations.push(record.clone());
        Ok(record)
    }

    async fn insert_backing(
        &mut self,
        tournament_id: TournamentId,
        player_id: UserId,
        backer_id: UserId,
        deposit_paid: i64,
    ) -> StoreResult<Backing> {
        let record = Backing {
            tournament_id,
            player_id,
            backer_id,
            deposit_paid,
            created_at: Utc::now(),
        };
        self.state()?.backings.push(record.clone());
        Ok(record)
    }

    async fn fetch_backings(
        &mut self,
        tournament_id: TournamentId,
        player_id: Option<UserId>,
    ) -> StoreResult<Vec<Backing>> {
        Ok(self
            .state()?
            .backings
            .iter()
            .filter(|b| b.tournament_id == tournament_id)
            .filter(|b| player_id.is_none_or(|player| b.player_id == player))
            .cloned()
            .collect())
    }

    async fn insert_winner(
        &mut self,
        tournament_id: TournamentId,
        user_id: UserId,
        prize: i64,
    ) -> StoreResult<WinnerRecord> {
        let record = WinnerRecord {
            tournament_id,
            user_id,
            prize,
            created_at: Utc::now(),
        };
        self.state()?.winners.push(record.clone());
        Ok(record)
    }

    async fn fetch_winners(
        &mut self,
        tournament_id: TournamentId,
    ) -> StoreResult<Vec<WinnerRecord>> {
        Ok(self
            .state()?
            .winners
            .iter()
            .filter(|w| w.tournament_id == tournament_id)
            .cloned()
            .collect())
    }

    async fn commit(&mut self) -> StoreResult<()> {
        let mut guard = self.guard.take().ok_or(StoreError::TransactionClosed)?;
        *guard = std::mem::take(&mut self.working);
        Ok(())
    }
}
