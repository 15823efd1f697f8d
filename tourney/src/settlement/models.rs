//! Request and outcome types of the settlement engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ledger::UserId;
use crate::tournament::TournamentId;

/// Join a tournament as `player_id`, co-funded by `backer_ids`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinRequest {
    pub tournament_id: TournamentId,
    pub player_id: UserId,
    #[serde(default)]
    pub backer_ids: Vec<UserId>,
}

/// One declared winner of a tournament
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WinnerDeclaration {
    pub player_id: UserId,
    /// Gross prize before splitting among stakeholders
    pub prize: i64,
}

/// Settle a tournament with its declared winners, processed in order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettleRequest {
    pub tournament_id: TournamentId,
    pub winners: Vec<WinnerDeclaration>,
}

/// Result of a committed join
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinOutcome {
    pub tournament_id: TournamentId,
    pub player_id: UserId,
    /// Points debited from each stakeholder
    pub stake: i64,
    /// Player and backers, ascending by user id
    pub stakeholders: Vec<UserId>,
}

impl JoinOutcome {
    /// Points actually collected; the floor-division remainder is not.
    ///
    /// Saturates at `i64::MAX`.
    pub fn collected(&self) -> i64 {
        self.stake.saturating_mul(self.stakeholders.len() as i64)
    }
}

/// How one winner's prize was split
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WinnerPayout {
    pub player_id: UserId,
    pub prize: i64,
    /// Points credited to each stakeholder
    pub share: i64,
    /// Winner and their backers, ascending by user id
    pub stakeholders: Vec<UserId>,
}

/// Result of a committed settlement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementOutcome {
    pub tournament_id: TournamentId,
    /// One entry per declaration, in declaration order
    pub winners: Vec<WinnerPayout>,
}

impl SettlementOutcome {
    /// Points actually paid out across all winners.
    ///
    /// Saturates at `i64::MAX`; a single call may credit more than that in total.
    pub fn paid_out(&self) -> i64 {
        self.winners.iter().fold(0i64, |total, w| {
            total.saturating_add(w.share.saturating_mul(w.stakeholders.len() as i64))
        })
    }
}

/// Source of the current instant
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
