//! Tournament data models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ledger::UserId;

/// Tournament ID type
pub type TournamentId = i64;

/// Game assigned when an announcement names none
pub const DEFAULT_GAME_ID: i64 = 1;

/// Tournament lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TournamentState {
    /// Accepting joins, not yet settled
    Open,
    /// Settled; terminal
    Finished,
}

impl TournamentState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TournamentState::Open => "open",
            TournamentState::Finished => "finished",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "open" => Some(TournamentState::Open),
            "finished" => Some(TournamentState::Finished),
            _ => None,
        }
    }
}

impl std::fmt::Display for TournamentState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tournament record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tournament {
    pub id: TournamentId,
    /// Effective start instant
    pub date: DateTime<Utc>,
    /// Nominal full stake collected per join
    pub deposit: i64,
    pub game_id: i64,
    pub state: TournamentState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Tournament {
    pub fn is_open(&self) -> bool {
        self.state == TournamentState::Open
    }
}

/// Validated tournament waiting to be inserted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTournament {
    pub date: DateTime<Utc>,
    pub deposit: i64,
    pub game_id: i64,
}

/// Request to announce a tournament
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnounceRequest {
    pub deposit: i64,
    #[serde(default)]
    pub date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub game_id: Option<i64>,
}

/// The user a join was made for (player of record)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participation {
    pub tournament_id: TournamentId,
    pub user_id: UserId,
    /// Stake this user personally funded
    pub deposit_paid: i64,
    pub created_at: DateTime<Utc>,
}

/// A user co-funding someone else's participation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Backing {
    pub tournament_id: TournamentId,
    pub player_id: UserId,
    pub backer_id: UserId,
    pub deposit_paid: i64,
    pub created_at: DateTime<Utc>,
}

/// Declared prize of a settled winner
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WinnerRecord {
    pub tournament_id: TournamentId,
    pub user_id: UserId,
    pub prize: i64,
    pub created_at: DateTime<Utc>,
}

/// Tournament with everything recorded against it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TournamentDetails {
    #[serde(flatten)]
    pub tournament: Tournament,
    pub participants: Vec<Participation>,
    pub backings: Vec<Backing>,
    pub winners: Vec<WinnerRecord>,
}
