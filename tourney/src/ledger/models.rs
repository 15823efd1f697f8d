//! Ledger data models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::tournament::TournamentId;

/// User ID type
pub type UserId = i64;

/// Current points balance of one user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balance {
    pub user_id: UserId,
    pub amount: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Audit entry for one balance mutation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointsOperation {
    pub id: i64,
    pub user_id: UserId,
    pub kind: OperationKind,
    pub amount: i64,
    pub balance_after: i64,
    pub reason: OperationReason,
    pub tournament_id: Option<TournamentId>,
    pub created_at: DateTime<Utc>,
}

/// Audit entry waiting to be appended
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOperation {
    pub user_id: UserId,
    pub kind: OperationKind,
    pub amount: i64,
    pub balance_after: i64,
    pub reason: OperationReason,
    pub tournament_id: Option<TournamentId>,
}

/// Direction of a balance mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Credit,
    Debit,
}

impl OperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::Credit => "credit",
            OperationKind::Debit => "debit",
        }
    }

    /// Parse the stored column value. Unknown values yield `None`.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "credit" => Some(OperationKind::Credit),
            "debit" => Some(OperationKind::Debit),
            _ => None,
        }
    }
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why points moved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationReason {
    /// Manual funding of a balance
    TopUp,
    /// Manual withdrawal from a balance
    Withdraw,
    /// Share of a tournament deposit collected on join
    Stake,
    /// Share of a prize paid on settlement
    Prize,
}

impl OperationReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationReason::TopUp => "top_up",
            OperationReason::Withdraw => "withdraw",
            OperationReason::Stake => "stake",
            OperationReason::Prize => "prize",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "top_up" => Some(OperationReason::TopUp),
            "withdraw" => Some(OperationReason::Withdraw),
            "stake" => Some(OperationReason::Stake),
            "prize" => Some(OperationReason::Prize),
            _ => None,
        }
    }
}

impl std::fmt::Display for OperationReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Context recorded alongside a credit or debit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Posting {
    pub reason: OperationReason,
    pub tournament_id: Option<TournamentId>,
}

impl Posting {
    pub fn top_up() -> Self {
        Self {
            reason: OperationReason::TopUp,
            tournament_id: None,
        }
    }

    pub fn withdraw() -> Self {
        Self {
            reason: OperationReason::Withdraw,
            tournament_id: None,
        }
    }

    pub fn stake(tournament_id: TournamentId) -> Self {
        Self {
            reason: OperationReason::Stake,
            tournament_id: Some(tournament_id),
        }
    }

    pub fn prize(tournament_id: TournamentId) -> Self {
        Self {
            reason: OperationReason::Prize,
            tournament_id: Some(tournament_id),
        }
    }
}
