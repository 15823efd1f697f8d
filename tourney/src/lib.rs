//! # Tourney
//!
//! Points ledger and settlement engine for social tournaments.
//!
//! Players stake points to join a tournament, optionally co-funded by
//! backers. When the tournament ends, each declared winner's prize is split
//! between the winner and that winner's backers. Every join and settlement is
//! all-or-nothing.
//!
//! ## Core Modules
//!
//! - [`ledger`]: per-user point balances with an append-only operation log
//! - [`tournament`]: tournament records, players of record and backings
//! - [`settlement`]: the engine running joins and settlements atomically
//! - [`db`]: storage traits plus PostgreSQL and in-memory backends
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use tourney::db::MemoryStore;
//! use tourney::settlement::SettlementEngine;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), tourney::settlement::SettlementError> {
//! let engine = SettlementEngine::new(Arc::new(MemoryStore::new()));
//! let balance = engine.top_up(1, 100).await?;
//! assert_eq!(balance.amount, 100);
//! # Ok(())
//! # }
//! ```

/// Storage backends and connection management.
pub mod db;

/// Point balances and their audit trail.
pub mod ledger;
pub use ledger::{Balance, LedgerError, PointsOperation, UserId};

/// Atomic joins and settlements.
pub mod settlement;
pub use settlement::{ErrorKind, SettlementEngine, SettlementError};

/// Tournament records and join-time participation.
pub mod tournament;
pub use tournament::{Tournament, TournamentId};
