//! Settlement module: atomic joins and prize settlements.
//!
//! This module provides:
//! - [`SettlementEngine`]: join, settle, top-up, withdraw and read queries,
//!   each executed inside one unit of work
//! - [`TransactionCoordinator`] / [`UnitOfWork`]: the commit-or-discard boundary
//! - [`SettlementError`]: the failure taxonomy, with [`ErrorKind`] for transports
//!
//! ## Stake arithmetic
//!
//! A join collects `deposit / n` from each of its `n` stakeholders, and a
//! settlement credits `prize / m` to each of a winner's `m` stakeholders.
//! Both divisions round down and the remainder is dropped.

pub mod coordinator;
pub mod engine;
pub mod errors;
pub mod models;

pub use coordinator::{TransactionCoordinator, UnitOfWork};
pub use engine::SettlementEngine;
pub use errors::{ErrorKind, SettlementError, SettlementResult};
pub use models::{
    Clock, JoinOutcome, JoinRequest, SettleRequest, SettlementOutcome, SystemClock,
    WinnerDeclaration, WinnerPayout,
};
