//! Points ledger: per-user balances plus an append-only operation log.
//!
//! This module implements:
//! - Lazily created balances that never go negative
//! - Conditional debits that cannot race past zero
//! - One audit entry per credit or debit, tagged with the reason and tournament
//!
//! The ledger only runs inside a unit of work; see
//! [`crate::settlement::TransactionCoordinator`].

pub mod errors;
pub mod manager;
pub mod models;

pub use errors::{LedgerError, LedgerResult};
pub use manager::BalanceLedger;
pub use models::{
    Balance, NewOperation, OperationKind, OperationReason, PointsOperation, Posting, UserId,
};
