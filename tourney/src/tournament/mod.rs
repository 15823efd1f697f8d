//! Tournament module: tournament records and join-time participation data.
//!
//! This module provides:
//! - [`TournamentRegistry`]: announcement, lookup, listing and the one-way
//!   OPEN → FINISHED transition
//! - [`ParticipationStore`]: players of record, backings and winner records
//!
//! Both operate on an open unit of work handed out by
//! [`crate::settlement::TransactionCoordinator`].

pub mod manager;
pub mod models;
pub mod participation;

pub use manager::{
    DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE, TournamentError, TournamentRegistry, TournamentResult,
};
pub use models::{
    AnnounceRequest, Backing, DEFAULT_GAME_ID, NewTournament, Participation, Tournament,
    TournamentDetails, TournamentId, TournamentState, WinnerRecord,
};
pub use participation::ParticipationStore;
