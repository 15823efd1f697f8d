//! Integration tests for joins and settlements.
//!
//! Runs the engine against the in-memory store and checks balances, audit
//! entries and participation records after every success and every failure.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tourney::db::{MemoryStore, Store};
use tourney::ledger::{OperationKind, OperationReason, UserId};
use tourney::settlement::{
    Clock, JoinRequest, SettleRequest, SettlementEngine, SettlementError, WinnerDeclaration,
};
use tourney::tournament::{AnnounceRequest, TournamentDetails, TournamentId, TournamentState};

/// Clock the tests can move forward
struct ManualClock(Mutex<DateTime<Utc>>);

impl ManualClock {
    fn new() -> Arc<Self> {
        Arc::new(Self(Mutex::new(Utc::now())))
    }

    fn advance(&self, by: ChronoDuration) {
        let mut now = self.0.lock().unwrap();
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.0.lock().unwrap()
    }
}

/// Helper to create an engine over a fresh store
fn setup_engine() -> (SettlementEngine, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let engine = SettlementEngine::new(store.clone());
    (engine, store)
}

/// Helper to fund users with the same amount
async fn fund(engine: &SettlementEngine, users: &[UserId], points: i64) {
    for &user in users {
        engine.top_up(user, points).await.unwrap();
    }
}

/// Helper to announce a tournament starting tomorrow
async fn announce(engine: &SettlementEngine, deposit: i64) -> TournamentId {
    engine
        .announce(AnnounceRequest {
            deposit,
            date: Some(Utc::now() + ChronoDuration::days(1)),
            game_id: None,
        })
        .await
        .unwrap()
        .id
}

fn join(tournament_id: TournamentId, player_id: UserId, backer_ids: Vec<UserId>) -> JoinRequest {
    JoinRequest {
        tournament_id,
        player_id,
        backer_ids,
    }
}

fn settle(tournament_id: TournamentId, winners: &[(UserId, i64)]) -> SettleRequest {
    SettleRequest {
        tournament_id,
        winners: winners
            .iter()
            .map(|&(player_id, prize)| WinnerDeclaration { player_id, prize })
            .collect(),
    }
}

async fn balance_of(engine: &SettlementEngine, user: UserId) -> i64 {
    engine.balance(user).await.unwrap().amount
}

async fn balances(engine: &SettlementEngine, users: &[UserId]) -> Vec<i64> {
    let mut amounts = Vec::with_capacity(users.len());
    for &user in users {
        amounts.push(balance_of(engine, user).await);
    }
    amounts
}

/// Everything a failed call could have touched
#[derive(Debug, PartialEq)]
struct Snapshot {
    balances: Vec<i64>,
    operation_counts: Vec<usize>,
    details: TournamentDetails,
}

async fn snapshot(
    engine: &SettlementEngine,
    tournament_id: TournamentId,
    users: &[UserId],
) -> Snapshot {
    let mut operation_counts = Vec::with_capacity(users.len());
    for &user in users {
        operation_counts.push(engine.operations(user, 100).await.unwrap().len());
    }
    Snapshot {
        balances: balances(engine, users).await,
        operation_counts,
        details: engine.tournament_details(tournament_id).await.unwrap(),
    }
}

// ============================================================================
// Join
// ============================================================================

#[tokio::test]
async fn test_join_collects_floor_stake_from_every_stakeholder() {
    let (engine, _store) = setup_engine();
    fund(&engine, &[1, 2, 3], 100).await;
    let tournament_id = announce(&engine, 100).await;

    let outcome = engine
        .join_tournament(join(tournament_id, 1, vec![3, 2]))
        .await
        .unwrap();

    assert_eq!(outcome.stake, 33);
    assert_eq!(outcome.stakeholders, vec![1, 2, 3]);
    assert_eq!(outcome.collected(), 99);
    assert_eq!(balances(&engine, &[1, 2, 3]).await, vec![67, 67, 67]);

    let details = engine.tournament_details(tournament_id).await.unwrap();
    assert_eq!(details.participants.len(), 1);
    assert_eq!(details.participants[0].user_id, 1);
    assert_eq!(details.participants[0].deposit_paid, 33);
    assert_eq!(details.backings.len(), 2);
    assert!(details.backings.iter().all(|b| b.player_id == 1 && b.deposit_paid == 33));

    let ops = engine.operations(2, 10).await.unwrap();
    assert_eq!(ops.len(), 2);
    assert_eq!(ops[0].kind, OperationKind::Debit);
    assert_eq!(ops[0].reason, OperationReason::Stake);
    assert_eq!(ops[0].tournament_id, Some(tournament_id));
    assert_eq!(ops[0].balance_after, 67);
}

#[tokio::test]
async fn test_join_twice_fails_already_joined() {
    let (engine, _store) = setup_engine();
    fund(&engine, &[1, 2, 3], 100).await;
    let tournament_id = announce(&engine, 100).await;

    engine
        .join_tournament(join(tournament_id, 1, vec![2, 3]))
        .await
        .unwrap();
    let before = snapshot(&engine, tournament_id, &[1, 2, 3]).await;

    let err = engine
        .join_tournament(join(tournament_id, 1, vec![2, 3]))
        .await
        .unwrap_err();
    assert!(matches!(err, SettlementError::AlreadyJoined { player_id: 1, .. }));

    assert_eq!(snapshot(&engine, tournament_id, &[1, 2, 3]).await, before);
    assert_eq!(balances(&engine, &[1, 2, 3]).await, vec![67, 67, 67]);
}

#[tokio::test]
async fn test_join_with_one_short_stakeholder_debits_nobody() {
    let (engine, _store) = setup_engine();
    fund(&engine, &[1, 2], 100).await;
    fund(&engine, &[3], 10).await;
    let tournament_id = announce(&engine, 90).await;
    let before = snapshot(&engine, tournament_id, &[1, 2, 3]).await;

    let err = engine
        .join_tournament(join(tournament_id, 1, vec![2, 3]))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        SettlementError::InsufficientBalance {
            user_id: 3,
            available: 10,
            required: 30
        }
    ));

    assert_eq!(snapshot(&engine, tournament_id, &[1, 2, 3]).await, before);
}

#[tokio::test]
async fn test_join_with_missing_balance_fails() {
    let (engine, _store) = setup_engine();
    fund(&engine, &[1], 100).await;
    let tournament_id = announce(&engine, 50).await;

    let err = engine
        .join_tournament(join(tournament_id, 1, vec![42]))
        .await
        .unwrap_err();
    assert!(matches!(err, SettlementError::MissingBalance(42)));
    assert_eq!(balance_of(&engine, 1).await, 100);
    assert!(
        engine
            .tournament_details(tournament_id)
            .await
            .unwrap()
            .participants
            .is_empty()
    );
}

#[tokio::test]
async fn test_join_rejects_bad_stakeholder_lists() {
    let (engine, _store) = setup_engine();
    fund(&engine, &[1, 2], 100).await;
    let tournament_id = announce(&engine, 50).await;

    let err = engine
        .join_tournament(join(tournament_id, 1, vec![2, 1]))
        .await
        .unwrap_err();
    assert!(matches!(err, SettlementError::InvalidStakeholders(_)));

    let err = engine
        .join_tournament(join(tournament_id, 1, vec![2, 2]))
        .await
        .unwrap_err();
    assert!(matches!(err, SettlementError::InvalidStakeholders(_)));

    assert_eq!(balances(&engine, &[1, 2]).await, vec![100, 100]);
}

#[tokio::test]
async fn test_join_unknown_tournament() {
    let (engine, _store) = setup_engine();
    fund(&engine, &[1], 100).await;

    let err = engine.join_tournament(join(77, 1, vec![])).await.unwrap_err();
    assert!(matches!(err, SettlementError::TournamentNotFound(77)));
}

#[tokio::test]
async fn test_join_after_start_is_expired() {
    let store = Arc::new(MemoryStore::new());
    let clock = ManualClock::new();
    let engine = SettlementEngine::new(store).with_clock(clock.clone());
    fund(&engine, &[1], 100).await;

    let tournament = engine
        .announce(AnnounceRequest {
            deposit: 10,
            date: Some(clock.now() + ChronoDuration::hours(1)),
            game_id: None,
        })
        .await
        .unwrap();

    clock.advance(ChronoDuration::hours(2));

    let err = engine
        .join_tournament(join(tournament.id, 1, vec![]))
        .await
        .unwrap_err();
    assert!(matches!(err, SettlementError::TournamentExpired { .. }));
    assert_eq!(balance_of(&engine, 1).await, 100);
}

#[tokio::test]
async fn test_join_finished_tournament() {
    let (engine, _store) = setup_engine();
    fund(&engine, &[1, 2], 100).await;
    let tournament_id = announce(&engine, 10).await;
    engine
        .join_tournament(join(tournament_id, 1, vec![]))
        .await
        .unwrap();
    engine
        .settle_tournament(settle(tournament_id, &[(1, 10)]))
        .await
        .unwrap();

    let err = engine
        .join_tournament(join(tournament_id, 2, vec![]))
        .await
        .unwrap_err();
    assert!(matches!(err, SettlementError::TournamentFinished(_)));
    assert_eq!(balance_of(&engine, 2).await, 100);
}

#[tokio::test]
async fn test_join_with_zero_stake_records_rows_without_debits() {
    let (engine, _store) = setup_engine();
    fund(&engine, &[1, 2, 3], 5).await;
    // 2 / 3 rounds down to 0
    let tournament_id = announce(&engine, 2).await;

    let outcome = engine
        .join_tournament(join(tournament_id, 1, vec![2, 3]))
        .await
        .unwrap();
    assert_eq!(outcome.stake, 0);
    assert_eq!(balances(&engine, &[1, 2, 3]).await, vec![5, 5, 5]);
    assert_eq!(engine.operations(1, 10).await.unwrap().len(), 1);

    let details = engine.tournament_details(tournament_id).await.unwrap();
    assert_eq!(details.participants.len(), 1);
    assert_eq!(details.backings.len(), 2);
}

// ============================================================================
// Settlement
// ============================================================================

#[tokio::test]
async fn test_settle_splits_prize_among_winner_and_backers() {
    let (engine, _store) = setup_engine();
    fund(&engine, &[1, 2, 3], 100).await;
    let tournament_id = announce(&engine, 90).await;
    engine
        .join_tournament(join(tournament_id, 1, vec![2, 3]))
        .await
        .unwrap();
    assert_eq!(balances(&engine, &[1, 2, 3]).await, vec![70, 70, 70]);

    let outcome = engine
        .settle_tournament(settle(tournament_id, &[(1, 90)]))
        .await
        .unwrap();
    assert_eq!(outcome.winners.len(), 1);
    assert_eq!(outcome.winners[0].share, 30);
    assert_eq!(outcome.winners[0].stakeholders, vec![1, 2, 3]);
    assert_eq!(outcome.paid_out(), 90);
    assert_eq!(balances(&engine, &[1, 2, 3]).await, vec![100, 100, 100]);

    let details = engine.tournament_details(tournament_id).await.unwrap();
    assert_eq!(details.tournament.state, TournamentState::Finished);
    assert_eq!(details.winners.len(), 1);
    assert_eq!(details.winners[0].prize, 90);

    let ops = engine.operations(3, 1).await.unwrap();
    assert_eq!(ops[0].kind, OperationKind::Credit);
    assert_eq!(ops[0].reason, OperationReason::Prize);
}

#[tokio::test]
async fn test_settle_twice_fails_and_credits_nothing() {
    let (engine, _store) = setup_engine();
    fund(&engine, &[1, 2, 3], 100).await;
    let tournament_id = announce(&engine, 90).await;
    engine
        .join_tournament(join(tournament_id, 1, vec![2, 3]))
        .await
        .unwrap();
    engine
        .settle_tournament(settle(tournament_id, &[(1, 90)]))
        .await
        .unwrap();
    let before = snapshot(&engine, tournament_id, &[1, 2, 3]).await;

    let err = engine
        .settle_tournament(settle(tournament_id, &[(1, 90)]))
        .await
        .unwrap_err();
    assert!(matches!(err, SettlementError::TournamentFinished(_)));
    assert_eq!(snapshot(&engine, tournament_id, &[1, 2, 3]).await, before);
}

#[tokio::test]
async fn test_settle_rolls_back_every_winner_on_late_failure() {
    let (engine, _store) = setup_engine();
    fund(&engine, &[1, 2, 9], 100).await;
    let tournament_id = announce(&engine, 50).await;
    engine
        .join_tournament(join(tournament_id, 1, vec![2]))
        .await
        .unwrap();
    let before = snapshot(&engine, tournament_id, &[1, 2, 9]).await;

    // Player 9 never joined
    let err = engine
        .settle_tournament(settle(tournament_id, &[(1, 80), (9, 20)]))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        SettlementError::PlayerNotRegistered { player_id: 9, .. }
    ));

    let after = snapshot(&engine, tournament_id, &[1, 2, 9]).await;
    assert_eq!(after, before);
    assert!(after.details.winners.is_empty());
    assert_eq!(after.details.tournament.state, TournamentState::Open);
}

#[tokio::test]
async fn test_settle_processes_repeated_winners_independently() {
    let (engine, _store) = setup_engine();
    fund(&engine, &[1, 2], 100).await;
    let tournament_id = announce(&engine, 20).await;
    engine
        .join_tournament(join(tournament_id, 1, vec![2]))
        .await
        .unwrap();

    let outcome = engine
        .settle_tournament(settle(tournament_id, &[(1, 10), (1, 7)]))
        .await
        .unwrap();
    // 10 / 2 = 5 and 7 / 2 = 3 per stakeholder; the odd point is dropped
    assert_eq!(outcome.paid_out(), 16);
    assert_eq!(balances(&engine, &[1, 2]).await, vec![98, 98]);
    assert_eq!(
        engine
            .tournament_details(tournament_id)
            .await
            .unwrap()
            .winners
            .len(),
        2
    );
}

#[tokio::test]
async fn test_settle_multiple_winners_with_separate_backers() {
    let (engine, _store) = setup_engine();
    fund(&engine, &[1, 2, 3, 4, 5], 100).await;
    let tournament_id = announce(&engine, 60).await;
    engine
        .join_tournament(join(tournament_id, 1, vec![2]))
        .await
        .unwrap();
    engine
        .join_tournament(join(tournament_id, 3, vec![4, 5]))
        .await
        .unwrap();
    assert_eq!(balances(&engine, &[1, 2, 3, 4, 5]).await, vec![70, 70, 80, 80, 80]);

    engine
        .settle_tournament(settle(tournament_id, &[(3, 100), (1, 20)]))
        .await
        .unwrap();
    assert_eq!(
        balances(&engine, &[1, 2, 3, 4, 5]).await,
        vec![80, 80, 113, 113, 113]
    );
}

#[tokio::test]
async fn test_settle_max_prizes_reports_saturated_total() {
    let (engine, _store) = setup_engine();
    fund(&engine, &[1, 2], 2).await;
    let tournament_id = announce(&engine, 2).await;
    for player in [1, 2] {
        engine
            .join_tournament(join(tournament_id, player, vec![]))
            .await
            .unwrap();
    }
    assert_eq!(balances(&engine, &[1, 2]).await, vec![0, 0]);

    let outcome = engine
        .settle_tournament(settle(tournament_id, &[(1, i64::MAX), (2, i64::MAX)]))
        .await
        .unwrap();

    assert_eq!(outcome.paid_out(), i64::MAX);
    assert_eq!(balances(&engine, &[1, 2]).await, vec![i64::MAX, i64::MAX]);
}

#[tokio::test]
async fn test_settle_rejects_malformed_winner_lists() {
    let (engine, _store) = setup_engine();
    let tournament_id = announce(&engine, 20).await;

    let err = engine
        .settle_tournament(settle(tournament_id, &[]))
        .await
        .unwrap_err();
    assert!(matches!(err, SettlementError::InvalidWinners(_)));

    let err = engine
        .settle_tournament(settle(tournament_id, &[(1, -5)]))
        .await
        .unwrap_err();
    assert!(matches!(err, SettlementError::InvalidWinners(_)));

    let details = engine.tournament_details(tournament_id).await.unwrap();
    assert_eq!(details.tournament.state, TournamentState::Open);
}

// ============================================================================
// Idempotence of failures
// ============================================================================

#[tokio::test]
async fn test_failed_calls_leave_no_residue() {
    let (engine, _store) = setup_engine();
    fund(&engine, &[1, 2], 100).await;
    fund(&engine, &[3], 1).await;
    let tournament_id = announce(&engine, 30).await;
    engine
        .join_tournament(join(tournament_id, 1, vec![2]))
        .await
        .unwrap();
    let before = snapshot(&engine, tournament_id, &[1, 2, 3]).await;

    for _ in 0..5 {
        assert!(
            engine
                .join_tournament(join(tournament_id, 3, vec![]))
                .await
                .is_err()
        );
        assert!(
            engine
                .join_tournament(join(tournament_id, 1, vec![2]))
                .await
                .is_err()
        );
        assert!(
            engine
                .settle_tournament(settle(tournament_id, &[(1, 40), (3, 40)]))
                .await
                .is_err()
        );
        assert_eq!(snapshot(&engine, tournament_id, &[1, 2, 3]).await, before);
    }
}

// ============================================================================
// Balance operations
// ============================================================================

#[tokio::test]
async fn test_top_up_and_withdraw() {
    let (engine, _store) = setup_engine();

    assert!(matches!(
        engine.balance(1).await.unwrap_err(),
        SettlementError::BalanceNotFound(1)
    ));
    assert!(matches!(
        engine.withdraw(1, 5).await.unwrap_err(),
        SettlementError::BalanceNotFound(1)
    ));

    assert_eq!(engine.top_up(1, 50).await.unwrap().amount, 50);
    assert_eq!(engine.withdraw(1, 20).await.unwrap().amount, 30);

    let err = engine.withdraw(1, 31).await.unwrap_err();
    assert!(matches!(
        err,
        SettlementError::InsufficientFunds {
            available: 30,
            required: 31,
            ..
        }
    ));
    assert!(matches!(
        engine.top_up(1, 0).await.unwrap_err(),
        SettlementError::InvalidAmount(0)
    ));

    assert_eq!(balance_of(&engine, 1).await, 30);
    assert_eq!(engine.operations(1, 10).await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_list_tournaments_pages() {
    let (engine, _store) = setup_engine();
    for deposit in [10, 20, 30] {
        announce(&engine, deposit).await;
    }

    let page = engine.list_tournaments(2, 0).await.unwrap();
    assert_eq!(page.len(), 2);
    let page = engine.list_tournaments(2, 2).await.unwrap();
    assert_eq!(page.len(), 1);
    assert_eq!(page[0].deposit, 30);
    assert!(engine.list_tournaments(2, 3).await.unwrap().is_empty());
}

// ============================================================================
// Concurrency
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_top_ups_lose_nothing() {
    let (engine, _store) = setup_engine();

    let handles: Vec<_> = (0..50)
        .map(|_| {
            let engine = engine.clone();
            tokio::spawn(async move { engine.top_up(1, 2).await })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(balance_of(&engine, 1).await, 100);
    assert_eq!(engine.operations(1, 100).await.unwrap().len(), 50);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_joins_by_same_player_succeed_once() {
    let (engine, _store) = setup_engine();
    fund(&engine, &[1], 1000).await;
    let tournament_id = announce(&engine, 100).await;

    let handles: Vec<_> = (0..10)
        .map(|_| {
            let engine = engine.clone();
            tokio::spawn(async move { engine.join_tournament(join(tournament_id, 1, vec![])).await })
        })
        .collect();

    let mut joined = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => joined += 1,
            Err(err) => assert!(matches!(err, SettlementError::AlreadyJoined { .. })),
        }
    }

    assert_eq!(joined, 1);
    assert_eq!(balance_of(&engine, 1).await, 900);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_joins_sharing_a_backer_never_overdraw() {
    let (engine, _store) = setup_engine();
    fund(&engine, &[1, 2, 3, 4, 5], 100).await;
    // Backer 10 can cover exactly two stakes of 50
    fund(&engine, &[10], 100).await;
    let tournament_id = announce(&engine, 100).await;

    let handles: Vec<_> = (1..=5)
        .map(|player| {
            let engine = engine.clone();
            tokio::spawn(async move {
                engine
                    .join_tournament(join(tournament_id, player, vec![10]))
                    .await
            })
        })
        .collect();

    let mut joined = 0;
    for handle in handles {
        if handle.await.unwrap().is_ok() {
            joined += 1;
        }
    }

    assert_eq!(joined, 2);
    assert_eq!(balance_of(&engine, 10).await, 0);
    let details = engine.tournament_details(tournament_id).await.unwrap();
    assert_eq!(details.participants.len(), 2);
    assert_eq!(details.backings.len(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_settlements_pay_once() {
    let (engine, _store) = setup_engine();
    fund(&engine, &[1, 2], 100).await;
    let tournament_id = announce(&engine, 20).await;
    engine
        .join_tournament(join(tournament_id, 1, vec![2]))
        .await
        .unwrap();

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let engine = engine.clone();
            tokio::spawn(async move {
                engine
                    .settle_tournament(settle(tournament_id, &[(1, 40)]))
                    .await
            })
        })
        .collect();

    let mut settled = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => settled += 1,
            Err(err) => assert!(matches!(err, SettlementError::TournamentFinished(_))),
        }
    }

    assert_eq!(settled, 1);
    assert_eq!(balances(&engine, &[1, 2]).await, vec![110, 110]);
}

// ============================================================================
// Timeouts
// ============================================================================

#[tokio::test]
async fn test_timeout_rolls_back_and_reports() {
    let store = Arc::new(MemoryStore::new());
    let engine = SettlementEngine::new(store.clone()).with_timeout(Duration::from_millis(50));
    fund(&engine, &[1], 100).await;

    {
        // Another unit of work holds the store
        let _held = store.begin().await.unwrap();
        let err = engine.withdraw(1, 10).await.unwrap_err();
        assert!(matches!(err, SettlementError::Timeout(_)));
    }

    assert_eq!(balance_of(&engine, 1).await, 100);
    assert_eq!(engine.withdraw(1, 10).await.unwrap().amount, 90);
}
