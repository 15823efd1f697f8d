//! PostgreSQL store.
#![allow(clippy::needless_raw_string_hashes)]

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgRow};
use sqlx::{PgConnection, Postgres, Row, Transaction};

use super::store::{Store, StoreError, StoreResult, StoreTransaction};
use crate::ledger::{Balance, NewOperation, OperationKind, OperationReason, PointsOperation, UserId};
use crate::tournament::{
    Backing, NewTournament, Participation, Tournament, TournamentId, TournamentState,
    WinnerRecord,
};

/// Store backed by a PostgreSQL pool
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Store for PgStore {
    async fn begin(&self) -> StoreResult<Box<dyn StoreTransaction>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgTransaction { tx: Some(tx) }))
    }

    async fn health_check(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

/// Open PostgreSQL transaction. Dropping it uncommitted rolls back.
pub struct PgTransaction {
    tx: Option<Transaction<'static, Postgres>>,
}

impl PgTransaction {
    fn conn(&mut self) -> StoreResult<&mut PgConnection> {
        self.tx.as_deref_mut().ok_or(StoreError::TransactionClosed)
    }
}

fn decode_error(column: &str, value: &str) -> StoreError {
    StoreError::Database(sqlx::Error::Decode(
        format!("unexpected {column} value: {value}").into(),
    ))
}

fn balance_from_row(row: &PgRow) -> Balance {
    Balance {
        user_id: row.get("user_id"),
        amount: row.get("balance"),
        created_at: row.get::<chrono::NaiveDateTime, _>("created_at").and_utc(),
        updated_at: row.get::<chrono::NaiveDateTime, _>("updated_at").and_utc(),
    }
}

fn operation_from_row(row: &PgRow) -> StoreResult<PointsOperation> {
    let kind: String = row.get("kind");
    let reason: String = row.get("reason");
    Ok(PointsOperation {
        id: row.get("id"),
        user_id: row.get("user_id"),
        kind: OperationKind::parse(&kind).ok_or_else(|| decode_error("kind", &kind))?,
        amount: row.get("amount"),
        balance_after: row.get("balance_after"),
        reason: OperationReason::parse(&reason).ok_or_else(|| decode_error("reason", &reason))?,
        tournament_id: row.get("tournament_id"),
        created_at: row.get::<chrono::NaiveDateTime, _>("created_at").and_utc(),
    })
}

fn tournament_from_row(row: &PgRow) -> StoreResult<Tournament> {
    let state: String = row.get("state");
    Ok(Tournament {
        id: row.get("id"),
        date: row.get::<chrono::NaiveDateTime, _>("starts_at").and_utc(),
        deposit: row.get("deposit"),
        game_id: row.get("game_id"),
        state: TournamentState::parse(&state).ok_or_else(|| decode_error("state", &state))?,
        created_at: row.get::<chrono::NaiveDateTime, _>("created_at").and_utc(),
        updated_at: row.get::<chrono::NaiveDateTime, _>("updated_at").and_utc(),
    })
}

fn participation_from_row(row: &PgRow) -> Participation {
    Participation {
        tournament_id: row.get("tournament_id"),
        user_id: row.get("user_id"),
        deposit_paid: row.get("deposit_paid"),
        created_at: row.get::<chrono::NaiveDateTime, _>("created_at").and_utc(),
    }
}

fn backing_from_row(row: &PgRow) -> Backing {
    Backing {
        tournament_id: row.get("tournament_id"),
        player_id: row.get("player_id"),
        backer_id: row.get("backer_id"),
        deposit_paid: row.get("deposit_paid"),
        created_at: row.get::<chrono::NaiveDateTime, _>("created_at").and_utc(),
    }
}

fn winner_from_row(row: &PgRow) -> WinnerRecord {
    WinnerRecord {
        tournament_id: row.get("tournament_id"),
        user_id: row.get("user_id"),
        prize: row.get("prize"),
        created_at: row.get::<chrono::NaiveDateTime, _>("created_at").and_utc(),
    }
}

#[async_trait]
impl StoreTransaction for PgTransaction {
    async fn fetch_balance(&mut self, user_id: UserId) -> StoreResult<Option<Balance>> {
        let row = sqlx::query(
            r#"
            SELECT user_id, balance, created_at, updated_at
            FROM points_balances
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(self.conn()?)
        .await?;

        Ok(row.as_ref().map(balance_from_row))
    }

    async fn fetch_balances(&mut self, user_ids: &[UserId]) -> StoreResult<Vec<Balance>> {
        // Locks are taken in user id order so concurrent callers cannot deadlock
        let rows = sqlx::query(
            r#"
            SELECT user_id, balance, created_at, updated_at
            FROM points_balances
            WHERE user_id = ANY($1)
            ORDER BY user_id
            FOR UPDATE
            "#,
        )
        .bind(user_ids.to_vec())
        .fetch_all(self.conn()?)
        .await?;

        Ok(rows.iter().map(balance_from_row).collect())
    }

    async fn add_to_balance(
        &mut self,
        user_id: UserId,
        amount: i64,
    ) -> StoreResult<Option<Balance>> {
        // The bound is checked against the row the upsert locks
        let row = sqlx::query(
            r#"
            INSERT INTO points_balances (user_id, balance)
            VALUES ($1, $2)
            ON CONFLICT (user_id)
            DO UPDATE SET balance = points_balances.balance + EXCLUDED.balance,
                          updated_at = NOW()
            WHERE points_balances.balance <= 9223372036854775807 - EXCLUDED.balance
            RETURNING user_id, balance, created_at, updated_at
            "#,
        )
        .bind(user_id)
        .bind(amount)
        .fetch_optional(self.conn()?)
        .await?;

        Ok(row.as_ref().map(balance_from_row))
    }

    async fn subtract_from_balance(
        &mut self,
        user_id: UserId,
        amount: i64,
    ) -> StoreResult<Option<Balance>> {
        // Check and update in one statement
        let row = sqlx::query(
            r#"
            UPDATE points_balances
            SET balance = balance - $1, updated_at = NOW()
            WHERE user_id = $2 AND balance >= $1
            RETURNING user_id, balance, created_at, updated_at
            "#,
        )
        .bind(amount)
        .bind(user_id)
        .fetch_optional(self.conn()?)
        .await?;

        Ok(row.as_ref().map(balance_from_row))
    }

    async fn insert_operation(&mut self, operation: NewOperation) -> StoreResult<PointsOperation> {
        let row = sqlx::query(
            r#"
            INSERT INTO points_operations
                (user_id, kind, amount, balance_after, reason, tournament_id)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, user_id, kind, amount, balance_after, reason, tournament_id, created_at
            "#,
        )
        .bind(operation.user_id)
        .bind(operation.kind.as_str())
        .bind(operation.amount)
        .bind(operation.balance_after)
        .bind(operation.reason.as_str())
        .bind(operation.tournament_id)
        .fetch_one(self.conn()?)
        .await?;

        operation_from_row(&row)
    }

    async fn fetch_operations(
        &mut self,
        user_id: UserId,
        limit: i64,
    ) -> StoreResult<Vec<PointsOperation>> {
        let rows = sqlx::query(
            r#"
            SELECT id, user_id, kind, amount, balance_after, reason, tournament_id, created_at
            FROM points_operations
            WHERE user_id = $1
            ORDER BY id DESC
            LIMIT $2
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(self.conn()?)
        .await?;

        rows.iter().map(operation_from_row).collect()
    }

    async fn insert_tournament(&mut self, tournament: NewTournament) -> StoreResult<Tournament> {
        let row = sqlx::query(
            r#"
            INSERT INTO tournaments (starts_at, deposit, game_id)
            VALUES ($1, $2, $3)
            RETURNING id, starts_at, deposit, game_id, state, created_at, updated_at
            "#,
        )
        .bind(tournament.date.naive_utc())
        .bind(tournament.deposit)
        .bind(tournament.game_id)
        .fetch_one(self.conn()?)
        .await?;

        tournament_from_row(&row)
    }

    async fn fetch_tournament(
        &mut self,
        tournament_id: TournamentId,
        for_update: bool,
    ) -> StoreResult<Option<Tournament>> {
        let sql = if for_update {
            r#"
            SELECT id, starts_at, deposit, game_id, state, created_at, updated_at
            FROM tournaments
            WHERE id = $1
            FOR UPDATE
            "#
        } else {
            r#"
            SELECT id, starts_at, deposit, game_id, state, created_at, updated_at
            FROM tournaments
            WHERE id = $1
            "#
        };

        let row = sqlx::query(sql)
            .bind(tournament_id)
            .fetch_optional(self.conn()?)
            .await?;

        row.as_ref().map(tournament_from_row).transpose()
    }

    async fn fetch_tournaments(&mut self, limit: i64, offset: i64) -> StoreResult<Vec<Tournament>> {
        let rows = sqlx::query(
            r#"
            SELECT id, starts_at, deposit, game_id, state, created_at, updated_at
            FROM tournaments
            ORDER BY id
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(self.conn()?)
        .await?;

        rows.iter().map(tournament_from_row).collect()
    }

    async fn mark_finished(&mut self, tournament_id: TournamentId) -> StoreResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE tournaments
            SET state = 'finished', updated_at = NOW()
            WHERE id = $1 AND state = 'open'
            "#,
        )
        .bind(tournament_id)
        .execute(self.conn()?)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn fetch_participation(
        &mut self,
        tournament_id: TournamentId,
        user_id: UserId,
    ) -> StoreResult<Option<Participation>> {
        let row = sqlx::query(
            r#"
            SELECT tournament_id, user_id, deposit_paid, created_at
            FROM tournament_players
            WHERE tournament_id = $1 AND user_id = $2
            "#,
        )
        .bind(tournament_id)
        .bind(user_id)
        .fetch_optional(self.conn()?)
        .await?;

        Ok(row.as_ref().map(participation_from_row))
    }

    async fn fetch_participations(
        &mut self,
        tournament_id: TournamentId,
    ) -> StoreResult<Vec<Participation>> {
        let rows = sqlx::query(
            r#"
            SELECT tournament_id, user_id, deposit_paid, created_at
            FROM tournament_players
            WHERE tournament_id = $1
            ORDER BY id
            "#,
        )
        .bind(tournament_id)
        .fetch_all(self.conn()?)
        .await?;

        Ok(rows.iter().map(participation_from_row).collect())
    }

    async fn insert_participation(
        &mut self,
        tournament_id: TournamentId,
        user_id: UserId,
        deposit_paid: i64,
    ) -> StoreResult<Participation> {
        let row = sqlx::query(
            r#"
            INSERT INTO tournament_players (tournament_id, user_id, deposit_paid)
            VALUES ($1, $2, $3)
            RETURNING tournament_id, user_id, deposit_paid, created_at
            "#,
        )
        .bind(tournament_id)
        .bind(user_id)
        .bind(deposit_paid)
        .fetch_one(self.conn()?)
        .await
        .map_err(|err| StoreError::from_insert(err, "tournament_players"))?;

        Ok(participation_from_row(&row))
    }

    async fn insert_backing(
        &mut self,
        tournament_id: TournamentId,
        player_id: UserId,
        backer_id: UserId,
        deposit_paid: i64,
    ) -> StoreResult<Backing> {
        let row = sqlx::query(
            r#"
            INSERT INTO tournament_backers (tournament_id, player_id, backer_id, deposit_paid)
            VALUES ($1, $2, $3, $4)
            RETURNING tournament_id, player_id, backer_id, deposit_paid, created_at
            "#,
        )
        .bind(tournament_id)
        .bind(player_id)
        .bind(backer_id)
        .bind(deposit_paid)
        .fetch_one(self.conn()?)
        .await?;

        Ok(backing_from_row(&row))
    }

    async fn fetch_backings(
        &mut self,
        tournament_id: TournamentId,
        player_id: Option<UserId>,
    ) -> StoreResult<Vec<Backing>> {
        let rows = sqlx::query(
            r#"
            SELECT tournament_id, player_id, backer_id, deposit_paid, created_at
            FROM tournament_backers
            WHERE tournament_id = $1 AND ($2::BIGINT IS NULL OR player_id = $2)
            ORDER BY id
            "#,
        )
        .bind(tournament_id)
        .bind(player_id)
        .fetch_all(self.conn()?)
        .await?;

        Ok(rows.iter().map(backing_from_row).collect())
    }

    async fn insert_winner(
        &mut self,
        tournament_id: TournamentId,
        user_id: UserId,
        prize: i64,
    ) -> StoreResult<WinnerRecord> {
        let row = sqlx::query(
            r#"
            INSERT INTO tournament_winners (tournament_id, user_id, prize)
            VALUES ($1, $2, $3)
            RETURNING tournament_id, user_id, prize, created_at
            "#,
        )
        .bind(tournament_id)
        .bind(user_id)
        .bind(prize)
        .fetch_one(self.conn()?)
        .await?;

        Ok(winner_from_row(&row))
    }

    async fn fetch_winners(
        &mut self,
        tournament_id: TournamentId,
    ) -> StoreResult<Vec<WinnerRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT tournament_id, user_id, prize, created_at
            FROM tournament_winners
            WHERE tournament_id = $1
            ORDER BY id
            "#,
        )
        .bind(tournament_id)
        .fetch_all(self.conn()?)
        .await?;

        Ok(rows.iter().map(winner_from_row).collect())
    }

    async fn commit(&mut self) -> StoreResult<()> {
        let tx = self.tx.take().ok_or(StoreError::TransactionClosed)?;
        tx.commit().await?;
        Ok(())
    }
}
