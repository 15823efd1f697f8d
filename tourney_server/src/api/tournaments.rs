//! Tournament API handlers.
//!
//! # Examples
//!
//! Announce a tournament:
//! ```bash
//! curl -X POST http://localhost:8080/tournament/v0/tournament/announceTournament \
//!   -H "Content-Type: application/json" \
//!   -d '{"deposit": 100, "date": "2030-03-18T00:59:00Z", "game_id": 1}'
//! ```
//!
//! Join with two backers:
//! ```bash
//! curl -X POST http://localhost:8080/tournament/v0/tournament/joinTournament \
//!   -H "Content-Type: application/json" \
//!   -d '{"tournament_id": 1, "player_id": 2, "backer_ids": [3, 4]}'
//! ```
//!
//! Declare the result:
//! ```bash
//! curl -X POST http://localhost:8080/tournament/v0/tournament/resultTournament \
//!   -H "Content-Type: application/json" \
//!   -d '{"tournament_id": 1, "winners": [{"player_id": 2, "prize": 500}]}'
//! ```

use axum::{
    Json,
    extract::{
        Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
    http::StatusCode,
};
use serde::Deserialize;
use tourney::settlement::{JoinRequest, SettleRequest};
use tourney::tournament::{
    AnnounceRequest, DEFAULT_PAGE_SIZE, Tournament, TournamentDetails, TournamentId,
};

use super::{ApiResult, AppState, DataResponse, ErrorResponse, bad_request, engine_error};
use crate::metrics;

#[derive(Debug, Deserialize)]
pub struct TournamentQuery {
    pub id: TournamentId,
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

fn body<T>(body: Result<Json<T>, JsonRejection>) -> ApiResult<T> {
    body.map(|Json(value)| value)
        .map_err(|_| bad_request("Incorrect request body provided"))
}

/// Outcome label for join/settle counters
fn outcome_label<T>(result: &ApiResult<T>) -> String {
    match result {
        Ok(_) => "ok".to_string(),
        Err((status, _)) => status.as_u16().to_string(),
    }
}

/// Page through tournaments ordered by id.
///
/// `limit` defaults to 20, `offset` to 0.
///
/// # Errors
///
/// - `400 Bad Request`: Malformed or negative paging parameters
/// - `404 Not Found`: Page is empty
pub async fn list_tournaments(
    State(state): State<AppState>,
    query: Result<Query<ListQuery>, QueryRejection>,
) -> ApiResult<Json<DataResponse<Vec<Tournament>>>> {
    let Ok(Query(query)) = query else {
        return Err(bad_request("Incorrect paging parameters provided"));
    };

    let limit = query.limit.unwrap_or(DEFAULT_PAGE_SIZE);
    let offset = query.offset.unwrap_or(0);
    if limit <= 0 || offset < 0 {
        return Err(bad_request("Incorrect paging parameters provided"));
    }

    let tournaments = state
        .engine
        .list_tournaments(limit, offset)
        .await
        .map_err(|e| engine_error("list_tournaments", e))?;

    if tournaments.is_empty() {
        return Err((
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: "Tournaments not found".to_string(),
            }),
        ));
    }

    Ok(Json(DataResponse { data: tournaments }))
}

/// Tournament with its players, backings and winners.
///
/// # Errors
///
/// - `400 Bad Request`: Missing or malformed `id`
/// - `404 Not Found`: No such tournament
pub async fn get_tournament(
    State(state): State<AppState>,
    query: Result<Query<TournamentQuery>, QueryRejection>,
) -> ApiResult<Json<DataResponse<TournamentDetails>>> {
    let tournament_id = match query {
        Ok(Query(TournamentQuery { id })) if id > 0 => id,
        _ => return Err(bad_request("Incorrect ID provided")),
    };

    let details = state
        .engine
        .tournament_details(tournament_id)
        .await
        .map_err(|e| engine_error("tournament_details", e))?;
    Ok(Json(DataResponse { data: details }))
}

/// Announce an OPEN tournament.
///
/// A missing `date` means the tournament starts now; a missing `game_id`
/// falls back to the default game.
///
/// # Errors
///
/// - `400 Bad Request`: Malformed body, non-positive deposit or a past date
pub async fn announce_tournament(
    State(state): State<AppState>,
    request: Result<Json<AnnounceRequest>, JsonRejection>,
) -> ApiResult<Json<DataResponse<Tournament>>> {
    let request = body(request)?;
    let tournament = state
        .engine
        .announce(request)
        .await
        .map_err(|e| engine_error("announce", e))?;
    Ok(Json(DataResponse { data: tournament }))
}

/// Join a tournament, debiting the stake from the player and every backer.
///
/// Answers `204 No Content` on success.
///
/// # Errors
///
/// - `400 Bad Request`: Invalid stakeholders, expired tournament or a
///   stakeholder that cannot cover the stake
/// - `404 Not Found`: No such tournament
/// - `409 Conflict`: Player already joined, or the tournament is finished
pub async fn join_tournament(
    State(state): State<AppState>,
    request: Result<Json<JoinRequest>, JsonRejection>,
) -> ApiResult<StatusCode> {
    let result = join(&state, request).await;
    metrics::tournament_joins_total(&outcome_label(&result));
    result
}

async fn join(
    state: &AppState,
    request: Result<Json<JoinRequest>, JsonRejection>,
) -> ApiResult<StatusCode> {
    let request = body(request)?;
    let outcome = state
        .engine
        .join_tournament(request)
        .await
        .map_err(|e| engine_error("join_tournament", e))?;
    metrics::points_moved_total("debit", outcome.collected());
    Ok(StatusCode::NO_CONTENT)
}

/// Settle a tournament, paying each winner's prize out to the winner and
/// their backers.
///
/// Answers `204 No Content` on success.
///
/// # Errors
///
/// - `400 Bad Request`: Malformed or empty winners list
/// - `404 Not Found`: No such tournament, or a winner that never joined
/// - `409 Conflict`: Tournament already settled
pub async fn result_tournament(
    State(state): State<AppState>,
    request: Result<Json<SettleRequest>, JsonRejection>,
) -> ApiResult<StatusCode> {
    let result = settle(&state, request).await;
    metrics::tournament_settlements_total(&outcome_label(&result));
    result
}

async fn settle(
    state: &AppState,
    request: Result<Json<SettleRequest>, JsonRejection>,
) -> ApiResult<StatusCode> {
    let request = body(request)?;
    let outcome = state
        .engine
        .settle_tournament(request)
        .await
        .map_err(|e| engine_error("settle_tournament", e))?;
    metrics::points_moved_total("credit", outcome.paid_out());
    Ok(StatusCode::NO_CONTENT)
}
