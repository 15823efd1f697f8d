//! Balance API handlers.
//!
//! # Examples
//!
//! Fund a user:
//! ```bash
//! curl -X POST http://localhost:8080/tournament/v0/user/fund \
//!   -H "Content-Type: application/json" \
//!   -d '{"player_id": 1, "points": 300}'
//! ```
//!
//! Read a balance:
//! ```bash
//! curl "http://localhost:8080/tournament/v0/user/balance?id=1"
//! ```

use axum::{
    Json,
    extract::{
        Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
};
use serde::Deserialize;
use tourney::{Balance, PointsOperation, UserId};
use tourney::tournament::DEFAULT_PAGE_SIZE;

use super::{ApiResult, AppState, DataResponse, bad_request, engine_error};
use crate::metrics;

#[derive(Debug, Deserialize)]
pub struct UserQuery {
    pub id: UserId,
}

#[derive(Debug, Deserialize)]
pub struct OperationsQuery {
    pub id: UserId,
    pub limit: Option<i64>,
}

/// Body of `/user/fund` and `/user/take`
#[derive(Debug, Deserialize)]
pub struct BalanceOperationRequest {
    pub player_id: UserId,
    pub points: i64,
}

fn user_id(query: Result<Query<UserQuery>, QueryRejection>) -> ApiResult<UserId> {
    match query {
        Ok(Query(UserQuery { id })) if id > 0 => Ok(id),
        _ => Err(bad_request("Incorrect ID provided")),
    }
}

fn balance_operation(
    body: Result<Json<BalanceOperationRequest>, JsonRejection>,
) -> ApiResult<BalanceOperationRequest> {
    let Json(request) = body.map_err(|_| bad_request("Incorrect request body provided"))?;
    if request.player_id <= 0 {
        return Err(bad_request("Incorrect player ID provided"));
    }
    if request.points <= 0 {
        return Err(bad_request("Incorrect points value provided"));
    }
    Ok(request)
}

/// Current balance of a user.
///
/// # Errors
///
/// - `400 Bad Request`: Missing or malformed `id`
/// - `404 Not Found`: User has no balance
pub async fn get_balance(
    State(state): State<AppState>,
    query: Result<Query<UserQuery>, QueryRejection>,
) -> ApiResult<Json<DataResponse<Balance>>> {
    let user_id = user_id(query)?;
    let balance = state
        .engine
        .balance(user_id)
        .await
        .map_err(|e| engine_error("balance", e))?;
    Ok(Json(DataResponse { data: balance }))
}

/// Recent operations of a user, newest first.
///
/// `limit` defaults to 20 and is capped at 100.
pub async fn get_operations(
    State(state): State<AppState>,
    query: Result<Query<OperationsQuery>, QueryRejection>,
) -> ApiResult<Json<DataResponse<Vec<PointsOperation>>>> {
    let Ok(Query(query)) = query else {
        return Err(bad_request("Incorrect ID provided"));
    };
    if query.id <= 0 {
        return Err(bad_request("Incorrect ID provided"));
    }

    let operations = state
        .engine
        .operations(query.id, query.limit.unwrap_or(DEFAULT_PAGE_SIZE))
        .await
        .map_err(|e| engine_error("operations", e))?;
    Ok(Json(DataResponse { data: operations }))
}

/// Credit points to a user, creating the balance on first use.
///
/// # Request Body
///
/// ```json
/// {"player_id": 1, "points": 300}
/// ```
///
/// # Errors
///
/// - `400 Bad Request`: Malformed body, zero id or non-positive points
pub async fn fund(
    State(state): State<AppState>,
    body: Result<Json<BalanceOperationRequest>, JsonRejection>,
) -> ApiResult<Json<DataResponse<Balance>>> {
    let request = balance_operation(body)?;
    let balance = state
        .engine
        .top_up(request.player_id, request.points)
        .await
        .map_err(|e| engine_error("top_up", e))?;

    metrics::points_moved_total("credit", request.points);
    Ok(Json(DataResponse { data: balance }))
}

/// Debit points from a user.
///
/// # Errors
///
/// - `400 Bad Request`: Malformed body or insufficient funds
/// - `404 Not Found`: User has no balance
pub async fn take(
    State(state): State<AppState>,
    body: Result<Json<BalanceOperationRequest>, JsonRejection>,
) -> ApiResult<Json<DataResponse<Balance>>> {
    let request = balance_operation(body)?;
    let balance = state
        .engine
        .withdraw(request.player_id, request.points)
        .await
        .map_err(|e| engine_error("withdraw", e))?;

    metrics::points_moved_total("debit", request.points);
    Ok(Json(DataResponse { data: balance }))
}
