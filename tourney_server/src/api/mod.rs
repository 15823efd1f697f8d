//! HTTP API for the tournament points ledger.
//!
//! # Modules
//!
//! - [`users`]: balances, funding, withdrawal and operation history
//! - [`tournaments`]: announce, list, info, join and settle
//! - [`request_id`]: request correlation middleware
//!
//! # Endpoints Overview
//!
//! All routes except `/health` are mounted under a configurable prefix
//! (`/tournament/v0` by default).
//!
//! ```text
//! GET  /health                               - Store health
//! GET  {prefix}/user/balance?id=N            - Current balance
//! GET  {prefix}/user/operations?id=N&limit=L - Recent operations, newest first
//! POST {prefix}/user/fund                    - Credit points
//! POST {prefix}/user/take                    - Debit points
//! GET  {prefix}/tournament/list?limit&offset - Page through tournaments
//! GET  {prefix}/tournament/info?id=N         - Tournament with players, backers, winners
//! POST {prefix}/tournament/announceTournament
//! POST {prefix}/tournament/joinTournament
//! POST {prefix}/tournament/resultTournament
//! ```
//!
//! Successful reads answer `{"data": ...}`, failures `{"error": "..."}`.
//!
//! # Example Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tourney::db::MemoryStore;
//! use tourney::settlement::SettlementEngine;
//! use tourney_server::api::{create_router, AppState};
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//!
//! let state = AppState {
//!     engine: SettlementEngine::new(Arc::new(MemoryStore::new())),
//! };
//! let app = create_router(state, "/tournament/v0");
//!
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await?;
//! axum::serve(listener, app).await?;
//! # Ok(())
//! # }
//! ```
//!
//! # CORS
//!
//! CORS is configured permissively for development. In production, configure
//! appropriate origins, methods, and headers.

pub mod request_id;
pub mod tournaments;
pub mod users;

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::{get, post},
};
use serde::Serialize;
use serde_json::json;
use tourney::{ErrorKind, SettlementEngine, SettlementError};
use tower_http::cors::CorsLayer;

/// Application state shared across all HTTP handlers.
///
/// Cloned for each request; the engine shares its store internally.
#[derive(Clone)]
pub struct AppState {
    pub engine: SettlementEngine,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Successful payload wrapper
#[derive(Debug, Serialize)]
pub struct DataResponse<T> {
    pub data: T,
}

/// Handler result with a JSON error body on failure
pub type ApiResult<T> = Result<T, (StatusCode, Json<ErrorResponse>)>;

/// Map an engine failure to its status code and a client-safe message.
pub fn engine_error(operation: &str, err: SettlementError) -> (StatusCode, Json<ErrorResponse>) {
    let status = match err.kind() {
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::BadRequest => StatusCode::BAD_REQUEST,
        ErrorKind::Conflict => StatusCode::CONFLICT,
        ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    };
    let message = err.client_message();
    crate::logging::log_rejected_operation(operation, status.as_u16(), &message);

    (status, Json(ErrorResponse { error: message }))
}

/// 400 with the given message.
pub fn bad_request(message: impl Into<String>) -> (StatusCode, Json<ErrorResponse>) {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
}

/// Create the complete API router with all endpoints and middleware.
///
/// # Arguments
///
/// - `state`: Application state
/// - `api_path`: Prefix the user and tournament routes are nested under
///
/// # Returns
///
/// Configured Axum router ready to serve requests
pub fn create_router(state: AppState, api_path: &str) -> Router {
    let api_routes = Router::new()
        .route("/user/balance", get(users::get_balance))
        .route("/user/operations", get(users::get_operations))
        .route("/user/fund", post(users::fund))
        .route("/user/take", post(users::take))
        .route("/tournament/list", get(tournaments::list_tournaments))
        .route("/tournament/info", get(tournaments::get_tournament))
        .route(
            "/tournament/announceTournament",
            post(tournaments::announce_tournament),
        )
        .route("/tournament/joinTournament", post(tournaments::join_tournament))
        .route(
            "/tournament/resultTournament",
            post(tournaments::result_tournament),
        );

    Router::new()
        .route("/health", get(health_check))
        .nest(api_path, api_routes)
        .layer(axum::middleware::from_fn(request_id::request_id_middleware))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Health check endpoint for monitoring and load balancers.
///
/// Returns `200 OK` if the store answers, or `503 Service Unavailable` otherwise.
///
/// # Example
///
/// ```bash
/// curl http://localhost:8080/health
/// # {"status":"healthy","store":true,"version":"0.1.0","timestamp":"2026-10-19T10:30:00Z"}
/// ```
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let store_healthy = state.engine.health_check().await.is_ok();

    let status_code = if store_healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let response = json!({
        "status": if store_healthy { "healthy" } else { "unhealthy" },
        "version": env!("CARGO_PKG_VERSION"),
        "store": store_healthy,
        "timestamp": chrono::Utc::now().to_rfc3339(),
    });

    (status_code, Json(response))
}
