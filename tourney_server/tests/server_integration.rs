//! Integration tests for the HTTP API.
//!
//! Every test drives the full router over an in-memory store.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::{Duration, Utc};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use std::sync::Arc;
use tourney::SettlementEngine;
use tourney::db::MemoryStore;
use tourney_server::api::{AppState, create_router, request_id::REQUEST_ID_HEADER};
use tower::ServiceExt; // For `oneshot` method

const API: &str = "/tournament/v0";

fn create_test_server() -> axum::Router {
    let state = AppState {
        engine: SettlementEngine::new(Arc::new(MemoryStore::new())),
    };
    create_router(state, API)
}

async fn send(app: &axum::Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let value = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).unwrap()
    };
    (status, value)
}

async fn get(app: &axum::Router, path: &str) -> (StatusCode, Value) {
    let request = Request::builder()
        .uri(format!("{API}{path}"))
        .body(Body::empty())
        .unwrap();
    send(app, request).await
}

async fn post(app: &axum::Router, path: &str, body: Value) -> (StatusCode, Value) {
    post_raw(app, path, body.to_string()).await
}

async fn post_raw(app: &axum::Router, path: &str, body: String) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("POST")
        .uri(format!("{API}{path}"))
        .header("content-type", "application/json")
        .body(Body::from(body))
        .unwrap();
    send(app, request).await
}

async fn fund(app: &axum::Router, player_id: i64, points: i64) {
    let (status, _) = post(
        app,
        "/user/fund",
        json!({"player_id": player_id, "points": points}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

async fn balance(app: &axum::Router, player_id: i64) -> i64 {
    let (status, body) = get(app, &format!("/user/balance?id={player_id}")).await;
    assert_eq!(status, StatusCode::OK);
    body["data"]["amount"].as_i64().unwrap()
}

async fn announce(app: &axum::Router, deposit: i64) -> i64 {
    let date = (Utc::now() + Duration::days(1)).to_rfc3339();
    let (status, body) = post(
        app,
        "/tournament/announceTournament",
        json!({"deposit": deposit, "date": date}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    body["data"]["id"].as_i64().unwrap()
}

// ============================================================================
// Health and Middleware
// ============================================================================

#[tokio::test]
async fn test_health_check_endpoint() {
    let app = create_test_server();

    let request = Request::builder()
        .uri("/health")
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(&app, request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["store"], true);
}

#[tokio::test]
async fn test_response_carries_request_id() {
    let app = create_test_server();

    let request = Request::builder()
        .uri("/health")
        .header(REQUEST_ID_HEADER, "trace-42")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.headers()[REQUEST_ID_HEADER], "trace-42");
}

#[tokio::test]
async fn test_routes_live_under_api_path() {
    let app = create_test_server();

    let request = Request::builder()
        .uri("/user/balance?id=1")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// ============================================================================
// Balances
// ============================================================================

#[tokio::test]
async fn test_fund_take_and_balance() {
    let app = create_test_server();

    let (status, body) = post(&app, "/user/fund", json!({"player_id": 1, "points": 300})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["amount"], 300);

    let (status, body) = post(&app, "/user/take", json!({"player_id": 1, "points": 120})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["amount"], 180);

    assert_eq!(balance(&app, 1).await, 180);
}

#[tokio::test]
async fn test_balance_of_unknown_user_is_not_found() {
    let app = create_test_server();

    let (status, body) = get(&app, "/user/balance?id=77").await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_balance_rejects_bad_ids() {
    let app = create_test_server();

    for query in ["", "?id=", "?id=abc", "?id=0", "?id=-3"] {
        let (status, body) = get(&app, &format!("/user/balance{query}")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "query {query:?}");
        assert_eq!(body["error"], "Incorrect ID provided");
    }
}

#[tokio::test]
async fn test_fund_and_take_reject_bad_bodies() {
    let app = create_test_server();
    fund(&app, 1, 100).await;

    for path in ["/user/fund", "/user/take"] {
        for body in [
            json!({"player_id": 0, "points": 10}),
            json!({"player_id": 1, "points": 0}),
            json!({"player_id": 1, "points": -5}),
            json!({"points": 10}),
        ] {
            let (status, _) = post(&app, path, body.clone()).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{path} {body}");
        }

        let (status, _) = post_raw(&app, path, "not json".to_string()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    assert_eq!(balance(&app, 1).await, 100);
}

#[tokio::test]
async fn test_take_more_than_balance_is_rejected() {
    let app = create_test_server();
    fund(&app, 1, 50).await;

    let (status, _) = post(&app, "/user/take", json!({"player_id": 1, "points": 51})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = post(&app, "/user/take", json!({"player_id": 2, "points": 1})).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    assert_eq!(balance(&app, 1).await, 50);
}

#[tokio::test]
async fn test_operations_newest_first() {
    let app = create_test_server();
    fund(&app, 1, 100).await;
    let (status, _) = post(&app, "/user/take", json!({"player_id": 1, "points": 40})).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = get(&app, "/user/operations?id=1").await;
    assert_eq!(status, StatusCode::OK);

    let operations = body["data"].as_array().unwrap();
    assert_eq!(operations.len(), 2);
    assert_eq!(operations[0]["reason"], "withdraw");
    assert_eq!(operations[0]["balance_after"], 60);
    assert_eq!(operations[1]["reason"], "top_up");

    let (_, body) = get(&app, "/user/operations?id=1&limit=1").await;
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
}

// ============================================================================
// Tournaments
// ============================================================================

#[tokio::test]
async fn test_announce_defaults() {
    let app = create_test_server();

    let (status, body) = post(&app, "/tournament/announceTournament", json!({"deposit": 100})).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["deposit"], 100);
    assert_eq!(body["data"]["game_id"], 1);
    assert_eq!(body["data"]["state"], "open");
}

#[tokio::test]
async fn test_announce_rejects_bad_requests() {
    let app = create_test_server();
    let yesterday = (Utc::now() - Duration::days(1)).to_rfc3339();

    for body in [
        json!({"deposit": 0}),
        json!({"deposit": -10}),
        json!({"deposit": 100, "date": yesterday}),
        json!({"date": "2030-01-01T00:00:00Z"}),
    ] {
        let (status, _) = post(&app, "/tournament/announceTournament", body.clone()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
    }
}

#[tokio::test]
async fn test_join_and_settle_with_backers() {
    let app = create_test_server();
    for user in 1..=3 {
        fund(&app, user, 100).await;
    }
    let tournament_id = announce(&app, 90).await;

    let (status, body) = post(
        &app,
        "/tournament/joinTournament",
        json!({"tournament_id": tournament_id, "player_id": 1, "backer_ids": [2, 3]}),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(body, Value::Null);

    for user in 1..=3 {
        assert_eq!(balance(&app, user).await, 70);
    }

    let (status, _) = post(
        &app,
        "/tournament/resultTournament",
        json!({"tournament_id": tournament_id, "winners": [{"player_id": 1, "prize": 300}]}),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    for user in 1..=3 {
        assert_eq!(balance(&app, user).await, 170);
    }

    let (status, body) = get(&app, &format!("/tournament/info?id={tournament_id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["state"], "finished");
    assert_eq!(body["data"]["participants"].as_array().unwrap().len(), 1);
    assert_eq!(body["data"]["backings"].as_array().unwrap().len(), 2);
    assert_eq!(body["data"]["winners"][0]["prize"], 300);
}

#[tokio::test]
async fn test_join_status_mapping() {
    let app = create_test_server();
    fund(&app, 1, 100).await;
    let tournament_id = announce(&app, 50).await;

    let join = json!({"tournament_id": tournament_id, "player_id": 1});
    let (status, _) = post(&app, "/tournament/joinTournament", join.clone()).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    // Second join by the same player
    let (status, _) = post(&app, "/tournament/joinTournament", join).await;
    assert_eq!(status, StatusCode::CONFLICT);

    // Unknown tournament
    let (status, _) = post(
        &app,
        "/tournament/joinTournament",
        json!({"tournament_id": 999, "player_id": 1}),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // Player listed among their own backers
    let (status, _) = post(
        &app,
        "/tournament/joinTournament",
        json!({"tournament_id": tournament_id, "player_id": 2, "backer_ids": [2]}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Backer with no balance
    fund(&app, 3, 100).await;
    let (status, body) = post(
        &app,
        "/tournament/joinTournament",
        json!({"tournament_id": tournament_id, "player_id": 3, "backer_ids": [5]}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());

    assert_eq!(balance(&app, 1).await, 50);
    assert_eq!(balance(&app, 3).await, 100);
}

#[tokio::test]
async fn test_settle_status_mapping() {
    let app = create_test_server();
    fund(&app, 1, 100).await;
    let tournament_id = announce(&app, 50).await;
    let (status, _) = post(
        &app,
        "/tournament/joinTournament",
        json!({"tournament_id": tournament_id, "player_id": 1}),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    // Winner who never joined
    let (status, _) = post(
        &app,
        "/tournament/resultTournament",
        json!({"tournament_id": tournament_id, "winners": [{"player_id": 2, "prize": 10}]}),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // Empty winners list
    let (status, _) = post(
        &app,
        "/tournament/resultTournament",
        json!({"tournament_id": tournament_id, "winners": []}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let settle = json!({"tournament_id": tournament_id, "winners": [{"player_id": 1, "prize": 80}]});
    let (status, _) = post(&app, "/tournament/resultTournament", settle.clone()).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    // Already settled
    let (status, _) = post(&app, "/tournament/resultTournament", settle).await;
    assert_eq!(status, StatusCode::CONFLICT);

    assert_eq!(balance(&app, 1).await, 130);
}

#[tokio::test]
async fn test_tournament_info_errors() {
    let app = create_test_server();

    let (status, _) = get(&app, "/tournament/info?id=abc").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = get(&app, "/tournament/info?id=42").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_list_tournaments_paging() {
    let app = create_test_server();

    let (status, body) = get(&app, "/tournament/list").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Tournaments not found");

    for deposit in [10, 20, 30] {
        announce(&app, deposit).await;
    }

    let (status, body) = get(&app, "/tournament/list").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 3);

    let (_, body) = get(&app, "/tournament/list?limit=1&offset=1").await;
    let page = body["data"].as_array().unwrap();
    assert_eq!(page.len(), 1);
    assert_eq!(page[0]["deposit"], 20);

    let (status, _) = get(&app, "/tournament/list?offset=10").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    for query in ["?offset=-1", "?limit=0", "?limit=x"] {
        let (status, _) = get(&app, &format!("/tournament/list{query}")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "query {query:?}");
    }
}
