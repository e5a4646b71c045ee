//! Single-flight refresh, ordered replay, and forced logout.

use super::harness::{grant_json, runtime_for, MockAuthServer, MockResponse};
use crate::{ApiRequest, AuthError, SessionRuntime, SessionStatus};
use futures::future::join_all;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

async fn logged_in_runtime(server: &MockAuthServer) -> SessionRuntime {
    server.set_default("/auth/login", MockResponse::ok(grant_json("access-1", "refresh-1")));
    let runtime = runtime_for(server);
    runtime.login("trader@example.com", "hunter2").await.unwrap();
    runtime
}

#[tokio::test]
async fn expired_token_is_refreshed_and_request_replayed() {
    let server = MockAuthServer::start().await;
    let runtime = logged_in_runtime(&server).await;

    server.enqueue(
        "/portfolio/positions",
        MockResponse::with_status(401, json!({"error": "token expired"})),
    );
    server.set_default("/portfolio/positions", MockResponse::ok(json!({"positions": []})));
    server.set_default("/auth/refresh", MockResponse::ok(json!({"accessToken": "access-2"})));

    let response = runtime
        .request(ApiRequest::get("/portfolio/positions"))
        .await
        .unwrap();

    // The caller saw the replay result, never the 401.
    assert!(response.status.is_success());
    assert_eq!(response.body["positions"], json!([]));

    // Original send with the stale token, replay with the fresh one.
    let recorded = server.requests_for("/portfolio/positions");
    assert_eq!(recorded.len(), 2);
    assert_eq!(recorded[0].bearer(), Some("access-1"));
    assert_eq!(recorded[1].bearer(), Some("access-2"));

    // Exactly one refresh, carrying the stored refresh token.
    let refreshes = server.requests_for("/auth/refresh");
    assert_eq!(refreshes.len(), 1);
    assert_eq!(refreshes[0].body["refreshToken"], json!("refresh-1"));

    // The session now holds the new access token.
    assert_eq!(runtime.session().access_token.as_deref(), Some("access-2"));
    assert_eq!(runtime.status(), SessionStatus::Authenticated);
}

#[tokio::test]
async fn concurrent_expiries_share_one_refresh() {
    let server = MockAuthServer::start().await;
    let runtime = Arc::new(logged_in_runtime(&server).await);

    // Every in-flight request gets the 401; the slow refresh gives
    // them all time to attach to the one cycle.
    for _ in 0..5 {
        server.enqueue(
            "/quotes/latest",
            MockResponse::with_status(401, json!({"error": "token expired"})),
        );
    }
    server.set_default("/quotes/latest", MockResponse::ok(json!({"quotes": []})));
    server.set_default(
        "/auth/refresh",
        MockResponse::ok(json!({"accessToken": "access-2"}))
            .delayed(Duration::from_millis(300)),
    );

    let tasks: Vec<_> = (0..5)
        .map(|n| {
            let runtime = runtime.clone();
            tokio::spawn(async move {
                runtime
                    .request(ApiRequest::post("/quotes/latest", json!({"i": n})))
                    .await
            })
        })
        .collect();

    for joined in join_all(tasks).await {
        let response = joined.unwrap().unwrap();
        assert!(response.status.is_success());
    }

    // One refresh served all five expiries.
    assert_eq!(server.request_count("/auth/refresh"), 1);

    // Five rejected sends, then five replays with the new token, in
    // the same order the rejections arrived.
    let recorded = server.requests_for("/quotes/latest");
    assert_eq!(recorded.len(), 10);

    let first_round: Vec<_> = recorded
        .iter()
        .filter(|r| r.bearer() == Some("access-1"))
        .map(|r| r.body["i"].clone())
        .collect();
    let replays: Vec<_> = recorded
        .iter()
        .filter(|r| r.bearer() == Some("access-2"))
        .map(|r| r.body["i"].clone())
        .collect();

    assert_eq!(first_round.len(), 5);
    assert_eq!(replays, first_round);

    assert_eq!(runtime.status(), SessionStatus::Authenticated);
}

#[tokio::test]
async fn failed_refresh_expires_every_waiter_and_logs_out_once() {
    let server = MockAuthServer::start().await;
    let runtime = Arc::new(logged_in_runtime(&server).await);

    for _ in 0..3 {
        server.enqueue(
            "/quotes/latest",
            MockResponse::with_status(401, json!({"error": "token expired"})),
        );
    }
    server.set_default(
        "/auth/refresh",
        MockResponse::with_status(401, json!({"error": "refresh token revoked"}))
            .delayed(Duration::from_millis(300)),
    );
    server.set_default("/auth/logout", MockResponse::ok(json!({})));

    let tasks: Vec<_> = (0..3)
        .map(|_| {
            let runtime = runtime.clone();
            tokio::spawn(async move { runtime.request(ApiRequest::get("/quotes/latest")).await })
        })
        .collect();

    for joined in join_all(tasks).await {
        let result = joined.unwrap();
        assert!(matches!(result, Err(AuthError::SessionExpired)));
    }

    // One refresh attempt, one forced logout, no retries.
    assert_eq!(server.request_count("/auth/refresh"), 1);
    assert_eq!(server.request_count("/auth/logout"), 1);

    assert_eq!(runtime.status(), SessionStatus::Anonymous);
    assert!(runtime.session().access_token.is_none());
}

#[tokio::test]
async fn refresh_rotation_feeds_the_next_refresh() {
    let server = MockAuthServer::start().await;
    let runtime = logged_in_runtime(&server).await;

    server.set_default("/quotes/latest", MockResponse::ok(json!({"quotes": []})));

    // First cycle rotates the refresh token.
    server.enqueue(
        "/quotes/latest",
        MockResponse::with_status(401, json!({"error": "token expired"})),
    );
    server.enqueue(
        "/auth/refresh",
        MockResponse::ok(json!({"accessToken": "access-2", "refreshToken": "refresh-2"})),
    );
    runtime.request(ApiRequest::get("/quotes/latest")).await.unwrap();

    // Second cycle must use the rotated token.
    server.enqueue(
        "/quotes/latest",
        MockResponse::with_status(401, json!({"error": "token expired"})),
    );
    server.enqueue("/auth/refresh", MockResponse::ok(json!({"accessToken": "access-3"})));
    runtime.request(ApiRequest::get("/quotes/latest")).await.unwrap();

    let refreshes = server.requests_for("/auth/refresh");
    assert_eq!(refreshes.len(), 2);
    assert_eq!(refreshes[0].body["refreshToken"], json!("refresh-1"));
    assert_eq!(refreshes[1].body["refreshToken"], json!("refresh-2"));

    assert_eq!(runtime.session().access_token.as_deref(), Some("access-3"));
    // No rotation in the second cycle, so refresh-2 is still current.
    assert_eq!(runtime.session().refresh_token.as_deref(), Some("refresh-2"));
}

#[tokio::test]
async fn replay_rejected_again_resolves_expired_without_second_refresh() {
    let server = MockAuthServer::start().await;
    let runtime = logged_in_runtime(&server).await;

    // Stale on the first send and still rejected after the refresh.
    server.enqueue(
        "/quotes/latest",
        MockResponse::with_status(401, json!({"error": "token expired"})),
    );
    server.enqueue(
        "/quotes/latest",
        MockResponse::with_status(401, json!({"error": "token expired"})),
    );
    server.set_default("/auth/refresh", MockResponse::ok(json!({"accessToken": "access-2"})));

    let result = runtime.request(ApiRequest::get("/quotes/latest")).await;

    assert!(matches!(result, Err(AuthError::SessionExpired)));
    assert_eq!(server.request_count("/auth/refresh"), 1);
    assert_eq!(server.request_count("/quotes/latest"), 2);
}

#[tokio::test]
async fn expiry_without_refresh_token_is_immediate_session_expired() {
    let server = MockAuthServer::start().await;
    server.set_default(
        "/quotes/latest",
        MockResponse::with_status(401, json!({"error": "authentication required"})),
    );

    // Anonymous runtime: nothing to refresh with.
    let runtime = runtime_for(&server);
    let result = runtime.request(ApiRequest::get("/quotes/latest")).await;

    assert!(matches!(result, Err(AuthError::SessionExpired)));
    assert_eq!(server.request_count("/auth/refresh"), 0);
}

#[tokio::test]
async fn failed_refresh_walks_expired_then_anonymous() {
    let server = MockAuthServer::start().await;
    let runtime = logged_in_runtime(&server).await;

    server.enqueue(
        "/quotes/latest",
        MockResponse::with_status(401, json!({"error": "token expired"})),
    );
    server.set_default(
        "/auth/refresh",
        MockResponse::with_status(401, json!({"error": "refresh token revoked"})),
    );
    server.set_default("/auth/logout", MockResponse::ok(json!({})));

    let statuses = Arc::new(std::sync::Mutex::new(Vec::new()));
    let cb_statuses = statuses.clone();
    runtime.set_state_callback(Box::new(move |payload| {
        cb_statuses.lock().unwrap().push(payload.status);
    }));

    let _ = runtime.request(ApiRequest::get("/quotes/latest")).await;

    let statuses = statuses.lock().unwrap();
    assert_eq!(
        *statuses,
        vec![
            SessionStatus::Refreshing,
            SessionStatus::Expired,
            SessionStatus::Anonymous
        ]
    );
}
