mod common;

use axum::http::{Method, StatusCode};

use common::app::spawn_test_app;
use common::http::{assert_json_error, call, request};

#[tokio::test]
async fn it_health_live_and_ready() {
    let app = spawn_test_app().await;

    let live = request(&app.app, Method::GET, "/health/live", None).await;
    assert_eq!(live.status(), StatusCode::OK);

    let ready = request(&app.app, Method::GET, "/health/ready", None).await;
    assert_eq!(ready.status(), StatusCode::OK);
}

#[tokio::test]
async fn it_health_reports_status_and_sessions() {
    let app = spawn_test_app().await;

    let (status, body) = call(&app.app, Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["activeSessions"], 0);
}

#[tokio::test]
async fn it_health_database_is_ok() {
    let app = spawn_test_app().await;

    let (status, body) = call(&app.app, Method::GET, "/health/database", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["healthy"], true);
}

#[tokio::test]
async fn it_unknown_route_is_json_404() {
    let app = spawn_test_app().await;

    let resp = request(&app.app, Method::GET, "/api/nope", None).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert!(resp.headers().contains_key("x-request-id"));

    let (_, _, body) = common::http::response_json(resp).await;
    assert_json_error(&body, "NOT_FOUND");
}
