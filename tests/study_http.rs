mod common;

use axum::http::{Method, StatusCode};
use axum::Router;
use serde_json::{json, Value};

use common::app::spawn_test_app;
use common::fixtures::{crypto_dataset, dataset, new_id, DatasetFixture};
use common::http::{assert_json_error, assert_status_ok_json, call};

async fn import(app: &Router, fixture: &DatasetFixture) {
    let (status, _) = call(app, Method::POST, "/api/datasets/import", Some(fixture.document.clone())).await;
    assert_eq!(status, StatusCode::CREATED);
}

async fn start(app: &Router, dataset_id: &str) -> Value {
    let (status, body) = call(
        app,
        Method::POST,
        "/api/study/sessions",
        Some(json!({ "datasetId": dataset_id })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    body["data"].clone()
}

fn current_card(view: &Value) -> String {
    view["current"]["cardId"].as_str().expect("current card").to_string()
}

#[tokio::test]
async fn it_full_session_reviews_every_card() {
    let app = spawn_test_app().await;
    let fixture = crypto_dataset();
    import(&app.app, &fixture).await;

    let view = start(&app.app, &fixture.dataset_id).await;
    let session_id = view["sessionId"].as_str().unwrap().to_string();
    assert_eq!(view["phase"], "awaitingAnswer");
    assert_eq!(view["remaining"], 2);
    assert_eq!(view["reviewed"], 0);
    assert!(view["result"].is_null());
    assert!(view["explanation"].is_null());

    let base = format!("/api/study/sessions/{session_id}");

    // rating before answering is out of order
    let (status, body) = call(&app.app, Method::POST, &format!("{base}/rate"), Some(json!({ "rating": 3 }))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_json_error(&body, "INVALID_SESSION_STATE");

    let mut card_id = current_card(&view);
    let mut reviewed = 0;
    loop {
        let typed = format!("  {}  ", fixture.answers[&card_id].to_uppercase());
        let (status, body) = call(&app.app, Method::POST, &format!("{base}/answer"), Some(json!({ "answer": typed }))).await;
        assert_status_ok_json(status, &body);
        assert_eq!(body["data"]["result"]["correct"], true);
        assert_eq!(body["data"]["result"]["expected"], fixture.answers[&card_id]);
        let session = &body["data"]["session"];
        assert_eq!(session["phase"], "graded");
        assert_eq!(session["awaitingSelfRating"], true);
        assert!(session["explanation"].is_string());

        let (status, body) = call(&app.app, Method::POST, &format!("{base}/rate"), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_json_error(&body, "INVALID_RATING");

        let (status, body) = call(&app.app, Method::POST, &format!("{base}/rate"), Some(json!({ "rating": 1 }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_json_error(&body, "INVALID_RATING");

        // a rating sent as a string is a malformed body, not a missing rating
        let (status, body) = call(&app.app, Method::POST, &format!("{base}/rate"), Some(json!({ "rating": "3" }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_json_error(&body, "INVALID_REQUEST_BODY");

        let (status, body) = call(&app.app, Method::POST, &format!("{base}/rate"), Some(json!({ "rating": 3 }))).await;
        assert_status_ok_json(status, &body);
        reviewed += 1;

        let outcome = &body["data"]["outcome"];
        assert_eq!(outcome["rating"], "good");
        assert_eq!(outcome["state"]["cardId"], card_id.as_str());
        assert_eq!(outcome["state"]["reps"], 1);
        assert!(outcome["confusedWith"].is_null());

        let session = &body["data"]["session"];
        assert_eq!(session["reviewed"], reviewed);
        assert_eq!(session["correct"], reviewed);

        if outcome["completed"] == true {
            assert_eq!(session["phase"], "completed");
            assert!(session["current"].is_null());
            break;
        }
        assert_eq!(session["phase"], "awaitingAnswer");
        card_id = current_card(session);
    }
    assert_eq!(reviewed, 3);

    let (status, body) = call(&app.app, Method::POST, &format!("{base}/answer"), Some(json!({ "answer": "x" }))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_json_error(&body, "INVALID_SESSION_STATE");

    // Good on a new card schedules days ahead
    let path = format!("/api/datasets/{}/due", fixture.dataset_id);
    let (_, body) = call(&app.app, Method::GET, &path, None).await;
    assert_eq!(body["data"], json!({ "overdue": 0, "today": 0, "total": 3 }));

    let (status, body) = call(
        &app.app,
        Method::POST,
        "/api/study/sessions",
        Some(json!({ "datasetId": fixture.dataset_id })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_json_error(&body, "NOTHING_DUE");

    let path = format!("/api/datasets/{}/dashboard", fixture.dataset_id);
    let (_, body) = call(&app.app, Method::GET, &path, None).await;
    assert_eq!(body["data"]["reviewedCards"], 3);
    let avg = body["data"]["averageRetrievability"].as_f64().unwrap();
    assert!(avg > 0.99 && avg <= 1.0, "avg={avg}");
}

#[tokio::test]
async fn it_wrong_answer_matching_another_card_records_confusion() {
    let app = spawn_test_app().await;
    let fixture = dataset("pairs", &[("x", "Q alpha", "alpha"), ("x", "Q beta", "beta")]);
    import(&app.app, &fixture).await;

    let view = start(&app.app, &fixture.dataset_id).await;
    let base = format!("/api/study/sessions/{}", view["sessionId"].as_str().unwrap());
    let shown = current_card(&view);
    let other = fixture
        .answers
        .keys()
        .find(|id| **id != shown)
        .cloned()
        .unwrap();

    let typed = fixture.answers[&other].clone();
    let (_, body) = call(&app.app, Method::POST, &format!("{base}/answer"), Some(json!({ "answer": typed }))).await;
    assert_eq!(body["data"]["result"]["correct"], false);
    assert_eq!(body["data"]["session"]["awaitingSelfRating"], false);

    // the supplied rating is ignored for an incorrect answer
    let (status, body) = call(&app.app, Method::POST, &format!("{base}/rate"), Some(json!({ "rating": 4 }))).await;
    assert_status_ok_json(status, &body);
    let outcome = &body["data"]["outcome"];
    assert_eq!(outcome["rating"], "again");
    assert_eq!(outcome["confusedWith"], other.as_str());
    assert_eq!(outcome["confusion"]["score"], 1);
    assert_eq!(body["data"]["session"]["current"]["cardId"], other.as_str());

    let path = format!("/api/datasets/{}/dashboard", fixture.dataset_id);
    let (_, body) = call(&app.app, Method::GET, &path, None).await;
    let top = body["data"]["topConfusions"].as_array().unwrap();
    assert_eq!(top.len(), 1);
    assert_eq!(top[0]["score"], 1);
    assert!(top[0]["label"].as_str().unwrap().contains('↔'));
}

#[tokio::test]
async fn it_give_up_grades_as_again() {
    let app = spawn_test_app().await;
    let fixture = crypto_dataset();
    import(&app.app, &fixture).await;

    let view = start(&app.app, &fixture.dataset_id).await;
    let base = format!("/api/study/sessions/{}", view["sessionId"].as_str().unwrap());
    let shown = current_card(&view);

    // even a correct partial answer counts as a miss after giving up
    let typed = fixture.answers[&shown].clone();
    let (status, body) = call(&app.app, Method::POST, &format!("{base}/give-up"), Some(json!({ "answer": typed }))).await;
    assert_status_ok_json(status, &body);
    assert_eq!(body["data"]["result"]["correct"], false);

    let (_, body) = call(&app.app, Method::POST, &format!("{base}/rate"), None).await;
    assert_eq!(body["data"]["outcome"]["rating"], "again");
    assert_eq!(body["data"]["session"]["correct"], 0);
}

#[tokio::test]
async fn it_session_lookup_and_abandon() {
    let app = spawn_test_app().await;
    let fixture = crypto_dataset();
    import(&app.app, &fixture).await;

    let view = start(&app.app, &fixture.dataset_id).await;
    let path = format!("/api/study/sessions/{}", view["sessionId"].as_str().unwrap());

    let (status, body) = call(&app.app, Method::GET, &path, None).await;
    assert_status_ok_json(status, &body);
    assert_eq!(body["data"]["current"]["cardId"], view["current"]["cardId"]);
    assert_eq!(app.state.sessions().len().await, 1);

    let (status, body) = call(&app.app, Method::DELETE, &path, None).await;
    assert_status_ok_json(status, &body);
    assert_eq!(body["data"]["phase"], "completed");
    assert!(app.state.sessions().is_empty().await);

    let (status, body) = call(&app.app, Method::GET, &path, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_json_error(&body, "SESSION_NOT_FOUND");
}

#[tokio::test]
async fn it_start_errors() {
    let app = spawn_test_app().await;

    let (status, body) = call(
        &app.app,
        Method::POST,
        "/api/study/sessions",
        Some(json!({ "datasetId": new_id() })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_json_error(&body, "DATASET_NOT_FOUND");

    let empty = dataset("empty", &[]);
    import(&app.app, &empty).await;
    let (status, body) = call(
        &app.app,
        Method::POST,
        "/api/study/sessions",
        Some(json!({ "datasetId": empty.dataset_id })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_json_error(&body, "NOTHING_DUE");

    let path = format!("/api/study/sessions/{}/answer", new_id());
    let (status, body) = call(&app.app, Method::POST, &path, Some(json!({ "answer": "x" }))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_json_error(&body, "SESSION_NOT_FOUND");
}
