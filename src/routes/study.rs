use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::Router;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::extractors::{JsonBody, OptionalJsonBody};
use crate::response::{created, ok, AppError};
use crate::srs::answer::AnswerResult;
use crate::srs::scheduler::Rating;
use crate::srs::session::{RateOutcome, ReviewSession, SessionView};
use crate::srs::EngineError;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/sessions", post(start_session))
        .route("/sessions/:id", get(get_session).delete(abandon_session))
        .route("/sessions/:id/answer", post(submit_answer))
        .route("/sessions/:id/give-up", post(give_up))
        .route("/sessions/:id/rate", post(rate))
}

fn session_not_found(id: &str) -> AppError {
    AppError {
        status: axum::http::StatusCode::NOT_FOUND,
        code: "SESSION_NOT_FOUND".to_string(),
        message: format!("study session not found: {id}"),
        is_operational: true,
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StartSessionRequest {
    dataset_id: String,
}

async fn start_session(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<StartSessionRequest>,
) -> Result<impl axum::response::IntoResponse, AppError> {
    let session = ReviewSession::start(
        state.store(),
        &req.dataset_id,
        state.config().study.interleave_sample_size,
        Utc::now(),
    )?;
    let view = state.sessions().insert(session).await;
    Ok(created(view))
}

async fn get_session(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> Result<impl axum::response::IntoResponse, AppError> {
    let view = state
        .sessions()
        .view(&id)
        .await
        .ok_or_else(|| session_not_found(&id))?;
    Ok(ok(view))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnswerRequest {
    #[serde(default)]
    answer: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AnswerResponse {
    result: AnswerResult,
    session: SessionView,
}

async fn submit_answer(
    Path(id): Path<String>,
    State(state): State<AppState>,
    JsonBody(req): JsonBody<AnswerRequest>,
) -> Result<impl axum::response::IntoResponse, AppError> {
    let now = Utc::now();
    let (result, session) = state
        .sessions()
        .update(&id, |s| {
            s.submit_answer(req.answer.as_deref(), now)
                .map(|result| (result, s.view()))
        })
        .await
        .ok_or_else(|| session_not_found(&id))??;
    Ok(ok(AnswerResponse { result, session }))
}

async fn give_up(
    Path(id): Path<String>,
    State(state): State<AppState>,
    OptionalJsonBody(req): OptionalJsonBody<AnswerRequest>,
) -> Result<impl axum::response::IntoResponse, AppError> {
    let now = Utc::now();
    let (result, session) = state
        .sessions()
        .update(&id, |s| {
            s.give_up(req.answer.as_deref(), now)
                .map(|result| (result, s.view()))
        })
        .await
        .ok_or_else(|| session_not_found(&id))??;
    Ok(ok(AnswerResponse { result, session }))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RateRequest {
    /// 1-4 (Again/Hard/Good/Easy); ignored for incorrect answers
    #[serde(default)]
    rating: Option<i64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RateResponse {
    outcome: RateOutcome,
    session: SessionView,
}

async fn rate(
    Path(id): Path<String>,
    State(state): State<AppState>,
    OptionalJsonBody(req): OptionalJsonBody<RateRequest>,
) -> Result<impl axum::response::IntoResponse, AppError> {
    let rating = req.rating.map(Rating::from_grade);
    let now = Utc::now();
    let store = state.store();

    let result = state
        .sessions()
        .update(&id, |s| s.rate(store, rating, now).map(|outcome| (outcome, s.view())))
        .await
        .ok_or_else(|| session_not_found(&id))?;

    match result {
        Ok((outcome, session)) => Ok(ok(RateResponse { outcome, session })),
        // 会话仍停留在 Graded，客户端可重试
        Err(EngineError::Store(e)) => Err(AppError::save_failed(&e.to_string())),
        Err(e) => Err(e.into()),
    }
}

async fn abandon_session(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> Result<impl axum::response::IntoResponse, AppError> {
    let mut session = state
        .sessions()
        .remove(&id)
        .await
        .ok_or_else(|| session_not_found(&id))?;
    session.abandon();
    Ok(ok(session.view()))
}
