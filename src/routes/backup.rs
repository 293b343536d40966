use axum::extract::{Query, State};
use axum::routing::{get, post};
use axum::Router;
use chrono::Utc;
use serde::Deserialize;
use serde_json::Value;

use crate::extractors::JsonBody;
use crate::response::{ok, AppError};
use crate::srs::backup::{export_progress, import_progress};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(export).delete(wipe))
        .route("/restore", post(restore))
}

async fn export(State(state): State<AppState>) -> Result<impl axum::response::IntoResponse, AppError> {
    Ok(ok(export_progress(state.store(), Utc::now())?))
}

#[derive(Debug, Deserialize)]
struct RestoreQuery {
    #[serde(default)]
    merge: bool,
}

async fn restore(
    Query(q): Query<RestoreQuery>,
    State(state): State<AppState>,
    JsonBody(raw): JsonBody<Value>,
) -> Result<impl axum::response::IntoResponse, AppError> {
    let summary = import_progress(state.store(), &raw, q.merge)?;
    if !q.merge {
        // 进行中的会话基于被替换的数据，直接作废
        let closed = state.sessions().clear().await;
        tracing::info!(closed, "Sessions closed after full restore");
    }
    Ok(ok(summary))
}

async fn wipe(State(state): State<AppState>) -> Result<impl axum::response::IntoResponse, AppError> {
    state.store().wipe_all()?;
    let sessions_closed = state.sessions().clear().await;
    Ok(ok(serde_json::json!({
        "wiped": true,
        "sessionsClosed": sessions_closed,
    })))
}
