use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::Router;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::extractors::JsonBody;
use crate::response::{created, ok, AppError};
use crate::srs::dashboard::dashboard;
use crate::srs::dataset::{export_dataset, import_dataset};
use crate::srs::queue::count_due;
use crate::srs::EngineError;
use crate::state::AppState;
use crate::store::operations::datasets::DatasetMeta;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_datasets))
        .route("/import", post(import))
        .route("/:id/export", get(export))
        .route("/:id/due", get(due_counts))
        .route("/:id/dashboard", get(dataset_dashboard))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DatasetSummary {
    #[serde(flatten)]
    meta: DatasetMeta,
    card_count: usize,
}

async fn list_datasets(
    State(state): State<AppState>,
) -> Result<impl axum::response::IntoResponse, AppError> {
    let store = state.store();
    let mut out = Vec::new();
    for meta in store.list_datasets()? {
        let card_count = store.count_cards(&meta.dataset_id)?;
        out.push(DatasetSummary { meta, card_count });
    }
    Ok(ok(out))
}

async fn import(
    State(state): State<AppState>,
    JsonBody(raw): JsonBody<Value>,
) -> Result<impl axum::response::IntoResponse, AppError> {
    let summary = import_dataset(state.store(), &raw, Utc::now())?;
    Ok(created(summary))
}

async fn export(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> Result<impl axum::response::IntoResponse, AppError> {
    Ok(ok(export_dataset(state.store(), &id)?))
}

fn require_dataset(state: &AppState, id: &str) -> Result<(), AppError> {
    match state.store().get_dataset_meta(id)? {
        Some(_) => Ok(()),
        None => Err(EngineError::DatasetNotFound(id.to_string()).into()),
    }
}

async fn due_counts(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> Result<impl axum::response::IntoResponse, AppError> {
    require_dataset(&state, &id)?;
    let counts = count_due(state.store(), &id, Utc::now())?;
    Ok(ok(counts))
}

#[derive(Debug, Deserialize)]
struct DashboardQuery {
    limit: Option<usize>,
}

async fn dataset_dashboard(
    Path(id): Path<String>,
    Query(q): Query<DashboardQuery>,
    State(state): State<AppState>,
) -> Result<impl axum::response::IntoResponse, AppError> {
    let limit = q
        .limit
        .unwrap_or(state.config().study.top_confusions_limit)
        .max(1);
    let view = dashboard(state.store(), &id, Utc::now(), limit)?;
    Ok(ok(view))
}
