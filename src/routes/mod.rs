pub mod backup;
pub mod datasets;
pub mod health;
pub mod settings;
pub mod study;

use axum::extract::DefaultBodyLimit;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::{Json, Router};

use crate::middleware::request_id;
use crate::response::ErrorBody;
use crate::state::AppState;

/// Maximum request body size: 8 MiB (progress backups carry full review history).
const MAX_BODY_SIZE: usize = 8 * 1024 * 1024;

pub fn build_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .nest("/datasets", datasets::router())
        .nest("/settings", settings::router())
        .nest("/study", study::router())
        .nest("/backup", backup::router())
        .layer(DefaultBodyLimit::max(MAX_BODY_SIZE));

    Router::new()
        .nest("/api", api_routes)
        .nest("/health", health::router())
        .fallback(fallback_404)
        .layer(axum::middleware::from_fn(request_id::request_id_middleware))
        .with_state(state)
}

async fn fallback_404() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorBody {
            success: false,
            code: "NOT_FOUND".to_string(),
            message: "Not found".to_string(),
            trace_id: None,
        }),
    )
}
