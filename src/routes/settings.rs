use axum::extract::State;
use axum::routing::get;
use axum::Router;
use chrono::Utc;
use serde::Serialize;

use crate::constants::{SETTINGS_TARGET_R_MAX, SETTINGS_TARGET_R_MIN};
use crate::extractors::JsonBody;
use crate::response::{ok, AppError};
use crate::srs::retention::{parse_exam_date, target_r_for_exam};
use crate::state::AppState;
use crate::store::operations::settings::{Settings, SettingsPatch};

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(get_settings).put(update_settings))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SettingsView {
    #[serde(flatten)]
    settings: Settings,
    /// 考试日期无法解析时为 false，调度时忽略该日期
    exam_date_valid: bool,
    /// 当前实际生效的目标保持率
    effective_target_r: f64,
}

impl SettingsView {
    fn from_settings(settings: Settings) -> Self {
        let exam = settings.exam_date.as_deref().and_then(parse_exam_date);
        Self {
            exam_date_valid: settings.exam_date.is_none() || exam.is_some(),
            effective_target_r: target_r_for_exam(settings.target_r, exam, Utc::now()),
            settings,
        }
    }
}

async fn get_settings(
    State(state): State<AppState>,
) -> Result<impl axum::response::IntoResponse, AppError> {
    let settings = state.store().get_settings()?;
    Ok(ok(SettingsView::from_settings(settings)))
}

async fn update_settings(
    State(state): State<AppState>,
    JsonBody(mut patch): JsonBody<SettingsPatch>,
) -> Result<impl axum::response::IntoResponse, AppError> {
    patch.target_r = patch
        .target_r
        .map(|r| r.clamp(SETTINGS_TARGET_R_MIN, SETTINGS_TARGET_R_MAX));
    let settings = state.store().update_settings(&patch)?;
    tracing::info!(
        target_r = settings.target_r,
        exam_date = ?settings.exam_date,
        "Settings updated"
    );
    Ok(ok(SettingsView::from_settings(settings)))
}
