use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::srs::EngineError;
use crate::store::StoreError;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    pub data: T,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub success: bool,
    pub code: String,
    pub message: String,
    pub trace_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AppError {
    pub status: StatusCode,
    pub code: String,
    pub message: String,
    pub is_operational: bool,
}

impl AppError {
    fn operational(status: StatusCode, code: &str, message: &str) -> Self {
        Self {
            status,
            code: code.to_string(),
            message: message.to_string(),
            is_operational: true,
        }
    }

    pub fn bad_request(code: &str, message: &str) -> Self {
        Self::operational(StatusCode::BAD_REQUEST, code, message)
    }

    pub fn not_found(message: &str) -> Self {
        Self::operational(StatusCode::NOT_FOUND, "NOT_FOUND", message)
    }

    pub fn conflict(code: &str, message: &str) -> Self {
        Self::operational(StatusCode::CONFLICT, code, message)
    }

    /// 会话中途保存失败：内存中的会话保持不变，客户端可重试同一步
    pub fn save_failed(detail: &str) -> Self {
        tracing::error!(error = %detail, "Failed to persist review step");
        Self::operational(
            StatusCode::SERVICE_UNAVAILABLE,
            "SAVE_FAILED",
            "学习进度保存失败，请重试",
        )
    }

    pub fn internal(message: &str) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            code: "INTERNAL_ERROR".to_string(),
            message: message.to_string(),
            is_operational: false,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let message = if self.is_operational {
            tracing::warn!(status = self.status.as_u16(), code = %self.code, error = %self.message, "Request rejected");
            self.message
        } else {
            // 内部错误细节只进日志
            tracing::error!(status = self.status.as_u16(), code = %self.code, error = %self.message, "Request failed");
            "服务器内部错误".to_string()
        };

        let body = ErrorBody {
            success: false,
            code: self.code,
            message,
            trace_id: None,
        };
        (self.status, Json(body)).into_response()
    }
}

// StoreError 映射：Validation -> 400（可安全暴露），其余 -> 500（消息被替换为通用文案）
impl From<StoreError> for AppError {
    fn from(value: StoreError) -> Self {
        match &value {
            StoreError::Validation(msg) => AppError::bad_request("VALIDATION_ERROR", msg),
            StoreError::NotFound { entity, key } => {
                AppError::not_found(&format!("{entity} not found: {key}"))
            }
            _ => AppError::internal(&value.to_string()),
        }
    }
}

impl From<EngineError> for AppError {
    fn from(value: EngineError) -> Self {
        match value {
            EngineError::Store(e) => e.into(),
            EngineError::Validation(msg) => AppError::bad_request("VALIDATION_ERROR", &msg),
            EngineError::DatasetNotFound(id) => Self::operational(
                StatusCode::NOT_FOUND,
                "DATASET_NOT_FOUND",
                &format!("dataset not found: {id}"),
            ),
            e @ EngineError::CardNotFound { .. } => {
                Self::operational(StatusCode::NOT_FOUND, "CARD_NOT_FOUND", &e.to_string())
            }
            EngineError::NothingDue(id) => AppError::conflict(
                "NOTHING_DUE",
                &format!("no cards are due in dataset {id}"),
            ),
            e @ EngineError::EmptyQueue => AppError::conflict("QUEUE_EMPTY", &e.to_string()),
            e @ EngineError::InvalidTransition(_) => {
                AppError::conflict("INVALID_SESSION_STATE", &e.to_string())
            }
            EngineError::InvalidRating(msg) => AppError::bad_request("INVALID_RATING", &msg),
        }
    }
}

fn envelope<T: Serialize>(status: StatusCode, data: T) -> (StatusCode, Json<ApiResponse<T>>) {
    (status, Json(ApiResponse { success: true, data }))
}

pub fn ok<T: Serialize>(data: T) -> impl IntoResponse {
    envelope(StatusCode::OK, data)
}

pub fn created<T: Serialize>(data: T) -> impl IntoResponse {
    envelope(StatusCode::CREATED, data)
}

#[cfg(test)]
mod tests {
    use axum::body::to_bytes;
    use axum::response::IntoResponse;

    use super::*;

    async fn body_json(resp: Response) -> serde_json::Value {
        let body = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn internal_error_is_redacted() {
        let resp = AppError::internal("sled crash").into_response();
        let body = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let text = String::from_utf8(body.to_vec()).unwrap();
        assert!(!text.contains("sled crash"));
        assert!(text.contains("服务器内部错误"));
    }

    #[tokio::test]
    async fn validation_message_is_exposed() {
        let err: AppError = EngineError::Validation("cards[2].answers must be a non-empty array".into()).into();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        let json = body_json(err.into_response()).await;
        assert_eq!(json["code"], "VALIDATION_ERROR");
        assert_eq!(json["message"], "cards[2].answers must be a non-empty array");
        assert_eq!(json["success"], false);
    }

    #[tokio::test]
    async fn engine_errors_map_to_status() {
        let cases: Vec<(EngineError, StatusCode, &str)> = vec![
            (EngineError::DatasetNotFound("d".into()), StatusCode::NOT_FOUND, "DATASET_NOT_FOUND"),
            (EngineError::NothingDue("d".into()), StatusCode::CONFLICT, "NOTHING_DUE"),
            (EngineError::EmptyQueue, StatusCode::CONFLICT, "QUEUE_EMPTY"),
            (EngineError::InvalidTransition("x".into()), StatusCode::CONFLICT, "INVALID_SESSION_STATE"),
            (EngineError::InvalidRating("x".into()), StatusCode::BAD_REQUEST, "INVALID_RATING"),
        ];
        for (engine_error, status, code) in cases {
            let err: AppError = engine_error.into();
            assert_eq!(err.status, status);
            assert_eq!(err.code, code);
        }
    }

    #[tokio::test]
    async fn save_failed_is_retryable() {
        let err = AppError::save_failed("io error");
        assert_eq!(err.status, StatusCode::SERVICE_UNAVAILABLE);
        let json = body_json(err.into_response()).await;
        assert_eq!(json["code"], "SAVE_FAILED");
        assert!(!json["message"].as_str().unwrap().contains("io error"));
    }
}
