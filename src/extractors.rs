use axum::body::{Body, Bytes};
use axum::extract::rejection::{BytesRejection, JsonRejection};
use axum::extract::{FromRequest, Request};
use axum::http::StatusCode;
use serde::de::DeserializeOwned;

use crate::response::AppError;

/// JSON body extractor whose failures use the `AppError` envelope.
pub struct JsonBody<T>(pub T);

#[axum::async_trait]
impl<S, T> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        axum::Json::<T>::from_request(req, state)
            .await
            .map(|axum::Json(value)| Self(value))
            .map_err(invalid_body)
    }
}

/// Like `JsonBody`, but an empty body yields `T::default()`. A body that is
/// present still has to be valid JSON of the right shape.
pub struct OptionalJsonBody<T>(pub T);

#[axum::async_trait]
impl<S, T> FromRequest<S> for OptionalJsonBody<T>
where
    T: DeserializeOwned + Default,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let headers = req.headers().clone();
        let bytes = Bytes::from_request(req, state).await.map_err(unreadable_body)?;
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self(T::default()));
        }

        let mut replay = Request::new(Body::from(bytes));
        *replay.headers_mut() = headers;
        let JsonBody(value) = JsonBody::<T>::from_request(replay, state).await?;
        Ok(Self(value))
    }
}

fn unreadable_body(rejection: BytesRejection) -> AppError {
    tracing::warn!(error = %rejection, "Failed to read request body");
    let status = rejection.status();
    let code = if status == StatusCode::PAYLOAD_TOO_LARGE {
        "PAYLOAD_TOO_LARGE"
    } else {
        "INVALID_REQUEST_BODY"
    };
    AppError {
        status,
        code: code.to_string(),
        message: rejection.body_text(),
        is_operational: true,
    }
}

fn invalid_body(rejection: JsonRejection) -> AppError {
    tracing::warn!(error = %rejection, "Rejected request body");
    let message = match &rejection {
        // 缺字段、类型不符这类细节对调用方有用，原样带回
        JsonRejection::JsonDataError(e) => e.body_text(),
        JsonRejection::JsonSyntaxError(_) => "请求体不是合法的 JSON".to_string(),
        JsonRejection::MissingJsonContentType(_) => {
            "Content-Type 必须为 application/json".to_string()
        }
        _ => "无法读取请求体".to_string(),
    };
    AppError::bad_request("INVALID_REQUEST_BODY", &message)
}
