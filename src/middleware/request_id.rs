//! Request correlation: every request runs inside a span carrying its id,
//! the id is echoed in `x-request-id`, and every 4xx/5xx body leaves as an
//! `ErrorBody`-shaped JSON object with `traceId` set.

use std::time::Instant;

use axum::body::Body;
use axum::extract::Request;
use axum::http::{header, HeaderValue, StatusCode};
use axum::middleware::Next;
use axum::response::Response;
use http_body_util::BodyExt;
use serde_json::Value;
use tracing::Instrument;

use crate::response::ErrorBody;

const REQUEST_ID_HEADER: &str = "x-request-id";
const MAX_REQUEST_ID_LEN: usize = 128;

pub async fn request_id_middleware(req: Request, next: Next) -> Response {
    let request_id = req
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|id| is_valid_request_id(id))
        .map(str::to_string)
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    let span = tracing::info_span!(
        "request",
        request_id = %request_id,
        method = %req.method(),
        path = %req.uri().path(),
    );
    let started = Instant::now();
    let mut response = next.run(req).instrument(span.clone()).await;
    span.in_scope(|| {
        tracing::info!(
            status = response.status().as_u16(),
            latency_ms = started.elapsed().as_millis() as u64,
            "request completed"
        )
    });

    if response.status().is_client_error() || response.status().is_server_error() {
        response = with_trace_id(response, &request_id).await;
    }
    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}

/// JSON error objects gain a `traceId`; anything else (axum's plain-text
/// rejections, 405s, body-limit 413s) is rewrapped as an `ErrorBody`.
async fn with_trace_id(response: Response, request_id: &str) -> Response {
    let (mut parts, body) = response.into_parts();
    let bytes = body.collect().await.map(|c| c.to_bytes()).unwrap_or_default();

    let patched = match serde_json::from_slice::<Value>(&bytes) {
        Ok(Value::Object(mut obj)) => {
            obj.insert("traceId".to_string(), Value::String(request_id.to_string()));
            Value::Object(obj)
        }
        _ => {
            let text = String::from_utf8_lossy(&bytes).trim().to_string();
            let message = if text.is_empty() {
                parts.status.canonical_reason().unwrap_or("Error").to_string()
            } else {
                text
            };
            let body = ErrorBody {
                success: false,
                code: error_code_for_status(parts.status).to_string(),
                message,
                trace_id: Some(request_id.to_string()),
            };
            serde_json::to_value(body).unwrap_or(Value::Null)
        }
    };

    parts.headers.remove(header::CONTENT_LENGTH);
    parts
        .headers
        .insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
    Response::from_parts(parts, Body::from(patched.to_string()))
}

fn error_code_for_status(status: StatusCode) -> &'static str {
    match status {
        StatusCode::BAD_REQUEST => "BAD_REQUEST",
        StatusCode::NOT_FOUND => "NOT_FOUND",
        StatusCode::METHOD_NOT_ALLOWED => "METHOD_NOT_ALLOWED",
        StatusCode::CONFLICT => "CONFLICT",
        StatusCode::PAYLOAD_TOO_LARGE => "PAYLOAD_TOO_LARGE",
        StatusCode::UNSUPPORTED_MEDIA_TYPE => "UNSUPPORTED_MEDIA_TYPE",
        StatusCode::UNPROCESSABLE_ENTITY => "INVALID_REQUEST_BODY",
        StatusCode::SERVICE_UNAVAILABLE => "SERVICE_UNAVAILABLE",
        _ => "INTERNAL_ERROR",
    }
}

/// 客户端传入的 id 只接受字母数字、`-`、`_`，且不超过 128 字节
fn is_valid_request_id(id: &str) -> bool {
    (1..=MAX_REQUEST_ID_LEN).contains(&id.len())
        && id
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_'))
}

#[cfg(test)]
mod tests {
    use axum::body::to_bytes;
    use axum::response::IntoResponse;

    use super::*;

    async fn body_json(resp: Response) -> Value {
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn request_id_charset_and_length() {
        assert!(is_valid_request_id("abc-123_XYZ"));
        assert!(!is_valid_request_id(""));
        assert!(!is_valid_request_id("has space"));
        assert!(!is_valid_request_id(&"a".repeat(129)));
    }

    #[test]
    fn plain_errors_get_stable_codes() {
        assert_eq!(error_code_for_status(StatusCode::METHOD_NOT_ALLOWED), "METHOD_NOT_ALLOWED");
        assert_eq!(error_code_for_status(StatusCode::UNPROCESSABLE_ENTITY), "INVALID_REQUEST_BODY");
        assert_eq!(error_code_for_status(StatusCode::BAD_GATEWAY), "INTERNAL_ERROR");
    }

    #[tokio::test]
    async fn plain_text_error_is_rewrapped() {
        let resp = (StatusCode::PAYLOAD_TOO_LARGE, "length limit exceeded").into_response();
        let json = body_json(with_trace_id(resp, "req-1").await).await;
        assert_eq!(json["code"], "PAYLOAD_TOO_LARGE");
        assert_eq!(json["message"], "length limit exceeded");
        assert_eq!(json["traceId"], "req-1");
    }

    #[tokio::test]
    async fn json_error_keeps_its_fields() {
        let resp = (
            StatusCode::CONFLICT,
            axum::Json(serde_json::json!({ "success": false, "code": "NOTHING_DUE" })),
        )
            .into_response();
        let json = body_json(with_trace_id(resp, "req-2").await).await;
        assert_eq!(json["code"], "NOTHING_DUE");
        assert_eq!(json["traceId"], "req-2");
    }
}
