use axum::body::{to_bytes, Body};
use axum::http::{header, HeaderMap, Method, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use serde_json::Value;
use tower::util::ServiceExt;

pub async fn request(app: &Router, method: Method, path: &str, body: Option<Value>) -> Response {
    let mut builder = Request::builder().method(method).uri(path);
    let body = match body {
        Some(json) => {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };
    let req = builder.body(body).expect("build test request");
    app.clone().oneshot(req).await.expect("router is infallible")
}

/// Empty bodies (e.g. `/health/live`) parse as `{}`.
pub async fn response_json(resp: Response) -> (StatusCode, HeaderMap, Value) {
    let (parts, body) = resp.into_parts();
    let bytes = to_bytes(body, usize::MAX).await.expect("collect body");
    let json = if bytes.is_empty() {
        Value::Object(Default::default())
    } else {
        serde_json::from_slice(&bytes)
            .unwrap_or_else(|e| panic!("body is not JSON ({e}): {}", String::from_utf8_lossy(&bytes)))
    };
    (parts.status, parts.headers, json)
}

pub async fn call(app: &Router, method: Method, path: &str, body: Option<Value>) -> (StatusCode, Value) {
    let (status, _, json) = response_json(request(app, method, path, body).await).await;
    (status, json)
}

pub fn assert_json_error(body: &Value, code: &str) {
    assert_eq!(body["success"], false, "expected an error envelope: {body}");
    assert_eq!(body["code"], code, "unexpected error code: {body}");
    assert!(body["message"].is_string());
}

pub fn assert_status_ok_json(status: StatusCode, body: &Value) {
    assert!(status.is_success(), "unexpected status {status}: {body}");
    assert_eq!(body["success"], true);
    assert!(!body["data"].is_null(), "missing data: {body}");
}
