use axum::{
    Json,
    body::Bytes,
    extract::State,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use evalgate_core::{
    normalize::truncate_detail,
    wire::{Discovery, ErrorBody, EvaluateBody, SuccessBody},
};
use serde_json::Value;
use tracing::debug;

use crate::error::AppError;
use crate::server::AppState;

const ALLOWED_METHODS: &str = "GET, POST, OPTIONS";

/// Evaluate source
///
/// Runs the submitted source through the configured backend. `source`, `expr`
/// and `code` are accepted as the field name; an empty body is treated as `{}`.
#[utoipa::path(
    post,
    path = "/api/evaluate",
    request_body = EvaluateBody,
    responses(
        (status = 200, description = "Evaluation completed", body = SuccessBody),
        (status = 400, description = "Missing source or malformed body", body = ErrorBody),
        (status = 500, description = "Evaluation failed", body = ErrorBody)
    )
)]
pub async fn evaluate(State(state): State<AppState>, body: Bytes) -> Result<Response, AppError> {
    let body = parse_body(&body, state.gateway.detail_limit())?;
    let (status, body) = state.gateway.handle(body).await.into_wire();
    let status = StatusCode::from_u16(status)
        .map_err(|_| AppError::Internal(format!("invalid status code {}", status)))?;
    Ok((status, Json(body)).into_response())
}

fn parse_body(body: &[u8], detail_limit: usize) -> Result<Value, AppError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        debug!("empty request body");
        return Ok(Value::Object(Default::default()));
    }
    serde_json::from_slice(body)
        .map_err(|err| AppError::InvalidJson(truncate_detail(&err.to_string(), detail_limit)))
}

/// Describe the endpoint
#[utoipa::path(
    get,
    path = "/api/evaluate",
    responses(
        (status = 200, description = "Endpoint description", body = Discovery)
    )
)]
#[axum::debug_handler]
pub async fn discover(State(state): State<AppState>) -> Json<Discovery> {
    Json(state.gateway.describe())
}

/// Pre-flight
///
/// Reached only when no CORS layer answered the request first.
pub async fn preflight() -> impl IntoResponse {
    (
        StatusCode::OK,
        [
            (header::ALLOW, HeaderValue::from_static(ALLOWED_METHODS)),
            (
                header::ACCESS_CONTROL_ALLOW_ORIGIN,
                HeaderValue::from_static("*"),
            ),
            (
                header::ACCESS_CONTROL_ALLOW_METHODS,
                HeaderValue::from_static(ALLOWED_METHODS),
            ),
            (
                header::ACCESS_CONTROL_ALLOW_HEADERS,
                HeaderValue::from_static("Content-Type"),
            ),
        ],
    )
}

pub async fn method_not_allowed() -> impl IntoResponse {
    (
        [(header::ALLOW, HeaderValue::from_static(ALLOWED_METHODS))],
        AppError::MethodNotAllowed,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_body_is_empty_object() {
        assert_eq!(parse_body(b"", 200).unwrap(), serde_json::json!({}));
        assert_eq!(parse_body(b" \n", 200).unwrap(), serde_json::json!({}));
    }

    #[test]
    fn test_malformed_body() {
        let err = parse_body(b"{\"expr\": ", 200).unwrap_err();
        assert!(err == StatusCode::BAD_REQUEST);
    }
}
