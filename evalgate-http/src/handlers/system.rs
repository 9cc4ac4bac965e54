use axum::{Json, http::StatusCode, response::IntoResponse};
use utoipa::OpenApi;

use crate::routes::ApiDoc;

/// Health check endpoint for container health monitoring
pub async fn health_check() -> impl IntoResponse {
    StatusCode::OK
}

pub async fn openapi_json() -> impl IntoResponse {
    Json(ApiDoc::openapi())
}
