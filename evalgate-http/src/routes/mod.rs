pub mod evaluate;

use crate::handlers;
use crate::server::AppState;
use axum::{Router, routing::get};
use evalgate_core::{
    BackendKind, EvaluationMode, FailureKind,
    wire::{Discovery, ErrorBody, EvaluateBody, Operation, SuccessBody},
};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(handlers::evaluate::evaluate, handlers::evaluate::discover),
    components(schemas(
        EvaluateBody,
        SuccessBody,
        ErrorBody,
        Discovery,
        Operation,
        BackendKind,
        EvaluationMode,
        FailureKind
    ))
)]
pub struct ApiDoc;

/// Create the main API router with state
pub fn create_api_router() -> Router<AppState> {
    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/api-docs/openapi.json", get(handlers::openapi_json))
        .merge(evaluate::routes())
}
