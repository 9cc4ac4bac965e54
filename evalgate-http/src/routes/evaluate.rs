use crate::handlers::{discover, evaluate, method_not_allowed, preflight};
use crate::server::AppState;
use axum::{
    Router,
    routing::{MethodRouter, post},
};

/// The root path and `/api/evaluate` answer identically.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", evaluation_methods())
        .route("/api/evaluate", evaluation_methods())
}

fn evaluation_methods() -> MethodRouter<AppState> {
    post(evaluate)
        .get(discover)
        .options(preflight)
        .fallback(method_not_allowed)
}
