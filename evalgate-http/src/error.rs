//! Error handling for evalgate-http
//!
//! Failures that happen before a request reaches the gateway. Every variant
//! renders as the same JSON error body the gateway uses for failed evaluations.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use evalgate_core::{FailureKind, wire::ErrorBody};
use std::cmp::PartialEq;

#[derive(Debug)]
pub enum AppError {
    /// The body is not a JSON document.
    InvalidJson(String),

    /// Method other than GET, POST or OPTIONS on an evaluation route.
    MethodNotAllowed,

    /// Internal error
    Internal(String),
}

impl PartialEq<StatusCode> for AppError {
    fn eq(&self, status_code: &StatusCode) -> bool {
        &self.status() == status_code
    }
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            Self::InvalidJson(_) => StatusCode::BAD_REQUEST,
            Self::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn body(&self) -> ErrorBody {
        match self {
            Self::InvalidJson(details) => ErrorBody::new("Invalid JSON")
                .with_kind(FailureKind::InvalidRequest)
                .with_details(details.clone()),
            Self::MethodNotAllowed => {
                ErrorBody::new("Method not allowed").with_kind(FailureKind::InvalidRequest)
            }
            Self::Internal(msg) => ErrorBody::new(msg.clone()).with_kind(FailureKind::InternalError),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        (self.status(), Json(self.body())).into_response()
    }
}
