//! Relay error types and Axum response conversion.

use axum::{
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Errors a relay route can answer with.
#[derive(Debug)]
pub enum AppError {
    /// No route matches the method and path.
    UnknownRoute { method: Method, path: String },
    /// The completion call behind a task failed. Carries the task's static message;
    /// the cause is only logged.
    TaskFailed(&'static str),
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::UnknownRoute { method, path } => {
                (StatusCode::NOT_FOUND, format!("no route for {} {}", method, path))
            }
            AppError::TaskFailed(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.to_string()),
        };
        (status, Json(ErrorResponse { error: message })).into_response()
    }
}
