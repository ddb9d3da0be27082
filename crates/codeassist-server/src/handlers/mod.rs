//! HTTP route handlers for the relay server.

pub mod tasks;

use axum::http::{Method, Uri};

use crate::error::AppError;

/// Health check endpoint.
pub async fn health() -> &'static str {
    "OK"
}

/// Fallback for unknown routes.
pub async fn not_found(method: Method, uri: Uri) -> AppError {
    AppError::UnknownRoute { method, path: uri.path().to_string() }
}
