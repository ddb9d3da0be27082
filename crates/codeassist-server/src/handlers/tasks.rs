//! Code task handlers: convert, debug and quality check.
//!
//! Bodies are read as raw bytes and parsed leniently, so a missing or
//! malformed field is forwarded upstream rather than rejected.

use std::sync::Arc;

use axum::{body::Bytes, extract::State, Json};
use codeassist_core::{parse_lenient, CodeRequest, ConvertRequest, Task};

use crate::dto::{ConvertResponse, DebugResponse, QualityCheckResponse};
use crate::error::AppError;
use crate::services;
use crate::ServerState;

/// Converts code to the requested language.
pub async fn convert(
    State(state): State<Arc<ServerState>>,
    body: Bytes,
) -> Result<Json<ConvertResponse>, AppError> {
    let req: ConvertRequest = parse_lenient(&body);
    let task = Task::Convert { language: req.language };
    let converted_code = services::task::run(&state, &task, &req.code).await?;
    Ok(Json(ConvertResponse { converted_code }))
}

/// Asks for a debugging pass over the code.
pub async fn debug(
    State(state): State<Arc<ServerState>>,
    body: Bytes,
) -> Result<Json<DebugResponse>, AppError> {
    let req: CodeRequest = parse_lenient(&body);
    let debug_result = services::task::run(&state, &Task::Debug, &req.code).await?;
    Ok(Json(DebugResponse { debug_result }))
}

/// Asks for a quality review of the code.
pub async fn quality_check(
    State(state): State<Arc<ServerState>>,
    body: Bytes,
) -> Result<Json<QualityCheckResponse>, AppError> {
    let req: CodeRequest = parse_lenient(&body);
    let quality_check_result = services::task::run(&state, &Task::QualityCheck, &req.code).await?;
    Ok(Json(QualityCheckResponse { quality_check_result }))
}
