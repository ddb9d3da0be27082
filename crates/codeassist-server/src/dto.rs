//! Response bodies for the task endpoints.

use serde::Serialize;

/// Response from `POST /convert`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConvertResponse {
    pub converted_code: String,
}

/// Response from `POST /debug`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DebugResponse {
    pub debug_result: String,
}

/// Response from `POST /qualitycheck`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QualityCheckResponse {
    pub quality_check_result: String,
}
