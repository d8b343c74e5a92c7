//! Print and connection test handlers
//!
//! - `POST /print`: send one base64 payload
//! - `POST /test-connection`: resolve, route and probe without printing

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use cupom_printer::{ConnectionReport, JobReport, PrintRequest};
use serde::Deserialize;

use super::ApiResponse;
use crate::error::{AppError, AppResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct PrintBody {
    pub payload_base64: String,
    pub printer_type: String,
    #[serde(default)]
    pub device_reference: String,
    #[serde(default)]
    pub display_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ConnectionBody {
    pub printer_type: String,
    #[serde(default)]
    pub device_reference: String,
    #[serde(default)]
    pub display_name: Option<String>,
}

fn body<T>(body: Result<Json<T>, JsonRejection>) -> AppResult<T> {
    body.map(|Json(b)| b)
        .map_err(|e| AppError::BadRequest(e.body_text()))
}

pub async fn print(
    State(state): State<AppState>,
    request: Result<Json<PrintBody>, JsonRejection>,
) -> AppResult<Json<ApiResponse<JobReport>>> {
    let request = body(request)?;
    let payload = BASE64
        .decode(request.payload_base64.trim())
        .map_err(|e| AppError::BadRequest(format!("payload_base64: {e}")))?;

    let _gate = state.print_gate.lock().await;
    let report = state
        .service
        .print_job(&PrintRequest {
            payload,
            printer_type: request.printer_type,
            device_reference: request.device_reference,
            display_name: request.display_name,
        })
        .await?;

    Ok(Json(ApiResponse::ok(report)))
}

pub async fn test_connection(
    State(state): State<AppState>,
    request: Result<Json<ConnectionBody>, JsonRejection>,
) -> AppResult<Json<ApiResponse<ConnectionReport>>> {
    let request = body(request)?;

    let _gate = state.print_gate.lock().await;
    let report = state
        .service
        .test_connection(
            &request.printer_type,
            &request.device_reference,
            request.display_name.as_deref(),
        )
        .await?;

    Ok(Json(ApiResponse::ok(report)))
}
