use axum::Json;
use axum::extract::State;
use cupom_printer::DiscoveredPrinter;

use super::ApiResponse;
use crate::error::AppResult;
use crate::state::AppState;

/// GET /printers
pub async fn list_printers(
    State(state): State<AppState>,
) -> AppResult<Json<ApiResponse<Vec<DiscoveredPrinter>>>> {
    let printers = state.service.list_printers().await?;
    Ok(Json(ApiResponse::ok(printers)))
}
