//! API error type
//!
//! Every failure leaves the helper as JSON:
//!
//! ```json
//! { "ok": false, "error": { "kind": "resolution", "message": "..." } }
//! ```

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use cupom_printer::{ErrorKind, PrintError};
use serde_json::json;
use tracing::{error, warn};

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Print(#[from] PrintError),

    #[error("Invalid request: {0}")]
    /// Malformed body or payload encoding (400)
    BadRequest(String),
}

pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Print(PrintError::Timeout { .. }) => StatusCode::GATEWAY_TIMEOUT,
            AppError::Print(e) => match e.kind() {
                ErrorKind::Configuration => StatusCode::UNPROCESSABLE_ENTITY,
                ErrorKind::Resolution => StatusCode::NOT_FOUND,
                ErrorKind::Transport | ErrorKind::PartialWrite => StatusCode::BAD_GATEWAY,
            },
        }
    }

    fn kind(&self) -> serde_json::Value {
        match self {
            AppError::BadRequest(_) => json!("invalid_request"),
            AppError::Print(e) => json!(e.kind()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self, "print request failed");
        } else {
            warn!(error = %self, "print request rejected");
        }

        let body = json!({
            "ok": false,
            "error": {
                "kind": self.kind(),
                "message": self.to_string(),
            },
        });
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let err = AppError::from(PrintError::Resolution("gone".into()));
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
        assert_eq!(err.kind(), json!("resolution"));

        let err = AppError::from(PrintError::Configuration("bad".into()));
        assert_eq!(err.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let err = AppError::BadRequest("payload".into());
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.kind(), json!("invalid_request"));
    }
}
