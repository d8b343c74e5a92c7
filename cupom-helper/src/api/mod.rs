//! HTTP routes for cupom-helper

pub mod health;
pub mod print;
pub mod printers;

use axum::Router;
use axum::routing::{get, post};
use serde::Serialize;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Successful response envelope
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub ok: bool,
    pub data: T,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self { ok: true, data }
    }
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/printers", get(printers::list_printers))
        .route("/print", post(print::print))
        .route("/test-connection", post(print::test_connection))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode};
    use cupom_printer::{
        DiscoveredPrinter, HostOs, PrintService, PrinterConfig, PrinterStatus, StaticDiscovery,
    };
    use serde_json::{Value, json};
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;
    use tower::ServiceExt;

    use super::*;

    fn app(printers: Vec<DiscoveredPrinter>) -> Router {
        let service = PrintService::with_discovery(
            PrinterConfig::default(),
            HostOs::Linux,
            Arc::new(StaticDiscovery::new(printers)),
        );
        create_router(AppState::new(service))
    }

    async fn call(app: Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::post(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let (status, body) = call(
            app(vec![]),
            Request::get("/health").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_list_printers() {
        let printer = DiscoveredPrinter {
            display_name: "Caixa".to_string(),
            device_reference: "Caixa".to_string(),
            status: PrinterStatus::Ready,
            is_default: true,
        };
        let (status, body) = call(
            app(vec![printer]),
            Request::get("/printers").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"][0]["display_name"], "Caixa");
        assert_eq!(body["data"][0]["status"], "ready");
    }

    #[tokio::test]
    async fn test_print_to_socket() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = Vec::new();
            socket.read_to_end(&mut buf).await.unwrap();
            buf
        });

        let (status, body) = call(
            app(vec![]),
            post_json(
                "/print",
                json!({
                    "payload_base64": "SEVMTE8=",
                    "printer_type": "GENERICA_ESCPOS",
                    "device_reference": addr.to_string(),
                }),
            ),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ok"], true);
        assert_eq!(body["data"]["transport"], "socket");
        let received = server.await.unwrap();
        assert_eq!(body["data"]["bytes"], received.len());
        assert!(received.windows(5).any(|w| w == b"HELLO"));
    }

    #[tokio::test]
    async fn test_bad_base64() {
        let (status, body) = call(
            app(vec![]),
            post_json(
                "/print",
                json!({
                    "payload_base64": "not base64!",
                    "printer_type": "GENERICA_ESCPOS",
                    "device_reference": "192.168.1.50:9100",
                }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["ok"], false);
        assert_eq!(body["error"]["kind"], "invalid_request");
    }

    #[tokio::test]
    async fn test_unroutable_reference() {
        let (status, body) = call(
            app(vec![]),
            post_json(
                "/test-connection",
                json!({
                    "printer_type": "EPSON_TM_T20",
                    "device_reference": "COM7",
                }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["error"]["kind"], "configuration");
    }
}
