//! cupom-helper: local print helper
//!
//! Listens on loopback and hands already-rendered receipt payloads to the
//! print pipeline:
//! - GET  /health
//! - GET  /printers
//! - POST /print
//! - POST /test-connection

mod api;
mod config;
mod error;
mod logger;
mod state;

use std::net::SocketAddr;

use config::Config;
use cupom_printer::PrintService;
use state::AppState;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    // Load .env file
    let _ = dotenvy::dotenv();

    let config = Config::from_env();
    logger::init_logger(config.log_dir.as_deref());

    let service = PrintService::new(config.printer.clone())?;
    tracing::info!(os = ?service.os(), "cupom-helper starting");

    let app = api::create_router(AppState::new(service));

    let addr = SocketAddr::from(([127, 0, 0, 1], config.port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("cupom-helper listening on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("cupom-helper stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
}
