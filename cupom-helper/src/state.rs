//! Application state

use std::sync::Arc;

use cupom_printer::PrintService;
use tokio::sync::Mutex;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<PrintService>,
    /// Held for the whole of a print or connection test; one job at a time
    pub print_gate: Arc<Mutex<()>>,
}

impl AppState {
    pub fn new(service: PrintService) -> Self {
        Self {
            service: Arc::new(service),
            print_gate: Arc::new(Mutex::new(())),
        }
    }
}
