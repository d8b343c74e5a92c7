//! Helper configuration

use std::path::PathBuf;

use cupom_printer::PrinterConfig;

/// Helper configuration
///
/// | Variable | Default | Meaning |
/// |----------|---------|---------|
/// | HELPER_PORT | 9123 | HTTP port, bound on loopback only |
/// | LOG_DIR | - | daily rolling log directory (used when it exists) |
///
/// Print pipeline settings come from [`PrinterConfig::from_env`].
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub log_dir: Option<PathBuf>,
    pub printer: PrinterConfig,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            port: std::env::var("HELPER_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(9123),
            log_dir: std::env::var("LOG_DIR")
                .ok()
                .filter(|d| !d.is_empty())
                .map(PathBuf::from),
            printer: PrinterConfig::from_env(),
        }
    }
}
