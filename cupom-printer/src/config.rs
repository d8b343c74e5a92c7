use std::time::Duration;

use crate::transport::{SerialSettings, SpoolSettings};

/// Print pipeline settings
///
/// # Environment variables
///
/// | Variable | Default | Meaning |
/// |----------|---------|---------|
/// | PRINT_CHUNK_SIZE | 1024 | spooler chunk size (bytes) |
/// | PRINT_CHUNK_DELAY_MS | 50 | pause between spooler chunks |
/// | PRINT_CONNECT_TIMEOUT_MS | 5000 | connectivity checks |
/// | PRINT_JOB_TIMEOUT_MS | 30000 | full job submission |
/// | PRINT_QUEUE_STAGING_DELAY_MS | 10000 | delay before a queued job file is deleted |
/// | PRINT_BAUD_RATE | - | explicit serial baud rate |
/// | PRINT_LEGACY_BAUD_PROBE | false | try 9600/19200/38400/115200 in turn |
/// | PRINT_DIRECT_FALLBACK | true | retry a failed Windows spooler job on its COM port |
#[derive(Debug, Clone)]
pub struct PrinterConfig {
    pub spool: SpoolSettings,
    pub connect_timeout: Duration,
    pub job_timeout: Duration,
    pub queue_staging_delay: Duration,
    pub serial: SerialSettings,
    pub direct_fallback: bool,
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

fn env_millis(key: &str, default: u64) -> Duration {
    Duration::from_millis(env_parse(key).unwrap_or(default))
}

impl PrinterConfig {
    /// Load from environment variables, falling back to defaults
    pub fn from_env() -> Self {
        Self {
            spool: SpoolSettings {
                chunk_size: env_parse("PRINT_CHUNK_SIZE").unwrap_or(1024),
                chunk_delay: env_millis("PRINT_CHUNK_DELAY_MS", 50),
            },
            connect_timeout: env_millis("PRINT_CONNECT_TIMEOUT_MS", 5000),
            job_timeout: env_millis("PRINT_JOB_TIMEOUT_MS", 30000),
            queue_staging_delay: env_millis("PRINT_QUEUE_STAGING_DELAY_MS", 10000),
            serial: SerialSettings {
                baud_rate: env_parse("PRINT_BAUD_RATE"),
                legacy_baud_probe: env_parse("PRINT_LEGACY_BAUD_PROBE").unwrap_or(false),
            },
            direct_fallback: env_parse("PRINT_DIRECT_FALLBACK").unwrap_or(true),
        }
    }
}

impl Default for PrinterConfig {
    fn default() -> Self {
        Self {
            spool: SpoolSettings::default(),
            connect_timeout: Duration::from_secs(5),
            job_timeout: Duration::from_secs(30),
            queue_staging_delay: Duration::from_secs(10),
            serial: SerialSettings::default(),
            direct_fallback: true,
        }
    }
}
