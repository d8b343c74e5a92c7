//! Error types for the print pipeline

use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

use crate::router::TransportKind;

/// Print pipeline error types
///
/// None of these are retried inside the pipeline. The caller decides.
#[derive(Debug, Error)]
pub enum PrintError {
    /// Unroutable OS/reference combination or invalid settings
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Stored reference does not match any usable device
    #[error("Resolution failed: {0}")]
    Resolution(String),

    /// Queue/port open failure, socket error, rejected submission
    #[error("{transport} transport error: {detail}")]
    Transport {
        transport: TransportKind,
        detail: String,
    },

    /// Transport operation exceeded its deadline
    #[error("{transport} transport timed out after {after:?}")]
    Timeout {
        transport: TransportKind,
        after: Duration,
    },

    /// Bytes written differ from bytes requested
    #[error("{transport} partial write: {written} of {expected} bytes")]
    PartialWrite {
        transport: TransportKind,
        written: usize,
        expected: usize,
    },

    /// IO error during printing
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Coarse error category reported across the library boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Configuration,
    Resolution,
    Transport,
    PartialWrite,
}

impl PrintError {
    pub(crate) fn transport(transport: TransportKind, detail: impl Into<String>) -> Self {
        Self::Transport {
            transport,
            detail: detail.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Configuration(_) => ErrorKind::Configuration,
            Self::Resolution(_) => ErrorKind::Resolution,
            Self::Transport { .. } | Self::Timeout { .. } | Self::Io(_) => ErrorKind::Transport,
            Self::PartialWrite { .. } => ErrorKind::PartialWrite,
        }
    }
}

/// Result type for printer operations
pub type PrintResult<T> = Result<T, PrintError>;
