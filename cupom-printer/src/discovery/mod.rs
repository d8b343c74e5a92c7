//! Printer discovery
//!
//! Lists the printers the host knows about right now. Results are never
//! cached beyond one call; every job resolves against a fresh snapshot.

pub mod cups;

#[cfg(windows)]
pub mod win32;

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::PrintResult;
use crate::router::HostOs;
#[cfg(windows)]
use crate::{error::PrintError, router::TransportKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrinterStatus {
    Ready,
    Busy,
    Offline,
    Unknown,
}

/// One printer as seen by the OS
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveredPrinter {
    /// Queue / display name
    pub display_name: String,
    /// Port, device path, address or queue name the printer is reached by
    pub device_reference: String,
    pub status: PrinterStatus,
    pub is_default: bool,
}

#[async_trait]
pub trait Discovery: Send + Sync {
    async fn discover(&self) -> PrintResult<Vec<DiscoveredPrinter>>;
}

/// Fixed printer list
#[derive(Debug, Clone, Default)]
pub struct StaticDiscovery {
    printers: Vec<DiscoveredPrinter>,
}

impl StaticDiscovery {
    pub fn new(printers: Vec<DiscoveredPrinter>) -> Self {
        Self { printers }
    }
}

#[async_trait]
impl Discovery for StaticDiscovery {
    async fn discover(&self) -> PrintResult<Vec<DiscoveredPrinter>> {
        Ok(self.printers.clone())
    }
}

/// Discovery through the host's own printing system
///
/// Every query against the OS is bounded by `timeout`.
#[derive(Debug, Clone, Copy)]
pub struct SystemDiscovery {
    os: HostOs,
    timeout: Duration,
}

impl SystemDiscovery {
    pub fn new(os: HostOs, timeout: Duration) -> Self {
        Self { os, timeout }
    }
}

#[async_trait]
impl Discovery for SystemDiscovery {
    async fn discover(&self) -> PrintResult<Vec<DiscoveredPrinter>> {
        match self.os {
            #[cfg(windows)]
            HostOs::Windows => {
                let task = tokio::task::spawn_blocking(win32::enumerate);
                tokio::time::timeout(self.timeout, task)
                    .await
                    .map_err(|_| {
                        tracing::warn!(timeout = ?self.timeout, "printer enumeration timed out");
                        PrintError::Timeout {
                            transport: TransportKind::Spooler,
                            after: self.timeout,
                        }
                    })?
                    .map_err(|e| PrintError::Configuration(format!("discovery task failed: {e}")))?
            }
            #[cfg(not(windows))]
            HostOs::Windows => Ok(Vec::new()),
            HostOs::Linux => cups::discover(true, self.timeout).await,
            HostOs::MacOs => cups::discover(false, self.timeout).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_discovery() {
        let printer = DiscoveredPrinter {
            display_name: "EPSON TM-T20X".to_string(),
            device_reference: "USB001".to_string(),
            status: PrinterStatus::Ready,
            is_default: true,
        };
        let discovery = StaticDiscovery::new(vec![printer.clone()]);
        assert_eq!(discovery.discover().await.unwrap(), vec![printer]);
    }

    #[test]
    fn test_status_serialization() {
        assert_eq!(
            serde_json::to_string(&PrinterStatus::Offline).unwrap(),
            "\"offline\""
        );
    }
}
