//! CUPS queue printer
//!
//! Submits the framed job as a raw file through `lp`. The staged file is
//! removed on a timer after `lp` returns, whatever the outcome.

use std::time::Duration;

use tokio::process::Command;
use tracing::{info, instrument, warn};

use super::Printer;
use super::staging::StagedPayload;
use crate::discovery::PrinterStatus;
use crate::discovery::cups::parse_printer_status;
use crate::error::{PrintError, PrintResult};
use crate::router::TransportKind;

const TRANSPORT: TransportKind = TransportKind::Queue;

#[derive(Debug, Clone)]
pub struct QueuePrinter {
    queue: String,
    timeout: Duration,
    staging_delay: Duration,
}

impl QueuePrinter {
    pub fn new(queue: &str, timeout: Duration, staging_delay: Duration) -> Self {
        Self {
            queue: queue.to_string(),
            timeout,
            staging_delay,
        }
    }

    pub fn queue(&self) -> &str {
        &self.queue
    }

    async fn submit(&self, staged: &StagedPayload) -> PrintResult<()> {
        let mut command = Command::new("lp");
        command
            .arg("-d")
            .arg(&self.queue)
            .args(["-o", "raw"])
            .arg(staged.path())
            .env("LC_ALL", "C")
            .kill_on_drop(true);

        let output = tokio::time::timeout(self.timeout, command.output())
            .await
            .map_err(|_| PrintError::Timeout {
                transport: TRANSPORT,
                after: self.timeout,
            })?
            .map_err(|e| PrintError::transport(TRANSPORT, format!("lp: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(PrintError::transport(
                TRANSPORT,
                format!("lp exited with {}: {}", output.status, stderr.trim()),
            ));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        info!(job = %stdout.trim(), "Job queued");
        Ok(())
    }
}

impl Printer for QueuePrinter {
    #[instrument(skip(self, data), fields(queue = %self.queue, data_len = data.len()))]
    async fn print(&self, data: &[u8]) -> PrintResult<()> {
        let staged = StagedPayload::create(data)?;
        let result = self.submit(&staged).await;
        staged.release_after(self.staging_delay);
        result
    }

    #[instrument(skip(self), fields(queue = %self.queue))]
    async fn is_online(&self) -> bool {
        let mut command = Command::new("lpstat");
        command
            .arg("-p")
            .arg(&self.queue)
            .env("LC_ALL", "C")
            .kill_on_drop(true);

        match tokio::time::timeout(self.timeout, command.output()).await {
            Ok(Ok(output)) if output.status.success() => {
                let stdout = String::from_utf8_lossy(&output.stdout);
                let status = parse_printer_status(&stdout, &self.queue);
                info!(?status, "queue status");
                matches!(status, Some(PrinterStatus::Ready | PrinterStatus::Busy))
            }
            Ok(Ok(output)) => {
                warn!(status = %output.status, "lpstat rejected queue");
                false
            }
            Ok(Err(e)) => {
                warn!(error = %e, "lpstat failed");
                false
            }
            Err(_) => {
                warn!("lpstat timed out");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_queue_is_transport_error() {
        let printer = QueuePrinter::new(
            "cupom-missing-queue",
            Duration::from_secs(10),
            Duration::from_millis(10),
        );

        let err = printer.print(b"\x1b@x").await.unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Transport);
        assert!(!printer.is_online().await);
    }
}
