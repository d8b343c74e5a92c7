//! Printer transports for sending framed jobs
//!
//! Supports:
//! - Network printers (raw TCP, port 9100)
//! - Windows spooler queues (RAW datatype, chunked)
//! - Direct device / serial port writes
//! - CUPS queues through `lp`

pub mod direct;
pub mod network;
pub mod queue;
pub mod spooler;
pub mod staging;

#[cfg(windows)]
pub mod winspool;

pub use direct::{DirectPortPrinter, DirectTarget, SerialSettings};
pub use network::NetworkPrinter;
pub use queue::QueuePrinter;
pub use spooler::{ChunkPlan, RawSpoolWriter, SpoolBackend, SpoolSettings, SpoolState};
pub use staging::StagedPayload;

#[cfg(windows)]
pub use winspool::SpoolerPrinter;

use crate::error::PrintResult;

/// Trait for printer transports
#[allow(async_fn_in_trait)]
pub trait Printer {
    /// Send a complete framed job to the printer
    async fn print(&self, data: &[u8]) -> PrintResult<()>;

    /// Check if the printer is online/reachable
    async fn is_online(&self) -> bool;
}
