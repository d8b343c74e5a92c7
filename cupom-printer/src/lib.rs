//! # cupom-printer
//!
//! Thermal receipt printer pipeline: takes an already-rendered ESC/POS
//! payload and gets it onto paper.
//!
//! ## Scope
//!
//! This crate handles HOW a job reaches the printer:
//! - ESC/POS job framing (reset, code page, flush, cut)
//! - Payload sanitizing and CP850 transcoding per printer type
//! - Stored reference resolution against discovered printers
//! - Transport routing per OS: raw TCP, Windows spooler, CUPS queue,
//!   direct device / serial port
//!
//! Receipt layout (WHAT to print) stays in the calling application.
//!
//! ## Example
//!
//! ```ignore
//! use cupom_printer::{PrintRequest, PrintService, PrinterConfig};
//!
//! let service = PrintService::new(PrinterConfig::from_env())?;
//! let report = service
//!     .print_job(&PrintRequest {
//!         payload: b"HELLO".to_vec(),
//!         printer_type: "EPSON_TM_T20X".into(),
//!         device_reference: "192.168.1.50:9100".into(),
//!         display_name: None,
//!     })
//!     .await?;
//! ```

pub mod config;
pub mod device;
pub mod discovery;
pub mod encoding;
pub mod error;
pub mod escpos;
pub mod profile;
pub mod resolver;
pub mod router;
pub mod service;
pub mod transport;

// Re-exports
pub use config::PrinterConfig;
pub use device::DeviceReference;
pub use discovery::{DiscoveredPrinter, Discovery, PrinterStatus, StaticDiscovery, SystemDiscovery};
pub use encoding::{SanitizeReport, Sanitized, sanitize};
pub use error::{ErrorKind, PrintError, PrintResult};
pub use escpos::CommandBuffer;
pub use profile::{PrinterProfile, ProtocolFamily};
pub use resolver::{Confidence, ResolvedTarget, auto_select, resolve};
pub use router::{HostOs, TransportKind, route};
pub use service::{ConnectionReport, JobReport, PrintRequest, PrintService};
pub use transport::{DirectPortPrinter, NetworkPrinter, Printer, QueuePrinter};

#[cfg(windows)]
pub use transport::SpoolerPrinter;
