//! Print job service
//!
//! Entry point for callers: one job is resolved, routed, sanitized, framed
//! and delivered per call. Nothing is carried over between calls; each job
//! sees a fresh discovery snapshot.

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, instrument, warn};

use crate::config::PrinterConfig;
use crate::device::DeviceReference;
use crate::discovery::{DiscoveredPrinter, Discovery, SystemDiscovery};
use crate::encoding::sanitize;
use crate::error::{PrintError, PrintResult};
use crate::escpos::CommandBuffer;
use crate::profile::PrinterProfile;
use crate::resolver::{ResolvedTarget, auto_select, resolve};
use crate::router::{HostOs, TransportKind, route};
use crate::transport::{DirectPortPrinter, DirectTarget, NetworkPrinter, Printer, QueuePrinter};

/// One already-rendered job
#[derive(Debug, Clone)]
pub struct PrintRequest {
    pub payload: Vec<u8>,
    /// Printer type tag, e.g. `EPSON_TM_T20X`
    pub printer_type: String,
    /// Stored device reference; empty selects a printer automatically
    pub device_reference: String,
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct JobReport {
    /// Framed bytes handed to the transport
    pub bytes: usize,
    pub transport: TransportKind,
    pub target: ResolvedTarget,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConnectionReport {
    pub reachable: bool,
    pub transport: TransportKind,
    pub target: ResolvedTarget,
}

/// Resolved destination for one call
struct Destination {
    profile: &'static PrinterProfile,
    target: ResolvedTarget,
    transport: TransportKind,
    #[cfg_attr(not(windows), allow(dead_code))]
    discovered: Vec<DiscoveredPrinter>,
}

/// Concrete COM port the spooler queue named by `target` prints to.
///
/// Only a port reported by discovery for that same printer counts; virtual
/// USB port labels never do.
pub fn concrete_com_port(discovered: &[DiscoveredPrinter], target: &ResolvedTarget) -> Option<String> {
    let name = target.display_name.as_deref()?;
    discovered
        .iter()
        .filter(|p| p.display_name.eq_ignore_ascii_case(name))
        .find_map(|p| match DeviceReference::classify(&p.device_reference) {
            Ok(DeviceReference::ComPort(port)) => Some(port),
            _ => None,
        })
}

pub struct PrintService {
    config: PrinterConfig,
    discovery: Arc<dyn Discovery>,
    os: HostOs,
}

impl PrintService {
    /// Service for the host OS using system discovery
    pub fn new(config: PrinterConfig) -> PrintResult<Self> {
        let os = HostOs::current()?;
        let discovery = SystemDiscovery::new(os, config.connect_timeout);
        Ok(Self::with_discovery(config, os, Arc::new(discovery)))
    }

    pub fn with_discovery(config: PrinterConfig, os: HostOs, discovery: Arc<dyn Discovery>) -> Self {
        Self {
            config,
            discovery,
            os,
        }
    }

    pub fn os(&self) -> HostOs {
        self.os
    }

    /// Discovery snapshot for resolution; a failed discovery resolves
    /// against an empty list
    async fn snapshot(&self) -> Vec<DiscoveredPrinter> {
        match self.discovery.discover().await {
            Ok(printers) => printers,
            Err(e) => {
                warn!(error = %e, "discovery failed, resolving without it");
                Vec::new()
            }
        }
    }

    async fn locate(
        &self,
        printer_type: &str,
        device_reference: &str,
        display_name: Option<&str>,
    ) -> PrintResult<Destination> {
        let profile = PrinterProfile::lookup(printer_type);
        let stored = device_reference.trim();

        let (stored_ref, target, discovered) = if stored.is_empty() {
            let discovered = self.snapshot().await;
            let target = auto_select(&discovered).ok_or_else(|| {
                PrintError::Resolution("no printer configured and none discovered".into())
            })?;
            (target.reference.clone(), target, discovered)
        } else {
            let classified = DeviceReference::classify(stored);
            // Addresses are used as given
            let discovered = match classified {
                Ok(DeviceReference::Network(_)) => Vec::new(),
                _ => self.snapshot().await,
            };
            let target = resolve(stored, display_name, &discovered)?;
            let stored_ref = classified.unwrap_or_else(|_| target.reference.clone());
            (stored_ref, target, discovered)
        };

        let transport = route(self.os, &stored_ref, &target)?;
        if profile.is_virtual && transport == TransportKind::DirectFile {
            return Err(PrintError::Configuration(format!(
                "virtual printer type {} cannot be written to {}",
                profile.tag, target.reference
            )));
        }

        info!(
            profile = profile.tag,
            %transport,
            target = %target.reference,
            confidence = ?target.confidence,
            "printer located"
        );

        Ok(Destination {
            profile,
            target,
            transport,
            discovered,
        })
    }

    /// Sanitize, frame and send one job
    #[instrument(skip(self, request), fields(
        printer_type = %request.printer_type,
        reference = %request.device_reference,
        payload_len = request.payload.len(),
    ))]
    pub async fn print_job(&self, request: &PrintRequest) -> PrintResult<JobReport> {
        let dest = self
            .locate(
                &request.printer_type,
                &request.device_reference,
                request.display_name.as_deref(),
            )
            .await?;

        let sanitized = sanitize(&request.payload, dest.profile.aggressive_sanitization);
        let job = CommandBuffer::frame(&sanitized.bytes, sanitized.report.transcoded > 0);

        self.deliver(&dest, job.as_bytes()).await?;

        info!(bytes = job.len(), "job delivered");
        Ok(JobReport {
            bytes: job.len(),
            transport: dest.transport,
            target: dest.target,
        })
    }

    /// Resolve and route without printing, then probe the target
    #[instrument(skip(self))]
    pub async fn test_connection(
        &self,
        printer_type: &str,
        device_reference: &str,
        display_name: Option<&str>,
    ) -> PrintResult<ConnectionReport> {
        let dest = self
            .locate(printer_type, device_reference, display_name)
            .await?;
        let timeout = self.config.connect_timeout;
        let target = &dest.target;

        let reachable = match dest.transport {
            TransportKind::Socket => match target.reference.socket_addr() {
                Some(addr) => NetworkPrinter::new(addr).with_timeout(timeout).is_online().await,
                None => false,
            },
            TransportKind::Queue => {
                QueuePrinter::new(&target.queue_name(), timeout, self.config.queue_staging_delay)
                    .is_online()
                    .await
            }
            TransportKind::DirectFile => match target.reference.as_path() {
                Some(path) => {
                    DirectPortPrinter::new(
                        DirectTarget::Path(path.to_path_buf()),
                        self.config.serial,
                        timeout,
                    )
                    .is_online()
                    .await
                }
                None => false,
            },
            TransportKind::Spooler => self.spooler_online(target).await,
        };

        Ok(ConnectionReport {
            reachable,
            transport: dest.transport,
            target: dest.target,
        })
    }

    /// Printers the host currently knows about
    pub async fn list_printers(&self) -> PrintResult<Vec<DiscoveredPrinter>> {
        self.discovery.discover().await
    }

    async fn deliver(&self, dest: &Destination, data: &[u8]) -> PrintResult<()> {
        let target = &dest.target;
        let job_timeout = self.config.job_timeout;

        match dest.transport {
            TransportKind::Socket => {
                let addr = target.reference.socket_addr().ok_or_else(|| {
                    PrintError::Configuration(format!("{} is not a network address", target.reference))
                })?;
                NetworkPrinter::new(addr)
                    .with_timeout(self.config.connect_timeout)
                    .with_write_timeout(job_timeout)
                    .print(data)
                    .await
            }
            TransportKind::Queue => {
                QueuePrinter::new(
                    &target.queue_name(),
                    job_timeout,
                    self.config.queue_staging_delay,
                )
                .print(data)
                .await
            }
            TransportKind::DirectFile => {
                let path = target.reference.as_path().ok_or_else(|| {
                    PrintError::Configuration(format!("{} is not a device path", target.reference))
                })?;
                DirectPortPrinter::new(
                    DirectTarget::Path(path.to_path_buf()),
                    self.config.serial,
                    job_timeout,
                )
                .print(data)
                .await
            }
            TransportKind::Spooler => self.deliver_spooler(dest, data).await,
        }
    }

    #[cfg(windows)]
    async fn deliver_spooler(&self, dest: &Destination, data: &[u8]) -> PrintResult<()> {
        use crate::transport::SpoolerPrinter;

        let queue = dest.target.queue_name();
        let spooled = SpoolerPrinter::new(&queue, self.config.spool, self.config.job_timeout)
            .print(data)
            .await;

        let Err(spool_error) = spooled else {
            return Ok(());
        };
        if !self.config.direct_fallback {
            return Err(spool_error);
        }
        let Some(port) = concrete_com_port(&dest.discovered, &dest.target) else {
            return Err(spool_error);
        };

        warn!(queue = %queue, port = %port, error = %spool_error, "spooler failed, writing to port directly");
        let direct = DirectPortPrinter::new(
            DirectTarget::Com(port),
            self.config.serial,
            self.config.job_timeout,
        );
        match direct.print(data).await {
            Ok(()) => Ok(()),
            Err(e) => {
                warn!(error = %e, "direct port fallback failed");
                Err(spool_error)
            }
        }
    }

    #[cfg(not(windows))]
    async fn deliver_spooler(&self, dest: &Destination, _data: &[u8]) -> PrintResult<()> {
        Err(PrintError::Configuration(format!(
            "spooler queue {} is only reachable from a Windows build",
            dest.target.queue_name()
        )))
    }

    #[cfg(windows)]
    async fn spooler_online(&self, target: &ResolvedTarget) -> bool {
        use crate::transport::SpoolerPrinter;

        SpoolerPrinter::new(
            &target.queue_name(),
            self.config.spool,
            self.config.connect_timeout,
        )
        .is_online()
        .await
    }

    #[cfg(not(windows))]
    async fn spooler_online(&self, _target: &ResolvedTarget) -> bool {
        false
    }
}
