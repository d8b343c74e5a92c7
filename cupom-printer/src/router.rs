//! Transport selection
//!
//! Pure decision table from (host OS, device reference shape) to the
//! delivery mechanism. No I/O happens here.

use std::fmt;

use serde::Serialize;

use crate::device::{DeviceReference, is_virtual_usb_port};
use crate::error::{PrintError, PrintResult};
use crate::resolver::ResolvedTarget;

/// Operating system families with a print path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HostOs {
    Windows,
    Linux,
    MacOs,
}

impl HostOs {
    /// The OS this binary was compiled for
    pub fn current() -> PrintResult<Self> {
        Self::from_target(std::env::consts::OS)
    }

    /// Map a `std::env::consts::OS` value
    pub fn from_target(os: &str) -> PrintResult<Self> {
        match os {
            "windows" => Ok(Self::Windows),
            "linux" => Ok(Self::Linux),
            "macos" => Ok(Self::MacOs),
            other => Err(PrintError::Configuration(format!(
                "no print transport for operating system: {other}"
            ))),
        }
    }
}

/// Delivery mechanism for one job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportKind {
    /// Raw TCP socket
    Socket,
    /// Windows spooler, RAW datatype, chunked
    Spooler,
    /// Direct write to a device node or serial port
    DirectFile,
    /// CUPS-style named queue
    Queue,
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Socket => "socket",
            Self::Spooler => "spooler",
            Self::DirectFile => "direct",
            Self::Queue => "queue",
        })
    }
}

/// Pick the transport for a resolved target.
///
/// `stored` is the reference as configured; `target` is what the resolver
/// made of it. Virtual USB port labels (`USB001`) always go through the
/// spooler and need a display name to open the queue by.
pub fn route(
    os: HostOs,
    stored: &DeviceReference,
    target: &ResolvedTarget,
) -> PrintResult<TransportKind> {
    let reference = &target.reference;

    if matches!(reference, DeviceReference::Network(_)) {
        return Ok(TransportKind::Socket);
    }

    match os {
        HostOs::Windows => {
            let virtual_usb = [stored, reference]
                .iter()
                .any(|r| matches!(r, DeviceReference::Queue(name) if is_virtual_usb_port(name)));
            if virtual_usb && target.display_name.is_none() {
                return Err(PrintError::Configuration(format!(
                    "virtual USB port {reference} has no printer name to open through the spooler"
                )));
            }
            Ok(TransportKind::Spooler)
        }
        HostOs::Linux => match reference {
            r if r.is_device_path() => Ok(TransportKind::DirectFile),
            DeviceReference::Queue(_) => Ok(TransportKind::Queue),
            other => Err(PrintError::Configuration(format!(
                "reference {other} cannot be delivered on linux"
            ))),
        },
        HostOs::MacOs => Ok(TransportKind::Queue),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::Confidence;

    fn target(raw: &str, display_name: Option<&str>) -> (DeviceReference, ResolvedTarget) {
        let reference = DeviceReference::classify(raw).unwrap();
        let target = ResolvedTarget {
            display_name: display_name.map(str::to_string),
            reference: reference.clone(),
            confidence: Confidence::Exact,
        };
        (reference, target)
    }

    #[test]
    fn test_network_always_socket() {
        let (stored, t) = target("192.168.1.50:9100", None);
        for os in [HostOs::Windows, HostOs::Linux, HostOs::MacOs] {
            assert_eq!(route(os, &stored, &t).unwrap(), TransportKind::Socket);
        }
    }

    #[test]
    fn test_windows_spooler() {
        for raw in ["COM3", "EPSON TM-T20", "/dev/usb/lp0"] {
            let (stored, t) = target(raw, Some("EPSON TM-T20"));
            assert_eq!(
                route(HostOs::Windows, &stored, &t).unwrap(),
                TransportKind::Spooler
            );
        }
    }

    #[test]
    fn test_windows_virtual_usb_needs_name() {
        let (stored, t) = target("USB001", Some("Caixa"));
        assert_eq!(
            route(HostOs::Windows, &stored, &t).unwrap(),
            TransportKind::Spooler
        );

        let (stored, t) = target("USB001", None);
        let err = route(HostOs::Windows, &stored, &t).unwrap_err();
        assert!(matches!(err, PrintError::Configuration(_)));
    }

    #[test]
    fn test_linux_table() {
        let (stored, t) = target("/dev/usb/lp0", None);
        assert_eq!(
            route(HostOs::Linux, &stored, &t).unwrap(),
            TransportKind::DirectFile
        );

        let (stored, t) = target("Caixa_1", None);
        assert_eq!(route(HostOs::Linux, &stored, &t).unwrap(), TransportKind::Queue);

        let (stored, t) = target("COM3", None);
        assert!(route(HostOs::Linux, &stored, &t).is_err());

        let (stored, t) = target("/tmp/receipt.bin", None);
        assert!(route(HostOs::Linux, &stored, &t).is_err());
    }

    #[test]
    fn test_macos_queue() {
        for raw in ["Caixa", "/dev/cu.usbserial", "COM1"] {
            let (stored, t) = target(raw, None);
            assert_eq!(route(HostOs::MacOs, &stored, &t).unwrap(), TransportKind::Queue);
        }
    }

    #[test]
    fn test_unsupported_os() {
        assert!(matches!(
            HostOs::from_target("freebsd"),
            Err(PrintError::Configuration(_))
        ));
    }
}
