//! CUPS discovery (`lpstat`) and Linux device node scan
//!
//! `lpstat` is always run with `LC_ALL=C`; the parsers below only know the
//! C locale wording.

use std::collections::BTreeSet;
use std::ffi::OsStr;
use std::path::Path;
use std::time::Duration;

use tokio::process::Command;
use tracing::{debug, warn};

use super::{DiscoveredPrinter, PrinterStatus};
use crate::error::{PrintError, PrintResult};
use crate::router::TransportKind;

const LPSTAT: &str = "lpstat";

/// Device node families scanned on Linux
const DEVICE_PATTERNS: [(&str, &str); 3] = [
    ("/dev/usb", "lp"),
    ("/dev", "ttyUSB"),
    ("/dev", "ttyACM"),
];

/// Parse `lpstat -p` output into (queue, status) pairs
///
/// ```text
/// printer Caixa is idle.  enabled since Mon 01 Jan 2024
/// printer Cozinha now printing Cozinha-12.  enabled since ...
/// printer Balcao disabled since Mon 01 Jan 2024 -
///         reason unknown
/// ```
pub fn parse_lpstat_printers(output: &str) -> Vec<(String, PrinterStatus)> {
    output
        .lines()
        .filter_map(|line| {
            let rest = line.strip_prefix("printer ")?;
            let (name, state) = rest.split_once(' ').unwrap_or((rest, ""));
            let status = if state.contains("disabled") {
                PrinterStatus::Offline
            } else if state.contains("now printing") {
                PrinterStatus::Busy
            } else if state.contains("is idle") {
                PrinterStatus::Ready
            } else {
                PrinterStatus::Unknown
            };
            Some((name.to_string(), status))
        })
        .collect()
}

/// Status of one queue in `lpstat -p` output
pub fn parse_printer_status(output: &str, queue: &str) -> Option<PrinterStatus> {
    parse_lpstat_printers(output)
        .into_iter()
        .find(|(name, _)| name == queue)
        .map(|(_, status)| status)
}

/// Queue names from `lpstat -v` (`device for NAME: uri`)
pub fn parse_lpstat_devices(output: &str) -> Vec<String> {
    output
        .lines()
        .filter_map(|line| {
            let rest = line.strip_prefix("device for ")?;
            let (name, _uri) = rest.split_once(':')?;
            Some(name.trim().to_string())
        })
        .collect()
}

/// Default queue from `lpstat -d`
pub fn parse_lpstat_default(output: &str) -> Option<String> {
    output
        .lines()
        .find_map(|line| line.strip_prefix("system default destination:"))
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
}

/// Run `lpstat FLAG`. A missing binary is `None`; a hung one is a timeout.
async fn lpstat(program: &OsStr, flag: &str, timeout: Duration) -> PrintResult<Option<String>> {
    let mut command = Command::new(program);
    command.arg(flag).env("LC_ALL", "C").kill_on_drop(true);

    match tokio::time::timeout(timeout, command.output()).await {
        Ok(Ok(output)) => Ok(Some(String::from_utf8_lossy(&output.stdout).into_owned())),
        Ok(Err(e)) => {
            warn!(flag, error = %e, "lpstat unavailable");
            Ok(None)
        }
        Err(_) => {
            warn!(flag, ?timeout, "lpstat timed out");
            Err(PrintError::Timeout {
                transport: TransportKind::Queue,
                after: timeout,
            })
        }
    }
}

/// Printer device nodes present under `/dev`
pub fn scan_device_nodes() -> Vec<String> {
    let mut found = Vec::new();
    for (dir, prefix) in DEVICE_PATTERNS {
        let Ok(entries) = std::fs::read_dir(Path::new(dir)) else {
            continue;
        };
        for entry in entries.flatten() {
            let name = entry.file_name();
            if name.to_string_lossy().starts_with(prefix) {
                found.push(entry.path().to_string_lossy().into_owned());
            }
        }
    }
    found.sort();
    found
}

/// List CUPS queues, plus raw device nodes when `scan_devices` is set.
///
/// A missing `lpstat` is logged and leaves only the device nodes. Each
/// `lpstat` call gets `timeout`; running past it fails the whole discovery.
pub async fn discover(scan_devices: bool, timeout: Duration) -> PrintResult<Vec<DiscoveredPrinter>> {
    discover_with(OsStr::new(LPSTAT), scan_devices, timeout).await
}

async fn discover_with(
    program: &OsStr,
    scan_devices: bool,
    timeout: Duration,
) -> PrintResult<Vec<DiscoveredPrinter>> {
    let mut printers = Vec::new();

    let default = lpstat(program, "-d", timeout)
        .await?
        .as_deref()
        .and_then(parse_lpstat_default);
    let mut seen = BTreeSet::new();

    if let Some(output) = lpstat(program, "-p", timeout).await? {
        for (name, status) in parse_lpstat_printers(&output) {
            seen.insert(name.clone());
            printers.push(DiscoveredPrinter {
                is_default: default.as_deref() == Some(name.as_str()),
                device_reference: name.clone(),
                display_name: name,
                status,
            });
        }
    }

    // Queues with a device but no status line still exist
    if let Some(output) = lpstat(program, "-v", timeout).await? {
        for name in parse_lpstat_devices(&output) {
            if seen.insert(name.clone()) {
                printers.push(DiscoveredPrinter {
                    is_default: default.as_deref() == Some(name.as_str()),
                    device_reference: name.clone(),
                    display_name: name,
                    status: PrinterStatus::Unknown,
                });
            }
        }
    }

    if scan_devices {
        let nodes = tokio::task::spawn_blocking(scan_device_nodes)
            .await
            .unwrap_or_else(|e| {
                warn!(error = %e, "device scan failed");
                Vec::new()
            });
        for path in nodes {
            printers.push(DiscoveredPrinter {
                display_name: path.clone(),
                device_reference: path,
                status: PrinterStatus::Unknown,
                is_default: false,
            });
        }
    }

    debug!(count = printers.len(), "printers discovered");
    Ok(printers)
}
