//! Stored reference resolution
//!
//! Device references saved by the application go stale: COM numbers move,
//! USB ports re-enumerate, queues get renamed. Every job re-resolves its
//! stored reference against what discovery sees right now, following a
//! fixed precedence:
//!
//! 1. exact device-reference match
//! 2. exact display-name match (case-insensitive)
//! 3. substring match in either direction against device references
//! 4. shape recovery (COM number search, writable device path, network)
//! 5. pass-through of anything that still looks like a queue name
//!
//! The first step that succeeds wins. Callers rely on this order being
//! stable, so no step may be reordered or made fuzzier.

use std::path::Path;

use serde::Serialize;
use tracing::{debug, instrument};

use crate::device::{DeviceReference, com_number, mentions_com_port};
use crate::discovery::{DiscoveredPrinter, PrinterStatus};
use crate::error::{PrintError, PrintResult};

/// Shortest string allowed to take part in a substring match
const MIN_PARTIAL_LEN: usize = 3;

/// How the target was found
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    Exact,
    NameMatch,
    PartialMatch,
    HeuristicPassThrough,
}

/// Where a job is going, recomputed per job
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedTarget {
    /// System queue / display name, when known
    pub display_name: Option<String>,
    #[serde(serialize_with = "serialize_reference")]
    pub reference: DeviceReference,
    pub confidence: Confidence,
}

fn serialize_reference<S: serde::Serializer>(
    reference: &DeviceReference,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.collect_str(reference)
}

impl ResolvedTarget {
    fn from_discovered(printer: &DiscoveredPrinter, confidence: Confidence) -> Self {
        // Spooler port names such as `LPT1:` are not references in their own
        // right; the printer is then addressed by its queue name.
        let reference = DeviceReference::classify(&printer.device_reference)
            .unwrap_or_else(|_| DeviceReference::Queue(printer.display_name.clone()));
        Self {
            display_name: Some(printer.display_name.clone()),
            reference,
            confidence,
        }
    }

    /// Name to open a system queue by: the display name, else the reference
    pub fn queue_name(&self) -> String {
        self.display_name
            .clone()
            .unwrap_or_else(|| self.reference.to_string())
    }
}

/// Whether the current process may open `path` for writing
pub fn can_write(path: &Path) -> bool {
    std::fs::OpenOptions::new().write(true).open(path).is_ok()
}

/// Resolve with the real filesystem write probe
pub fn resolve(
    stored: &str,
    display_name: Option<&str>,
    discovered: &[DiscoveredPrinter],
) -> PrintResult<ResolvedTarget> {
    resolve_with(stored, display_name, discovered, can_write)
}

/// Resolve a stored reference against a discovery snapshot.
///
/// `writable` decides whether a device path is usable.
#[instrument(skip(discovered, writable), fields(discovered = discovered.len()))]
pub fn resolve_with(
    stored: &str,
    display_name: Option<&str>,
    discovered: &[DiscoveredPrinter],
    writable: impl Fn(&Path) -> bool,
) -> PrintResult<ResolvedTarget> {
    let stored = stored.trim();
    let display_name = display_name.map(str::trim).filter(|n| !n.is_empty());

    // 1. exact device reference
    if let Some(p) = discovered
        .iter()
        .find(|p| !stored.is_empty() && p.device_reference == stored)
    {
        debug!(printer = %p.display_name, "exact reference match");
        return Ok(ResolvedTarget::from_discovered(p, Confidence::Exact));
    }

    // 2. display name, configured name first
    for name in display_name.into_iter().chain(Some(stored)) {
        if let Some(p) = discovered
            .iter()
            .find(|p| !name.is_empty() && p.display_name.eq_ignore_ascii_case(name))
        {
            debug!(printer = %p.display_name, "display name match");
            return Ok(ResolvedTarget::from_discovered(p, Confidence::NameMatch));
        }
    }

    // 3. substring either direction
    if stored.len() >= MIN_PARTIAL_LEN {
        let needle = stored.to_lowercase();
        if let Some(p) = discovered.iter().find(|p| {
            let candidate = p.device_reference.to_lowercase();
            candidate.len() >= MIN_PARTIAL_LEN
                && (candidate.contains(&needle) || needle.contains(&candidate))
        }) {
            debug!(printer = %p.display_name, "partial reference match");
            return Ok(ResolvedTarget::from_discovered(p, Confidence::PartialMatch));
        }
    }

    // 4 and 5. shape recovery and pass-through
    let reference = DeviceReference::classify(stored)?;
    let pass_through = |reference: DeviceReference, confidence: Confidence| ResolvedTarget {
        display_name: display_name.map(str::to_string),
        reference,
        confidence,
    };

    match &reference {
        DeviceReference::ComPort(name) => {
            if let Some(n) = com_number(name)
                && let Some(p) = discovered
                    .iter()
                    .find(|p| mentions_com_port(&p.device_reference, n))
            {
                debug!(printer = %p.display_name, port = %name, "COM number match");
                return Ok(ResolvedTarget::from_discovered(p, Confidence::PartialMatch));
            }
            debug!(port = %name, "COM port not discovered, passing through");
            Ok(pass_through(reference.clone(), Confidence::HeuristicPassThrough))
        }
        DeviceReference::DevicePath(path) => {
            if writable(path) {
                Ok(pass_through(reference.clone(), Confidence::Exact))
            } else {
                Err(PrintError::Resolution(format!(
                    "device {} is missing or not writable",
                    path.display()
                )))
            }
        }
        DeviceReference::Network(_) | DeviceReference::Queue(_) => Ok(pass_through(
            reference.clone(),
            Confidence::HeuristicPassThrough,
        )),
    }
}

/// Pick a printer when none is configured: the system default, else the
/// first ready printer, else the first listed.
pub fn auto_select(discovered: &[DiscoveredPrinter]) -> Option<ResolvedTarget> {
    discovered
        .iter()
        .find(|p| p.is_default)
        .or_else(|| {
            discovered
                .iter()
                .find(|p| p.status == PrinterStatus::Ready)
        })
        .or_else(|| discovered.first())
        .map(|p| ResolvedTarget::from_discovered(p, Confidence::HeuristicPassThrough))
}
