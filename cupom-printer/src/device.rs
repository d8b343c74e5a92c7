//! Device references
//!
//! A stored device reference is a plain string. Classification into a
//! shape is deterministic and total: every string is exactly one of the
//! variants below, or it is rejected.

use std::fmt;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::path::{Path, PathBuf};

use crate::error::{PrintError, PrintResult};

/// Raw TCP port used when a network reference omits it
pub const DEFAULT_RAW_PORT: u16 = 9100;

/// Root of the device filesystem for direct writes
pub const DEVICE_ROOT: &str = "/dev";

/// Shape of a device reference
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DeviceReference {
    /// Serial port name, normalized to upper case (`COM3`)
    ComPort(String),
    /// Absolute filesystem path (`/dev/usb/lp0`)
    DevicePath(PathBuf),
    /// IPv4 raw socket endpoint
    Network(SocketAddrV4),
    /// System print queue / display name
    Queue(String),
}

impl DeviceReference {
    /// Classify a raw reference string.
    ///
    /// Checked in order: COM name, absolute path, `a.b.c.d[:port]`, queue
    /// name. Queue names may contain letters, digits, spaces and `-_.()`.
    pub fn classify(raw: &str) -> PrintResult<Self> {
        let s = raw.trim();
        if s.is_empty() {
            return Err(PrintError::Resolution("empty device reference".to_string()));
        }

        if let Some(port) = parse_com_port(s) {
            return Ok(Self::ComPort(port));
        }

        if s.starts_with('/') {
            return Ok(Self::DevicePath(PathBuf::from(s)));
        }

        if let Some(addr) = parse_network(s) {
            return Ok(Self::Network(addr));
        }

        if is_queue_name(s) {
            return Ok(Self::Queue(s.to_string()));
        }

        Err(PrintError::Resolution(format!(
            "unrecognized device reference: {s:?}"
        )))
    }

    /// Whether this is a path under the device filesystem root
    pub fn is_device_path(&self) -> bool {
        matches!(self, Self::DevicePath(p) if p.starts_with(DEVICE_ROOT))
    }

    pub fn socket_addr(&self) -> Option<SocketAddr> {
        match self {
            Self::Network(addr) => Some(SocketAddr::V4(*addr)),
            _ => None,
        }
    }

    pub fn as_path(&self) -> Option<&Path> {
        match self {
            Self::DevicePath(p) => Some(p),
            _ => None,
        }
    }
}

impl fmt::Display for DeviceReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ComPort(name) => f.write_str(name),
            Self::DevicePath(path) => write!(f, "{}", path.display()),
            Self::Network(addr) => write!(f, "{addr}"),
            Self::Queue(name) => f.write_str(name),
        }
    }
}

/// `COM<digits>`, optionally prefixed with `\\.\`, returned upper-cased
fn parse_com_port(s: &str) -> Option<String> {
    let s = s.strip_prefix(r"\\.\").unwrap_or(s);
    let prefix = s.get(..3).filter(|p| p.eq_ignore_ascii_case("com"))?;
    let number = &s[prefix.len()..];
    if number.is_empty() || !number.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some(format!("COM{number}"))
}

/// `a.b.c.d:port` or bare `a.b.c.d` (port 9100)
fn parse_network(s: &str) -> Option<SocketAddrV4> {
    let (host, port) = match s.rsplit_once(':') {
        Some((host, port)) => {
            if port.is_empty() || !port.bytes().all(|b| b.is_ascii_digit()) {
                return None;
            }
            let port: u16 = port.parse().ok()?;
            if port == 0 {
                return None;
            }
            (host, port)
        }
        None => (s, DEFAULT_RAW_PORT),
    };

    let octets: Vec<&str> = host.split('.').collect();
    if octets.len() != 4
        || octets
            .iter()
            .any(|o| o.is_empty() || o.len() > 3 || !o.bytes().all(|b| b.is_ascii_digit()))
    {
        return None;
    }
    let ip: Ipv4Addr = host.parse().ok()?;
    Some(SocketAddrV4::new(ip, port))
}

fn is_queue_name(s: &str) -> bool {
    s.chars()
        .all(|c| c.is_alphanumeric() || matches!(c, ' ' | '-' | '_' | '.' | '(' | ')'))
}

/// COM number of a reference, if it has one
pub fn com_number(s: &str) -> Option<u32> {
    parse_com_port(s.trim().trim_end_matches(':')).and_then(|p| p[3..].parse().ok())
}

/// Whether `haystack` mentions `COM<n>` as a whole token (`COM1` does not
/// match inside `COM10`)
pub fn mentions_com_port(haystack: &str, number: u32) -> bool {
    let upper = haystack.to_ascii_uppercase();
    let needle = format!("COM{number}");
    upper.match_indices(&needle).any(|(at, _)| {
        let after = upper[at + needle.len()..].chars().next();
        let before = upper[..at].chars().next_back();
        !after.is_some_and(|c| c.is_ascii_digit())
            && !before.is_some_and(|c| c.is_ascii_alphanumeric())
    })
}

/// Virtual USB port labels assigned by the Windows spooler (`USB001`,
/// `TMUSB002`, `ESDPRT001`). These are not file handles.
pub fn is_virtual_usb_port(port: &str) -> bool {
    let upper = port.trim().trim_end_matches(':').to_ascii_uppercase();
    ["USB", "TMUSB", "ESDPRT"].iter().any(|prefix| {
        upper
            .strip_prefix(prefix)
            .is_some_and(|n| !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()))
    })
}

/// Spooler ports that never reach a physical printer
pub fn is_virtual_spooler_port(port: &str) -> bool {
    let p = port.to_lowercase();
    p == "file:"
        || p == "portprompt:"
        || p == "xpsport:"
        || p.starts_with("onenote")
        || p == "nul:"
        || p.starts_with("wfsport:")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_com() {
        assert_eq!(
            DeviceReference::classify("com7").unwrap(),
            DeviceReference::ComPort("COM7".to_string())
        );
        assert_eq!(
            DeviceReference::classify(r"\\.\COM12").unwrap(),
            DeviceReference::ComPort("COM12".to_string())
        );
        // not a COM name, but a valid queue name
        assert_eq!(
            DeviceReference::classify("COMANDA").unwrap(),
            DeviceReference::Queue("COMANDA".to_string())
        );
    }

    #[test]
    fn test_classify_path() {
        let r = DeviceReference::classify("/dev/usb/lp0").unwrap();
        assert!(r.is_device_path());
        let r = DeviceReference::classify("/tmp/out.bin").unwrap();
        assert!(!r.is_device_path());
        assert!(matches!(r, DeviceReference::DevicePath(_)));
    }

    #[test]
    fn test_classify_network() {
        let r = DeviceReference::classify("192.168.1.50:9100").unwrap();
        assert_eq!(r.socket_addr().unwrap().to_string(), "192.168.1.50:9100");

        let r = DeviceReference::classify("10.0.0.7").unwrap();
        assert_eq!(r.socket_addr().unwrap().port(), DEFAULT_RAW_PORT);
    }

    #[test]
    fn test_classify_bad_network_is_rejected_or_queue() {
        // out-of-range octet with a port: not a queue name either (':')
        assert!(DeviceReference::classify("192.168.1.300:9100").is_err());
        assert!(DeviceReference::classify("192.168.1.5:0").is_err());
        // dotted text without a port is a legal queue name
        assert!(matches!(
            DeviceReference::classify("caixa.1").unwrap(),
            DeviceReference::Queue(_)
        ));
    }

    #[test]
    fn test_classify_queue() {
        assert_eq!(
            DeviceReference::classify("  Impressora Caixa 1 ").unwrap(),
            DeviceReference::Queue("Impressora Caixa 1".to_string())
        );
        assert!(DeviceReference::classify("EPSON TM-T20X (USB)").is_ok());
    }

    #[test]
    fn test_classify_rejects() {
        assert!(DeviceReference::classify("").is_err());
        assert!(DeviceReference::classify("   ").is_err());
        assert!(DeviceReference::classify("printer;rm -rf").is_err());
        assert!(DeviceReference::classify("smb://host/queue").is_err());
    }

    #[test]
    fn test_com_helpers() {
        assert_eq!(com_number("COM7"), Some(7));
        assert_eq!(com_number("com10:"), Some(10));
        assert_eq!(com_number("USB001"), None);

        assert!(mentions_com_port("COM7:", 7));
        assert!(mentions_com_port("Serial on com7", 7));
        assert!(!mentions_com_port("COM17", 7));
        assert!(!mentions_com_port("COM70", 7));
    }

    #[test]
    fn test_virtual_ports() {
        assert!(is_virtual_usb_port("USB001"));
        assert!(is_virtual_usb_port("TMUSB002:"));
        assert!(!is_virtual_usb_port("USB"));
        assert!(!is_virtual_usb_port("COM3"));

        assert!(is_virtual_spooler_port("PORTPROMPT:"));
        assert!(is_virtual_spooler_port("nul:"));
        assert!(!is_virtual_spooler_port("USB001"));
    }
}
