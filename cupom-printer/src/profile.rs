//! Printer type registry
//!
//! Maps the logical printer-type tags stored by the application
//! (vendor + model strings) to the protocol family and sanitization rules
//! the pipeline applies.

use serde::Serialize;

/// Command protocol family spoken by a printer model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProtocolFamily {
    /// Epson-compatible ESC/POS
    EscPos,
    /// Star Micronics in ESC/POS emulation
    StarEscPos,
    /// Cash-register class printers with small receive buffers
    Authenticating,
}

/// Static description of a printer model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PrinterProfile {
    pub tag: &'static str,
    pub family: ProtocolFamily,
    /// Strip raster bitmap blocks before sending
    pub aggressive_sanitization: bool,
    /// Print-to-file/PDF style printer with no physical device node
    pub is_virtual: bool,
}

const fn physical(tag: &'static str, family: ProtocolFamily, aggressive: bool) -> PrinterProfile {
    PrinterProfile {
        tag,
        family,
        aggressive_sanitization: aggressive,
        is_virtual: false,
    }
}

/// Profile used for unknown tags
pub const DEFAULT_PROFILE: PrinterProfile =
    physical("GENERICA_ESCPOS", ProtocolFamily::EscPos, false);

const PROFILES: &[PrinterProfile] = &[
    DEFAULT_PROFILE,
    physical("EPSON_TM_T20", ProtocolFamily::EscPos, false),
    physical("EPSON_TM_T20X", ProtocolFamily::EscPos, false),
    physical("EPSON_TM_T88", ProtocolFamily::EscPos, false),
    physical("EPSON_TM_T81", ProtocolFamily::EscPos, false),
    physical("BEMATECH_MP4200", ProtocolFamily::EscPos, false),
    physical("ELGIN_I9", ProtocolFamily::EscPos, false),
    physical("ELGIN_I7", ProtocolFamily::EscPos, false),
    physical("STAR_TSP100", ProtocolFamily::StarEscPos, false),
    physical("STAR_TSP143", ProtocolFamily::StarEscPos, false),
    physical("DARUMA_DR700", ProtocolFamily::Authenticating, true),
    physical("DARUMA_DR800", ProtocolFamily::Authenticating, true),
    physical("DIEBOLD_IM113", ProtocolFamily::Authenticating, true),
    physical("DIEBOLD_IM453", ProtocolFamily::Authenticating, true),
    physical("DIEBOLD_TSP143", ProtocolFamily::Authenticating, true),
    PrinterProfile {
        tag: "VIRTUAL_PDF",
        family: ProtocolFamily::EscPos,
        aggressive_sanitization: false,
        is_virtual: true,
    },
];

impl PrinterProfile {
    /// Look up a profile by tag (case-insensitive, surrounding blanks ignored).
    ///
    /// Unknown or empty tags fall back to [`DEFAULT_PROFILE`].
    pub fn lookup(tag: &str) -> &'static PrinterProfile {
        let tag = tag.trim();
        PROFILES
            .iter()
            .find(|p| p.tag.eq_ignore_ascii_case(tag))
            .unwrap_or(&DEFAULT_PROFILE)
    }

    /// All registered profiles
    pub fn all() -> &'static [PrinterProfile] {
        PROFILES
    }

    /// Whether `tag` names a registered profile
    pub fn is_known(tag: &str) -> bool {
        let tag = tag.trim();
        PROFILES.iter().any(|p| p.tag.eq_ignore_ascii_case(tag))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_known() {
        let p = PrinterProfile::lookup("DIEBOLD_IM453");
        assert_eq!(p.family, ProtocolFamily::Authenticating);
        assert!(p.aggressive_sanitization);
        assert!(!p.is_virtual);
    }

    #[test]
    fn test_lookup_case_insensitive() {
        assert_eq!(PrinterProfile::lookup(" epson_tm_t20 ").tag, "EPSON_TM_T20");
    }

    #[test]
    fn test_unknown_falls_back() {
        assert_eq!(PrinterProfile::lookup("ACME_9000"), &DEFAULT_PROFILE);
        assert_eq!(PrinterProfile::lookup(""), &DEFAULT_PROFILE);
        assert!(!PrinterProfile::is_known("ACME_9000"));
    }

    #[test]
    fn test_tags_unique() {
        let all = PrinterProfile::all();
        for (i, a) in all.iter().enumerate() {
            assert!(all[i + 1..].iter().all(|b| !b.tag.eq_ignore_ascii_case(a.tag)));
        }
    }
}
