//! Sanitizing transcoder for ESC/POS payloads
//!
//! One left-to-right pass over the rendered payload that:
//! - strips alignment commands (ESC a n), which lock up some firmware
//! - strips GS v 0 raster blocks when the printer profile asks for it
//! - rewrites two-byte UTF-8 accented letters into single CP850 bytes
//!
//! The scanner never looks more than one token ahead and never mutates its
//! input. Output bytes keep the order of the source bytes they came from.

use tracing::{debug, instrument};

const ESC: u8 = 0x1B;
const GS: u8 = 0x1D;

/// GS v 0 header: marker (3 bytes) + mode + xL xH yL yH
const RASTER_HEADER_LEN: usize = 8;

/// Accepted GS v 0 modes (normal, double width, double height, quadruple)
const RASTER_MODES: [u8; 8] = [0, 1, 2, 3, 48, 49, 50, 51];

/// Portuguese accented letters (and ordinal/degree signs) in CP850
const CP850: &[(char, u8)] = &[
    ('á', 0xA0),
    ('à', 0x85),
    ('â', 0x83),
    ('ã', 0xC6),
    ('ä', 0x84),
    ('é', 0x82),
    ('è', 0x8A),
    ('ê', 0x88),
    ('ë', 0x89),
    ('í', 0xA1),
    ('ì', 0x8D),
    ('î', 0x8C),
    ('ï', 0x8B),
    ('ó', 0xA2),
    ('ò', 0x95),
    ('ô', 0x93),
    ('õ', 0xE4),
    ('ö', 0x94),
    ('ú', 0xA3),
    ('ù', 0x97),
    ('û', 0x96),
    ('ü', 0x81),
    ('ç', 0x87),
    ('ñ', 0xA4),
    ('Á', 0xB5),
    ('À', 0xB7),
    ('Â', 0xB6),
    ('Ã', 0xC7),
    ('Ä', 0x8E),
    ('É', 0x90),
    ('È', 0xD4),
    ('Ê', 0xD2),
    ('Ë', 0xD3),
    ('Í', 0xD6),
    ('Ì', 0xDE),
    ('Î', 0xD7),
    ('Ï', 0xD8),
    ('Ó', 0xE0),
    ('Ò', 0xE3),
    ('Ô', 0xE2),
    ('Õ', 0xE5),
    ('Ö', 0x99),
    ('Ú', 0xE9),
    ('Ù', 0xEB),
    ('Û', 0xEA),
    ('Ü', 0x9A),
    ('Ç', 0x80),
    ('Ñ', 0xA5),
    ('º', 0xA7),
    ('ª', 0xA6),
    ('°', 0xF8),
];

/// Look up the CP850 byte for a two-byte UTF-8 sequence
fn cp850_for(lead: u8, cont: u8) -> Option<u8> {
    if !(0xC2..=0xC3).contains(&lead) || cont & 0xC0 != 0x80 {
        return None;
    }
    let code = (u32::from(lead & 0x1F) << 6) | u32::from(cont & 0x3F);
    let c = char::from_u32(code)?;
    CP850
        .iter()
        .find_map(|&(from, to)| (from == c).then_some(to))
}

/// What the scanner removed or rewrote
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SanitizeReport {
    pub alignment_stripped: usize,
    pub raster_stripped: usize,
    pub transcoded: usize,
}

/// Sanitizer output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sanitized {
    pub bytes: Vec<u8>,
    pub report: SanitizeReport,
}

/// One recognized token at the current scan position
enum Token {
    /// ESC a n
    Alignment,
    /// Complete GS v 0 block of the given total length
    Raster(usize),
    /// GS v 0 header or data runs past the end of the buffer
    TruncatedRaster,
    /// Two-byte UTF-8 sequence with a CP850 equivalent
    Accented(u8),
    /// Anything else, copied as-is
    Byte(u8),
}

fn next_token(input: &[u8], i: usize) -> Token {
    let rest = &input[i..];

    if rest.len() >= 3 && rest[0] == ESC && rest[1] == b'a' {
        return Token::Alignment;
    }

    if rest.len() >= 3 && rest[0] == GS && rest[1] == b'v' && rest[2] == b'0' {
        if rest.len() < RASTER_HEADER_LEN {
            return Token::TruncatedRaster;
        }
        if RASTER_MODES.contains(&rest[3]) {
            let width_bytes = usize::from(rest[4]) | (usize::from(rest[5]) << 8);
            let height = usize::from(rest[6]) | (usize::from(rest[7]) << 8);
            let total = RASTER_HEADER_LEN + width_bytes * height;
            if total > rest.len() {
                return Token::TruncatedRaster;
            }
            return Token::Raster(total);
        }
    }

    if rest.len() >= 2
        && let Some(b) = cp850_for(rest[0], rest[1])
    {
        return Token::Accented(b);
    }

    Token::Byte(rest[0])
}

/// Sanitize a rendered payload.
///
/// `aggressive` strips raster blocks entirely; otherwise a complete raster
/// block is passed through verbatim, its image data untouched by the other
/// rules. A raster header or block cut off by the end of the buffer is not a
/// block: when aggressive it ends the scan and the remaining bytes are copied
/// through unchanged, otherwise its `GS` byte is copied and scanning goes on.
#[instrument(skip(input), fields(input_len = input.len()))]
pub fn sanitize(input: &[u8], aggressive: bool) -> Sanitized {
    let mut bytes = Vec::with_capacity(input.len());
    let mut report = SanitizeReport::default();
    let mut i = 0;

    while i < input.len() {
        match next_token(input, i) {
            Token::Alignment => {
                report.alignment_stripped += 1;
                i += 3;
            }
            Token::Raster(len) => {
                if aggressive {
                    report.raster_stripped += 1;
                } else {
                    bytes.extend_from_slice(&input[i..i + len]);
                }
                i += len;
            }
            Token::TruncatedRaster if aggressive => {
                bytes.extend_from_slice(&input[i..]);
                break;
            }
            Token::TruncatedRaster => {
                bytes.push(GS);
                i += 1;
            }
            Token::Accented(b) => {
                report.transcoded += 1;
                bytes.push(b);
                i += 2;
            }
            Token::Byte(b) => {
                bytes.push(b);
                i += 1;
            }
        }
    }

    debug!(
        output_len = bytes.len(),
        alignment = report.alignment_stripped,
        raster = report.raster_stripped,
        transcoded = report.transcoded,
        "payload sanitized"
    );

    Sanitized { bytes, report }
}
