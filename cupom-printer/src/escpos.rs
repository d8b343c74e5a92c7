//! ESC/POS command framing
//!
//! Fixed command sequences plus the two composition helpers that wrap every
//! job: a reset in front, and a finalize tail (blank lines, buffer flush,
//! cut, trailing feed) at the end.

const ESC: u8 = 0x1B;
const GS: u8 = 0x1D;
const LF: u8 = 0x0A;

/// Blank lines fed before the flush/cut so the last printed line has
/// cleared the head before the cutter fires.
pub const FINALIZE_BLANK_LINES: usize = 3;

/// Initialize printer (ESC @)
pub fn reset() -> [u8; 2] {
    [ESC, b'@']
}

/// Select character code table 2, CP850 (ESC t 2)
pub fn select_code_page_850() -> [u8; 3] {
    [ESC, b't', 0x02]
}

/// Print buffer flush (ESC i)
pub fn buffer_flush() -> [u8; 2] {
    [ESC, b'i']
}

/// Full cut after feed (GS V 66 0)
pub fn full_cut() -> [u8; 4] {
    [GS, b'V', 0x42, 0x00]
}

/// `n` line feeds
pub fn blank_lines(n: usize) -> Vec<u8> {
    vec![LF; n]
}

/// `reset ++ payload`
pub fn prepend_init(payload: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(payload.len() + 2);
    buf.extend_from_slice(&reset());
    buf.extend_from_slice(payload);
    buf
}

/// `payload ++ 3 LF ++ flush ++ cut ++ LF`
///
/// The flush must precede the cut. Authenticating printers cut through
/// buffered content when the order is swapped.
pub fn append_finalize(payload: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(payload.len() + FINALIZE_BLANK_LINES + 7);
    buf.extend_from_slice(payload);
    buf.extend_from_slice(&blank_lines(FINALIZE_BLANK_LINES));
    buf.extend_from_slice(&buffer_flush());
    buf.extend_from_slice(&full_cut());
    buf.extend_from_slice(&blank_lines(1));
    buf
}

/// One complete print job, ready for a writer
///
/// Always starts with the reset sequence. Built once, never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandBuffer {
    bytes: Vec<u8>,
}

impl CommandBuffer {
    /// Frame a sanitized payload as a normal job.
    ///
    /// When `code_page_850` is set the CP850 table select is issued right
    /// after the reset, since the reset restores the firmware default table.
    pub fn frame(payload: &[u8], code_page_850: bool) -> Self {
        let body = if code_page_850 {
            let mut body = Vec::with_capacity(payload.len() + 3);
            body.extend_from_slice(&select_code_page_850());
            body.extend_from_slice(payload);
            body
        } else {
            payload.to_vec()
        };

        Self {
            bytes: append_finalize(&prepend_init(&body)),
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl AsRef<[u8]> for CommandBuffer {
    fn as_ref(&self) -> &[u8] {
        &self.bytes
    }
}
