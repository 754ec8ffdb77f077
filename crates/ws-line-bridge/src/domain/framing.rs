//! Newline-delimited reframing between the byte stream and WebSocket messages.
//!
//! The backend speaks raw TCP, which has no message boundaries: a single
//! `read()` may return half a line, exactly one line, or several lines plus the
//! start of the next one.  The browser-facing side speaks WebSocket, which
//! delivers whole messages.  This module converts between the two:
//!
//! ```text
//! Backend → Browser:  "a\nb\nc"  →  ["a", "b"]   ("c" stays buffered)
//! Browser → Backend:  "hello"    →  b"hello\n"
//! ```
//!
//! # Limitations
//!
//! - The delimiter cannot be escaped.  A browser message containing `\n` is
//!   seen by the backend as more than one line.
//! - The accumulator has no size cap.  A backend that never sends `\n` makes
//!   it grow without bound.

/// The byte that terminates one unit on the stream side.
pub const DELIMITER: u8 = b'\n';

/// Buffers stream bytes until complete delimited units are available.
///
/// Bytes are kept raw until a delimiter is seen, so a multi-byte UTF-8
/// character split across two reads is decoded correctly once the unit is
/// complete.
///
/// # Example
///
/// ```rust
/// use ws_line_bridge::domain::LineAccumulator;
///
/// let mut acc = LineAccumulator::new();
/// assert_eq!(acc.push(b"a\nb\nc"), vec!["a".to_string(), "b".to_string()]);
/// assert_eq!(acc.pending(), b"c");
/// assert_eq!(acc.push(b"\n"), vec!["c".to_string()]);
/// assert!(acc.is_empty());
/// ```
#[derive(Debug, Default, Clone)]
pub struct LineAccumulator {
    buf: Vec<u8>,
}

impl LineAccumulator {
    /// Creates an empty accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `chunk` and returns every unit completed by it, in order.
    ///
    /// Each unit is the span before a delimiter, decoded as UTF-8 (lossily)
    /// and trimmed with [`trim_unit`].  Empty units are returned as empty
    /// strings.  The trailing incomplete remainder stays buffered.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        // The retained remainder never contains a delimiter, so only the new
        // bytes need scanning.
        let scan_from = self.buf.len();
        self.buf.extend_from_slice(chunk);

        let mut units = Vec::new();
        let mut start = 0;
        let mut cursor = scan_from;
        while let Some(offset) = self.buf[cursor..].iter().position(|&b| b == DELIMITER) {
            let end = cursor + offset;
            units.push(decode_unit(&self.buf[start..end]));
            start = end + 1;
            cursor = start;
        }

        // Drop the consumed spans in one move rather than once per unit.
        self.buf.drain(..start);
        units
    }

    /// Returns the buffered bytes that do not yet form a complete unit.
    pub fn pending(&self) -> &[u8] {
        &self.buf
    }

    /// Number of buffered bytes.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Returns `true` when no partial unit is buffered.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Discards any buffered partial unit.
    pub fn clear(&mut self) {
        self.buf.clear();
    }
}

/// Strips leading and trailing whitespace from a unit.
///
/// The whitespace set is Unicode `White_Space` plus U+FEFF (zero-width
/// no-break space / BOM), which covers `\r` from CRLF-terminated backends.
pub fn trim_unit(unit: &str) -> &str {
    unit.trim_matches(|c: char| c.is_whitespace() || c == '\u{feff}')
}

/// Builds the bytes written to the stream side for one browser message.
///
/// The payload is forwarded verbatim (no trimming, no re-encoding) followed by
/// exactly one [`DELIMITER`].
pub fn frame_outbound(payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(payload.len() + 1);
    out.extend_from_slice(payload);
    out.push(DELIMITER);
    out
}

fn decode_unit(raw: &[u8]) -> String {
    trim_unit(&String::from_utf8_lossy(raw)).to_string()
}

// ── Tests ─────────────────────────────────────────────────────────────────────
