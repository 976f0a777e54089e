//! # Wire Error Classification
//!
//! This module provides `WireError`, the typed payload attached to every
//! error surfaced by the serialization engine. Errors propagate as
//! `eyre::Report`; callers that need to branch on the failure class
//! downcast to `WireError` and inspect its kind.
//!
//! ## Error Kinds
//!
//! | Kind | Meaning |
//! |------|---------|
//! | RangeViolation | integer pull target too narrow for the stored value |
//! | TypeMismatch | scalar token cannot be coerced to the requested type |
//! | Truncation | fewer bytes available than a measured record requires |
//! | UnterminatedRecord | closing brace/bracket missing |
//! | UnknownTypeTag | type tag not resolvable through the alias registry |
//! | PayloadTooLarge | document payload exceeds the 30-bit length limit |
//! | HeaderAcquireTimeout | header CAS contended past the configured timeout |
//! | IoFailure | underlying buffer error (mmap fault, capacity exhausted) |
//!
//! ## Diagnostics
//!
//! Every `WireError` carries the byte offset at which it was detected and a
//! quoted excerpt of the surrounding bytes, bounded to 256 bytes. Control
//! and non-ASCII bytes in the excerpt are rendered as `\xHH` so the message
//! stays printable regardless of the encoding being read.
//!
//! ## Usage Example
//!
//! ```ignore
//! let err = wire.read("VALUE")?.i16().unwrap_err();
//! let we = err.downcast_ref::<WireError>().unwrap();
//! assert_eq!(we.kind, WireErrorKind::RangeViolation);
//! ```

use eyre::Report;

/// Maximum number of surrounding bytes quoted in an error excerpt.
pub const EXCERPT_LIMIT: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WireErrorKind {
    RangeViolation,
    TypeMismatch,
    Truncation,
    UnterminatedRecord,
    UnknownTypeTag,
    PayloadTooLarge,
    HeaderAcquireTimeout,
    IoFailure,
}

impl WireErrorKind {
    pub fn name(&self) -> &'static str {
        match self {
            WireErrorKind::RangeViolation => "range violation",
            WireErrorKind::TypeMismatch => "type mismatch",
            WireErrorKind::Truncation => "truncation",
            WireErrorKind::UnterminatedRecord => "unterminated record",
            WireErrorKind::UnknownTypeTag => "unknown type tag",
            WireErrorKind::PayloadTooLarge => "payload too large",
            WireErrorKind::HeaderAcquireTimeout => "header acquire timeout",
            WireErrorKind::IoFailure => "io failure",
        }
    }
}

#[derive(Debug)]
pub struct WireError {
    pub kind: WireErrorKind,
    pub offset: usize,
    pub excerpt: String,
    pub detail: String,
}

impl WireError {
    pub fn new(kind: WireErrorKind, offset: usize, detail: impl Into<String>) -> Self {
        Self {
            kind,
            offset,
            excerpt: String::new(),
            detail: detail.into(),
        }
    }

    /// Attaches a printable excerpt of the bytes around `offset`.
    ///
    /// `window` is the full buffer the offset indexes into; the excerpt is
    /// clipped to `EXCERPT_LIMIT` bytes centered on the failure position.
    pub fn with_excerpt(mut self, window: &[u8]) -> Self {
        let half = EXCERPT_LIMIT / 2;
        let start = self.offset.saturating_sub(half).min(window.len());
        let end = (self.offset + half).min(window.len());
        self.excerpt = printable(&window[start..end]);
        self
    }
}

impl std::fmt::Display for WireError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} at offset {}: {}",
            self.kind.name(),
            self.offset,
            self.detail
        )?;
        if !self.excerpt.is_empty() {
            write!(f, " near \"{}\"", self.excerpt)?;
        }
        Ok(())
    }
}

impl std::error::Error for WireError {}

/// Builds an `eyre::Report` carrying a `WireError` with an excerpt window.
pub fn wire_err(
    kind: WireErrorKind,
    offset: usize,
    window: &[u8],
    detail: impl Into<String>,
) -> Report {
    Report::new(WireError::new(kind, offset, detail).with_excerpt(window))
}

/// Renders bytes with control and non-ASCII characters as `\xHH`.
fn printable(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len());
    for &b in bytes {
        match b {
            b'"' => out.push_str("\\\""),
            b'\\' => out.push_str("\\\\"),
            b'\n' => out.push_str("\\n"),
            b'\r' => out.push_str("\\r"),
            b'\t' => out.push_str("\\t"),
            0x20..=0x7e => out.push(b as char),
            _ => out.push_str(&format!("\\x{b:02x}")),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_message_includes_kind_offset_and_detail() {
        let e = WireError::new(WireErrorKind::RangeViolation, 17, "int16 cannot hold 70000");
        let msg = e.to_string();
        assert!(msg.contains("range violation"));
        assert!(msg.contains("offset 17"));
        assert!(msg.contains("70000"));
    }

    #[test]
    fn excerpt_is_bounded_and_printable() {
        let window = vec![0xffu8; 1024];
        let e = WireError::new(WireErrorKind::Truncation, 512, "short read").with_excerpt(&window);
        assert!(e.excerpt.len() <= EXCERPT_LIMIT * 4);
        assert!(e.excerpt.starts_with("\\xff"));
    }

    #[test]
    fn excerpt_near_buffer_edges_does_not_panic() {
        let window = b"abc";
        let e = WireError::new(WireErrorKind::TypeMismatch, 0, "x").with_excerpt(window);
        assert_eq!(e.excerpt, "abc");
        let e = WireError::new(WireErrorKind::TypeMismatch, 999, "x").with_excerpt(window);
        assert_eq!(e.excerpt, "");
    }

    #[test]
    fn downcast_through_report_preserves_kind() {
        let report = wire_err(WireErrorKind::PayloadTooLarge, 4, b"....", "too big");
        let we = report.downcast_ref::<WireError>().unwrap();
        assert_eq!(we.kind, WireErrorKind::PayloadTooLarge);
    }
}
