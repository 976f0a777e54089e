//! # Document Framing
//!
//! Every document in a buffer is framed by a 4-byte little-endian header:
//!
//! ```text
//! bit 31       NOT_COMPLETE  - writer has not finalized the document
//! bit 30       META_DATA     - document carries metadata, not data
//! bits 29..0   payload length in bytes (0 = length not yet known)
//! ```
//!
//! A buffer is a concatenation of `header + payload` frames and is seek-safe
//! to any header position. End of stream is the well-known word with bits 31
//! and 30 set and length 0.
//!
//! ## Acquisition Protocol
//!
//! Writers sharing a buffer race to claim the next slot by compare-and-swap
//! from `NOT_INITIALIZED` (0) to `NOT_COMPLETE | UNKNOWN_LENGTH`. Exactly
//! one writer wins; losers walk forward past the completed frame, spinning
//! briefly when they encounter a frame still being written. Data documents
//! are numbered in CAS-success order; meta documents are transparent to
//! numbering.
//!
//! ## Invariant
//!
//! For a sealed document at position `p`:
//! `header(p) & LENGTH_MASK == payload_end(p) - p - 4` and bit 31 is clear.

use std::time::{Duration, Instant};

use eyre::Result;

use crate::buffer::Bytes;
use crate::error::{wire_err, WireErrorKind};

pub const LENGTH_MASK: u32 = (1 << 30) - 1;
pub const NOT_COMPLETE: u32 = 1 << 31;
pub const META_DATA: u32 = 1 << 30;
pub const UNKNOWN_LENGTH: u32 = 0;
pub const NOT_INITIALIZED: u32 = 0;
pub const NOT_COMPLETE_UNKNOWN_LENGTH: u32 = NOT_COMPLETE | UNKNOWN_LENGTH;
pub const END_OF_DATA: u32 = NOT_COMPLETE | META_DATA | UNKNOWN_LENGTH;

pub const HEADER_SIZE: usize = 4;

/// Default bound for spinning on a contended header.
pub const DEFAULT_HEADER_TIMEOUT: Duration = Duration::from_secs(2);

#[inline]
pub fn length_of(header: u32) -> usize {
    (header & LENGTH_MASK) as usize
}

#[inline]
pub fn is_ready(header: u32) -> bool {
    header & NOT_COMPLETE == 0
}

#[inline]
pub fn is_not_complete(header: u32) -> bool {
    header & NOT_COMPLETE != 0
}

#[inline]
pub fn is_ready_data(header: u32) -> bool {
    header & (META_DATA | NOT_COMPLETE) == 0
}

#[inline]
pub fn is_data(header: u32) -> bool {
    header & META_DATA == 0
}

#[inline]
pub fn is_ready_meta_data(header: u32) -> bool {
    header & (META_DATA | NOT_COMPLETE) == META_DATA
}

#[inline]
pub fn is_known_length(header: u32) -> bool {
    header & (META_DATA | LENGTH_MASK) != UNKNOWN_LENGTH
}

#[inline]
pub fn is_end_of_stream(header: u32) -> bool {
    header == END_OF_DATA
}

/// Composes a sealed header word, failing when the payload exceeds the
/// 30-bit length limit.
pub fn sealed_header(len: usize, meta: bool) -> Result<u32> {
    if len > LENGTH_MASK as usize {
        return Err(wire_err(
            WireErrorKind::PayloadTooLarge,
            0,
            &[],
            format!("payload of {} bytes exceeds the {} byte limit", len, LENGTH_MASK),
        ));
    }
    Ok(len as u32 | if meta { META_DATA } else { 0 })
}

/// Claims the header slot at `position`, transitioning NOT_INITIALIZED to
/// NOT_COMPLETE. Returns false when another writer already owns the slot.
pub fn try_acquire(bytes: &mut Bytes, position: usize) -> Result<bool> {
    bytes.cas_u32_at(position, NOT_INITIALIZED, NOT_COMPLETE_UNKNOWN_LENGTH)
}

/// Walks frames from `from`, claiming the first unwritten header slot.
///
/// Encountering a frame still being written spins until it seals or the
/// timeout lapses. Returns the claimed header position.
pub fn acquire_next(bytes: &mut Bytes, from: usize, timeout: Duration) -> Result<usize> {
    let deadline = Instant::now() + timeout;
    let mut pos = from;
    loop {
        if pos + HEADER_SIZE > bytes.capacity() {
            return Err(wire_err(
                WireErrorKind::IoFailure,
                pos,
                &[],
                "buffer exhausted while acquiring a header slot",
            ));
        }
        // Unwritten elastic space reads as not-yet-initialized.
        let header = bytes.load_u32_at(pos).unwrap_or(NOT_INITIALIZED);
        if header == NOT_INITIALIZED {
            if try_acquire(bytes, pos)? {
                return Ok(pos);
            }
            // Lost the race; reread and walk past the winner.
            continue;
        }
        if is_not_complete(header) {
            if Instant::now() >= deadline {
                return Err(wire_err(
                    WireErrorKind::HeaderAcquireTimeout,
                    pos,
                    &[],
                    "document header still incomplete after timeout",
                ));
            }
            std::hint::spin_loop();
            continue;
        }
        pos += HEADER_SIZE + length_of(header);
    }
}

/// One frame yielded by [`DocumentCursor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame {
    /// Header position in the buffer.
    pub position: usize,
    /// Payload byte range.
    pub start: usize,
    pub end: usize,
    pub meta: bool,
    /// Index among ready DATA documents; meta documents carry `None`.
    pub number: Option<u64>,
}

/// Iterates the sealed frames of a buffer in position order.
///
/// Stops at the first unwritten or still-incomplete header, or at the
/// end-of-stream sentinel.
#[derive(Debug)]
pub struct DocumentCursor<'a> {
    bytes: &'a Bytes,
    pos: usize,
    next_data_number: u64,
}

impl<'a> DocumentCursor<'a> {
    pub fn new(bytes: &'a Bytes) -> Self {
        Self {
            bytes,
            pos: 0,
            next_data_number: 0,
        }
    }

    pub fn from(bytes: &'a Bytes, pos: usize) -> Self {
        Self {
            bytes,
            pos,
            next_data_number: 0,
        }
    }
}

impl Iterator for DocumentCursor<'_> {
    type Item = Frame;

    fn next(&mut self) -> Option<Frame> {
        if self.pos + HEADER_SIZE > self.bytes.readable_limit() {
            return None;
        }
        let header = self.bytes.load_u32_at(self.pos).ok()?;
        if header == NOT_INITIALIZED || is_end_of_stream(header) || is_not_complete(header) {
            return None;
        }
        let meta = !is_data(header);
        let start = self.pos + HEADER_SIZE;
        let end = start + length_of(header);
        if end > self.bytes.readable_limit() {
            return None;
        }
        let number = if meta {
            None
        } else {
            let n = self.next_data_number;
            self.next_data_number += 1;
            Some(n)
        };
        let frame = Frame {
            position: self.pos,
            start,
            end,
            meta,
            number,
        };
        self.pos = end;
        Some(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_bit_math() {
        assert_eq!(LENGTH_MASK, 0x3fff_ffff);
        assert!(is_ready(0));
        assert!(is_not_complete(NOT_COMPLETE_UNKNOWN_LENGTH));
        assert!(is_ready_data(100));
        assert!(is_ready_meta_data(META_DATA | 8));
        assert!(!is_ready_meta_data(NOT_COMPLETE | META_DATA | 8));
        assert!(is_end_of_stream(END_OF_DATA));
        assert_eq!(length_of(META_DATA | 77), 77);
    }

    #[test]
    fn sealed_header_rejects_oversized_payload() {
        assert_eq!(sealed_header(10, false).unwrap(), 10);
        assert_eq!(sealed_header(10, true).unwrap(), META_DATA | 10);
        let err = sealed_header(LENGTH_MASK as usize + 1, false).unwrap_err();
        let we = err.downcast_ref::<crate::WireError>().unwrap();
        assert_eq!(we.kind, crate::WireErrorKind::PayloadTooLarge);
    }

    #[test]
    fn cursor_numbers_data_frames_only() {
        let mut b = Bytes::elastic();
        // meta(3) "abc", data(2) "xy", data(1) "z"
        b.push(&(META_DATA | 3).to_le_bytes()).unwrap();
        b.push(b"abc").unwrap();
        b.push(&2u32.to_le_bytes()).unwrap();
        b.push(b"xy").unwrap();
        b.push(&1u32.to_le_bytes()).unwrap();
        b.push(b"z").unwrap();

        let frames: Vec<Frame> = DocumentCursor::new(&b).collect();
        assert_eq!(frames.len(), 3);
        assert_eq!(frames[0].number, None);
        assert_eq!(frames[1].number, Some(0));
        assert_eq!(frames[2].number, Some(1));
        assert_eq!(frames[2].start, 4 + 3 + 4 + 2 + 4);
    }

    #[test]
    fn cursor_stops_at_incomplete_frame() {
        let mut b = Bytes::elastic();
        b.push(&2u32.to_le_bytes()).unwrap();
        b.push(b"ok").unwrap();
        b.push(&NOT_COMPLETE_UNKNOWN_LENGTH.to_le_bytes()).unwrap();
        let frames: Vec<Frame> = DocumentCursor::new(&b).collect();
        assert_eq!(frames.len(), 1);
    }

    #[test]
    fn acquire_next_walks_past_sealed_frames() {
        let mut b = Bytes::mapped(std::sync::Arc::new(
            crate::buffer::MappedBytes::anon(4096).unwrap(),
        ));
        b.store_u32_at(0, 8).unwrap();
        let pos = acquire_next(&mut b, 0, Duration::from_millis(50)).unwrap();
        assert_eq!(pos, 12);
        assert_eq!(b.load_u32_at(12).unwrap(), NOT_COMPLETE_UNKNOWN_LENGTH);
    }
}
