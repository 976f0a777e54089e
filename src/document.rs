//! # Document Contexts
//!
//! Scoped acquisition of a writable or readable document. The writing form
//! stamps a placeholder header with the not-complete bit set, runs the
//! caller's closure against the wire, then back-patches the header with
//! the final length; every exit path releases the slot, and a closure
//! error leaves the document marked not-complete so readers treat it as
//! absent. The reading form binds to the next framed document and always
//! re-synchronizes the cursor to the document end on exit, so a nested
//! read error never corrupts the stream position.
//!
//! ## Compression Hook
//!
//! On a compressed-binary wire, sealing a document whose payload meets the
//! configured threshold rewrites the payload as a single compressed
//! element tagged by codec name; the reading context transparently
//! decompresses such payloads before handing the wire to the closure.
//!
//! ## Raw Wires
//!
//! A raw wire skips framing entirely: writes append bare payloads, and a
//! reading context binds to the whole remaining window.

use std::time::Duration;

use eyre::Result;

use crate::buffer::Bytes;
use crate::framing::{
    self, acquire_next, is_end_of_stream, is_not_complete, length_of, sealed_header,
    DocumentCursor, DEFAULT_HEADER_TIMEOUT, END_OF_DATA, HEADER_SIZE, NOT_INITIALIZED,
};
use crate::wire::Wire;

/// Facts about a document bound by a reading context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DocumentInfo {
    /// Header position.
    pub position: usize,
    pub meta: bool,
    /// Payload bounds (after any transparent decompression, the bounds of
    /// the stored payload; the wire's read window may differ).
    pub start: usize,
    pub end: usize,
}

impl DocumentInfo {
    pub fn is_meta(&self) -> bool {
        self.meta
    }

    pub fn is_data(&self) -> bool {
        !self.meta
    }
}

/// Writes one framed document with the default header timeout.
pub fn write_document<F>(wire: &mut Wire, meta: bool, f: F) -> Result<()>
where
    F: FnOnce(&mut Wire) -> Result<()>,
{
    write_document_timeout(wire, meta, DEFAULT_HEADER_TIMEOUT, f)
}

/// Writes one framed document, spinning at most `timeout` on a contended
/// header slot.
pub fn write_document_timeout<F>(wire: &mut Wire, meta: bool, timeout: Duration, f: F) -> Result<()>
where
    F: FnOnce(&mut Wire) -> Result<()>,
{
    if wire.is_raw() {
        wire.reset_out_state();
        return f(wire);
    }

    let from = wire.bytes().write_pos();
    let header_pos = acquire_next(wire.bytes_mut(), from, timeout)?;
    wire.bytes_mut().set_write_pos(header_pos + HEADER_SIZE);
    wire.reset_out_state();

    // A closure error abandons the document: the not-complete bit stays
    // set and readers treat the slot as absent.
    f(wire)?;

    let mut len = wire.bytes().write_pos() - header_pos - HEADER_SIZE;
    if wire.compresses_documents() && len >= wire_threshold(wire) {
        len = compress_payload(wire, header_pos + HEADER_SIZE, len)?;
    }
    // Mapped stores access header words atomically, so every header must
    // stay 4-aligned; pad the payload with transparent filler.
    if wire.bytes().is_mapped() {
        while len % 4 != 0 {
            match wire {
                Wire::Binary(b) => b.bytes_mut().push_u8(crate::binary::codes::PADDING)?,
                Wire::Text(t) => t.bytes_mut().push_u8(b' ')?,
            }
            len += 1;
        }
    }
    let sealed = sealed_header(len, meta)?;
    wire.bytes_mut().store_u32_at(header_pos, sealed)?;
    Ok(())
}

fn wire_threshold(wire: &Wire) -> usize {
    wire.config().compression_threshold
}

fn compress_payload(wire: &mut Wire, start: usize, len: usize) -> Result<usize> {
    let codec_name = wire.config().compression_codec.name();
    let raw = wire.bytes().slice(start, len)?.to_vec();
    wire.bytes_mut().set_write_pos(start);
    match wire {
        Wire::Binary(b) => b.write_compressed(codec_name, &raw)?,
        Wire::Text(t) => t.write_compressed(codec_name, &raw)?,
    }
    Ok(wire.bytes().write_pos() - start)
}

/// Binds to the next framed document and runs `f` when one is present.
///
/// Returns `None` without advancing when the slot is unwritten, still
/// being written, or holds the end-of-stream sentinel. On `Some`, the read
/// cursor lands past the document whether or not `f` consumed it all.
pub fn read_document<F>(wire: &mut Wire, f: F) -> Result<Option<DocumentInfo>>
where
    F: FnOnce(&mut Wire, &DocumentInfo) -> Result<()>,
{
    if wire.is_raw() {
        let info = DocumentInfo {
            position: wire.bytes().read_pos(),
            meta: false,
            start: wire.bytes().read_pos(),
            end: wire.bytes().readable_limit(),
        };
        wire.reset_in_state();
        f(wire, &info)?;
        return Ok(Some(info));
    }

    let pos = wire.bytes().read_pos();
    if pos + HEADER_SIZE > wire.bytes().readable_limit() {
        return Ok(None);
    }
    let header = match wire.bytes().load_u32_at(pos) {
        Ok(h) => h,
        Err(_) => return Ok(None),
    };
    if header == NOT_INITIALIZED || is_end_of_stream(header) || is_not_complete(header) {
        return Ok(None);
    }

    let start = pos + HEADER_SIZE;
    let end = start + length_of(header);
    let info = DocumentInfo {
        position: pos,
        meta: !framing::is_data(header),
        start,
        end,
    };

    let result = run_in_window(wire, start, end, &info, f);

    // Re-synchronize to the document end on every exit path.
    wire.bytes_mut().set_read_pos(end);
    wire.reset_in_state();
    result?;
    Ok(Some(info))
}

fn run_in_window<F>(
    wire: &mut Wire,
    start: usize,
    end: usize,
    info: &DocumentInfo,
    f: F,
) -> Result<()>
where
    F: FnOnce(&mut Wire, &DocumentInfo) -> Result<()>,
{
    // Transparent decompression: a compressed-binary document's payload is
    // one compressed element.
    if let Wire::Binary(b) = &*wire {
        let lead = wire.bytes().slice(start, 1).map(|s| s[0]).unwrap_or(0);
        if b.compress_documents && lead == crate::binary::codes::COMPRESSED {
            wire.bytes_mut().set_read_pos(start);
            wire.reset_in_state();
            let raw = match wire {
                Wire::Binary(b) => b.read_compressed()?,
                Wire::Text(_) => unreachable!("compression is checked on a binary wire"),
            };
            let scratch = Bytes::from_vec(raw);
            let original = std::mem::replace(wire.bytes_mut(), scratch);
            wire.reset_in_state();
            let result = f(wire, info);
            *wire.bytes_mut() = original;
            return result;
        }
    }

    wire.bytes_mut().set_read_pos(start);
    wire.reset_in_state();
    set_read_window(wire, end);
    f(wire, info)
}

fn set_read_window(wire: &mut Wire, end: usize) {
    match wire {
        Wire::Text(w) => w.reader.set_base_limit(end),
        Wire::Binary(w) => w.reader.set_base_limit(end),
    }
}

/// Stamps the end-of-stream sentinel at the wire's write position.
pub fn write_end_of_stream(wire: &mut Wire) -> Result<()> {
    let pos = wire.bytes().write_pos();
    wire.bytes_mut().store_u32_at(pos, END_OF_DATA)
}

fn payload_looks_like_text(payload: &[u8]) -> bool {
    if payload.is_empty() {
        return true;
    }
    let sample = &payload[..payload.len().min(64)];
    let printable = sample
        .iter()
        .filter(|&&b| matches!(b, 0x20..=0x7e | b'\n' | b'\r' | b'\t'))
        .count();
    printable * 5 >= sample.len() * 4
}

/// Renders a size-prefixed blob stream as text, one `---` separator per
/// document. Binary payloads are translated through a text wire and
/// marked `#binary` on the separator line.
pub fn dump(bytes: &Bytes) -> Result<String> {
    use crate::wire::WireType;

    let mut out = String::new();
    for frame in DocumentCursor::new(bytes) {
        let payload = bytes.slice(frame.start, frame.end - frame.start)?;
        let marker = if frame.meta { "--- !!meta-data" } else { "--- !!data" };
        if payload_looks_like_text(payload) {
            out.push_str(marker);
            out.push('\n');
            out.push_str(&String::from_utf8_lossy(payload));
        } else {
            out.push_str(marker);
            out.push_str(" #binary\n");
            let mut src = WireType::Binary.wire(Bytes::from_slice(payload));
            let mut dst = WireType::Text.wire(Bytes::elastic());
            src.copy_to(&mut dst)?;
            out.push_str(&String::from_utf8_lossy(dst.bytes().all_readable()));
        }
        if !out.ends_with('\n') {
            out.push('\n');
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::MappedBytes;
    use crate::wire::WireType;

    #[test]
    fn text_document_frames_and_reads_back() {
        let mut wire = WireType::Text.wire(Bytes::elastic());
        write_document(&mut wire, false, |w| {
            w.write("price")?.f64(123.456)?;
            w.write("qty")?.i64(250)
        })
        .unwrap();

        let header = wire.bytes().load_u32_at(0).unwrap();
        assert!(framing::is_ready_data(header));
        assert_eq!(
            framing::length_of(header),
            wire.bytes().write_pos() - HEADER_SIZE
        );

        wire.rewind_read();
        let info = read_document(&mut wire, |w, info| {
            assert!(info.is_data());
            assert_eq!(w.read("qty")?.i64()?, 250);
            Ok(())
        })
        .unwrap()
        .unwrap();
        assert_eq!(wire.bytes().read_pos(), info.end);
    }

    #[test]
    fn meta_documents_flag_their_bit() {
        let mut wire = WireType::Binary.wire(Bytes::elastic());
        write_document(&mut wire, true, |w| w.write("kind")?.text("header")).unwrap();
        wire.rewind_read();
        let info = read_document(&mut wire, |_, _| Ok(())).unwrap().unwrap();
        assert!(info.is_meta());
    }

    #[test]
    fn abandoned_document_reads_as_absent() {
        let mut wire = WireType::Text.wire(Bytes::elastic());
        let err = write_document(&mut wire, false, |w| {
            w.write("x")?.i32(1)?;
            eyre::bail!("producer failed mid-document")
        });
        assert!(err.is_err());
        let header = wire.bytes().load_u32_at(0).unwrap();
        assert!(is_not_complete(header));

        wire.rewind_read();
        assert!(read_document(&mut wire, |_, _| Ok(())).unwrap().is_none());
    }

    #[test]
    fn partial_consumption_still_resyncs() {
        let mut wire = WireType::Binary.wire(Bytes::elastic());
        write_document(&mut wire, false, |w| {
            w.write("a")?.i64(1)?;
            w.write("b")?.i64(2)
        })
        .unwrap();
        write_document(&mut wire, false, |w| w.write("c")?.i64(3)).unwrap();

        wire.rewind_read();
        read_document(&mut wire, |w, _| {
            // Read only the first field; the context resyncs past "b".
            assert_eq!(w.read("a")?.i64()?, 1);
            Ok(())
        })
        .unwrap()
        .unwrap();
        read_document(&mut wire, |w, _| {
            assert_eq!(w.read("c")?.i64()?, 3);
            Ok(())
        })
        .unwrap()
        .unwrap();
    }

    #[test]
    fn end_of_stream_sentinel_reads_as_absent() {
        let mut wire = WireType::Binary.wire(Bytes::elastic());
        write_end_of_stream(&mut wire).unwrap();
        wire.rewind_read();
        assert!(read_document(&mut wire, |_, _| Ok(())).unwrap().is_none());
    }

    #[test]
    fn compressed_binary_documents_round_trip() {
        let mut wire = WireType::CompressedBinary.wire(Bytes::elastic());
        let long = "repetitive payload ".repeat(50);
        write_document(&mut wire, false, |w| w.write("body")?.text(&long)).unwrap();

        // The stored payload is one compressed element, smaller than raw.
        let header = wire.bytes().load_u32_at(0).unwrap();
        assert!(framing::length_of(header) < long.len());
        assert_eq!(
            wire.bytes().slice(4, 1).unwrap()[0],
            crate::binary::codes::COMPRESSED
        );

        wire.rewind_read();
        read_document(&mut wire, |w, _| {
            assert_eq!(w.read("body")?.text()?.as_deref(), Some(long.as_str()));
            Ok(())
        })
        .unwrap()
        .unwrap();
    }

    #[test]
    fn small_payloads_stay_uncompressed() {
        let mut wire = WireType::CompressedBinary.wire(Bytes::elastic());
        write_document(&mut wire, false, |w| w.write("x")?.i32(5)).unwrap();
        assert_ne!(
            wire.bytes().slice(4, 1).unwrap()[0],
            crate::binary::codes::COMPRESSED
        );
        wire.rewind_read();
        read_document(&mut wire, |w, _| {
            assert_eq!(w.read("x")?.i32()?, 5);
            Ok(())
        })
        .unwrap()
        .unwrap();
    }

    #[test]
    fn raw_wire_skips_framing() {
        let mut wire = WireType::Raw.wire(Bytes::elastic());
        write_document(&mut wire, false, |w| w.write("n")?.i64(9)).unwrap();
        // No header word: the first byte is the field element itself.
        assert!(crate::binary::codes::is_field_name(
            wire.bytes().slice(0, 1).unwrap()[0]
        ));
        wire.rewind_read();
        read_document(&mut wire, |w, _| {
            assert_eq!(w.read("n")?.i64()?, 9);
            Ok(())
        })
        .unwrap()
        .unwrap();
    }

    #[test]
    fn dump_renders_data_separator_lines() {
        let mut wire = WireType::Text.wire(Bytes::elastic());
        write_document(&mut wire, false, |w| {
            w.write("example")?.record(|inner| {
                inner.write("hello")?.text("world")?;
                inner.write("hello1")?.text("world1")?;
                inner.write("hello2")?.text("world2")
            })
        })
        .unwrap();

        let rendered = dump(wire.bytes()).unwrap();
        assert_eq!(
            rendered,
            "--- !!data\nexample: {\n  hello: world,\n  hello1: world1,\n  hello2: world2\n}\n"
        );
    }

    #[test]
    fn concurrent_writers_number_data_documents() {
        let store = std::sync::Arc::new(MappedBytes::anon(1 << 16).unwrap());
        let mut handles = Vec::new();
        for t in 0..2i64 {
            let store = store.clone();
            handles.push(std::thread::spawn(move || {
                let mut wire = WireType::Binary.wire(Bytes::mapped(store));
                for i in 0..4i64 {
                    write_document(&mut wire, false, |w| {
                        w.write("writer")?.i64(t)?;
                        w.write("seq")?.i64(i)
                    })
                    .unwrap();
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }

        let bytes = Bytes::mapped(store);
        let numbers: Vec<u64> = DocumentCursor::new(&bytes)
            .filter_map(|f| f.number)
            .collect();
        assert_eq!(numbers, (0..8).collect::<Vec<u64>>());
    }
}
