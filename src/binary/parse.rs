//! Reader side of the binary encoding.
//!
//! Every read starts by skipping transparent elements (padding, comments),
//! then dispatches on the lead code. Scalar pulls that fail leave the
//! cursor where it was; composite reads push a frame whose limit is the
//! measured span of the composite, so over-reads surface as truncation.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use eyre::Result;

use super::codes;
use super::varint::{read_varint, varint_len_from_marker};
use super::BinaryWire;
use crate::alias;
use crate::cells::{CellForm, Int32Ref, Int64ArrayRef, Int64Ref, ARRAY_CELL_HEADER_SIZE};
use crate::compress;
use crate::error::{wire_err, WireErrorKind};
use crate::text;
use crate::wire::PeekKind;

impl BinaryWire {
    pub(crate) fn cur_limit(&self) -> usize {
        self.reader.limit().min(self.bytes.readable_limit())
    }

    fn peek_at(&self, pos: usize) -> Option<u8> {
        if pos < self.cur_limit() {
            self.bytes.slice(pos, 1).ok().map(|s| s[0])
        } else {
            None
        }
    }

    fn type_mismatch(&self, pos: usize, detail: impl Into<String>) -> eyre::Report {
        wire_err(
            WireErrorKind::TypeMismatch,
            pos,
            self.bytes.all_readable(),
            detail,
        )
    }

    fn truncated(&self, pos: usize, detail: impl Into<String>) -> eyre::Report {
        wire_err(
            WireErrorKind::Truncation,
            pos,
            self.bytes.all_readable(),
            detail,
        )
    }

    /// Skips padding and comment elements; they are transparent to readers.
    pub(crate) fn skip_transparent(&mut self) -> Result<()> {
        loop {
            let pos = self.bytes.read_pos();
            match self.peek_at(pos) {
                Some(codes::PADDING) => self.bytes.set_read_pos(pos + 1),
                Some(codes::COMMENT) => {
                    self.bytes.set_read_pos(pos + 1);
                    let len = read_varint(&mut self.bytes)?;
                    let p = self.bytes.read_pos();
                    self.bytes.set_read_pos(p + len as usize);
                }
                _ => return Ok(()),
            }
        }
    }

    /// The next meaningful lead code, without consuming it.
    pub(crate) fn peek_code(&mut self) -> Result<Option<u8>> {
        self.skip_transparent()?;
        Ok(self.peek_at(self.bytes.read_pos()))
    }

    fn take_code(&mut self) -> Result<u8> {
        let pos = self.bytes.read_pos();
        match self.peek_code()? {
            Some(c) => {
                let p = self.bytes.read_pos();
                self.bytes.set_read_pos(p + 1);
                Ok(c)
            }
            None => Err(self.truncated(pos, "expected an element")),
        }
    }

    fn read_body(&mut self, len: usize) -> Result<Vec<u8>> {
        let pos = self.bytes.read_pos();
        if pos + len > self.cur_limit() {
            return Err(self.truncated(pos, format!("element body of {len} bytes crosses the window end")));
        }
        let body = self.bytes.slice(pos, len)?.to_vec();
        self.bytes.set_read_pos(pos + len);
        Ok(body)
    }

    fn read_utf8_body(&mut self, len: usize) -> Result<String> {
        let body = self.read_body(len)?;
        Ok(String::from_utf8_lossy(&body).into_owned())
    }

    /// Reads the next `field-name` element if one is ahead.
    pub fn read_field_name(&mut self) -> Result<Option<String>> {
        if self.config.field_less {
            return Ok(None);
        }
        let Some(code) = self.peek_code()? else {
            return Ok(None);
        };
        if self.config.numeric_id && codes::is_small_int(code) {
            let start = self.bytes.read_pos();
            self.bytes.set_read_pos(start + 1);
            return Ok(Some((code as u64).to_string()));
        }
        if !codes::is_field_name(code) {
            return Ok(None);
        }
        let start = self.bytes.read_pos();
        self.bytes.set_read_pos(start + 1);
        let len = if code == codes::FIELD_VARLEN {
            read_varint(&mut self.bytes)? as usize
        } else {
            (code - codes::FIELD_BASE) as usize
        };
        Ok(Some(self.read_utf8_body(len)?))
    }

    pub fn read_bool(&mut self) -> Result<bool> {
        let start = self.bytes.read_pos();
        match self.take_code()? {
            codes::TRUE => Ok(true),
            codes::FALSE => Ok(false),
            other => {
                self.bytes.set_read_pos(start);
                Err(self.type_mismatch(start, format!("expected a bool, found {}", codes::name(other))))
            }
        }
    }

    /// Widest integer pull; width validation happens in `ValueIn`.
    pub fn read_int(&mut self) -> Result<i128> {
        let start = self.bytes.read_pos();
        let code = self.take_code()?;
        if codes::is_small_int(code) {
            return Ok(code as i128);
        }
        let value = match code {
            codes::INT8 => i8::from_le_bytes([self.read_body(1)?[0]]) as i128,
            codes::UINT8 => self.read_body(1)?[0] as i128,
            codes::INT16 => {
                let b = self.read_body(2)?;
                i16::from_le_bytes([b[0], b[1]]) as i128
            }
            codes::UINT16 => {
                let b = self.read_body(2)?;
                u16::from_le_bytes([b[0], b[1]]) as i128
            }
            codes::INT32 => {
                let b = self.read_body(4)?;
                i32::from_le_bytes(b.try_into().unwrap()) as i128
            }
            codes::UINT32 => {
                let b = self.read_body(4)?;
                u32::from_le_bytes(b.try_into().unwrap()) as i128
            }
            codes::INT64 => {
                let b = self.read_body(8)?;
                i64::from_le_bytes(b.try_into().unwrap()) as i128
            }
            codes::UINT64 => {
                let b = self.read_body(8)?;
                u64::from_le_bytes(b.try_into().unwrap()) as i128
            }
            codes::VARINT64 => {
                let v = super::varint::read_signed_varint(&mut self.bytes)?;
                v as i128
            }
            other => {
                self.bytes.set_read_pos(start);
                return Err(self.type_mismatch(
                    start,
                    format!("expected an integer, found {}", codes::name(other)),
                ));
            }
        };
        Ok(value)
    }

    pub fn read_f64(&mut self) -> Result<f64> {
        let start = self.bytes.read_pos();
        let code = self.take_code()?;
        match code {
            codes::FLOAT32 => {
                let b = self.read_body(4)?;
                Ok(f32::from_le_bytes(b.try_into().unwrap()) as f64)
            }
            codes::FLOAT64 => {
                let b = self.read_body(8)?;
                Ok(f64::from_le_bytes(b.try_into().unwrap()))
            }
            _ => {
                // Integers widen to float.
                self.bytes.set_read_pos(start);
                match self.read_int() {
                    Ok(v) => Ok(v as f64),
                    Err(_) => {
                        self.bytes.set_read_pos(start);
                        Err(self.type_mismatch(
                            start,
                            format!("expected a number, found {}", codes::name(code)),
                        ))
                    }
                }
            }
        }
    }

    pub fn read_text(&mut self) -> Result<Option<String>> {
        let start = self.bytes.read_pos();
        let code = self.take_code()?;
        if code == codes::NULL {
            return Ok(None);
        }
        if !codes::is_string(code) {
            self.bytes.set_read_pos(start);
            return Err(self.type_mismatch(start, format!("expected text, found {}", codes::name(code))));
        }
        let len = if code == codes::STR_VARLEN {
            read_varint(&mut self.bytes)? as usize
        } else {
            (code - codes::STR_BASE) as usize
        };
        Ok(Some(self.read_utf8_body(len)?))
    }

    pub fn read_bytes(&mut self) -> Result<Vec<u8>> {
        let start = self.bytes.read_pos();
        let code = self.take_code()?;
        if code != codes::BYTES {
            self.bytes.set_read_pos(start);
            return Err(self.type_mismatch(start, format!("expected bytes, found {}", codes::name(code))));
        }
        let len = read_varint(&mut self.bytes)? as usize;
        self.read_body(len)
    }

    fn read_time_body(&mut self, expected: u8, what: &str) -> Result<String> {
        let start = self.bytes.read_pos();
        let code = self.take_code()?;
        if code != expected {
            self.bytes.set_read_pos(start);
            return Err(self.type_mismatch(start, format!("expected {what}, found {}", codes::name(code))));
        }
        let len = read_varint(&mut self.bytes)? as usize;
        self.read_utf8_body(len)
    }

    fn parse_or_restore<T>(
        &mut self,
        start: usize,
        what: &str,
        text: String,
        parse: impl Fn(&str) -> Option<T>,
    ) -> Result<T> {
        match parse(&text) {
            Some(v) => Ok(v),
            None => {
                self.bytes.set_read_pos(start);
                Err(self.type_mismatch(start, format!("malformed {what}: {text:?}")))
            }
        }
    }

    pub fn read_time(&mut self) -> Result<NaiveTime> {
        let start = self.bytes.read_pos();
        let text = self.read_time_body(codes::TIME, "a time")?;
        self.parse_or_restore(start, "time", text, text::parse_time_token)
    }

    pub fn read_date(&mut self) -> Result<NaiveDate> {
        let start = self.bytes.read_pos();
        let text = self.read_time_body(codes::DATE, "a date")?;
        self.parse_or_restore(start, "date", text, text::parse_date_token)
    }

    pub fn read_date_time(&mut self) -> Result<NaiveDateTime> {
        let start = self.bytes.read_pos();
        let text = self.read_time_body(codes::DATE_TIME, "a date-time")?;
        self.parse_or_restore(start, "date-time", text, text::parse_date_time_token)
    }

    pub fn read_zoned_date_time(&mut self) -> Result<DateTime<FixedOffset>> {
        let start = self.bytes.read_pos();
        let text = self.read_time_body(codes::ZONED_DATE_TIME, "a zoned date-time")?;
        self.parse_or_restore(start, "zoned date-time", text, text::parse_zoned_token)
    }

    pub fn read_uuid(&mut self) -> Result<[u8; 16]> {
        let start = self.bytes.read_pos();
        let code = self.take_code()?;
        if code != codes::UUID {
            self.bytes.set_read_pos(start);
            return Err(self.type_mismatch(start, format!("expected a uuid, found {}", codes::name(code))));
        }
        let body = self.read_body(16)?;
        let mut out = [0u8; 16];
        out.copy_from_slice(&body);
        Ok(out)
    }

    /// Consumes the null element if it is next; true when consumed.
    pub fn read_null(&mut self) -> Result<bool> {
        if self.peek_code()? == Some(codes::NULL) {
            let p = self.bytes.read_pos();
            self.bytes.set_read_pos(p + 1);
            return Ok(true);
        }
        Ok(false)
    }

    pub fn read_type_prefix(&mut self) -> Result<Option<String>> {
        if self.peek_code()? != Some(codes::TYPE_PREFIX) {
            return Ok(None);
        }
        let p = self.bytes.read_pos();
        self.bytes.set_read_pos(p + 1);
        let len = read_varint(&mut self.bytes)? as usize;
        let tag = self.read_utf8_body(len)?;
        Ok(Some(alias::resolve(&tag)))
    }

    pub fn read_type_literal(&mut self) -> Result<String> {
        let start = self.bytes.read_pos();
        let code = self.take_code()?;
        if code != codes::TYPE_LITERAL {
            self.bytes.set_read_pos(start);
            return Err(self.type_mismatch(
                start,
                format!("expected a type literal, found {}", codes::name(code)),
            ));
        }
        let len = read_varint(&mut self.bytes)? as usize;
        let tag = self.read_utf8_body(len)?;
        Ok(alias::resolve(&tag))
    }

    /// Byte span of the next value from the cursor, including any type
    /// prefix, without consuming it.
    pub fn measure_value(&mut self) -> Result<usize> {
        self.skip_transparent()?;
        let start = self.bytes.read_pos();
        let mut pos = start;
        // Prefix elements bind to the value that follows.
        while self.peek_at(pos) == Some(codes::TYPE_PREFIX) {
            pos = self.element_end(pos)?;
            pos = self.skip_transparent_at(pos)?;
        }
        let end = self.element_end(pos)?;
        Ok(end - start)
    }

    fn skip_transparent_at(&self, mut pos: usize) -> Result<usize> {
        loop {
            match self.peek_at(pos) {
                Some(codes::PADDING) => pos += 1,
                Some(codes::COMMENT) => pos = self.element_end(pos)?,
                _ => return Ok(pos),
            }
        }
    }

    fn varint_at(&self, pos: usize) -> Result<(u64, usize)> {
        let limit = self.cur_limit();
        if pos >= limit {
            return Err(self.truncated(pos, "varint crosses the window end"));
        }
        let avail = (limit - pos).min(9);
        let window = self.bytes.slice(pos, avail)?;
        let marker_len = varint_len_from_marker(window[0])?;
        if marker_len > avail {
            return Err(self.truncated(pos, "varint crosses the window end"));
        }
        let (v, n) = super::varint::decode_varint(window)?;
        Ok((v, pos + n))
    }

    /// Offset just past the element whose lead code sits at `pos`.
    fn element_end(&self, pos: usize) -> Result<usize> {
        let code = self
            .peek_at(pos)
            .ok_or_else(|| self.truncated(pos, "expected an element"))?;
        if codes::is_small_int(code) {
            return Ok(pos + 1);
        }
        if codes::is_inline_string(code) {
            return Ok(pos + 1 + (code - codes::STR_BASE) as usize);
        }
        if codes::is_field_name(code) && code != codes::FIELD_VARLEN {
            return Ok(pos + 1 + (code - codes::FIELD_BASE) as usize);
        }
        Ok(match code {
            codes::STR_VARLEN | codes::FIELD_VARLEN | codes::BYTES | codes::TYPE_PREFIX
            | codes::TYPE_LITERAL | codes::COMMENT | codes::TIME | codes::DATE
            | codes::DATE_TIME | codes::ZONED_DATE_TIME => {
                let (len, after) = self.varint_at(pos + 1)?;
                after + len as usize
            }
            codes::INT8 | codes::UINT8 => pos + 2,
            codes::INT16 | codes::UINT16 => pos + 3,
            codes::INT32 | codes::UINT32 | codes::FLOAT32 => pos + 5,
            codes::INT64 | codes::UINT64 | codes::FLOAT64 => pos + 9,
            codes::TRUE | codes::FALSE | codes::NULL | codes::PADDING => pos + 1,
            codes::VARINT64 => {
                let (_, after) = self.varint_at(pos + 1)?;
                after
            }
            codes::UUID => pos + 17,
            codes::I32_REF => pos + 5,
            codes::I64_REF => pos + 9,
            codes::I64_ARRAY_REF => {
                let header_pos = pos + 1;
                let capacity = self.bytes.load_u64_at(header_pos).map_err(|_| {
                    self.truncated(pos, "array cell header crosses the window end")
                })?;
                pos + 1 + ARRAY_CELL_HEADER_SIZE + capacity as usize * 8
            }
            codes::COMPRESSED => {
                let (name_len, after_name_len) = self.varint_at(pos + 1)?;
                let (_, after_raw_len) = self.varint_at(after_name_len + name_len as usize)?;
                let (packed_len, after_packed_len) = self.varint_at(after_raw_len)?;
                after_packed_len + packed_len as usize
            }
            codes::SEQUENCE_START => self.composite_end(pos)?,
            codes::RECORD_START => self.composite_end(pos)?,
            codes::SEQUENCE_END | codes::RECORD_END => pos + 1,
            other => {
                return Err(self.type_mismatch(pos, format!("unexpected lead code {}", codes::name(other))))
            }
        })
    }

    /// Scans past the matching end code of the composite opening at `pos`.
    fn composite_end(&self, open_pos: usize) -> Result<usize> {
        let mut depth = 0usize;
        let mut pos = open_pos;
        loop {
            let Some(code) = self.peek_at(pos) else {
                return Err(wire_err(
                    WireErrorKind::UnterminatedRecord,
                    open_pos,
                    self.bytes.all_readable(),
                    "no matching end code before the window end",
                ));
            };
            match code {
                codes::SEQUENCE_START | codes::RECORD_START => {
                    depth += 1;
                    pos += 1;
                }
                codes::SEQUENCE_END | codes::RECORD_END => {
                    depth -= 1;
                    pos += 1;
                    if depth == 0 {
                        return Ok(pos);
                    }
                }
                _ => pos = self.element_end(pos)?,
            }
        }
    }

    pub fn skip_value(&mut self) -> Result<()> {
        let span = self.measure_value()?;
        let pos = self.bytes.read_pos();
        self.bytes.set_read_pos(pos + span);
        Ok(())
    }

    pub fn open_sequence_read(&mut self) -> Result<()> {
        self.open_composite_read(codes::SEQUENCE_START, "a sequence")
    }

    pub fn open_record_read(&mut self) -> Result<()> {
        self.open_composite_read(codes::RECORD_START, "a record")
    }

    fn open_composite_read(&mut self, open: u8, what: &str) -> Result<()> {
        self.skip_transparent()?;
        let start = self.bytes.read_pos();
        if self.peek_at(start) != Some(open) {
            let found = self.peek_at(start).map(codes::name).unwrap_or("end of window");
            return Err(self.type_mismatch(start, format!("expected {what}, found {found}")));
        }
        let end = self.composite_end(start)?;
        self.bytes.set_read_pos(start + 1);
        self.reader.push(end - 1, end);
        Ok(())
    }

    pub fn seq_has_next(&mut self) -> Result<bool> {
        Ok(self.peek_code()?.is_some())
    }

    pub fn close_sequence_read(&mut self) -> Result<()> {
        self.close_composite_read()
    }

    pub fn close_record_read(&mut self) -> Result<()> {
        self.close_composite_read()
    }

    fn close_composite_read(&mut self) -> Result<()> {
        if let Some(frame) = self.reader.pop() {
            self.bytes.set_read_pos(frame.resume);
        }
        Ok(())
    }

    pub fn read_i32_ref(&mut self) -> Result<Int32Ref> {
        let start = self.bytes.read_pos();
        let code = self.take_code()?;
        if code != codes::I32_REF {
            self.bytes.set_read_pos(start);
            return Err(self.type_mismatch(start, format!("expected an i32 cell, found {}", codes::name(code))));
        }
        let offset = self.bytes.read_pos();
        self.read_body(4)?;
        Ok(Int32Ref::new(offset, CellForm::Binary))
    }

    pub fn read_i64_ref(&mut self) -> Result<Int64Ref> {
        let start = self.bytes.read_pos();
        let code = self.take_code()?;
        if code != codes::I64_REF {
            self.bytes.set_read_pos(start);
            return Err(self.type_mismatch(start, format!("expected an i64 cell, found {}", codes::name(code))));
        }
        let offset = self.bytes.read_pos();
        self.read_body(8)?;
        Ok(Int64Ref::new(offset, CellForm::Binary))
    }

    pub fn read_i64_array_ref(&mut self) -> Result<Int64ArrayRef> {
        let start = self.bytes.read_pos();
        let code = self.take_code()?;
        if code != codes::I64_ARRAY_REF {
            self.bytes.set_read_pos(start);
            return Err(self.type_mismatch(start, format!("expected an array cell, found {}", codes::name(code))));
        }
        let offset = self.bytes.read_pos();
        let capacity = self.bytes.load_u64_at(offset)? as usize;
        self.read_body(ARRAY_CELL_HEADER_SIZE + capacity * 8)?;
        Ok(Int64ArrayRef::new(offset, capacity, CellForm::Binary))
    }

    pub fn read_compressed(&mut self) -> Result<Vec<u8>> {
        let start = self.bytes.read_pos();
        let code = self.take_code()?;
        if code != codes::COMPRESSED {
            self.bytes.set_read_pos(start);
            return Err(self.type_mismatch(
                start,
                format!("expected a compressed blob, found {}", codes::name(code)),
            ));
        }
        let name_len = read_varint(&mut self.bytes)? as usize;
        let name = self.read_utf8_body(name_len)?;
        let raw_len = read_varint(&mut self.bytes)? as usize;
        let packed_len = read_varint(&mut self.bytes)? as usize;
        let packed = self.read_body(packed_len)?;
        compress::codec(&name)?.decompress(&packed, raw_len)
    }

    /// Classifies the next element without consuming it.
    pub fn peek_kind(&mut self) -> Result<PeekKind> {
        let Some(code) = self.peek_code()? else {
            return Ok(PeekKind::EndOfValue);
        };
        if codes::is_small_int(code) {
            return Ok(PeekKind::Int);
        }
        if codes::is_string(code) {
            return Ok(PeekKind::Text);
        }
        if codes::is_field_name(code) {
            return Ok(PeekKind::EndOfValue);
        }
        Ok(match code {
            codes::INT8 | codes::UINT8 | codes::INT16 | codes::UINT16 | codes::INT32
            | codes::UINT32 | codes::INT64 | codes::UINT64 | codes::VARINT64 => PeekKind::Int,
            codes::FLOAT32 | codes::FLOAT64 => PeekKind::Float,
            codes::TRUE | codes::FALSE => PeekKind::Bool,
            codes::NULL => PeekKind::Null,
            codes::BYTES => PeekKind::Bytes,
            codes::UUID => PeekKind::Uuid,
            codes::TIME => PeekKind::Time,
            codes::DATE => PeekKind::Date,
            codes::DATE_TIME => PeekKind::DateTime,
            codes::ZONED_DATE_TIME => PeekKind::ZonedDateTime,
            codes::TYPE_PREFIX => {
                let pos = self.bytes.read_pos();
                let (len, after) = self.varint_at(pos + 1)?;
                let tag = String::from_utf8_lossy(self.bytes.slice(after, len as usize)?).into_owned();
                PeekKind::TypePrefix(alias::resolve(&tag))
            }
            codes::TYPE_LITERAL => PeekKind::TypeLiteral,
            codes::SEQUENCE_START => PeekKind::Sequence,
            codes::RECORD_START => PeekKind::Record,
            codes::I32_REF => PeekKind::I32Ref,
            codes::I64_REF => PeekKind::I64Ref,
            codes::I64_ARRAY_REF => PeekKind::I64ArrayRef,
            codes::COMPRESSED => PeekKind::Compressed,
            codes::SEQUENCE_END | codes::RECORD_END => PeekKind::EndOfValue,
            _ => PeekKind::EndOfValue,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::Bytes;
    use crate::wire::config::WireConfig;

    fn wire() -> BinaryWire {
        BinaryWire::new(Bytes::elastic(), WireConfig::default())
    }

    fn rewind(w: &mut BinaryWire) {
        w.bytes_mut().set_read_pos(0);
        w.reset_in_state();
    }

    #[test]
    fn scalar_round_trips() {
        let mut w = wire();
        w.write_bool(true).unwrap();
        w.write_i64(-12345789).unwrap();
        w.write_u64(u64::MAX).unwrap();
        w.write_f64(123.456).unwrap();
        w.write_text("Hello World").unwrap();
        rewind(&mut w);
        assert!(w.read_bool().unwrap());
        assert_eq!(w.read_int().unwrap(), -12345789);
        assert_eq!(w.read_int().unwrap(), u64::MAX as i128);
        assert_eq!(w.read_f64().unwrap(), 123.456);
        assert_eq!(w.read_text().unwrap(), Some("Hello World".into()));
    }

    #[test]
    fn mismatched_pull_restores_cursor() {
        let mut w = wire();
        w.write_text("word").unwrap();
        rewind(&mut w);
        let before = w.bytes().read_pos();
        assert!(w.read_bool().is_err());
        assert_eq!(w.bytes().read_pos(), before);
        assert_eq!(w.read_text().unwrap(), Some("word".into()));
    }

    #[test]
    fn record_scan_and_limit() {
        let mut w = wire();
        w.open_record().unwrap();
        w.write_field("a").unwrap();
        w.write_i64(1).unwrap();
        w.write_field("b").unwrap();
        w.write_text("two").unwrap();
        w.close_record().unwrap();
        w.write_i64(99).unwrap();
        rewind(&mut w);

        w.open_record_read().unwrap();
        assert_eq!(w.read_field_name().unwrap(), Some("a".into()));
        assert_eq!(w.read_int().unwrap(), 1);
        assert_eq!(w.read_field_name().unwrap(), Some("b".into()));
        assert_eq!(w.read_text().unwrap(), Some("two".into()));
        assert_eq!(w.read_field_name().unwrap(), None);
        w.close_record_read().unwrap();
        assert_eq!(w.read_int().unwrap(), 99);
    }

    #[test]
    fn measure_value_spans_composites_and_prefixes() {
        let mut w = wire();
        w.write_type_prefix("Pt").unwrap();
        w.open_record().unwrap();
        w.write_field("x").unwrap();
        w.write_i64(300).unwrap();
        w.close_record().unwrap();
        let total = w.bytes().write_pos();
        rewind(&mut w);
        assert_eq!(w.measure_value().unwrap(), total);
        w.skip_value().unwrap();
        assert_eq!(w.bytes().read_pos(), total);
    }

    #[test]
    fn padding_and_comments_are_transparent() {
        let mut w = wire();
        w.write_comment("note").unwrap();
        w.bytes_mut().push_u8(codes::PADDING).unwrap();
        w.bytes_mut().push_u8(codes::PADDING).unwrap();
        w.write_i64(5).unwrap();
        rewind(&mut w);
        assert_eq!(w.read_int().unwrap(), 5);
    }

    #[test]
    fn time_scalars_round_trip() {
        use chrono::{NaiveDate, NaiveTime};
        let mut w = wire();
        let t = NaiveTime::from_hms_opt(12, 30, 15).unwrap();
        let d = NaiveDate::from_ymd_opt(2020, 5, 17).unwrap();
        w.write_time(t).unwrap();
        w.write_date(d).unwrap();
        w.write_date_time(d.and_time(t)).unwrap();
        rewind(&mut w);
        assert_eq!(w.read_time().unwrap(), t);
        assert_eq!(w.read_date().unwrap(), d);
        assert_eq!(w.read_date_time().unwrap(), d.and_time(t));
    }

    #[test]
    fn compressed_blob_round_trips() {
        let raw = b"abcabcabcabcabcabc".repeat(20);
        let mut w = wire();
        w.write_compressed("lzw", &raw).unwrap();
        rewind(&mut w);
        assert_eq!(w.read_compressed().unwrap(), raw);
    }

    #[test]
    fn unterminated_record_is_flagged() {
        let mut w = wire();
        w.open_record().unwrap();
        w.write_field("a").unwrap();
        w.write_i64(1).unwrap();
        rewind(&mut w);
        let err = w.open_record_read().unwrap_err();
        let we = err.downcast_ref::<crate::WireError>().unwrap();
        assert_eq!(we.kind, crate::WireErrorKind::UnterminatedRecord);
    }
}
