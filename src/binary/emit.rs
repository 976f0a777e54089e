//! Writer side of the binary encoding.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use eyre::Result;

use super::codes;
use super::varint::push_varint;
use super::BinaryWire;
use crate::alias;
use crate::cells::{ArrayCellHeader, CellForm, Int32Ref, Int64ArrayRef, Int64Ref};
use crate::compress;
use zerocopy::IntoBytes;

impl BinaryWire {
    fn push_len_prefixed(&mut self, code_inline_base: Option<(u8, usize)>, varlen_code: u8, body: &[u8]) -> Result<()> {
        if let Some((base, inline_max)) = code_inline_base {
            if body.len() <= inline_max {
                self.bytes.push_u8(base + body.len() as u8)?;
                return self.bytes.push(body);
            }
        }
        self.bytes.push_u8(varlen_code)?;
        push_varint(&mut self.bytes, body.len() as u64)?;
        self.bytes.push(body)
    }

    pub fn write_field(&mut self, name: &str) -> Result<()> {
        if self.config.field_less {
            return Ok(());
        }
        if self.config.numeric_id {
            if let Ok(id) = name.parse::<u64>() {
                if id <= codes::SMALL_INT_MAX as u64 {
                    return self.bytes.push_u8(id as u8);
                }
            }
        }
        self.push_len_prefixed(
            Some((codes::FIELD_BASE, codes::FIELD_INLINE_MAX)),
            codes::FIELD_VARLEN,
            name.as_bytes(),
        )
    }

    pub fn write_bool(&mut self, v: bool) -> Result<()> {
        self.bytes.push_u8(if v { codes::TRUE } else { codes::FALSE })
    }

    pub fn write_i64(&mut self, v: i64) -> Result<()> {
        if (0..=codes::SMALL_INT_MAX as i64).contains(&v) {
            return self.bytes.push_u8(v as u8);
        }
        if let Ok(v8) = i8::try_from(v) {
            self.bytes.push_u8(codes::INT8)?;
            return self.bytes.push(&v8.to_le_bytes());
        }
        if let Ok(v16) = i16::try_from(v) {
            self.bytes.push_u8(codes::INT16)?;
            return self.bytes.push(&v16.to_le_bytes());
        }
        if let Ok(v32) = i32::try_from(v) {
            self.bytes.push_u8(codes::INT32)?;
            return self.bytes.push(&v32.to_le_bytes());
        }
        self.bytes.push_u8(codes::INT64)?;
        self.bytes.push(&v.to_le_bytes())
    }

    pub fn write_u64(&mut self, v: u64) -> Result<()> {
        if v <= codes::SMALL_INT_MAX as u64 {
            return self.bytes.push_u8(v as u8);
        }
        if let Ok(v8) = u8::try_from(v) {
            self.bytes.push_u8(codes::UINT8)?;
            return self.bytes.push(&v8.to_le_bytes());
        }
        if let Ok(v16) = u16::try_from(v) {
            self.bytes.push_u8(codes::UINT16)?;
            return self.bytes.push(&v16.to_le_bytes());
        }
        if let Ok(v32) = u32::try_from(v) {
            self.bytes.push_u8(codes::UINT32)?;
            return self.bytes.push(&v32.to_le_bytes());
        }
        self.bytes.push_u8(codes::UINT64)?;
        self.bytes.push(&v.to_le_bytes())
    }

    pub fn write_f32(&mut self, v: f32) -> Result<()> {
        self.bytes.push_u8(codes::FLOAT32)?;
        self.bytes.push(&v.to_le_bytes())
    }

    pub fn write_f64(&mut self, v: f64) -> Result<()> {
        self.bytes.push_u8(codes::FLOAT64)?;
        self.bytes.push(&v.to_le_bytes())
    }

    pub fn write_text(&mut self, s: &str) -> Result<()> {
        self.push_len_prefixed(
            Some((codes::STR_BASE, codes::STR_INLINE_MAX)),
            codes::STR_VARLEN,
            s.as_bytes(),
        )
    }

    pub fn write_bytes(&mut self, b: &[u8]) -> Result<()> {
        self.bytes.push_u8(codes::BYTES)?;
        push_varint(&mut self.bytes, b.len() as u64)?;
        self.bytes.push(b)
    }

    fn push_time_body(&mut self, code: u8, text: &str) -> Result<()> {
        self.bytes.push_u8(code)?;
        push_varint(&mut self.bytes, text.len() as u64)?;
        self.bytes.push_str(text)
    }

    pub fn write_time(&mut self, t: NaiveTime) -> Result<()> {
        self.push_time_body(codes::TIME, &t.format("%H:%M:%S%.f").to_string())
    }

    pub fn write_date(&mut self, d: NaiveDate) -> Result<()> {
        self.push_time_body(codes::DATE, &d.format("%Y-%m-%d").to_string())
    }

    pub fn write_date_time(&mut self, dt: NaiveDateTime) -> Result<()> {
        self.push_time_body(codes::DATE_TIME, &dt.format("%Y-%m-%dT%H:%M:%S%.f").to_string())
    }

    pub fn write_zoned_date_time(&mut self, zdt: DateTime<FixedOffset>) -> Result<()> {
        self.push_time_body(codes::ZONED_DATE_TIME, &zdt.to_rfc3339())
    }

    pub fn write_uuid(&mut self, u: [u8; 16]) -> Result<()> {
        self.bytes.push_u8(codes::UUID)?;
        self.bytes.push(&u)
    }

    pub fn write_null(&mut self) -> Result<()> {
        self.bytes.push_u8(codes::NULL)
    }

    pub fn write_type_prefix(&mut self, tag: &str) -> Result<()> {
        let short = alias::wire_tag(tag);
        self.bytes.push_u8(codes::TYPE_PREFIX)?;
        push_varint(&mut self.bytes, short.len() as u64)?;
        self.bytes.push_str(&short)
    }

    pub fn write_type_literal(&mut self, name: &str) -> Result<()> {
        let short = alias::wire_tag(name);
        self.bytes.push_u8(codes::TYPE_LITERAL)?;
        push_varint(&mut self.bytes, short.len() as u64)?;
        self.bytes.push_str(&short)
    }

    pub fn write_comment(&mut self, text: &str) -> Result<()> {
        self.bytes.push_u8(codes::COMMENT)?;
        push_varint(&mut self.bytes, text.len() as u64)?;
        self.bytes.push_str(text)
    }

    pub fn open_record(&mut self) -> Result<()> {
        self.bytes.push_u8(codes::RECORD_START)
    }

    pub fn close_record(&mut self) -> Result<()> {
        self.bytes.push_u8(codes::RECORD_END)
    }

    pub fn open_sequence(&mut self) -> Result<()> {
        self.bytes.push_u8(codes::SEQUENCE_START)
    }

    pub fn close_sequence(&mut self) -> Result<()> {
        self.bytes.push_u8(codes::SEQUENCE_END)
    }

    /// Pads with PADDING elements so the slot following a one-byte lead
    /// code lands on an `align`-byte boundary.
    fn align_slot(&mut self, align: usize) -> Result<()> {
        while (self.bytes.write_pos() + 1) % align != 0 {
            self.bytes.push_u8(codes::PADDING)?;
        }
        Ok(())
    }

    pub fn write_i32_ref(&mut self, init: i32) -> Result<Int32Ref> {
        self.align_slot(4)?;
        self.bytes.push_u8(codes::I32_REF)?;
        let offset = self.bytes.write_pos();
        self.bytes.push(&(init as u32).to_le_bytes())?;
        Ok(Int32Ref::new(offset, CellForm::Binary))
    }

    pub fn write_i64_ref(&mut self, init: i64) -> Result<Int64Ref> {
        self.align_slot(8)?;
        self.bytes.push_u8(codes::I64_REF)?;
        let offset = self.bytes.write_pos();
        self.bytes.push(&(init as u64).to_le_bytes())?;
        Ok(Int64Ref::new(offset, CellForm::Binary))
    }

    pub fn write_i64_array_ref(&mut self, capacity: usize) -> Result<Int64ArrayRef> {
        self.align_slot(8)?;
        self.bytes.push_u8(codes::I64_ARRAY_REF)?;
        let offset = self.bytes.write_pos();
        let header = ArrayCellHeader::new(capacity as u64);
        self.bytes.push(header.as_bytes())?;
        for _ in 0..capacity {
            self.bytes.push(&0u64.to_le_bytes())?;
        }
        Ok(Int64ArrayRef::new(offset, capacity, CellForm::Binary))
    }

    /// Wraps `raw` in a compressed sub-blob tagged by codec name.
    pub fn write_compressed(&mut self, codec_name: &str, raw: &[u8]) -> Result<()> {
        let codec = compress::codec(codec_name)?;
        let packed = codec.compress(raw)?;
        self.bytes.push_u8(codes::COMPRESSED)?;
        push_varint(&mut self.bytes, codec_name.len() as u64)?;
        self.bytes.push_str(codec_name)?;
        push_varint(&mut self.bytes, raw.len() as u64)?;
        push_varint(&mut self.bytes, packed.len() as u64)?;
        self.bytes.push(&packed)
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

    fn bytes_of(w: &BinaryWire) -> Vec<u8> {
        w.bytes().all_readable().to_vec()
    }

    #[test]
    fn small_ints_are_one_byte() {
        let mut w = wire();
        w.write_i64(0).unwrap();
        w.write_i64(127).unwrap();
        w.write_u64(5).unwrap();
        assert_eq!(bytes_of(&w), vec![0, 127, 5]);
    }

    #[test]
    fn integers_use_narrowest_width() {
        let mut w = wire();
        w.write_i64(-1).unwrap();
        assert_eq!(bytes_of(&w), vec![codes::INT8, 0xff]);

        let mut w = wire();
        w.write_i64(i64::MAX).unwrap();
        let b = bytes_of(&w);
        assert_eq!(b[0], codes::INT64);
        assert_eq!(b.len(), 9);

        let mut w = wire();
        w.write_u64(u64::MAX).unwrap();
        assert_eq!(bytes_of(&w)[0], codes::UINT64);
    }

    #[test]
    fn short_strings_inline_their_length() {
        let mut w = wire();
        w.write_text("hi").unwrap();
        assert_eq!(bytes_of(&w), vec![codes::STR_BASE + 2, b'h', b'i']);

        let mut w = wire();
        let long = "x".repeat(100);
        w.write_text(&long).unwrap();
        let b = bytes_of(&w);
        assert_eq!(b[0], codes::STR_VARLEN);
        assert_eq!(b[1], 100);
        assert_eq!(b.len(), 2 + 100);
    }

    #[test]
    fn field_names_inline_their_length() {
        let mut w = wire();
        w.write_field("A").unwrap();
        assert_eq!(bytes_of(&w), vec![codes::FIELD_BASE + 1, b'A']);
    }

    #[test]
    fn field_less_mode_elides_names() {
        let mut w = BinaryWire::new(
            Bytes::elastic(),
            WireConfig {
                field_less: true,
                ..WireConfig::default()
            },
        );
        w.write_field("ignored").unwrap();
        w.write_i64(9).unwrap();
        assert_eq!(bytes_of(&w), vec![9]);
    }

    #[test]
    fn numeric_id_mode_writes_small_int_markers() {
        let mut w = BinaryWire::new(
            Bytes::elastic(),
            WireConfig {
                numeric_id: true,
                ..WireConfig::default()
            },
        );
        w.write_field("7").unwrap();
        w.write_bool(true).unwrap();
        assert_eq!(bytes_of(&w), vec![7, codes::TRUE]);
    }

    #[test]
    fn ref_cells_are_aligned() {
        let mut w = wire();
        w.write_i64(1).unwrap();
        let cell = w.write_i32_ref(99).unwrap();
        assert_eq!(cell.offset() % 4, 0);
        assert_eq!(cell.get(w.bytes()).unwrap(), 99);

        let cell64 = w.write_i64_ref(-7).unwrap();
        assert_eq!(cell64.offset() % 8, 0);
        assert_eq!(cell64.get(w.bytes()).unwrap(), -7);
    }

    #[test]
    fn record_brackets_wrap_fields() {
        let mut w = wire();
        w.open_record().unwrap();
        w.write_field("x").unwrap();
        w.write_i64(1).unwrap();
        w.close_record().unwrap();
        let b = bytes_of(&w);
        assert_eq!(b[0], codes::RECORD_START);
        assert_eq!(*b.last().unwrap(), codes::RECORD_END);
    }
}
