//! # Binary Lead Codes
//!
//! A single lead byte classifies every element of the binary encoding:
//!
//! ```text
//! 0x00-0x7F  inline non-negative small integer (the value itself)
//! 0x80-0xBE  inline UTF-8 string, length = code - 0x80
//! 0xBF       string with explicit varint length
//! 0xC0-0xDE  inline field name, length = code - 0xC0
//! 0xDF       field name with explicit varint length
//! 0xE0-0xFF  fixed codes below
//! ```
//!
//! Multi-byte scalar payloads are little-endian. Variable-length payloads
//! (strings, blobs, type tags, time text) carry a varint length. Composite
//! values are bracketed by start/end codes, so an element's span is always
//! recoverable by scanning without any schema.

pub const SMALL_INT_MAX: u8 = 0x7f;

pub const STR_BASE: u8 = 0x80;
pub const STR_INLINE_MAX: usize = 62;
pub const STR_VARLEN: u8 = 0xbf;

pub const FIELD_BASE: u8 = 0xc0;
pub const FIELD_INLINE_MAX: usize = 30;
pub const FIELD_VARLEN: u8 = 0xdf;

pub const INT8: u8 = 0xe0;
pub const UINT8: u8 = 0xe1;
pub const INT16: u8 = 0xe2;
pub const UINT16: u8 = 0xe3;
pub const INT32: u8 = 0xe4;
pub const UINT32: u8 = 0xe5;
pub const INT64: u8 = 0xe6;
pub const UINT64: u8 = 0xe7;
pub const FLOAT32: u8 = 0xe8;
pub const FLOAT64: u8 = 0xe9;
pub const FALSE: u8 = 0xea;
pub const TRUE: u8 = 0xeb;
pub const NULL: u8 = 0xec;
pub const TYPE_PREFIX: u8 = 0xed;
pub const TYPE_LITERAL: u8 = 0xee;
pub const COMMENT: u8 = 0xef;
pub const PADDING: u8 = 0xf0;
pub const BYTES: u8 = 0xf1;
pub const UUID: u8 = 0xf2;
pub const TIME: u8 = 0xf3;
pub const DATE: u8 = 0xf4;
pub const DATE_TIME: u8 = 0xf5;
pub const ZONED_DATE_TIME: u8 = 0xf6;
pub const VARINT64: u8 = 0xf7;
pub const SEQUENCE_START: u8 = 0xf8;
pub const SEQUENCE_END: u8 = 0xf9;
pub const RECORD_START: u8 = 0xfa;
pub const RECORD_END: u8 = 0xfb;
pub const I32_REF: u8 = 0xfc;
pub const I64_REF: u8 = 0xfd;
pub const I64_ARRAY_REF: u8 = 0xfe;
pub const COMPRESSED: u8 = 0xff;

#[inline]
pub fn is_small_int(code: u8) -> bool {
    code <= SMALL_INT_MAX
}

#[inline]
pub fn is_inline_string(code: u8) -> bool {
    (STR_BASE..STR_VARLEN).contains(&code)
}

#[inline]
pub fn is_string(code: u8) -> bool {
    (STR_BASE..=STR_VARLEN).contains(&code)
}

#[inline]
pub fn is_field_name(code: u8) -> bool {
    (FIELD_BASE..=FIELD_VARLEN).contains(&code)
}

/// True for any code that begins an integer element.
#[inline]
pub fn is_integer(code: u8) -> bool {
    is_small_int(code) || (INT8..=UINT64).contains(&code) || code == VARINT64
}

pub fn name(code: u8) -> &'static str {
    match code {
        0x00..=0x7f => "small-int",
        0x80..=0xbf => "string",
        0xc0..=0xdf => "field-name",
        INT8 => "int8",
        UINT8 => "uint8",
        INT16 => "int16",
        UINT16 => "uint16",
        INT32 => "int32",
        UINT32 => "uint32",
        INT64 => "int64",
        UINT64 => "uint64",
        FLOAT32 => "float32",
        FLOAT64 => "float64",
        FALSE => "false",
        TRUE => "true",
        NULL => "null",
        TYPE_PREFIX => "type-prefix",
        TYPE_LITERAL => "type-literal",
        COMMENT => "comment",
        PADDING => "padding",
        BYTES => "bytes",
        UUID => "uuid",
        TIME => "time",
        DATE => "date",
        DATE_TIME => "date-time",
        ZONED_DATE_TIME => "zoned-date-time",
        VARINT64 => "varint64",
        SEQUENCE_START => "sequence-start",
        SEQUENCE_END => "sequence-end",
        RECORD_START => "record-start",
        RECORD_END => "record-end",
        I32_REF => "i32-ref",
        I64_REF => "i64-ref",
        I64_ARRAY_REF => "i64-array-ref",
        COMPRESSED => "compressed",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ranges_do_not_overlap() {
        assert!(is_small_int(0x7f));
        assert!(!is_small_int(0x80));
        assert!(is_string(0x80));
        assert!(is_string(STR_VARLEN));
        assert!(!is_string(FIELD_BASE));
        assert!(is_field_name(FIELD_BASE));
        assert!(is_field_name(FIELD_VARLEN));
        assert!(!is_field_name(INT8));
    }

    #[test]
    fn fixed_codes_are_dense_and_distinct() {
        let codes = [
            INT8, UINT8, INT16, UINT16, INT32, UINT32, INT64, UINT64, FLOAT32, FLOAT64, FALSE,
            TRUE, NULL, TYPE_PREFIX, TYPE_LITERAL, COMMENT, PADDING, BYTES, UUID, TIME, DATE,
            DATE_TIME, ZONED_DATE_TIME, VARINT64, SEQUENCE_START, SEQUENCE_END, RECORD_START,
            RECORD_END, I32_REF, I64_REF, I64_ARRAY_REF, COMPRESSED,
        ];
        for (i, c) in codes.iter().enumerate() {
            assert_eq!(*c as usize, 0xe0 + i);
        }
    }

    #[test]
    fn every_code_has_a_name() {
        for code in 0u8..=255 {
            assert!(!name(code).is_empty());
        }
    }
}
