//! # Wire Value Universe
//!
//! This module provides `WireValue`, the closed tagged union every encoding
//! reads and writes. Producers usually emit typed scalars directly through
//! `ValueOut`; `WireValue` is the dynamic form used by polymorphic
//! `object()` writes, the any-object read path, and cross-encoding stream
//! copies.
//!
//! ## Variants
//!
//! | Variant | Rust type | Notes |
//! |---------|-----------|-------|
//! | Null | - | the null sentinel |
//! | Bool | bool | |
//! | I8..U64 | i8..u64 | every integer width |
//! | F32 / F64 | f32 / f64 | |
//! | Text | String | UTF-8 |
//! | Bytes | `Vec<u8>` | opaque blob |
//! | Time / Date / DateTime | chrono naive types | ISO-8601 on the wire |
//! | ZonedDateTime | `DateTime<FixedOffset>` | |
//! | Uuid | `[u8; 16]` | hyphenated hex in text |
//! | TypeLiteral | String | a class-name reference |
//! | Sequence | `Vec<WireValue>` | ordered |
//! | Map | `Vec<(WireValue, WireValue)>` | preserves insertion order |
//! | Record | `Vec<(String, WireValue)>` | named-field composite |
//! | Typed | tag + boxed value | value carrying a type prefix |
//!
//! Maps are vectors of pairs rather than hash maps so that a map written and
//! re-read preserves its entry order, matching the linked-map semantics of
//! the formats this engine interoperates with.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};

#[derive(Debug, Clone, PartialEq)]
pub enum WireValue {
    Null,
    Bool(bool),
    I8(i8),
    U8(u8),
    I16(i16),
    U16(u16),
    I32(i32),
    U32(u32),
    I64(i64),
    U64(u64),
    F32(f32),
    F64(f64),
    Text(String),
    Bytes(Vec<u8>),
    Time(NaiveTime),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    ZonedDateTime(DateTime<FixedOffset>),
    Uuid([u8; 16]),
    TypeLiteral(String),
    Sequence(Vec<WireValue>),
    Map(Vec<(WireValue, WireValue)>),
    Record(Vec<(String, WireValue)>),
    Typed { tag: String, value: Box<WireValue> },
}

impl WireValue {
    pub fn is_null(&self) -> bool {
        matches!(self, WireValue::Null)
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            WireValue::Null => "null",
            WireValue::Bool(_) => "bool",
            WireValue::I8(_) => "i8",
            WireValue::U8(_) => "u8",
            WireValue::I16(_) => "i16",
            WireValue::U16(_) => "u16",
            WireValue::I32(_) => "i32",
            WireValue::U32(_) => "u32",
            WireValue::I64(_) => "i64",
            WireValue::U64(_) => "u64",
            WireValue::F32(_) => "f32",
            WireValue::F64(_) => "f64",
            WireValue::Text(_) => "text",
            WireValue::Bytes(_) => "bytes",
            WireValue::Time(_) => "time",
            WireValue::Date(_) => "date",
            WireValue::DateTime(_) => "date-time",
            WireValue::ZonedDateTime(_) => "zoned-date-time",
            WireValue::Uuid(_) => "uuid",
            WireValue::TypeLiteral(_) => "type",
            WireValue::Sequence(_) => "sequence",
            WireValue::Map(_) => "map",
            WireValue::Record(_) => "record",
            WireValue::Typed { .. } => "typed",
        }
    }

    /// Widens any integer variant to i64; `None` for non-integers or a u64
    /// above `i64::MAX`.
    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            WireValue::I8(v) => Some(v as i64),
            WireValue::U8(v) => Some(v as i64),
            WireValue::I16(v) => Some(v as i64),
            WireValue::U16(v) => Some(v as i64),
            WireValue::I32(v) => Some(v as i64),
            WireValue::U32(v) => Some(v as i64),
            WireValue::I64(v) => Some(v),
            WireValue::U64(v) => i64::try_from(v).ok(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            WireValue::F32(v) => Some(v as f64),
            WireValue::F64(v) => Some(v),
            _ => self.as_i64().map(|v| v as f64),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            WireValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Strips any type prefix, yielding the tag (if present) and the
    /// structural value.
    pub fn untag(&self) -> (Option<&str>, &WireValue) {
        match self {
            WireValue::Typed { tag, value } => (Some(tag), value),
            other => (None, other),
        }
    }

    pub fn record_field<'a>(&'a self, name: &str) -> Option<&'a WireValue> {
        match self {
            WireValue::Record(fields) => fields.iter().find(|(n, _)| n == name).map(|(_, v)| v),
            _ => None,
        }
    }
}

impl From<bool> for WireValue {
    fn from(v: bool) -> Self {
        WireValue::Bool(v)
    }
}

impl From<i32> for WireValue {
    fn from(v: i32) -> Self {
        WireValue::I32(v)
    }
}

impl From<i64> for WireValue {
    fn from(v: i64) -> Self {
        WireValue::I64(v)
    }
}

impl From<f64> for WireValue {
    fn from(v: f64) -> Self {
        WireValue::F64(v)
    }
}

impl From<&str> for WireValue {
    fn from(v: &str) -> Self {
        WireValue::Text(v.to_string())
    }
}

impl From<String> for WireValue {
    fn from(v: String) -> Self {
        WireValue::Text(v)
    }
}

impl From<Vec<u8>> for WireValue {
    fn from(v: Vec<u8>) -> Self {
        WireValue::Bytes(v)
    }
}

/// Formats a UUID as hyphenated lowercase hex.
pub fn uuid_to_string(u: &[u8; 16]) -> String {
    let h = |r: std::ops::Range<usize>| -> String {
        u[r].iter().map(|b| format!("{b:02x}")).collect()
    };
    format!("{}-{}-{}-{}-{}", h(0..4), h(4..6), h(6..8), h(8..10), h(10..16))
}

/// Parses a hyphenated UUID, accepting upper or lower case hex.
pub fn parse_uuid(s: &str) -> Option<[u8; 16]> {
    let hex: String = s.chars().filter(|c| *c != '-').collect();
    if hex.len() != 32 || s.split('-').count() != 5 {
        return None;
    }
    let mut out = [0u8; 16];
    for i in 0..16 {
        out[i] = u8::from_str_radix(&hex[i * 2..i * 2 + 2], 16).ok()?;
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_widening_covers_all_widths() {
        assert_eq!(WireValue::I8(-5).as_i64(), Some(-5));
        assert_eq!(WireValue::U32(7).as_i64(), Some(7));
        assert_eq!(WireValue::U64(u64::MAX).as_i64(), None);
        assert_eq!(WireValue::Text("x".into()).as_i64(), None);
    }

    #[test]
    fn untag_strips_one_prefix_level() {
        let v = WireValue::Typed {
            tag: "Point".into(),
            value: Box::new(WireValue::Record(vec![("x".into(), WireValue::I32(1))])),
        };
        let (tag, inner) = v.untag();
        assert_eq!(tag, Some("Point"));
        assert_eq!(inner.record_field("x"), Some(&WireValue::I32(1)));
    }

    #[test]
    fn uuid_text_round_trip() {
        let u = [
            0x12, 0x34, 0x56, 0x78, 0x9a, 0xbc, 0xde, 0xf0, 0x11, 0x22, 0x33, 0x44, 0x55, 0x66,
            0x77, 0x88,
        ];
        let s = uuid_to_string(&u);
        assert_eq!(s, "12345678-9abc-def0-1122-334455667788");
        assert_eq!(parse_uuid(&s), Some(u));
        assert_eq!(parse_uuid(&s.to_uppercase()), Some(u));
        assert_eq!(parse_uuid("12345678"), None);
    }
}
