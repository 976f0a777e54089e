//! # Wire Contracts
//!
//! A `Wire` is one configured encoder/decoder pair bound to a buffer. The
//! wire universe is a closed sum: every encoding is a variant, and the
//! uniform writer/reader surfaces ([`ValueOut`], [`ValueIn`]) dispatch by
//! match rather than through trait objects.
//!
//! ## Writer Surface
//!
//! ```ignore
//! wire.write("trade")?.record(|w| {
//!     w.write("price")?.f64(123.456)?;
//!     w.write("side")?.type_prefix("Side")?.text("BUY")
//! })?;
//! ```
//!
//! ## Reader Surface
//!
//! Fields are located by name. A reader scanning for `price` that passes
//! other fields first remembers their positions, so later reads of those
//! fields jump straight back; reading a name that never appears yields an
//! absent `ValueIn` that pulls as type defaults. Both behaviors together
//! give forward and backward schema compatibility.

pub mod config;
pub mod state;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use eyre::{bail, Result};

pub use config::{CompressionCodec, WireConfig};

use crate::binary::BinaryWire;
use crate::buffer::Bytes;
use crate::cells::{Int32Ref, Int64ArrayRef, Int64Ref};
use crate::error::{wire_err, WireError, WireErrorKind};
use crate::marshal::{self, WireRecord};
use crate::text::{TextProfile, TextWire};
use crate::value::WireValue;

/// Classification of the next element, used by the any-object read path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeekKind {
    Null,
    Bool,
    Int,
    Float,
    Text,
    Bytes,
    Time,
    Date,
    DateTime,
    ZonedDateTime,
    Uuid,
    TypePrefix(String),
    TypeLiteral,
    Sequence,
    Record,
    I32Ref,
    I64Ref,
    I64ArrayRef,
    Compressed,
    EndOfValue,
}

/// One configured encoding bound to a buffer.
#[derive(Debug)]
pub enum Wire {
    Text(TextWire),
    Binary(BinaryWire),
}

/// The wire-type registry: every supported encoding configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireType {
    Text,
    Binary,
    BinaryFieldless,
    CompressedBinary,
    Raw,
    Json,
    Csv,
    ReadAny,
}

impl WireType {
    pub fn wire(self, bytes: Bytes) -> Wire {
        self.wire_with(bytes, WireConfig::default())
    }

    pub fn wire_with(self, bytes: Bytes, config: WireConfig) -> Wire {
        match self {
            WireType::Text => Wire::Text(TextWire::new(bytes, TextProfile::Yaml, config)),
            WireType::Json => Wire::Text(TextWire::new(bytes, TextProfile::Json, config)),
            WireType::Csv => Wire::Text(TextWire::new(bytes, TextProfile::Csv, config)),
            WireType::Binary => Wire::Binary(BinaryWire::new(bytes, config)),
            WireType::BinaryFieldless => {
                let config = WireConfig {
                    field_less: true,
                    ..config
                };
                Wire::Binary(BinaryWire::new(bytes, config))
            }
            WireType::CompressedBinary => {
                Wire::Binary(BinaryWire::new(bytes, config).with_compression())
            }
            WireType::Raw => Wire::Binary(BinaryWire::new(bytes, config).with_raw_framing()),
            WireType::ReadAny => {
                if looks_like_text(&bytes) {
                    Wire::Text(TextWire::new(bytes, TextProfile::Yaml, config))
                } else {
                    Wire::Binary(BinaryWire::new(bytes, config))
                }
            }
        }
    }
}

/// Sniffs whether a buffer holds the text encoding.
///
/// When the leading word parses as a plausible document header the probe
/// starts past it; text payloads are overwhelmingly printable ASCII while
/// binary payloads lead with high or control codes.
fn looks_like_text(bytes: &Bytes) -> bool {
    let start = bytes.read_pos();
    let limit = bytes.readable_limit();
    if start >= limit {
        return true;
    }
    let mut probe = start;
    if let Ok(word) = bytes.load_u32_at(start) {
        let len = crate::framing::length_of(word);
        if start + 4 + len <= limit {
            probe = start + 4;
        }
    }
    let window = limit.min(probe + 32) - probe;
    let Ok(sample) = bytes.slice(probe, window) else {
        return true;
    };
    if sample.is_empty() {
        return true;
    }
    let printable = sample
        .iter()
        .filter(|&&b| matches!(b, 0x20..=0x7e | b'\n' | b'\r' | b'\t'))
        .count();
    printable * 5 >= sample.len() * 4
}

#[derive(Debug)]
enum Located {
    Present,
    Restore(usize),
    Absent,
}

impl Wire {
    pub fn bytes(&self) -> &Bytes {
        with_wire!(self, w => w.bytes())
    }

    pub fn bytes_mut(&mut self) -> &mut Bytes {
        with_wire!(self, w => w.bytes_mut())
    }

    pub fn into_bytes(self) -> Bytes {
        with_wire!(self, w => w.into_bytes())
    }

    pub fn is_text(&self) -> bool {
        matches!(self, Wire::Text(_))
    }

    pub(crate) fn config(&self) -> &WireConfig {
        match self {
            Wire::Text(w) => &w.config,
            Wire::Binary(w) => &w.config,
        }
    }

    /// True for a binary wire that compresses sealed documents.
    pub(crate) fn compresses_documents(&self) -> bool {
        matches!(self, Wire::Binary(w) if w.compress_documents)
    }

    /// True for a binary wire configured without framing.
    pub fn is_raw(&self) -> bool {
        matches!(self, Wire::Binary(w) if w.raw)
    }

    pub fn reset_out_state(&mut self) {
        match self {
            Wire::Text(w) => w.reset_out_state(),
            Wire::Binary(w) => w.reset_out_state(),
        }
    }

    pub fn reset_in_state(&mut self) {
        match self {
            Wire::Text(w) => w.reset_in_state(),
            Wire::Binary(w) => w.reset_in_state(),
        }
    }

    /// Rewinds the read cursor to the buffer start and clears reader state.
    pub fn rewind_read(&mut self) {
        self.bytes_mut().set_read_pos(0);
        self.reset_in_state();
    }

    /// Emits a field name and returns the writer handle for its value.
    pub fn write(&mut self, name: &str) -> Result<ValueOut<'_>> {
        with_wire!(&mut *self, w => w.write_field(name))?;
        Ok(ValueOut { wire: self })
    }

    /// Writer handle for an unnamed (top-level or sequence item) value.
    pub fn value_out(&mut self) -> ValueOut<'_> {
        ValueOut { wire: self }
    }

    pub fn write_comment(&mut self, text: &str) -> Result<()> {
        with_wire!(&mut *self, w => w.write_comment(text))
    }

    pub(crate) fn read_field_name(&mut self) -> Result<Option<String>> {
        with_wire!(&mut *self, w => w.read_field_name())
    }

    pub(crate) fn skip_value(&mut self) -> Result<()> {
        with_wire!(&mut *self, w => w.skip_value())
    }

    pub(crate) fn measure_value(&mut self) -> Result<usize> {
        with_wire!(&mut *self, w => w.measure_value())
    }

    pub(crate) fn peek_kind(&mut self) -> Result<PeekKind> {
        with_wire!(&mut *self, w => w.peek_kind())
    }

    /// True when another element is readable in the current window.
    pub fn has_remaining(&mut self) -> Result<bool> {
        Ok(!matches!(self.peek_kind()?, PeekKind::EndOfValue))
    }

    fn locate(&mut self, name: &str) -> Result<Located> {
        if let Wire::Binary(b) = &*self {
            if b.config.field_less {
                return Ok(Located::Present);
            }
        }
        loop {
            match self.read_field_name()? {
                None => break,
                Some(n) if n == name => return Ok(Located::Present),
                Some(other) => {
                    let value_pos = self.bytes().read_pos();
                    self.skip_value()?;
                    match self {
                        Wire::Text(w) => w.reader.save(other, value_pos),
                        Wire::Binary(w) => w.reader.save(other, value_pos),
                    }
                }
            }
        }
        let after = self.bytes().read_pos();
        let saved = match self {
            Wire::Text(w) => w.reader.take_saved(name),
            Wire::Binary(w) => w.reader.take_saved(name),
        };
        match saved {
            Some(pos) => {
                self.bytes_mut().set_read_pos(pos);
                Ok(Located::Restore(after))
            }
            None => {
                self.bytes_mut().set_read_pos(after);
                Ok(Located::Absent)
            }
        }
    }

    /// Locates `name` and returns its reader handle. A name that never
    /// appears yields an absent handle pulling as type defaults.
    pub fn read(&mut self, name: &str) -> Result<ValueIn<'_>> {
        match self.locate(name)? {
            Located::Present => Ok(ValueIn {
                wire: self,
                present: true,
                restore_to: None,
            }),
            Located::Restore(after) => Ok(ValueIn {
                wire: self,
                present: true,
                restore_to: Some(after),
            }),
            Located::Absent => Ok(ValueIn {
                wire: self,
                present: false,
                restore_to: None,
            }),
        }
    }

    /// Like [`Wire::read`] but reports absence instead of defaulting.
    pub fn read_present(&mut self, name: &str) -> Result<Option<ValueIn<'_>>> {
        match self.locate(name)? {
            Located::Present => Ok(Some(ValueIn {
                wire: self,
                present: true,
                restore_to: None,
            })),
            Located::Restore(after) => Ok(Some(ValueIn {
                wire: self,
                present: true,
                restore_to: Some(after),
            })),
            Located::Absent => Ok(None),
        }
    }

    /// Reader handle for the next unnamed value.
    pub fn value_in(&mut self) -> ValueIn<'_> {
        ValueIn {
            wire: self,
            present: true,
            restore_to: None,
        }
    }

    /// Translates every remaining (field, value) pair into `dst`.
    ///
    /// Scalar semantics survive the copy even across encodings; only the
    /// layout differs.
    pub fn copy_to(&mut self, dst: &mut Wire) -> Result<()> {
        loop {
            match self.read_field_name()? {
                Some(name) => {
                    let value = self.value_in().object()?;
                    dst.write(&name)?.object(&value)?;
                }
                None => {
                    if !self.has_remaining()? {
                        return Ok(());
                    }
                    let value = self.value_in().object()?;
                    dst.value_out().object(&value)?;
                }
            }
        }
    }
}

/// One-shot writer handle for a single value.
#[must_use]
pub struct ValueOut<'a> {
    wire: &'a mut Wire,
}

impl<'a> ValueOut<'a> {
    /// Hints that the next composite should inline onto one line.
    pub fn leaf(self) -> ValueOut<'a> {
        match self.wire {
            Wire::Text(w) => w.set_leaf(true),
            Wire::Binary(w) => w.set_leaf(true),
        }
        self
    }

    /// Attaches a type tag to the value that follows.
    pub fn type_prefix(self, tag: &str) -> Result<ValueOut<'a>> {
        with_wire!(&mut *self.wire, w => w.write_type_prefix(tag))?;
        Ok(self)
    }

    pub fn bool(self, v: bool) -> Result<()> {
        with_wire!(self.wire, w => w.write_bool(v))
    }

    pub fn i8(self, v: i8) -> Result<()> {
        with_wire!(self.wire, w => w.write_i64(v as i64))
    }

    pub fn u8(self, v: u8) -> Result<()> {
        with_wire!(self.wire, w => w.write_u64(v as u64))
    }

    pub fn i16(self, v: i16) -> Result<()> {
        with_wire!(self.wire, w => w.write_i64(v as i64))
    }

    pub fn u16(self, v: u16) -> Result<()> {
        with_wire!(self.wire, w => w.write_u64(v as u64))
    }

    pub fn i32(self, v: i32) -> Result<()> {
        with_wire!(self.wire, w => w.write_i64(v as i64))
    }

    pub fn u32(self, v: u32) -> Result<()> {
        with_wire!(self.wire, w => w.write_u64(v as u64))
    }

    pub fn i64(self, v: i64) -> Result<()> {
        with_wire!(self.wire, w => w.write_i64(v))
    }

    pub fn u64(self, v: u64) -> Result<()> {
        with_wire!(self.wire, w => w.write_u64(v))
    }

    pub fn f32(self, v: f32) -> Result<()> {
        with_wire!(self.wire, w => w.write_f32(v))
    }

    pub fn f64(self, v: f64) -> Result<()> {
        with_wire!(self.wire, w => w.write_f64(v))
    }

    pub fn text(self, s: &str) -> Result<()> {
        with_wire!(self.wire, w => w.write_text(s))
    }

    pub fn bytes(self, b: &[u8]) -> Result<()> {
        with_wire!(self.wire, w => w.write_bytes(b))
    }

    pub fn time(self, v: NaiveTime) -> Result<()> {
        with_wire!(self.wire, w => w.write_time(v))
    }

    pub fn date(self, v: NaiveDate) -> Result<()> {
        with_wire!(self.wire, w => w.write_date(v))
    }

    pub fn date_time(self, v: NaiveDateTime) -> Result<()> {
        with_wire!(self.wire, w => w.write_date_time(v))
    }

    pub fn zoned_date_time(self, v: DateTime<FixedOffset>) -> Result<()> {
        with_wire!(self.wire, w => w.write_zoned_date_time(v))
    }

    pub fn uuid(self, v: [u8; 16]) -> Result<()> {
        with_wire!(self.wire, w => w.write_uuid(v))
    }

    pub fn null(self) -> Result<()> {
        with_wire!(self.wire, w => w.write_null())
    }

    pub fn type_literal(self, name: &str) -> Result<()> {
        with_wire!(self.wire, w => w.write_type_literal(name))
    }

    /// Emits a sequence; `f` writes the items through the same wire.
    pub fn sequence<F>(self, f: F) -> Result<()>
    where
        F: FnOnce(&mut Wire) -> Result<()>,
    {
        let wire = self.wire;
        with_wire!(&mut *wire, w => w.open_sequence())?;
        f(wire)?;
        with_wire!(&mut *wire, w => w.close_sequence())
    }

    /// Emits a record; `f` writes the named fields through the same wire.
    pub fn record<F>(self, f: F) -> Result<()>
    where
        F: FnOnce(&mut Wire) -> Result<()>,
    {
        let wire = self.wire;
        with_wire!(&mut *wire, w => w.open_record())?;
        f(wire)?;
        with_wire!(&mut *wire, w => w.close_record())
    }

    /// Serializes a record type through its descriptor.
    pub fn marshallable<T: WireRecord>(self, value: &T) -> Result<()> {
        marshal::write_record(self, value)
    }

    /// Writes an ordered string-keyed map as a record.
    pub fn map(self, entries: &[(String, WireValue)]) -> Result<()> {
        self.record(|w| {
            for (k, v) in entries {
                w.write(k)?.object(v)?;
            }
            Ok(())
        })
    }

    pub fn int32_ref(self, init: i32) -> Result<Int32Ref> {
        with_wire!(self.wire, w => w.write_i32_ref(init))
    }

    pub fn int64_ref(self, init: i64) -> Result<Int64Ref> {
        with_wire!(self.wire, w => w.write_i64_ref(init))
    }

    pub fn int64_array(self, capacity: usize) -> Result<Int64ArrayRef> {
        with_wire!(self.wire, w => w.write_i64_array_ref(capacity))
    }

    /// Wraps `raw` in a compressed sub-blob tagged by codec name.
    pub fn compressed(self, codec: &str, raw: &[u8]) -> Result<()> {
        with_wire!(self.wire, w => w.write_compressed(codec, raw))
    }

    /// Polymorphic write: inspects the value and selects the narrowest
    /// emitter, falling back to the strategy-style composite forms.
    pub fn object(self, v: &WireValue) -> Result<()> {
        match v {
            WireValue::Null => self.null(),
            WireValue::Bool(b) => self.bool(*b),
            WireValue::I8(n) => self.exact_int(*n as i128),
            WireValue::U8(n) => self.exact_int(*n as i128),
            WireValue::I16(n) => self.exact_int(*n as i128),
            WireValue::U16(n) => self.exact_int(*n as i128),
            WireValue::I32(n) => self.exact_int(*n as i128),
            WireValue::U32(n) => self.exact_int(*n as i128),
            WireValue::I64(n) => self.exact_int(*n as i128),
            WireValue::U64(n) => self.exact_int(*n as i128),
            WireValue::F32(x) => self.f64(*x as f64),
            WireValue::F64(x) => self.f64(*x),
            WireValue::Text(s) => self.text(s),
            WireValue::Bytes(b) => self.type_prefix("byte[]")?.bytes(b),
            WireValue::Time(t) => self.time(*t),
            WireValue::Date(d) => self.date(*d),
            WireValue::DateTime(dt) => self.date_time(*dt),
            WireValue::ZonedDateTime(z) => self.zoned_date_time(*z),
            WireValue::Uuid(u) => self.type_prefix("uuid")?.uuid(*u),
            WireValue::TypeLiteral(n) => self.type_literal(n),
            WireValue::Sequence(items) => self.sequence(|w| {
                for item in items {
                    w.value_out().object(item)?;
                }
                Ok(())
            }),
            WireValue::Map(entries) => self.record(|w| {
                for (k, v) in entries {
                    let key = map_key_text(k)?;
                    w.write(&key)?.object(v)?;
                }
                Ok(())
            }),
            WireValue::Record(fields) => self.record(|w| {
                for (name, value) in fields {
                    w.write(name)?.object(value)?;
                }
                Ok(())
            }),
            WireValue::Typed { tag, value } => self.type_prefix(tag)?.object(value),
        }
    }

    fn exact_int(self, v: i128) -> Result<()> {
        if let Ok(n) = i64::try_from(v) {
            self.i64(n)
        } else if let Ok(n) = u64::try_from(v) {
            self.u64(n)
        } else {
            bail!("integer {} exceeds the wire's 64-bit range", v)
        }
    }
}

/// Renders a map key as a field name; only scalar keys have a stable
/// textual form.
fn map_key_text(key: &WireValue) -> Result<String> {
    Ok(match key {
        WireValue::Text(s) => s.clone(),
        WireValue::Bool(b) => b.to_string(),
        other => match other.as_i64() {
            Some(n) => n.to_string(),
            None => match other {
                WireValue::F64(f) => f.to_string(),
                WireValue::U64(u) => u.to_string(),
                _ => bail!("map key of kind {} has no field-name form", other.kind_name()),
            },
        },
    })
}

/// One-shot reader handle for a single value.
#[must_use]
pub struct ValueIn<'a> {
    wire: &'a mut Wire,
    present: bool,
    restore_to: Option<usize>,
}

impl<'a> ValueIn<'a> {
    pub fn is_present(&self) -> bool {
        self.present
    }

    fn apply<R>(self, f: impl FnOnce(&mut Wire) -> Result<R>) -> Result<R> {
        let restore = self.restore_to;
        let wire = self.wire;
        let out = f(wire);
        if let Some(p) = restore {
            wire.bytes_mut().set_read_pos(p);
        }
        out
    }

    /// Byte span of the value without consuming it.
    pub fn read_length(&mut self) -> Result<usize> {
        if !self.present {
            return Ok(0);
        }
        with_wire!(&mut *self.wire, w => w.measure_value())
    }

    pub fn skip(self) -> Result<()> {
        if !self.present {
            return Ok(());
        }
        self.apply(|wire| wire.skip_value())
    }

    /// Consumes the null sentinel if present; true when the value was null.
    pub fn null(self) -> Result<bool> {
        if !self.present {
            return Ok(true);
        }
        self.apply(|wire| with_wire!(&mut *wire, w => w.read_null()))
    }

    pub fn is_null(&mut self) -> Result<bool> {
        if !self.present {
            return Ok(true);
        }
        Ok(matches!(self.wire.peek_kind()?, PeekKind::Null))
    }

    /// Consumes a type prefix when the value carries one.
    pub fn type_prefix(&mut self) -> Result<Option<String>> {
        if !self.present {
            return Ok(None);
        }
        with_wire!(&mut *self.wire, w => w.read_type_prefix())
    }

    pub fn bool(self) -> Result<bool> {
        if !self.present {
            return Ok(false);
        }
        self.apply(|wire| with_wire!(&mut *wire, w => w.read_bool()))
    }

    fn int_checked<T>(self, width: &str) -> Result<T>
    where
        T: TryFrom<i128> + Default,
    {
        if !self.present {
            return Ok(T::default());
        }
        self.apply(|wire| {
            let start = wire.bytes().read_pos();
            let wide = with_wire!(&mut *wire, w => w.read_int())?;
            match T::try_from(wide) {
                Ok(v) => Ok(v),
                Err(_) => {
                    wire.bytes_mut().set_read_pos(start);
                    Err(wire_err(
                        WireErrorKind::RangeViolation,
                        start,
                        wire.bytes().all_readable(),
                        format!("stored integer {} does not fit {}", wide, width),
                    ))
                }
            }
        })
    }

    pub fn i8(self) -> Result<i8> {
        self.int_checked("int8")
    }

    pub fn u8(self) -> Result<u8> {
        self.int_checked("uint8")
    }

    pub fn i16(self) -> Result<i16> {
        self.int_checked("int16")
    }

    pub fn u16(self) -> Result<u16> {
        self.int_checked("uint16")
    }

    pub fn i32(self) -> Result<i32> {
        self.int_checked("int32")
    }

    pub fn u32(self) -> Result<u32> {
        self.int_checked("uint32")
    }

    pub fn i64(self) -> Result<i64> {
        self.int_checked("int64")
    }

    pub fn u64(self) -> Result<u64> {
        self.int_checked("uint64")
    }

    pub fn f32(self) -> Result<f32> {
        Ok(self.f64()? as f32)
    }

    pub fn f64(self) -> Result<f64> {
        if !self.present {
            return Ok(0.0);
        }
        self.apply(|wire| with_wire!(&mut *wire, w => w.read_f64()))
    }

    /// Pulls text; a null sentinel or an absent field yields `None`.
    pub fn text(self) -> Result<Option<String>> {
        if !self.present {
            return Ok(None);
        }
        self.apply(|wire| with_wire!(&mut *wire, w => w.read_text()))
    }

    pub fn bytes(self) -> Result<Vec<u8>> {
        if !self.present {
            return Ok(Vec::new());
        }
        self.apply(|wire| {
            // A byte-array typed field carries a `byte[]` prefix.
            if let PeekKind::TypePrefix(tag) = wire.peek_kind()? {
                if tag == "byte[]" {
                    with_wire!(&mut *wire, w => w.read_type_prefix())?;
                }
            }
            if with_wire!(&mut *wire, w => w.read_null())? {
                return Ok(Vec::new());
            }
            with_wire!(&mut *wire, w => w.read_bytes())
        })
    }

    pub fn time(self) -> Result<NaiveTime> {
        if !self.present {
            return Ok(NaiveTime::default());
        }
        self.apply(|wire| with_wire!(&mut *wire, w => w.read_time()))
    }

    pub fn date(self) -> Result<NaiveDate> {
        if !self.present {
            return Ok(NaiveDate::default());
        }
        self.apply(|wire| with_wire!(&mut *wire, w => w.read_date()))
    }

    pub fn date_time(self) -> Result<NaiveDateTime> {
        if !self.present {
            return Ok(NaiveDateTime::default());
        }
        self.apply(|wire| with_wire!(&mut *wire, w => w.read_date_time()))
    }

    pub fn zoned_date_time(self) -> Result<DateTime<FixedOffset>> {
        if !self.present {
            return Ok(NaiveDateTime::default().and_utc().fixed_offset());
        }
        self.apply(|wire| with_wire!(&mut *wire, w => w.read_zoned_date_time()))
    }

    pub fn uuid(self) -> Result<[u8; 16]> {
        if !self.present {
            return Ok([0; 16]);
        }
        self.apply(|wire| with_wire!(&mut *wire, w => w.read_uuid()))
    }

    pub fn type_literal(self) -> Result<String> {
        self.apply(|wire| with_wire!(&mut *wire, w => w.read_type_literal()))
    }

    /// Pulls sequence items until the terminator; `f` receives a reader
    /// handle per item.
    pub fn sequence<F>(self, mut f: F) -> Result<()>
    where
        F: FnMut(ValueIn<'_>) -> Result<()>,
    {
        if !self.present {
            return Ok(());
        }
        self.apply(|wire| {
            with_wire!(&mut *wire, w => w.open_sequence_read())?;
            let result = (|| {
                loop {
                    let has = with_wire!(&mut *wire, w => w.seq_has_next())?;
                    if !has {
                        return Ok(());
                    }
                    f(ValueIn {
                        wire: &mut *wire,
                        present: true,
                        restore_to: None,
                    })?;
                }
            })();
            with_wire!(&mut *wire, w => w.close_sequence_read())?;
            result
        })
    }

    /// Pulls a record; `f` reads the inner fields by name. The read limit
    /// is clipped to the record's measured length, and the cursor lands
    /// past the record on exit regardless of how much `f` consumed.
    pub fn record<F>(self, f: F) -> Result<()>
    where
        F: FnOnce(&mut Wire) -> Result<()>,
    {
        if !self.present {
            return Ok(());
        }
        self.apply(|wire| {
            with_wire!(&mut *wire, w => w.open_record_read())?;
            let result = f(&mut *wire);
            with_wire!(&mut *wire, w => w.close_record_read())?;
            result
        })
    }

    /// Reads a record as an ordered map of (key, value) entries.
    pub fn map(self) -> Result<Vec<(String, WireValue)>> {
        let mut entries = Vec::new();
        self.record(|w| {
            while let Some(name) = w.read_field_name()? {
                let value = w.value_in().object()?;
                entries.push((name, value));
            }
            Ok(())
        })?;
        Ok(entries)
    }

    /// Deserializes a record type through its descriptor.
    pub fn marshallable<T: WireRecord>(self, target: &mut T, overwrite: bool) -> Result<()> {
        marshal::read_record(self, target, overwrite)
    }

    pub fn int32_ref(self) -> Result<Int32Ref> {
        self.apply(|wire| with_wire!(&mut *wire, w => w.read_i32_ref()))
    }

    pub fn int64_ref(self) -> Result<Int64Ref> {
        self.apply(|wire| with_wire!(&mut *wire, w => w.read_i64_ref()))
    }

    pub fn int64_array(self) -> Result<Int64ArrayRef> {
        self.apply(|wire| with_wire!(&mut *wire, w => w.read_i64_array_ref()))
    }

    /// Reads a compressed sub-blob, returning the decompressed payload.
    pub fn compressed(self) -> Result<Vec<u8>> {
        self.apply(|wire| with_wire!(&mut *wire, w => w.read_compressed()))
    }

    /// The any-object read: peeks the next element and routes. Dynamic
    /// integer reads canonicalize to `I64`/`U64` and floats to `F64`.
    pub fn object(self) -> Result<WireValue> {
        if !self.present {
            return Ok(WireValue::Null);
        }
        self.apply(read_object)
    }
}

pub(crate) fn read_object(wire: &mut Wire) -> Result<WireValue> {
    match wire.peek_kind()? {
        PeekKind::Null => {
            with_wire!(&mut *wire, w => w.read_null())?;
            Ok(WireValue::Null)
        }
        PeekKind::Bool => Ok(WireValue::Bool(with_wire!(&mut *wire, w => w.read_bool())?)),
        PeekKind::Int => {
            let wide = with_wire!(&mut *wire, w => w.read_int())?;
            if let Ok(v) = i64::try_from(wide) {
                Ok(WireValue::I64(v))
            } else if let Ok(v) = u64::try_from(wide) {
                Ok(WireValue::U64(v))
            } else {
                bail!("stored integer {} exceeds the 64-bit value universe", wide)
            }
        }
        PeekKind::Float => Ok(WireValue::F64(with_wire!(&mut *wire, w => w.read_f64())?)),
        PeekKind::Text => {
            let text = with_wire!(&mut *wire, w => w.read_text())?;
            Ok(text.map(WireValue::Text).unwrap_or(WireValue::Null))
        }
        PeekKind::Bytes => Ok(WireValue::Bytes(with_wire!(&mut *wire, w => w.read_bytes())?)),
        PeekKind::Time => Ok(WireValue::Time(with_wire!(&mut *wire, w => w.read_time())?)),
        PeekKind::Date => Ok(WireValue::Date(with_wire!(&mut *wire, w => w.read_date())?)),
        PeekKind::DateTime => Ok(WireValue::DateTime(
            with_wire!(&mut *wire, w => w.read_date_time())?,
        )),
        PeekKind::ZonedDateTime => Ok(WireValue::ZonedDateTime(
            with_wire!(&mut *wire, w => w.read_zoned_date_time())?,
        )),
        PeekKind::Uuid => Ok(WireValue::Uuid(with_wire!(&mut *wire, w => w.read_uuid())?)),
        PeekKind::TypeLiteral => Ok(WireValue::TypeLiteral(
            with_wire!(&mut *wire, w => w.read_type_literal())?,
        )),
        PeekKind::Sequence => read_sequence_value(wire),
        PeekKind::Record => read_record_value(wire),
        PeekKind::I32Ref => {
            let cell = with_wire!(&mut *wire, w => w.read_i32_ref())?;
            Ok(WireValue::I32(cell.get(wire.bytes())?))
        }
        PeekKind::I64Ref => {
            let cell = with_wire!(&mut *wire, w => w.read_i64_ref())?;
            Ok(WireValue::I64(cell.get(wire.bytes())?))
        }
        PeekKind::I64ArrayRef => {
            let cell = with_wire!(&mut *wire, w => w.read_i64_array_ref())?;
            let mut items = Vec::with_capacity(cell.capacity());
            for i in 0..cell.capacity() {
                items.push(WireValue::I64(cell.get(wire.bytes(), i)?));
            }
            Ok(WireValue::Sequence(items))
        }
        PeekKind::Compressed => Ok(WireValue::Bytes(
            with_wire!(&mut *wire, w => w.read_compressed())?,
        )),
        PeekKind::TypePrefix(tag) => {
            with_wire!(&mut *wire, w => w.read_type_prefix())?;
            read_typed_value(wire, tag)
        }
        PeekKind::EndOfValue => {
            let pos = wire.bytes().read_pos();
            Err(wire_err(
                WireErrorKind::Truncation,
                pos,
                wire.bytes().all_readable(),
                "expected a value",
            ))
        }
    }
}

fn read_sequence_value(wire: &mut Wire) -> Result<WireValue> {
    let mut items = Vec::new();
    with_wire!(&mut *wire, w => w.open_sequence_read())?;
    loop {
        let has = with_wire!(&mut *wire, w => w.seq_has_next())?;
        if !has {
            break;
        }
        items.push(read_object(wire)?);
    }
    with_wire!(&mut *wire, w => w.close_sequence_read())?;
    Ok(WireValue::Sequence(items))
}

fn read_record_value(wire: &mut Wire) -> Result<WireValue> {
    let mut fields = Vec::new();
    with_wire!(&mut *wire, w => w.open_record_read())?;
    let result: Result<()> = (|| {
        while let Some(name) = wire.read_field_name()? {
            let value = read_object(wire)?;
            fields.push((name, value));
        }
        Ok(())
    })();
    with_wire!(&mut *wire, w => w.close_record_read())?;
    result?;
    Ok(WireValue::Record(fields))
}

/// Reads the value following a consumed `tag` prefix, consulting the
/// strategy table for the bracket form and read behavior.
fn read_typed_value(wire: &mut Wire, tag: String) -> Result<WireValue> {
    // Built-in tags first.
    match tag.as_str() {
        "byte[]" => {
            if with_wire!(&mut *wire, w => w.read_null())? {
                return Ok(WireValue::Null);
            }
            return Ok(WireValue::Bytes(with_wire!(&mut *wire, w => w.read_bytes())?));
        }
        "uuid" => return Ok(WireValue::Uuid(with_wire!(&mut *wire, w => w.read_uuid())?)),
        _ => {}
    }
    if let Some(strategy) = marshal::strategy::lookup(&tag) {
        let value = strategy.read_dynamic(wire)?;
        return Ok(WireValue::Typed {
            tag,
            value: Box::new(value),
        });
    }
    // Unknown tag: when the following value is structurally readable keep
    // it, otherwise surface the tag. The any-object caller maps a skipped
    // unknown to null.
    match wire.peek_kind()? {
        PeekKind::EndOfValue => {
            let pos = wire.bytes().read_pos();
            Err(Into::<eyre::Report>::into(WireError::new(
                WireErrorKind::UnknownTypeTag,
                pos,
                format!("type tag '{tag}' is not registered"),
            )))
        }
        _ => {
            let value = read_object(wire)?;
            Ok(WireValue::Typed {
                tag,
                value: Box::new(value),
            })
        }
    }
}
