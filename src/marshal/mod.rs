//! # Reflective Marshaller
//!
//! Record types serialize through a cached descriptor: an ordered list of
//! field accessors, each carrying the field's declared name and read,
//! write, reset, and equality paths specialized to the declared kind.
//! Descriptors are built once per type (`OnceLock`) by the `wire_record!`
//! macro and composed for embedded bases, so a record's field list is the
//! concatenation of its base descriptors followed by its own fields.
//!
//! ## Compatibility
//!
//! Reading tolerates any difference between the written field set and the
//! descriptor: fields present only on the wire are skipped by measured
//! length, and fields present only in the descriptor keep their in-object
//! values (merge mode) or reset to defaults (overwrite mode).
//!
//! ## Derived Operations
//!
//! Equality compares through the accessors; deep copy routes the source
//! through a scratch binary wire and back.

pub mod strategy;

use std::sync::OnceLock;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use eyre::Result;

use crate::buffer::Bytes;
use crate::value::WireValue;
use crate::wire::{ValueIn, ValueOut, WireType};

/// A record type with a cached wire descriptor.
pub trait WireRecord: Sized + 'static {
    /// The tag written when this record carries a type prefix.
    fn type_tag() -> &'static str;

    fn descriptor() -> &'static Descriptor<Self>;

    fn default_record() -> Self;
}

/// An enum serializable as its variant name.
pub trait WireEnum: Sized + Copy + 'static {
    fn variant_name(&self) -> &'static str;
    fn from_variant_name(name: &str) -> Option<Self>;
    fn variants() -> &'static [&'static str];
    fn default_variant() -> Self;
}

/// A field type with direct read/write paths.
///
/// Implemented for scalars, strings, blobs, collections of field types,
/// and the dynamic `WireValue`; record-typed and enum-typed fields go
/// through the dedicated `FieldAccessor` constructors instead.
pub trait WireField: Sized + 'static {
    const SCALAR: bool = true;

    fn write_field(&self, out: ValueOut<'_>) -> Result<()>;
    fn read_field(&mut self, v: ValueIn<'_>) -> Result<()>;
    fn default_field() -> Self;

    fn reset_field(&mut self) {
        *self = Self::default_field();
    }

    fn field_eq(&self, other: &Self) -> bool;
}

type WriteFn<T> = Box<dyn for<'a> Fn(&T, ValueOut<'a>) -> Result<()> + Send + Sync>;
type ReadFn<T> = Box<dyn for<'a> Fn(&mut T, ValueIn<'a>) -> Result<()> + Send + Sync>;
type ResetFn<T> = Box<dyn Fn(&mut T) + Send + Sync>;
type EqFn<T> = Box<dyn Fn(&T, &T) -> bool + Send + Sync>;

/// One field's name and specialized access paths.
pub struct FieldAccessor<T> {
    name: &'static str,
    scalar: bool,
    write: WriteFn<T>,
    read: ReadFn<T>,
    reset: ResetFn<T>,
    equal: EqFn<T>,
}

impl<T> std::fmt::Debug for FieldAccessor<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FieldAccessor")
            .field("name", &self.name)
            .field("scalar", &self.scalar)
            .finish()
    }
}

impl<T: 'static> FieldAccessor<T> {
    /// Accessor for a field whose type has direct read/write paths.
    pub fn of<F: WireField>(
        name: &'static str,
        get: fn(&T) -> &F,
        get_mut: fn(&mut T) -> &mut F,
    ) -> Self {
        Self {
            name,
            scalar: F::SCALAR,
            write: Box::new(move |t, out| get(t).write_field(out)),
            read: Box::new(move |t, v| get_mut(t).read_field(v)),
            reset: Box::new(move |t| get_mut(t).reset_field()),
            equal: Box::new(move |a, b| get(a).field_eq(get(b))),
        }
    }

    /// Accessor for a nested record field.
    pub fn record_field<B: WireRecord>(
        name: &'static str,
        get: fn(&T) -> &B,
        get_mut: fn(&mut T) -> &mut B,
    ) -> Self {
        Self {
            name,
            scalar: false,
            write: Box::new(move |t, out| write_record(out, get(t))),
            read: Box::new(move |t, v| read_record(v, get_mut(t), true)),
            reset: Box::new(move |t| *get_mut(t) = B::default_record()),
            equal: Box::new(move |a, b| record_eq(get(a), get(b))),
        }
    }

    /// Accessor for an optional nested record field; `None` writes the
    /// null sentinel and null reads back as `None`.
    pub fn record_opt<B: WireRecord>(
        name: &'static str,
        get: fn(&T) -> &Option<B>,
        get_mut: fn(&mut T) -> &mut Option<B>,
    ) -> Self {
        Self {
            name,
            scalar: false,
            write: Box::new(move |t, out| match get(t) {
                Some(b) => write_record(out, b),
                None => out.null(),
            }),
            read: Box::new(move |t, mut v| {
                if v.is_null()? {
                    v.null()?;
                    *get_mut(t) = None;
                    return Ok(());
                }
                let slot = get_mut(t);
                if slot.is_none() {
                    *slot = Some(B::default_record());
                }
                read_record(v, slot.as_mut().unwrap(), true)
            }),
            reset: Box::new(move |t| *get_mut(t) = None),
            equal: Box::new(move |a, b| match (get(a), get(b)) {
                (None, None) => true,
                (Some(x), Some(y)) => record_eq(x, y),
                _ => false,
            }),
        }
    }

    /// Accessor for an enum field, serialized as its variant name.
    pub fn enum_field<E: WireEnum>(
        name: &'static str,
        get: fn(&T) -> &E,
        get_mut: fn(&mut T) -> &mut E,
    ) -> Self {
        Self {
            name,
            scalar: true,
            write: Box::new(move |t, out| out.text(get(t).variant_name())),
            read: Box::new(move |t, v| {
                match v.text()? {
                    None => *get_mut(t) = E::default_variant(),
                    Some(s) => match E::from_variant_name(&s) {
                        Some(e) => *get_mut(t) = e,
                        None => eyre::bail!("'{}' is not a variant of the enum field '{}'", s, name),
                    },
                }
                Ok(())
            }),
            reset: Box::new(move |t| *get_mut(t) = E::default_variant()),
            equal: Box::new(move |a, b| get(a).variant_name() == get(b).variant_name()),
        }
    }

    /// Accessor for an ordered string-keyed map field, serialized as a
    /// record of (key, value) pairs.
    pub fn map_field<F: WireField>(
        name: &'static str,
        get: fn(&T) -> &Vec<(String, F)>,
        get_mut: fn(&mut T) -> &mut Vec<(String, F)>,
    ) -> Self {
        Self {
            name,
            scalar: false,
            write: Box::new(move |t, out| {
                out.record(|w| {
                    for (k, item) in get(t) {
                        item.write_field(w.write(k)?)?;
                    }
                    Ok(())
                })
            }),
            read: Box::new(move |t, v| {
                let entries = get_mut(t);
                entries.clear();
                v.record(|w| {
                    while let Some(key) = w.read_field_name()? {
                        let mut slot = F::default_field();
                        slot.read_field(w.value_in())?;
                        entries.push((key, slot));
                    }
                    Ok(())
                })
            }),
            reset: Box::new(move |t| get_mut(t).clear()),
            equal: Box::new(move |a, b| {
                let (a, b) = (get(a), get(b));
                a.len() == b.len()
                    && a.iter()
                        .zip(b)
                        .all(|((ka, x), (kb, y))| ka == kb && x.field_eq(y))
            }),
        }
    }

    /// Accessor for an opaque blob field, emitted as a tagged byte array
    /// rather than a sequence of integers.
    pub fn bytes_field(
        name: &'static str,
        get: fn(&T) -> &Vec<u8>,
        get_mut: fn(&mut T) -> &mut Vec<u8>,
    ) -> Self {
        Self {
            name,
            scalar: true,
            write: Box::new(move |t, out| out.type_prefix("byte[]")?.bytes(get(t))),
            read: Box::new(move |t, v| {
                *get_mut(t) = v.bytes()?;
                Ok(())
            }),
            reset: Box::new(move |t| get_mut(t).clear()),
            equal: Box::new(move |a, b| get(a) == get(b)),
        }
    }

    /// Splices an embedded base record's fields into the outer descriptor;
    /// base fields serialize first, matching declaration-order semantics.
    pub fn embedded<B: WireRecord>(
        get: fn(&T) -> &B,
        get_mut: fn(&mut T) -> &mut B,
    ) -> Vec<FieldAccessor<T>> {
        B::descriptor()
            .fields()
            .iter()
            .map(|fa: &'static FieldAccessor<B>| FieldAccessor::<T> {
                name: fa.name,
                scalar: fa.scalar,
                write: Box::new(move |t, out| (fa.write)(get(t), out)),
                read: Box::new(move |t, v| (fa.read)(get_mut(t), v)),
                reset: Box::new(move |t| (fa.reset)(get_mut(t))),
                equal: Box::new(move |a, b| (fa.equal)(get(a), get(b))),
            })
            .collect()
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

/// Ordered field accessors for one record type.
#[derive(Debug)]
pub struct Descriptor<T> {
    fields: Vec<FieldAccessor<T>>,
}

impl<T: 'static> Descriptor<T> {
    pub fn new(fields: Vec<FieldAccessor<T>>) -> Self {
        Self { fields }
    }

    pub fn fields(&self) -> &[FieldAccessor<T>] {
        &self.fields
    }

    /// A record of nothing but scalars inlines onto one line in text.
    pub fn is_leaf(&self) -> bool {
        self.fields.iter().all(|f| f.scalar)
    }

    pub fn equal(&self, a: &T, b: &T) -> bool {
        self.fields.iter().all(|f| (f.equal)(a, b))
    }
}

/// Serializes `value` as a record through its descriptor.
pub fn write_record<T: WireRecord>(out: ValueOut<'_>, value: &T) -> Result<()> {
    let desc = T::descriptor();
    let out = if desc.is_leaf() { out.leaf() } else { out };
    out.record(|w| {
        for fa in desc.fields() {
            let vout = w.write(fa.name)?;
            (fa.write)(value, vout)?;
        }
        Ok(())
    })
}

/// Deserializes into `target`.
///
/// With `overwrite` set every descriptor field is written from the stream
/// and absent fields reset to their defaults; without it absent fields
/// retain their in-object values (merge semantics for partial updates).
pub fn read_record<T: WireRecord>(vin: ValueIn<'_>, target: &mut T, overwrite: bool) -> Result<()> {
    let mut vin = vin;
    if !vin.is_present() {
        if overwrite {
            for fa in T::descriptor().fields() {
                (fa.reset)(target);
            }
        }
        return Ok(());
    }
    if vin.is_null()? {
        vin.null()?;
        if overwrite {
            for fa in T::descriptor().fields() {
                (fa.reset)(target);
            }
        }
        return Ok(());
    }
    // A typed record may carry its tag; the tag is advisory here.
    let _ = vin.type_prefix()?;
    vin.record(|w| {
        for fa in T::descriptor().fields() {
            match w.read_present(fa.name)? {
                Some(v) => (fa.read)(target, v)?,
                None => {
                    if overwrite {
                        (fa.reset)(target);
                    }
                }
            }
        }
        Ok(())
    })
}

/// Descriptor-driven equality.
pub fn record_eq<T: WireRecord>(a: &T, b: &T) -> bool {
    T::descriptor().equal(a, b)
}

/// Deep copy by routing through a scratch binary wire.
pub fn deep_copy<T: WireRecord>(value: &T) -> Result<T> {
    let mut wire = WireType::Binary.wire(Bytes::elastic());
    wire.value_out().marshallable(value)?;
    wire.rewind_read();
    let mut out = T::default_record();
    wire.value_in().marshallable(&mut out, true)?;
    Ok(out)
}

macro_rules! int_wire_field {
    ($($ty:ty => $write:ident / $read:ident),* $(,)?) => {
        $(
            impl WireField for $ty {
                fn write_field(&self, out: ValueOut<'_>) -> Result<()> {
                    out.$write(*self)
                }

                fn read_field(&mut self, v: ValueIn<'_>) -> Result<()> {
                    *self = v.$read()?;
                    Ok(())
                }

                fn default_field() -> Self {
                    0
                }

                fn field_eq(&self, other: &Self) -> bool {
                    self == other
                }
            }
        )*
    };
}

int_wire_field! {
    i8 => i8 / i8,
    u8 => u8 / u8,
    i16 => i16 / i16,
    u16 => u16 / u16,
    i32 => i32 / i32,
    u32 => u32 / u32,
    i64 => i64 / i64,
    u64 => u64 / u64,
}

impl WireField for bool {
    fn write_field(&self, out: ValueOut<'_>) -> Result<()> {
        out.bool(*self)
    }

    fn read_field(&mut self, v: ValueIn<'_>) -> Result<()> {
        *self = v.bool()?;
        Ok(())
    }

    fn default_field() -> Self {
        false
    }

    fn field_eq(&self, other: &Self) -> bool {
        self == other
    }
}

impl WireField for f32 {
    fn write_field(&self, out: ValueOut<'_>) -> Result<()> {
        out.f32(*self)
    }

    fn read_field(&mut self, v: ValueIn<'_>) -> Result<()> {
        *self = v.f32()?;
        Ok(())
    }

    fn default_field() -> Self {
        0.0
    }

    fn field_eq(&self, other: &Self) -> bool {
        self.to_bits() == other.to_bits()
    }
}

impl WireField for f64 {
    fn write_field(&self, out: ValueOut<'_>) -> Result<()> {
        out.f64(*self)
    }

    fn read_field(&mut self, v: ValueIn<'_>) -> Result<()> {
        *self = v.f64()?;
        Ok(())
    }

    fn default_field() -> Self {
        0.0
    }

    fn field_eq(&self, other: &Self) -> bool {
        self.to_bits() == other.to_bits()
    }
}

impl WireField for String {
    fn write_field(&self, out: ValueOut<'_>) -> Result<()> {
        out.text(self)
    }

    fn read_field(&mut self, v: ValueIn<'_>) -> Result<()> {
        *self = v.text()?.unwrap_or_default();
        Ok(())
    }

    fn default_field() -> Self {
        String::new()
    }

    fn field_eq(&self, other: &Self) -> bool {
        self == other
    }
}

impl WireField for Option<String> {
    fn write_field(&self, out: ValueOut<'_>) -> Result<()> {
        match self {
            Some(s) => out.text(s),
            None => out.null(),
        }
    }

    fn read_field(&mut self, v: ValueIn<'_>) -> Result<()> {
        *self = v.text()?;
        Ok(())
    }

    fn default_field() -> Self {
        None
    }

    fn field_eq(&self, other: &Self) -> bool {
        self == other
    }
}

impl WireField for [u8; 16] {
    fn write_field(&self, out: ValueOut<'_>) -> Result<()> {
        out.uuid(*self)
    }

    fn read_field(&mut self, v: ValueIn<'_>) -> Result<()> {
        *self = v.uuid()?;
        Ok(())
    }

    fn default_field() -> Self {
        [0; 16]
    }

    fn field_eq(&self, other: &Self) -> bool {
        self == other
    }
}

impl WireField for WireValue {
    const SCALAR: bool = false;

    fn write_field(&self, out: ValueOut<'_>) -> Result<()> {
        out.object(self)
    }

    fn read_field(&mut self, v: ValueIn<'_>) -> Result<()> {
        *self = v.object()?;
        Ok(())
    }

    fn default_field() -> Self {
        WireValue::Null
    }

    fn field_eq(&self, other: &Self) -> bool {
        self == other
    }
}

impl WireField for NaiveTime {
    fn write_field(&self, out: ValueOut<'_>) -> Result<()> {
        out.time(*self)
    }

    fn read_field(&mut self, v: ValueIn<'_>) -> Result<()> {
        *self = v.time()?;
        Ok(())
    }

    fn default_field() -> Self {
        NaiveTime::default()
    }

    fn field_eq(&self, other: &Self) -> bool {
        self == other
    }
}

impl WireField for NaiveDate {
    fn write_field(&self, out: ValueOut<'_>) -> Result<()> {
        out.date(*self)
    }

    fn read_field(&mut self, v: ValueIn<'_>) -> Result<()> {
        *self = v.date()?;
        Ok(())
    }

    fn default_field() -> Self {
        NaiveDate::default()
    }

    fn field_eq(&self, other: &Self) -> bool {
        self == other
    }
}

impl WireField for NaiveDateTime {
    fn write_field(&self, out: ValueOut<'_>) -> Result<()> {
        out.date_time(*self)
    }

    fn read_field(&mut self, v: ValueIn<'_>) -> Result<()> {
        *self = v.date_time()?;
        Ok(())
    }

    fn default_field() -> Self {
        NaiveDateTime::default()
    }

    fn field_eq(&self, other: &Self) -> bool {
        self == other
    }
}

impl WireField for DateTime<FixedOffset> {
    fn write_field(&self, out: ValueOut<'_>) -> Result<()> {
        out.zoned_date_time(*self)
    }

    fn read_field(&mut self, v: ValueIn<'_>) -> Result<()> {
        *self = v.zoned_date_time()?;
        Ok(())
    }

    fn default_field() -> Self {
        NaiveDateTime::default().and_utc().fixed_offset()
    }

    fn field_eq(&self, other: &Self) -> bool {
        self == other
    }
}

impl<F: WireField> WireField for Vec<F> {
    const SCALAR: bool = false;

    fn write_field(&self, out: ValueOut<'_>) -> Result<()> {
        out.sequence(|w| {
            for item in self {
                item.write_field(w.value_out())?;
            }
            Ok(())
        })
    }

    fn read_field(&mut self, v: ValueIn<'_>) -> Result<()> {
        self.clear();
        v.sequence(|item| {
            let mut slot = F::default_field();
            slot.read_field(item)?;
            self.push(slot);
            Ok(())
        })
    }

    fn default_field() -> Self {
        Vec::new()
    }

    fn field_eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().zip(other).all(|(a, b)| a.field_eq(b))
    }
}

/// Builds a descriptor exactly once per type.
pub fn cached_descriptor<T: 'static>(
    cell: &'static OnceLock<Descriptor<T>>,
    build: fn() -> Vec<FieldAccessor<T>>,
) -> &'static Descriptor<T> {
    cell.get_or_init(|| Descriptor::new(build()))
}
