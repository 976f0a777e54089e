//! # Serialization Strategy Table
//!
//! A process-wide mapping from type tag to the read procedure for values
//! that are neither primitive scalars nor plain records. The any-object
//! read path consults this table whenever it meets a type prefix: the
//! strategy decides the bracket form (none, sequence, record) and how the
//! body becomes a `WireValue`.
//!
//! | Kind | Bracket | Read behavior |
//! |------|---------|---------------|
//! | Scalar | none | pull one scalar of the declared kind |
//! | List / Set / Array | sequence | pull items |
//! | Map | record | pull entries as field pairs |
//! | Record | record | pull named fields |
//! | Enum | none | pull text, validate against the variant table |
//! | Throwable | record | `message` + `stackTrace` sequence |
//! | Externalizable | sequence | delegate to the type's own reader |
//! | Any | inferred | peek and route |
//!
//! Entries are read-mostly: registration happens at startup, lookups take
//! a read lock only.

use std::sync::{Arc, OnceLock};

use eyre::{bail, Result};
use hashbrown::HashMap;
use parking_lot::RwLock;

use super::{WireEnum, WireRecord};
use crate::value::WireValue;
use crate::wire::{self, Wire};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarKind {
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
}

/// Reader vtable for types that serialize through their own external form.
#[derive(Clone, Copy)]
pub struct ExtVtable {
    pub read: fn(&mut Wire) -> Result<WireValue>,
}

#[derive(Clone)]
pub enum StrategyKind {
    Scalar(ScalarKind),
    List,
    Set,
    Map,
    Record,
    Array,
    Enum(&'static [&'static str]),
    Throwable,
    Externalizable(ExtVtable),
    Any,
}

#[derive(Clone)]
pub struct Strategy {
    pub kind: StrategyKind,
}

impl Strategy {
    pub fn new(kind: StrategyKind) -> Self {
        Self { kind }
    }

    /// Reads the value body this strategy governs into a `WireValue`.
    pub fn read_dynamic(&self, w: &mut Wire) -> Result<WireValue> {
        match &self.kind {
            StrategyKind::Scalar(kind) => read_scalar(w, *kind),
            StrategyKind::List | StrategyKind::Set | StrategyKind::Array => read_sequence(w),
            StrategyKind::Map => {
                let fields = read_fields(w)?;
                Ok(WireValue::Map(
                    fields
                        .into_iter()
                        .map(|(k, v)| (WireValue::Text(k), v))
                        .collect(),
                ))
            }
            StrategyKind::Record | StrategyKind::Throwable => {
                Ok(WireValue::Record(read_fields(w)?))
            }
            StrategyKind::Enum(variants) => {
                let text = with_wire!(&mut *w, e => e.read_text())?;
                match text {
                    None => Ok(WireValue::Null),
                    Some(s) => {
                        if !variants.contains(&s.as_str()) {
                            bail!("'{}' is not a registered variant of this enum", s);
                        }
                        Ok(WireValue::Text(s))
                    }
                }
            }
            StrategyKind::Externalizable(vt) => (vt.read)(w),
            StrategyKind::Any => wire::read_object(w),
        }
    }
}

fn read_scalar(w: &mut Wire, kind: ScalarKind) -> Result<WireValue> {
    Ok(match kind {
        ScalarKind::Bool => WireValue::Bool(with_wire!(&mut *w, e => e.read_bool())?),
        ScalarKind::Int => {
            let wide = with_wire!(&mut *w, e => e.read_int())?;
            match i64::try_from(wide) {
                Ok(v) => WireValue::I64(v),
                Err(_) => WireValue::U64(u64::try_from(wide)?),
            }
        }
        ScalarKind::Float => WireValue::F64(with_wire!(&mut *w, e => e.read_f64())?),
        ScalarKind::Text => with_wire!(&mut *w, e => e.read_text())?
            .map(WireValue::Text)
            .unwrap_or(WireValue::Null),
        ScalarKind::Bytes => WireValue::Bytes(with_wire!(&mut *w, e => e.read_bytes())?),
        ScalarKind::Time => WireValue::Time(with_wire!(&mut *w, e => e.read_time())?),
        ScalarKind::Date => WireValue::Date(with_wire!(&mut *w, e => e.read_date())?),
        ScalarKind::DateTime => {
            WireValue::DateTime(with_wire!(&mut *w, e => e.read_date_time())?)
        }
        ScalarKind::ZonedDateTime => {
            WireValue::ZonedDateTime(with_wire!(&mut *w, e => e.read_zoned_date_time())?)
        }
        ScalarKind::Uuid => WireValue::Uuid(with_wire!(&mut *w, e => e.read_uuid())?),
    })
}

fn read_sequence(w: &mut Wire) -> Result<WireValue> {
    let mut items = Vec::new();
    with_wire!(&mut *w, e => e.open_sequence_read())?;
    loop {
        let has = with_wire!(&mut *w, e => e.seq_has_next())?;
        if !has {
            break;
        }
        items.push(wire::read_object(w)?);
    }
    with_wire!(&mut *w, e => e.close_sequence_read())?;
    Ok(WireValue::Sequence(items))
}

fn read_fields(w: &mut Wire) -> Result<Vec<(String, WireValue)>> {
    let mut fields = Vec::new();
    with_wire!(&mut *w, e => e.open_record_read())?;
    let result: Result<()> = (|| {
        loop {
            let name = match with_wire!(&mut *w, e => e.read_field_name())? {
                Some(n) => n,
                None => return Ok(()),
            };
            let value = wire::read_object(w)?;
            fields.push((name, value));
        }
    })();
    with_wire!(&mut *w, e => e.close_record_read())?;
    result?;
    Ok(fields)
}

type Registry = RwLock<HashMap<String, Arc<Strategy>>>;

fn registry() -> &'static Registry {
    static REGISTRY: OnceLock<Registry> = OnceLock::new();
    REGISTRY.get_or_init(|| RwLock::new(HashMap::new()))
}

pub fn register(tag: &str, strategy: Strategy) {
    registry().write().insert(tag.to_string(), Arc::new(strategy));
}

/// Registers a `WireRecord` type under its own tag.
pub fn register_record<T: WireRecord>() {
    register(T::type_tag(), Strategy::new(StrategyKind::Record));
}

/// Registers an enum's variant table under `tag`.
pub fn register_enum<E: WireEnum>(tag: &str) {
    register(tag, Strategy::new(StrategyKind::Enum(E::variants())));
}

pub fn register_externalizable(tag: &str, vtable: ExtVtable) {
    register(tag, Strategy::new(StrategyKind::Externalizable(vtable)));
}

pub fn lookup(tag: &str) -> Option<Arc<Strategy>> {
    registry().read().get(tag).cloned()
}
