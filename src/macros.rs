//! # Internal Macros
//!
//! This module provides internal macros for reducing boilerplate in
//! TurWire.
//!
//! ## with_wire!
//!
//! Dispatches an expression over the `Wire` sum type. The wire universe is
//! a closed set of encodings, so a match beats dynamic dispatch:
//!
//! ```ignore
//! with_wire!(self.wire, w => w.write_bool(v))
//! ```
//!
//! ## zerocopy_getters!
//!
//! Generates getter methods for zerocopy struct fields that use
//! little-endian wrapper types (U16, U32, U64).
//!
//! ```ignore
//! #[repr(C)]
//! struct Header {
//!     capacity: U64,
//!     used: U64,
//! }
//!
//! impl Header {
//!     zerocopy_getters! {
//!         capacity: u64,
//!         used: u64,
//!     }
//! }
//! ```

/// Dispatches `$body` over every encoding variant of a `Wire`.
macro_rules! with_wire {
    ($wire:expr, $w:ident => $body:expr) => {
        match $wire {
            $crate::wire::Wire::Text($w) => $body,
            $crate::wire::Wire::Binary($w) => $body,
        }
    };
}

/// Generates getter methods for zerocopy little-endian fields (read-only).
#[macro_export]
macro_rules! zerocopy_getters {
    ($($field:ident : $native_ty:ty),* $(,)?) => {
        $(
            #[inline]
            pub fn $field(&self) -> $native_ty {
                self.$field.get()
            }
        )*
    };
}

/// Declares a record type with a generated wire descriptor.
///
/// Field kinds:
/// - plain fields use their `WireField` paths
/// - `@record f: T` nests another `wire_record!` type
/// - `@record_opt f: Option<T>` is a nullable nested record
/// - `@enum f: E` serializes a `wire_enum!` type as its variant name
/// - `@bytes f: Vec<u8>` emits an opaque tagged blob, not an int sequence
/// - `@map f: Vec<(String, V)>` is an ordered string-keyed map
/// - `@base f: B` splices B's fields first (base-before-own ordering)
///
/// Every field requires a trailing comma. Generates the struct (all fields
/// public), `Default`, and the `WireRecord` impl with a once-built cached
/// descriptor.
///
/// ```ignore
/// wire_record! {
///     #[derive(Debug, Clone)]
///     pub struct Trade {
///         symbol: String,
///         price: f64,
///         @enum side: Side,
///     }
/// }
/// ```
#[macro_export]
macro_rules! wire_record {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident { $($fields:tt)* }
    ) => {
        $crate::wire_record!(@munch [$(#[$meta])*] [$vis] $name [] $($fields)*);
    };

    (@munch [$($meta:tt)*] [$vis:vis] $name:ident [$($acc:tt)*] @base $f:ident : $t:ty, $($rest:tt)*) => {
        $crate::wire_record!(@munch [$($meta)*] [$vis] $name [$($acc)* (base $f : $t)] $($rest)*);
    };
    (@munch [$($meta:tt)*] [$vis:vis] $name:ident [$($acc:tt)*] @record $f:ident : $t:ty, $($rest:tt)*) => {
        $crate::wire_record!(@munch [$($meta)*] [$vis] $name [$($acc)* (record $f : $t)] $($rest)*);
    };
    (@munch [$($meta:tt)*] [$vis:vis] $name:ident [$($acc:tt)*] @record_opt $f:ident : Option<$t:ty>, $($rest:tt)*) => {
        $crate::wire_record!(@munch [$($meta)*] [$vis] $name [$($acc)* (record_opt $f : $t)] $($rest)*);
    };
    (@munch [$($meta:tt)*] [$vis:vis] $name:ident [$($acc:tt)*] @enum $f:ident : $t:ty, $($rest:tt)*) => {
        $crate::wire_record!(@munch [$($meta)*] [$vis] $name [$($acc)* (enumf $f : $t)] $($rest)*);
    };
    (@munch [$($meta:tt)*] [$vis:vis] $name:ident [$($acc:tt)*] @bytes $f:ident : Vec<u8>, $($rest:tt)*) => {
        $crate::wire_record!(@munch [$($meta)*] [$vis] $name [$($acc)* (bytesf $f : Vec<u8>)] $($rest)*);
    };
    (@munch [$($meta:tt)*] [$vis:vis] $name:ident [$($acc:tt)*] @map $f:ident : Vec<(String, $t:ty)>, $($rest:tt)*) => {
        $crate::wire_record!(@munch [$($meta)*] [$vis] $name [$($acc)* (mapf $f : $t)] $($rest)*);
    };
    (@munch [$($meta:tt)*] [$vis:vis] $name:ident [$($acc:tt)*] $f:ident : $t:ty, $($rest:tt)*) => {
        $crate::wire_record!(@munch [$($meta)*] [$vis] $name [$($acc)* (plain $f : $t)] $($rest)*);
    };
    (@munch [$($meta:tt)*] [$vis:vis] $name:ident [$($acc:tt)*]) => {
        $crate::wire_record!(@emit [$($meta)*] [$vis] $name [$($acc)*]);
    };

    (@fieldty plain $t:ty) => { $t };
    (@fieldty base $t:ty) => { $t };
    (@fieldty record $t:ty) => { $t };
    (@fieldty record_opt $t:ty) => { Option<$t> };
    (@fieldty enumf $t:ty) => { $t };
    (@fieldty bytesf $t:ty) => { $t };
    (@fieldty mapf $t:ty) => { Vec<(String, $t)> };

    (@fielddefault plain $t:ty) => { <$t as $crate::marshal::WireField>::default_field() };
    (@fielddefault base $t:ty) => { <$t as $crate::marshal::WireRecord>::default_record() };
    (@fielddefault record $t:ty) => { <$t as $crate::marshal::WireRecord>::default_record() };
    (@fielddefault record_opt $t:ty) => { None };
    (@fielddefault enumf $t:ty) => { <$t as $crate::marshal::WireEnum>::default_variant() };
    (@fielddefault bytesf $t:ty) => { Vec::new() };
    (@fielddefault mapf $t:ty) => { Vec::new() };

    (@accessor $fields:ident $name:ident plain $f:ident : $t:ty) => {
        $fields.push($crate::marshal::FieldAccessor::of(
            stringify!($f),
            |t: &$name| &t.$f,
            |t: &mut $name| &mut t.$f,
        ));
    };
    (@accessor $fields:ident $name:ident base $f:ident : $t:ty) => {
        $fields.extend($crate::marshal::FieldAccessor::embedded(
            |t: &$name| &t.$f,
            |t: &mut $name| &mut t.$f,
        ));
    };
    (@accessor $fields:ident $name:ident record $f:ident : $t:ty) => {
        $fields.push($crate::marshal::FieldAccessor::record_field(
            stringify!($f),
            |t: &$name| &t.$f,
            |t: &mut $name| &mut t.$f,
        ));
    };
    (@accessor $fields:ident $name:ident record_opt $f:ident : $t:ty) => {
        $fields.push($crate::marshal::FieldAccessor::record_opt(
            stringify!($f),
            |t: &$name| &t.$f,
            |t: &mut $name| &mut t.$f,
        ));
    };
    (@accessor $fields:ident $name:ident enumf $f:ident : $t:ty) => {
        $fields.push($crate::marshal::FieldAccessor::enum_field(
            stringify!($f),
            |t: &$name| &t.$f,
            |t: &mut $name| &mut t.$f,
        ));
    };
    (@accessor $fields:ident $name:ident bytesf $f:ident : $t:ty) => {
        $fields.push($crate::marshal::FieldAccessor::bytes_field(
            stringify!($f),
            |t: &$name| &t.$f,
            |t: &mut $name| &mut t.$f,
        ));
    };
    (@accessor $fields:ident $name:ident mapf $f:ident : $t:ty) => {
        $fields.push($crate::marshal::FieldAccessor::map_field(
            stringify!($f),
            |t: &$name| &t.$f,
            |t: &mut $name| &mut t.$f,
        ));
    };

    (@emit [$($meta:tt)*] [$vis:vis] $name:ident [$(($kind:ident $f:ident : $t:ty))*]) => {
        $($meta)*
        $vis struct $name {
            $(pub $f: $crate::wire_record!(@fieldty $kind $t),)*
        }

        impl Default for $name {
            fn default() -> Self {
                Self {
                    $($f: $crate::wire_record!(@fielddefault $kind $t),)*
                }
            }
        }

        impl $crate::marshal::WireRecord for $name {
            fn type_tag() -> &'static str {
                stringify!($name)
            }

            fn descriptor() -> &'static $crate::marshal::Descriptor<Self> {
                static DESC: ::std::sync::OnceLock<$crate::marshal::Descriptor<$name>> =
                    ::std::sync::OnceLock::new();
                $crate::marshal::cached_descriptor(&DESC, || {
                    let mut fields: Vec<$crate::marshal::FieldAccessor<$name>> = Vec::new();
                    $($crate::wire_record!(@accessor fields $name $kind $f : $t);)*
                    fields
                })
            }

            fn default_record() -> Self {
                <Self as Default>::default()
            }
        }
    };
}

/// Declares an enum serialized as its variant name. The first variant is
/// the default. Do not also derive `Default`; the macro generates it.
///
/// ```ignore
/// wire_enum! {
///     #[derive(Debug, Clone, Copy, PartialEq, Eq)]
///     pub enum Side { BUY, SELL }
/// }
/// ```
#[macro_export]
macro_rules! wire_enum {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident { $first:ident $(, $rest:ident)* $(,)? }
    ) => {
        $(#[$meta])*
        $vis enum $name {
            $first,
            $($rest,)*
        }

        impl $crate::marshal::WireEnum for $name {
            fn variant_name(&self) -> &'static str {
                match self {
                    Self::$first => stringify!($first),
                    $(Self::$rest => stringify!($rest),)*
                }
            }

            fn from_variant_name(name: &str) -> Option<Self> {
                match name {
                    stringify!($first) => Some(Self::$first),
                    $(stringify!($rest) => Some(Self::$rest),)*
                    _ => None,
                }
            }

            fn variants() -> &'static [&'static str] {
                &[stringify!($first), $(stringify!($rest),)*]
            }

            fn default_variant() -> Self {
                Self::$first
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::$first
            }
        }
    };
}
