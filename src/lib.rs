//! # TurWire - Multi-Format Wire Serialization
//!
//! TurWire renders structured data to, and reconstructs it from, byte buffers
//! in two interoperable encodings: a human-readable YAML-like text dialect and
//! a compact self-describing binary encoding. Records are framed as
//! size-prefixed documents so that many independent records share one buffer.
//!
//! ## Quick Start
//!
//! ```ignore
//! use turwire::{Bytes, WireType};
//! use turwire::document::write_document;
//!
//! let mut wire = WireType::Text.wire(Bytes::elastic());
//! write_document(&mut wire, false, |w| {
//!     w.write("price")?.f64(123.456)
//! })?;
//! ```
//!
//! ## Architecture
//!
//! TurWire uses a layered architecture:
//!
//! ```text
//! +-------------------------------------+
//! |  Reflective Marshaller / Strategies |
//! +-------------------------------------+
//! |   ValueOut / ValueIn (Wire sum)     |
//! +------------------+------------------+
//! |   Text Encoding  |  Binary Encoding |
//! +------------------+------------------+
//! |   Document Framing (32-bit header)  |
//! +-------------------------------------+
//! |   Bytes (elastic / memory-mapped)   |
//! +-------------------------------------+
//! ```
//!
//! ## Document Framing
//!
//! Every document starts with a 4-byte little-endian header:
//!
//! ```text
//! bit 31        not_complete (writer has not finalized)
//! bit 30        meta_data    (document is metadata, not data)
//! bits 29..0    payload length in bytes
//! ```
//!
//! Concurrent writers sharing a mapped buffer coordinate by compare-and-swap
//! on the header word; only one writer transitions a slot from NOT_INITIALIZED
//! to NOT_COMPLETE.
//!
//! ## Module Overview
//!
//! - [`buffer`]: elastic and memory-mapped byte stores with cursors
//! - [`framing`]: document header bit math and acquisition protocol
//! - [`wire`]: the `Wire` sum type and the `ValueOut`/`ValueIn` contracts
//! - [`text`]: YAML-dialect encoding (plus JSON and CSV profiles)
//! - [`binary`]: tagged binary encoding
//! - [`document`]: scoped write/read document contexts
//! - [`marshal`]: record descriptors, strategy table, `wire_record!`
//! - [`cells`]: in-place atomic reference cells
//! - [`compress`]: codec registry for compressed sub-blobs
//! - [`alias`]: class-alias registry for abbreviated type tags

#[macro_use]
mod macros;

pub mod alias;
pub mod binary;
pub mod buffer;
pub mod cells;
pub mod compress;
pub mod document;
pub mod error;
pub mod framing;
pub mod marshal;
pub mod text;
pub mod value;
pub mod wire;

pub use buffer::{Bytes, ElasticBytes, MappedBytes};
pub use error::{WireError, WireErrorKind};
pub use marshal::{deep_copy, record_eq, Descriptor, FieldAccessor, WireEnum, WireField, WireRecord};
pub use value::WireValue;
pub use wire::{ValueIn, ValueOut, Wire, WireConfig, WireType};
