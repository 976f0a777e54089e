//! # Binary Encoding
//!
//! A compact self-describing encoding implementing both wire contracts. A
//! single lead byte (see [`codes`]) classifies every element; composite
//! values are bracketed by start/end codes so any element's span is
//! recoverable by scanning, which is what field skipping and record read
//! limits are built on.
//!
//! The binary encoding preserves the same value universe and document
//! header semantics as the text encoding; a document written here can be
//! translated to text (and back) by stream copy.
//!
//! ## Field-Less and Numeric-Id Modes
//!
//! With `field_less` set, field-name elements are elided entirely and
//! readers locate fields positionally. With `numeric_id` set, field names
//! that are decimal integers are written as small-int elements, which cuts
//! a name to one byte; both sides must agree on the mode.

pub mod codes;
mod emit;
mod parse;
pub mod varint;

use crate::buffer::Bytes;
use crate::wire::config::WireConfig;
use crate::wire::state::ReaderState;

#[derive(Debug)]
pub struct BinaryWire {
    pub(crate) bytes: Bytes,
    pub(crate) config: WireConfig,
    pub(crate) reader: ReaderState,
    /// Compress sealed document payloads above the configured threshold.
    pub(crate) compress_documents: bool,
    /// Raw mode: no document framing.
    pub(crate) raw: bool,
}

impl BinaryWire {
    pub fn new(bytes: Bytes, config: WireConfig) -> Self {
        let base_limit = bytes.readable_limit();
        let mut reader = ReaderState::default();
        reader.reset(base_limit);
        Self {
            bytes,
            config,
            reader,
            compress_documents: false,
            raw: false,
        }
    }

    pub fn with_compression(mut self) -> Self {
        self.compress_documents = true;
        self
    }

    pub fn with_raw_framing(mut self) -> Self {
        self.raw = true;
        self
    }

    pub fn bytes(&self) -> &Bytes {
        &self.bytes
    }

    pub fn bytes_mut(&mut self) -> &mut Bytes {
        &mut self.bytes
    }

    pub fn into_bytes(self) -> Bytes {
        self.bytes
    }

    pub fn reset_out_state(&mut self) {
        // The binary writer keeps no inter-document state.
    }

    pub fn reset_in_state(&mut self) {
        let limit = self.bytes.readable_limit();
        self.reader.reset(limit);
    }

    pub fn set_leaf(&mut self, _on: bool) {
        // Layout hints have no binary representation.
    }
}
