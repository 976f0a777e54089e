//! # Text Encoding
//!
//! A YAML-like dialect implementing both wire contracts. The format favors
//! human legibility: fields are `name: value`, records are `{ ... }`,
//! sequences are `[ ... ]`, and both composites come in a multi-line
//! indented form (two spaces per nesting level) and a single-line "leaf"
//! form chosen when the writer sets a leaf hint.
//!
//! ```text
//! trade: {
//!   symbol: ACME,
//!   price: 123.456,
//!   side: !Side BUY
//! }
//! ```
//!
//! Scalars are bare tokens unless a reserved character or significant
//! whitespace forces quoting; the writer prefers no quotes, then double
//! quotes with C-style escapes, then single quotes when the text itself
//! contains a double quote. Type prefixes are `!Tag `, the null sentinel is
//! `!!null ""`, blobs are `!binary BASE64`, and comments run from `#` to
//! end of line.
//!
//! The JSON and CSV wire types are profiles of this encoding: JSON forces
//! the single-line form, quotes every name and string, and drops type
//! tags; CSV is row-oriented and positional.

mod emit;
mod parse;

pub use parse::parse_scalar_token;
pub(crate) use parse::{
    parse_date_time_token, parse_date_token, parse_time_token, parse_zoned_token,
};

use crate::buffer::Bytes;
use crate::wire::config::WireConfig;
use crate::wire::state::ReaderState;

pub const INDENT: &str = "  ";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextProfile {
    Yaml,
    Json,
    Csv,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Sep {
    None,
    CommaSpace,
    CommaNewline,
    Newline,
}

#[derive(Debug)]
pub(crate) struct OutState {
    pub sep: Sep,
    pub indent: usize,
    /// Nesting depth of single-line composites currently open.
    pub leaf_depth: usize,
    /// Leaf hint set for the next composite.
    pub leaf_pending: bool,
    /// Write position right after the latest composite opener, used to
    /// close empty composites compactly.
    pub after_open: Option<usize>,
}

impl Default for OutState {
    fn default() -> Self {
        Self {
            sep: Sep::None,
            indent: 0,
            leaf_depth: 0,
            leaf_pending: false,
            after_open: None,
        }
    }
}

#[derive(Debug)]
pub struct TextWire {
    pub(crate) bytes: Bytes,
    pub(crate) profile: TextProfile,
    pub(crate) config: WireConfig,
    pub(crate) out: OutState,
    pub(crate) reader: ReaderState,
}

impl TextWire {
    pub fn new(bytes: Bytes, profile: TextProfile, config: WireConfig) -> Self {
        let base_limit = bytes.readable_limit();
        let mut reader = ReaderState::default();
        reader.reset(base_limit);
        Self {
            bytes,
            profile,
            config,
            out: OutState::default(),
            reader,
        }
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

    pub fn profile(&self) -> TextProfile {
        self.profile
    }

    pub fn reset_out_state(&mut self) {
        self.out = OutState::default();
    }

    pub fn reset_in_state(&mut self) {
        let limit = self.bytes.readable_limit();
        self.reader.reset(limit);
    }

    pub(crate) fn leaf_on(&self) -> bool {
        self.out.leaf_depth > 0 || self.profile == TextProfile::Json
    }

    pub fn set_leaf(&mut self, on: bool) {
        self.out.leaf_pending = on;
    }
}
