//! # Byte Buffer Adapter
//!
//! This module provides `Bytes`, the buffer front used by every wire. A
//! `Bytes` pairs a backing store with independent read and write cursors.
//! Two stores are supported:
//!
//! - [`ElasticBytes`]: heap-backed, grows on demand, single-threaded
//! - [`MappedBytes`]: memory-mapped file or anonymous region, fixed
//!   capacity, shareable between wires through `Arc`
//!
//! ## Cursor Model
//!
//! ```text
//! 0        read_pos          write_pos       capacity
//! |--------|=================|---------------|
//!           readable window   free space
//! ```
//!
//! Cursors belong to the `Bytes` front, not the store. Several `Bytes`
//! instances may share one `MappedBytes` store, each with its own cursors;
//! writers sharing a store are serialized by the document header protocol,
//! never by the buffer itself.
//!
//! ## Atomic Access
//!
//! Header words and reference cells require atomic access at arbitrary
//! aligned offsets. The mapped store implements these with real atomics;
//! the elastic store is single-threaded by contract, so plain reads and
//! writes satisfy the same interface.

mod elastic;
mod mapped;

pub use elastic::ElasticBytes;
pub use mapped::MappedBytes;

use std::sync::Arc;

use eyre::Result;

use crate::error::{wire_err, WireErrorKind};

#[derive(Debug)]
pub enum Store {
    Elastic(ElasticBytes),
    Mapped(Arc<MappedBytes>),
}

/// A byte buffer with read/write cursors over an elastic or mapped store.
#[derive(Debug)]
pub struct Bytes {
    store: Store,
    read_pos: usize,
    write_pos: usize,
}

impl Bytes {
    pub fn elastic() -> Self {
        Self::from_store(Store::Elastic(ElasticBytes::new()))
    }

    pub fn elastic_with_capacity(capacity: usize) -> Self {
        Self::from_store(Store::Elastic(ElasticBytes::with_capacity(capacity)))
    }

    /// Wraps existing data for reading; the write cursor starts at the end.
    pub fn from_vec(data: Vec<u8>) -> Self {
        let write_pos = data.len();
        Self {
            store: Store::Elastic(ElasticBytes::from_vec(data)),
            read_pos: 0,
            write_pos,
        }
    }

    pub fn from_slice(data: &[u8]) -> Self {
        Self::from_vec(data.to_vec())
    }

    pub fn mapped(store: Arc<MappedBytes>) -> Self {
        Self::from_store(Store::Mapped(store))
    }

    fn from_store(store: Store) -> Self {
        Self {
            store,
            read_pos: 0,
            write_pos: 0,
        }
    }

    pub fn read_pos(&self) -> usize {
        self.read_pos
    }

    pub fn set_read_pos(&mut self, pos: usize) {
        self.read_pos = pos;
    }

    pub fn write_pos(&self) -> usize {
        self.write_pos
    }

    pub fn set_write_pos(&mut self, pos: usize) {
        self.write_pos = pos;
    }

    pub fn capacity(&self) -> usize {
        match &self.store {
            Store::Elastic(_) => usize::MAX,
            Store::Mapped(m) => m.capacity(),
        }
    }

    /// Highest offset known to contain readable data.
    ///
    /// For a mapped store the whole region is addressable; document framing
    /// determines how much of it is meaningful.
    pub fn readable_limit(&self) -> usize {
        match &self.store {
            Store::Elastic(e) => e.len(),
            Store::Mapped(m) => m.capacity(),
        }
    }

    pub fn remaining(&self) -> usize {
        self.readable_limit().saturating_sub(self.read_pos)
    }

    pub fn is_mapped(&self) -> bool {
        matches!(self.store, Store::Mapped(_))
    }

    pub fn mapped_store(&self) -> Option<&Arc<MappedBytes>> {
        match &self.store {
            Store::Mapped(m) => Some(m),
            Store::Elastic(_) => None,
        }
    }

    /// Resets both cursors; elastic stores also drop their contents.
    pub fn clear(&mut self) {
        self.read_pos = 0;
        self.write_pos = 0;
        if let Store::Elastic(e) = &mut self.store {
            e.clear();
        }
    }

    pub fn slice(&self, offset: usize, len: usize) -> Result<&[u8]> {
        match &self.store {
            Store::Elastic(e) => e.slice(offset, len),
            Store::Mapped(m) => m.read(offset, len),
        }
    }

    /// The readable window from the read cursor to the readable limit.
    pub fn readable(&self) -> &[u8] {
        let limit = self.readable_limit();
        let start = self.read_pos.min(limit);
        match &self.store {
            Store::Elastic(e) => &e.as_slice()[start..limit],
            Store::Mapped(m) => m.read(start, limit - start).unwrap_or(&[]),
        }
    }

    /// The full readable prefix of the buffer, ignoring the read cursor.
    pub fn all_readable(&self) -> &[u8] {
        match &self.store {
            Store::Elastic(e) => e.as_slice(),
            Store::Mapped(m) => m.read(0, m.capacity()).unwrap_or(&[]),
        }
    }

    pub fn peek_u8(&self) -> Result<u8> {
        Ok(self.slice(self.read_pos, 1)?[0])
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        let b = self.peek_u8()?;
        self.read_pos += 1;
        Ok(b)
    }

    pub fn read_slice(&mut self, len: usize) -> Result<&[u8]> {
        let start = self.read_pos;
        if start + len > self.readable_limit() {
            return Err(wire_err(
                WireErrorKind::Truncation,
                start,
                self.all_readable(),
                format!("{} bytes requested, {} available", len, self.remaining()),
            ));
        }
        self.read_pos = start + len;
        self.slice(start, len)
    }

    pub fn push(&mut self, src: &[u8]) -> Result<()> {
        let pos = self.write_pos;
        self.write_at(pos, src)?;
        self.write_pos = pos + src.len();
        Ok(())
    }

    pub fn push_u8(&mut self, b: u8) -> Result<()> {
        self.push(&[b])
    }

    pub fn push_str(&mut self, s: &str) -> Result<()> {
        self.push(s.as_bytes())
    }

    /// Writes at an absolute offset without moving the write cursor.
    /// Used to back-patch document headers and reference cells.
    pub fn write_at(&mut self, offset: usize, src: &[u8]) -> Result<()> {
        match &mut self.store {
            Store::Elastic(e) => {
                e.write_at(offset, src);
                Ok(())
            }
            Store::Mapped(m) => m.write_at(offset, src),
        }
    }

    pub fn load_u32_at(&self, offset: usize) -> Result<u32> {
        match &self.store {
            Store::Elastic(e) => e.load_u32(offset),
            Store::Mapped(m) => m.load_u32(offset),
        }
    }

    pub fn store_u32_at(&mut self, offset: usize, value: u32) -> Result<()> {
        match &mut self.store {
            Store::Elastic(e) => {
                e.store_u32(offset, value);
                Ok(())
            }
            Store::Mapped(m) => m.store_u32(offset, value),
        }
    }

    pub fn cas_u32_at(&mut self, offset: usize, expected: u32, new: u32) -> Result<bool> {
        match &mut self.store {
            Store::Elastic(e) => Ok(e.cas_u32(offset, expected, new)),
            Store::Mapped(m) => m.cas_u32(offset, expected, new),
        }
    }

    pub fn load_u64_at(&self, offset: usize) -> Result<u64> {
        match &self.store {
            Store::Elastic(e) => e.load_u64(offset),
            Store::Mapped(m) => m.load_u64(offset),
        }
    }

    pub fn store_u64_at(&mut self, offset: usize, value: u64) -> Result<()> {
        match &mut self.store {
            Store::Elastic(e) => {
                e.store_u64(offset, value);
                Ok(())
            }
            Store::Mapped(m) => m.store_u64(offset, value),
        }
    }

    pub fn cas_u64_at(&mut self, offset: usize, expected: u64, new: u64) -> Result<bool> {
        match &mut self.store {
            Store::Elastic(e) => Ok(e.cas_u64(offset, expected, new)),
            Store::Mapped(m) => m.cas_u64(offset, expected, new),
        }
    }

    pub fn fetch_add_i64_at(&mut self, offset: usize, delta: i64) -> Result<i64> {
        match &mut self.store {
            Store::Elastic(e) => Ok(e.fetch_add_i64(offset, delta)),
            Store::Mapped(m) => m.fetch_add_i64(offset, delta),
        }
    }
}

/// Renders a byte slice as a 16-bytes-per-line hex dump for diagnostics.
pub fn hex_dump(bytes: &[u8]) -> String {
    let mut out = String::new();
    for (i, chunk) in bytes.chunks(16).enumerate() {
        out.push_str(&format!("{:08x}  ", i * 16));
        for b in chunk {
            out.push_str(&format!("{b:02x} "));
        }
        for _ in chunk.len()..16 {
            out.push_str("   ");
        }
        out.push(' ');
        for &b in chunk {
            out.push(if (0x20..0x7f).contains(&b) { b as char } else { '.' });
        }
        out.push('\n');
    }
    out
}
