//! # In-Place Reference Cells
//!
//! A reference cell is a fixed-width slot reserved inside a document while
//! it is being written. After the document is sealed the cell remains
//! addressable by the byte offset captured at write time, and its value can
//! be read, replaced, compare-and-swapped, or fetch-added without changing
//! the document's length.
//!
//! ## Forms
//!
//! | Form | i32 slot | i64 slot |
//! |------|----------|----------|
//! | Binary | 4 bytes little-endian | 8 bytes little-endian |
//! | Text | 10-digit space-padded decimal | 20-digit space-padded decimal |
//!
//! Binary cells are aligned to their width (the writer pads before the
//! slot) and use real atomics on a mapped store. Text cells are multi-byte
//! decimal fields; their updates serialize through the store's text-cell
//! mutex, which preserves the compare-and-swap contract without a machine
//! atomic.
//!
//! ## Array Cells
//!
//! An i64 array cell is a fixed-capacity sequence of i64 slots with a
//! `used` counter. Binary array cells carry a zerocopy header; text array
//! cells store `used` as the first fixed-width entry.
//!
//! All operations go through [`Bytes`]; a cell handle is only an offset
//! plus its form and never keeps the buffer alive by itself.

use eyre::{ensure, Result};
use zerocopy::little_endian::U64;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

use crate::buffer::Bytes;
use crate::error::{wire_err, WireErrorKind};

pub const TEXT_I32_WIDTH: usize = 10;
pub const TEXT_I64_WIDTH: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellForm {
    Binary,
    Text,
}

/// Header of a binary i64 array cell.
#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
pub struct ArrayCellHeader {
    capacity: U64,
    used: U64,
}

impl ArrayCellHeader {
    pub fn new(capacity: u64) -> Self {
        Self {
            capacity: U64::new(capacity),
            used: U64::new(0),
        }
    }

    zerocopy_getters! {
        capacity: u64,
        used: u64,
    }
}

pub const ARRAY_CELL_HEADER_SIZE: usize = std::mem::size_of::<ArrayCellHeader>();

fn parse_text_cell(bytes: &Bytes, offset: usize, width: usize) -> Result<i64> {
    let raw = bytes.slice(offset, width)?;
    let s = std::str::from_utf8(raw).map_err(|_| {
        wire_err(
            WireErrorKind::TypeMismatch,
            offset,
            bytes.all_readable(),
            "text cell is not valid UTF-8",
        )
    })?;
    s.trim().parse::<i64>().map_err(|_| {
        wire_err(
            WireErrorKind::TypeMismatch,
            offset,
            bytes.all_readable(),
            format!("text cell does not hold a decimal integer: {s:?}"),
        )
    })
}

fn format_text_cell(value: i64, width: usize) -> String {
    format!("{value:>width$}")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Int32Ref {
    offset: usize,
    form: CellForm,
}

impl Int32Ref {
    pub fn new(offset: usize, form: CellForm) -> Self {
        Self { offset, form }
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn get(&self, bytes: &Bytes) -> Result<i32> {
        match self.form {
            CellForm::Binary => Ok(bytes.load_u32_at(self.offset)? as i32),
            CellForm::Text => {
                let v = parse_text_cell(bytes, self.offset, TEXT_I32_WIDTH)?;
                Ok(v as i32)
            }
        }
    }

    pub fn set(&self, bytes: &mut Bytes, value: i32) -> Result<()> {
        match self.form {
            CellForm::Binary => bytes.store_u32_at(self.offset, value as u32),
            CellForm::Text => {
                bytes.write_at(self.offset, format_text_cell(value as i64, TEXT_I32_WIDTH).as_bytes())
            }
        }
    }

    /// Compare-and-swap; returns true when the stored value matched
    /// `expected` and was replaced.
    pub fn cas(&self, bytes: &mut Bytes, expected: i32, new: i32) -> Result<bool> {
        match self.form {
            CellForm::Binary => bytes.cas_u32_at(self.offset, expected as u32, new as u32),
            CellForm::Text => self.text_locked(bytes, |bytes| {
                if parse_text_cell(bytes, self.offset, TEXT_I32_WIDTH)? as i32 != expected {
                    return Ok(false);
                }
                bytes.write_at(self.offset, format_text_cell(new as i64, TEXT_I32_WIDTH).as_bytes())?;
                Ok(true)
            }),
        }
    }

    pub fn add(&self, bytes: &mut Bytes, delta: i32) -> Result<i32> {
        match self.form {
            CellForm::Binary => loop {
                let current = self.get(bytes)?;
                if self.cas(bytes, current, current.wrapping_add(delta))? {
                    return Ok(current.wrapping_add(delta));
                }
            },
            CellForm::Text => self.text_locked(bytes, |bytes| {
                let current = parse_text_cell(bytes, self.offset, TEXT_I32_WIDTH)? as i32;
                let next = current.wrapping_add(delta);
                bytes.write_at(self.offset, format_text_cell(next as i64, TEXT_I32_WIDTH).as_bytes())?;
                Ok(next)
            }),
        }
    }

    fn text_locked<R>(
        &self,
        bytes: &mut Bytes,
        f: impl FnOnce(&mut Bytes) -> Result<R>,
    ) -> Result<R> {
        match bytes.mapped_store().cloned() {
            Some(store) => store.with_text_cell_lock(|| f(bytes)),
            None => f(bytes),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Int64Ref {
    offset: usize,
    form: CellForm,
}

impl Int64Ref {
    pub fn new(offset: usize, form: CellForm) -> Self {
        Self { offset, form }
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn get(&self, bytes: &Bytes) -> Result<i64> {
        match self.form {
            CellForm::Binary => Ok(bytes.load_u64_at(self.offset)? as i64),
            CellForm::Text => parse_text_cell(bytes, self.offset, TEXT_I64_WIDTH),
        }
    }

    pub fn set(&self, bytes: &mut Bytes, value: i64) -> Result<()> {
        match self.form {
            CellForm::Binary => bytes.store_u64_at(self.offset, value as u64),
            CellForm::Text => {
                bytes.write_at(self.offset, format_text_cell(value, TEXT_I64_WIDTH).as_bytes())
            }
        }
    }

    pub fn cas(&self, bytes: &mut Bytes, expected: i64, new: i64) -> Result<bool> {
        match self.form {
            CellForm::Binary => bytes.cas_u64_at(self.offset, expected as u64, new as u64),
            CellForm::Text => self.text_locked(bytes, |bytes| {
                if parse_text_cell(bytes, self.offset, TEXT_I64_WIDTH)? != expected {
                    return Ok(false);
                }
                bytes.write_at(self.offset, format_text_cell(new, TEXT_I64_WIDTH).as_bytes())?;
                Ok(true)
            }),
        }
    }

    pub fn add(&self, bytes: &mut Bytes, delta: i64) -> Result<i64> {
        match self.form {
            CellForm::Binary => Ok(bytes.fetch_add_i64_at(self.offset, delta)?.wrapping_add(delta)),
            CellForm::Text => self.text_locked(bytes, |bytes| {
                let current = parse_text_cell(bytes, self.offset, TEXT_I64_WIDTH)?;
                let next = current.wrapping_add(delta);
                bytes.write_at(self.offset, format_text_cell(next, TEXT_I64_WIDTH).as_bytes())?;
                Ok(next)
            }),
        }
    }

    fn text_locked<R>(
        &self,
        bytes: &mut Bytes,
        f: impl FnOnce(&mut Bytes) -> Result<R>,
    ) -> Result<R> {
        match bytes.mapped_store().cloned() {
            Some(store) => store.with_text_cell_lock(|| f(bytes)),
            None => f(bytes),
        }
    }
}

/// Fixed-capacity array of i64 slots with a `used` counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Int64ArrayRef {
    offset: usize,
    capacity: usize,
    form: CellForm,
}

impl Int64ArrayRef {
    pub fn new(offset: usize, capacity: usize, form: CellForm) -> Self {
        Self {
            offset,
            capacity,
            form,
        }
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn slot(&self, index: usize) -> Result<Int64Ref> {
        ensure!(
            index < self.capacity,
            "array cell index {} out of bounds (capacity={})",
            index,
            self.capacity
        );
        let offset = match self.form {
            CellForm::Binary => self.offset + ARRAY_CELL_HEADER_SIZE + index * 8,
            CellForm::Text => self.offset + (index + 1) * (TEXT_I64_WIDTH + 2),
        };
        Ok(Int64Ref::new(offset, self.form))
    }

    fn used_ref(&self) -> Int64Ref {
        match self.form {
            // `used` is the second word of the zerocopy header.
            CellForm::Binary => Int64Ref::new(self.offset + 8, CellForm::Binary),
            CellForm::Text => Int64Ref::new(self.offset, CellForm::Text),
        }
    }

    pub fn used(&self, bytes: &Bytes) -> Result<u64> {
        Ok(self.used_ref().get(bytes)? as u64)
    }

    pub fn set_used(&self, bytes: &mut Bytes, used: u64) -> Result<()> {
        ensure!(
            used as usize <= self.capacity,
            "used {} exceeds capacity {}",
            used,
            self.capacity
        );
        self.used_ref().set(bytes, used as i64)
    }

    pub fn get(&self, bytes: &Bytes, index: usize) -> Result<i64> {
        self.slot(index)?.get(bytes)
    }

    pub fn set(&self, bytes: &mut Bytes, index: usize, value: i64) -> Result<()> {
        self.slot(index)?.set(bytes, value)
    }

    pub fn cas(&self, bytes: &mut Bytes, index: usize, expected: i64, new: i64) -> Result<bool> {
        self.slot(index)?.cas(bytes, expected, new)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn binary_cell_at(bytes: &mut Bytes, value: i32) -> Int32Ref {
        let offset = bytes.write_pos();
        bytes.push(&(value as u32).to_le_bytes()).unwrap();
        Int32Ref::new(offset, CellForm::Binary)
    }

    #[test]
    fn binary_i32_cas_and_add() {
        let mut b = Bytes::elastic();
        let cell = binary_cell_at(&mut b, 10);
        assert_eq!(cell.get(&b).unwrap(), 10);
        assert!(cell.cas(&mut b, 10, 20).unwrap());
        assert!(!cell.cas(&mut b, 10, 30).unwrap());
        assert_eq!(cell.add(&mut b, -5).unwrap(), 15);
        assert_eq!(cell.get(&b).unwrap(), 15);
    }

    #[test]
    fn text_i64_updates_preserve_width() {
        let mut b = Bytes::elastic();
        let offset = b.write_pos();
        b.push_str(&format!("{:>20}", 42)).unwrap();
        let end = b.write_pos();

        let cell = Int64Ref::new(offset, CellForm::Text);
        assert_eq!(cell.get(&b).unwrap(), 42);
        cell.set(&mut b, -123456789).unwrap();
        assert_eq!(b.write_pos(), end);
        assert_eq!(cell.get(&b).unwrap(), -123456789);
        assert!(cell.cas(&mut b, -123456789, 7).unwrap());
        assert_eq!(b.slice(offset, 20).unwrap().len(), 20);
    }

    #[test]
    fn failed_cas_leaves_prior_value() {
        let mut b = Bytes::elastic();
        let offset = b.write_pos();
        b.push_str(&format!("{:>10}", 5)).unwrap();
        let cell = Int32Ref::new(offset, CellForm::Text);
        assert!(!cell.cas(&mut b, 6, 9).unwrap());
        assert_eq!(cell.get(&b).unwrap(), 5);
    }

    #[test]
    fn array_cell_binary_layout() {
        let mut b = Bytes::elastic();
        let offset = b.write_pos();
        let header = ArrayCellHeader::new(4);
        b.push(header.as_bytes()).unwrap();
        b.push(&[0u8; 32]).unwrap();

        let arr = Int64ArrayRef::new(offset, 4, CellForm::Binary);
        assert_eq!(arr.used(&b).unwrap(), 0);
        arr.set(&mut b, 2, 99).unwrap();
        arr.set_used(&mut b, 3).unwrap();
        assert_eq!(arr.get(&b, 2).unwrap(), 99);
        assert_eq!(arr.used(&b).unwrap(), 3);
        assert!(arr.get(&b, 4).is_err());
        assert!(arr.set_used(&mut b, 5).is_err());
    }
}
