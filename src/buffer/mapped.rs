//! # Memory-Mapped Byte Store
//!
//! `MappedBytes` maps a file (or an anonymous region) into the process
//! address space so that wires can read and write document bytes without
//! copying through intermediate buffers. Unlike the elastic store, a mapped
//! store has a fixed capacity and may be shared between wires on different
//! threads through `Arc`.
//!
//! ## Sharing Model
//!
//! The store itself performs no locking for bulk reads and writes. Safety
//! comes from the document header protocol: a writer owns the byte range of
//! a document only after winning the header compare-and-swap, and readers
//! only read ranges whose header has the not-complete bit clear. The store
//! provides the atomic header and reference-cell operations that protocol
//! is built from.
//!
//! ## Text Cell Updates
//!
//! Textual reference cells are multi-byte decimal fields, which cannot be
//! updated with a single machine atomic. The store carries one mutex used
//! only by those updates; binary cells never touch it.
//!
//! ## Durability
//!
//! `sync()` flushes the mapping. Nothing else in the engine calls it;
//! persistence policy belongs to the caller.

use std::fs::OpenOptions;
use std::path::Path;
use std::sync::atomic::{AtomicI64, AtomicU32, AtomicU64, Ordering};

use eyre::{ensure, Result, WrapErr};
use memmap2::MmapMut;
use parking_lot::Mutex;

use crate::error::{wire_err, WireErrorKind};

pub struct MappedBytes {
    ptr: *mut u8,
    len: usize,
    map: MmapMut,
    text_cell_lock: Mutex<()>,
}

// SAFETY: the raw pointer targets the mapped region owned by `map`, which
// lives exactly as long as this struct. Concurrent access is governed by the
// header protocol (bulk writes only within a claimed document range, bulk
// reads only of completed ranges) and by real atomics for header words and
// binary reference cells.
unsafe impl Send for MappedBytes {}
unsafe impl Sync for MappedBytes {}

impl std::fmt::Debug for MappedBytes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MappedBytes").field("len", &self.len).finish()
    }
}

impl MappedBytes {
    pub fn create<P: AsRef<Path>>(path: P, capacity: usize) -> Result<Self> {
        let path = path.as_ref();
        ensure!(capacity > 0, "mapped buffer capacity must be at least 1");

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)
            .wrap_err_with(|| format!("failed to create wire file '{}'", path.display()))?;

        file.set_len(capacity as u64)
            .wrap_err_with(|| format!("failed to size '{}' to {} bytes", path.display(), capacity))?;

        // SAFETY: MmapMut::map_mut is unsafe because the file could be
        // modified externally. This is safe because:
        // 1. The file was just created with truncate=true and sized here
        // 2. Wire files are not meant to be modified by external processes
        // 3. The mapping's lifetime is tied to MappedBytes
        let map = unsafe {
            MmapMut::map_mut(&file)
                .wrap_err_with(|| format!("failed to memory-map '{}'", path.display()))?
        };

        Ok(Self::from_map(map))
    }

    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .wrap_err_with(|| format!("failed to open wire file '{}'", path.display()))?;

        let len = file
            .metadata()
            .wrap_err_with(|| format!("failed to stat '{}'", path.display()))?
            .len();
        ensure!(len > 0, "cannot map empty wire file '{}'", path.display());

        // SAFETY: same argument as `create`; the mapping is tied to this
        // struct and access goes through bounds-checked methods.
        let map = unsafe {
            MmapMut::map_mut(&file)
                .wrap_err_with(|| format!("failed to memory-map '{}'", path.display()))?
        };

        Ok(Self::from_map(map))
    }

    /// Anonymous mapping, used for shared in-memory buffers and tests.
    pub fn anon(capacity: usize) -> Result<Self> {
        ensure!(capacity > 0, "mapped buffer capacity must be at least 1");
        let map = MmapMut::map_anon(capacity).wrap_err("failed to create anonymous mapping")?;
        Ok(Self::from_map(map))
    }

    fn from_map(mut map: MmapMut) -> Self {
        let ptr = map.as_mut_ptr();
        let len = map.len();
        Self {
            ptr,
            len,
            map,
            text_cell_lock: Mutex::new(()),
        }
    }

    pub fn capacity(&self) -> usize {
        self.len
    }

    fn check(&self, offset: usize, len: usize) -> Result<()> {
        if offset + len > self.len {
            return Err(wire_err(
                WireErrorKind::IoFailure,
                offset,
                &[],
                format!(
                    "mapped buffer access {}..{} out of bounds (capacity={})",
                    offset,
                    offset + len,
                    self.len
                ),
            ));
        }
        Ok(())
    }

    pub fn read(&self, offset: usize, len: usize) -> Result<&[u8]> {
        self.check(offset, len)?;
        // SAFETY: bounds checked above; readers only inspect completed
        // document ranges per the header protocol.
        Ok(unsafe { std::slice::from_raw_parts(self.ptr.add(offset), len) })
    }

    pub fn write_at(&self, offset: usize, src: &[u8]) -> Result<()> {
        self.check(offset, src.len())?;
        // SAFETY: bounds checked above. The caller owns this range: either
        // the document claimed through the header CAS, or a reference cell
        // slot updated under its own discipline.
        unsafe {
            std::ptr::copy_nonoverlapping(src.as_ptr(), self.ptr.add(offset), src.len());
        }
        Ok(())
    }

    fn atomic_u32(&self, offset: usize) -> Result<&AtomicU32> {
        self.check(offset, 4)?;
        ensure!(offset % 4 == 0, "atomic u32 offset {} is not 4-aligned", offset);
        // SAFETY: in bounds, aligned, and the mapping outlives the borrow.
        Ok(unsafe { &*(self.ptr.add(offset) as *const AtomicU32) })
    }

    fn atomic_u64(&self, offset: usize) -> Result<&AtomicU64> {
        self.check(offset, 8)?;
        ensure!(offset % 8 == 0, "atomic u64 offset {} is not 8-aligned", offset);
        // SAFETY: in bounds, aligned, and the mapping outlives the borrow.
        Ok(unsafe { &*(self.ptr.add(offset) as *const AtomicU64) })
    }

    fn atomic_i64(&self, offset: usize) -> Result<&AtomicI64> {
        self.check(offset, 8)?;
        ensure!(offset % 8 == 0, "atomic i64 offset {} is not 8-aligned", offset);
        // SAFETY: in bounds, aligned, and the mapping outlives the borrow.
        Ok(unsafe { &*(self.ptr.add(offset) as *const AtomicI64) })
    }

    pub fn load_u32(&self, offset: usize) -> Result<u32> {
        Ok(self.atomic_u32(offset)?.load(Ordering::Acquire))
    }

    pub fn store_u32(&self, offset: usize, value: u32) -> Result<()> {
        self.atomic_u32(offset)?.store(value, Ordering::Release);
        Ok(())
    }

    pub fn cas_u32(&self, offset: usize, expected: u32, new: u32) -> Result<bool> {
        Ok(self
            .atomic_u32(offset)?
            .compare_exchange(expected, new, Ordering::AcqRel, Ordering::Acquire)
            .is_ok())
    }

    pub fn load_u64(&self, offset: usize) -> Result<u64> {
        Ok(self.atomic_u64(offset)?.load(Ordering::Acquire))
    }

    pub fn store_u64(&self, offset: usize, value: u64) -> Result<()> {
        self.atomic_u64(offset)?.store(value, Ordering::Release);
        Ok(())
    }

    pub fn cas_u64(&self, offset: usize, expected: u64, new: u64) -> Result<bool> {
        Ok(self
            .atomic_u64(offset)?
            .compare_exchange(expected, new, Ordering::AcqRel, Ordering::Acquire)
            .is_ok())
    }

    pub fn fetch_add_i64(&self, offset: usize, delta: i64) -> Result<i64> {
        Ok(self.atomic_i64(offset)?.fetch_add(delta, Ordering::AcqRel))
    }

    /// Runs `f` holding the text-cell update mutex.
    pub fn with_text_cell_lock<R>(&self, f: impl FnOnce() -> R) -> R {
        let _guard = self.text_cell_lock.lock();
        f()
    }

    pub fn sync(&self) -> Result<()> {
        self.map.flush().wrap_err("failed to flush mapped buffer")
    }
}
