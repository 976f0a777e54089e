//! Heap-backed growable byte store.
//!
//! `ElasticBytes` is the single-threaded store behind `Bytes::elastic()`.
//! Writes past the current end grow the backing vector with zero fill, so
//! back-patching a header that was reserved earlier never needs a separate
//! reservation step. The "atomic" operations exist to satisfy the same
//! interface as `MappedBytes`; a wire over an elastic store is never shared,
//! so plain loads and stores are sufficient.

#[derive(Debug, Default)]
pub struct ElasticBytes {
    data: Vec<u8>,
}

impl ElasticBytes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: Vec::with_capacity(capacity),
        }
    }

    pub fn from_vec(data: Vec<u8>) -> Self {
        Self { data }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    pub fn clear(&mut self) {
        self.data.clear();
    }

    pub fn slice(&self, offset: usize, len: usize) -> eyre::Result<&[u8]> {
        eyre::ensure!(
            offset + len <= self.data.len(),
            "slice {}..{} out of bounds (len={})",
            offset,
            offset + len,
            self.data.len()
        );
        Ok(&self.data[offset..offset + len])
    }

    pub fn write_at(&mut self, offset: usize, src: &[u8]) {
        let end = offset + src.len();
        if end > self.data.len() {
            self.data.resize(end, 0);
        }
        self.data[offset..end].copy_from_slice(src);
    }

    pub fn load_u32(&self, offset: usize) -> eyre::Result<u32> {
        let b = self.slice(offset, 4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn store_u32(&mut self, offset: usize, value: u32) {
        self.write_at(offset, &value.to_le_bytes());
    }

    pub fn cas_u32(&mut self, offset: usize, expected: u32, new: u32) -> bool {
        match self.load_u32(offset) {
            Ok(current) if current == expected => {
                self.store_u32(offset, new);
                true
            }
            // A CAS against unwritten space claims it, zero-filled.
            Err(_) if expected == 0 => {
                self.store_u32(offset, new);
                true
            }
            _ => false,
        }
    }

    pub fn load_u64(&self, offset: usize) -> eyre::Result<u64> {
        let b = self.slice(offset, 8)?;
        let mut a = [0u8; 8];
        a.copy_from_slice(b);
        Ok(u64::from_le_bytes(a))
    }

    pub fn store_u64(&mut self, offset: usize, value: u64) {
        self.write_at(offset, &value.to_le_bytes());
    }

    pub fn cas_u64(&mut self, offset: usize, expected: u64, new: u64) -> bool {
        match self.load_u64(offset) {
            Ok(current) if current == expected => {
                self.store_u64(offset, new);
                true
            }
            Err(_) if expected == 0 => {
                self.store_u64(offset, new);
                true
            }
            _ => false,
        }
    }

    pub fn fetch_add_i64(&mut self, offset: usize, delta: i64) -> i64 {
        let current = self.load_u64(offset).unwrap_or(0) as i64;
        self.store_u64(offset, current.wrapping_add(delta) as u64);
        current
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_past_end_grows_with_zero_fill() {
        let mut e = ElasticBytes::new();
        e.write_at(4, b"xy");
        assert_eq!(e.as_slice(), &[0, 0, 0, 0, b'x', b'y']);
    }

    #[test]
    fn cas_on_unwritten_space_claims_it() {
        let mut e = ElasticBytes::new();
        assert!(e.cas_u32(0, 0, 5));
        assert_eq!(e.load_u32(0).unwrap(), 5);
        assert!(!e.cas_u32(0, 0, 9));
    }

    #[test]
    fn fetch_add_returns_previous_value() {
        let mut e = ElasticBytes::new();
        e.store_u64(0, 10);
        assert_eq!(e.fetch_add_i64(0, 5), 10);
        assert_eq!(e.load_u64(0).unwrap(), 15);
    }
}
