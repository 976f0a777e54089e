//! # Compression Hook
//!
//! Compressed sub-blobs are tagged by codec name so that a reader can
//! decompress them without out-of-band configuration. The engine ships two
//! codecs, `gzip` (via flate2) and `lzw` (self-contained, the default for
//! the compressed-binary wire); additional codecs register by name through
//! [`register_codec`].
//!
//! ## Blob Layout
//!
//! A compressed element stores `codec-name, uncompressed-length,
//! compressed-bytes`. The uncompressed length lets readers pre-size the
//! output buffer and reject blobs that inflate beyond it.
//!
//! The registry is process-wide and read-mostly; lookups take a read lock
//! only.

use std::io::{Read, Write};
use std::sync::{Arc, OnceLock};

use eyre::{bail, ensure, Result, WrapErr};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use hashbrown::HashMap;
use parking_lot::RwLock;

pub trait Codec: Send + Sync {
    fn name(&self) -> &'static str;
    fn compress(&self, raw: &[u8]) -> Result<Vec<u8>>;
    fn decompress(&self, compressed: &[u8], uncompressed_len: usize) -> Result<Vec<u8>>;
}

struct Gzip;

impl Codec for Gzip {
    fn name(&self) -> &'static str {
        "gzip"
    }

    fn compress(&self, raw: &[u8]) -> Result<Vec<u8>> {
        let mut enc = GzEncoder::new(Vec::new(), Compression::default());
        enc.write_all(raw).wrap_err("gzip compression failed")?;
        enc.finish().wrap_err("gzip compression failed")
    }

    fn decompress(&self, compressed: &[u8], uncompressed_len: usize) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(uncompressed_len);
        GzDecoder::new(compressed)
            .read_to_end(&mut out)
            .wrap_err("gzip decompression failed")?;
        ensure!(
            out.len() == uncompressed_len,
            "gzip blob inflated to {} bytes, header said {}",
            out.len(),
            uncompressed_len
        );
        Ok(out)
    }
}

/// Classic byte-oriented LZW with 12-bit codes and dictionary reset.
///
/// Codes are emitted most-significant-bit first at the current code width;
/// the width grows from 9 to 12 bits as the dictionary fills and the
/// dictionary resets when code 4096 would be assigned.
struct Lzw;

const LZW_CLEAR: u16 = 256;
const LZW_FIRST: u16 = 257;
const LZW_MAX_CODE: u16 = 4095;

struct BitWriter {
    out: Vec<u8>,
    acc: u32,
    nbits: u32,
}

impl BitWriter {
    fn new() -> Self {
        Self {
            out: Vec::new(),
            acc: 0,
            nbits: 0,
        }
    }

    fn put(&mut self, code: u16, width: u32) {
        self.acc = (self.acc << width) | code as u32;
        self.nbits += width;
        while self.nbits >= 8 {
            self.nbits -= 8;
            self.out.push((self.acc >> self.nbits) as u8);
        }
    }

    fn finish(mut self) -> Vec<u8> {
        if self.nbits > 0 {
            self.out.push((self.acc << (8 - self.nbits)) as u8);
        }
        self.out
    }
}

struct BitReader<'a> {
    input: &'a [u8],
    pos: usize,
    acc: u32,
    nbits: u32,
}

impl<'a> BitReader<'a> {
    fn new(input: &'a [u8]) -> Self {
        Self {
            input,
            pos: 0,
            acc: 0,
            nbits: 0,
        }
    }

    fn get(&mut self, width: u32) -> Option<u16> {
        while self.nbits < width {
            if self.pos >= self.input.len() {
                return None;
            }
            self.acc = (self.acc << 8) | self.input[self.pos] as u32;
            self.pos += 1;
            self.nbits += 8;
        }
        self.nbits -= width;
        Some(((self.acc >> self.nbits) & ((1 << width) - 1)) as u16)
    }
}

fn lzw_width(next_code: u16) -> u32 {
    match next_code {
        0..=511 => 9,
        512..=1023 => 10,
        1024..=2047 => 11,
        _ => 12,
    }
}

impl Codec for Lzw {
    fn name(&self) -> &'static str {
        "lzw"
    }

    fn compress(&self, raw: &[u8]) -> Result<Vec<u8>> {
        let mut dict: HashMap<Vec<u8>, u16> = HashMap::new();
        let mut next_code = LZW_FIRST;
        let mut writer = BitWriter::new();
        let mut current: Vec<u8> = Vec::new();

        for &b in raw {
            let mut candidate = current.clone();
            candidate.push(b);
            let known = candidate.len() == 1 || dict.contains_key(&candidate);
            if known {
                current = candidate;
                continue;
            }
            writer.put(code_of(&dict, &current), lzw_width(next_code));
            if next_code > LZW_MAX_CODE {
                writer.put(LZW_CLEAR, 12);
                dict.clear();
                next_code = LZW_FIRST;
            } else {
                dict.insert(candidate, next_code);
                next_code += 1;
            }
            current = vec![b];
        }
        if !current.is_empty() {
            writer.put(code_of(&dict, &current), lzw_width(next_code));
        }
        Ok(writer.finish())
    }

    fn decompress(&self, compressed: &[u8], uncompressed_len: usize) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(uncompressed_len);
        let mut dict: Vec<Vec<u8>> = Vec::new();
        let mut reader = BitReader::new(compressed);
        let mut previous: Option<Vec<u8>> = None;

        while out.len() < uncompressed_len {
            // `next_free` is the code this read will define; the decoder
            // trails the encoder by one pending insertion, so the read
            // width tracks next_free + 1 once a previous entry exists.
            let next_free = LZW_FIRST + dict.len() as u16;
            let width = if previous.is_some() {
                lzw_width(next_free + 1)
            } else {
                lzw_width(next_free)
            };
            let Some(code) = reader.get(width) else {
                bail!(
                    "lzw stream ended after {} of {} bytes",
                    out.len(),
                    uncompressed_len
                );
            };
            if code == LZW_CLEAR {
                dict.clear();
                previous = None;
                continue;
            }
            let entry = if code < 256 {
                vec![code as u8]
            } else if let Some(e) = dict.get((code - LZW_FIRST) as usize) {
                e.clone()
            } else if code == next_free && previous.is_some() {
                // cScSc pattern: the code references the entry this very
                // read defines.
                let prev = previous.as_ref().unwrap();
                let mut e = prev.clone();
                e.push(prev[0]);
                e
            } else {
                bail!("lzw code {} out of range", code);
            };
            if let Some(prev) = previous.take() {
                if next_free <= LZW_MAX_CODE {
                    let mut defined = prev;
                    defined.push(entry[0]);
                    dict.push(defined);
                }
            }
            out.extend_from_slice(&entry);
            previous = Some(entry);
        }
        ensure!(
            out.len() == uncompressed_len,
            "lzw blob inflated to {} bytes, header said {}",
            out.len(),
            uncompressed_len
        );
        Ok(out)
    }
}

fn code_of(dict: &HashMap<Vec<u8>, u16>, seq: &[u8]) -> u16 {
    if seq.len() == 1 {
        seq[0] as u16
    } else {
        dict[seq]
    }
}

type Registry = RwLock<HashMap<&'static str, Arc<dyn Codec>>>;

fn registry() -> &'static Registry {
    static REGISTRY: OnceLock<Registry> = OnceLock::new();
    REGISTRY.get_or_init(|| {
        let mut map: HashMap<&'static str, Arc<dyn Codec>> = HashMap::new();
        map.insert("gzip", Arc::new(Gzip));
        map.insert("lzw", Arc::new(Lzw));
        RwLock::new(map)
    })
}

pub fn register_codec(codec: Arc<dyn Codec>) {
    registry().write().insert(codec.name(), codec);
}

pub fn codec(name: &str) -> Result<Arc<dyn Codec>> {
    registry()
        .read()
        .get(name)
        .cloned()
        .ok_or_else(|| eyre::eyre!("no codec registered under '{}'", name))
}
