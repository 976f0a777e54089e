//! Wire configuration options.

/// Codec selection for the compressed-binary wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompressionCodec {
    Gzip,
    #[default]
    Lzw,
    Snappy,
}

impl CompressionCodec {
    pub fn name(&self) -> &'static str {
        match self {
            CompressionCodec::Gzip => "gzip",
            CompressionCodec::Lzw => "lzw",
            CompressionCodec::Snappy => "snappy",
        }
    }
}

/// Options shared by every wire; most matter to one encoding only.
#[derive(Debug, Clone)]
pub struct WireConfig {
    /// Binary: elide field-name elements; fields are located positionally.
    pub field_less: bool,
    /// Binary: write decimal field names as small-int elements.
    pub numeric_id: bool,
    /// Compressed-binary: payloads at or above this many bytes compress.
    pub compression_threshold: usize,
    pub compression_codec: CompressionCodec,
    /// Emit ISO-8859-1 instead of UTF-8 when the text is plain ASCII.
    pub use_8bit_text: bool,
}

impl Default for WireConfig {
    fn default() -> Self {
        Self {
            field_less: false,
            numeric_id: false,
            compression_threshold: 128,
            compression_codec: CompressionCodec::default(),
            use_8bit_text: false,
        }
    }
}
