/*!
Compression adapters for persisted history payloads.

The default implementation uses gzip, but the architecture allows plugging
in different algorithms behind the same trait.
*/

use flate2::{read::GzDecoder, write::GzEncoder, Compression};
use std::io::{Read, Write};

use crate::{Result, RewindError};

/// Compression abstraction for serialised history data.
pub trait CompressionAdapter {
    /// Compress the input data.
    fn compress(&self, data: &[u8]) -> Result<Vec<u8>>;

    /// Decompress the input data.
    fn decompress(&self, compressed_data: &[u8]) -> Result<Vec<u8>>;

    /// Name of the compression algorithm.
    fn algorithm_name(&self) -> &str;
}

/// Gzip compression adapter.
///
/// # Example
/// ```
/// use rewind_core::{CompressionAdapter, GzipCompressor};
///
/// let compressor = GzipCompressor::new();
/// let data = b"history payload to compress";
/// let compressed = compressor.compress(data)?;
/// let decompressed = compressor.decompress(&compressed)?;
/// assert_eq!(data, &decompressed[..]);
/// # Ok::<(), rewind_core::RewindError>(())
/// ```
#[derive(Debug, Clone)]
pub struct GzipCompressor {
    compression_level: Compression,
}

impl GzipCompressor {
    /// Create a gzip compressor with the default compression level (6).
    pub fn new() -> Self {
        Self {
            compression_level: Compression::default(),
        }
    }

    /// Create a gzip compressor with the specified level (0-9).
    pub fn with_level(level: u32) -> Self {
        Self {
            compression_level: Compression::new(level),
        }
    }
}

impl Default for GzipCompressor {
    fn default() -> Self {
        Self::new()
    }
}

impl CompressionAdapter for GzipCompressor {
    fn compress(&self, data: &[u8]) -> Result<Vec<u8>> {
        let mut encoder = GzEncoder::new(Vec::new(), self.compression_level);

        encoder.write_all(data).map_err(|e| {
            RewindError::compression(format!("failed to write data for compression: {e}"))
        })?;

        encoder
            .finish()
            .map_err(|e| RewindError::compression(format!("failed to finish compression: {e}")))
    }

    fn decompress(&self, compressed_data: &[u8]) -> Result<Vec<u8>> {
        let mut decoder = GzDecoder::new(compressed_data);
        let mut decompressed = Vec::new();

        decoder
            .read_to_end(&mut decompressed)
            .map_err(|e| RewindError::compression(format!("failed to decompress data: {e}")))?;

        Ok(decompressed)
    }

    fn algorithm_name(&self) -> &str {
        "gzip"
    }
}

/// Pass-through adapter for tests or pre-compressed payloads.
#[derive(Debug, Clone, Default)]
pub struct NoCompression;

impl NoCompression {
    pub fn new() -> Self {
        Self
    }
}

impl CompressionAdapter for NoCompression {
    fn compress(&self, data: &[u8]) -> Result<Vec<u8>> {
        Ok(data.to_vec())
    }

    fn decompress(&self, compressed_data: &[u8]) -> Result<Vec<u8>> {
        Ok(compressed_data.to_vec())
    }

    fn algorithm_name(&self) -> &str {
        "none"
    }
}
