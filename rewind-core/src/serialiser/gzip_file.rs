/*!
Compressed binary file serialiser.

The identifier is the destination path itself, so the caller controls the
location completely. The payload is the same [`PersistedHistory`] container
the JSON serialiser writes, run through a compression adapter (gzip by
default).
*/

use std::fs;
use std::path::Path;

use tracing::debug;

use super::{PersistedHistory, Serialiser};
use crate::compression::{CompressionAdapter, GzipCompressor};
use crate::{Result, RewindError, Snapshot};

/// Serialiser writing a compressed history file at a caller-supplied path.
#[derive(Debug, Clone)]
pub struct GzipFileSerialiser<C: CompressionAdapter = GzipCompressor> {
    compressor: C,
}

impl GzipFileSerialiser<GzipCompressor> {
    /// Create a serialiser with default gzip compression.
    pub fn new() -> Self {
        Self {
            compressor: GzipCompressor::new(),
        }
    }
}

impl Default for GzipFileSerialiser<GzipCompressor> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: CompressionAdapter> GzipFileSerialiser<C> {
    /// Create a serialiser with a specific compression adapter.
    pub fn with_compressor(compressor: C) -> Self {
        Self { compressor }
    }
}

impl<C: CompressionAdapter> Serialiser for GzipFileSerialiser<C> {
    fn serialise(&self, snapshots: &[Snapshot], identifier: &str) -> Result<()> {
        if identifier.is_empty() {
            return Err(RewindError::validation(
                "serialisation identifier cannot be empty",
            ));
        }
        let path = Path::new(identifier);

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| {
                    RewindError::storage(format!(
                        "failed to create directory {}: {e}",
                        parent.display()
                    ))
                })?;
            }
        }

        let container = PersistedHistory::new(snapshots)?;
        let encoded = serde_json::to_vec(&container)?;
        let compressed = self.compressor.compress(&encoded)?;
        fs::write(path, compressed).map_err(|e| {
            RewindError::storage(format!("failed to write history to {}: {e}", path.display()))
        })?;

        debug!(
            path = %path.display(),
            algorithm = self.compressor.algorithm_name(),
            "serialised history to compressed file"
        );
        Ok(())
    }

    fn deserialise(&self, identifier: &str) -> Result<Vec<Snapshot>> {
        let path = Path::new(identifier);
        if !path.exists() {
            return Err(RewindError::NotFound(identifier.to_string()));
        }

        let compressed = fs::read(path).map_err(|e| {
            RewindError::storage(format!(
                "failed to read history from {}: {e}",
                path.display()
            ))
        })?;
        let encoded = self.compressor.decompress(&compressed)?;
        let container: PersistedHistory = serde_json::from_slice(&encoded)?;
        container.into_snapshots()
    }

    fn exists(&self, identifier: &str) -> bool {
        Path::new(identifier).exists()
    }
}
