/*!
Serialiser adapters for history persistence.

This module defines the persistence abstraction a stack may bind to and the
concrete adapters shipped with the engine. The engine treats the trait
purely as a capability interface: it has no knowledge of the storage medium
behind an adapter (file, network, in-memory test double).

The on-storage representation is [`PersistedHistory`]: a versioned container
holding the full snapshot sequence together with a timestamp and a SHA-256
integrity hash, verified on load.
*/

pub mod gzip_file;
pub mod json_file;

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::{Result, RewindError, Snapshot};

// Re-export types for convenience
pub use gzip_file::GzipFileSerialiser;
pub use json_file::JsonFileSerialiser;

/// Current persisted-history format version for compatibility tracking.
pub const HISTORY_FORMAT_VERSION: u8 = 1;

/// Persistence contract a snapshot stack may bind to.
///
/// The identifier keys the persisted data; its interpretation is up to the
/// adapter (a sub-path, a filesystem path, a plain map key).
pub trait Serialiser {
    /// Write a restorable encoding of the history to durable storage.
    fn serialise(&self, snapshots: &[Snapshot], identifier: &str) -> Result<()>;

    /// Read the history back.
    ///
    /// # Errors
    /// [`RewindError::NotFound`] if no prior data exists for `identifier`.
    fn deserialise(&self, identifier: &str) -> Result<Vec<Snapshot>>;

    /// Whether persisted data exists for `identifier`.
    fn exists(&self, identifier: &str) -> bool;
}

/// Versioned, integrity-checked container for a persisted history.
#[derive(Debug, Serialize, Deserialize)]
pub struct PersistedHistory {
    /// Format version for compatibility (current: 1)
    pub format_version: u8,

    /// Timestamp of the serialisation
    pub saved_at: DateTime<Utc>,

    /// SHA-256 hash of the canonical snapshot encoding
    pub content_hash: String,

    /// The snapshot sequence, oldest first
    pub snapshots: Vec<Snapshot>,
}

impl PersistedHistory {
    /// Build a container around the given snapshot sequence.
    pub fn new(snapshots: &[Snapshot]) -> Result<Self> {
        Ok(Self {
            format_version: HISTORY_FORMAT_VERSION,
            saved_at: Utc::now(),
            content_hash: Self::compute_hash(snapshots)?,
            snapshots: snapshots.to_vec(),
        })
    }

    /// Compute the SHA-256 hash of the canonical snapshot encoding.
    pub fn compute_hash(snapshots: &[Snapshot]) -> Result<String> {
        let canonical = serde_json::to_vec(snapshots)?;
        let mut hasher = Sha256::new();
        hasher.update(&canonical);
        Ok(format!("{:x}", hasher.finalize()))
    }

    /// Whether this container is compatible with the current format version.
    pub fn is_compatible(&self) -> bool {
        self.format_version <= HISTORY_FORMAT_VERSION
    }

    /// Verify version compatibility and content integrity.
    pub fn verify(&self) -> Result<()> {
        if !self.is_compatible() {
            return Err(RewindError::invalid_format(format!(
                "unsupported history format version {} (current: {})",
                self.format_version, HISTORY_FORMAT_VERSION
            )));
        }
        let actual = Self::compute_hash(&self.snapshots)?;
        if actual != self.content_hash {
            return Err(RewindError::IntegrityCheckFailed {
                expected: self.content_hash.clone(),
                actual,
            });
        }
        Ok(())
    }

    /// Verify the container and unwrap the snapshot sequence.
    pub fn into_snapshots(self) -> Result<Vec<Snapshot>> {
        self.verify()?;
        Ok(self.snapshots)
    }
}

/// In-memory serialiser.
///
/// Stores encoded histories in a shared map. Clones share the same map, so
/// independent stacks (or a stack re-created later in a test) can exchange
/// state through one instance.
#[derive(Debug, Clone, Default)]
pub struct MemorySerialiser {
    entries: Rc<RefCell<HashMap<String, String>>>,
}

impl MemorySerialiser {
    /// Create an empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl Serialiser for MemorySerialiser {
    fn serialise(&self, snapshots: &[Snapshot], identifier: &str) -> Result<()> {
        let container = PersistedHistory::new(snapshots)?;
        let encoded = serde_json::to_string(&container)?;
        self.entries
            .borrow_mut()
            .insert(identifier.to_string(), encoded);
        Ok(())
    }

    fn deserialise(&self, identifier: &str) -> Result<Vec<Snapshot>> {
        let encoded = self
            .entries
            .borrow()
            .get(identifier)
            .cloned()
            .ok_or_else(|| RewindError::NotFound(identifier.to_string()))?;
        let container: PersistedHistory = serde_json::from_str(&encoded)?;
        container.into_snapshots()
    }

    fn exists(&self, identifier: &str) -> bool {
        self.entries.borrow().contains_key(identifier)
    }
}
