//! Per-stack configuration.
//!
//! Covers the stack's display name, the optional history depth cap and the
//! always-serialise policy. The depth cap is a configuration choice, not a
//! core guarantee: once exceeded, the oldest snapshot is evicted on store.

use serde::{Deserialize, Serialize};

use crate::{Result, RewindError};

/// Configuration for a [`SnapshotStack`](crate::SnapshotStack).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StackConfig {
    /// Display name used in logs and member-tagged errors; a short generated
    /// id is used when absent
    pub name: Option<String>,
    /// Maximum number of snapshots to retain; unbounded when absent
    pub max_depth: Option<usize>,
    /// Serialise on every committed store, not just `store_and_serialise`
    pub always_serialise: bool,
}

impl StackConfig {
    /// Create the default configuration: anonymous, unbounded history, no
    /// automatic serialisation.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a configuration with a stack name.
    pub fn named<S: Into<String>>(name: S) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    /// Set the stack name.
    pub fn with_name<S: Into<String>>(mut self, name: S) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Cap the history at `max_depth` snapshots.
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = Some(max_depth);
        self
    }

    /// Serialise after every committed store once a serialiser is bound.
    pub fn with_always_serialise(mut self) -> Self {
        self.always_serialise = true;
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if let Some(name) = &self.name {
            if name.is_empty() {
                return Err(RewindError::validation("stack name cannot be empty"));
            }
        }
        if self.max_depth == Some(0) {
            return Err(RewindError::validation("max_depth must be at least 1"));
        }
        Ok(())
    }
}
