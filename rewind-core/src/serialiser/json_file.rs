/*!
JSON file serialiser rooted in the platform application-data directory.

The identifier is a `/`-separated sub-path below the root, letting callers
namespace their persisted histories:

```text
serialiser.serialise(&snapshots, "demos/prefs/user")
```

lands (on Linux) in `~/.local/share/rewind/demos/prefs/user.json`. Parent
directories are created as needed. The root can be overridden, which tests
use to stay inside a temp directory.
*/

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use super::{PersistedHistory, Serialiser};
use crate::{Result, RewindError, Snapshot};

/// Serialiser writing pretty-printed JSON under an application-data root.
#[derive(Debug, Clone)]
pub struct JsonFileSerialiser {
    root: PathBuf,
}

impl JsonFileSerialiser {
    /// Create a serialiser rooted in the platform data directory.
    ///
    /// # Errors
    /// [`RewindError::Validation`] if the platform has no resolvable
    /// application-data directory.
    pub fn new() -> Result<Self> {
        let data_dir = dirs::data_dir().ok_or_else(|| {
            RewindError::validation(
                "could not resolve an application data directory for this platform",
            )
        })?;
        Ok(Self {
            root: data_dir.join("rewind"),
        })
    }

    /// Create a serialiser rooted at an explicit directory.
    pub fn with_root<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Resolve the file an identifier maps to.
    pub fn locator(&self, identifier: &str) -> PathBuf {
        let mut path = self.root.clone();
        let mut parts = identifier.split('/').peekable();
        while let Some(part) = parts.next() {
            if parts.peek().is_some() {
                path.push(part);
            } else {
                path.push(format!("{part}.json"));
            }
        }
        path
    }

    fn validate_identifier(identifier: &str) -> Result<()> {
        if identifier.is_empty() {
            return Err(RewindError::validation(
                "serialisation identifier cannot be empty",
            ));
        }
        Ok(())
    }
}

impl Serialiser for JsonFileSerialiser {
    fn serialise(&self, snapshots: &[Snapshot], identifier: &str) -> Result<()> {
        Self::validate_identifier(identifier)?;
        let path = self.locator(identifier);

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                RewindError::storage(format!(
                    "failed to create directory {}: {e}",
                    parent.display()
                ))
            })?;
        }

        let container = PersistedHistory::new(snapshots)?;
        let encoded = serde_json::to_string_pretty(&container)?;
        fs::write(&path, encoded).map_err(|e| {
            RewindError::storage(format!("failed to write history to {}: {e}", path.display()))
        })?;

        debug!(path = %path.display(), "serialised history to json file");
        Ok(())
    }

    fn deserialise(&self, identifier: &str) -> Result<Vec<Snapshot>> {
        Self::validate_identifier(identifier)?;
        let path = self.locator(identifier);

        if !path.exists() {
            return Err(RewindError::NotFound(identifier.to_string()));
        }

        let encoded = fs::read_to_string(&path).map_err(|e| {
            RewindError::storage(format!(
                "failed to read history from {}: {e}",
                path.display()
            ))
        })?;
        let container: PersistedHistory = serde_json::from_str(&encoded)?;
        container.into_snapshots()
    }

    fn exists(&self, identifier: &str) -> bool {
        !identifier.is_empty() && self.locator(identifier).exists()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn sample_snapshots() -> Vec<Snapshot> {
        let mut snapshot = Snapshot::default();
        snapshot.insert("theme".to_string(), json!("dark"));
        vec![snapshot]
    }

    #[test]
    fn test_locator_appends_json_extension() {
        let serialiser = JsonFileSerialiser::with_root("/data");
        assert_eq!(
            serialiser.locator("demos/prefs/user"),
            PathBuf::from("/data/demos/prefs/user.json")
        );
        assert_eq!(serialiser.locator("flat"), PathBuf::from("/data/flat.json"));
    }

    #[test]
    fn test_roundtrip_with_nested_identifier() {
        let temp_dir = TempDir::new().unwrap();
        let serialiser = JsonFileSerialiser::with_root(temp_dir.path());
        let snapshots = sample_snapshots();

        serialiser.serialise(&snapshots, "demos/prefs/user").unwrap();
        assert!(serialiser.exists("demos/prefs/user"));
        assert!(serialiser.locator("demos/prefs/user").exists());

        let loaded = serialiser.deserialise("demos/prefs/user").unwrap();
        assert_eq!(loaded, snapshots);
    }

    #[test]
    fn test_missing_identifier_is_not_found() {
        let temp_dir = TempDir::new().unwrap();
        let serialiser = JsonFileSerialiser::with_root(temp_dir.path());

        assert!(!serialiser.exists("nothing/here"));
        let err = serialiser.deserialise("nothing/here").unwrap_err();
        assert!(matches!(err, RewindError::NotFound(id) if id == "nothing/here"));
    }

    #[test]
    fn test_empty_identifier_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let serialiser = JsonFileSerialiser::with_root(temp_dir.path());

        assert!(serialiser.serialise(&sample_snapshots(), "").is_err());
        assert!(serialiser.deserialise("").is_err());
        assert!(!serialiser.exists(""));
    }

    #[test]
    fn test_output_is_readable_json() {
        let temp_dir = TempDir::new().unwrap();
        let serialiser = JsonFileSerialiser::with_root(temp_dir.path());

        serialiser.serialise(&sample_snapshots(), "prefs").unwrap();
        let text = fs::read_to_string(serialiser.locator("prefs")).unwrap();
        assert!(text.contains("\"theme\""));
        assert!(text.contains('\n'));
    }
}
