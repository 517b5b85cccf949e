/*!
Error types for the Rewind core engine.
*/

use thiserror::Error;

/// Result type used throughout the Rewind core.
pub type Result<T> = std::result::Result<T, RewindError>;

/// Errors that can occur during snapshot-stack operations.
#[derive(Error, Debug)]
pub enum RewindError {
    /// Registering a label that already exists on the stack's registry
    #[error("label '{0}' is already registered")]
    DuplicateLabel(String),

    /// Restore offset addressing past the end of the history
    #[error("restore offset {offset} is out of range for a history of depth {depth}")]
    OutOfRange { offset: usize, depth: usize },

    /// Binding a serialiser to a stack that already has one
    #[error("a serialiser is already bound to this stack")]
    SerialiserAlreadyBound,

    /// Serialising or deserialising without a bound serialiser
    #[error("no serialiser is bound to this stack")]
    NoSerialiser,

    /// No persisted history exists for the given identifier
    #[error("no persisted history exists for identifier '{0}'")]
    NotFound(String),

    /// A getter failed while capturing a snapshot
    #[error("failed to capture binding '{label}': {source}")]
    Capture {
        label: String,
        source: Box<RewindError>,
    },

    /// A setter failed while applying a snapshot
    #[error("failed to apply binding '{label}': {source}")]
    Apply {
        label: String,
        source: Box<RewindError>,
    },

    /// A fan-out validation failure on a group member other than the caller
    #[error("group member '{member}': {source}")]
    Member {
        member: String,
        source: Box<RewindError>,
    },

    /// Commit-phase failures across a group fan-out; successful members stand
    #[error("group fan-out failed on {} of {} member(s)", .failures.len(), .total)]
    Propagation {
        failures: Vec<MemberFailure>,
        total: usize,
    },

    /// Validation errors
    #[error("validation error: {0}")]
    Validation(String),

    /// I/O errors during file operations
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Storage-level failures in serialiser adapters
    #[error("storage error: {0}")]
    Storage(String),

    /// Compression/decompression errors
    #[error("compression error: {0}")]
    Compression(String),

    /// Integrity check failures on persisted history
    #[error("integrity check failed: expected hash {expected}, got {actual}")]
    IntegrityCheckFailed { expected: String, actual: String },

    /// Invalid persisted history format
    #[error("invalid history format: {0}")]
    InvalidFormat(String),
}

/// One failed member inside a [`RewindError::Propagation`] report.
#[derive(Debug)]
pub struct MemberFailure {
    /// Name of the stack whose local operation failed
    pub member: String,
    /// The failure itself
    pub error: RewindError,
}

impl std::fmt::Display for MemberFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.member, self.error)
    }
}

impl RewindError {
    /// Create a new validation error
    pub fn validation<S: Into<String>>(msg: S) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a new storage error
    pub fn storage<S: Into<String>>(msg: S) -> Self {
        Self::Storage(msg.into())
    }

    /// Create a new compression error
    pub fn compression<S: Into<String>>(msg: S) -> Self {
        Self::Compression(msg.into())
    }

    /// Create a new invalid format error
    pub fn invalid_format<S: Into<String>>(msg: S) -> Self {
        Self::InvalidFormat(msg.into())
    }

    /// Wrap an error with the name of the group member it occurred on
    pub(crate) fn on_member<S: Into<String>>(member: S, source: RewindError) -> Self {
        Self::Member {
            member: member.into(),
            source: Box::new(source),
        }
    }
}
