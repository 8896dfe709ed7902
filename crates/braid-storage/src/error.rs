//! Storage error types.

use std::path::PathBuf;

use braid_core::validation::ValidationError;

/// Errors that can occur during storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The id was not found in either subtree.
    #[error("issue not found: {id}")]
    NotFound {
        /// The identifier that was looked up.
        id: String,
    },

    /// An id collision on create, including tombstoned ids.
    #[error("issue already exists: {id}")]
    AlreadyExists {
        /// The colliding identifier.
        id: String,
    },

    /// Lock acquisition timed out.
    #[error("issue busy (lock timeout): {id}")]
    Busy {
        /// The contended identifier.
        id: String,
    },

    /// A rename destination existed unexpectedly.
    #[error("conflicting file already present: {path}")]
    Conflict {
        /// The pre-existing destination path.
        path: PathBuf,
    },

    /// A parent or dependency change would form a cycle.
    #[error("operation would create a cycle through {id}")]
    Cycle {
        /// The id at which the cycle was detected.
        id: String,
    },

    /// The parent hierarchy would exceed the configured maximum depth.
    #[error("parent hierarchy depth {depth} exceeds maximum {max}")]
    DepthExceeded {
        /// The depth the write would produce.
        depth: u32,
        /// The configured maximum.
        max: u32,
    },

    /// A field value failed validation.
    #[error("invalid field: {0}")]
    InvalidField(#[from] ValidationError),

    /// A persisted document failed to decode.
    #[error("malformed document at {path}: {reason}")]
    Malformed {
        /// The offending file.
        path: PathBuf,
        /// Decode failure description.
        reason: String,
    },

    /// The caller's cancellation token fired.
    #[error("operation cancelled")]
    Cancelled,

    /// The caller combined options that are mutually exclusive.
    #[error("usage error: {0}")]
    Usage(String),

    /// Filesystem I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization failure on the write path.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Catch-all for unexpected internal errors.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Convenience alias used throughout the storage crate.
pub type Result<T> = std::result::Result<T, StoreError>;

impl StoreError {
    // -- Constructors --------------------------------------------------------

    /// Creates a [`StoreError::NotFound`] for the given id.
    pub fn not_found(id: impl Into<String>) -> Self {
        Self::NotFound { id: id.into() }
    }

    /// Creates a [`StoreError::AlreadyExists`] for the given id.
    pub fn already_exists(id: impl Into<String>) -> Self {
        Self::AlreadyExists { id: id.into() }
    }

    /// Creates a [`StoreError::Malformed`] for the given path.
    pub fn malformed(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Malformed {
            path: path.into(),
            reason: reason.into(),
        }
    }

    // -- Predicates ----------------------------------------------------------

    /// Returns `true` if this is a [`StoreError::NotFound`].
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Returns `true` if the error is transient and the operation may
    /// succeed on retry.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Busy { .. })
    }
}

impl From<braid_lockfile::LockError> for StoreError {
    fn from(e: braid_lockfile::LockError) -> Self {
        match e {
            braid_lockfile::LockError::Busy { path, .. } => Self::Busy {
                id: path
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_default(),
            },
            braid_lockfile::LockError::Io(io) => Self::Io(io),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_display() {
        let e = StoreError::not_found("bd-abc1");
        assert_eq!(e.to_string(), "issue not found: bd-abc1");
        assert!(e.is_not_found());
        assert!(!e.is_retryable());
    }

    #[test]
    fn busy_is_retryable() {
        let e = StoreError::Busy {
            id: "bd-abc1".into(),
        };
        assert!(e.is_retryable());
    }

    #[test]
    fn lock_busy_maps_to_busy() {
        let lock_err = braid_lockfile::LockError::Busy {
            path: PathBuf::from("/x/locks/bd-abc1.lock"),
            waited: std::time::Duration::from_secs(30),
        };
        let e: StoreError = lock_err.into();
        assert!(matches!(e, StoreError::Busy { ref id } if id == "bd-abc1"));
    }
}
