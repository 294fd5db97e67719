//! Error types for valuelog.

use thiserror::Error;

/// Result type alias for valuelog operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for value-log operations.
#[derive(Error, Debug, Clone)]
pub enum Error {
    /// I/O error from file operations.
    #[error("I/O error: {0}")]
    Io(String),

    /// Manifest file exists but is truncated or malformed.
    ///
    /// Fatal at open time: the store must not proceed with zeroed state.
    #[error("Corrupt manifest: {0}")]
    CorruptManifest(String),

    /// Malformed location or record header.
    #[error("Format error: {0}")]
    Format(String),

    /// The addressed value file or record no longer exists.
    ///
    /// During compaction a key-index miss surfaces as `NotFound`; that is the
    /// expected signal that a record is stale, not a failure. A `get` that
    /// races a compaction pass can also observe `NotFound` for a just-deleted
    /// file; callers recover by re-resolving the location through the key
    /// index and retrying.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Store directory is locked by another process.
    #[error("Lock error: {0}")]
    LockError(String),

    /// Store directory already exists when `error_if_exists` is set.
    #[error("Store already exists at: {0}")]
    StoreExists(String),

    /// Store directory missing and `create_if_missing` is disabled.
    #[error("Store not found at: {0}")]
    StoreNotFound(String),

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Operation attempted on a closed store.
    #[error("Store is closed")]
    StoreClosed,
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e.to_string())
    }
}

impl Error {
    /// Check whether this error signals a missing file or record.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::CorruptManifest("short read".into());
        assert_eq!(err.to_string(), "Corrupt manifest: short read");

        let err = Error::NotFound("level_0_number_3".into());
        assert!(err.is_not_found());
        assert!(!Error::StoreClosed.is_not_found());
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: Error = io.into();
        assert!(matches!(err, Error::Io(_)));
    }
}
