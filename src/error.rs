//! The filesystem error taxonomy.
//!
//! Remote-store failures never cross the adapter boundary as client-library
//! types: [`FsError::from_grid`] folds every [`GridError`] category into
//! this closed set exactly once, attaching the virtual path and operation
//! that were in flight.

use crate::protocol::GridError;

/// Filesystem error type with contextual variants.
///
/// Every variant carries the virtual path and/or operation it concerns.
/// Uses `#[non_exhaustive]` for forward compatibility.
///
/// # Examples
///
/// ```rust
/// use datagrid_fs::FsError;
///
/// let err = FsError::NotFound { path: "/missing.dat".into() };
/// assert_eq!(err.to_string(), "not found: /missing.dat");
///
/// let err = FsError::PermissionDenied {
///     path: "/secret".into(),
///     operation: "remove",
/// };
/// assert_eq!(err.to_string(), "remove: permission denied: /secret");
/// ```
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum FsError {
    /// No remote node corresponds to the path.
    #[error("not found: {path}")]
    NotFound {
        /// The path that was not found.
        path: String,
    },

    /// A create or move target collides and overwrite was not requested.
    #[error("{operation}: already exists: {path}")]
    AlreadyExists {
        /// The path that already exists.
        path: String,
        /// The operation that failed.
        operation: &'static str,
    },

    /// Expected a data object but found a collection.
    #[error("not a file: {path}")]
    NotAFile {
        /// The path that is not a data object.
        path: String,
    },

    /// Expected a collection but found a data object.
    #[error("not a directory: {path}")]
    NotADirectory {
        /// The path that is not a collection.
        path: String,
    },

    /// Non-recursive removal of a populated collection.
    #[error("directory not empty: {path}")]
    DirectoryNotEmpty {
        /// The path to the non-empty collection.
        path: String,
    },

    /// The remote ACL rejected the operation, or authentication failed.
    #[error("{operation}: permission denied: {path}")]
    PermissionDenied {
        /// The path where permission was denied.
        path: String,
        /// The operation that was denied.
        operation: &'static str,
    },

    /// The path escapes the configured root or violates naming rules.
    ///
    /// Raised before any network access — this is the traversal guard.
    #[error("invalid path: {path} ({reason})")]
    InvalidPath {
        /// The offending path.
        path: String,
        /// Why it was rejected.
        reason: String,
    },

    /// Session-level failure, distinct from any store-level verdict.
    ///
    /// Surfaced only after the one transparent reconnect-and-retry has
    /// also failed.
    #[error("{operation}: connection lost: {details}")]
    ConnectionLost {
        /// The operation in flight when the connection failed.
        operation: &'static str,
        /// Transport-level detail from the client library.
        details: String,
    },

    /// The remote store does not implement this operation.
    #[error("operation not supported: {operation}")]
    Unsupported {
        /// The unsupported operation.
        operation: &'static str,
    },

    /// A batch operation finished but some sub-paths failed.
    ///
    /// Recursive removal keeps going past individual failures and reports
    /// the full set of paths it could not remove, so callers see the whole
    /// blast radius in one error.
    #[error("{operation}: {} path(s) could not be processed: {}", failed.len(), failed.join(", "))]
    Incomplete {
        /// The batch operation.
        operation: &'static str,
        /// Every sub-path that failed.
        failed: Vec<String>,
    },

    /// Any remote failure not otherwise classified.
    #[error("{operation} failed for {path}: {details}")]
    OperationFailed {
        /// The path involved.
        path: String,
        /// The operation that failed.
        operation: &'static str,
        /// Detail from the remote store.
        details: String,
    },
}

impl FsError {
    /// Map a protocol error category onto the filesystem taxonomy.
    ///
    /// This is the single place remote categories become filesystem errors;
    /// `path` and `operation` supply the context the category lacks.
    pub fn from_grid(err: GridError, path: &str, operation: &'static str) -> Self {
        match err {
            GridError::NotFound => FsError::NotFound {
                path: path.to_string(),
            },
            GridError::AlreadyExists => FsError::AlreadyExists {
                path: path.to_string(),
                operation,
            },
            GridError::NotEmpty => FsError::DirectoryNotEmpty {
                path: path.to_string(),
            },
            GridError::AccessDenied | GridError::AuthFailed => FsError::PermissionDenied {
                path: path.to_string(),
                operation,
            },
            GridError::Unsupported => FsError::Unsupported { operation },
            GridError::Disconnected(details) => FsError::ConnectionLost { operation, details },
            GridError::Protocol(details) => FsError::OperationFailed {
                path: path.to_string(),
                operation,
                details,
            },
        }
    }
}

impl From<FsError> for std::io::Error {
    fn from(err: FsError) -> Self {
        use std::io::ErrorKind;
        let kind = match &err {
            FsError::NotFound { .. } => ErrorKind::NotFound,
            FsError::AlreadyExists { .. } => ErrorKind::AlreadyExists,
            FsError::PermissionDenied { .. } => ErrorKind::PermissionDenied,
            FsError::InvalidPath { .. } => ErrorKind::InvalidInput,
            FsError::ConnectionLost { .. } => ErrorKind::ConnectionAborted,
            FsError::Unsupported { .. } => ErrorKind::Unsupported,
            FsError::NotAFile { .. } | FsError::NotADirectory { .. } => ErrorKind::InvalidInput,
            _ => ErrorKind::Other,
        };
        std::io::Error::new(kind, err)
    }
}
