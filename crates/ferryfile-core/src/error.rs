//! Error types for file operations.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur while copying, moving, trashing or restoring.
#[derive(Debug, Error)]
pub enum OpError {
    /// The path could not be interpreted or resolved.
    #[error("Invalid path: {path} ({reason})")]
    InvalidPath { path: PathBuf, reason: String },

    /// Permission denied for a path.
    #[error("Permission denied: {path}")]
    PermissionDenied { path: PathBuf },

    /// The mount holding the path is read-only.
    #[error("Read-only file system: {path}")]
    ReadOnlyFileSystem { path: PathBuf },

    /// Path not found.
    #[error("Missing source: {path}")]
    NotFound { path: PathBuf },

    /// The destination exists but has the wrong type (e.g. a file where a
    /// directory is needed).
    #[error("Destination exists and isn't a directory: {path}")]
    DestinationWrongType { path: PathBuf },

    /// Something already exists where a new entry should be created.
    #[error("Already exists: {path}")]
    AlreadyExists { path: PathBuf },

    /// Generic I/O error.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The entry is neither a file, a directory nor a symlink.
    #[error("Unsupported file type: {path}")]
    UnsupportedFileType { path: PathBuf },

    /// A rename into the final location failed.
    #[error("Failed to rename {from} to {to}: {source}")]
    RenameFailed {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A copied tree does not have the size of its source.
    #[error("Copied size of {path} is {actual} bytes, expected {expected}")]
    SizeMismatch {
        path: PathBuf,
        expected: u64,
        actual: u64,
    },

    /// The copy half of a move succeeded but the source could not be deleted.
    #[error("Copied, but failed to delete source {path}: {source}")]
    SourceNotRemoved {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The path is not an item in the trash files area.
    #[error("Not a trash item: {path}")]
    NotTrashItem { path: PathBuf },

    /// The trash metadata record is absent or unparsable.
    #[error("Trash metadata missing for {path}")]
    MetadataMissing { path: PathBuf },

    /// Another file operation is still running.
    #[error("Another file operation is already in progress")]
    OperationInProgress,

    /// Operation was cancelled by the user.
    #[error("Operation cancelled.")]
    Cancelled,

    /// Other error.
    #[error("{message}")]
    Other { message: String },
}

impl OpError {
    /// Create an I/O error with path context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        match source.kind() {
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied { path },
            std::io::ErrorKind::NotFound => Self::NotFound { path },
            std::io::ErrorKind::ReadOnlyFilesystem => Self::ReadOnlyFileSystem { path },
            _ => Self::Io { path, source },
        }
    }

    /// Create an invalid path error.
    pub fn invalid_path(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::InvalidPath {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a rename failure.
    pub fn rename(from: impl Into<PathBuf>, to: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::RenameFailed {
            from: from.into(),
            to: to.into(),
            source,
        }
    }

    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidPath { .. } => ErrorKind::InvalidPath,
            Self::PermissionDenied { .. } => ErrorKind::PermissionDenied,
            Self::ReadOnlyFileSystem { .. } => ErrorKind::ReadOnlyFileSystem,
            Self::NotFound { .. } | Self::NotTrashItem { .. } => ErrorKind::PathNotFound,
            Self::DestinationWrongType { .. } => ErrorKind::DestinationWrongType,
            Self::AlreadyExists { .. } => ErrorKind::DestinationExists,
            Self::Io { .. } | Self::SizeMismatch { .. } | Self::SourceNotRemoved { .. } => {
                ErrorKind::IoError
            }
            Self::RenameFailed { .. } => ErrorKind::RenameFailed,
            Self::MetadataMissing { .. } => ErrorKind::MetadataMissing,
            Self::OperationInProgress => ErrorKind::Busy,
            Self::UnsupportedFileType { .. } => ErrorKind::Unknown,
            Self::Cancelled => ErrorKind::OperationCancelled,
            Self::Other { .. } => ErrorKind::Unknown,
        }
    }

    /// Check whether this error is a user cancellation.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// Classification of an [`OpError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    InvalidPath,
    PermissionDenied,
    ReadOnlyFileSystem,
    PathNotFound,
    DestinationWrongType,
    DestinationExists,
    IoError,
    RenameFailed,
    MetadataMissing,
    OperationCancelled,
    /// A second operation was requested while one is running.
    Busy,
    Unknown,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidPath => write!(f, "Invalid path"),
            Self::PermissionDenied => write!(f, "Permission denied"),
            Self::ReadOnlyFileSystem => write!(f, "Read-only file system"),
            Self::PathNotFound => write!(f, "Path not found"),
            Self::DestinationWrongType => write!(f, "Destination has the wrong type"),
            Self::DestinationExists => write!(f, "Destination exists"),
            Self::IoError => write!(f, "I/O error"),
            Self::RenameFailed => write!(f, "Rename failed"),
            Self::MetadataMissing => write!(f, "Metadata missing"),
            Self::OperationCancelled => write!(f, "Operation cancelled"),
            Self::Busy => write!(f, "Operation in progress"),
            Self::Unknown => write!(f, "Unknown error"),
        }
    }
}
