//! File operation types.

use std::path::PathBuf;

use ferryfile_core::{ErrorKind, OpError};
use serde::{Deserialize, Serialize};

/// A file operation to be executed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum FileOperation {
    /// Copy files/directories into a destination directory.
    Copy {
        sources: Vec<PathBuf>,
        destination: PathBuf,
    },
    /// Move files/directories into a destination directory.
    Move {
        sources: Vec<PathBuf>,
        destination: PathBuf,
    },
    /// Move files/directories to the trash.
    Delete { targets: Vec<PathBuf> },
    /// Put a trashed item back where it came from.
    Restore { trashed: PathBuf },
    /// Permanently remove everything in the trash.
    EmptyTrash,
    /// Create a new directory inside `parent`.
    CreateDirectory { parent: PathBuf, name: String },
    /// Give an entry a new name in the same directory.
    Rename { source: PathBuf, new_name: String },
}

impl FileOperation {
    /// Create a copy operation.
    pub fn copy(sources: Vec<PathBuf>, destination: PathBuf) -> Self {
        Self::Copy {
            sources,
            destination,
        }
    }

    /// Create a move operation.
    pub fn move_to(sources: Vec<PathBuf>, destination: PathBuf) -> Self {
        Self::Move {
            sources,
            destination,
        }
    }

    /// Create a delete operation.
    pub fn delete(targets: Vec<PathBuf>) -> Self {
        Self::Delete { targets }
    }

    /// Create a restore operation.
    pub fn restore(trashed: PathBuf) -> Self {
        Self::Restore { trashed }
    }

    /// Create a new-folder operation.
    pub fn create_directory(parent: PathBuf, name: impl Into<String>) -> Self {
        Self::CreateDirectory {
            parent,
            name: name.into(),
        }
    }

    /// Create a rename operation.
    pub fn rename(source: PathBuf, new_name: impl Into<String>) -> Self {
        Self::Rename {
            source,
            new_name: new_name.into(),
        }
    }
}

/// An error that occurred during a file operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationError {
    /// The path that caused the error.
    pub path: PathBuf,
    /// Classification of the failure.
    pub kind: ErrorKind,
    /// A human-readable error message.
    pub message: String,
}

impl OperationError {
    /// Create a new operation error.
    pub fn new(path: PathBuf, kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            path,
            kind,
            message: message.into(),
        }
    }

    /// Record `error` against `path`.
    pub fn from_op_error(path: impl Into<PathBuf>, error: &OpError) -> Self {
        Self::new(path.into(), error.kind(), error.to_string())
    }
}

impl std::fmt::Display for OperationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}
