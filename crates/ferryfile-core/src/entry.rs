//! Filesystem entry kinds.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::OpError;

/// Type of a filesystem entry, determined without following symlinks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntryKind {
    /// Regular file.
    File {
        /// Length in bytes.
        len: u64,
    },
    /// Directory.
    Directory,
    /// Symbolic link.
    Symlink {
        /// Link target exactly as stored in the link.
        target: PathBuf,
    },
    /// Other file types (sockets, devices, fifos).
    Other,
}

impl EntryKind {
    /// Inspect `path` without dereferencing a final symlink.
    pub fn probe(path: &Path) -> Result<Self, OpError> {
        let metadata = fs::symlink_metadata(path).map_err(|e| OpError::io(path, e))?;
        let file_type = metadata.file_type();

        if file_type.is_symlink() {
            let target = fs::read_link(path).map_err(|e| OpError::io(path, e))?;
            Ok(Self::Symlink { target })
        } else if file_type.is_dir() {
            Ok(Self::Directory)
        } else if file_type.is_file() {
            Ok(Self::File {
                len: metadata.len(),
            })
        } else {
            Ok(Self::Other)
        }
    }

    /// Check if this is a directory.
    pub fn is_dir(&self) -> bool {
        matches!(self, Self::Directory)
    }

    /// Check if this is a regular file.
    pub fn is_file(&self) -> bool {
        matches!(self, Self::File { .. })
    }
}

/// Check whether anything (including a dangling symlink) exists at `path`.
pub fn entry_exists(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_probe_kinds() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("file.txt");
        fs::write(&file, "hello").unwrap();

        assert_eq!(EntryKind::probe(&file).unwrap(), EntryKind::File { len: 5 });
        assert!(EntryKind::probe(temp.path()).unwrap().is_dir());
        assert!(EntryKind::probe(&temp.path().join("missing")).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_probe_symlink_not_followed() {
        let temp = TempDir::new().unwrap();
        let link = temp.path().join("link");
        std::os::unix::fs::symlink("does/not/exist", &link).unwrap();

        let kind = EntryKind::probe(&link).unwrap();
        assert_eq!(
            kind,
            EntryKind::Symlink {
                target: PathBuf::from("does/not/exist")
            }
        );
        assert!(entry_exists(&link));
    }
}
