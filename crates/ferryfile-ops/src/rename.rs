//! Rename within the same directory.

use std::fs;
use std::path::{Path, PathBuf};

use ferryfile_core::{OpError, entry_exists};
use tracing::debug;

/// Longest name accepted, in bytes.
const MAX_NAME_LEN: usize = 255;

/// Check that `name` is usable as a single path component.
pub fn validate_name(name: &str) -> Result<(), OpError> {
    let invalid = |reason: &str| Err(OpError::invalid_path(name, reason));

    if name.trim().is_empty() {
        return invalid("name cannot be empty");
    }
    if name.len() > MAX_NAME_LEN {
        return invalid("name is too long (max 255 bytes)");
    }
    if name.contains(['/', '\\']) {
        return invalid("name can't contain path separators");
    }
    if name.contains('\0') {
        return invalid("name cannot contain NUL");
    }
    if name == "." || name == ".." {
        return invalid("'.' and '..' are reserved names");
    }
    Ok(())
}

/// Give `source` the name `new_name`, keeping it in the same directory.
///
/// Fails when something already uses the new name. Renaming to the current
/// name is a no-op. Returns the new path.
pub fn rename_entry(source: &Path, new_name: &str) -> Result<PathBuf, OpError> {
    validate_name(new_name)?;

    let parent = source
        .parent()
        .ok_or_else(|| OpError::invalid_path(source, "cannot rename a root directory"))?;
    let target = parent.join(new_name);
    if target == source {
        return Ok(target);
    }
    if entry_exists(&target) {
        return Err(OpError::AlreadyExists { path: target });
    }

    fs::rename(source, &target).map_err(|e| OpError::rename(source, &target, e))?;
    debug!(from = %source.display(), to = %target.display(), "Renamed");
    Ok(target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_validate_name_valid() {
        assert!(validate_name("test.txt").is_ok());
        assert!(validate_name(".hidden").is_ok());
        assert!(validate_name("file with spaces").is_ok());
    }

    #[test]
    fn test_validate_name_invalid() {
        for name in ["", "   ", "a/b", "a\\b", ".", "..", "nul\0byte"] {
            let err = validate_name(name).unwrap_err();
            assert!(matches!(err, OpError::InvalidPath { .. }), "{name:?}");
        }
        assert!(validate_name(&"x".repeat(256)).is_err());
    }

    #[test]
    fn test_rename_file() {
        let temp = TempDir::new().unwrap();
        let old = temp.path().join("old.txt");
        fs::write(&old, "content").unwrap();

        let new = rename_entry(&old, "new.txt").unwrap();
        assert_eq!(new, temp.path().join("new.txt"));
        assert!(!old.exists());
        assert_eq!(fs::read_to_string(&new).unwrap(), "content");
    }

    #[test]
    fn test_rename_onto_existing_fails() {
        let temp = TempDir::new().unwrap();
        let a = temp.path().join("a.txt");
        let b = temp.path().join("b.txt");
        fs::write(&a, "a").unwrap();
        fs::write(&b, "b").unwrap();

        let err = rename_entry(&a, "b.txt").unwrap_err();
        assert!(matches!(err, OpError::AlreadyExists { .. }));
        assert_eq!(fs::read_to_string(&a).unwrap(), "a");
        assert_eq!(fs::read_to_string(&b).unwrap(), "b");
    }

    #[test]
    fn test_rename_to_same_name() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("dir");
        fs::create_dir(&dir).unwrap();

        assert_eq!(rename_entry(&dir, "dir").unwrap(), dir);
        assert!(dir.is_dir());
    }
}
