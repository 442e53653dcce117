//! Recursive size estimation.

use std::fs;
use std::path::Path;

use ferryfile_core::{EntryKind, OpError};
use tokio_util::sync::CancellationToken;

/// Total bytes of regular files under `path`.
///
/// Symlinks count as zero and are never followed. The first unreadable
/// entry aborts the whole estimate.
pub fn total_bytes(path: &Path) -> Result<u64, OpError> {
    walk(path, None)
}

/// Like [`total_bytes`], but stops with [`OpError::Cancelled`] once `cancel`
/// is tripped.
pub fn total_bytes_cancellable(path: &Path, cancel: &CancellationToken) -> Result<u64, OpError> {
    walk(path, Some(cancel))
}

fn walk(path: &Path, cancel: Option<&CancellationToken>) -> Result<u64, OpError> {
    match EntryKind::probe(path)? {
        EntryKind::File { len } => {
            check(cancel)?;
            Ok(len)
        }
        EntryKind::Directory => {
            let mut total = 0u64;
            for entry in fs::read_dir(path).map_err(|e| OpError::io(path, e))? {
                let entry = entry.map_err(|e| OpError::io(path, e))?;
                total = total.saturating_add(walk(&entry.path(), cancel)?);
            }
            Ok(total)
        }
        EntryKind::Symlink { .. } | EntryKind::Other => {
            check(cancel)?;
            Ok(0)
        }
    }
}

fn check(cancel: Option<&CancellationToken>) -> Result<(), OpError> {
    match cancel {
        Some(token) if token.is_cancelled() => Err(OpError::Cancelled),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample_tree(root: &Path) {
        fs::create_dir_all(root.join("a/b")).unwrap();
        fs::write(root.join("a/one.txt"), vec![0u8; 100]).unwrap();
        fs::write(root.join("a/b/two.txt"), vec![0u8; 250]).unwrap();
        fs::write(root.join("three.txt"), vec![0u8; 7]).unwrap();
    }

    #[test]
    fn test_total_bytes_tree() {
        let temp = TempDir::new().unwrap();
        sample_tree(temp.path());

        assert_eq!(total_bytes(temp.path()).unwrap(), 357);
        assert_eq!(total_bytes(&temp.path().join("three.txt")).unwrap(), 7);
    }

    #[test]
    fn test_total_bytes_is_idempotent_and_additive() {
        let temp = TempDir::new().unwrap();
        sample_tree(temp.path());

        let whole = total_bytes(temp.path()).unwrap();
        assert_eq!(whole, total_bytes(temp.path()).unwrap());

        let parts = total_bytes(&temp.path().join("a")).unwrap()
            + total_bytes(&temp.path().join("three.txt")).unwrap();
        assert_eq!(whole, parts);
    }

    #[test]
    fn test_missing_path_fails() {
        let temp = TempDir::new().unwrap();
        let err = total_bytes(&temp.path().join("missing")).unwrap_err();
        assert!(matches!(err, OpError::NotFound { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_is_not_followed() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("big.bin"), vec![0u8; 4096]).unwrap();
        fs::create_dir(temp.path().join("dir")).unwrap();
        std::os::unix::fs::symlink(temp.path().join("big.bin"), temp.path().join("dir/link"))
            .unwrap();

        assert_eq!(total_bytes(&temp.path().join("dir")).unwrap(), 0);
    }

    #[test]
    fn test_cancelled_estimate() {
        let temp = TempDir::new().unwrap();
        sample_tree(temp.path());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = total_bytes_cancellable(temp.path(), &cancel).unwrap_err();
        assert!(err.is_cancelled());
    }
}
