//! Permission checks run before any mutation.

use std::fs;
use std::path::Path;

use crate::OpError;
use crate::path::nearest_existing_ancestor;

/// Fail unless `path` exists and can be read.
///
/// Directories must also be searchable. A symbolic link only needs to
/// exist; it is copied as a link and never opened.
pub fn ensure_readable_source(path: &Path) -> Result<(), OpError> {
    let metadata = fs::symlink_metadata(path).map_err(|_| OpError::PermissionDenied {
        path: path.to_path_buf(),
    })?;

    let readable = if metadata.file_type().is_symlink() {
        true
    } else if metadata.is_dir() {
        is_readable(path) && is_searchable(path)
    } else {
        is_readable(path)
    };

    if readable {
        Ok(())
    } else {
        Err(OpError::PermissionDenied {
            path: path.to_path_buf(),
        })
    }
}

/// Fail unless something can be created at `path`.
///
/// The check runs against the nearest existing ancestor, since `path`
/// itself usually does not exist yet.
pub fn ensure_writable_target(path: &Path) -> Result<(), OpError> {
    let ancestor = nearest_existing_ancestor(path).ok_or_else(|| OpError::PermissionDenied {
        path: path.to_path_buf(),
    })?;

    if is_read_only_mount(&ancestor) {
        return Err(OpError::ReadOnlyFileSystem { path: ancestor });
    }
    let searchable = !ancestor.is_dir() || is_searchable(&ancestor);
    if !is_writable(&ancestor) || !searchable {
        return Err(OpError::PermissionDenied { path: ancestor });
    }
    Ok(())
}

#[cfg(unix)]
fn access(path: &Path, mode: libc::c_int) -> bool {
    use std::ffi::CString;
    use std::os::unix::ffi::OsStrExt;

    let Ok(path_c) = CString::new(path.as_os_str().as_bytes()) else {
        return false;
    };
    unsafe { libc::access(path_c.as_ptr(), mode) == 0 }
}

#[cfg(unix)]
fn is_readable(path: &Path) -> bool {
    access(path, libc::R_OK)
}

#[cfg(unix)]
fn is_writable(path: &Path) -> bool {
    access(path, libc::W_OK)
}

#[cfg(unix)]
fn is_searchable(path: &Path) -> bool {
    access(path, libc::X_OK)
}

#[cfg(unix)]
fn is_read_only_mount(path: &Path) -> bool {
    use std::ffi::CString;
    use std::os::unix::ffi::OsStrExt;

    let Ok(path_c) = CString::new(path.as_os_str().as_bytes()) else {
        return false;
    };

    unsafe {
        let mut stat: libc::statvfs = std::mem::zeroed();
        if libc::statvfs(path_c.as_ptr(), &mut stat) != 0 {
            return false;
        }
        #[allow(clippy::unnecessary_cast, reason = "statvfs field types vary across platforms")]
        let read_only = (stat.f_flag as u64) & (libc::ST_RDONLY as u64) != 0;
        read_only
    }
}

#[cfg(not(unix))]
fn is_readable(path: &Path) -> bool {
    fs::metadata(path).is_ok()
}

#[cfg(not(unix))]
fn is_writable(path: &Path) -> bool {
    fs::metadata(path)
        .map(|m| !m.permissions().readonly())
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_searchable(_path: &Path) -> bool {
    true
}

#[cfg(not(unix))]
fn is_read_only_mount(_path: &Path) -> bool {
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_readable_source() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("file.txt");
        fs::write(&file, "hello").unwrap();

        assert!(ensure_readable_source(&file).is_ok());
        assert!(ensure_readable_source(temp.path()).is_ok());
    }

    #[test]
    fn test_missing_source_is_denied() {
        let temp = TempDir::new().unwrap();
        let err = ensure_readable_source(&temp.path().join("missing")).unwrap_err();
        assert!(matches!(err, OpError::PermissionDenied { .. }));
    }

    #[test]
    fn test_writable_target_uses_ancestor() {
        let temp = TempDir::new().unwrap();
        assert!(ensure_writable_target(&temp.path().join("a/b/c")).is_ok());
    }

    #[cfg(unix)]
    #[test]
    fn test_dangling_symlink_source_is_readable() {
        let temp = TempDir::new().unwrap();
        let link = temp.path().join("dangling");
        std::os::unix::fs::symlink(temp.path().join("nowhere"), &link).unwrap();
        assert!(ensure_readable_source(&link).is_ok());
    }

    #[cfg(unix)]
    #[test]
    fn test_unsearchable_directory_is_denied() {
        use std::os::unix::fs::PermissionsExt;

        // Root bypasses mode bits.
        if unsafe { libc::geteuid() } == 0 {
            return;
        }

        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("no-search");
        fs::create_dir(&dir).unwrap();
        fs::set_permissions(&dir, fs::Permissions::from_mode(0o600)).unwrap();

        let err = ensure_readable_source(&dir).unwrap_err();
        assert!(matches!(err, OpError::PermissionDenied { .. }));
        let err = ensure_writable_target(&dir.join("new.txt")).unwrap_err();
        assert!(matches!(err, OpError::PermissionDenied { .. }));

        fs::set_permissions(&dir, fs::Permissions::from_mode(0o755)).unwrap();
    }
}
