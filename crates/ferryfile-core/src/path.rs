//! Path normalization.
//!
//! User-supplied paths may contain `~`, relative segments and trailing
//! slashes. Everything that touches the filesystem works on the canonical
//! form produced here: absolute, cleaned, and symlink-resolved for the part
//! of the path that exists.

use std::ffi::OsString;
use std::fs;
use std::path::{Component, Path, PathBuf};

use crate::OpError;

/// Resolve `path` to its canonical absolute form.
///
/// Existing entries are fully canonicalized (symlinks resolved). For a
/// path whose tail does not exist yet, the nearest existing ancestor is
/// canonicalized and the missing segments are re-appended verbatim.
pub fn normalize(path: impl AsRef<Path>, home: &Path) -> Result<PathBuf, OpError> {
    let absolute = absolutize(path.as_ref(), home)?;
    resolve(&absolute, true)
}

/// Like [`normalize`], but the final component is never resolved.
///
/// A symbolic link therefore stays the link itself instead of turning into
/// its target, which is what copy, move and trash sources need.
pub fn normalize_entry(path: impl AsRef<Path>, home: &Path) -> Result<PathBuf, OpError> {
    let absolute = absolutize(path.as_ref(), home)?;
    resolve(&absolute, false)
}

/// Find the closest ancestor of `path` (including itself) that exists.
pub fn nearest_existing_ancestor(path: &Path) -> Option<PathBuf> {
    path.ancestors()
        .find(|ancestor| !ancestor.as_os_str().is_empty() && fs::symlink_metadata(ancestor).is_ok())
        .map(Path::to_path_buf)
}

/// Check whether `path` is `root` or lies below it.
pub fn is_within(path: &Path, root: &Path) -> bool {
    path.starts_with(root)
}

/// Expand `~`, make absolute and clean the path lexically.
fn absolutize(path: &Path, home: &Path) -> Result<PathBuf, OpError> {
    if path.as_os_str().is_empty() {
        return Err(OpError::invalid_path(path, "empty path"));
    }
    if path.to_string_lossy().contains('\0') {
        return Err(OpError::invalid_path(path, "path contains null bytes"));
    }

    let expanded = match path.strip_prefix("~") {
        Ok(rest) => home.join(rest),
        Err(_) => path.to_path_buf(),
    };

    let absolute = if expanded.is_absolute() {
        expanded
    } else {
        let cwd = std::env::current_dir()
            .map_err(|e| OpError::invalid_path(path, format!("no current directory: {e}")))?;
        cwd.join(expanded)
    };

    Ok(clean(&absolute))
}

/// Remove `.` segments, fold `..` and drop trailing separators.
fn clean(path: &Path) -> PathBuf {
    let mut cleaned = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Prefix(_) | Component::RootDir => cleaned.push(component.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                // Never climb above the root.
                if cleaned.parent().is_some() {
                    cleaned.pop();
                }
            }
            Component::Normal(segment) => cleaned.push(segment),
        }
    }
    cleaned
}

fn resolve(absolute: &Path, follow_leaf: bool) -> Result<PathBuf, OpError> {
    let mut tail: Vec<OsString> = Vec::new();
    let mut current = absolute;

    if !follow_leaf {
        if let (Some(parent), Some(name)) = (current.parent(), current.file_name()) {
            tail.push(name.to_os_string());
            current = parent;
        }
    }

    loop {
        if let Ok(canonical) = fs::canonicalize(current) {
            let mut resolved = canonical;
            for segment in tail.iter().rev() {
                resolved.push(segment);
            }
            return Ok(resolved);
        }

        match (current.parent(), current.file_name()) {
            (Some(parent), Some(name)) => {
                tail.push(name.to_os_string());
                current = parent;
            }
            _ => return Err(OpError::invalid_path(absolute, "no existing ancestor")),
        }
    }
}
