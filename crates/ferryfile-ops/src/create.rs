//! Directory creation.

use std::fs;
use std::path::{Path, PathBuf};

use ferryfile_core::{OpError, entry_exists};
use tracing::debug;

use crate::rename::validate_name;

/// Create the directory `name` inside `parent`.
///
/// `parent` must be an existing directory. The name is trimmed and must be
/// a single component; an existing entry of any kind is an error. Returns
/// the new directory's path.
pub fn create_directory(parent: &Path, name: &str) -> Result<PathBuf, OpError> {
    let name = name.trim();
    validate_name(name)?;

    let metadata = fs::metadata(parent).map_err(|e| OpError::io(parent, e))?;
    if !metadata.is_dir() {
        return Err(OpError::DestinationWrongType {
            path: parent.to_path_buf(),
        });
    }

    let path = parent.join(name);
    if entry_exists(&path) {
        return Err(OpError::AlreadyExists { path });
    }

    fs::create_dir(&path).map_err(|e| OpError::io(&path, e))?;
    debug!(path = %path.display(), "Created directory");
    Ok(path)
}
