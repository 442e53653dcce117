//! Recursive copy with conflict resolution and progress reporting.

use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use ferryfile_core::{EntryKind, OpError, entry_exists, is_within};
use tracing::debug;

use crate::conflict::{Conflict, ConflictResolution, unique_path};
use crate::context::OpContext;
use crate::size::total_bytes;

/// Result of copying one source tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyReport {
    /// Where the source ended up (differs from the requested destination
    /// after a keep-both decision).
    pub destination: PathBuf,
    /// Number of nodes skipped by conflict resolution.
    pub skipped: usize,
    /// Whether the source itself was skipped.
    pub root_skipped: bool,
}

/// Outcome of a collision check for one node.
enum Placement {
    /// Write to this path (existing entries already handled).
    At(PathBuf),
    /// Leave the existing entry alone.
    Skipped(PathBuf),
}

/// Copy `source` (file, directory or symlink) to `destination`.
///
/// `destination` is the full path of the copy, not its parent directory.
/// Directories are copied recursively and symlinks are recreated with the
/// same target. Every collision goes through the context's resolver.
pub fn copy_tree(
    source: &Path,
    destination: &Path,
    ctx: &mut OpContext<'_>,
) -> Result<CopyReport, OpError> {
    let kind = EntryKind::probe(source)?;
    if kind.is_dir() && is_within(destination, source) {
        return Err(OpError::invalid_path(
            destination,
            "cannot copy a directory into itself",
        ));
    }

    let mut skipped = 0;
    let (final_path, root_skipped) = copy_node(source, destination, kind, ctx, &mut skipped)?;
    Ok(CopyReport {
        destination: final_path,
        skipped,
        root_skipped,
    })
}

fn copy_node(
    source: &Path,
    destination: &Path,
    kind: EntryKind,
    ctx: &mut OpContext<'_>,
    skipped: &mut usize,
) -> Result<(PathBuf, bool), OpError> {
    ctx.check_cancelled()?;

    let target = match place(source, destination, &kind, ctx)? {
        Placement::At(target) => target,
        Placement::Skipped(existing) => {
            *skipped += 1;
            let credit = match kind {
                EntryKind::File { len } => len,
                EntryKind::Directory => total_bytes(source)?,
                _ => 0,
            };
            ctx.progress.advance(credit);
            return Ok((existing, true));
        }
    };

    match kind {
        EntryKind::Symlink { target: link_target } => {
            create_symlink(&link_target, &target)?;
        }
        EntryKind::Directory => {
            copy_directory(source, &target, ctx, skipped)?;
        }
        EntryKind::File { .. } => {
            copy_file(source, &target, ctx)?;
        }
        EntryKind::Other => {
            return Err(OpError::UnsupportedFileType {
                path: source.to_path_buf(),
            });
        }
    }

    Ok((target, false))
}

/// Resolve a collision at `destination`, if there is one.
fn place(
    source: &Path,
    destination: &Path,
    kind: &EntryKind,
    ctx: &mut OpContext<'_>,
) -> Result<Placement, OpError> {
    if !entry_exists(destination) {
        return Ok(Placement::At(destination.to_path_buf()));
    }

    let conflict = Conflict::new(
        source.to_path_buf(),
        destination.to_path_buf(),
        kind.is_dir(),
    );
    match ctx.resolve(&conflict) {
        ConflictResolution::Skip => Ok(Placement::Skipped(destination.to_path_buf())),
        ConflictResolution::KeepBoth => {
            // The new name is derived from the entry already there.
            let taken = EntryKind::probe(destination)?;
            Ok(Placement::At(unique_path(
                destination,
                taken.is_dir(),
                ctx.config.max_copy_probes,
            )))
        }
        ConflictResolution::Replace => {
            // Files replace the old entry only once the new content is on disk.
            if !kind.is_file() {
                remove_entry(destination)?;
            }
            Ok(Placement::At(destination.to_path_buf()))
        }
        ConflictResolution::Cancel => Err(OpError::Cancelled),
    }
}

fn copy_directory(
    source: &Path,
    target: &Path,
    ctx: &mut OpContext<'_>,
    skipped: &mut usize,
) -> Result<(), OpError> {
    match fs::symlink_metadata(target) {
        Ok(metadata) if !metadata.is_dir() => {
            return Err(OpError::DestinationWrongType {
                path: target.to_path_buf(),
            });
        }
        Ok(_) => {}
        Err(_) => fs::create_dir(target).map_err(|e| OpError::io(target, e))?,
    }

    for (child, child_kind) in sorted_children(source)? {
        let name = child.file_name().unwrap_or_default();
        copy_node(&child, &target.join(name), child_kind, ctx, skipped)?;
    }

    if let Ok(metadata) = fs::metadata(source) {
        // Best effort; a read-only source directory still yields a usable copy.
        let _ = fs::set_permissions(target, metadata.permissions());
    }
    Ok(())
}

/// Children of `dir`, directories first, then by name.
pub(crate) fn sorted_children(dir: &Path) -> Result<Vec<(PathBuf, EntryKind)>, OpError> {
    let mut children = Vec::new();
    for entry in fs::read_dir(dir).map_err(|e| OpError::io(dir, e))? {
        let entry = entry.map_err(|e| OpError::io(dir, e))?;
        let path = entry.path();
        let kind = EntryKind::probe(&path)?;
        children.push((path, kind));
    }
    children.sort_by(|(a_path, a_kind), (b_path, b_kind)| {
        b_kind
            .is_dir()
            .cmp(&a_kind.is_dir())
            .then_with(|| a_path.file_name().cmp(&b_path.file_name()))
    });
    Ok(children)
}

fn copy_file(source: &Path, target: &Path, ctx: &mut OpContext<'_>) -> Result<(), OpError> {
    ctx.progress.set_current_file(Some(source.to_path_buf()));

    let temp = temp_path(target);
    debug!(temp = %temp.display(), "Copying through temporary file");

    if let Err(e) = write_temp(source, &temp, ctx) {
        let _ = fs::remove_file(&temp);
        return Err(e);
    }

    if entry_exists(target) {
        if let Err(e) = remove_entry(target) {
            let _ = fs::remove_file(&temp);
            return Err(e);
        }
    }

    fs::rename(&temp, target).map_err(|e| {
        let _ = fs::remove_file(&temp);
        OpError::rename(&temp, target, e)
    })
}

fn write_temp(source: &Path, temp: &Path, ctx: &mut OpContext<'_>) -> Result<(), OpError> {
    let mut reader = File::open(source).map_err(|e| OpError::io(source, e))?;
    let mut writer = File::options()
        .write(true)
        .create_new(true)
        .open(temp)
        .map_err(|e| OpError::io(temp, e))?;

    let mut buffer = vec![0u8; ctx.config.chunk_size];
    loop {
        let read = reader
            .read(&mut buffer)
            .map_err(|e| OpError::io(source, e))?;
        if read == 0 {
            break;
        }
        writer
            .write_all(&buffer[..read])
            .map_err(|e| OpError::io(temp, e))?;
        ctx.progress.advance(read as u64);
        ctx.check_cancelled()?;
    }

    writer.sync_all().map_err(|e| OpError::io(temp, e))?;
    let permissions = fs::metadata(source)
        .map_err(|e| OpError::io(source, e))?
        .permissions();
    fs::set_permissions(temp, permissions).map_err(|e| OpError::io(temp, e))?;
    Ok(())
}

/// `{target}.tmp-{epoch-millis}` next to the final file.
fn temp_path(target: &Path) -> PathBuf {
    let mut name = target.as_os_str().to_os_string();
    name.push(format!(".tmp-{}", chrono::Utc::now().timestamp_millis()));
    PathBuf::from(name)
}

#[cfg(unix)]
fn create_symlink(link_target: &Path, at: &Path) -> Result<(), OpError> {
    std::os::unix::fs::symlink(link_target, at).map_err(|e| OpError::io(at, e))
}

#[cfg(windows)]
fn create_symlink(link_target: &Path, at: &Path) -> Result<(), OpError> {
    let resolved = at.parent().map(|p| p.join(link_target));
    let result = match resolved {
        Some(ref resolved) if resolved.is_dir() => {
            std::os::windows::fs::symlink_dir(link_target, at)
        }
        _ => std::os::windows::fs::symlink_file(link_target, at),
    };
    result.map_err(|e| OpError::io(at, e))
}

/// Remove a file, symlink or whole directory tree without following links.
pub(crate) fn remove_entry(path: &Path) -> Result<(), OpError> {
    let metadata = fs::symlink_metadata(path).map_err(|e| OpError::io(path, e))?;
    let result = if metadata.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    };
    result.map_err(|e| OpError::io(path, e))
}
