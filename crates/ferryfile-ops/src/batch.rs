//! Multi-source operations.
//!
//! Every batch runs in the same phases: normalize and permission-check the
//! inputs, pre-scan sizes to fix the progress total, then process sources
//! one at a time. A failing source is recorded and the batch moves on;
//! cancellation stops it where it is.

use std::fs;
use std::path::{Path, PathBuf};

use ferryfile_core::{
    OpError, ensure_readable_source, ensure_writable_target, normalize, normalize_entry,
};
use tracing::{debug, info};

use crate::context::OpContext;
use crate::copy::copy_tree;
use crate::create::create_directory;
use crate::move_op::move_entry;
use crate::operation::OperationError;
use crate::progress::{OperationComplete, OperationType};
use crate::rename::rename_entry;
use crate::size::{total_bytes, total_bytes_cancellable};
use crate::trash::Trash;

/// A source that passed validation, with its pre-scanned size.
#[derive(Debug)]
struct Prepared {
    source: PathBuf,
    bytes: u64,
}

/// What happened to one source.
struct Transferred {
    skipped: usize,
    root_skipped: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Transfer {
    Copy,
    Move,
}

/// Copy every source into the `destination` directory.
pub fn copy_items(
    sources: &[PathBuf],
    destination: &Path,
    ctx: &mut OpContext<'_>,
) -> OperationComplete {
    transfer(Transfer::Copy, sources, destination, ctx)
}

/// Move every source into the `destination` directory.
pub fn move_items(
    sources: &[PathBuf],
    destination: &Path,
    ctx: &mut OpContext<'_>,
) -> OperationComplete {
    transfer(Transfer::Move, sources, destination, ctx)
}

fn transfer(
    mode: Transfer,
    sources: &[PathBuf],
    destination: &Path,
    ctx: &mut OpContext<'_>,
) -> OperationComplete {
    let operation_type = match mode {
        Transfer::Copy => OperationType::Copy,
        Transfer::Move => OperationType::Move,
    };
    let mut complete = OperationComplete::new(operation_type);
    info!(
        operation = %operation_type,
        sources = sources.len(),
        destination = %destination.display(),
        "Starting operation"
    );
    ctx.progress.start();

    let destination = match prepare_destination(destination, ctx) {
        Ok(destination) => destination,
        Err(e) => {
            complete.record_error(OperationError::from_op_error(destination, &e));
            complete.failed = sources.len().max(1);
            return finish(complete, ctx);
        }
    };

    let prepared = prepare_sources(sources, ctx, &mut complete, |source| match mode {
        Transfer::Copy => Ok(()),
        Transfer::Move => ensure_parent_writable(source),
    });

    for item in prepared {
        if ctx.cancel.is_cancelled() {
            complete.cancelled = true;
            break;
        }

        let Some(name) = item.source.file_name() else {
            let e = OpError::invalid_path(&item.source, "path has no file name");
            complete.record_error(OperationError::from_op_error(&item.source, &e));
            continue;
        };
        let target = destination.join(name);

        let result = match mode {
            Transfer::Copy if item.source == target => {
                debug!(path = %target.display(), "Source is already at the destination");
                ctx.progress.advance(item.bytes);
                Ok(Transferred {
                    skipped: 0,
                    root_skipped: false,
                })
            }
            Transfer::Copy => copy_tree(&item.source, &target, ctx).map(|r| Transferred {
                skipped: r.skipped,
                root_skipped: r.root_skipped,
            }),
            Transfer::Move => {
                move_entry(&item.source, &target, item.bytes, ctx).map(|r| Transferred {
                    skipped: r.skipped,
                    root_skipped: r.root_skipped,
                })
            }
        };

        match result {
            Ok(done) => {
                complete.skipped += done.skipped;
                if !done.root_skipped {
                    complete.succeeded += 1;
                }
            }
            Err(e) if e.is_cancelled() => {
                complete.cancelled = true;
                break;
            }
            Err(e) => complete.record_error(OperationError::from_op_error(&item.source, &e)),
        }
        ctx.progress.complete_file();
    }

    finish(complete, ctx)
}

/// Move every path to the trash, or delete it for good when it already
/// lives inside the trash.
pub fn delete_items(paths: &[PathBuf], ctx: &mut OpContext<'_>) -> OperationComplete {
    let mut complete = OperationComplete::new(OperationType::Delete);
    info!(paths = paths.len(), "Starting delete");
    ctx.progress.start();

    let trash = match Trash::new(ctx.config) {
        Ok(trash) => trash,
        Err(e) => {
            complete.record_error(OperationError::from_op_error(ctx.config.trash_root(), &e));
            complete.failed = paths.len().max(1);
            return finish(complete, ctx);
        }
    };
    let trash_root = ctx.config.trash_root();
    let prepared = prepare_sources(paths, ctx, &mut complete, |source| {
        if trash.contains(source) {
            ensure_parent_writable(source)
        } else {
            ensure_parent_writable(source)?;
            ensure_writable_target(&trash_root)
        }
    });

    for item in prepared {
        if ctx.cancel.is_cancelled() {
            complete.cancelled = true;
            break;
        }

        if trash.contains(&item.source) {
            match trash.delete_permanently(&item.source) {
                Ok(()) => {
                    debug!(path = %item.source.display(), "Deleted permanently");
                    ctx.progress.advance(item.bytes);
                    complete.succeeded += 1;
                }
                Err(e) => {
                    complete.record_error(OperationError::from_op_error(&item.source, &e));
                }
            }
        } else {
            match trash.trash(&item.source, item.bytes, ctx) {
                Ok(outcome) => {
                    if !outcome.restorable {
                        complete.non_restorable.push(outcome.trashed_path);
                    }
                    complete.succeeded += 1;
                }
                Err(e) if e.is_cancelled() => {
                    complete.cancelled = true;
                    break;
                }
                Err(e) => {
                    complete.record_error(OperationError::from_op_error(&item.source, &e));
                }
            }
        }
        ctx.progress.complete_file();
    }

    finish(complete, ctx)
}

/// Move one trashed item back to where it came from.
pub fn restore_item(trashed: &Path, ctx: &mut OpContext<'_>) -> OperationComplete {
    let mut complete = OperationComplete::new(OperationType::Restore);
    info!(path = %trashed.display(), "Starting restore");
    ctx.progress.start();

    let trash = match Trash::new(ctx.config) {
        Ok(trash) => trash,
        Err(e) => {
            complete.record_error(OperationError::from_op_error(trashed, &e));
            return finish(complete, ctx);
        }
    };
    let prepared = prepare_sources(
        std::slice::from_ref(&trashed.to_path_buf()),
        ctx,
        &mut complete,
        ensure_parent_writable,
    );

    for item in prepared {
        match trash.restore(&item.source, item.bytes, ctx) {
            Ok(restored) => {
                debug!(to = %restored.display(), "Restore finished");
                complete.succeeded += 1;
            }
            Err(e) if e.is_cancelled() => complete.cancelled = true,
            Err(e) => complete.record_error(OperationError::from_op_error(&item.source, &e)),
        }
        ctx.progress.complete_file();
    }

    finish(complete, ctx)
}

/// Permanently remove everything in the trash.
pub fn empty_trash(ctx: &mut OpContext<'_>) -> OperationComplete {
    let mut complete = OperationComplete::new(OperationType::EmptyTrash);
    info!(root = %ctx.config.trash_root().display(), "Emptying trash");
    ctx.progress.start();

    let trash = match Trash::new(ctx.config) {
        Ok(trash) => trash,
        Err(e) => {
            complete.record_error(OperationError::from_op_error(ctx.config.trash_root(), &e));
            return finish(complete, ctx);
        }
    };
    let bytes = match total_bytes(trash.files_dir()) {
        Ok(bytes) => bytes,
        Err(OpError::NotFound { .. }) => 0,
        Err(e) => {
            complete.record_error(OperationError::from_op_error(trash.files_dir(), &e));
            return finish(complete, ctx);
        }
    };
    ctx.progress.set_total(bytes, 1);

    match trash.empty() {
        Ok(()) => {
            ctx.progress.advance(bytes);
            complete.succeeded = 1;
        }
        Err(e) => complete.record_error(OperationError::from_op_error(trash.files_dir(), &e)),
    }
    ctx.progress.complete_file();

    finish(complete, ctx)
}

/// Create the directory `name` inside `parent`.
pub fn create_folder(parent: &Path, name: &str, ctx: &mut OpContext<'_>) -> OperationComplete {
    let mut complete = OperationComplete::new(OperationType::CreateDirectory);
    info!(parent = %parent.display(), name, "Creating folder");
    ctx.progress.start();
    ctx.progress.set_total(0, 1);

    let created = prepare_destination(parent, ctx)
        .and_then(|parent| create_directory(&parent, name));
    match created {
        Ok(path) => {
            debug!(path = %path.display(), "Folder created");
            complete.succeeded = 1;
        }
        Err(e) => complete.record_error(OperationError::from_op_error(parent, &e)),
    }
    ctx.progress.complete_file();

    finish(complete, ctx)
}

/// Give `source` a new name in its directory.
pub fn rename_item(source: &Path, new_name: &str, ctx: &mut OpContext<'_>) -> OperationComplete {
    let mut complete = OperationComplete::new(OperationType::Rename);
    info!(source = %source.display(), new_name, "Renaming");
    ctx.progress.start();
    ctx.progress.set_total(0, 1);

    let renamed = normalize_entry(source, &ctx.config.home).and_then(|source| {
        ensure_readable_source(&source)?;
        ensure_parent_writable(&source)?;
        rename_entry(&source, new_name)
    });
    match renamed {
        Ok(path) => {
            debug!(path = %path.display(), "Rename finished");
            complete.succeeded = 1;
        }
        Err(e) => complete.record_error(OperationError::from_op_error(source, &e)),
    }
    ctx.progress.complete_file();

    finish(complete, ctx)
}

/// Canonicalize the destination directory and check it can take new entries.
fn prepare_destination(destination: &Path, ctx: &OpContext<'_>) -> Result<PathBuf, OpError> {
    let destination = normalize(destination, &ctx.config.home)?;
    let metadata = fs::metadata(&destination).map_err(|e| OpError::io(&destination, e))?;
    if !metadata.is_dir() {
        return Err(OpError::DestinationWrongType { path: destination });
    }
    ensure_writable_target(&destination)?;
    Ok(destination)
}

/// Normalize, gate and size every input.
///
/// Rejected inputs are recorded in `complete` and dropped. On return the
/// progress total is fixed, unless the scan was cancelled.
fn prepare_sources(
    paths: &[PathBuf],
    ctx: &mut OpContext<'_>,
    complete: &mut OperationComplete,
    mut gate: impl FnMut(&Path) -> Result<(), OpError>,
) -> Vec<Prepared> {
    let mut prepared = Vec::with_capacity(paths.len());

    for path in paths {
        let checked = normalize_entry(path, &ctx.config.home).and_then(|source| {
            ensure_readable_source(&source)?;
            gate(&source)?;
            Ok(source)
        });
        let source = match checked {
            Ok(source) => source,
            Err(e) => {
                complete.record_error(OperationError::from_op_error(path, &e));
                continue;
            }
        };

        match total_bytes_cancellable(&source, &ctx.cancel) {
            Ok(bytes) => prepared.push(Prepared { source, bytes }),
            Err(e) if e.is_cancelled() => {
                complete.cancelled = true;
                return Vec::new();
            }
            Err(e) => complete.record_error(OperationError::from_op_error(&source, &e)),
        }
    }

    let total = prepared.iter().map(|p| p.bytes).sum();
    ctx.progress.set_total(total, prepared.len());
    prepared
}

fn ensure_parent_writable(path: &Path) -> Result<(), OpError> {
    match path.parent() {
        Some(parent) => ensure_writable_target(parent),
        None => Err(OpError::invalid_path(path, "path has no parent directory")),
    }
}

fn finish(mut complete: OperationComplete, ctx: &mut OpContext<'_>) -> OperationComplete {
    if ctx.cancel.is_cancelled() {
        complete.cancelled = true;
    }
    complete.bytes_processed = ctx.progress.bytes_processed();
    ctx.progress.finish();
    info!(
        summary = %complete.summary(),
        bytes = complete.bytes_processed,
        "Operation finished"
    );
    complete
}
