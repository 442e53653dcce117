//! File operations engine for ferryfile.
//!
//! This crate provides copy, move, trash and restore with conflict
//! resolution, byte-level progress reporting and cooperative cancellation,
//! plus new-folder and rename.
//! The engines run synchronously against an [`OpContext`]; the
//! [`OperationExecutor`] runs them on a worker thread and reports back
//! through a channel.

mod batch;
mod conflict;
mod context;
mod copy;
mod create;
mod executor;
mod move_op;
mod operation;
mod progress;
mod rename;
mod size;
mod trash;

pub use batch::{
    copy_items, create_folder, delete_items, empty_trash, move_items, rename_item, restore_item,
};
pub use conflict::{
    Conflict, ConflictResolution, ConflictResolver, FixedResolution, unique_path,
    unique_path_with,
};
pub use context::{OpContext, RenameFn};
pub use copy::{CopyReport, copy_tree};
pub use create::create_directory;
pub use executor::{ConflictRequest, OperationEvent, OperationExecutor, OperationHandle};
pub use move_op::{MoveReport, move_entry};
pub use operation::{FileOperation, OperationError};
pub use progress::{
    NoProgress, OperationComplete, OperationProgress, OperationType, ProgressSink,
    ProgressTracker,
};
pub use rename::{rename_entry, validate_name};
pub use size::{total_bytes, total_bytes_cancellable};
pub use trash::{Trash, TrashInfo, TrashItem, TrashOutcome};
