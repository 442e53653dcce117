//! Shared state threaded through one running operation.

use std::io;
use std::path::Path;

use ferryfile_core::{EngineConfig, OpError};
use tokio_util::sync::CancellationToken;

use crate::conflict::{Conflict, ConflictResolution, ConflictResolver};
use crate::progress::{OperationType, ProgressSink, ProgressTracker};

/// Function used to rename entries in place.
pub type RenameFn = fn(&Path, &Path) -> io::Result<()>;

/// Everything an engine needs while processing one operation.
pub struct OpContext<'a> {
    /// Engine configuration.
    pub config: &'a EngineConfig,
    /// Cooperative cancellation flag.
    pub cancel: CancellationToken,
    /// Receives collision decisions.
    pub resolver: &'a mut dyn ConflictResolver,
    /// Progress state and throttled reporting.
    pub progress: ProgressTracker<'a>,
    /// Rename primitive (`std::fs::rename` unless replaced).
    pub rename: RenameFn,
}

impl<'a> OpContext<'a> {
    /// Create a context with a fresh cancellation token.
    pub fn new(
        config: &'a EngineConfig,
        operation_type: OperationType,
        resolver: &'a mut dyn ConflictResolver,
        sink: &'a mut dyn ProgressSink,
    ) -> Self {
        Self {
            config,
            cancel: CancellationToken::new(),
            resolver,
            progress: ProgressTracker::new(operation_type, config.progress_interval(), sink),
            rename: rename_in_place,
        }
    }

    /// Use an existing cancellation token.
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Replace the rename primitive.
    pub fn with_rename(mut self, rename: RenameFn) -> Self {
        self.rename = rename;
        self
    }

    /// Fail with [`OpError::Cancelled`] once cancellation was requested.
    pub fn check_cancelled(&self) -> Result<(), OpError> {
        if self.cancel.is_cancelled() {
            Err(OpError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Ask the resolver about a collision.
    ///
    /// A `Cancel` answer trips the shared token so the rest of the batch
    /// stops too.
    pub fn resolve(&mut self, conflict: &Conflict) -> ConflictResolution {
        let resolution = self.resolver.resolve(conflict);
        tracing::debug!(
            source = %conflict.source.display(),
            destination = %conflict.destination.display(),
            %resolution,
            "Conflict resolved"
        );
        if resolution == ConflictResolution::Cancel {
            self.cancel.cancel();
        }
        resolution
    }
}

fn rename_in_place(from: &Path, to: &Path) -> io::Result<()> {
    std::fs::rename(from, to)
}

impl std::fmt::Debug for OpContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpContext")
            .field("cancelled", &self.cancel.is_cancelled())
            .field("progress", &self.progress)
            .finish_non_exhaustive()
    }
}
