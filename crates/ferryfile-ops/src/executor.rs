//! Background execution of file operations.
//!
//! Each operation runs on its own worker thread and talks to the caller
//! through one event channel. Conflicts are a rendezvous: the worker sends a
//! [`ConflictRequest`] and blocks until the caller answers it.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};

use ferryfile_core::{EngineConfig, OpError};
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::batch::{
    copy_items, create_folder, delete_items, empty_trash, move_items, rename_item, restore_item,
};
use crate::conflict::{Conflict, ConflictResolution, ConflictResolver};
use crate::context::{OpContext, RenameFn};
use crate::operation::FileOperation;
use crate::progress::{OperationComplete, OperationProgress, OperationType, ProgressSink};

/// Event delivered to the caller of a running operation.
#[derive(Debug)]
pub enum OperationEvent {
    /// Progress update. Intermediate updates may be dropped when the
    /// caller falls behind.
    Progress(OperationProgress),
    /// A destination already exists; the worker waits for an answer.
    Conflict(ConflictRequest),
    /// The operation completed.
    Complete(OperationComplete),
}

/// A pending conflict decision.
///
/// Dropping the request without answering cancels the operation.
#[derive(Debug)]
pub struct ConflictRequest {
    conflict: Conflict,
    reply: oneshot::Sender<ConflictResolution>,
}

impl ConflictRequest {
    /// The collision being asked about.
    pub fn conflict(&self) -> &Conflict {
        &self.conflict
    }

    /// Answer the request and let the worker continue.
    pub fn respond(self, resolution: ConflictResolution) {
        // The worker only goes away after cancellation; nothing to report then.
        let _ = self.reply.send(resolution);
    }
}

/// Handle to a running operation.
#[derive(Debug)]
pub struct OperationHandle {
    /// Progress, conflict and completion events.
    pub events: mpsc::Receiver<OperationEvent>,
    cancel: CancellationToken,
    join: Option<JoinHandle<()>>,
}

impl OperationHandle {
    /// Request cancellation. The worker stops at the next unit of work.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Block until the operation finishes and return its outcome.
    ///
    /// Pending progress is discarded and unanswered conflicts cancel the
    /// operation. Must not be called from inside an async runtime.
    pub fn wait(mut self) -> Option<OperationComplete> {
        let mut outcome = None;
        while let Some(event) = self.events.blocking_recv() {
            match event {
                OperationEvent::Progress(_) => {}
                OperationEvent::Conflict(request) => drop(request),
                OperationEvent::Complete(complete) => outcome = Some(complete),
            }
        }
        self.join_worker();
        outcome
    }

    fn join_worker(&mut self) {
        if let Some(join) = self.join.take() {
            if join.join().is_err() {
                warn!("File operation worker panicked");
            }
        }
    }
}

/// Executor for file operations with a single-operation policy.
#[derive(Debug, Clone)]
pub struct OperationExecutor {
    config: EngineConfig,
    busy: Arc<AtomicBool>,
    rename: Option<RenameFn>,
}

impl OperationExecutor {
    /// Create an executor for the given configuration.
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            busy: Arc::new(AtomicBool::new(false)),
            rename: None,
        }
    }

    /// Replace the rename primitive used by moves, trash and restore.
    pub fn with_rename(mut self, rename: RenameFn) -> Self {
        self.rename = Some(rename);
        self
    }

    /// Check whether an operation is currently running.
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Execute a copy operation.
    pub fn copy(
        &self,
        sources: Vec<PathBuf>,
        destination: PathBuf,
    ) -> Result<OperationHandle, OpError> {
        self.spawn(OperationType::Copy, move |ctx| {
            copy_items(&sources, &destination, ctx)
        })
    }

    /// Execute a move operation.
    pub fn move_to(
        &self,
        sources: Vec<PathBuf>,
        destination: PathBuf,
    ) -> Result<OperationHandle, OpError> {
        self.spawn(OperationType::Move, move |ctx| {
            move_items(&sources, &destination, ctx)
        })
    }

    /// Move paths to the trash (or delete them when already trashed).
    pub fn delete(&self, targets: Vec<PathBuf>) -> Result<OperationHandle, OpError> {
        self.spawn(OperationType::Delete, move |ctx| delete_items(&targets, ctx))
    }

    /// Restore a trashed item.
    pub fn restore(&self, trashed: PathBuf) -> Result<OperationHandle, OpError> {
        self.spawn(OperationType::Restore, move |ctx| restore_item(&trashed, ctx))
    }

    /// Permanently remove everything in the trash.
    pub fn empty_trash(&self) -> Result<OperationHandle, OpError> {
        self.spawn(OperationType::EmptyTrash, empty_trash)
    }

    /// Create a new directory inside `parent`.
    pub fn create_directory(
        &self,
        parent: PathBuf,
        name: String,
    ) -> Result<OperationHandle, OpError> {
        self.spawn(OperationType::CreateDirectory, move |ctx| {
            create_folder(&parent, &name, ctx)
        })
    }

    /// Rename an entry within its directory.
    pub fn rename(&self, source: PathBuf, new_name: String) -> Result<OperationHandle, OpError> {
        self.spawn(OperationType::Rename, move |ctx| {
            rename_item(&source, &new_name, ctx)
        })
    }

    /// Execute any [`FileOperation`].
    pub fn execute(&self, operation: FileOperation) -> Result<OperationHandle, OpError> {
        match operation {
            FileOperation::Copy {
                sources,
                destination,
            } => self.copy(sources, destination),
            FileOperation::Move {
                sources,
                destination,
            } => self.move_to(sources, destination),
            FileOperation::Delete { targets } => self.delete(targets),
            FileOperation::Restore { trashed } => self.restore(trashed),
            FileOperation::EmptyTrash => self.empty_trash(),
            FileOperation::CreateDirectory { parent, name } => self.create_directory(parent, name),
            FileOperation::Rename { source, new_name } => self.rename(source, new_name),
        }
    }

    fn spawn<F>(&self, operation_type: OperationType, job: F) -> Result<OperationHandle, OpError>
    where
        F: FnOnce(&mut OpContext<'_>) -> OperationComplete + Send + 'static,
    {
        if self
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!(operation = %operation_type, "Rejected, another operation is running");
            return Err(OpError::OperationInProgress);
        }
        let guard = BusyGuard(Arc::clone(&self.busy));

        let (tx, rx) = mpsc::channel(self.config.channel_size);
        let cancel = CancellationToken::new();
        let worker_cancel = cancel.clone();
        let config = self.config.clone();
        let rename = self.rename;

        let join = thread::Builder::new()
            .name(format!("ferryfile-{}", operation_type).to_lowercase().replace(' ', "-"))
            .spawn(move || {
                let mut resolver = ChannelResolver { tx: tx.clone() };
                let mut sink = ChannelProgress { tx: tx.clone() };
                let complete = {
                    let mut ctx = OpContext::new(&config, operation_type, &mut resolver, &mut sink)
                        .with_cancel(worker_cancel);
                    if let Some(rename) = rename {
                        ctx = ctx.with_rename(rename);
                    }
                    job(&mut ctx)
                };
                drop(guard);
                let _ = tx.blocking_send(OperationEvent::Complete(complete));
            })
            .map_err(|e| OpError::Other {
                message: format!("Failed to start worker thread: {e}"),
            })?;

        Ok(OperationHandle {
            events: rx,
            cancel,
            join: Some(join),
        })
    }
}

/// Clears the in-progress flag when the worker is done.
struct BusyGuard(Arc<AtomicBool>);

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Forwards conflicts to the caller and blocks for the answer.
struct ChannelResolver {
    tx: mpsc::Sender<OperationEvent>,
}

impl ConflictResolver for ChannelResolver {
    fn resolve(&mut self, conflict: &Conflict) -> ConflictResolution {
        let (reply, answer) = oneshot::channel();
        let request = ConflictRequest {
            conflict: conflict.clone(),
            reply,
        };
        if self
            .tx
            .blocking_send(OperationEvent::Conflict(request))
            .is_err()
        {
            return ConflictResolution::Cancel;
        }
        answer.blocking_recv().unwrap_or(ConflictResolution::Cancel)
    }
}

/// Sends progress without waiting for the caller.
struct ChannelProgress {
    tx: mpsc::Sender<OperationEvent>,
}

impl ProgressSink for ChannelProgress {
    fn report(&mut self, progress: &OperationProgress) {
        let _ = self.tx.try_send(OperationEvent::Progress(progress.clone()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn sandbox() -> (TempDir, EngineConfig) {
        let temp = TempDir::new().unwrap();
        let root = fs::canonicalize(temp.path()).unwrap();
        let config = EngineConfig::new(root.join("home")).with_trash_dir(root.join("trash"));
        fs::create_dir_all(config.home.join("src")).unwrap();
        fs::create_dir_all(config.home.join("dest")).unwrap();
        (temp, config)
    }

    #[test]
    fn test_copy_runs_in_background() {
        let (_temp, config) = sandbox();
        fs::write(config.home.join("src/a.txt"), "hello").unwrap();

        let executor = OperationExecutor::new(config.clone());
        let handle = executor
            .copy(vec![config.home.join("src/a.txt")], config.home.join("dest"))
            .unwrap();
        let complete = handle.wait().unwrap();

        assert!(complete.is_success());
        assert_eq!(complete.bytes_processed, 5);
        assert!(!executor.is_busy());
        assert_eq!(
            fs::read_to_string(config.home.join("dest/a.txt")).unwrap(),
            "hello"
        );
    }

    #[test]
    fn test_second_operation_is_rejected() {
        let (_temp, config) = sandbox();
        fs::write(config.home.join("src/a.txt"), "a").unwrap();
        fs::write(config.home.join("dest/a.txt"), "b").unwrap();

        let executor = OperationExecutor::new(config.clone());
        let mut handle = executor
            .copy(vec![config.home.join("src/a.txt")], config.home.join("dest"))
            .unwrap();

        // The worker is parked on the conflict until we answer.
        let request = loop {
            match handle.events.blocking_recv() {
                Some(OperationEvent::Conflict(request)) => break request,
                Some(_) => continue,
                None => panic!("worker finished without asking"),
            }
        };
        assert!(executor.is_busy());
        let err = executor.empty_trash().unwrap_err();
        assert!(matches!(err, OpError::OperationInProgress));

        request.respond(ConflictResolution::Skip);
        let complete = handle.wait().unwrap();
        assert_eq!(complete.skipped, 1);
        assert!(!executor.is_busy());
        assert!(executor.empty_trash().unwrap().wait().is_some());
    }

    #[test]
    fn test_dropped_conflict_cancels() {
        let (_temp, config) = sandbox();
        fs::write(config.home.join("src/a.txt"), "a").unwrap();
        fs::write(config.home.join("dest/a.txt"), "b").unwrap();

        let executor = OperationExecutor::new(config.clone());
        let complete = executor
            .copy(vec![config.home.join("src/a.txt")], config.home.join("dest"))
            .unwrap()
            .wait()
            .unwrap();

        assert!(complete.cancelled);
        assert_eq!(complete.message(), "Operation cancelled.");
        assert_eq!(
            fs::read_to_string(config.home.join("dest/a.txt")).unwrap(),
            "b"
        );
    }

    #[tokio::test]
    async fn test_conflict_round_trip() {
        let (_temp, config) = sandbox();
        fs::write(config.home.join("src/x.txt"), "new").unwrap();
        fs::write(config.home.join("dest/x.txt"), "old").unwrap();

        let executor = OperationExecutor::new(config.clone());
        let mut handle = executor
            .execute(FileOperation::copy(
                vec![config.home.join("src/x.txt")],
                config.home.join("dest"),
            ))
            .unwrap();

        let mut conflicts = Vec::new();
        let mut outcome = None;
        while let Some(event) = handle.events.recv().await {
            match event {
                OperationEvent::Progress(_) => {}
                OperationEvent::Conflict(request) => {
                    conflicts.push(request.conflict().clone());
                    request.respond(ConflictResolution::KeepBoth);
                }
                OperationEvent::Complete(complete) => outcome = Some(complete),
            }
        }

        let complete = outcome.unwrap();
        assert!(complete.is_success());
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].destination, config.home.join("dest/x.txt"));
        assert!(!conflicts[0].is_directory);
        assert_eq!(
            fs::read_to_string(config.home.join("dest/x (copy).txt")).unwrap(),
            "new"
        );
    }

    #[test]
    fn test_create_then_rename() {
        let (_temp, config) = sandbox();
        let executor = OperationExecutor::new(config.clone());

        let complete = executor
            .execute(FileOperation::create_directory(
                config.home.join("dest"),
                "Albums",
            ))
            .unwrap()
            .wait()
            .unwrap();
        assert!(complete.is_success());
        assert_eq!(complete.operation_type, OperationType::CreateDirectory);
        assert!(config.home.join("dest/Albums").is_dir());

        let complete = executor
            .execute(FileOperation::rename(
                config.home.join("dest/Albums"),
                "Photos",
            ))
            .unwrap()
            .wait()
            .unwrap();
        assert!(complete.is_success());
        assert!(!config.home.join("dest/Albums").exists());
        assert!(config.home.join("dest/Photos").is_dir());
    }

    #[test]
    fn test_cancel_from_handle() {
        let (_temp, config) = sandbox();
        fs::write(config.home.join("src/a.txt"), "a").unwrap();
        fs::write(config.home.join("dest/a.txt"), "b").unwrap();

        let executor = OperationExecutor::new(config.clone());
        let mut handle = executor
            .move_to(vec![config.home.join("src/a.txt")], config.home.join("dest"))
            .unwrap();

        let request = loop {
            match handle.events.blocking_recv() {
                Some(OperationEvent::Conflict(request)) => break request,
                Some(_) => continue,
                None => panic!("worker finished without asking"),
            }
        };
        handle.cancel();
        request.respond(ConflictResolution::Replace);

        let complete = handle.wait().unwrap();
        // Replace was granted, but nothing after the cancel point runs.
        assert!(complete.cancelled);
        assert!(config.home.join("src/a.txt").exists());
    }
}
