//! Progress reporting types for file operations.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::OperationError;

/// The type of operation being performed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperationType {
    Copy,
    Move,
    Delete,
    Restore,
    EmptyTrash,
    CreateDirectory,
    Rename,
}

impl std::fmt::Display for OperationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Copy => write!(f, "Copy"),
            Self::Move => write!(f, "Move"),
            Self::Delete => write!(f, "Delete"),
            Self::Restore => write!(f, "Restore"),
            Self::EmptyTrash => write!(f, "Empty trash"),
            Self::CreateDirectory => write!(f, "New folder"),
            Self::Rename => write!(f, "Rename"),
        }
    }
}

/// Progress information for an ongoing operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationProgress {
    /// The type of operation.
    pub operation_type: OperationType,
    /// Number of top-level sources completed.
    pub files_completed: usize,
    /// Total number of top-level sources.
    pub files_total: usize,
    /// Number of bytes processed so far.
    pub bytes_processed: u64,
    /// Total bytes to process, `None` until the pre-scan finished.
    pub bytes_total: Option<u64>,
    /// The file currently being processed.
    pub current_file: Option<PathBuf>,
}

impl OperationProgress {
    /// Create an indeterminate progress record.
    pub fn new(operation_type: OperationType) -> Self {
        Self {
            operation_type,
            files_completed: 0,
            files_total: 0,
            bytes_processed: 0,
            bytes_total: None,
            current_file: None,
        }
    }

    /// Check whether the total is still unknown.
    pub fn is_indeterminate(&self) -> bool {
        self.bytes_total.is_none()
    }

    /// Get the progress as a percentage (0.0 to 100.0).
    pub fn percentage(&self) -> f64 {
        match self.bytes_total {
            None => 0.0,
            Some(0) => 100.0,
            Some(total) => ((self.bytes_processed as f64 / total as f64) * 100.0).min(100.0),
        }
    }

    /// Whole-number percentage, `None` while indeterminate.
    pub fn whole_percent(&self) -> Option<u32> {
        self.bytes_total.map(|total| match total {
            0 => 100,
            total => {
                let percent = u128::from(self.bytes_processed) * 100 / u128::from(total);
                percent.min(100) as u32
            }
        })
    }
}

/// Result of a completed operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationComplete {
    /// The type of operation.
    pub operation_type: OperationType,
    /// Number of sources successfully processed.
    pub succeeded: usize,
    /// Number of sources that failed.
    pub failed: usize,
    /// Number of nodes skipped by conflict resolution.
    pub skipped: usize,
    /// Total bytes processed.
    pub bytes_processed: u64,
    /// Errors that occurred.
    pub errors: Vec<OperationError>,
    /// Whether the operation stopped because it was cancelled.
    pub cancelled: bool,
    /// Trashed items whose metadata could not be written.
    pub non_restorable: Vec<PathBuf>,
}

impl OperationComplete {
    /// Create an empty outcome.
    pub fn new(operation_type: OperationType) -> Self {
        Self {
            operation_type,
            succeeded: 0,
            failed: 0,
            skipped: 0,
            bytes_processed: 0,
            errors: Vec::new(),
            cancelled: false,
            non_restorable: Vec::new(),
        }
    }

    /// Record a failed source.
    pub fn record_error(&mut self, error: OperationError) {
        self.failed += 1;
        self.errors.push(error);
    }

    /// Check if the operation was fully successful.
    pub fn is_success(&self) -> bool {
        self.failed == 0 && !self.cancelled
    }

    /// All error messages, separated by blank lines, followed by the
    /// cancellation notice if the operation was cancelled.
    pub fn message(&self) -> String {
        let mut parts: Vec<&str> = self.errors.iter().map(|e| e.message.as_str()).collect();
        if self.cancelled {
            parts.push("Operation cancelled.");
        }
        parts.join("\n\n")
    }

    /// Get a human-readable summary of the operation.
    pub fn summary(&self) -> String {
        let action = match self.operation_type {
            OperationType::Copy => "Copied",
            OperationType::Move => "Moved",
            OperationType::Delete => "Trashed",
            OperationType::Restore => "Restored",
            OperationType::EmptyTrash => "Emptied",
            OperationType::CreateDirectory => "Created",
            OperationType::Rename => "Renamed",
        };

        let mut summary = format!("{} {} items", action, self.succeeded);
        if self.skipped > 0 {
            summary.push_str(&format!(", {} skipped", self.skipped));
        }
        if self.failed > 0 {
            summary.push_str(&format!(", {} failed", self.failed));
        }
        if self.cancelled {
            summary.push_str(" (cancelled)");
        }
        summary
    }
}

/// Receiver of progress snapshots.
pub trait ProgressSink {
    /// Deliver one snapshot.
    fn report(&mut self, progress: &OperationProgress);
}

impl<F> ProgressSink for F
where
    F: FnMut(&OperationProgress),
{
    fn report(&mut self, progress: &OperationProgress) {
        self(progress)
    }
}

/// A sink that discards every snapshot.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn report(&mut self, _progress: &OperationProgress) {}
}

/// Owns the progress of one operation and throttles what reaches the sink.
///
/// A snapshot is forwarded when the whole percentage changed or when the
/// throttle interval elapsed since the last one.
pub struct ProgressTracker<'a> {
    progress: OperationProgress,
    sink: &'a mut dyn ProgressSink,
    interval: Duration,
    last_emit: Option<Instant>,
    last_percent: Option<u32>,
}

impl<'a> ProgressTracker<'a> {
    /// Create a tracker for an operation.
    pub fn new(
        operation_type: OperationType,
        interval: Duration,
        sink: &'a mut dyn ProgressSink,
    ) -> Self {
        Self {
            progress: OperationProgress::new(operation_type),
            sink,
            interval,
            last_emit: None,
            last_percent: None,
        }
    }

    /// Emit the initial indeterminate snapshot.
    pub fn start(&mut self) {
        self.emit();
    }

    /// Fix the byte total and number of sources.
    pub fn set_total(&mut self, bytes_total: u64, files_total: usize) {
        self.progress.bytes_total = Some(bytes_total);
        self.progress.files_total = files_total;
        self.maybe_emit();
    }

    /// Update the file currently being processed.
    pub fn set_current_file(&mut self, path: Option<PathBuf>) {
        self.progress.current_file = path;
    }

    /// Credit processed bytes.
    pub fn advance(&mut self, bytes: u64) {
        if bytes == 0 {
            return;
        }
        self.progress.bytes_processed = self.progress.bytes_processed.saturating_add(bytes);
        self.maybe_emit();
    }

    /// Count one finished top-level source.
    pub fn complete_file(&mut self) {
        self.progress.files_completed += 1;
    }

    /// Emit the final state unconditionally.
    pub fn finish(&mut self) {
        self.progress.current_file = None;
        self.emit();
    }

    /// Bytes processed so far.
    pub fn bytes_processed(&self) -> u64 {
        self.progress.bytes_processed
    }

    fn maybe_emit(&mut self) {
        let Some(percent) = self.progress.whole_percent() else {
            return;
        };
        let interval_elapsed = self
            .last_emit
            .is_none_or(|last| last.elapsed() >= self.interval);
        if self.last_percent != Some(percent) || interval_elapsed {
            self.emit();
        }
    }

    fn emit(&mut self) {
        self.last_emit = Some(Instant::now());
        self.last_percent = self.progress.whole_percent();
        self.sink.report(&self.progress);
    }
}

impl std::fmt::Debug for ProgressTracker<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressTracker")
            .field("progress", &self.progress)
            .field("interval", &self.interval)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ferryfile_core::ErrorKind;

    #[test]
    fn test_percentage_bounds() {
        let mut progress = OperationProgress::new(OperationType::Copy);
        assert!(progress.is_indeterminate());
        assert_eq!(progress.whole_percent(), None);

        progress.bytes_total = Some(0);
        assert_eq!(progress.percentage(), 100.0);

        progress.bytes_total = Some(200);
        progress.bytes_processed = 50;
        assert_eq!(progress.whole_percent(), Some(25));

        progress.bytes_processed = 500;
        assert_eq!(progress.percentage(), 100.0);
    }

    #[test]
    fn test_tracker_throttles_by_percentage() {
        let mut snapshots: Vec<OperationProgress> = Vec::new();
        let mut sink = |p: &OperationProgress| snapshots.push(p.clone());
        {
            let mut tracker =
                ProgressTracker::new(OperationType::Copy, Duration::from_secs(3600), &mut sink);
            tracker.start();
            tracker.set_total(1000, 1);
            for _ in 0..1000 {
                tracker.advance(1);
            }
            tracker.finish();
        }

        // start, set_total at 0%, one per whole percent, finish
        assert_eq!(snapshots.len(), 1 + 1 + 100 + 1);
        assert!(snapshots[0].is_indeterminate());
        assert_eq!(snapshots.last().unwrap().bytes_processed, 1000);

        let processed: Vec<u64> = snapshots.iter().map(|p| p.bytes_processed).collect();
        assert!(processed.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_tracker_silent_while_indeterminate() {
        let mut count = 0usize;
        let mut sink = |_: &OperationProgress| count += 1;
        {
            let mut tracker =
                ProgressTracker::new(OperationType::Move, Duration::from_millis(0), &mut sink);
            tracker.start();
            tracker.advance(10);
            tracker.advance(10);
        }
        assert_eq!(count, 1);
    }

    #[test]
    fn test_complete_message() {
        let mut complete = OperationComplete::new(OperationType::Copy);
        complete.record_error(OperationError::new(
            PathBuf::from("/a"),
            ErrorKind::PathNotFound,
            "Missing source: /a",
        ));
        complete.record_error(OperationError::new(
            PathBuf::from("/b"),
            ErrorKind::PermissionDenied,
            "Permission denied: /b",
        ));
        complete.cancelled = true;

        assert_eq!(
            complete.message(),
            "Missing source: /a\n\nPermission denied: /b\n\nOperation cancelled."
        );
        assert!(!complete.is_success());
        assert_eq!(complete.summary(), "Copied 0 items, 2 failed (cancelled)");
    }

    #[test]
    fn test_complete_success_summary() {
        let mut complete = OperationComplete::new(OperationType::Move);
        complete.succeeded = 3;
        complete.skipped = 1;
        assert!(complete.is_success());
        assert!(complete.message().is_empty());
        assert_eq!(complete.summary(), "Moved 3 items, 1 skipped");
    }
}
