//! Move with a rename fast path and a copy-then-delete fallback.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use ferryfile_core::{EntryKind, OpError, entry_exists, is_within};
use tracing::{debug, warn};

use crate::context::OpContext;
use crate::copy::copy_tree;
use crate::size::total_bytes;

/// Result of moving one source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveReport {
    /// Where the source ended up.
    pub destination: PathBuf,
    /// Number of nodes skipped by conflict resolution.
    pub skipped: usize,
    /// Whether the source itself was skipped.
    pub root_skipped: bool,
    /// Whether the source is still in place after the move.
    pub source_kept: bool,
}

/// Move `source` to `destination` (the full target path).
///
/// A plain rename is tried when nothing exists at `destination`. Otherwise,
/// or when the rename fails (e.g. across devices), the tree is copied and
/// the source deleted afterwards. `expected_bytes` is the pre-scanned size
/// of `source`; the copy must match it before the source is removed.
pub fn move_entry(
    source: &Path,
    destination: &Path,
    expected_bytes: u64,
    ctx: &mut OpContext<'_>,
) -> Result<MoveReport, OpError> {
    ctx.check_cancelled()?;

    if source == destination {
        debug!(path = %source.display(), "Source and destination are identical");
        ctx.progress.advance(expected_bytes);
        return Ok(MoveReport {
            destination: destination.to_path_buf(),
            skipped: 0,
            root_skipped: false,
            source_kept: true,
        });
    }

    let kind = EntryKind::probe(source)?;
    if kind.is_dir() && is_within(destination, source) {
        return Err(OpError::invalid_path(
            destination,
            "cannot move a directory into itself",
        ));
    }

    if !entry_exists(destination) {
        ctx.progress.set_current_file(Some(source.to_path_buf()));
        match (ctx.rename)(source, destination) {
            Ok(()) => {
                debug!(
                    from = %source.display(),
                    to = %destination.display(),
                    "Moved by rename"
                );
                ctx.progress.advance(expected_bytes);
                return Ok(MoveReport {
                    destination: destination.to_path_buf(),
                    skipped: 0,
                    root_skipped: false,
                    source_kept: false,
                });
            }
            Err(e) => {
                debug!(
                    from = %source.display(),
                    error = %e,
                    "Rename failed, falling back to copy and delete"
                );
            }
        }
    }

    let report = copy_tree(source, destination, ctx)?;
    if report.skipped > 0 {
        if !report.root_skipped {
            warn!(
                path = %source.display(),
                skipped = report.skipped,
                "Parts of the move were skipped, keeping the source"
            );
        }
        return Ok(MoveReport {
            destination: report.destination,
            skipped: report.skipped,
            root_skipped: report.root_skipped,
            source_kept: true,
        });
    }

    let actual = total_bytes(&report.destination)?;
    if actual != expected_bytes {
        return Err(OpError::SizeMismatch {
            path: report.destination,
            expected: expected_bytes,
            actual,
        });
    }

    remove_source(source).map_err(|e| OpError::SourceNotRemoved {
        path: source.to_path_buf(),
        source: e,
    })?;

    Ok(MoveReport {
        destination: report.destination,
        skipped: 0,
        root_skipped: false,
        source_kept: false,
    })
}

fn remove_source(path: &Path) -> io::Result<()> {
    if fs::symlink_metadata(path)?.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conflict::{ConflictResolution, FixedResolution};
    use crate::progress::{NoProgress, OperationType};
    use ferryfile_core::EngineConfig;
    use tempfile::TempDir;

    fn cross_device(_from: &Path, _to: &Path) -> io::Result<()> {
        Err(io::Error::new(
            io::ErrorKind::CrossesDevices,
            "simulated cross-device rename",
        ))
    }

    fn run_move(
        source: &Path,
        destination: &Path,
        resolution: ConflictResolution,
        force_copy: bool,
    ) -> Result<MoveReport, OpError> {
        let config = EngineConfig::new("/nonexistent-home");
        let mut resolver = FixedResolution(resolution);
        let mut sink = NoProgress;
        let mut ctx = OpContext::new(&config, OperationType::Move, &mut resolver, &mut sink);
        if force_copy {
            ctx = ctx.with_rename(cross_device);
        }
        let expected = total_bytes(source)?;
        move_entry(source, destination, expected, &mut ctx)
    }

    fn sample_dir(root: &Path) -> PathBuf {
        let dir = root.join("album");
        fs::create_dir_all(dir.join("disc1")).unwrap();
        fs::write(dir.join("cover.jpg"), vec![1u8; 300]).unwrap();
        fs::write(dir.join("disc1/track.flac"), vec![2u8; 900]).unwrap();
        dir
    }

    #[test]
    fn test_move_by_rename() {
        let temp = TempDir::new().unwrap();
        let src = sample_dir(temp.path());
        let dest = temp.path().join("moved");

        let report = run_move(&src, &dest, ConflictResolution::Cancel, false).unwrap();
        assert!(!report.source_kept);
        assert!(!src.exists());
        assert_eq!(total_bytes(&dest).unwrap(), 1200);
    }

    #[test]
    fn test_move_cross_device_fallback() {
        let temp = TempDir::new().unwrap();
        let src = sample_dir(temp.path());
        let dest = temp.path().join("moved");

        let report = run_move(&src, &dest, ConflictResolution::Cancel, true).unwrap();
        assert!(!report.source_kept);
        assert!(!src.exists());
        assert_eq!(
            fs::read(dest.join("disc1/track.flac")).unwrap(),
            vec![2u8; 900]
        );
    }

    #[test]
    fn test_size_mismatch_keeps_source() {
        let temp = TempDir::new().unwrap();
        let src = sample_dir(temp.path());
        let dest = temp.path().join("moved");

        let config = EngineConfig::new("/nonexistent-home");
        let mut resolver = FixedResolution(ConflictResolution::Cancel);
        let mut sink = NoProgress;
        let result = {
            let mut ctx = OpContext::new(&config, OperationType::Move, &mut resolver, &mut sink)
                .with_rename(cross_device);
            move_entry(&src, &dest, 1201, &mut ctx)
        };

        match result.unwrap_err() {
            OpError::SizeMismatch {
                expected, actual, ..
            } => {
                assert_eq!(expected, 1201);
                assert_eq!(actual, 1200);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(src.join("disc1/track.flac").exists());
        assert_eq!(total_bytes(&dest).unwrap(), 1200);
    }

    #[test]
    fn test_move_same_path_is_noop() {
        let temp = TempDir::new().unwrap();
        let src = sample_dir(temp.path());

        let report = run_move(&src, &src, ConflictResolution::Cancel, false).unwrap();
        assert!(report.source_kept);
        assert!(src.join("cover.jpg").exists());
    }

    #[test]
    fn test_move_onto_existing_keep_both() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("x.txt");
        fs::write(&src, "incoming").unwrap();
        let dest_dir = temp.path().join("dest");
        fs::create_dir(&dest_dir).unwrap();
        fs::write(dest_dir.join("x.txt"), "resident").unwrap();

        let report = run_move(
            &src,
            &dest_dir.join("x.txt"),
            ConflictResolution::KeepBoth,
            false,
        )
        .unwrap();

        assert_eq!(report.destination, dest_dir.join("x (copy).txt"));
        assert!(!src.exists());
        assert_eq!(
            fs::read_to_string(dest_dir.join("x.txt")).unwrap(),
            "resident"
        );
        assert_eq!(
            fs::read_to_string(dest_dir.join("x (copy).txt")).unwrap(),
            "incoming"
        );
    }

    #[test]
    fn test_skip_keeps_source() {
        let temp = TempDir::new().unwrap();
        let src = sample_dir(temp.path());
        let dest = temp.path().join("dest");
        fs::create_dir_all(dest.join("disc1")).unwrap();
        fs::write(dest.join("disc1/track.flac"), "older").unwrap();

        let report = run_move(&src, &dest, ConflictResolution::Skip, true).unwrap();
        assert!(report.root_skipped);
        assert!(report.source_kept);
        assert!(src.join("disc1/track.flac").exists());
        assert_eq!(
            fs::read_to_string(dest.join("disc1/track.flac")).unwrap(),
            "older"
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_move_keeps_symlink_as_link() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("link");
        std::os::unix::fs::symlink("/definitely/not/here", &src).unwrap();
        let dest = temp.path().join("moved-link");

        run_move(&src, &dest, ConflictResolution::Cancel, true).unwrap();
        assert!(fs::symlink_metadata(&src).is_err());
        assert_eq!(
            fs::read_link(&dest).unwrap(),
            PathBuf::from("/definitely/not/here")
        );
    }
}
