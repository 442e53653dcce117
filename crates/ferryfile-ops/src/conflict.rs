//! Conflict detection and resolution for file operations.

use std::path::{Path, PathBuf};

use ferryfile_core::entry_exists;
use serde::{Deserialize, Serialize};

/// A conflict detected during a file operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conflict {
    /// The source path being operated on.
    pub source: PathBuf,
    /// The destination path that already exists.
    pub destination: PathBuf,
    /// Whether the source is a directory.
    pub is_directory: bool,
}

impl Conflict {
    /// Create a new conflict.
    pub fn new(source: PathBuf, destination: PathBuf, is_directory: bool) -> Self {
        Self {
            source,
            destination,
            is_directory,
        }
    }
}

/// How to resolve a conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConflictResolution {
    /// Remove the existing item and put the new one in its place.
    Replace,
    /// Leave the existing item alone and do not copy this one.
    Skip,
    /// Keep both by giving the new item a unique name.
    KeepBoth,
    /// Abort the entire operation.
    Cancel,
}

impl std::fmt::Display for ConflictResolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Replace => write!(f, "Replace"),
            Self::Skip => write!(f, "Skip"),
            Self::KeepBoth => write!(f, "Keep both"),
            Self::Cancel => write!(f, "Cancel"),
        }
    }
}

/// Decides what to do when a destination already exists.
///
/// Called once per colliding node, including collisions found deep inside
/// a directory copy. The worker blocks until a decision is returned.
pub trait ConflictResolver {
    fn resolve(&mut self, conflict: &Conflict) -> ConflictResolution;
}

impl<F> ConflictResolver for F
where
    F: FnMut(&Conflict) -> ConflictResolution,
{
    fn resolve(&mut self, conflict: &Conflict) -> ConflictResolution {
        self(conflict)
    }
}

/// Answers every conflict with the same resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedResolution(pub ConflictResolution);

impl ConflictResolver for FixedResolution {
    fn resolve(&mut self, _conflict: &Conflict) -> ConflictResolution {
        self.0
    }
}

/// Generate a path next to `destination` that does not exist yet.
///
/// For "report.txt", tries "report (copy).txt", "report (copy 2).txt", ...
/// up to `max_probes`, then falls back to a millisecond timestamp.
pub fn unique_path(destination: &Path, is_directory: bool, max_probes: u32) -> PathBuf {
    unique_path_with(destination, is_directory, max_probes, entry_exists)
}

/// Like [`unique_path`], with a caller-supplied occupancy check.
pub fn unique_path_with(
    destination: &Path,
    is_directory: bool,
    max_probes: u32,
    mut is_taken: impl FnMut(&Path) -> bool,
) -> PathBuf {
    let parent = destination.parent().unwrap_or(Path::new(""));
    let name = destination
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let (base, suffix) = split_name(&name, is_directory);

    for n in 1..=max_probes {
        let candidate = if n == 1 {
            parent.join(format!("{base} (copy){suffix}"))
        } else {
            parent.join(format!("{base} (copy {n}){suffix}"))
        };
        if !is_taken(&candidate) {
            return candidate;
        }
    }

    let millis = chrono::Utc::now().timestamp_millis();
    parent.join(format!("{base} ({millis}){suffix}"))
}

/// Split a name into base and suffix.
///
/// Directories keep their whole name. For files the suffix starts at the
/// first dot that is not the leading character, so "a.tar.gz" splits into
/// "a" and ".tar.gz" while ".bashrc" has no suffix.
fn split_name(name: &str, is_directory: bool) -> (&str, &str) {
    if is_directory {
        return (name, "");
    }
    match name.char_indices().skip(1).find(|&(_, c)| c == '.') {
        Some((index, _)) => name.split_at(index),
        None => (name, ""),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_split_name() {
        assert_eq!(split_name("report.txt", false), ("report", ".txt"));
        assert_eq!(split_name("archive.tar.gz", false), ("archive", ".tar.gz"));
        assert_eq!(split_name(".bashrc", false), (".bashrc", ""));
        assert_eq!(split_name(".config.json", false), (".config", ".json"));
        assert_eq!(split_name("Makefile", false), ("Makefile", ""));
        assert_eq!(split_name("photos.2024", true), ("photos.2024", ""));
    }

    #[test]
    fn test_unique_path_first_candidate() {
        let temp = TempDir::new().unwrap();
        let dest = temp.path().join("x.txt");
        fs::write(&dest, "a").unwrap();

        assert_eq!(
            unique_path(&dest, false, 10_000),
            temp.path().join("x (copy).txt")
        );
    }

    #[test]
    fn test_unique_path_skips_taken_names() {
        let temp = TempDir::new().unwrap();
        let dest = temp.path().join("x.txt");
        fs::write(&dest, "a").unwrap();
        fs::write(temp.path().join("x (copy).txt"), "b").unwrap();
        fs::write(temp.path().join("x (copy 2).txt"), "c").unwrap();

        assert_eq!(
            unique_path(&dest, false, 10_000),
            temp.path().join("x (copy 3).txt")
        );
    }

    #[test]
    fn test_unique_path_directory_keeps_dots() {
        let temp = TempDir::new().unwrap();
        let dest = temp.path().join("v1.2");
        fs::create_dir(&dest).unwrap();

        assert_eq!(unique_path(&dest, true, 10_000), temp.path().join("v1.2 (copy)"));
    }

    #[test]
    fn test_unique_path_timestamp_fallback() {
        let dest = Path::new("/virtual/x.txt");
        let candidate = unique_path_with(dest, false, 3, |_| true);
        let name = candidate.file_name().unwrap().to_string_lossy().into_owned();

        assert!(name.starts_with("x ("));
        assert!(name.ends_with(").txt"));
        assert!(!name.contains("copy"));
    }

    #[test]
    fn test_unique_path_with_custom_check() {
        let taken: HashSet<PathBuf> = [PathBuf::from("/t/files/a (copy)")].into_iter().collect();
        let candidate = unique_path_with(Path::new("/t/files/a"), false, 10, |p| taken.contains(p));
        assert_eq!(candidate, PathBuf::from("/t/files/a (copy 2)"));
    }

    #[cfg(unix)]
    #[test]
    fn test_dangling_symlink_counts_as_taken() {
        let temp = TempDir::new().unwrap();
        let dest = temp.path().join("x.txt");
        fs::write(&dest, "a").unwrap();
        std::os::unix::fs::symlink(temp.path().join("nowhere"), temp.path().join("x (copy).txt"))
            .unwrap();

        assert_eq!(
            unique_path(&dest, false, 10_000),
            temp.path().join("x (copy 2).txt")
        );
    }

    #[test]
    fn test_closure_resolver() {
        let mut calls = 0;
        let mut resolver = |_: &Conflict| {
            calls += 1;
            ConflictResolution::Skip
        };
        let conflict = Conflict::new(PathBuf::from("/a"), PathBuf::from("/b"), false);
        assert_eq!(resolver.resolve(&conflict), ConflictResolution::Skip);
        assert_eq!(calls, 1);
        assert_eq!(
            FixedResolution(ConflictResolution::KeepBoth).resolve(&conflict),
            ConflictResolution::KeepBoth
        );
    }
}
