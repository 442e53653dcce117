//! Trash area with restore metadata.
//!
//! Items live in `<root>/files/<name>` and each one has a matching
//! `<root>/info/<name>.trashinfo` record holding the original location and
//! the deletion time.

use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{NaiveDateTime, Timelike};
use ferryfile_core::{
    EngineConfig, EntryKind, OpError, ensure_writable_target, entry_exists, normalize,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::conflict::{unique_path, unique_path_with};
use crate::context::OpContext;
use crate::copy::remove_entry;
use crate::move_op::move_entry;

const INFO_HEADER: &str = "[Trash Info]";
const INFO_EXTENSION: &str = ".trashinfo";
const DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Contents of a `.trashinfo` record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrashInfo {
    /// Absolute path the item was trashed from.
    pub original_path: PathBuf,
    /// When the item was trashed (UTC), if recorded.
    pub deletion_date: Option<NaiveDateTime>,
}

impl TrashInfo {
    /// Create a record for an item trashed now.
    pub fn now(original_path: impl Into<PathBuf>) -> Self {
        Self {
            original_path: original_path.into(),
            deletion_date: chrono::Utc::now().naive_utc().with_nanosecond(0),
        }
    }

    /// Parse a record. Returns `None` without a header or `Path=` line.
    ///
    /// The path is decoded to raw bytes, so names that are not valid UTF-8
    /// survive the round trip.
    pub fn parse(contents: &str) -> Option<Self> {
        let mut lines = contents.lines().map(str::trim).filter(|l| !l.is_empty());
        if lines.next()? != INFO_HEADER {
            return None;
        }

        let mut original_path = None;
        let mut deletion_date = None;
        for line in lines {
            if let Some(encoded) = line.strip_prefix("Path=") {
                if original_path.is_none() {
                    original_path = Some(path_from_bytes(
                        urlencoding::decode_binary(encoded.as_bytes()).into_owned(),
                    ));
                }
            } else if let Some(value) = line.strip_prefix("DeletionDate=") {
                if deletion_date.is_none() {
                    deletion_date = NaiveDateTime::parse_from_str(value, DATE_FORMAT).ok();
                }
            }
        }

        Some(Self {
            original_path: original_path?,
            deletion_date,
        })
    }

    /// Render the record. Path segments are percent-encoded, separators
    /// are kept.
    pub fn render(&self) -> String {
        let raw = path_bytes(&self.original_path);
        let encoded: Vec<_> = raw
            .split(|&b| b == b'/')
            .map(urlencoding::encode_binary)
            .collect();
        let mut out = format!("{INFO_HEADER}\nPath={}\n", encoded.join("/"));
        if let Some(date) = self.deletion_date {
            out.push_str(&format!("DeletionDate={}\n", date.format(DATE_FORMAT)));
        }
        out
    }
}

#[cfg(unix)]
fn path_bytes(path: &Path) -> Vec<u8> {
    use std::os::unix::ffi::OsStrExt;
    path.as_os_str().as_bytes().to_vec()
}

#[cfg(not(unix))]
fn path_bytes(path: &Path) -> Vec<u8> {
    path.to_string_lossy().into_owned().into_bytes()
}

#[cfg(unix)]
fn path_from_bytes(bytes: Vec<u8>) -> PathBuf {
    use std::os::unix::ffi::OsStringExt;
    PathBuf::from(std::ffi::OsString::from_vec(bytes))
}

#[cfg(not(unix))]
fn path_from_bytes(bytes: Vec<u8>) -> PathBuf {
    PathBuf::from(String::from_utf8_lossy(&bytes).into_owned())
}

/// Result of trashing one path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrashOutcome {
    /// Where the item now lives inside the files area.
    pub trashed_path: PathBuf,
    /// Location of its metadata record.
    pub info_path: PathBuf,
    /// False when the metadata record could not be written.
    pub restorable: bool,
}

/// One entry of the files area.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrashItem {
    /// Name inside the files area.
    pub name: String,
    /// Full path inside the files area.
    pub trashed_path: PathBuf,
    /// Parsed metadata, `None` when missing or unreadable.
    pub info: Option<TrashInfo>,
}

/// A trash rooted at [`EngineConfig::trash_root`].
#[derive(Debug, Clone)]
pub struct Trash {
    files_dir: PathBuf,
    info_dir: PathBuf,
    max_probes: u32,
}

impl Trash {
    /// Create a handle; nothing is created on disk until first use.
    ///
    /// Both areas are normalized like any other input path, so a home
    /// reached through a symlink still matches normalized sources.
    pub fn new(config: &EngineConfig) -> Result<Self, OpError> {
        Ok(Self {
            files_dir: normalize(config.trash_files_dir(), &config.home)?,
            info_dir: normalize(config.trash_info_dir(), &config.home)?,
            max_probes: config.max_copy_probes,
        })
    }

    /// Directory holding trashed items.
    pub fn files_dir(&self) -> &Path {
        &self.files_dir
    }

    /// Directory holding metadata records.
    pub fn info_dir(&self) -> &Path {
        &self.info_dir
    }

    /// Check whether `path` lies inside the files area.
    pub fn contains(&self, path: &Path) -> bool {
        path != self.files_dir && path.starts_with(&self.files_dir)
    }

    /// Check whether `path` is an item directly inside the files area.
    pub fn is_item(&self, path: &Path) -> bool {
        path.parent() == Some(self.files_dir.as_path())
    }

    fn info_path_for(&self, name: &OsStr) -> PathBuf {
        let mut file_name = name.to_os_string();
        file_name.push(INFO_EXTENSION);
        self.info_dir.join(file_name)
    }

    fn ensure_dirs(&self) -> Result<(), OpError> {
        for dir in [&self.files_dir, &self.info_dir] {
            fs::create_dir_all(dir).map_err(|e| OpError::io(dir, e))?;
        }
        Ok(())
    }

    /// Move `path` into the trash and record where it came from.
    ///
    /// `expected_bytes` is the pre-scanned size of `path`.
    pub fn trash(
        &self,
        path: &Path,
        expected_bytes: u64,
        ctx: &mut OpContext<'_>,
    ) -> Result<TrashOutcome, OpError> {
        let name = path
            .file_name()
            .ok_or_else(|| OpError::invalid_path(path, "cannot trash a root directory"))?;
        let is_dir = EntryKind::probe(path)?.is_dir();
        self.ensure_dirs()?;

        let candidate = self.files_dir.join(name);
        let trashed_path = if self.is_taken(&candidate) {
            let taken_is_dir = EntryKind::probe(&candidate).map_or(is_dir, |k| k.is_dir());
            unique_path_with(&candidate, taken_is_dir, self.max_probes, |p| {
                self.is_taken(p)
            })
        } else {
            candidate
        };

        move_entry(path, &trashed_path, expected_bytes, ctx)?;

        let info_path = self.info_path_for(trashed_path.file_name().unwrap_or(name));
        let restorable = match fs::write(&info_path, TrashInfo::now(path).render()) {
            Ok(()) => true,
            Err(e) => {
                warn!(
                    path = %trashed_path.display(),
                    error = %e,
                    "Trashed item has no metadata and cannot be restored"
                );
                false
            }
        };

        debug!(from = %path.display(), to = %trashed_path.display(), "Trashed");
        Ok(TrashOutcome {
            trashed_path,
            info_path,
            restorable,
        })
    }

    fn is_taken(&self, candidate: &Path) -> bool {
        entry_exists(candidate)
            || candidate
                .file_name()
                .is_some_and(|name| entry_exists(&self.info_path_for(name)))
    }

    /// Read the metadata record of a trashed item.
    pub fn info(&self, trashed_path: &Path) -> Result<TrashInfo, OpError> {
        let missing = || OpError::MetadataMissing {
            path: trashed_path.to_path_buf(),
        };
        let name = trashed_path.file_name().ok_or_else(missing)?;
        let contents = fs::read_to_string(self.info_path_for(name)).map_err(|_| missing())?;
        TrashInfo::parse(&contents).ok_or_else(missing)
    }

    /// Move a trashed item back to its original location.
    ///
    /// An occupied original location gets a unique "(copy)" name. Missing
    /// parent directories are recreated. Returns the restored path.
    pub fn restore(
        &self,
        trashed_path: &Path,
        expected_bytes: u64,
        ctx: &mut OpContext<'_>,
    ) -> Result<PathBuf, OpError> {
        if !self.is_item(trashed_path) {
            return Err(OpError::NotTrashItem {
                path: trashed_path.to_path_buf(),
            });
        }
        EntryKind::probe(trashed_path)?;
        let info = self.info(trashed_path)?;

        let original = info.original_path;
        let target = if entry_exists(&original) {
            let occupant = EntryKind::probe(&original)?;
            unique_path(&original, occupant.is_dir(), self.max_probes)
        } else {
            original
        };

        ensure_writable_target(&target)?;
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(|e| OpError::io(parent, e))?;
        }

        move_entry(trashed_path, &target, expected_bytes, ctx)?;

        if let Some(name) = trashed_path.file_name() {
            let info_path = self.info_path_for(name);
            if let Err(e) = fs::remove_file(&info_path) {
                warn!(path = %info_path.display(), error = %e, "Could not remove trash metadata");
            }
        }

        debug!(from = %trashed_path.display(), to = %target.display(), "Restored");
        Ok(target)
    }

    /// Remove `path` for good, together with its metadata when it is a
    /// trash item.
    pub fn delete_permanently(&self, path: &Path) -> Result<(), OpError> {
        remove_entry(path)?;
        if self.is_item(path) {
            if let Some(name) = path.file_name() {
                let info_path = self.info_path_for(name);
                match fs::remove_file(&info_path) {
                    Ok(()) => {}
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                    Err(e) => return Err(OpError::io(info_path, e)),
                }
            }
        }
        Ok(())
    }

    /// Remove every item and record, leaving both areas empty.
    pub fn empty(&self) -> Result<(), OpError> {
        for dir in [&self.files_dir, &self.info_dir] {
            match fs::remove_dir_all(dir) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(OpError::io(dir, e)),
            }
        }
        self.ensure_dirs()
    }

    /// Items in the files area with their metadata, sorted by name.
    pub fn list(&self) -> Result<Vec<TrashItem>, OpError> {
        let entries = match fs::read_dir(&self.files_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(OpError::io(&self.files_dir, e)),
        };

        let mut items = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| OpError::io(&self.files_dir, e))?;
            let trashed_path = entry.path();
            items.push(TrashItem {
                name: entry.file_name().to_string_lossy().into_owned(),
                info: self.info(&trashed_path).ok(),
                trashed_path,
            });
        }
        items.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(items)
    }
}
