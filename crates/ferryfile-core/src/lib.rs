//! Core types for ferryfile.
//!
//! This crate provides the pieces shared by the engine and its callers:
//! the error taxonomy, engine configuration, path normalization and the
//! permission checks that run before any mutation.

mod config;
mod entry;
mod error;
pub mod path;
pub mod permission;

pub use config::{
    DEFAULT_CHANNEL_SIZE, DEFAULT_CHUNK_SIZE, DEFAULT_MAX_COPY_PROBES,
    DEFAULT_PROGRESS_INTERVAL_MS, EngineConfig, EngineConfigBuilder,
};
pub use entry::{EntryKind, entry_exists};
pub use error::{ErrorKind, OpError};
pub use path::{is_within, nearest_existing_ancestor, normalize, normalize_entry};
pub use permission::{ensure_readable_source, ensure_writable_target};
