//! ferry - copy, move and trash files with conflict prompts and progress.
//!
//! Usage:
//!   ferry copy SRC... DEST       Copy sources into a directory
//!   ferry move SRC... DEST       Move sources into a directory
//!   ferry delete PATH...         Move paths to the trash
//!   ferry restore TRASHED        Restore a trashed item
//!   ferry empty-trash            Permanently empty the trash
//!   ferry list-trash             Show what is in the trash
//!   ferry new-folder DIR NAME    Create a directory
//!   ferry rename PATH NAME       Rename in place
//!   ferry --help                 Show help

use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use color_eyre::eyre::{Context, Result, bail};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use ferryfile_core::EngineConfig;
use ferryfile_ops::{
    Conflict, ConflictResolution, FileOperation, OperationComplete, OperationEvent,
    OperationExecutor, OperationProgress, Trash,
};

#[derive(Parser)]
#[command(
    name = "ferry",
    version,
    about = "Copy, move and trash files",
    long_about = "ferry runs file operations with byte-level progress, per-file \
                  conflict resolution and a freedesktop.org compatible trash."
)]
struct Cli {
    /// What to do when a destination already exists
    #[arg(long, global = true, default_value = "ask")]
    on_conflict: ConflictPolicy,

    /// Use this directory as the trash root instead of ~/.local/share/Trash
    #[arg(long, global = true)]
    trash_dir: Option<PathBuf>,

    /// Print the outcome as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Do not print progress
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Copy files and directories into a directory
    Copy {
        /// Sources followed by the destination directory
        #[arg(required = true, num_args = 2..)]
        paths: Vec<PathBuf>,
    },

    /// Move files and directories into a directory
    Move {
        /// Sources followed by the destination directory
        #[arg(required = true, num_args = 2..)]
        paths: Vec<PathBuf>,
    },

    /// Move paths to the trash, or delete them if they are already trashed
    Delete {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },

    /// Restore a trashed item to its original location
    Restore {
        /// Path inside the trash, or just the item name
        item: PathBuf,
    },

    /// Permanently delete everything in the trash
    EmptyTrash,

    /// List the trash contents
    ListTrash,

    /// Create a directory inside an existing directory
    NewFolder {
        /// Directory to create it in
        parent: PathBuf,
        /// Name of the new directory
        name: String,
    },

    /// Rename a file or directory without moving it
    Rename {
        path: PathBuf,
        /// New name, a single path component
        new_name: String,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
enum ConflictPolicy {
    Ask,
    Replace,
    Skip,
    KeepBoth,
    Cancel,
}

impl ConflictPolicy {
    fn fixed(self) -> Option<ConflictResolution> {
        match self {
            Self::Ask => None,
            Self::Replace => Some(ConflictResolution::Replace),
            Self::Skip => Some(ConflictResolution::Skip),
            Self::KeepBoth => Some(ConflictResolution::KeepBoth),
            Self::Cancel => Some(ConflictResolution::Cancel),
        }
    }
}

fn main() -> Result<()> {
    color_eyre::install()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = EngineConfig::from_env().context("Could not determine home directory")?;
    if let Some(trash_dir) = &cli.trash_dir {
        config = config.with_trash_dir(trash_dir);
    }
    debug!(
        home = %config.home.display(),
        trash = %config.trash_root().display(),
        "Engine configured"
    );

    let operation = match cli.command {
        Command::Copy { paths } => {
            let (sources, destination) = split_destination(paths)?;
            FileOperation::copy(sources, destination)
        }
        Command::Move { paths } => {
            let (sources, destination) = split_destination(paths)?;
            FileOperation::move_to(sources, destination)
        }
        Command::Delete { paths } => FileOperation::delete(paths),
        Command::Restore { item } => {
            let trashed = if item.components().count() == 1 {
                Trash::new(&config)?.files_dir().join(item)
            } else {
                item
            };
            FileOperation::restore(trashed)
        }
        Command::EmptyTrash => FileOperation::EmptyTrash,
        Command::ListTrash => return list_trash(&config, cli.json),
        Command::NewFolder { parent, name } => FileOperation::create_directory(parent, name),
        Command::Rename { path, new_name } => FileOperation::rename(path, new_name),
    };

    let executor = OperationExecutor::new(config);
    let complete = run(&executor, operation, cli.on_conflict, cli.quiet)?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&complete)?);
    } else {
        print_outcome(&complete);
    }

    if !complete.is_success() {
        std::process::exit(1);
    }
    Ok(())
}

/// Split `SRC... DEST` into sources and the destination.
fn split_destination(mut paths: Vec<PathBuf>) -> Result<(Vec<PathBuf>, PathBuf)> {
    let Some(destination) = paths.pop() else {
        bail!("missing destination directory");
    };
    if paths.is_empty() {
        bail!("at least one source is required");
    }
    Ok((paths, destination))
}

/// Run an operation to completion, answering conflicts and drawing progress.
fn run(
    executor: &OperationExecutor,
    operation: FileOperation,
    policy: ConflictPolicy,
    quiet: bool,
) -> Result<OperationComplete> {
    let mut handle = executor.execute(operation)?;
    let mut outcome = None;
    let mut drawn = false;

    while let Some(event) = handle.events.blocking_recv() {
        match event {
            OperationEvent::Progress(progress) => {
                if !quiet {
                    draw_progress(&progress);
                    drawn = true;
                }
            }
            OperationEvent::Conflict(request) => {
                if drawn {
                    eprintln!();
                    drawn = false;
                }
                let answer = match policy.fixed() {
                    Some(answer) => answer,
                    None => prompt(request.conflict())?,
                };
                request.respond(answer);
            }
            OperationEvent::Complete(complete) => outcome = Some(complete),
        }
    }
    if drawn {
        eprintln!();
    }

    match outcome {
        Some(complete) => Ok(complete),
        None => bail!("operation ended without reporting an outcome"),
    }
}

/// Ask on the terminal how to resolve a collision.
fn prompt(conflict: &Conflict) -> Result<ConflictResolution> {
    let kind = if conflict.is_directory {
        "Directory"
    } else {
        "File"
    };
    let stdin = io::stdin();
    let mut line = String::new();

    loop {
        eprint!(
            "{} {} already exists. [r]eplace, [s]kip, [k]eep both, [c]ancel? ",
            kind,
            conflict.destination.display()
        );
        io::stderr().flush()?;

        line.clear();
        if stdin.lock().read_line(&mut line)? == 0 {
            return Ok(ConflictResolution::Cancel);
        }
        match line.trim().to_lowercase().as_str() {
            "r" | "replace" => return Ok(ConflictResolution::Replace),
            "s" | "skip" => return Ok(ConflictResolution::Skip),
            "k" | "keep" | "keep both" => return Ok(ConflictResolution::KeepBoth),
            "c" | "cancel" => return Ok(ConflictResolution::Cancel),
            _ => continue,
        }
    }
}

/// Draw a single progress line on stderr.
fn draw_progress(progress: &OperationProgress) {
    let current = progress
        .current_file
        .as_ref()
        .and_then(|p| p.file_name())
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    match progress.bytes_total {
        None => eprint!("\r{}: scanning...{:<40}", progress.operation_type, ""),
        Some(total) => eprint!(
            "\r{}: {:>5.1}% {} / {} ({}/{}) {:<40}",
            progress.operation_type,
            progress.percentage(),
            format_size(progress.bytes_processed),
            format_size(total),
            progress.files_completed,
            progress.files_total,
            truncate(&current, 40)
        ),
    }
}

/// Print the final outcome of an operation.
fn print_outcome(complete: &OperationComplete) {
    println!(
        "{} ({} transferred)",
        complete.summary(),
        format_size(complete.bytes_processed)
    );
    for path in &complete.non_restorable {
        println!(
            " Trashed without restore metadata: {}",
            path.display()
        );
    }
    if !complete.is_success() {
        eprintln!();
        eprintln!("{}", complete.message());
    }
}

/// List the trash contents.
fn list_trash(config: &EngineConfig, json: bool) -> Result<()> {
    let items = Trash::new(config)?.list()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&items)?);
        return Ok(());
    }

    if items.is_empty() {
        println!("Trash is empty.");
        return Ok(());
    }

    for item in &items {
        let (origin, date) = match &item.info {
            Some(info) => (
                info.original_path.display().to_string(),
                info.deletion_date
                    .map(|d| d.format("%Y-%m-%d %H:%M").to_string())
                    .unwrap_or_default(),
            ),
            None => ("(unknown origin)".to_string(), String::new()),
        };
        println!("{:<30} {:<16} {}", truncate(&item.name, 30), date, origin);
    }
    Ok(())
}

/// Format size in human-readable form.
fn format_size(bytes: u64) -> String {
    humansize::format_size(bytes, humansize::BINARY)
}

/// Truncate a string to max length in characters.
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(1)).collect();
        format!("{kept}…")
    }
}
