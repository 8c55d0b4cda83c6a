//! CLI entry point for todofs.
//!
//! This binary drives the local task-file store from a terminal: it shows,
//! edits and watches a plain-text task list.
//!
//! # Usage
//!
//! ```bash
//! todofs [OPTIONS] <COMMAND>
//!
//! # Print the task list with line numbers
//! todofs --file ~/todo.txt show
//!
//! # Append a task
//! todofs add "(A) call the plumber"
//!
//! # Print changes made by other programs until Ctrl-C
//! todofs watch
//!
//! # Pick a task file
//! todofs browse ~/Dropbox
//! ```

#![deny(clippy::all)]
#![warn(missing_docs)]

use std::io::{BufRead, Write};
use std::sync::Arc;

use camino::{Utf8Path, Utf8PathBuf};
use clap::{Parser, Subcommand, ValueEnum};
use color_eyre::eyre::eyre;
use todofs_core::{Config, LineEnding, TaskLine};
use todofs_store::browse::{self, ExtensionFilter};
use todofs_store::{FileStore, LocalFileStore, StoreBuilder};
use todofs_watcher::FileEvent;
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// CLI ARGUMENT TYPES
// =============================================================================

/// Reads, edits and watches a plain-text task list.
#[derive(Parser)]
#[command(name = "todofs", version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Command to execute.
    #[command(subcommand)]
    command: Commands,

    /// Task file to operate on.
    ///
    /// Overrides `store.todo_path` from the config file.
    #[arg(short, long, global = true, env = "TODOFS_FILE")]
    file: Option<Utf8PathBuf>,

    /// JSON configuration file.
    #[arg(long, global = true, env = "TODOFS_CONFIG")]
    config: Option<Utf8PathBuf>,

    /// Directory for persisted store state.
    #[arg(long, global = true, env = "TODOFS_STATE_DIR")]
    state_dir: Option<Utf8PathBuf>,

    /// Line ending used when writing.
    #[arg(long, global = true, value_enum)]
    eol: Option<Eol>,

    /// Enable verbose logging (debug level).
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable colored output.
    #[arg(long, global = true)]
    no_color: bool,
}

/// Available subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Print the task list with line numbers.
    Show,

    /// Append one task; the words are joined with spaces.
    Add {
        /// Task text.
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,
    },

    /// Remove the task on line N (1-based).
    Remove {
        /// Line number as printed by `show`.
        line: usize,
    },

    /// Replace the whole task list with lines read from stdin.
    Replace,

    /// Print the task list again whenever another program changes it.
    Watch,

    /// List a directory the way a task-file chooser would.
    Browse {
        /// Directory to list (defaults to the task file's directory).
        dir: Option<Utf8PathBuf>,

        /// Show every file, not only `.txt` files.
        #[arg(short, long)]
        all: bool,
    },

    /// Show or clear the pending-changes flag.
    Pending {
        /// Clear the flag.
        #[arg(long)]
        clear: bool,
    },
}

/// Line ending choice.
#[derive(Clone, Copy, ValueEnum)]
enum Eol {
    /// Unix (`\n`).
    Lf,
    /// Windows (`\r\n`).
    Crlf,
}

impl From<Eol> for LineEnding {
    fn from(eol: Eol) -> Self {
        match eol {
            Eol::Lf => Self::Lf,
            Eol::Crlf => Self::CrLf,
        }
    }
}

// =============================================================================
// INITIALIZATION FUNCTIONS
// =============================================================================

/// Initializes the tracing subscriber for logging.
///
/// Respects `RUST_LOG` if set. Otherwise uses `debug` with `--verbose` and
/// `warn` by default so command output stays readable. Logs go to stderr.
fn init_tracing(verbose: bool, no_color: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = if verbose { "debug" } else { "warn" };
        EnvFilter::new(format!("{level},mio=warn,notify=warn"))
    });

    // Check if colors should be disabled (flag or NO_COLOR env var)
    let use_ansi = !no_color && std::env::var("NO_COLOR").is_err();

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(false)
                .with_ansi(use_ansi)
                .with_writer(std::io::stderr),
        )
        .with(filter)
        .init();
}

/// Builds the [`Config`] from the optional config file and CLI overrides.
///
/// # Errors
///
/// Returns an error if the config file cannot be loaded or the result does
/// not validate.
fn build_config(cli: &Cli) -> color_eyre::Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };

    if let Some(file) = &cli.file {
        config.store.todo_path.clone_from(file);
    }
    if let Some(dir) = &cli.state_dir {
        config.store.state_dir.clone_from(dir);
    }
    if let Some(eol) = cli.eol {
        config.store.line_ending = eol.into();
    }
    // Only `watch` needs change notifications.
    if !matches!(cli.command, Commands::Watch) {
        config.watch.enabled = false;
    }

    config.validate()?;
    Ok(config)
}

/// Creates a store for commands that do not listen for changes.
fn open_store(config: &Config) -> color_eyre::Result<LocalFileStore> {
    Ok(create_store(config)?.0)
}

/// Creates the store and the receiving end of its change notifications.
fn create_store(
    config: &Config,
) -> color_eyre::Result<(LocalFileStore, mpsc::UnboundedReceiver<FileEvent>)> {
    let (change_tx, change_rx) = mpsc::unbounded_channel();
    let store = StoreBuilder::from_config(config, Arc::new(change_tx)).build()?;
    Ok((store, change_rx))
}

// =============================================================================
// COMMAND IMPLEMENTATIONS
// =============================================================================

/// Prints the task list.
fn run_show(store: &LocalFileStore, path: &Utf8Path) -> color_eyre::Result<()> {
    let snapshot = store.read(path)?;
    print_lines(snapshot.lines())?;
    Ok(())
}

/// Appends one task.
async fn run_add(
    store: &LocalFileStore,
    config: &Config,
    text: &[String],
) -> color_eyre::Result<()> {
    let path = &config.store.todo_path;
    let was_pending = store.pending_changes();
    store.append(path, vec![text.join(" ")], config.store.line_ending);
    finish_writes(store, path, was_pending).await
}

/// Removes the task on a 1-based line.
async fn run_remove(
    store: &LocalFileStore,
    config: &Config,
    line: usize,
) -> color_eyre::Result<()> {
    let path = &config.store.todo_path;
    let mut lines = store.read(path)?.into_lines();
    let removed = remove_line(&mut lines, line)?;
    info!(path = %path, line, task = %removed, "Removing task");

    let was_pending = store.pending_changes();
    store.save(path, lines, config.store.line_ending);
    finish_writes(store, path, was_pending).await?;

    let mut out = std::io::stdout().lock();
    writeln!(out, "Removed: {removed}")?;
    Ok(())
}

/// Replaces the task list with stdin.
async fn run_replace(store: &LocalFileStore, config: &Config) -> color_eyre::Result<()> {
    let path = &config.store.todo_path;
    let lines = std::io::stdin()
        .lock()
        .lines()
        .collect::<Result<Vec<_>, _>>()?;
    info!(path = %path, lines = lines.len(), "Replacing task list");

    let was_pending = store.pending_changes();
    store.save(path, lines, config.store.line_ending);
    finish_writes(store, path, was_pending).await
}

/// Prints the list, then reprints it after every external change.
async fn run_watch(
    store: &LocalFileStore,
    path: &Utf8Path,
    mut changes: mpsc::UnboundedReceiver<FileEvent>,
) -> color_eyre::Result<()> {
    run_show(store, path)?;
    if store.watched_path().is_none() {
        return Err(eyre!("could not watch {path}; see the log for details"));
    }
    info!(path = %path, "Watching for external changes");

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            result = &mut shutdown => {
                result?;
                break;
            }
            event = changes.recv() => {
                let Some(event) = event else {
                    break;
                };
                tokio::task::block_in_place(|| reprint_changed(store, &event.path))?;
            }
        }
    }

    store.unwatch();
    Ok(())
}

/// Lists a directory.
fn run_browse(dir: &Utf8Path, all: bool) -> color_eyre::Result<()> {
    let filter = if all {
        ExtensionFilter::All
    } else {
        ExtensionFilter::text()
    };
    let listing = browse::list_directory(dir, &filter);

    let mut out = std::io::stdout().lock();
    if listing.fell_back() {
        writeln!(out, "{dir} is not readable, showing {}", listing.dir())?;
    } else {
        writeln!(out, "{}", listing.dir())?;
    }
    write!(out, "{listing}")?;
    Ok(())
}

/// Shows or clears the pending-changes flag.
fn run_pending(store: &LocalFileStore, clear: bool) -> color_eyre::Result<()> {
    if clear {
        store.clear_pending_changes();
    }
    let mut out = std::io::stdout().lock();
    let state = if store.pending_changes() { "yes" } else { "no" };
    writeln!(out, "local changes pending: {state}")?;
    Ok(())
}

// =============================================================================
// HELPERS
// =============================================================================

/// Waits for queued writes and reports a failure recorded while they ran.
async fn finish_writes(
    store: &LocalFileStore,
    path: &Utf8Path,
    was_pending: bool,
) -> color_eyre::Result<()> {
    store
        .barrier()?
        .await
        .map_err(|_| eyre!("write worker stopped before finishing"))?;
    if store.pending_changes() && !was_pending {
        return Err(eyre!(
            "writing {path} failed; local changes are marked as pending"
        ));
    }
    Ok(())
}

/// Re-reads and prints a file that changed elsewhere.
///
/// Returns `false` if the file could not be read; the failure is logged and
/// watching goes on.
fn reprint_changed(store: &LocalFileStore, path: &Utf8Path) -> std::io::Result<bool> {
    let contents = match store.read_contents(path) {
        Ok(contents) => contents,
        Err(err) => {
            warn!(path = %path, error = %err, "Could not re-read task file");
            return Ok(false);
        }
    };
    let mut out = std::io::stdout().lock();
    writeln!(out)?;
    writeln!(out, "--- {path} changed ---")?;
    drop(out);
    print_lines(&contents.lines().map(str::to_owned).collect::<Vec<_>>())?;
    Ok(true)
}

/// Removes and returns the 1-based `line` from `lines`.
fn remove_line(lines: &mut Vec<TaskLine>, line: usize) -> color_eyre::Result<TaskLine> {
    if line == 0 || line > lines.len() {
        return Err(eyre!(
            "line {line} is out of range (the list has {} lines)",
            lines.len()
        ));
    }
    Ok(lines.remove(line - 1))
}

/// Prints lines with right-aligned 1-based numbers.
fn print_lines(lines: &[TaskLine]) -> std::io::Result<()> {
    let mut out = std::io::stdout().lock();
    let width = lines.len().to_string().len();
    for (i, line) in lines.iter().enumerate() {
        writeln!(out, "{:>width$} {line}", i + 1)?;
    }
    Ok(())
}

/// Resolves on Ctrl-C, or SIGTERM on Unix.
async fn shutdown_signal() -> std::io::Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut sigterm = signal(SignalKind::terminate())?;
        tokio::select! {
            result = tokio::signal::ctrl_c() => result,
            _ = sigterm.recv() => {
                info!("Received SIGTERM, shutting down");
                Ok(())
            }
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await
    }
}

// =============================================================================
// MAIN ENTRY POINT
// =============================================================================

/// Application entry point.
#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    // 1. Install color-eyre FIRST (before any potential panics)
    color_eyre::install()?;

    // 2. Parse CLI arguments
    let cli = Cli::parse();

    // 3. Initialize tracing (handles --no-color for log output)
    init_tracing(cli.verbose, cli.no_color);

    // 4. Load configuration
    let config = build_config(&cli)?;
    let path = config.store.todo_path.clone();

    // 5. Route to appropriate command
    match &cli.command {
        Commands::Browse { dir, all } => {
            let dir = dir.clone().unwrap_or_else(|| match path.parent() {
                Some(parent) if !parent.as_str().is_empty() => parent.to_owned(),
                _ => Utf8PathBuf::from("."),
            });
            run_browse(&dir, *all)
        }
        Commands::Show => run_show(&open_store(&config)?, &path),
        Commands::Add { text } => run_add(&open_store(&config)?, &config, text).await,
        Commands::Remove { line } => run_remove(&open_store(&config)?, &config, *line).await,
        Commands::Replace => run_replace(&open_store(&config)?, &config).await,
        Commands::Watch => {
            let (store, changes) = create_store(&config)?;
            run_watch(&store, &path, changes).await
        }
        Commands::Pending { clear } => run_pending(&open_store(&config)?, *clear),
    }
}
