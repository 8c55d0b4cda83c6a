//! Local task-file store for todofs.
//!
//! This crate reads and writes a plain-text task list, funnels every write
//! through a single background worker, and reports changes made to the file
//! by other programs while hiding the ones it makes itself.
//!
//! # Overview
//!
//! - [`LocalFileStore`] / [`FileStore`]: the store facade
//! - [`StoreBuilder`]: wires listener, signals, backups and state file
//! - [`WriteQueue`]: serial FIFO worker for file mutations
//! - [`browse`]: directory listing for picking a task file
//!
//! # Architecture
//!
//! ```text
//! read() ──► PathLocks ──► file ──► Backup ──► TodoWatcher::start / keep
//!
//! save() ──► Backup ──► suppress ──► WriteQueue ──► PathLocks ──► file
//!                                        │
//!                                        ├─ failure ──► PendingChanges ──► SignalSink
//!                                        └─ resume_after(delay)
//!
//! append() ──────────────────────────► WriteQueue ──► file ──► SyncDone
//! ```
//!
//! # Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use camino::Utf8Path;
//! use todofs_core::LineEnding;
//! use todofs_store::{FileStore, StoreBuilder};
//!
//! # fn main() -> Result<(), todofs_store::StoreError> {
//! let listener = Arc::new(|path: &Utf8Path| println!("{path} changed elsewhere"));
//! let store = StoreBuilder::new(listener).build()?;
//!
//! let path = Utf8Path::new("todo.txt");
//! let mut lines = store.read(path)?.into_lines();
//! lines.push("(B) water plants".to_owned());
//! store.save(path, lines, LineEnding::Lf);
//! store.flush()?;
//! # Ok(())
//! # }
//! ```

#![deny(clippy::all)]
#![warn(missing_docs)]

pub mod browse;
pub mod collaborators;
pub mod error;
pub mod file_io;
pub mod locks;
pub mod pending;
pub mod queue;
pub mod store;

// Re-export error types
pub use error::StoreError;

// Re-export collaborator seams
pub use collaborators::{
    Backup, ConnectivityProbe, DirectoryBackup, NoBackup, NoSignals, Offline, SignalSink,
    StoreSignal,
};

// Re-export the store
pub use queue::WriteQueue;
pub use store::{DEFAULT_RESUME_DELAY, FileStore, LocalFileStore, Rebind, StoreBuilder};
