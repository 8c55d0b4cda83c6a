//! Self-filtering file watcher for a single task file.
//!
//! This crate watches one file for changes made by other programs while
//! ignoring the changes its owner makes itself. Change detection uses the
//! `notify` crate on the file's parent directory; a small state machine
//! ([`SelfFilter`]) decides which raw events reach the listener.
//!
//! # Overview
//!
//! - Only events for the exact file name are considered
//! - Only close-after-write, modify, and move-into events qualify
//! - A caller-controlled suppression window hides self-caused writes
//! - Events arriving together are reported as a single change
//!
//! # Architecture
//!
//! ```text
//! notify (OS thread) ──► SelfFilter on arrival ──► unbounded mpsc ──► consumer thread ──► ChangeListener
//!                             │
//!                       Active / Suppressed / Stopped
//!                             ▲
//!             SuppressionHandle (store write worker)
//! ```
//!
//! # Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use camino::Utf8Path;
//! use todofs_watcher::{FileEvent, TodoWatcher};
//! use tokio::sync::mpsc;
//!
//! # fn example() -> Result<(), todofs_watcher::WatchError> {
//! let (tx, mut rx) = mpsc::unbounded_channel::<FileEvent>();
//! let watcher = TodoWatcher::start(Utf8Path::new("todo.txt"), Arc::new(tx))?;
//!
//! while let Some(event) = rx.blocking_recv() {
//!     println!("{} changed", event.path);
//! }
//! # drop(watcher);
//! # Ok(())
//! # }
//! ```
//!
//! # Error Handling
//!
//! ```
//! use todofs_watcher::WatchError;
//!
//! fn handle_watch_error(err: WatchError) {
//!     match err.path() {
//!         Some(path) => eprintln!("Cannot watch {path}: {err}"),
//!         None => eprintln!("Cannot watch: {err}"),
//!     }
//! }
//! ```

#![deny(clippy::all)]
#![warn(missing_docs)]

pub mod error;
pub mod events;
pub mod filter;
pub mod watcher;

// Re-export error types
pub use error::WatchError;

// Re-export event types
pub use events::{FileEvent, RawEvent, RawEventBatch, RawEventKind};

// Re-export filter types
pub use filter::{Admission, SelfFilter, WatchState};

// Re-export watcher types
pub use watcher::{ChangeListener, SuppressionHandle, TodoWatcher};
