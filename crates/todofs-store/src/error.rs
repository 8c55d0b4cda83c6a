//! Error types for the todofs-store crate.
//!
//! This module provides the [`StoreError`] type for errors raised by the
//! store facade, the write queue and the persisted store state.

use camino::{Utf8Path, Utf8PathBuf};
use todofs_watcher::WatchError;

/// Errors that can occur during store operations.
///
/// # Propagation
///
/// - **Read failures** ([`StoreError::Read`]): returned synchronously from reads
/// - **Write failures** ([`StoreError::Write`]): never returned to the caller of
///   `save`/`append`; they are logged and recorded in the pending-changes flag
/// - **State failures** ([`StoreError::State`], [`StoreError::StateFormat`]):
///   logged, the in-memory flag stays authoritative
/// - **Watch failures** ([`StoreError::Watch`]): logged by reads, returned by
///   explicit watch calls
///
/// # Examples
///
/// ```
/// use todofs_store::StoreError;
/// use std::io;
///
/// let err = StoreError::read("todo.txt", io::Error::from(io::ErrorKind::NotFound));
/// assert!(err.is_io_failure());
/// assert_eq!(err.path().map(|p| p.as_str()), Some("todo.txt"));
/// ```
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The task file could not be opened or read.
    #[error("failed to read {path}: {source}")]
    Read {
        /// The file that could not be read.
        path: Utf8PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The task file could not be written.
    #[error("failed to write {path}: {source}")]
    Write {
        /// The file that could not be written.
        path: Utf8PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The persisted store state could not be read or written.
    #[error("failed to access store state {path}: {source}")]
    State {
        /// The state file.
        path: Utf8PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The persisted store state is not valid JSON.
    #[error("store state {path} is corrupt: {source}")]
    StateFormat {
        /// The state file.
        path: Utf8PathBuf,
        /// The underlying parse error.
        #[source]
        source: serde_json::Error,
    },

    /// The file watcher could not be armed.
    #[error(transparent)]
    Watch(#[from] WatchError),

    /// The write queue worker is no longer running.
    #[error("write queue worker is not running")]
    QueueClosed,

    /// The write queue worker thread could not be started.
    #[error("failed to start write queue worker: {0}")]
    Spawn(#[source] std::io::Error),
}

impl StoreError {
    /// Creates a new [`StoreError::Read`] error.
    #[inline]
    pub fn read(path: impl Into<Utf8PathBuf>, source: std::io::Error) -> Self {
        Self::Read {
            path: path.into(),
            source,
        }
    }

    /// Creates a new [`StoreError::Write`] error.
    #[inline]
    pub fn write(path: impl Into<Utf8PathBuf>, source: std::io::Error) -> Self {
        Self::Write {
            path: path.into(),
            source,
        }
    }

    /// Creates a new [`StoreError::State`] error.
    #[inline]
    pub fn state(path: &Utf8Path, source: std::io::Error) -> Self {
        Self::State {
            path: path.to_owned(),
            source,
        }
    }

    /// Returns `true` if a task file read or write did not complete.
    #[inline]
    #[must_use]
    pub const fn is_io_failure(&self) -> bool {
        matches!(self, Self::Read { .. } | Self::Write { .. })
    }

    /// Returns the file path associated with this error, if any.
    #[must_use]
    pub fn path(&self) -> Option<&Utf8Path> {
        match self {
            Self::Read { path, .. }
            | Self::Write { path, .. }
            | Self::State { path, .. }
            | Self::StateFormat { path, .. } => Some(path),
            Self::Watch(err) => err.path().map(Utf8PathBuf::as_path),
            Self::QueueClosed | Self::Spawn(_) => None,
        }
    }
}
