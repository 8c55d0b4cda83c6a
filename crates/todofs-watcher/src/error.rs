//! Error types for the todofs-watcher crate.
//!
//! This module provides the [`WatchError`] type for errors that can occur
//! while arming a watch on the task file.

use camino::Utf8PathBuf;

/// Errors that can occur during file watching operations.
///
/// Every variant means the registration could not be armed. Problems with
/// individual events (non-UTF-8 names, backend hiccups) are logged and
/// skipped instead.
///
/// # Examples
///
/// ```
/// use todofs_watcher::WatchError;
///
/// fn handle_error(err: WatchError) {
///     match err {
///         WatchError::Notify(e) => eprintln!("Notify error: {e}"),
///         WatchError::PathNotFound(p) => eprintln!("Directory not found: {p}"),
///         WatchError::InvalidPath(p) => eprintln!("Not a file path: {p}"),
///         WatchError::Io(e) => eprintln!("I/O error: {e}"),
///     }
/// }
/// ```
#[derive(Debug, thiserror::Error)]
pub enum WatchError {
    /// Failed to initialize or operate the notify watcher.
    #[error("notify watcher error: {0}")]
    Notify(#[from] notify::Error),

    /// The directory containing the watched file does not exist.
    #[error("path does not exist: {0}")]
    PathNotFound(Utf8PathBuf),

    /// The path does not name a file.
    #[error("path has no file name: {0}")]
    InvalidPath(Utf8PathBuf),

    /// An I/O error occurred.
    ///
    /// Raised while resolving the watched directory or spawning the
    /// consumer thread.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl WatchError {
    /// Creates a new [`WatchError::PathNotFound`] error.
    #[inline]
    pub fn path_not_found(path: impl Into<Utf8PathBuf>) -> Self {
        Self::PathNotFound(path.into())
    }

    /// Creates a new [`WatchError::InvalidPath`] error.
    #[inline]
    pub fn invalid_path(path: impl Into<Utf8PathBuf>) -> Self {
        Self::InvalidPath(path.into())
    }

    /// Returns the file path associated with this error, if any.
    #[must_use]
    pub fn path(&self) -> Option<&Utf8PathBuf> {
        match self {
            Self::PathNotFound(path) | Self::InvalidPath(path) => Some(path),
            Self::Notify(_) | Self::Io(_) => None,
        }
    }
}
