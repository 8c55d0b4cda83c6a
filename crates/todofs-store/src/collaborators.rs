//! Pluggable collaborators of the store: backups, signals, connectivity.
//!
//! The store never talks to a UI or a broadcast bus directly. Whoever builds
//! it supplies these seams; every one of them has a do-nothing default.

use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use tokio::sync::mpsc;

/// Receives a copy of the task file contents before each save and after
/// each successful read.
///
/// Called synchronously on the caller's thread; implementations report
/// their own failures.
pub trait Backup: Send + Sync + 'static {
    /// Stores `contents` (lines joined by `\n`) for `path`.
    fn backup(&self, path: &Utf8Path, contents: &str);
}

/// Backup that discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoBackup;

impl Backup for NoBackup {
    fn backup(&self, _path: &Utf8Path, _contents: &str) {}
}

/// Keeps the latest contents of each file as `<dir>/<file name>.bak`.
///
/// # Examples
///
/// ```no_run
/// use camino::Utf8Path;
/// use todofs_store::{Backup, DirectoryBackup};
///
/// let backup = DirectoryBackup::new("/home/me/.todofs/backup");
/// backup.backup(Utf8Path::new("/home/me/todo.txt"), "(A) call mom");
/// // -> /home/me/.todofs/backup/todo.txt.bak
/// ```
#[derive(Debug, Clone)]
pub struct DirectoryBackup {
    dir: Utf8PathBuf,
}

impl DirectoryBackup {
    /// Creates a backup writing into `dir` (created on first use).
    #[must_use]
    pub fn new(dir: impl Into<Utf8PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Returns the backup directory.
    #[must_use]
    pub fn dir(&self) -> &Utf8Path {
        &self.dir
    }

    /// Returns where the backup of `path` is kept.
    #[must_use]
    pub fn backup_path(&self, path: &Utf8Path) -> Option<Utf8PathBuf> {
        path.file_name()
            .map(|name| self.dir.join(format!("{name}.bak")))
    }
}

impl Backup for DirectoryBackup {
    fn backup(&self, path: &Utf8Path, contents: &str) {
        let Some(target) = self.backup_path(path) else {
            tracing::warn!(path = %path, "Cannot back up a path without a file name");
            return;
        };
        let result = fs::create_dir_all(&self.dir).and_then(|()| fs::write(&target, contents));
        match result {
            Ok(()) => tracing::debug!(path = %path, backup = %target, "Backed up task file"),
            Err(err) => {
                tracing::warn!(path = %path, backup = %target, error = %err, "Backup failed");
            }
        }
    }
}

/// Notifications the store raises for the rest of the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreSignal {
    /// The pending-changes flag was written; carries its new value.
    PendingChangesUpdated(bool),
    /// An append attempt finished, successfully or not.
    SyncDone,
}

/// Receives [`StoreSignal`]s. Called from whichever thread raised them,
/// usually the write worker.
pub trait SignalSink: Send + Sync + 'static {
    /// Handles one signal.
    fn emit(&self, signal: StoreSignal);
}

/// Sink that drops every signal.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSignals;

impl SignalSink for NoSignals {
    fn emit(&self, _signal: StoreSignal) {}
}

impl<F> SignalSink for F
where
    F: Fn(StoreSignal) + Send + Sync + 'static,
{
    fn emit(&self, signal: StoreSignal) {
        self(signal);
    }
}

impl SignalSink for mpsc::UnboundedSender<StoreSignal> {
    fn emit(&self, signal: StoreSignal) {
        if self.send(signal).is_err() {
            tracing::debug!(?signal, "Signal receiver dropped");
        }
    }
}

/// Answers whether the device currently has network connectivity.
pub trait ConnectivityProbe: Send + Sync + 'static {
    /// Returns `true` when online.
    fn is_connected(&self) -> bool;
}

/// Probe for hosts without networking; always offline.
#[derive(Debug, Clone, Copy, Default)]
pub struct Offline;

impl ConnectivityProbe for Offline {
    fn is_connected(&self) -> bool {
        false
    }
}
