//! The local task-file store.
//!
//! [`LocalFileStore`] serializes all mutations of task files through one
//! [`WriteQueue`] and keeps at most one [`TodoWatcher`] armed on the file
//! last read. Saves suppress the watcher until shortly after they complete,
//! so the application is only told about changes made by someone else.
//!
//! # Flow of a save
//!
//! ```text
//! caller thread                         write worker
//! ─────────────                         ────────────
//! backup(path, lines)
//! watcher.begin_suppression()
//! queue.submit(overwrite) ───────────►  lock(path)
//! (returns)                             truncate + write + sync
//!                                       on error: pending = true
//!                                       resume_after(resume_delay)
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use parking_lot::Mutex;
use tokio::sync::oneshot;

use todofs_core::{Config, FileSnapshot, LineEnding, StoreKind, TaskLine};
use todofs_watcher::{ChangeListener, SuppressionHandle, TodoWatcher, WatchState};

use crate::collaborators::{
    Backup, ConnectivityProbe, DirectoryBackup, NoSignals, Offline, SignalSink, StoreSignal,
};
use crate::error::StoreError;
use crate::file_io::{self, WriteMode};
use crate::locks::PathLocks;
use crate::pending::PendingChanges;
use crate::queue::WriteQueue;

/// Default delay between a save completing and change delivery resuming.
pub const DEFAULT_RESUME_DELAY: Duration = Duration::from_millis(1000);

/// Name of the write worker thread.
const WRITER_THREAD: &str = "todofs-writer";

/// Storage backend for a task list.
///
/// Reads are synchronous; writes are queued and never report failure to the
/// caller directly.
pub trait FileStore: Send + Sync {
    /// Which kind of backend this is.
    fn kind(&self) -> StoreKind;

    /// Reads `path` and starts watching it.
    fn read(&self, path: &Utf8Path) -> Result<FileSnapshot, StoreError>;

    /// Reads the whole file as text, lines joined with `\n`.
    fn read_contents(&self, path: &Utf8Path) -> Result<String, StoreError>;

    /// Replaces the contents of `path` with `lines`.
    fn save(&self, path: &Utf8Path, lines: Vec<TaskLine>, eol: LineEnding);

    /// Adds `lines` to the end of `path`.
    fn append(&self, path: &Utf8Path, lines: Vec<TaskLine>, eol: LineEnding);

    /// Whether the backend can synchronise with a remote copy.
    fn supports_remote_sync(&self) -> bool;

    /// Whether a remote copy has changes not yet pulled.
    fn has_pending_remote_changes(&self) -> bool;

    /// Whether the backend holds valid credentials.
    fn is_authenticated(&self) -> bool;

    /// Whether the device is online.
    fn is_online(&self) -> bool;

    /// Synchronises with the remote copy, if there is one.
    fn sync(&self);

    /// Whether a read is in progress.
    fn is_loading(&self) -> bool;
}

/// Outcome of arming the watcher on a path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rebind {
    /// No watcher was armed before.
    Started,
    /// The path was already being watched; nothing changed.
    AlreadyWatching,
    /// The watcher on `previous` was stopped and replaced.
    Replaced {
        /// The path that was watched before.
        previous: Utf8PathBuf,
    },
}

/// Builder for [`LocalFileStore`].
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
/// use std::time::Duration;
/// use camino::Utf8Path;
/// use todofs_store::{DirectoryBackup, StoreBuilder};
///
/// # fn main() -> Result<(), todofs_store::StoreError> {
/// let listener = Arc::new(|path: &Utf8Path| println!("{path} changed"));
/// let store = StoreBuilder::new(listener)
///     .with_backup(DirectoryBackup::new("/home/me/.todofs/backup"))
///     .with_state_file("/home/me/.todofs/store-state.json")
///     .with_resume_delay(Duration::from_millis(500))
///     .build()?;
/// # drop(store);
/// # Ok(())
/// # }
/// ```
pub struct StoreBuilder {
    listener: Arc<dyn ChangeListener>,
    signals: Arc<dyn SignalSink>,
    backup: Option<Arc<dyn Backup>>,
    connectivity: Arc<dyn ConnectivityProbe>,
    state_file: Option<Utf8PathBuf>,
    resume_delay: Duration,
    watching: bool,
}

impl StoreBuilder {
    /// Starts a builder that reports external changes to `listener`.
    #[must_use]
    pub fn new(listener: Arc<dyn ChangeListener>) -> Self {
        Self {
            listener,
            signals: Arc::new(NoSignals),
            backup: None,
            connectivity: Arc::new(Offline),
            state_file: None,
            resume_delay: DEFAULT_RESUME_DELAY,
            watching: true,
        }
    }

    /// Starts a builder configured from `config`.
    #[must_use]
    pub fn from_config(config: &Config, listener: Arc<dyn ChangeListener>) -> Self {
        let mut builder = Self::new(listener)
            .with_state_file(config.store.state_file())
            .with_resume_delay(config.watch.resume_delay())
            .with_watching(config.watch.enabled);
        if let Some(dir) = &config.store.backup_dir {
            builder = builder.with_backup(DirectoryBackup::new(dir.clone()));
        }
        builder
    }

    /// Sets the sink for [`StoreSignal`]s.
    #[must_use]
    pub fn with_signals(mut self, signals: impl SignalSink) -> Self {
        self.signals = Arc::new(signals);
        self
    }

    /// Sets the backup collaborator.
    #[must_use]
    pub fn with_backup(mut self, backup: impl Backup) -> Self {
        self.backup = Some(Arc::new(backup));
        self
    }

    /// Sets the connectivity probe behind [`FileStore::is_online`].
    #[must_use]
    pub fn with_connectivity(mut self, probe: impl ConnectivityProbe) -> Self {
        self.connectivity = Arc::new(probe);
        self
    }

    /// Persists the pending-changes flag in `path`.
    #[must_use]
    pub fn with_state_file(mut self, path: impl Into<Utf8PathBuf>) -> Self {
        self.state_file = Some(path.into());
        self
    }

    /// Sets how long after a save completes change delivery resumes.
    #[must_use]
    pub const fn with_resume_delay(mut self, delay: Duration) -> Self {
        self.resume_delay = delay;
        self
    }

    /// Enables or disables arming a watcher on read.
    #[must_use]
    pub const fn with_watching(mut self, enabled: bool) -> Self {
        self.watching = enabled;
        self
    }

    /// Starts the write worker and returns the store.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Spawn`] if the worker thread cannot be started.
    pub fn build(self) -> Result<LocalFileStore, StoreError> {
        let queue = WriteQueue::start(WRITER_THREAD)?;
        let pending = Arc::new(PendingChanges::load(
            self.state_file,
            Arc::clone(&self.signals),
        ));
        Ok(LocalFileStore {
            queue,
            locks: Arc::new(PathLocks::new()),
            pending,
            watcher: Mutex::new(None),
            listener: self.listener,
            signals: self.signals,
            backup: self.backup,
            connectivity: self.connectivity,
            resume_delay: self.resume_delay,
            watching: self.watching,
            loading: AtomicUsize::new(0),
        })
    }
}

/// Task-file store on local storage.
pub struct LocalFileStore {
    queue: WriteQueue,
    locks: Arc<PathLocks>,
    pending: Arc<PendingChanges>,
    watcher: Mutex<Option<TodoWatcher>>,
    listener: Arc<dyn ChangeListener>,
    signals: Arc<dyn SignalSink>,
    backup: Option<Arc<dyn Backup>>,
    connectivity: Arc<dyn ConnectivityProbe>,
    resume_delay: Duration,
    watching: bool,
    loading: AtomicUsize,
}

impl std::fmt::Debug for LocalFileStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalFileStore")
            .field("queue", &self.queue)
            .field("watched_path", &self.watched_path())
            .field("pending", &self.pending_changes())
            .field("resume_delay", &self.resume_delay)
            .finish_non_exhaustive()
    }
}

impl LocalFileStore {
    /// Arms the watcher on `path`.
    ///
    /// Watching the same path again is a no-op; a different path replaces
    /// the current registration after stopping it.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Watch`] if the new watcher cannot be started.
    /// The previous registration is stopped regardless.
    pub fn watch(&self, path: &Utf8Path) -> Result<Rebind, StoreError> {
        let mut slot = self.watcher.lock();

        let previous = match slot.take() {
            Some(current) if current.path() == path => {
                tracing::warn!(path = %path, "Observer: already watching this file");
                *slot = Some(current);
                return Ok(Rebind::AlreadyWatching);
            }
            Some(mut current) => {
                tracing::warn!(
                    previous = %current.path(),
                    path = %path,
                    "Observer: already watching another file, replacing"
                );
                current.begin_suppression();
                current.deactivate();
                Some(current.path().to_owned())
            }
            None => None,
        };

        *slot = Some(TodoWatcher::start(path, Arc::clone(&self.listener))?);
        Ok(match previous {
            Some(previous) => Rebind::Replaced { previous },
            None => Rebind::Started,
        })
    }

    /// Stops watching, if a watcher is armed.
    pub fn unwatch(&self) {
        if let Some(mut current) = self.watcher.lock().take() {
            current.deactivate();
        }
    }

    /// The path currently watched, if any.
    #[must_use]
    pub fn watched_path(&self) -> Option<Utf8PathBuf> {
        self.watcher
            .lock()
            .as_ref()
            .map(|watcher| watcher.path().to_owned())
    }

    /// State of the current watch registration, if any.
    #[must_use]
    pub fn watch_state(&self) -> Option<WatchState> {
        self.watcher.lock().as_ref().map(TodoWatcher::state)
    }

    /// Whether a failed write has not yet been reconciled.
    #[must_use]
    pub fn pending_changes(&self) -> bool {
        self.pending.get()
    }

    /// Clears the pending-changes flag after a successful sync elsewhere.
    pub fn clear_pending_changes(&self) {
        self.pending.set(false);
    }

    /// Returns a receiver that resolves once every queued write has run.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::QueueClosed`] if the write worker is gone.
    pub fn barrier(&self) -> Result<oneshot::Receiver<()>, StoreError> {
        self.queue.barrier()
    }

    /// Blocks until every queued write has run. Not for async contexts.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::QueueClosed`] if the write worker is gone.
    pub fn flush(&self) -> Result<(), StoreError> {
        self.queue.flush()
    }

    /// Delay between a save completing and change delivery resuming.
    #[must_use]
    pub const fn resume_delay(&self) -> Duration {
        self.resume_delay
    }

    fn current_suppression(&self) -> Option<SuppressionHandle> {
        self.watcher.lock().as_ref().map(TodoWatcher::suppression)
    }

    fn backup(&self, path: &Utf8Path, contents: &str) {
        if let Some(backup) = &self.backup {
            backup.backup(path, contents);
        }
    }
}

impl FileStore for LocalFileStore {
    fn kind(&self) -> StoreKind {
        StoreKind::Local
    }

    fn read(&self, path: &Utf8Path) -> Result<FileSnapshot, StoreError> {
        tracing::info!(path = %path, "Loading tasks from file");
        self.loading.fetch_add(1, Ordering::SeqCst);
        let result = self
            .locks
            .with_lock(path, || file_io::read_snapshot(path));
        self.loading.fetch_sub(1, Ordering::SeqCst);

        let snapshot = result?;
        tracing::debug!(path = %path, lines = snapshot.len(), "Loaded tasks");
        self.backup(path, &snapshot.joined());

        if self.watching {
            if let Err(err) = self.watch(path) {
                tracing::warn!(path = %path, error = %err, "Could not watch task file");
            }
        }
        Ok(snapshot)
    }

    fn read_contents(&self, path: &Utf8Path) -> Result<String, StoreError> {
        let snapshot = self
            .locks
            .with_lock(path, || file_io::read_snapshot(path))?;
        Ok(snapshot.joined())
    }

    fn save(&self, path: &Utf8Path, lines: Vec<TaskLine>, eol: LineEnding) {
        tracing::info!(path = %path, lines = lines.len(), "Saving tasks to file");
        self.backup(path, &lines.join("\n"));

        let suppression = self.current_suppression();
        if let Some(handle) = &suppression {
            handle.begin();
        }

        let delay = self.resume_delay;
        let task = {
            let path = path.to_owned();
            let locks = Arc::clone(&self.locks);
            let pending = Arc::clone(&self.pending);
            let suppression = suppression.clone();
            move || {
                let result = locks.with_lock(&path, || {
                    file_io::write_lines(&path, &lines, eol, WriteMode::Overwrite)
                });
                if let Err(err) = result {
                    tracing::error!(path = %path, error = %err, "Saving tasks failed");
                    pending.set(true);
                }
                if let Some(handle) = suppression {
                    handle.resume_after(delay);
                }
            }
        };

        if let Err(err) = self.queue.submit(format!("save {path}"), task) {
            tracing::error!(path = %path, error = %err, "Could not queue save");
            self.pending.set(true);
            if let Some(handle) = suppression {
                handle.resume_after(delay);
            }
        }
    }

    fn append(&self, path: &Utf8Path, lines: Vec<TaskLine>, eol: LineEnding) {
        tracing::info!(path = %path, lines = lines.len(), "Appending tasks to file");

        let task = {
            let path = path.to_owned();
            let locks = Arc::clone(&self.locks);
            let pending = Arc::clone(&self.pending);
            let signals = Arc::clone(&self.signals);
            move || {
                let result = locks.with_lock(&path, || {
                    file_io::write_lines(&path, &lines, eol, WriteMode::Append)
                });
                if let Err(err) = result {
                    tracing::error!(path = %path, error = %err, "Appending tasks failed");
                    pending.set(true);
                }
                signals.emit(StoreSignal::SyncDone);
            }
        };

        if let Err(err) = self.queue.submit(format!("append {path}"), task) {
            tracing::error!(path = %path, error = %err, "Could not queue append");
            self.pending.set(true);
            self.signals.emit(StoreSignal::SyncDone);
        }
    }

    fn supports_remote_sync(&self) -> bool {
        false
    }

    fn has_pending_remote_changes(&self) -> bool {
        false
    }

    fn is_authenticated(&self) -> bool {
        false
    }

    fn is_online(&self) -> bool {
        self.connectivity.is_connected()
    }

    fn sync(&self) {}

    fn is_loading(&self) -> bool {
        self.loading.load(Ordering::SeqCst) > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::io::Write;
    use std::thread;
    use tempfile::TempDir;
    use todofs_watcher::FileEvent;
    use tokio::sync::mpsc;

    /// Time allowed for the OS to deliver notifications.
    const SETTLE: Duration = Duration::from_millis(600);

    /// Short resume delay so suppression tests finish quickly.
    const RESUME: Duration = Duration::from_millis(300);

    struct Fixture {
        _dir: TempDir,
        root: Utf8PathBuf,
        changes: Arc<Mutex<Vec<Utf8PathBuf>>>,
        signals: Arc<Mutex<Vec<StoreSignal>>>,
        backups: Arc<Mutex<Vec<(Utf8PathBuf, String)>>>,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = TempDir::new().expect("create temp dir");
            let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("temp path is UTF-8");
            Self {
                _dir: dir,
                root,
                changes: Arc::default(),
                signals: Arc::default(),
                backups: Arc::default(),
            }
        }

        fn path(&self, name: &str) -> Utf8PathBuf {
            self.root.join(name)
        }

        fn builder(&self) -> StoreBuilder {
            let changes = Arc::clone(&self.changes);
            let listener = Arc::new(move |path: &Utf8Path| changes.lock().push(path.to_owned()));
            let signals = Arc::clone(&self.signals);
            let backups = Arc::clone(&self.backups);
            StoreBuilder::new(listener)
                .with_signals(move |signal: StoreSignal| signals.lock().push(signal))
                .with_backup(RecordingBackup(backups))
                .with_state_file(self.path("state/store-state.json"))
                .with_resume_delay(RESUME)
        }

        fn store(&self) -> LocalFileStore {
            self.builder().build().expect("build store")
        }

        fn change_count(&self) -> usize {
            self.changes.lock().len()
        }
    }

    struct RecordingBackup(Arc<Mutex<Vec<(Utf8PathBuf, String)>>>);

    impl Backup for RecordingBackup {
        fn backup(&self, path: &Utf8Path, contents: &str) {
            self.0.lock().push((path.to_owned(), contents.to_owned()));
        }
    }

    fn lines(items: &[&str]) -> Vec<TaskLine> {
        items.iter().map(|s| (*s).to_owned()).collect()
    }

    fn external_append(path: &Utf8Path, text: &str) {
        let mut file = fs::OpenOptions::new().append(true).open(path).expect("open for append");
        file.write_all(text.as_bytes()).expect("append");
    }

    #[test]
    fn test_save_then_read_round_trips() {
        // Scenario A
        let fx = Fixture::new();
        let store = fx.store();
        let path = fx.path("todo.txt");

        store.save(&path, lines(&["a", "b"]), LineEnding::Lf);
        store.flush().expect("flush write queue");

        assert_eq!(fs::read_to_string(&path).expect("read back file"), "a\nb\n");
        assert_eq!(store.read(&path).expect("read task file").lines(), ["a", "b"]);
        assert!(!store.pending_changes());
    }

    #[test]
    fn test_append_preserves_existing_lines() {
        // Scenario B
        let fx = Fixture::new();
        let store = fx.store();
        let path = fx.path("todo.txt");
        fs::write(&path, "a\n").expect("write fixture file");

        store.append(&path, lines(&["b"]), LineEnding::Lf);
        store.flush().expect("flush write queue");

        assert_eq!(fs::read_to_string(&path).expect("read back file"), "a\nb\n");
        assert!(fx.signals.lock().contains(&StoreSignal::SyncDone));
    }

    #[test]
    fn test_save_then_append_through_queue() {
        let fx = Fixture::new();
        let store = fx.store();
        let path = fx.path("todo.txt");

        store.save(&path, lines(&["a", "b"]), LineEnding::Lf);
        store.append(&path, lines(&["c"]), LineEnding::Lf);
        store.flush().expect("flush write queue");

        assert_eq!(
            store.read(&path).expect("read task file").lines(),
            ["a", "b", "c"]
        );
        assert!(!store.pending_changes());
    }

    #[test]
    fn test_read_never_sees_half_written_save() {
        let fx = Fixture::new();
        let store = Arc::new(fx.builder().with_watching(false).build().expect("build store"));
        let path = fx.path("todo.txt");

        let old: Vec<TaskLine> = (0..1_000).map(|i| format!("old task {i}")).collect();
        let new: Vec<TaskLine> = (0..50_000)
            .map(|i| format!("(B) new task number {i} +project @context"))
            .collect();
        fs::write(&path, LineEnding::Lf.render(&old)).expect("write fixture file");
        let old_contents = old.join("\n");
        let new_contents = new.join("\n");

        let reader = {
            let store = Arc::clone(&store);
            let path = path.clone();
            thread::spawn(move || {
                let mut torn = Vec::new();
                for _ in 0..500 {
                    let contents = store.read_contents(&path).expect("read contents");
                    if contents == new_contents {
                        break;
                    }
                    if contents != old_contents {
                        torn.push(contents.lines().count());
                    }
                }
                torn
            })
        };

        store.save(&path, new.clone(), LineEnding::Lf);
        let torn = reader.join().expect("join thread");
        store.flush().expect("flush write queue");

        assert!(torn.is_empty(), "partial snapshots with line counts {torn:?}");
        assert_eq!(store.read(&path).expect("read task file").into_lines(), new);
    }

    #[test]
    fn test_later_save_wins() {
        // Scenario C
        let fx = Fixture::new();
        let store = Arc::new(fx.store());
        let path = fx.path("todo.txt");

        store.save(&path, lines(&["x"]), LineEnding::Lf);
        let other = Arc::clone(&store);
        let other_path = path.clone();
        thread::spawn(move || other.save(&other_path, lines(&["y"]), LineEnding::Lf))
            .join()
            .expect("join thread");
        store.flush().expect("flush write queue");

        assert_eq!(fs::read_to_string(&path).expect("read back file"), "y\n");
    }

    #[test]
    fn test_writes_apply_in_submission_order() {
        let fx = Fixture::new();
        let store = fx.store();
        let path = fx.path("todo.txt");

        for i in 0..20 {
            store.save(&path, lines(&[format!("round {i}").as_str()]), LineEnding::Lf);
            store.append(&path, lines(&[format!("extra {i}").as_str()]), LineEnding::Lf);
        }
        store.flush().expect("flush write queue");

        assert_eq!(
            fs::read_to_string(&path).expect("read back file"),
            "round 19\nextra 19\n"
        );
    }

    #[test]
    fn test_empty_save_truncates() {
        let fx = Fixture::new();
        let store = fx.store();
        let path = fx.path("todo.txt");
        fs::write(&path, "a\nb\n").expect("write fixture file");

        store.save(&path, Vec::new(), LineEnding::CrLf);
        store.flush().expect("flush write queue");

        assert_eq!(fs::read_to_string(&path).expect("read back file"), "");
        assert!(store.read(&path).expect("read task file").is_empty());
    }

    #[test]
    fn test_read_missing_file_reports_io_failure() {
        let fx = Fixture::new();
        let store = fx.store();

        let err = store.read(&fx.path("missing.txt")).unwrap_err();
        assert!(err.is_io_failure());
        assert!(!store.pending_changes());
        assert!(store.watched_path().is_none());
        assert!(!store.is_loading());
    }

    #[test]
    fn test_failed_save_sets_sticky_pending_flag() {
        let fx = Fixture::new();
        let store = fx.store();
        let blocked = fx.path("blocked.txt");
        fs::create_dir(&blocked).expect("create fixture directory");

        store.save(&blocked, lines(&["x"]), LineEnding::Lf);
        store.flush().expect("flush write queue");
        assert!(store.pending_changes());
        assert!(blocked.is_dir());
        assert!(
            fx.signals
                .lock()
                .contains(&StoreSignal::PendingChangesUpdated(true))
        );

        // A later success does not clear it.
        let good = fx.path("todo.txt");
        store.save(&good, lines(&["ok"]), LineEnding::Lf);
        store.flush().expect("flush write queue");
        assert!(store.pending_changes());

        store.clear_pending_changes();
        assert!(!store.pending_changes());
        assert_eq!(
            fx.signals.lock().last(),
            Some(&StoreSignal::PendingChangesUpdated(false))
        );
    }

    #[test]
    fn test_pending_flag_survives_restart() {
        let fx = Fixture::new();
        let blocked = fx.path("nested/todo.txt");
        fs::write(fx.path("nested"), "a file, not a directory").expect("write fixture file");

        {
            let store = fx.store();
            store.append(&blocked, lines(&["x"]), LineEnding::Lf);
            store.flush().expect("flush write queue");
            assert!(store.pending_changes());
        }

        let restarted = fx.store();
        assert!(restarted.pending_changes());
    }

    #[test]
    fn test_failed_append_still_signals_sync_done() {
        let fx = Fixture::new();
        let store = fx.store();
        let blocked = fx.path("blocked.txt");
        fs::create_dir(&blocked).expect("create fixture directory");

        store.append(&blocked, lines(&["x"]), LineEnding::Lf);
        store.flush().expect("flush write queue");

        let signals = fx.signals.lock();
        assert_eq!(
            *signals,
            [
                StoreSignal::PendingChangesUpdated(true),
                StoreSignal::SyncDone
            ]
        );
    }

    #[test]
    fn test_backup_called_before_save_and_after_read() {
        let fx = Fixture::new();
        let store = fx.builder().with_watching(false).build().expect("build store");
        let path = fx.path("todo.txt");

        store.save(&path, lines(&["a", "b"]), LineEnding::CrLf);
        // The backup is taken synchronously, before the write runs.
        assert_eq!(fx.backups.lock().len(), 1);
        store.flush().expect("flush write queue");
        store.read(&path).expect("read task file");

        let backups = fx.backups.lock();
        assert_eq!(backups[0], (path.clone(), "a\nb".to_owned()));
        assert_eq!(backups[1], (path, "a\nb".to_owned()));
    }

    #[test]
    fn test_capabilities_of_local_store() {
        struct AlwaysOnline;
        impl ConnectivityProbe for AlwaysOnline {
            fn is_connected(&self) -> bool {
                true
            }
        }

        let fx = Fixture::new();
        let store = fx.store();
        assert_eq!(store.kind(), StoreKind::Local);
        assert!(!store.supports_remote_sync());
        assert!(!store.has_pending_remote_changes());
        assert!(!store.is_authenticated());
        assert!(!store.is_online());
        store.sync();

        let online = fx.builder().with_connectivity(AlwaysOnline).build().expect("build store");
        assert!(online.is_online());
    }

    #[test]
    fn test_read_contents_joins_lines() {
        let fx = Fixture::new();
        let store = fx.store();
        let path = fx.path("todo.txt");
        fs::write(&path, "a\r\nb\r\n").expect("write fixture file");

        assert_eq!(store.read_contents(&path).expect("read contents"), "a\nb");
        // Plain content reads do not arm the watcher.
        assert!(store.watched_path().is_none());
    }

    #[test]
    fn test_reading_same_path_twice_keeps_one_registration() {
        let fx = Fixture::new();
        let store = fx.store();
        let path = fx.path("todo.txt");
        fs::write(&path, "a\n").expect("write fixture file");

        store.read(&path).expect("read task file");
        assert_eq!(store.watch(&path).expect("watch task file"), Rebind::AlreadyWatching);
        store.read(&path).expect("read task file");
        assert_eq!(store.watched_path(), Some(path.clone()));

        thread::sleep(Duration::from_millis(100));
        external_append(&path, "b\n");
        thread::sleep(SETTLE);
        assert_eq!(fx.change_count(), 1);
    }

    #[test]
    fn test_switching_files_replaces_registration() {
        let fx = Fixture::new();
        let store = fx.store();
        let first = fx.path("todo.txt");
        let second = fx.path("done.txt");
        fs::write(&first, "a\n").expect("write fixture file");
        fs::write(&second, "b\n").expect("write fixture file");

        assert_eq!(store.watch(&first).expect("watch task file"), Rebind::Started);
        assert_eq!(
            store.watch(&second).expect("watch task file"),
            Rebind::Replaced {
                previous: first.clone()
            }
        );

        thread::sleep(Duration::from_millis(100));
        external_append(&first, "ignored\n");
        thread::sleep(SETTLE);
        assert_eq!(fx.change_count(), 0);

        external_append(&second, "seen\n");
        thread::sleep(SETTLE);
        assert_eq!(*fx.changes.lock(), [second]);
    }

    #[test]
    fn test_external_change_is_reported_once() {
        let fx = Fixture::new();
        let store = fx.store();
        let path = fx.path("todo.txt");
        fs::write(&path, "a\n").expect("write fixture file");
        store.read(&path).expect("read task file");

        thread::sleep(Duration::from_millis(100));
        external_append(&path, "b\n");
        thread::sleep(SETTLE);

        assert_eq!(*fx.changes.lock(), [path]);
    }

    #[test]
    fn test_own_save_is_not_reported() {
        let fx = Fixture::new();
        let store = fx.store();
        let path = fx.path("todo.txt");
        fs::write(&path, "a\n").expect("write fixture file");
        store.read(&path).expect("read task file");
        thread::sleep(Duration::from_millis(100));

        store.save(&path, lines(&["a", "b"]), LineEnding::Lf);
        store.flush().expect("flush write queue");
        assert_eq!(store.watch_state(), Some(WatchState::Suppressed));

        thread::sleep(RESUME / 2);
        assert_eq!(fx.change_count(), 0);

        // After the resume delay, outside edits are delivered again.
        thread::sleep(RESUME);
        assert_eq!(store.watch_state(), Some(WatchState::Active));
        external_append(&path, "c\n");
        thread::sleep(SETTLE);
        assert_eq!(fx.change_count(), 1);
    }

    #[test]
    fn test_own_save_is_not_reported_with_short_resume_delay() {
        let fx = Fixture::new();
        let store = fx
            .builder()
            .with_resume_delay(Duration::from_millis(20))
            .build()
            .expect("build store");
        let path = fx.path("todo.txt");
        fs::write(&path, "a\n").expect("write fixture file");
        store.read(&path).expect("read task file");
        thread::sleep(Duration::from_millis(100));

        store.save(&path, lines(&["b"]), LineEnding::Lf);
        store.flush().expect("flush write queue");
        thread::sleep(SETTLE);

        assert_eq!(fx.change_count(), 0);
        assert_eq!(store.watch_state(), Some(WatchState::Active));
    }

    #[test]
    fn test_queued_saves_stay_suppressed_until_last_completes() {
        let fx = Fixture::new();
        let store = fx.store();
        let path = fx.path("todo.txt");
        fs::write(&path, "a\n").expect("write fixture file");
        store.read(&path).expect("read task file");
        thread::sleep(Duration::from_millis(100));

        for i in 0..5 {
            store.save(&path, lines(&[format!("v{i}").as_str()]), LineEnding::Lf);
        }
        store.flush().expect("flush write queue");
        thread::sleep(SETTLE.min(RESUME) / 2);

        assert_eq!(fx.change_count(), 0);
        assert_eq!(fs::read_to_string(&path).expect("read back file"), "v4\n");
    }

    #[test]
    fn test_append_does_not_suppress_watcher() {
        let fx = Fixture::new();
        let store = fx.store();
        let path = fx.path("todo.txt");
        fs::write(&path, "a\n").expect("write fixture file");
        store.read(&path).expect("read task file");
        thread::sleep(Duration::from_millis(100));

        store.append(&path, lines(&["b"]), LineEnding::Lf);
        store.flush().expect("flush write queue");
        assert_eq!(store.watch_state(), Some(WatchState::Active));

        // The store's own append is seen as a change.
        thread::sleep(SETTLE);
        assert_eq!(fx.change_count(), 1);
    }

    #[test]
    fn test_disabled_watching_never_arms() {
        let fx = Fixture::new();
        let store = fx.builder().with_watching(false).build().expect("build store");
        let path = fx.path("todo.txt");
        fs::write(&path, "a\n").expect("write fixture file");

        store.read(&path).expect("read task file");
        assert!(store.watched_path().is_none());
        assert!(store.watch_state().is_none());
    }

    #[test]
    fn test_unwatch_stops_delivery() {
        let fx = Fixture::new();
        let store = fx.store();
        let path = fx.path("todo.txt");
        fs::write(&path, "a\n").expect("write fixture file");
        store.read(&path).expect("read task file");

        store.unwatch();
        assert!(store.watched_path().is_none());
        external_append(&path, "b\n");
        thread::sleep(SETTLE);
        assert_eq!(fx.change_count(), 0);
    }

    #[test]
    fn test_from_config() {
        let fx = Fixture::new();
        let mut config = Config::default();
        config.store.state_dir = fx.path("state");
        config.store.backup_dir = Some(fx.path("backup"));
        config.watch.resume_delay_ms = 250;

        let (tx, _rx) = mpsc::unbounded_channel::<FileEvent>();
        let store = StoreBuilder::from_config(&config, Arc::new(tx)).build().expect("build store");
        assert_eq!(store.resume_delay(), Duration::from_millis(250));

        let path = fx.path("todo.txt");
        store.save(&path, lines(&["a"]), LineEnding::Lf);
        store.flush().expect("flush write queue");
        assert_eq!(
            fs::read_to_string(fx.path("backup/todo.txt.bak")).expect("read back file"),
            "a"
        );
    }

    #[tokio::test]
    async fn test_external_change_reaches_channel_listener() {
        let fx = Fixture::new();
        let path = fx.path("todo.txt");
        fs::write(&path, "a\n").expect("write fixture file");

        let (tx, mut rx) = mpsc::unbounded_channel::<FileEvent>();
        let store = StoreBuilder::new(Arc::new(tx)).build().expect("build store");
        store.read(&path).expect("read task file");
        tokio::time::sleep(Duration::from_millis(100)).await;

        external_append(&path, "b\n");
        let event = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("timed out")
            .expect("channel closed");
        assert_eq!(event.path, path);

        store.save(&path, lines(&["c"]), LineEnding::Lf);
        store.barrier().expect("queue barrier").await.expect("barrier completes");
        let quiet = tokio::time::timeout(SETTLE, rx.recv()).await;
        assert!(quiet.is_err());
    }
}
