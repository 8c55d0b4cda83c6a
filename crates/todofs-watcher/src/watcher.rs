//! Watch registration bridging `notify` to a [`ChangeListener`].
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────┐   admitted     ┌─────────────────────────────┐
//! │ RecommendedWatcher       │    batches     │ Consumer thread             │
//! │ (parent dir, non-recur.) │ ─────────────► │ batch window → merge        │
//! │ callback: SelfFilter     │                │ → ChangeListener (≤1/batch) │
//! └──────────────────────────┘                └─────────────────────────────┘
//!                 ▲                                         ▲
//!                 │ lock on arrival, drop on deactivate()   │ lock
//!                 │                                         │
//!          ┌──────┴──────────────────────────────────────────┴──┐
//!          │ TodoWatcher / SuppressionHandle (Arc<Mutex<SelfFilter>>) │
//!          └─────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use camino::Utf8Path;
//! use todofs_watcher::TodoWatcher;
//!
//! # fn example() -> Result<(), todofs_watcher::WatchError> {
//! let listener = Arc::new(|path: &Utf8Path| println!("changed: {path}"));
//! let watcher = TodoWatcher::start(Utf8Path::new("/home/me/todo.txt"), listener)?;
//!
//! // Mask our own write.
//! watcher.begin_suppression();
//! std::fs::write("/home/me/todo.txt", "(A) call mom\n")?;
//! watcher.delayed_resume(Duration::from_secs(1));
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use camino::{Utf8Path, Utf8PathBuf};
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::error::WatchError;
use crate::events::{FileEvent, RawEventBatch};
use crate::filter::{SelfFilter, WatchState};

/// How long the consumer keeps collecting after the first event of a batch.
///
/// A single external save produces several raw events (modify, close-write)
/// within microseconds; they are reported as one change.
const BATCH_WINDOW: Duration = Duration::from_millis(50);

/// Receives change notifications for the watched file.
///
/// Called from the registration's consumer thread, never while the
/// registration is suppressed or stopped.
///
/// # Examples
///
/// ```
/// use camino::Utf8Path;
/// use todofs_watcher::ChangeListener;
///
/// struct Reload;
///
/// impl ChangeListener for Reload {
///     fn on_file_changed(&self, path: &Utf8Path) {
///         println!("reload {path}");
///     }
/// }
/// ```
pub trait ChangeListener: Send + Sync + 'static {
    /// The watched file was modified by someone else.
    fn on_file_changed(&self, path: &Utf8Path);
}

impl<F> ChangeListener for F
where
    F: Fn(&Utf8Path) + Send + Sync + 'static,
{
    fn on_file_changed(&self, path: &Utf8Path) {
        self(path);
    }
}

impl ChangeListener for mpsc::UnboundedSender<FileEvent> {
    fn on_file_changed(&self, path: &Utf8Path) {
        if self.send(FileEvent::new(path.to_owned())).is_err() {
            tracing::debug!(path = %path, "Change receiver dropped");
        }
    }
}

/// Cloneable handle for suppressing a registration from another thread.
///
/// The store takes one before queueing a save and resumes through it from
/// the write worker once the save has completed.
#[derive(Debug, Clone)]
pub struct SuppressionHandle {
    path: Utf8PathBuf,
    filter: Arc<Mutex<SelfFilter>>,
}

impl SuppressionHandle {
    /// Returns the path of the registration this handle controls.
    #[must_use]
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    /// Enters a suppression window.
    pub fn begin(&self) {
        self.filter.lock().begin_suppression();
    }

    /// Resumes delivery once `delay` has elapsed from now.
    pub fn resume_after(&self, delay: Duration) {
        self.filter.lock().schedule_resume(delay, Instant::now());
    }

    /// Returns the current state of the registration.
    #[must_use]
    pub fn state(&self) -> WatchState {
        self.filter.lock().state_at(Instant::now())
    }
}

/// A watch registration binding one file path to one listener.
///
/// The OS watch covers the file's parent directory, so the file may be
/// created, replaced or renamed into place while watched.
///
/// # Lifecycle
///
/// 1. **Creation**: [`TodoWatcher::start`] validates the path, arms the
///    notify watcher and spawns the consumer thread.
/// 2. **Suppression**: [`begin_suppression`](Self::begin_suppression) and
///    [`delayed_resume`](Self::delayed_resume) mask self-caused writes.
/// 3. **Shutdown**: [`deactivate`](Self::deactivate), or drop. The notify
///    watcher is dropped, which closes the channel and ends the consumer.
pub struct TodoWatcher {
    /// The watched file as given by the caller.
    path: Utf8PathBuf,

    /// Canonical directory the OS watch is placed on.
    watch_dir: Utf8PathBuf,

    /// Shared filter state.
    filter: Arc<Mutex<SelfFilter>>,

    /// The notify watcher. `None` after deactivation.
    watcher: Option<RecommendedWatcher>,

    /// Consumer thread handle, used only to report liveness.
    consumer: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for TodoWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TodoWatcher")
            .field("path", &self.path)
            .field("watch_dir", &self.watch_dir)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl TodoWatcher {
    /// Starts watching `path` and returns the active registration.
    ///
    /// The file itself need not exist yet; its parent directory must.
    ///
    /// # Errors
    ///
    /// Returns [`WatchError::InvalidPath`] if `path` has no file name,
    /// [`WatchError::PathNotFound`] if the parent directory is missing, and
    /// [`WatchError::Notify`] if the OS watch cannot be placed.
    pub fn start(path: &Utf8Path, listener: Arc<dyn ChangeListener>) -> Result<Self, WatchError> {
        let file_name = path
            .file_name()
            .ok_or_else(|| WatchError::invalid_path(path))?;

        let parent = match path.parent() {
            Some(parent) if !parent.as_str().is_empty() => parent,
            _ => Utf8Path::new("."),
        };
        if !parent.is_dir() {
            return Err(WatchError::path_not_found(parent));
        }
        let watch_dir = parent.canonicalize_utf8()?;

        let filter = Arc::new(Mutex::new(SelfFilter::new(file_name)));
        let (batch_tx, batch_rx) = mpsc::unbounded_channel();

        let arrival_filter = Arc::clone(&filter);
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
            let received_at = Instant::now();
            let event = match res {
                Ok(event) => event,
                Err(error) => {
                    tracing::warn!(error = %error, "Watcher error");
                    return;
                }
            };
            // Judged on arrival: later suppression changes must not affect it.
            let mut batch = RawEventBatch::from_notify(&event, received_at);
            if arrival_filter.lock().admit_batch(&mut batch) > 0 {
                // The receiver is gone once the consumer has exited.
                let _ = batch_tx.send(batch);
            }
        })?;
        watcher.watch(watch_dir.as_std_path(), RecursiveMode::NonRecursive)?;

        let consumer = {
            let path = path.to_owned();
            let filter = Arc::clone(&filter);
            std::thread::Builder::new()
                .name(format!("todofs-watch:{file_name}"))
                .spawn(move || run_consumer(&path, batch_rx, &filter, listener.as_ref()))?
        };

        tracing::info!(path = %path, dir = %watch_dir, "Observer: watching");

        Ok(Self {
            path: path.to_owned(),
            watch_dir,
            filter,
            watcher: Some(watcher),
            consumer: Some(consumer),
        })
    }

    /// Returns the watched file path as given to [`start`](Self::start).
    #[must_use]
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    /// Returns the directory the OS watch is placed on.
    #[must_use]
    pub fn watch_dir(&self) -> &Utf8Path {
        &self.watch_dir
    }

    /// Returns the current state of the registration.
    #[must_use]
    pub fn state(&self) -> WatchState {
        self.filter.lock().state_at(Instant::now())
    }

    /// Returns a handle that can suppress and resume this registration.
    #[must_use]
    pub fn suppression(&self) -> SuppressionHandle {
        SuppressionHandle {
            path: self.path.clone(),
            filter: Arc::clone(&self.filter),
        }
    }

    /// Enters a suppression window; see [`SelfFilter::begin_suppression`].
    pub fn begin_suppression(&self) {
        self.filter.lock().begin_suppression();
    }

    /// Schedules the end of the suppression window `delay` from now.
    pub fn delayed_resume(&self, delay: Duration) {
        self.filter.lock().schedule_resume(delay, Instant::now());
    }

    /// Stops the registration. Idempotent.
    ///
    /// No notification is delivered after this returns, except possibly one
    /// that was already being dispatched on the consumer thread.
    pub fn deactivate(&mut self) {
        self.filter.lock().stop();
        if self.watcher.take().is_some() {
            tracing::info!(path = %self.path, "Observer: stopped watching");
        }
    }

    /// Returns `true` while the OS watch is armed and the consumer alive.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.watcher.is_some() && self.consumer.as_ref().is_some_and(|h| !h.is_finished())
    }
}

impl Drop for TodoWatcher {
    fn drop(&mut self) {
        // The consumer is not joined: it may be inside a listener that is
        // waiting on whoever is dropping us.
        self.deactivate();
    }
}

/// Coalesces admitted batches and notifies the listener once per window.
///
/// Runs until the notify watcher (the only sender) is dropped.
fn run_consumer(
    path: &Utf8Path,
    mut batch_rx: mpsc::UnboundedReceiver<RawEventBatch>,
    filter: &Mutex<SelfFilter>,
    listener: &dyn ChangeListener,
) {
    while let Some(mut batch) = batch_rx.blocking_recv() {
        std::thread::sleep(BATCH_WINDOW);
        while let Ok(next) = batch_rx.try_recv() {
            batch.merge(next);
        }

        if filter.lock().state_at(Instant::now()) == WatchState::Stopped {
            break;
        }
        tracing::info!(
            path = %path,
            events = batch.len(),
            waited_ms = u64::try_from(batch.received_at.elapsed().as_millis()).unwrap_or(u64::MAX),
            "File changed"
        );
        listener.on_file_changed(path);
    }
    tracing::debug!(path = %path, "Observer consumer exited");
}
