//! Event types for file change notifications.
//!
//! # Event Flow
//!
//! ```text
//! notify::Event (any file in the watched directory)
//!        │
//!        ▼
//!   RawEvent { file_name, kind }   one per path in the notify event
//!        │
//!        ▼
//!   RawEventBatch                  stamped with its arrival instant
//!        │
//!        ▼
//!   SelfFilter::admit_batch        basename + kind + suppression state on arrival
//!        │
//!        ▼
//!   RawEventBatch::merge           survivors of one batching window
//!        │
//!        ▼
//!   ChangeListener / FileEvent
//! ```

use std::time::Instant;

use camino::Utf8PathBuf;
use notify::EventKind;
use notify::event::{AccessKind, AccessMode, ModifyKind, RenameMode};
use smallvec::SmallVec;

/// The kinds of raw change notification the watcher distinguishes.
///
/// Only [`CloseWrite`](Self::CloseWrite), [`Modify`](Self::Modify) and
/// [`MovedTo`](Self::MovedTo) can reach the listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RawEventKind {
    /// A file opened for writing was closed.
    CloseWrite,
    /// File contents were modified.
    Modify,
    /// A file was moved or renamed into place.
    MovedTo,
    /// Anything else (open, read, metadata, create, delete, move-from).
    Other,
}

impl RawEventKind {
    /// Maps a notify event kind onto the watcher's raw kinds.
    ///
    /// # Examples
    ///
    /// ```
    /// use notify::EventKind;
    /// use notify::event::{AccessKind, AccessMode, CreateKind};
    /// use todofs_watcher::RawEventKind;
    ///
    /// let close = EventKind::Access(AccessKind::Close(AccessMode::Write));
    /// assert_eq!(RawEventKind::classify(&close), RawEventKind::CloseWrite);
    ///
    /// let create = EventKind::Create(CreateKind::File);
    /// assert_eq!(RawEventKind::classify(&create), RawEventKind::Other);
    /// ```
    #[must_use]
    pub const fn classify(kind: &EventKind) -> Self {
        match kind {
            EventKind::Access(AccessKind::Close(AccessMode::Write)) => Self::CloseWrite,
            EventKind::Modify(ModifyKind::Data(_) | ModifyKind::Any) => Self::Modify,
            // inotify reports a completed rename as `To` followed by `Both`;
            // only `To` counts so one rename yields one raw event.
            EventKind::Modify(ModifyKind::Name(RenameMode::To | RenameMode::Any)) => {
                Self::MovedTo
            }
            _ => Self::Other,
        }
    }

    /// Returns `true` if this kind can trigger a change notification.
    #[inline]
    #[must_use]
    pub const fn is_qualifying(self) -> bool {
        !matches!(self, Self::Other)
    }
}

/// One raw notification for one file in the watched directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEvent {
    /// Base name of the file the notification is about.
    pub file_name: String,
    /// What happened to it.
    pub kind: RawEventKind,
}

impl RawEvent {
    /// Creates a raw event.
    #[inline]
    #[must_use]
    pub fn new(file_name: impl Into<String>, kind: RawEventKind) -> Self {
        Self {
            file_name: file_name.into(),
            kind,
        }
    }

    /// Splits a notify event into one raw event per affected path.
    ///
    /// Paths without a UTF-8 file name are logged and skipped.
    #[must_use]
    pub fn from_notify(event: &notify::Event) -> SmallVec<[Self; 2]> {
        let kind = RawEventKind::classify(&event.kind);
        event
            .paths
            .iter()
            .filter_map(|path| {
                let Some(name) = path.file_name() else {
                    return None;
                };
                if let Some(name) = name.to_str() {
                    Some(Self::new(name, kind))
                } else {
                    tracing::warn!(
                        path = %path.display(),
                        "Skipping non-UTF-8 path in file event"
                    );
                    None
                }
            })
            .collect()
    }
}

/// Raw events that arrived together.
///
/// The watcher builds one batch per notify event, filters it on arrival and
/// merges the survivors of one batching window before notifying.
#[derive(Debug, Clone)]
pub struct RawEventBatch {
    /// The events in arrival order.
    pub events: SmallVec<[RawEvent; 8]>,

    /// When the earliest event of the batch was received from the OS.
    pub received_at: Instant,
}

impl RawEventBatch {
    /// Creates an empty batch stamped with `received_at`.
    #[inline]
    #[must_use]
    pub fn new(received_at: Instant) -> Self {
        Self {
            events: SmallVec::new(),
            received_at,
        }
    }

    /// Splits a notify event received at `received_at` into a batch.
    #[must_use]
    pub fn from_notify(event: &notify::Event, received_at: Instant) -> Self {
        Self {
            events: RawEvent::from_notify(event).into_iter().collect(),
            received_at,
        }
    }

    /// Adds a single event.
    #[inline]
    pub fn push(&mut self, event: RawEvent) {
        self.events.push(event);
    }

    /// Moves the events of `later` to the end of this batch.
    ///
    /// The batch keeps the earlier of the two arrival instants.
    pub fn merge(&mut self, later: Self) {
        self.received_at = self.received_at.min(later.received_at);
        self.events.extend(later.events);
    }

    /// Keeps only the events for which `keep` returns `true`.
    pub fn retain(&mut self, keep: impl FnMut(&mut RawEvent) -> bool) {
        self.events.retain(keep);
    }

    /// Returns the number of events in this batch.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Returns `true` if the batch contains no events.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Returns an iterator over the events.
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &RawEvent> {
        self.events.iter()
    }
}

/// A change notification delivered to channel-based listeners.
///
/// # Examples
///
/// ```
/// use todofs_watcher::FileEvent;
/// use camino::Utf8PathBuf;
///
/// let event = FileEvent::new(Utf8PathBuf::from("/home/me/todo.txt"));
/// assert_eq!(event.file_name(), Some("todo.txt"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEvent {
    /// The watched path that changed.
    pub path: Utf8PathBuf,

    /// When the change was delivered.
    pub timestamp: Instant,
}

impl FileEvent {
    /// Creates a new file event stamped with the current instant.
    #[inline]
    #[must_use]
    pub fn new(path: Utf8PathBuf) -> Self {
        Self {
            path,
            timestamp: Instant::now(),
        }
    }

    /// Returns the file name without the directory path.
    #[inline]
    #[must_use]
    pub fn file_name(&self) -> Option<&str> {
        self.path.file_name()
    }
}
