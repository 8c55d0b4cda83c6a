//! Self-filtering of raw change notifications.
//!
//! [`SelfFilter`] decides, for every raw event seen in the watched directory,
//! whether the bound listener hears about it. It owns the registration's
//! state machine:
//!
//! ```text
//!            begin_suppression()
//!   Active ───────────────────────► Suppressed
//!     ▲                                 │
//!     └──── resume deadline elapsed ────┘
//!
//!   Active | Suppressed ── stop() ──► Stopped   (terminal)
//! ```
//!
//! The resume deadline is evaluated lazily against the instant passed in, so
//! no timer thread is needed and a newer [`SelfFilter::schedule_resume`]
//! simply replaces the previous deadline.
//!
//! Every [`SelfFilter::begin_suppression`] takes a hold that the matching
//! [`SelfFilter::schedule_resume`] releases. Only the release of the last
//! hold arms the deadline, so a save queued behind another save stays
//! masked until it has completed too.
//!
//! # Examples
//!
//! ```
//! use std::time::{Duration, Instant};
//! use todofs_watcher::{Admission, RawEvent, RawEventKind, SelfFilter, WatchState};
//!
//! let mut filter = SelfFilter::new("todo.txt");
//! let now = Instant::now();
//! let modify = RawEvent::new("todo.txt", RawEventKind::Modify);
//!
//! assert_eq!(filter.admit(&modify, now), Admission::Deliver);
//!
//! filter.begin_suppression();
//! assert_eq!(filter.admit(&modify, now), Admission::Suppressed);
//!
//! filter.schedule_resume(Duration::from_millis(100), now);
//! let later = now + Duration::from_millis(150);
//! assert_eq!(filter.state_at(later), WatchState::Active);
//! assert_eq!(filter.admit(&modify, later), Admission::Deliver);
//! ```

use std::time::{Duration, Instant};

use crate::events::{RawEvent, RawEventBatch};

/// Lifecycle state of a watch registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WatchState {
    /// Qualifying events for the bound file reach the listener.
    Active,
    /// Events are dropped until the resume deadline passes.
    Suppressed,
    /// The registration was deactivated; nothing is delivered again.
    Stopped,
}

/// Outcome of offering one raw event to a [`SelfFilter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Admission {
    /// The listener should be notified.
    Deliver,
    /// The event concerns another file in the directory.
    OtherFile,
    /// The event kind never triggers notifications.
    IgnoredKind,
    /// The registration is inside a suppression window.
    Suppressed,
    /// The registration is stopped.
    Stopped,
}

impl Admission {
    /// Returns `true` for [`Admission::Deliver`].
    #[inline]
    #[must_use]
    pub const fn is_deliver(self) -> bool {
        matches!(self, Self::Deliver)
    }
}

/// Suppression bookkeeping: flag, outstanding holds, resume deadline.
#[derive(Debug, Default, Clone, Copy)]
struct Suppression {
    engaged: bool,
    holds: u32,
    resume_at: Option<Instant>,
}

impl Suppression {
    fn is_active_at(&self, now: Instant) -> bool {
        self.engaged && (self.holds > 0 || self.resume_at.is_none_or(|at| now < at))
    }
}

/// Filter and state machine for one watch registration.
#[derive(Debug)]
pub struct SelfFilter {
    file_name: String,
    stopped: bool,
    suppression: Suppression,
}

impl SelfFilter {
    /// Creates an active filter bound to `file_name` (a base name, not a path).
    #[must_use]
    pub fn new(file_name: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
            stopped: false,
            suppression: Suppression::default(),
        }
    }

    /// Returns the base name this filter is bound to.
    #[inline]
    #[must_use]
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Returns the state as of `now`.
    #[must_use]
    pub fn state_at(&self, now: Instant) -> WatchState {
        if self.stopped {
            WatchState::Stopped
        } else if self.suppression.is_active_at(now) {
            WatchState::Suppressed
        } else {
            WatchState::Active
        }
    }

    /// Enters (or extends) a suppression window.
    ///
    /// Any pending resume deadline is cancelled until the matching
    /// [`schedule_resume`](Self::schedule_resume).
    pub fn begin_suppression(&mut self) {
        if self.stopped {
            return;
        }
        let s = &mut self.suppression;
        s.engaged = true;
        s.holds = s.holds.saturating_add(1);
        s.resume_at = None;
        tracing::debug!(file = %self.file_name, holds = s.holds, "Observer: ignoring events");
    }

    /// Releases one suppression hold and (re)schedules the resume deadline.
    ///
    /// The deadline replaces any earlier one. While other holds remain
    /// outstanding the registration stays suppressed regardless.
    pub fn schedule_resume(&mut self, delay: Duration, now: Instant) {
        if self.stopped {
            return;
        }
        let s = &mut self.suppression;
        if !s.engaged {
            tracing::debug!(file = %self.file_name, "Observer: resume requested while active");
            return;
        }
        s.holds = s.holds.saturating_sub(1);
        s.resume_at = Some(now + delay);
        tracing::debug!(
            file = %self.file_name,
            holds = s.holds,
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            "Observer: delayed enabling of events"
        );
    }

    /// Stops the registration permanently.
    pub fn stop(&mut self) {
        self.stopped = true;
        self.suppression = Suppression::default();
    }

    /// Decides whether `event` reaches the listener.
    ///
    /// An elapsed suppression window is cleared as a side effect.
    pub fn admit(&mut self, event: &RawEvent, now: Instant) -> Admission {
        self.settle(now);
        if self.stopped {
            return Admission::Stopped;
        }
        if event.file_name != self.file_name {
            return Admission::OtherFile;
        }
        if !event.kind.is_qualifying() {
            return Admission::IgnoredKind;
        }
        if self.suppression.engaged {
            tracing::info!(file = %self.file_name, kind = ?event.kind, "Observer: ignored event");
            return Admission::Suppressed;
        }
        Admission::Deliver
    }

    /// Drops every event of `batch` that does not reach the listener.
    ///
    /// Events are judged against the state at `batch.received_at`, so a
    /// window that closes after they arrived does not let them through.
    /// Returns the number of events kept.
    pub fn admit_batch(&mut self, batch: &mut RawEventBatch) -> usize {
        let at = batch.received_at;
        batch.retain(|event| self.admit(event, at).is_deliver());
        batch.len()
    }

    /// Clears an elapsed suppression window.
    fn settle(&mut self, now: Instant) {
        if self.suppression.engaged && !self.suppression.is_active_at(now) {
            self.suppression = Suppression::default();
            tracing::info!(file = %self.file_name, "Observer: events enabled");
        }
    }
}
