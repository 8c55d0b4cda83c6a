//! Serial write queue backed by one dedicated worker thread.
//!
//! Tasks run one at a time in submission order. Submitting never blocks:
//! the channel is unbounded and the worker drains it with `blocking_recv`.
//!
//! # Examples
//!
//! ```
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use todofs_store::WriteQueue;
//!
//! # fn main() -> Result<(), todofs_store::StoreError> {
//! let queue = WriteQueue::start("example-writer")?;
//! let counter = Arc::new(AtomicUsize::new(0));
//!
//! for _ in 0..3 {
//!     let counter = Arc::clone(&counter);
//!     queue.submit("bump", move || {
//!         counter.fetch_add(1, Ordering::SeqCst);
//!     })?;
//! }
//!
//! queue.flush()?;
//! assert_eq!(counter.load(Ordering::SeqCst), 3);
//! # Ok(())
//! # }
//! ```

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Barrier};
use std::thread::JoinHandle;

use tokio::sync::{mpsc, oneshot};

use crate::error::StoreError;

type Task = Box<dyn FnOnce() + Send + 'static>;

struct Job {
    description: String,
    task: Task,
}

/// Counters shared with the worker.
#[derive(Debug, Default)]
struct QueueStats {
    submitted: AtomicU64,
    completed: AtomicU64,
    panicked: AtomicU64,
}

/// A FIFO of file mutations executed by a single worker thread.
pub struct WriteQueue {
    name: String,
    job_tx: Option<mpsc::UnboundedSender<Job>>,
    worker: Option<JoinHandle<()>>,
    stats: Arc<QueueStats>,
}

impl std::fmt::Debug for WriteQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WriteQueue")
            .field("name", &self.name)
            .field("submitted", &self.len_submitted())
            .field("completed", &self.completed())
            .finish_non_exhaustive()
    }
}

impl WriteQueue {
    /// Spawns the worker thread and waits until it is running.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Spawn`] if the thread cannot be created.
    pub fn start(name: impl Into<String>) -> Result<Self, StoreError> {
        let name = name.into();
        let (job_tx, job_rx) = mpsc::unbounded_channel();
        let stats = Arc::new(QueueStats::default());
        let ready = Arc::new(Barrier::new(2));

        let worker = {
            let stats = Arc::clone(&stats);
            let ready = Arc::clone(&ready);
            let name = name.clone();
            std::thread::Builder::new()
                .name(name.clone())
                .spawn(move || {
                    ready.wait();
                    run_worker(&name, job_rx, &stats);
                })
                .map_err(StoreError::Spawn)?
        };
        ready.wait();

        tracing::debug!(queue = %name, "Write queue worker started");

        Ok(Self {
            name,
            job_tx: Some(job_tx),
            worker: Some(worker),
            stats,
        })
    }

    /// Returns the worker thread name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Enqueues `task`; returns immediately.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::QueueClosed`] if the worker is gone.
    pub fn submit<F>(&self, description: impl Into<String>, task: F) -> Result<(), StoreError>
    where
        F: FnOnce() + Send + 'static,
    {
        let description = description.into();
        tracing::debug!(queue = %self.name, task = %description, "Queueing task");
        let job_tx = self.job_tx.as_ref().ok_or(StoreError::QueueClosed)?;
        job_tx
            .send(Job {
                description,
                task: Box::new(task),
            })
            .map_err(|_| StoreError::QueueClosed)?;
        self.stats.submitted.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Returns a receiver that resolves once every task submitted before
    /// this call has run.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::QueueClosed`] if the worker is gone.
    pub fn barrier(&self) -> Result<oneshot::Receiver<()>, StoreError> {
        let (done_tx, done_rx) = oneshot::channel();
        self.submit("barrier", move || {
            // The waiter may have given up.
            let _ = done_tx.send(());
        })?;
        Ok(done_rx)
    }

    /// Blocks until every task submitted so far has run.
    ///
    /// Must not be called from inside an async runtime; await
    /// [`barrier`](Self::barrier) there instead.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::QueueClosed`] if the worker exits first.
    pub fn flush(&self) -> Result<(), StoreError> {
        self.barrier()?
            .blocking_recv()
            .map_err(|_| StoreError::QueueClosed)
    }

    /// Number of tasks accepted so far.
    #[must_use]
    pub fn len_submitted(&self) -> u64 {
        self.stats.submitted.load(Ordering::Relaxed)
    }

    /// Number of tasks that have finished running, panicked ones included.
    #[must_use]
    pub fn completed(&self) -> u64 {
        self.stats.completed.load(Ordering::Relaxed)
    }

    /// Number of tasks that panicked.
    #[must_use]
    pub fn panicked(&self) -> u64 {
        self.stats.panicked.load(Ordering::Relaxed)
    }

    /// Stops accepting tasks, runs what is queued and joins the worker.
    pub fn shutdown(mut self) {
        self.job_tx.take();
        let Some(worker) = self.worker.take() else {
            return;
        };
        if worker.join().is_err() {
            tracing::error!(queue = %self.name, "Write queue worker panicked");
        }
    }
}

impl Drop for WriteQueue {
    fn drop(&mut self) {
        // Closing the channel lets the worker drain and exit on its own.
        self.job_tx.take();
    }
}

fn run_worker(name: &str, mut job_rx: mpsc::UnboundedReceiver<Job>, stats: &QueueStats) {
    while let Some(Job { description, task }) = job_rx.blocking_recv() {
        tracing::trace!(queue = %name, task = %description, "Running task");
        if panic::catch_unwind(AssertUnwindSafe(task)).is_err() {
            stats.panicked.fetch_add(1, Ordering::Relaxed);
            tracing::error!(queue = %name, task = %description, "Queued task panicked");
        }
        stats.completed.fetch_add(1, Ordering::Relaxed);
    }
    tracing::debug!(queue = %name, "Write queue worker exiting");
}
