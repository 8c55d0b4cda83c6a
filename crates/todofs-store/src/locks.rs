//! Per-path mutual exclusion between reads and queued writes.

use std::sync::Arc;

use camino::{Utf8Path, Utf8PathBuf};
use parking_lot::Mutex;
use rustc_hash::FxHashMap;

/// Table of one lock per task-file path.
///
/// Paths are keyed as given; callers should use a consistent spelling for
/// the same file.
#[derive(Debug, Default)]
pub struct PathLocks {
    locks: Mutex<FxHashMap<Utf8PathBuf, Arc<Mutex<()>>>>,
}

impl PathLocks {
    /// Creates an empty lock table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the lock guarding `path`, creating it on first use.
    pub fn for_path(&self, path: &Utf8Path) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock();
        if let Some(lock) = locks.get(path) {
            return Arc::clone(lock);
        }
        let lock = Arc::new(Mutex::new(()));
        locks.insert(path.to_owned(), Arc::clone(&lock));
        lock
    }

    /// Runs `f` while holding the lock for `path`.
    pub fn with_lock<T>(&self, path: &Utf8Path, f: impl FnOnce() -> T) -> T {
        let lock = self.for_path(path);
        let _guard = lock.lock();
        f()
    }

    /// Number of distinct paths seen so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.locks.lock().len()
    }

    /// Returns `true` if no path has been locked yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.locks.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_path_shares_lock() {
        let locks = PathLocks::new();
        let a = locks.for_path(Utf8Path::new("todo.txt"));
        let b = locks.for_path(Utf8Path::new("todo.txt"));
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(locks.len(), 1);
    }

    #[test]
    fn test_different_paths_do_not_contend() {
        let locks = PathLocks::new();
        let todo = locks.for_path(Utf8Path::new("todo.txt"));
        let _held = todo.lock();
        // Would deadlock if both paths mapped to one lock.
        let done = locks.with_lock(Utf8Path::new("done.txt"), || 42);
        assert_eq!(done, 42);
        assert!(todo.try_lock().is_none());
    }
}
