//! The persisted "local changes pending" flag.
//!
//! Set when a write fails, cleared only by an explicit external call. The
//! value survives restarts in a small JSON state file:
//!
//! ```json
//! {"local_changes_pending": true}
//! ```

use std::fs;
use std::sync::Arc;

use camino::{Utf8Path, Utf8PathBuf};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::collaborators::{SignalSink, StoreSignal};
use crate::error::StoreError;

#[derive(Debug, Default, Serialize, Deserialize)]
struct PersistedState {
    #[serde(default)]
    local_changes_pending: bool,
}

/// Thread-safe pending-changes flag with optional persistence.
pub struct PendingChanges {
    state_file: Option<Utf8PathBuf>,
    pending: Mutex<bool>,
    signals: Arc<dyn SignalSink>,
}

impl std::fmt::Debug for PendingChanges {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingChanges")
            .field("state_file", &self.state_file)
            .field("pending", &self.get())
            .finish_non_exhaustive()
    }
}

impl PendingChanges {
    /// Loads the flag from `state_file`, if any.
    ///
    /// A missing file means `false`; an unreadable or corrupt one is logged
    /// and treated the same.
    pub fn load(state_file: Option<Utf8PathBuf>, signals: Arc<dyn SignalSink>) -> Self {
        let pending = match state_file.as_deref().map(read_state) {
            Some(Ok(state)) => state.local_changes_pending,
            Some(Err(err)) => {
                tracing::warn!(error = %err, "Ignoring unreadable store state");
                false
            }
            None => false,
        };
        Self {
            state_file,
            pending: Mutex::new(pending),
            signals,
        }
    }

    /// Returns the current value.
    #[must_use]
    pub fn get(&self) -> bool {
        *self.pending.lock()
    }

    /// Sets the flag, persists it and announces the new value.
    pub fn set(&self, pending: bool) {
        if pending {
            tracing::info!("Local changes are pending");
        }
        {
            let mut current = self.pending.lock();
            *current = pending;
            let persisted = match &self.state_file {
                Some(path) => write_state(path, pending),
                None => Ok(()),
            };
            if let Err(err) = persisted {
                tracing::error!(error = %err, "Failed to persist pending-changes flag");
            }
        }
        self.signals.emit(StoreSignal::PendingChangesUpdated(pending));
    }

    /// Returns the state file, if persistence is enabled.
    #[must_use]
    pub fn state_file(&self) -> Option<&Utf8Path> {
        self.state_file.as_deref()
    }
}

fn read_state(path: &Utf8Path) -> Result<PersistedState, StoreError> {
    match fs::read_to_string(path) {
        Ok(contents) => serde_json::from_str(&contents).map_err(|source| {
            StoreError::StateFormat {
                path: path.to_owned(),
                source,
            }
        }),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(PersistedState::default()),
        Err(err) => Err(StoreError::state(path, err)),
    }
}

fn write_state(path: &Utf8Path, pending: bool) -> Result<(), StoreError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| StoreError::state(path, e))?;
    }
    let state = PersistedState {
        local_changes_pending: pending,
    };
    let json = serde_json::to_string_pretty(&state).map_err(|source| StoreError::StateFormat {
        path: path.to_owned(),
        source,
    })?;
    fs::write(path, json).map_err(|e| StoreError::state(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::NoSignals;
    use tempfile::TempDir;

    fn state_path(dir: &TempDir) -> Utf8PathBuf {
        Utf8PathBuf::from_path_buf(dir.path().join("state/store-state.json")).expect("temp path is UTF-8")
    }

    #[test]
    fn test_defaults_to_false_without_file() {
        let dir = TempDir::new().expect("create temp dir");
        let pending = PendingChanges::load(Some(state_path(&dir)), Arc::new(NoSignals));
        assert!(!pending.get());

        let memory_only = PendingChanges::load(None, Arc::new(NoSignals));
        assert!(!memory_only.get());
        assert!(memory_only.state_file().is_none());
    }

    #[test]
    fn test_set_persists_across_loads() {
        let dir = TempDir::new().expect("create temp dir");
        let path = state_path(&dir);

        let first = PendingChanges::load(Some(path.clone()), Arc::new(NoSignals));
        first.set(true);
        assert!(first.get());

        let second = PendingChanges::load(Some(path.clone()), Arc::new(NoSignals));
        assert!(second.get());
        second.set(false);

        let third = PendingChanges::load(Some(path), Arc::new(NoSignals));
        assert!(!third.get());
    }

    #[test]
    fn test_state_file_format() {
        let dir = TempDir::new().expect("create temp dir");
        let path = state_path(&dir);
        PendingChanges::load(Some(path.clone()), Arc::new(NoSignals)).set(true);

        let json: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).expect("read back file")).expect("valid JSON");
        insta::assert_json_snapshot!(json, @r#"
        {
          "local_changes_pending": true
        }
        "#);
    }

    #[test]
    fn test_corrupt_state_is_ignored() {
        let dir = TempDir::new().expect("create temp dir");
        let path = state_path(&dir);
        fs::create_dir_all(path.parent().expect("state file has a parent")).expect("create state dir");
        fs::write(&path, "not json").expect("write fixture file");

        let pending = PendingChanges::load(Some(path), Arc::new(NoSignals));
        assert!(!pending.get());
    }

    #[test]
    fn test_every_set_is_announced() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = {
            let seen = Arc::clone(&seen);
            move |signal: StoreSignal| seen.lock().push(signal)
        };
        let pending = PendingChanges::load(None, Arc::new(sink));
        pending.set(true);
        pending.set(true);
        pending.set(false);

        assert_eq!(
            *seen.lock(),
            [
                StoreSignal::PendingChangesUpdated(true),
                StoreSignal::PendingChangesUpdated(true),
                StoreSignal::PendingChangesUpdated(false),
            ]
        );
    }
}
