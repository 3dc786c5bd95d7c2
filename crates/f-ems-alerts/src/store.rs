//! ---
//! ems_section: "05-alerting-reconciliation"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Durable alert-state persistence bindings."
//! ems_version: "v0.1.0"
//! ems_owner: "tbd"
//! ---
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::warn;

use crate::state::DurableAlertState;
use crate::Result;

/// Key-value persistence surface for the durable alert-state collection.
///
/// Load-all / save-all semantics: `save` is a total overwrite, never an
/// incremental update, so the persisted collection cannot drift from the
/// in-memory one. The backing medium is swappable without touching the
/// reconciler contract.
pub trait StateStore: Send {
    /// Load the full persisted collection.
    fn load(&self) -> Result<Vec<DurableAlertState>>;
    /// Replace the full persisted collection.
    fn save(&self, states: &[DurableAlertState]) -> Result<()>;
    /// Human-readable store name for logging.
    fn name(&self) -> &'static str;
}

/// JSON file-backed store.
///
/// This is an operator annotation layer, not a system of record: a corrupt
/// file is logged and treated as an empty collection rather than surfaced as
/// an error.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    /// Create a store around the given file path. The file and its parent
    /// directories are created lazily on first save.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl StateStore for JsonFileStore {
    fn load(&self) -> Result<Vec<DurableAlertState>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let contents = fs::read_to_string(&self.path)?;
        match serde_json::from_str(&contents) {
            Ok(states) => Ok(states),
            Err(err) => {
                warn!(
                    path = %self.path.display(),
                    error = %err,
                    "alert state file is corrupt; starting from an empty collection"
                );
                Ok(Vec::new())
            }
        }
    }

    fn save(&self, states: &[DurableAlertState]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let contents = serde_json::to_string_pretty(states)?;
        fs::write(&self.path, contents)?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "json_file"
    }
}

/// In-memory store, primarily for tests and single-process integration.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    states: Mutex<Vec<DurableAlertState>>,
}

impl InMemoryStore {
    /// Create an empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl StateStore for InMemoryStore {
    fn load(&self) -> Result<Vec<DurableAlertState>> {
        let guard = self.states.lock().expect("state store poisoned");
        Ok(guard.clone())
    }

    fn save(&self, states: &[DurableAlertState]) -> Result<()> {
        let mut guard = self.states.lock().expect("state store poisoned");
        *guard = states.to_vec();
        Ok(())
    }

    fn name(&self) -> &'static str {
        "in_memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::AlertStatus;
    use f_ems_model::{AlertKey, AlertKind};
    use tempfile::tempdir;

    fn sample_state() -> DurableAlertState {
        let mut state =
            DurableAlertState::new(AlertKey::new("bess-01", AlertKind::Soc, "low_soc"));
        state.status = AlertStatus::Acknowledged;
        state.acknowledged_by = Some("bob".into());
        state
    }

    #[test]
    fn file_store_roundtrips_total_overwrite() {
        let dir = tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("alerts/state.json"));

        assert!(store.load().unwrap().is_empty());

        store.save(&[sample_state()]).unwrap();
        let loaded = store.load().unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].acknowledged_by.as_deref(), Some("bob"));

        // Saving an empty collection replaces, not appends.
        store.save(&[]).unwrap();
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn corrupt_file_degrades_to_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");
        fs::write(&path, b"{ not json").unwrap();
        let store = JsonFileStore::new(&path);
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn in_memory_store_roundtrips() {
        let store = InMemoryStore::new();
        store.save(&[sample_state()]).unwrap();
        assert_eq!(store.load().unwrap().len(), 1);
        assert_eq!(store.name(), "in_memory");
    }
}
