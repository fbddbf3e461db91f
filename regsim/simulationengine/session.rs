use std::{fs, path::Path, sync::Arc};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::simulator::SimulationRun;

/// A run together with its identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActiveRun {
    /// Unique identifier.
    pub id: Uuid,
    /// When the run was stored.
    pub created_at: DateTime<Utc>,
    /// The run itself.
    pub run: SimulationRun,
}

impl ActiveRun {
    /// Wraps a freshly generated run.
    #[must_use]
    pub fn new(run: SimulationRun) -> Self {
        Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            run,
        }
    }
}

/// Holds at most one run. Replacing swaps the whole snapshot; readers keep whatever
/// `Arc` they already cloned.
#[derive(Debug, Default)]
pub struct RunStore {
    slot: RwLock<Option<Arc<ActiveRun>>>,
}

impl RunStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs `run` as the active run, discarding the previous one.
    pub fn replace(&self, run: SimulationRun) -> Arc<ActiveRun> {
        let active = Arc::new(ActiveRun::new(run));
        *self.slot.write() = Some(Arc::clone(&active));
        active
    }

    /// Snapshot of the active run, if any.
    #[must_use]
    pub fn current(&self) -> Option<Arc<ActiveRun>> {
        self.slot.read().clone()
    }

    /// Drops the active run.
    pub fn clear(&self) {
        self.slot.write().take();
    }

    /// Writes the active run to `path` as JSON. Does nothing when the store is empty.
    pub fn save_to(&self, path: impl AsRef<Path>) -> Result<()> {
        let Some(active) = self.current() else {
            return Ok(());
        };
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_vec(active.as_ref())?;
        fs::write(path, data).with_context(|| format!("writing session {}", path.display()))?;
        Ok(())
    }

    /// Loads a store from `path`. A missing file gives an empty store, so queries
    /// against it report a missing run rather than an I/O failure.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::new());
        }
        let raw =
            fs::read(path).with_context(|| format!("reading session {}", path.display()))?;
        let active: ActiveRun = serde_json::from_slice(&raw)
            .with_context(|| format!("parsing session {}", path.display()))?;
        active.run.ensure_ready()?;
        Ok(Self {
            slot: RwLock::new(Some(Arc::new(active))),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        data_generator::DataGenerator, error::SimulationError, helper::seeded_rng,
        params::ModelParameters, simulator::Simulator,
    };
    use tempfile::tempdir;

    fn sample_run(seed: u64) -> SimulationRun {
        let params = ModelParameters::builder().n(10).s(20).build().unwrap();
        Simulator::new(DataGenerator::new(params).unwrap(), false, None).run(&mut seeded_rng(seed))
    }

    #[test]
    fn replace_discards_previous_but_keeps_snapshots() {
        let store = RunStore::new();
        assert!(store.current().is_none());
        let first = store.replace(sample_run(1));
        let held = store.current().unwrap();
        let second = store.replace(sample_run(2));
        assert_ne!(first.id, second.id);
        assert_eq!(held.id, first.id);
        assert_eq!(store.current().unwrap().id, second.id);
        store.clear();
        assert!(store.current().is_none());
    }

    #[test]
    fn persists_and_restores() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("sessions/run.json");
        let store = RunStore::new();
        let active = store.replace(sample_run(3));
        store.save_to(&path).unwrap();

        let restored = RunStore::load_from(&path).unwrap();
        assert_eq!(*restored.current().unwrap(), *active);
    }

    #[test]
    fn missing_file_is_empty_store() {
        let dir = tempdir().unwrap();
        let store = RunStore::load_from(dir.path().join("absent.json")).unwrap();
        assert!(store.current().is_none());
    }

    #[test]
    fn rejects_corrupt_session() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("run.json");
        let store = RunStore::new();
        store.replace(sample_run(4));
        store.save_to(&path).unwrap();
        let mut value: serde_json::Value =
            serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
        value["run"]["intercepts"].as_array_mut().unwrap().pop();
        fs::write(&path, serde_json::to_vec(&value).unwrap()).unwrap();
        let err = RunStore::load_from(&path).unwrap_err();
        assert!(err.to_string().contains("run"));
    }

    fn tamper(path: &Path, edit: impl FnOnce(&mut serde_json::Value)) {
        let mut value: serde_json::Value =
            serde_json::from_slice(&fs::read(path).unwrap()).unwrap();
        edit(&mut value);
        fs::write(path, serde_json::to_vec(&value).unwrap()).unwrap();
    }

    #[test]
    fn rejects_session_shorter_than_trial_count() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("run.json");
        let store = RunStore::new();
        store.replace(sample_run(5));
        store.save_to(&path).unwrap();
        tamper(&path, |value| {
            value["run"]["slopes"].as_array_mut().unwrap().pop();
            value["run"]["intercepts"].as_array_mut().unwrap().pop();
        });
        let err = RunStore::load_from(&path).unwrap_err();
        let err = err.downcast_ref::<SimulationError>().unwrap();
        assert_eq!(err.field(), Some("run"));
    }

    #[test]
    fn rejects_session_with_invalid_parameters() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("run.json");
        let store = RunStore::new();
        store.replace(sample_run(6));
        store.save_to(&path).unwrap();
        tamper(&path, |value| value["run"]["params"]["n"] = serde_json::json!(0));
        let err = RunStore::load_from(&path).unwrap_err();
        let err = err.downcast_ref::<SimulationError>().unwrap();
        assert_eq!(err.field(), Some("n"));
    }
}
