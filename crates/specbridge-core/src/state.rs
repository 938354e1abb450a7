use crate::error::Result;
use crate::io;
use crate::paths;
use crate::types::SyncScope;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

// ---------------------------------------------------------------------------
// SyncState
// ---------------------------------------------------------------------------

/// Persisted map from local item id (`user-auth:1.2`) to remote id (`42`).
///
/// Loaded once at the start of a run and written once at the end. There is
/// no locking; concurrent runs race and the last writer wins.
#[derive(Debug, Clone)]
pub struct SyncState {
    path: PathBuf,
    entries: BTreeMap<String, String>,
}

impl SyncState {
    pub fn new(root: &Path) -> Self {
        Self {
            path: paths::sync_state_path(root),
            entries: BTreeMap::new(),
        }
    }

    /// Load the state file under `root`. Absent or corrupt files yield an empty map.
    pub fn load(root: &Path) -> Self {
        let mut state = Self::new(root);
        match io::read_optional(&state.path) {
            Ok(Some(data)) => match serde_json::from_str::<BTreeMap<String, String>>(&data) {
                Ok(entries) => state.entries = entries,
                Err(e) => warn!(
                    path = %state.path.display(),
                    error = %e,
                    "sync state is corrupt; starting empty"
                ),
            },
            Ok(None) => debug!(path = %state.path.display(), "no sync state yet"),
            Err(e) => warn!(
                path = %state.path.display(),
                error = %e,
                "cannot read sync state; starting empty"
            ),
        }
        state
    }

    pub fn save(&self) -> Result<()> {
        let data = serde_json::to_string_pretty(&self.entries)?;
        io::atomic_write(&self.path, data.as_bytes())?;
        debug!(path = %self.path.display(), entries = self.entries.len(), "sync state saved");
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get_sync_id(&self, item_id: &str) -> Option<&str> {
        self.entries.get(item_id).map(String::as_str)
    }

    pub fn set_sync_id(&mut self, item_id: impl Into<String>, sync_id: impl Into<String>) {
        self.entries.insert(item_id.into(), sync_id.into());
    }

    pub fn remove(&mut self, item_id: &str) -> Option<String> {
        self.entries.remove(item_id)
    }

    pub fn all(&self) -> &BTreeMap<String, String> {
        &self.entries
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn has_synced(&self, item_id: &str) -> bool {
        self.entries.contains_key(item_id)
    }

    pub fn synced_count(&self) -> usize {
        self.entries.len()
    }
}

// ---------------------------------------------------------------------------
// LastRun
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetSummary {
    pub name: String,
    pub created: usize,
    pub updated: usize,
    pub failed: usize,
}

/// Summary of the most recent `sync`, shown by `status`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LastRun {
    pub finished_at: DateTime<Utc>,
    pub scope: SyncScope,
    pub dry_run: bool,
    pub targets: Vec<TargetSummary>,
}

impl LastRun {
    pub fn load(root: &Path) -> Result<Option<Self>> {
        let Some(data) = io::read_optional(&paths::last_run_path(root))? else {
            return Ok(None);
        };
        Ok(Some(serde_json::from_str(&data)?))
    }

    pub fn save(&self, root: &Path) -> Result<()> {
        let data = serde_json::to_string_pretty(self)?;
        io::atomic_write(&paths::last_run_path(root), data.as_bytes())
    }

    pub fn total_failed(&self) -> usize {
        self.targets.iter().map(|t| t.failed).sum()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
