//! Sync orchestration: parse once, then push the scoped data to every target.
//!
//! A failing target never stops the others; its error becomes a failed
//! [`SyncResult`] under its name.

use crate::error::Result;
use crate::model::{EpicStatus, SpecData, SyncResult};
use crate::source::SourceAdapter;
use crate::target::TargetAdapter;
use crate::types::{ItemType, SyncScope};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::Path;
use tracing::{debug, error, info};

#[derive(Debug, Clone, Default)]
pub struct SyncOptions {
    /// `None` syncs tasks only.
    pub scope: Option<SyncScope>,
    /// Item id for [`SyncScope::Single`].
    pub item_id: Option<String>,
    pub dry_run: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineState {
    Idle,
    Syncing,
    Error,
}

/// One result produced for one target. A target yields one entry per synced
/// item kind, or a single entry (`item_type: None`) for dry runs and failures.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TargetResult {
    pub target: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item_type: Option<ItemType>,
    pub result: SyncResult,
}

impl TargetResult {
    fn new(target: &str, item_type: Option<ItemType>, result: SyncResult) -> Self {
        Self {
            target: target.to_string(),
            item_type,
            result,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyncStatus {
    pub state: EngineState,
    pub last_sync: Option<DateTime<Utc>>,
    pub results: Vec<TargetResult>,
    /// Task rollup of the most recently parsed spec data.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub epic: Option<EpicStatus>,
}

#[derive(Debug)]
pub struct SyncEngine {
    status: SyncStatus,
    history: Vec<TargetResult>,
}

impl Default for SyncEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl SyncEngine {
    pub fn new() -> Self {
        Self {
            status: SyncStatus {
                state: EngineState::Idle,
                last_sync: None,
                results: Vec::new(),
                epic: None,
            },
            history: Vec::new(),
        }
    }

    /// Parse `path` with `source` and sync the result to every target.
    ///
    /// Only a parse failure is returned as `Err`; target failures are folded
    /// into the returned results.
    pub fn sync(
        &mut self,
        source: &dyn SourceAdapter,
        path: &Path,
        targets: &mut [Box<dyn TargetAdapter>],
        opts: &SyncOptions,
    ) -> Result<Vec<TargetResult>> {
        self.status = SyncStatus {
            state: EngineState::Syncing,
            last_sync: self.status.last_sync,
            results: Vec::new(),
            epic: None,
        };
        debug!(
            source = source.name(),
            targets = targets.len(),
            scope = ?opts.scope,
            dry_run = opts.dry_run,
            "starting sync"
        );

        let data = match source.parse(path) {
            Ok(data) => data,
            Err(e) => {
                error!(error = %e, "sync aborted: parse failed");
                self.status = SyncStatus {
                    state: EngineState::Error,
                    last_sync: Some(Utc::now()),
                    results: Vec::new(),
                    epic: None,
                };
                return Err(e);
            }
        };

        let filtered = filter_by_scope(&data, opts);
        debug!(
            requirements = filtered.requirements.len(),
            tasks = filtered.tasks.len(),
            "filtered spec data"
        );

        let mut results = Vec::new();
        for target in targets.iter_mut() {
            let name = target.name().to_string();
            if opts.dry_run {
                info!(target_name = %name, "[dry run] would sync");
                results.push(TargetResult::new(&name, None, SyncResult::new()));
                continue;
            }
            if let Err(e) = sync_target(target.as_mut(), &filtered, opts.scope, &mut results) {
                error!(target_name = %name, error = %e, "target sync failed");
                results.push(TargetResult::new(&name, None, SyncResult::failure(e.to_string())));
            }
        }

        self.history.extend(results.iter().cloned());
        let failed = results.iter().any(|r| !r.result.success);
        self.status = SyncStatus {
            state: if failed {
                EngineState::Error
            } else {
                EngineState::Idle
            },
            last_sync: Some(Utc::now()),
            results: results.clone(),
            epic: data.epic_status.clone(),
        };
        debug!(results = results.len(), failed, "sync finished");
        Ok(results)
    }

    pub fn status(&self) -> SyncStatus {
        self.status.clone()
    }

    pub fn history(&self) -> Vec<TargetResult> {
        self.history.clone()
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
    }
}

/// Init one target and run the syncs `scope` asks for, appending results to `out`.
fn sync_target(
    target: &mut dyn TargetAdapter,
    data: &SpecData,
    scope: Option<SyncScope>,
    out: &mut Vec<TargetResult>,
) -> Result<()> {
    target.init()?;
    let name = target.name().to_string();

    let wants_requirements = matches!(
        scope,
        Some(SyncScope::All | SyncScope::Requirements | SyncScope::Single)
    );
    let wants_tasks = matches!(
        scope,
        None | Some(SyncScope::All | SyncScope::Tasks | SyncScope::Single)
    );

    if wants_requirements && !data.requirements.is_empty() {
        debug!(target_name = %name, count = data.requirements.len(), "syncing requirements");
        let result = target.sync_requirements(&data.requirements)?;
        out.push(TargetResult::new(&name, Some(ItemType::Requirement), result));
    }

    if wants_tasks && !data.tasks.is_empty() {
        debug!(target_name = %name, count = data.tasks.len(), "syncing tasks");
        let result = target.sync_tasks(&data.tasks)?;
        out.push(TargetResult::new(&name, Some(ItemType::Task), result));
    }

    if scope == Some(SyncScope::All) && target.supports_design() {
        if let Some(design) = &data.design {
            debug!(target_name = %name, "syncing design");
            let result = target.sync_design(design)?;
            out.push(TargetResult::new(&name, Some(ItemType::Design), result));
        }
    }
    Ok(())
}

/// Copy only the item kinds `opts` asks for. The design is always kept.
pub fn filter_by_scope(data: &SpecData, opts: &SyncOptions) -> SpecData {
    let scope = opts.scope.unwrap_or(SyncScope::All);
    if scope == SyncScope::All {
        return data.clone();
    }

    let mut filtered = SpecData::empty(data.meta.clone());
    filtered.design = data.design.clone();
    filtered.epic_title = data.epic_title.clone();
    filtered.epic_description = data.epic_description.clone();
    filtered.epic_status = data.epic_status.clone();

    match scope {
        SyncScope::Requirements => filtered.requirements = data.requirements.clone(),
        SyncScope::Tasks => filtered.tasks = data.tasks.clone(),
        SyncScope::Single => {
            if let Some(id) = opts.item_id.as_deref() {
                filtered.requirements = data
                    .requirements
                    .iter()
                    .find(|r| r.id == id)
                    .cloned()
                    .into_iter()
                    .collect();
                filtered.tasks = data
                    .tasks
                    .iter()
                    .find(|t| t.id == id)
                    .cloned()
                    .into_iter()
                    .collect();
            }
        }
        SyncScope::All => {}
    }
    filtered
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
