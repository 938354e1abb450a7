//! GitHub Issues target.
//!
//! Every synced item becomes one issue carrying a marker label
//! (`specbridge:<kind>-id:<local id>`). Each run looks the marker up: a hit is
//! updated in place, a miss is created. The transport (REST or `gh`) sits
//! behind [`IssueRepository`] and is picked from `authMethod` at `init`.

pub mod api;
pub mod body;
pub mod gh_cli;
pub mod repository;

use self::api::ApiIssueRepository;
use self::gh_cli::GhCliIssueRepository;
use self::repository::{IssueDraft, IssueRepository, IssueState, RemoteIssue};
use super::TargetAdapter;
use crate::config::{AuthMethod, GithubConfig, MappingConfig, MappingKind};
use crate::error::{Result, SpecBridgeError};
use crate::model::{Design, FieldChange, Requirement, SyncChange, SyncResult, Task};
use crate::types::{ItemType, SyncAction, TaskStatus};
use chrono::Utc;
use tracing::{debug, info, warn};

pub const PLATFORM: &str = "github";

enum Reconciled {
    Created(SyncChange),
    Updated(SyncChange),
}

pub struct GithubAdapter {
    name: String,
    config: GithubConfig,
    mapping: MappingConfig,
    repo: Option<Box<dyn IssueRepository>>,
}

impl GithubAdapter {
    pub fn new(name: impl Into<String>, config: GithubConfig, mapping: MappingConfig) -> Self {
        Self {
            name: name.into(),
            config,
            mapping,
            repo: None,
        }
    }

    /// Use an already-built transport. `init` then only checks access.
    pub fn with_repository(
        name: impl Into<String>,
        config: GithubConfig,
        mapping: MappingConfig,
        repo: Box<dyn IssueRepository>,
    ) -> Self {
        Self {
            repo: Some(repo),
            ..Self::new(name, config, mapping)
        }
    }

    fn connect(&self) -> Result<Box<dyn IssueRepository>> {
        match self.config.auth_method {
            AuthMethod::Token => {
                let token = self
                    .config
                    .token
                    .as_deref()
                    .filter(|t| !t.trim().is_empty())
                    .ok_or_else(|| {
                        SpecBridgeError::Authentication(format!("{PLATFORM} (no token configured)"))
                    })?;
                Ok(Box::new(ApiIssueRepository::new(&self.config, token)?))
            }
            AuthMethod::GhCli => Ok(Box::new(GhCliIssueRepository::locate(&self.config)?)),
        }
    }

    fn repo(&self) -> Result<&dyn IssueRepository> {
        self.repo.as_deref().ok_or_else(|| {
            SpecBridgeError::adapter(PLATFORM, "target is not initialized; call init first")
        })
    }

    fn reconcile(&self, kind: ItemType, local_id: &str, mut draft: IssueDraft) -> Result<Reconciled> {
        let repo = self.repo()?;
        let marker = body::marker_label(kind, local_id);
        draft.labels.push(marker.clone());

        let Some(existing) = repo.find_by_label(&marker)? else {
            let number = repo.create(&draft)?;
            if draft.state == Some(IssueState::Closed) {
                repo.set_state(number, IssueState::Closed)?;
            }
            debug!(%kind, id = local_id, number, "created issue");
            return Ok(Reconciled::Created(
                SyncChange::new(SyncAction::Created, kind, local_id)
                    .with_remote_id(number.to_string()),
            ));
        };

        let changes = detect_changes(&existing, &draft);
        repo.update(&existing, &draft)?;
        if !changes.is_empty() && self.config.add_comments {
            repo.comment(existing.number, &body::change_comment(&changes, Utc::now()))?;
        }

        let closing =
            draft.state == Some(IssueState::Closed) && existing.state == IssueState::Open;
        let action = if closing {
            SyncAction::Closed
        } else {
            SyncAction::Updated
        };
        debug!(%kind, id = local_id, number = existing.number, %action, "updated issue");
        Ok(Reconciled::Updated(
            SyncChange::new(action, kind, local_id)
                .with_remote_id(existing.number.to_string())
                .with_changes(changes),
        ))
    }
}

/// Title always; assignee when the draft manages it. Bodies are rewritten but not diffed.
fn detect_changes(existing: &RemoteIssue, draft: &IssueDraft) -> Vec<FieldChange> {
    let mut changes = Vec::new();
    if existing.title != draft.title {
        changes.push(FieldChange {
            field: "title".into(),
            old_value: Some(existing.title.clone()),
            new_value: Some(draft.title.clone()),
        });
    }
    if let Some(wanted) = draft.assignee.as_ref().filter(|a| **a != existing.assignee) {
        changes.push(FieldChange {
            field: "assignee".into(),
            old_value: existing.assignee.clone(),
            new_value: wanted.clone(),
        });
    }
    changes
}

fn record(result: &mut SyncResult, kind: ItemType, id: &str, outcome: Result<Reconciled>) {
    match outcome {
        Ok(Reconciled::Created(change)) => {
            result.created += 1;
            result.changes.push(change);
        }
        Ok(Reconciled::Updated(change)) => {
            result.updated += 1;
            result.changes.push(change);
        }
        Err(e) => {
            warn!(%kind, id, error = %e, "item sync failed");
            result.record_error(format!("failed to sync {kind} {id}: {e}"));
        }
    }
}

fn task_draft(task: &Task) -> IssueDraft {
    let state = if task.status.is_done() {
        IssueState::Closed
    } else {
        IssueState::Open
    };
    IssueDraft {
        title: task.title.clone(),
        body: body::task_body(task),
        state: Some(state),
        labels: task.labels.clone(),
        assignee: Some(task.assignee.clone()),
    }
}

/// Requirement issues keep whatever assignee people gave them.
fn requirement_draft(req: &Requirement) -> IssueDraft {
    IssueDraft {
        title: req.title.clone(),
        body: body::requirement_body(req),
        state: None,
        labels: req.labels.clone(),
        assignee: None,
    }
}

impl TargetAdapter for GithubAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    fn init(&mut self) -> Result<()> {
        if self.repo.is_none() {
            self.repo = Some(self.connect()?);
        }
        let repo = self.repo()?;
        repo.validate_access()?;
        info!(
            target_name = %self.name,
            repo = %self.config.slug(),
            transport = repo.transport(),
            "github target ready"
        );
        Ok(())
    }

    fn sync_requirements(&mut self, requirements: &[Requirement]) -> Result<SyncResult> {
        self.repo()?;
        let mut result = SyncResult::new();
        for req in requirements {
            let outcome = self.reconcile(ItemType::Requirement, &req.id, requirement_draft(req));
            record(&mut result, ItemType::Requirement, &req.id, outcome);
        }
        Ok(result)
    }

    fn sync_tasks(&mut self, tasks: &[Task]) -> Result<SyncResult> {
        self.repo()?;
        let mut result = SyncResult::new();
        for task in tasks {
            let outcome = self.reconcile(ItemType::Task, &task.id, task_draft(task));
            record(&mut result, ItemType::Task, &task.id, outcome);
        }
        Ok(result)
    }

    fn supports_design(&self) -> bool {
        self.mapping.design == Some(MappingKind::Issue)
    }

    fn sync_design(&mut self, design: &Design) -> Result<SyncResult> {
        if !self.supports_design() {
            return Err(SpecBridgeError::adapter(
                PLATFORM,
                "design sync is disabled (set mapping.design: issue)",
            ));
        }
        self.repo()?;
        let draft = IssueDraft {
            title: body::design_title(design),
            body: body::design_body(design),
            state: None,
            labels: Vec::new(),
            assignee: None,
        };
        let mut result = SyncResult::new();
        let outcome = self.reconcile(ItemType::Design, &design.spec_name, draft);
        record(&mut result, ItemType::Design, &design.spec_name, outcome);
        Ok(result)
    }

    fn task_status(&mut self, task_id: &str) -> Result<TaskStatus> {
        let marker = body::marker_label(ItemType::Task, task_id);
        let status = match self.repo()?.find_by_label(&marker)? {
            Some(issue) if issue.state == IssueState::Closed => TaskStatus::Done,
            _ => TaskStatus::Todo,
        };
        Ok(status)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
