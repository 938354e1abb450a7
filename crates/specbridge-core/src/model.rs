//! Unified data model shared by source parsers and target adapters.
//!
//! Sources turn their input into a [`SpecData`]; targets consume it and report
//! back with [`SyncResult`]s.

use crate::types::{ItemType, SyncAction, TaskStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const DEFAULT_SPEC_VERSION: &str = "1.0.0";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpecMeta {
    pub name: String,
    pub version: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SpecMeta {
    pub fn new(name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            name: name.into(),
            version: DEFAULT_SPEC_VERSION.to_string(),
            created_at: now,
            updated_at: now,
        }
    }
}

// ---------------------------------------------------------------------------
// Requirement / Task / Design
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Requirement {
    pub id: String,
    pub title: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sync_id: Option<String>,
}

impl Requirement {
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            description: description.into(),
            priority: None,
            labels: Vec::new(),
            sync_id: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub status: TaskStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sync_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spec_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spec_path: Option<String>,
}

impl Task {
    pub fn new(id: impl Into<String>, title: impl Into<String>, status: TaskStatus) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            description: None,
            status,
            assignee: None,
            parent_id: None,
            labels: Vec::new(),
            sync_id: None,
            spec_name: None,
            spec_path: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DesignSection {
    pub heading: String,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Design {
    /// Full markdown, front matter removed.
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sections: Vec<DesignSection>,
    /// Spec directory the document was read from.
    pub spec_name: String,
}

// ---------------------------------------------------------------------------
// EpicStatus
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EpicState {
    Todo,
    InProgress,
    Done,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpicStatus {
    pub status: EpicState,
    /// Completion percentage, 0..=100.
    pub progress: u8,
    pub total: usize,
    pub completed: usize,
    pub in_progress: usize,
    pub todo: usize,
}

impl EpicStatus {
    /// Roll task statuses up into an epic status. Blocked tasks count toward
    /// the total only.
    pub fn from_tasks(tasks: &[Task]) -> Self {
        let total = tasks.len();
        let completed = tasks.iter().filter(|t| t.status == TaskStatus::Done).count();
        let in_progress = tasks
            .iter()
            .filter(|t| t.status == TaskStatus::InProgress)
            .count();
        let todo = tasks.iter().filter(|t| t.status == TaskStatus::Todo).count();

        let status = if total > 0 && completed == total {
            EpicState::Done
        } else if completed == 0 && in_progress == 0 {
            EpicState::Todo
        } else {
            EpicState::InProgress
        };
        let progress = if total == 0 {
            0
        } else {
            ((completed * 100) / total) as u8
        };

        Self {
            status,
            progress,
            total,
            completed,
            in_progress,
            todo,
        }
    }
}

// ---------------------------------------------------------------------------
// SpecData
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpecData {
    pub meta: SpecMeta,
    pub requirements: Vec<Requirement>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub design: Option<Design>,
    pub tasks: Vec<Task>,
    pub epic_title: String,
    /// Raw requirements.md content of every merged spec.
    pub epic_description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub epic_status: Option<EpicStatus>,
}

impl SpecData {
    pub fn empty(meta: SpecMeta) -> Self {
        Self {
            meta,
            requirements: Vec::new(),
            design: None,
            tasks: Vec::new(),
            epic_title: String::new(),
            epic_description: String::new(),
            epic_status: None,
        }
    }
}

// ---------------------------------------------------------------------------
// SyncChange / SyncResult
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldChange {
    pub field: String,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncChange {
    pub timestamp: DateTime<Utc>,
    pub action: SyncAction,
    pub item_type: ItemType,
    pub item_id: String,
    /// Platform identifier of the remote item, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_id: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub changes: Vec<FieldChange>,
}

impl SyncChange {
    pub fn new(action: SyncAction, item_type: ItemType, item_id: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            action,
            item_type,
            item_id: item_id.into(),
            remote_id: None,
            changes: Vec::new(),
        }
    }

    pub fn with_remote_id(mut self, remote_id: impl Into<String>) -> Self {
        self.remote_id = Some(remote_id.into());
        self
    }

    pub fn with_changes(mut self, changes: Vec<FieldChange>) -> Self {
        self.changes = changes;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncResult {
    pub success: bool,
    pub created: usize,
    pub updated: usize,
    pub failed: usize,
    pub changes: Vec<SyncChange>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

impl Default for SyncResult {
    fn default() -> Self {
        Self {
            success: true,
            created: 0,
            updated: 0,
            failed: 0,
            changes: Vec::new(),
            errors: Vec::new(),
        }
    }
}

impl SyncResult {
    /// A successful result with zero counts.
    pub fn new() -> Self {
        Self::default()
    }

    /// A result standing in for a whole target that failed.
    pub fn failure(message: impl Into<String>) -> Self {
        let mut result = Self::new();
        result.record_error(message);
        result
    }

    pub fn record_error(&mut self, message: impl Into<String>) {
        self.success = false;
        self.failed += 1;
        self.errors.push(message.into());
    }

    /// Fold `other` into `self`: counts add up, lists concatenate, success ANDs.
    pub fn merge(&mut self, other: SyncResult) {
        self.success = self.success && other.success;
        self.created += other.created;
        self.updated += other.updated;
        self.failed += other.failed;
        self.changes.extend(other.changes);
        self.errors.extend(other.errors);
    }

    pub fn merged(results: impl IntoIterator<Item = SyncResult>) -> SyncResult {
        let mut merged = SyncResult::new();
        for r in results {
            merged.merge(r);
        }
        merged
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
