use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// TaskStatus
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Todo,
    InProgress,
    Done,
    Blocked,
}

impl TaskStatus {
    /// Map a tasks.md checkbox character to a status.
    ///
    /// `~` (queued) collapses into `Todo`; there is no queued status.
    pub fn from_checkbox(marker: char) -> Option<TaskStatus> {
        match marker {
            ' ' | '~' => Some(TaskStatus::Todo),
            'x' => Some(TaskStatus::Done),
            '-' => Some(TaskStatus::InProgress),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Todo => "todo",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Done => "done",
            TaskStatus::Blocked => "blocked",
        }
    }

    pub fn is_done(self) -> bool {
        matches!(self, TaskStatus::Done)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// SyncAction / ItemType
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncAction {
    Created,
    Updated,
    Closed,
}

impl SyncAction {
    pub fn as_str(self) -> &'static str {
        match self {
            SyncAction::Created => "created",
            SyncAction::Updated => "updated",
            SyncAction::Closed => "closed",
        }
    }
}

impl fmt::Display for SyncAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemType {
    Requirement,
    Task,
    Design,
}

impl ItemType {
    pub fn as_str(self) -> &'static str {
        match self {
            ItemType::Requirement => "requirement",
            ItemType::Task => "task",
            ItemType::Design => "design",
        }
    }

    /// Short kind used inside marker labels (`specbridge:<kind>-id:<id>`).
    pub fn marker_kind(self) -> &'static str {
        match self {
            ItemType::Requirement => "req",
            ItemType::Task => "task",
            ItemType::Design => "design",
        }
    }
}

impl fmt::Display for ItemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// SyncScope
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncScope {
    All,
    Requirements,
    Tasks,
    Single,
}

impl SyncScope {
    pub fn as_str(self) -> &'static str {
        match self {
            SyncScope::All => "all",
            SyncScope::Requirements => "requirements",
            SyncScope::Tasks => "tasks",
            SyncScope::Single => "single",
        }
    }
}

impl fmt::Display for SyncScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SyncScope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all" => Ok(SyncScope::All),
            "requirements" => Ok(SyncScope::Requirements),
            "tasks" => Ok(SyncScope::Tasks),
            "single" => Ok(SyncScope::Single),
            _ => Err(format!(
                "unknown scope '{s}' (expected all, requirements, tasks or single)"
            )),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
