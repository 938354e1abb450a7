use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueState {
    Open,
    Closed,
}

impl IssueState {
    pub fn as_str(self) -> &'static str {
        match self {
            IssueState::Open => "open",
            IssueState::Closed => "closed",
        }
    }

    /// Accepts both REST (`open`) and `gh` (`OPEN`) spellings.
    pub fn parse(s: &str) -> Option<IssueState> {
        match s.to_ascii_lowercase().as_str() {
            "open" => Some(IssueState::Open),
            "closed" => Some(IssueState::Closed),
            _ => None,
        }
    }
}

impl fmt::Display for IssueState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An issue as currently stored on the platform.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteIssue {
    pub number: u64,
    pub title: String,
    pub body: String,
    pub state: IssueState,
    pub labels: Vec<String>,
    pub assignee: Option<String>,
}

/// Desired content of an issue.
#[derive(Debug, Clone, PartialEq)]
pub struct IssueDraft {
    pub title: String,
    pub body: String,
    /// `None` leaves the state alone.
    pub state: Option<IssueState>,
    pub labels: Vec<String>,
    /// `None` leaves assignees alone; `Some(None)` clears them.
    pub assignee: Option<Option<String>>,
}

/// Narrow view of a GitHub repository's issues. Implemented once per
/// transport; reconciliation code only sees this trait.
pub trait IssueRepository {
    /// Short transport name for logs (`api`, `gh-cli`).
    fn transport(&self) -> &'static str;

    /// Confirm the repository is reachable with the configured credentials.
    fn validate_access(&self) -> Result<()>;

    /// First issue (any state) carrying `label`.
    fn find_by_label(&self, label: &str) -> Result<Option<RemoteIssue>>;

    /// Create an open issue and return its number. `draft.state` is ignored.
    fn create(&self, draft: &IssueDraft) -> Result<u64>;

    /// Overwrite title, body and labels of `current`. Labels not in the draft
    /// are removed. Assignee and state change only when the draft sets them.
    fn update(&self, current: &RemoteIssue, draft: &IssueDraft) -> Result<()>;

    fn set_state(&self, number: u64, state: IssueState) -> Result<()>;

    fn comment(&self, number: u64, body: &str) -> Result<()>;
}
