//! `gh` CLI transport. Every call is an argument vector; nothing goes
//! through a shell.

use super::repository::{IssueDraft, IssueRepository, IssueState, RemoteIssue};
use super::PLATFORM;
use crate::config::GithubConfig;
use crate::error::{Result, SpecBridgeError};
use serde::Deserialize;
use std::ffi::OsString;
use std::io;
use std::path::Path;
use std::process::{Command, Output};
use tracing::debug;

const ISSUE_FIELDS: &str = "number,title,body,state,labels,assignees";

pub trait CommandRunner {
    fn run(&self, program: &str, args: &[OsString], cwd: Option<&Path>) -> io::Result<Output>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessCommandRunner;

impl CommandRunner for ProcessCommandRunner {
    fn run(&self, program: &str, args: &[OsString], cwd: Option<&Path>) -> io::Result<Output> {
        let mut command = Command::new(program);
        command.args(args);
        if let Some(cwd) = cwd {
            command.current_dir(cwd);
        }
        command.output()
    }
}

#[derive(Debug, Deserialize)]
struct GhIssue {
    number: u64,
    title: String,
    #[serde(default)]
    body: Option<String>,
    state: String,
    #[serde(default)]
    labels: Vec<GhLabel>,
    #[serde(default)]
    assignees: Vec<GhUser>,
}

#[derive(Debug, Deserialize)]
struct GhLabel {
    name: String,
}

#[derive(Debug, Deserialize)]
struct GhUser {
    login: String,
}

impl From<GhIssue> for RemoteIssue {
    fn from(issue: GhIssue) -> Self {
        RemoteIssue {
            number: issue.number,
            title: issue.title,
            body: issue.body.unwrap_or_default(),
            state: IssueState::parse(&issue.state).unwrap_or(IssueState::Open),
            labels: issue.labels.into_iter().map(|l| l.name).collect(),
            assignee: issue.assignees.into_iter().next().map(|u| u.login),
        }
    }
}

pub struct GhCliIssueRepository<R: CommandRunner = ProcessCommandRunner> {
    runner: R,
    program: String,
    slug: String,
}

impl GhCliIssueRepository<ProcessCommandRunner> {
    /// Find `gh` on PATH.
    pub fn locate(config: &GithubConfig) -> Result<Self> {
        let program = which::which("gh").map_err(|_| {
            SpecBridgeError::adapter(PLATFORM, "gh CLI is not installed or not in PATH")
        })?;
        Ok(Self::with_runner(
            config,
            program.to_string_lossy().into_owned(),
            ProcessCommandRunner,
        ))
    }
}

impl<R: CommandRunner> GhCliIssueRepository<R> {
    pub fn with_runner(config: &GithubConfig, program: impl Into<String>, runner: R) -> Self {
        Self {
            runner,
            program: program.into(),
            slug: config.slug(),
        }
    }

    fn args<const N: usize>(&self, head: [&str; N]) -> Vec<OsString> {
        head.into_iter().map(OsString::from).collect()
    }

    fn push_repo(&self, args: &mut Vec<OsString>) {
        args.push("--repo".into());
        args.push(self.slug.clone().into());
    }

    /// gh refuses unknown labels; create them up front.
    fn ensure_labels<'a>(&self, labels: impl IntoIterator<Item = &'a String>) -> Result<()> {
        for label in labels {
            let mut args = self.args(["label", "create"]);
            args.push(label.into());
            self.push_repo(&mut args);
            args.push("--force".into());
            self.gh(&args)?;
        }
        Ok(())
    }

    fn gh(&self, args: &[OsString]) -> Result<String> {
        debug!(args = %render_args(args), "running gh");
        let output = self
            .runner
            .run(&self.program, args, None)
            .map_err(|e| SpecBridgeError::adapter(PLATFORM, format!("failed to run gh: {e}")))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(classify_failure(args, stderr.trim()));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl<R: CommandRunner> IssueRepository for GhCliIssueRepository<R> {
    fn transport(&self) -> &'static str {
        "gh-cli"
    }

    fn validate_access(&self) -> Result<()> {
        let mut args = self.args(["repo", "view"]);
        args.push(self.slug.clone().into());
        args.extend(self.args(["--json", "name"]));
        match self.gh(&args) {
            Ok(_) => Ok(()),
            Err(e @ SpecBridgeError::RateLimit { .. }) => Err(e),
            Err(e) => {
                debug!(error = %e, "repository access check failed");
                Err(SpecBridgeError::Authentication(format!(
                    "{PLATFORM} repository {}",
                    self.slug
                )))
            }
        }
    }

    fn find_by_label(&self, label: &str) -> Result<Option<RemoteIssue>> {
        let mut args = self.args(["issue", "list"]);
        self.push_repo(&mut args);
        args.push("--label".into());
        args.push(label.into());
        args.extend(self.args(["--state", "all", "--json", ISSUE_FIELDS, "--limit", "1"]));
        let stdout = self.gh(&args)?;
        let issues: Vec<GhIssue> = serde_json::from_str(&stdout).map_err(|e| {
            SpecBridgeError::adapter(PLATFORM, format!("cannot parse gh output: {e}"))
        })?;
        Ok(issues.into_iter().next().map(RemoteIssue::from))
    }

    fn create(&self, draft: &IssueDraft) -> Result<u64> {
        self.ensure_labels(&draft.labels)?;

        let mut args = self.args(["issue", "create"]);
        self.push_repo(&mut args);
        args.push("--title".into());
        args.push((&draft.title).into());
        args.push("--body".into());
        args.push((&draft.body).into());
        for label in &draft.labels {
            args.push("--label".into());
            args.push(label.into());
        }
        if let Some(Some(assignee)) = &draft.assignee {
            args.push("--assignee".into());
            args.push(assignee.into());
        }
        let stdout = self.gh(&args)?;
        parse_issue_number(&stdout).ok_or_else(|| {
            SpecBridgeError::adapter(
                PLATFORM,
                format!("cannot read issue number from gh output: {}", stdout.trim()),
            )
        })
    }

    fn update(&self, current: &RemoteIssue, draft: &IssueDraft) -> Result<()> {
        let mut args = self.args(["issue", "edit"]);
        args.push(current.number.to_string().into());
        self.push_repo(&mut args);
        args.push("--title".into());
        args.push((&draft.title).into());
        args.push("--body".into());
        args.push((&draft.body).into());
        let added: Vec<&String> = draft
            .labels
            .iter()
            .filter(|l| !current.labels.contains(l))
            .collect();
        for &label in &added {
            args.push("--add-label".into());
            args.push(label.into());
        }
        for label in current.labels.iter().filter(|l| !draft.labels.contains(l)) {
            args.push("--remove-label".into());
            args.push(label.into());
        }
        if let Some(wanted) = draft.assignee.as_ref().filter(|a| **a != current.assignee) {
            if let Some(old) = &current.assignee {
                args.push("--remove-assignee".into());
                args.push(old.into());
            }
            if let Some(new) = wanted {
                args.push("--add-assignee".into());
                args.push(new.into());
            }
        }

        self.ensure_labels(added)?;
        self.gh(&args)?;

        match draft.state {
            Some(state) if state != current.state => self.set_state(current.number, state),
            _ => Ok(()),
        }
    }

    fn set_state(&self, number: u64, state: IssueState) -> Result<()> {
        let verb = match state {
            IssueState::Open => "reopen",
            IssueState::Closed => "close",
        };
        let mut args = self.args(["issue", verb]);
        args.push(number.to_string().into());
        self.push_repo(&mut args);
        self.gh(&args)?;
        Ok(())
    }

    fn comment(&self, number: u64, body: &str) -> Result<()> {
        let mut args = self.args(["issue", "comment"]);
        args.push(number.to_string().into());
        self.push_repo(&mut args);
        args.push("--body".into());
        args.push(body.into());
        self.gh(&args)?;
        Ok(())
    }
}

/// `gh issue create` prints the new issue's URL; its last path segment is the number.
fn parse_issue_number(stdout: &str) -> Option<u64> {
    stdout
        .lines()
        .rev()
        .map(str::trim)
        .find(|l| !l.is_empty())?
        .rsplit('/')
        .next()?
        .parse()
        .ok()
}

fn render_args(args: &[OsString]) -> String {
    args.iter()
        .map(|a| a.to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join(" ")
}

fn classify_failure(args: &[OsString], stderr: &str) -> SpecBridgeError {
    let lower = stderr.to_ascii_lowercase();
    if lower.contains("rate limit") {
        return SpecBridgeError::RateLimit {
            platform: PLATFORM.to_string(),
            retry_after: None,
        };
    }
    if lower.contains("gh auth login") || lower.contains("authentication") {
        return SpecBridgeError::Authentication(PLATFORM.to_string());
    }
    let command: Vec<_> = args
        .iter()
        .take(2)
        .map(|a| a.to_string_lossy().into_owned())
        .collect();
    SpecBridgeError::adapter(
        PLATFORM,
        format!("gh {} failed: {stderr}", command.join(" ")),
    )
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
