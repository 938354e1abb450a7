//! GitHub REST v3 transport.

use super::repository::{IssueDraft, IssueRepository, IssueState, RemoteIssue};
use super::PLATFORM;
use crate::config::GithubConfig;
use crate::error::{Result, SpecBridgeError};
use chrono::Utc;
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header::{HeaderMap, ACCEPT, RETRY_AFTER};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::debug;

const API_VERSION: &str = "2022-11-28";
const USER_AGENT: &str = concat!("specbridge/", env!("CARGO_PKG_VERSION"));

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct ApiIssue {
    number: u64,
    title: String,
    #[serde(default)]
    body: Option<String>,
    state: String,
    #[serde(default)]
    labels: Vec<ApiLabel>,
    #[serde(default)]
    assignee: Option<ApiUser>,
}

#[derive(Debug, Deserialize)]
struct ApiLabel {
    name: String,
}

#[derive(Debug, Deserialize)]
struct ApiUser {
    login: String,
}

#[derive(Debug, Deserialize)]
struct CreatedIssue {
    number: u64,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: String,
}

#[derive(Debug, Serialize)]
struct IssuePayload<'a> {
    title: &'a str,
    body: &'a str,
    labels: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    assignees: Option<Vec<&'a str>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    state: Option<IssueState>,
}

impl<'a> IssuePayload<'a> {
    fn from_draft(draft: &'a IssueDraft, state: Option<IssueState>) -> Self {
        Self {
            title: &draft.title,
            body: &draft.body,
            labels: &draft.labels,
            assignees: draft
                .assignee
                .as_ref()
                .map(|a| a.iter().map(String::as_str).collect()),
            state,
        }
    }
}

#[derive(Debug, Serialize)]
struct StatePayload {
    state: IssueState,
}

#[derive(Debug, Serialize)]
struct CommentPayload<'a> {
    body: &'a str,
}

impl From<ApiIssue> for RemoteIssue {
    fn from(issue: ApiIssue) -> Self {
        RemoteIssue {
            number: issue.number,
            title: issue.title,
            body: issue.body.unwrap_or_default(),
            state: IssueState::parse(&issue.state).unwrap_or(IssueState::Open),
            labels: issue.labels.into_iter().map(|l| l.name).collect(),
            assignee: issue.assignee.map(|u| u.login),
        }
    }
}

// ---------------------------------------------------------------------------
// ApiIssueRepository
// ---------------------------------------------------------------------------

pub struct ApiIssueRepository {
    client: Client,
    base_url: String,
    owner: String,
    repo: String,
    token: String,
}

impl ApiIssueRepository {
    pub fn new(config: &GithubConfig, token: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(request_failed)?;
        Ok(Self {
            client,
            base_url: config.api_url.trim_end_matches('/').to_string(),
            owner: config.owner.clone(),
            repo: config.repo.clone(),
            token: token.into(),
        })
    }

    fn repo_url(&self, suffix: &str) -> String {
        format!(
            "{}/repos/{}/{}{suffix}",
            self.base_url, self.owner, self.repo
        )
    }

    fn send(&self, request: RequestBuilder) -> Result<Response> {
        let response = request
            .bearer_auth(&self.token)
            .header(ACCEPT, "application/vnd.github+json")
            .header("X-GitHub-Api-Version", API_VERSION)
            .send()
            .map_err(request_failed)?;
        check_status(response)
    }
}

impl IssueRepository for ApiIssueRepository {
    fn transport(&self) -> &'static str {
        "api"
    }

    fn validate_access(&self) -> Result<()> {
        match self.send(self.client.get(self.repo_url(""))) {
            Ok(_) => Ok(()),
            Err(e @ SpecBridgeError::RateLimit { .. }) => Err(e),
            Err(e) => {
                debug!(error = %e, "repository access check failed");
                Err(SpecBridgeError::Authentication(format!(
                    "{PLATFORM} repository {}/{}",
                    self.owner, self.repo
                )))
            }
        }
    }

    fn find_by_label(&self, label: &str) -> Result<Option<RemoteIssue>> {
        let request = self
            .client
            .get(self.repo_url("/issues"))
            .query(&[("labels", label), ("state", "all"), ("per_page", "1")]);
        let issues: Vec<ApiIssue> = self.send(request)?.json().map_err(request_failed)?;
        Ok(issues.into_iter().next().map(RemoteIssue::from))
    }

    fn create(&self, draft: &IssueDraft) -> Result<u64> {
        let request = self
            .client
            .post(self.repo_url("/issues"))
            .json(&IssuePayload::from_draft(draft, None));
        let created: CreatedIssue = self.send(request)?.json().map_err(request_failed)?;
        debug!(number = created.number, title = %draft.title, "issue created");
        Ok(created.number)
    }

    fn update(&self, current: &RemoteIssue, draft: &IssueDraft) -> Result<()> {
        let request = self
            .client
            .patch(self.repo_url(&format!("/issues/{}", current.number)))
            .json(&IssuePayload::from_draft(draft, draft.state));
        self.send(request)?;
        Ok(())
    }

    fn set_state(&self, number: u64, state: IssueState) -> Result<()> {
        let request = self
            .client
            .patch(self.repo_url(&format!("/issues/{number}")))
            .json(&StatePayload { state });
        self.send(request)?;
        Ok(())
    }

    fn comment(&self, number: u64, body: &str) -> Result<()> {
        let request = self
            .client
            .post(self.repo_url(&format!("/issues/{number}/comments")))
            .json(&CommentPayload { body });
        self.send(request)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Status mapping
// ---------------------------------------------------------------------------

fn request_failed(e: reqwest::Error) -> SpecBridgeError {
    SpecBridgeError::adapter(PLATFORM, format!("request failed: {e}"))
}

fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if status == StatusCode::UNAUTHORIZED {
        return Err(SpecBridgeError::Authentication(PLATFORM.to_string()));
    }
    let headers = response.headers();
    let exhausted = header_u64(headers, "x-ratelimit-remaining") == Some(0);
    if status == StatusCode::TOO_MANY_REQUESTS || (status == StatusCode::FORBIDDEN && exhausted) {
        return Err(SpecBridgeError::RateLimit {
            platform: PLATFORM.to_string(),
            retry_after: retry_after_secs(headers),
        });
    }

    let message = response
        .json::<ApiErrorBody>()
        .map(|b| b.message)
        .unwrap_or_else(|_| status.canonical_reason().unwrap_or("unknown error").to_string());
    Err(SpecBridgeError::adapter(
        PLATFORM,
        format!("HTTP {}: {message}", status.as_u16()),
    ))
}

fn header_u64(headers: &HeaderMap, name: &str) -> Option<u64> {
    headers.get(name)?.to_str().ok()?.trim().parse().ok()
}

/// Seconds to wait: `Retry-After` when given, else time until `X-RateLimit-Reset`.
fn retry_after_secs(headers: &HeaderMap) -> Option<u64> {
    if let Some(secs) = header_u64(headers, RETRY_AFTER.as_str()) {
        return Some(secs);
    }
    let reset = header_u64(headers, "x-ratelimit-reset")?;
    let now = u64::try_from(Utc::now().timestamp()).unwrap_or(0);
    Some(reset.saturating_sub(now))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
