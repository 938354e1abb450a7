//! Target adapters push parsed spec items to a project-management platform.

pub mod github;

use crate::config::{PlatformConfig, TargetConfig};
use crate::error::{Result, SpecBridgeError};
use crate::model::{Design, Requirement, SyncResult, Task};
use crate::types::TaskStatus;

pub use github::GithubAdapter;

pub trait TargetAdapter {
    /// Name of the configured target (e.g. `github-issues`).
    fn name(&self) -> &str;

    /// Validate credentials and connectivity. Must succeed before any sync call.
    fn init(&mut self) -> Result<()>;

    fn sync_requirements(&mut self, requirements: &[Requirement]) -> Result<SyncResult>;

    fn sync_tasks(&mut self, tasks: &[Task]) -> Result<SyncResult>;

    /// Whether [`TargetAdapter::sync_design`] does anything for this target.
    fn supports_design(&self) -> bool {
        false
    }

    fn sync_design(&mut self, _design: &Design) -> Result<SyncResult> {
        Err(SpecBridgeError::adapter(
            self.name(),
            "design sync is not supported by this target",
        ))
    }

    /// Current remote status of a task, as far as the platform can express it.
    fn task_status(&mut self, task_id: &str) -> Result<TaskStatus>;
}

/// Build an (uninitialized) adapter for one configured target.
pub fn build_target(config: &TargetConfig) -> Box<dyn TargetAdapter> {
    match &config.platform {
        PlatformConfig::Github(gh) => Box::new(GithubAdapter::new(
            config.name.clone(),
            gh.clone(),
            config.mapping.clone(),
        )),
    }
}
