//! Source adapters read spec documents from disk into [`SpecData`].

pub mod kiro;

use crate::error::Result;
use crate::model::SpecData;
use std::path::Path;

pub use kiro::KiroAdapter;

pub trait SourceAdapter {
    fn name(&self) -> &str;

    /// Whether this adapter can read anything at `path`. Never errors.
    fn detect(&self, path: &Path) -> bool;

    fn parse(&self, path: &Path) -> Result<SpecData>;
}

/// Check the mandatory fields of parsed data. Returns a description of the
/// first problem found.
pub(crate) fn validate_spec_data(data: &SpecData) -> std::result::Result<(), String> {
    if data.meta.name.is_empty() {
        return Err("invalid spec data: missing meta.name".into());
    }
    if data.meta.version.is_empty() {
        return Err("invalid spec data: missing meta.version".into());
    }
    for (index, req) in data.requirements.iter().enumerate() {
        if req.id.is_empty() {
            return Err(format!("invalid requirement at index {index}: missing id"));
        }
        if req.title.is_empty() {
            return Err(format!("invalid requirement at index {index}: missing title"));
        }
        if req.description.is_empty() {
            return Err(format!(
                "invalid requirement at index {index} ({}): missing description",
                req.id
            ));
        }
    }
    for (index, task) in data.tasks.iter().enumerate() {
        if task.id.is_empty() {
            return Err(format!("invalid task at index {index}: missing id"));
        }
        if task.title.is_empty() {
            return Err(format!("invalid task at index {index}: missing title"));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Requirement, SpecMeta, Task};
    use crate::types::TaskStatus;

    #[test]
    fn valid_data_passes() {
        let mut data = SpecData::empty(SpecMeta::new("auth"));
        data.requirements.push(Requirement::new("auth:req-1", "Login", "Users log in"));
        data.tasks.push(Task::new("auth:1", "Build form", TaskStatus::Todo));
        assert!(validate_spec_data(&data).is_ok());
    }

    #[test]
    fn requirement_without_description_fails() {
        let mut data = SpecData::empty(SpecMeta::new("auth"));
        data.requirements.push(Requirement::new("auth:req-1", "Login", ""));
        let err = validate_spec_data(&data).unwrap_err();
        assert!(err.contains("missing description"));
    }

    #[test]
    fn task_without_title_fails() {
        let mut data = SpecData::empty(SpecMeta::new("auth"));
        data.tasks.push(Task::new("auth:1", "", TaskStatus::Done));
        assert!(validate_spec_data(&data).unwrap_err().contains("missing title"));
    }

    #[test]
    fn empty_meta_name_fails() {
        let data = SpecData::empty(SpecMeta::new(""));
        assert!(validate_spec_data(&data).unwrap_err().contains("meta.name"));
    }
}
