//! Issue bodies, marker labels and audit comments.
//!
//! Bodies must be byte-identical across runs for unchanged input, so nothing
//! here reads the clock except [`change_comment`], which takes the time as an
//! argument.

use crate::model::{Design, FieldChange, Requirement, Task};
use crate::source::kiro::format_epic_title;
use crate::types::ItemType;
use chrono::{DateTime, SecondsFormat, Utc};

pub const MARKER_PREFIX: &str = "specbridge:";
pub const TRAILER: &str = "\n---\n*Synced by SpecBridge*";

/// `specbridge:task-id:user-auth:1.2`
pub fn marker_label(kind: ItemType, local_id: &str) -> String {
    format!("{MARKER_PREFIX}{}-id:{local_id}", kind.marker_kind())
}

pub fn task_body(task: &Task) -> String {
    let mut body = format!("# {}\n\n", task.title);
    if let Some(desc) = task.description.as_deref().filter(|d| !d.is_empty()) {
        body.push_str(&format!("{desc}\n\n"));
    }
    body.push_str(&format!("**Status:** {}\n", task.status));
    if let Some(assignee) = &task.assignee {
        body.push_str(&format!("**Assignee:** @{assignee}\n"));
    }
    if let Some(parent) = &task.parent_id {
        body.push_str(&format!("**Parent Task:** {parent}\n"));
    }
    body.push_str(TRAILER);
    body
}

pub fn requirement_body(req: &Requirement) -> String {
    let mut body = format!("# {}\n\n", req.title);
    if !req.description.is_empty() {
        body.push_str(&format!("{}\n\n", req.description));
    }
    if let Some(priority) = &req.priority {
        body.push_str(&format!("**Priority:** {priority}\n"));
    }
    body.push_str(TRAILER);
    body
}

pub fn design_title(design: &Design) -> String {
    format!("Design: {}", format_epic_title(&design.spec_name))
}

pub fn design_body(design: &Design) -> String {
    let mut body = design.content.trim_end().to_string();
    body.push_str("\n\n");
    body.push_str(TRAILER);
    body
}

/// Audit comment listing field-level changes.
pub fn change_comment(changes: &[FieldChange], at: DateTime<Utc>) -> String {
    let mut comment = String::from("🔄 **Synced by SpecBridge**\n\n");
    comment.push_str(&format!(
        "**Time:** {}\n\n",
        at.to_rfc3339_opts(SecondsFormat::Secs, true)
    ));
    comment.push_str("**Changes:**\n");
    for change in changes {
        comment.push_str(&format!(
            "- **{}:** {} → {}\n",
            change.field,
            change.old_value.as_deref().unwrap_or("_none_"),
            change.new_value.as_deref().unwrap_or("_none_"),
        ));
    }
    comment
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TaskStatus;
    use chrono::TimeZone;

    #[test]
    fn marker_labels_per_kind() {
        assert_eq!(
            marker_label(ItemType::Requirement, "auth:req-1"),
            "specbridge:req-id:auth:req-1"
        );
        assert_eq!(
            marker_label(ItemType::Task, "auth:1.2"),
            "specbridge:task-id:auth:1.2"
        );
        assert_eq!(
            marker_label(ItemType::Design, "auth"),
            "specbridge:design-id:auth"
        );
    }

    #[test]
    fn task_body_full() {
        let mut task = Task::new("auth:1.1", "Write loader", TaskStatus::InProgress);
        task.description = Some("Parse YAML".into());
        task.assignee = Some("alice".into());
        task.parent_id = Some("auth:1".into());
        assert_eq!(
            task_body(&task),
            "# Write loader\n\nParse YAML\n\n**Status:** in_progress\n**Assignee:** @alice\n**Parent Task:** auth:1\n\n---\n*Synced by SpecBridge*"
        );
    }

    #[test]
    fn task_body_minimal() {
        let task = Task::new("auth:1", "Setup", TaskStatus::Todo);
        assert_eq!(
            task_body(&task),
            "# Setup\n\n**Status:** todo\n\n---\n*Synced by SpecBridge*"
        );
    }

    #[test]
    fn requirement_body_with_priority() {
        let mut req = Requirement::new("auth:req-1", "Login", "Users log in");
        req.priority = Some("high".into());
        assert_eq!(
            requirement_body(&req),
            "# Login\n\nUsers log in\n\n**Priority:** high\n\n---\n*Synced by SpecBridge*"
        );
    }

    #[test]
    fn bodies_are_stable() {
        let task = Task::new("a:1", "Same", TaskStatus::Done);
        assert_eq!(task_body(&task), task_body(&task.clone()));
    }

    #[test]
    fn design_title_and_body() {
        let design = Design {
            content: "# Design\n\nText\n\n".into(),
            sections: Vec::new(),
            spec_name: "user-auth".into(),
        };
        assert_eq!(design_title(&design), "Design: User Auth");
        assert_eq!(
            design_body(&design),
            "# Design\n\nText\n\n\n---\n*Synced by SpecBridge*"
        );
    }

    #[test]
    fn change_comment_lists_fields() {
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let comment = change_comment(
            &[
                FieldChange {
                    field: "title".into(),
                    old_value: Some("Old".into()),
                    new_value: Some("New".into()),
                },
                FieldChange {
                    field: "assignee".into(),
                    old_value: None,
                    new_value: Some("bob".into()),
                },
            ],
            at,
        );
        assert_eq!(
            comment,
            "🔄 **Synced by SpecBridge**\n\n**Time:** 2024-05-01T12:00:00Z\n\n**Changes:**\n- **title:** Old → New\n- **assignee:** _none_ → bob\n"
        );
    }
}
