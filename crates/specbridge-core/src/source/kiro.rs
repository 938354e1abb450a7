//! Reader for the Kiro `.kiro/specs/<feature>/` layout.
//!
//! Each feature directory may hold `requirements.md`, `design.md` and
//! `tasks.md`. A directory that holds one of them directly is a single spec;
//! otherwise every immediate subdirectory holding one is merged, with item ids
//! prefixed by the subdirectory name.

use super::{validate_spec_data, SourceAdapter};
use crate::error::{Result, SpecBridgeError};
use crate::io;
use crate::model::{
    Design, DesignSection, EpicStatus, Requirement, SpecData, SpecMeta, Task,
};
use crate::paths;
use crate::types::TaskStatus;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::debug;

pub const ADAPTER_NAME: &str = "kiro";

const SPEC_SEPARATOR: &str = "\n\n---\n\n";

#[derive(Debug, Default, Clone, Copy)]
pub struct KiroAdapter;

impl KiroAdapter {
    pub fn new() -> Self {
        Self
    }
}

impl SourceAdapter for KiroAdapter {
    fn name(&self) -> &str {
        ADAPTER_NAME
    }

    fn detect(&self, path: &Path) -> bool {
        path.exists() || path.join(paths::KIRO_SPECS_DIR).exists()
    }

    fn parse(&self, path: &Path) -> Result<SpecData> {
        parse_specs(path).map_err(|e| match e {
            SpecBridgeError::Adapter { .. } => e,
            other => SpecBridgeError::adapter(
                ADAPTER_NAME,
                format!("failed to parse Kiro spec: {other}"),
            ),
        })
    }
}

fn kiro_err(message: impl Into<String>) -> SpecBridgeError {
    SpecBridgeError::adapter(ADAPTER_NAME, message)
}

// ---------------------------------------------------------------------------
// Directory resolution
// ---------------------------------------------------------------------------

/// Find the specs container for `path`. A path outside any `.kiro` directory
/// is treated as a project root when it has `.kiro/specs` below it.
fn resolve_specs_dir(path: &Path) -> PathBuf {
    let inside_kiro = path
        .components()
        .any(|c| c.as_os_str() == paths::KIRO_DIR);
    if !inside_kiro {
        let nested = path.join(paths::KIRO_SPECS_DIR);
        if nested.is_dir() {
            return nested;
        }
    }
    path.to_path_buf()
}

/// Spec directories under `specs_dir`, sorted by name.
fn find_spec_dirs(specs_dir: &Path) -> Result<Vec<PathBuf>> {
    if paths::has_spec_files(specs_dir) {
        return Ok(vec![specs_dir.to_path_buf()]);
    }
    let mut dirs = Vec::new();
    for entry in std::fs::read_dir(specs_dir)? {
        let entry = entry?;
        let dir = entry.path();
        if entry.file_type()?.is_dir() && paths::has_spec_files(&dir) {
            dirs.push(dir);
        }
    }
    dirs.sort();
    Ok(dirs)
}

fn dir_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

// ---------------------------------------------------------------------------
// Parse + merge
// ---------------------------------------------------------------------------

fn parse_specs(path: &Path) -> Result<SpecData> {
    let specs_dir = resolve_specs_dir(path);
    if !specs_dir.is_dir() {
        return Err(kiro_err(format!(
            "specifications directory not found: {}",
            specs_dir.display()
        )));
    }

    let spec_dirs = find_spec_dirs(&specs_dir)?;
    if spec_dirs.is_empty() {
        return Err(kiro_err(format!(
            "no specification files found in {}",
            specs_dir.display()
        )));
    }

    let container = dir_name(&specs_dir);
    let mut data = SpecData::empty(SpecMeta::new(container.clone()));
    data.epic_title = format_epic_title(&container);

    for spec_dir in &spec_dirs {
        let spec_name = dir_name(spec_dir);
        debug!(spec = %spec_name, dir = %spec_dir.display(), "parsing spec");

        if let Some(raw) = io::read_optional(&spec_dir.join(paths::REQUIREMENTS_MD))? {
            if !data.epic_description.is_empty() {
                data.epic_description.push_str(SPEC_SEPARATOR);
            }
            data.epic_description.push_str(&raw);
            for mut req in parse_requirements(&raw) {
                req.id = format!("{spec_name}:{}", req.id);
                data.requirements.push(req);
            }
        }

        if data.design.is_none() {
            if let Some(raw) = io::read_optional(&spec_dir.join(paths::DESIGN_MD))? {
                data.design = parse_design(&raw, &spec_name);
            }
        }

        if let Some(raw) = io::read_optional(&spec_dir.join(paths::TASKS_MD))? {
            let spec_path = spec_dir.display().to_string();
            for mut task in parse_tasks(&raw) {
                task.id = format!("{spec_name}:{}", task.id);
                task.parent_id = task.parent_id.map(|p| format!("{spec_name}:{p}"));
                task.spec_name = Some(spec_name.clone());
                task.spec_path = Some(spec_path.clone());
                data.tasks.push(task);
            }
        }
    }

    data.epic_status = Some(EpicStatus::from_tasks(&data.tasks));
    validate_spec_data(&data).map_err(kiro_err)?;

    debug!(
        specs = spec_dirs.len(),
        requirements = data.requirements.len(),
        tasks = data.tasks.len(),
        design = data.design.is_some(),
        "parsed kiro specs"
    );
    Ok(data)
}

/// `user-auth-flow` -> `User Auth Flow`.
pub fn format_epic_title(name: &str) -> String {
    name.split('-')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

// ---------------------------------------------------------------------------
// Markdown helpers
// ---------------------------------------------------------------------------

static REQUIREMENT_RE: OnceLock<Regex> = OnceLock::new();
static HEADING_RE: OnceLock<Regex> = OnceLock::new();
static PRIORITY_RE: OnceLock<Regex> = OnceLock::new();
static TASK_RE: OnceLock<Regex> = OnceLock::new();

fn requirement_re() -> &'static Regex {
    REQUIREMENT_RE.get_or_init(|| {
        Regex::new(r"(?m)^#{2,3}[ \t]+(?:Requirement|需求)[ \t]+(\d+)[ \t]*[:：][ \t]*(.+?)[ \t]*$")
            .unwrap()
    })
}

fn heading_re() -> &'static Regex {
    HEADING_RE.get_or_init(|| Regex::new(r"(?m)^#{1,6}[ \t]").unwrap())
}

fn priority_re() -> &'static Regex {
    PRIORITY_RE.get_or_init(|| Regex::new(r"(?m)^\*\*Priority:\*\*[ \t]*(\S.*?)[ \t]*$").unwrap())
}

fn task_re() -> &'static Regex {
    TASK_RE.get_or_init(|| {
        Regex::new(
            r"^[ \t]*-[ \t]+\[([ x~-])\](?:\\?\*)?[ \t]+(\d+(?:\.\d+)*)\.?[ \t]+(.+?)(?:[ \t]+\(@([\w-]+)\))?[ \t]*$",
        )
        .unwrap()
    })
}

/// Drop a leading `---` delimited YAML front matter block.
pub fn strip_front_matter(content: &str) -> &str {
    let Some(rest) = content
        .strip_prefix("---\n")
        .or_else(|| content.strip_prefix("---\r\n"))
    else {
        return content;
    };
    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        offset += line.len();
        if line.trim_end() == "---" {
            return &rest[offset..];
        }
    }
    content
}

/// Requirements in document order. Ids are local (`req-<N>`).
pub fn parse_requirements(content: &str) -> Vec<Requirement> {
    let markdown = strip_front_matter(content);
    let mut requirements = Vec::new();

    for caps in requirement_re().captures_iter(markdown) {
        let (Some(whole), Some(number), Some(title)) = (caps.get(0), caps.get(1), caps.get(2))
        else {
            continue;
        };
        let start = whole.end();
        let end = heading_re()
            .find_at(markdown, start)
            .map(|m| m.start())
            .unwrap_or(markdown.len());
        let description = markdown[start..end].trim().to_string();
        let priority = priority_re()
            .captures(&description)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string());

        let mut req = Requirement::new(
            format!("req-{}", number.as_str()),
            title.as_str().trim(),
            description,
        );
        req.priority = priority;
        requirements.push(req);
    }
    requirements
}

/// Design document with front matter removed. `None` when nothing is left.
pub fn parse_design(content: &str, spec_name: &str) -> Option<Design> {
    let markdown = strip_front_matter(content);
    if markdown.trim().is_empty() {
        return None;
    }

    let mut sections: Vec<DesignSection> = Vec::new();
    for line in markdown.lines() {
        if let Some(heading) = line.strip_prefix("## ") {
            sections.push(DesignSection {
                heading: heading.trim().to_string(),
                body: String::new(),
            });
        } else if let Some(section) = sections.last_mut() {
            section.body.push_str(line);
            section.body.push('\n');
        }
    }
    for section in &mut sections {
        section.body = section.body.trim().to_string();
    }

    Some(Design {
        content: markdown.to_string(),
        sections,
        spec_name: spec_name.to_string(),
    })
}

/// Checkbox tasks in document order. Ids are local (`1`, `2.1`).
///
/// Indented non-checkbox lines directly below a task are collected as its
/// description; the first unindented line ends the block.
pub fn parse_tasks(content: &str) -> Vec<Task> {
    let mut tasks: Vec<Task> = Vec::new();
    let mut collecting = false;

    for line in content.lines() {
        if let Some(caps) = task_re().captures(line) {
            let (Some(marker), Some(id), Some(title)) = (caps.get(1), caps.get(2), caps.get(3))
            else {
                continue;
            };
            let status = marker
                .as_str()
                .chars()
                .next()
                .and_then(TaskStatus::from_checkbox)
                .unwrap_or(TaskStatus::Todo);
            let id = id.as_str();
            let mut task = Task::new(id, title.as_str().trim(), status);
            task.assignee = caps.get(4).map(|m| m.as_str().to_string());
            task.parent_id = id.rsplit_once('.').map(|(parent, _)| parent.to_string());
            tasks.push(task);
            collecting = true;
            continue;
        }

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let indented = line.starts_with(' ') || line.starts_with('\t');
        if !indented {
            collecting = false;
            continue;
        }
        if collecting {
            if let Some(task) = tasks.last_mut() {
                let desc = task.description.get_or_insert_with(String::new);
                if !desc.is_empty() {
                    desc.push('\n');
                }
                desc.push_str(trimmed);
            }
        }
    }
    tasks
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;
    use tempfile::TempDir;

    const REQUIREMENTS: &str = "---\ntitle: Auth\n---\n# Requirements\n\n## Requirement 1: User login\n\nUsers can log in with email.\n**Priority:** high\n\n## Requirement 2: Password reset\n\nUsers can reset passwords.\n";

    const TASKS: &str = "# Tasks\n\n- [ ] 1. Set up project\n  - Create crate layout\n  - Add CI\n- [x] 1.1 Write config loader\n- [-] 2. Implement login (@alice)\n- [~] 3. Queue reset flow\n- [ ]* 4. Optional polish\n\nNotes at the end.\n";

    fn write_spec(root: &Path, name: &str, files: &[(&str, &str)]) -> PathBuf {
        let dir = root.join(paths::KIRO_SPECS_DIR).join(name);
        std::fs::create_dir_all(&dir).unwrap();
        for (file, content) in files {
            std::fs::write(dir.join(file), content).unwrap();
        }
        dir
    }

    #[test]
    fn requirements_extracted_in_order() {
        let reqs = parse_requirements(REQUIREMENTS);
        assert_eq!(reqs.len(), 2);
        assert_eq!(reqs[0].id, "req-1");
        assert_eq!(reqs[0].title, "User login");
        assert!(reqs[0].description.starts_with("Users can log in"));
        assert_eq!(reqs[0].priority.as_deref(), Some("high"));
        assert_eq!(reqs[1].id, "req-2");
        assert_eq!(reqs[1].description, "Users can reset passwords.");
        assert!(reqs[1].priority.is_none());
    }

    #[test]
    fn chinese_requirement_headings() {
        let reqs = parse_requirements("### 需求 3：登录\n\n用户可以登录。\n");
        assert_eq!(reqs.len(), 1);
        assert_eq!(reqs[0].id, "req-3");
        assert_eq!(reqs[0].title, "登录");
        assert_eq!(reqs[0].description, "用户可以登录。");
    }

    #[test]
    fn description_stops_at_next_heading() {
        let reqs = parse_requirements(
            "## Requirement 1: A\n\nfirst\n\n#### Acceptance Criteria\n\n1. WHEN x\n",
        );
        assert_eq!(reqs[0].description, "first");
    }

    #[test]
    fn four_hash_heading_is_not_a_requirement() {
        assert!(parse_requirements("#### Requirement 1: Nope\n\ntext\n").is_empty());
    }

    #[test]
    fn tasks_extracted_with_status_and_assignee() {
        let tasks = parse_tasks(TASKS);
        assert_eq!(tasks.len(), 5);

        assert_eq!(tasks[0].id, "1");
        assert_eq!(tasks[0].title, "Set up project");
        assert_eq!(tasks[0].status, TaskStatus::Todo);
        assert_eq!(
            tasks[0].description.as_deref(),
            Some("- Create crate layout\n- Add CI")
        );

        assert_eq!(tasks[1].id, "1.1");
        assert_eq!(tasks[1].status, TaskStatus::Done);
        assert_eq!(tasks[1].parent_id.as_deref(), Some("1"));

        assert_eq!(tasks[2].status, TaskStatus::InProgress);
        assert_eq!(tasks[2].assignee.as_deref(), Some("alice"));
        assert_eq!(tasks[2].title, "Implement login");

        assert_eq!(tasks[3].status, TaskStatus::Todo);
        assert_eq!(tasks[4].title, "Optional polish");
        assert!(tasks[4].description.is_none());
    }

    #[test]
    fn checkbox_markers_map_to_statuses() {
        let content = "- [ ] 1. a\n- [x] 2. b\n- [-] 3. c\n- [~] 4. d\n";
        let statuses: Vec<_> = parse_tasks(content).into_iter().map(|t| t.status).collect();
        assert_eq!(
            statuses,
            vec![
                TaskStatus::Todo,
                TaskStatus::Done,
                TaskStatus::InProgress,
                TaskStatus::Todo
            ]
        );
    }

    #[test]
    fn non_task_lines_ignored() {
        let tasks = parse_tasks("- [?] 1. bad marker\n- plain bullet\n-[ ] 2. no space\n");
        assert!(tasks.is_empty());
    }

    #[test]
    fn front_matter_stripped_from_design() {
        let design = parse_design(
            "---\nstatus: draft\n---\n# Design\n\n## Overview\n\nText.\n\n## Data\n\nRows.\n",
            "auth",
        )
        .unwrap();
        assert!(design.content.starts_with("# Design"));
        assert_eq!(design.sections.len(), 2);
        assert_eq!(design.sections[0].heading, "Overview");
        assert_eq!(design.sections[0].body, "Text.");
        assert_eq!(design.spec_name, "auth");
    }

    #[test]
    fn empty_design_is_none() {
        assert!(parse_design("---\na: b\n---\n\n", "x").is_none());
    }

    #[test]
    fn strip_front_matter_leaves_plain_markdown() {
        assert_eq!(strip_front_matter("# Title\n"), "# Title\n");
        assert_eq!(strip_front_matter("---\nunterminated"), "---\nunterminated");
    }

    #[test]
    fn epic_title_is_title_cased() {
        assert_eq!(format_epic_title("user-auth-flow"), "User Auth Flow");
        assert_eq!(format_epic_title("specs"), "Specs");
    }

    #[test]
    fn detect_checks_path_or_nested_specs() {
        let dir = TempDir::new().unwrap();
        let adapter = KiroAdapter::new();
        assert!(adapter.detect(dir.path()));
        assert!(!adapter.detect(&dir.path().join("missing")));

        let project = dir.path().join("project");
        std::fs::create_dir_all(project.join(paths::KIRO_SPECS_DIR)).unwrap();
        assert!(adapter.detect(&project));
    }

    #[test]
    fn parse_project_root_merges_specs_with_prefixes() {
        let dir = TempDir::new().unwrap();
        write_spec(
            dir.path(),
            "user-auth",
            &[("requirements.md", REQUIREMENTS), ("tasks.md", TASKS)],
        );
        write_spec(
            dir.path(),
            "billing",
            &[
                ("tasks.md", "- [ ] 1. Invoice model\n"),
                ("design.md", "# Billing design\n"),
            ],
        );
        std::fs::create_dir_all(dir.path().join(paths::KIRO_SPECS_DIR).join("empty")).unwrap();

        let data = KiroAdapter::new().parse(dir.path()).unwrap();
        assert_eq!(data.meta.name, "specs");
        assert_eq!(data.epic_title, "Specs");
        assert_eq!(data.requirements.len(), 2);
        assert_eq!(data.tasks.len(), 6);

        // Both specs define task "1"; prefixes keep them apart.
        let ids: BTreeSet<_> = data.tasks.iter().map(|t| t.id.clone()).collect();
        assert_eq!(ids.len(), data.tasks.len());
        assert!(ids.contains("billing:1"));
        assert!(ids.contains("user-auth:1"));
        assert!(data
            .requirements
            .iter()
            .all(|r| r.id.starts_with("user-auth:")));

        let sub = data.tasks.iter().find(|t| t.id == "user-auth:1.1").unwrap();
        assert_eq!(sub.parent_id.as_deref(), Some("user-auth:1"));
        assert_eq!(sub.spec_name.as_deref(), Some("user-auth"));
        assert!(sub.spec_path.as_deref().unwrap().ends_with("user-auth"));

        let design = data.design.as_ref().unwrap();
        assert_eq!(design.spec_name, "billing");
        assert!(data.epic_description.contains("Requirement 1"));

        let epic = data.epic_status.as_ref().unwrap();
        assert_eq!(epic.total, 6);
        assert_eq!(epic.completed, 1);
    }

    #[test]
    fn epic_description_joins_requirements_with_rule() {
        let dir = TempDir::new().unwrap();
        write_spec(
            dir.path(),
            "a",
            &[("requirements.md", "## Requirement 1: A\n\nalpha\n")],
        );
        write_spec(
            dir.path(),
            "b",
            &[("requirements.md", "## Requirement 1: B\n\nbeta\n")],
        );
        let data = KiroAdapter::new().parse(dir.path()).unwrap();
        assert_eq!(
            data.epic_description,
            "## Requirement 1: A\n\nalpha\n\n\n---\n\n## Requirement 1: B\n\nbeta\n"
        );
        assert_eq!(data.requirements[0].id, "a:req-1");
        assert_eq!(data.requirements[1].id, "b:req-1");
    }

    #[test]
    fn parse_single_spec_dir_prefixes_with_its_name() {
        let dir = TempDir::new().unwrap();
        let spec = write_spec(dir.path(), "user-auth", &[("tasks.md", TASKS)]);
        let data = KiroAdapter::new().parse(&spec).unwrap();
        assert_eq!(data.meta.name, "user-auth");
        assert_eq!(data.epic_title, "User Auth");
        assert!(data.tasks.iter().all(|t| t.id.starts_with("user-auth:")));
    }

    #[test]
    fn parsing_is_deterministic() {
        let dir = TempDir::new().unwrap();
        write_spec(
            dir.path(),
            "user-auth",
            &[("requirements.md", REQUIREMENTS), ("tasks.md", TASKS)],
        );
        write_spec(dir.path(), "billing", &[("tasks.md", "- [ ] 1. Invoice\n")]);
        let adapter = KiroAdapter::new();
        let first = adapter.parse(dir.path()).unwrap();
        let second = adapter.parse(dir.path()).unwrap();
        let ids = |d: &SpecData| -> Vec<String> {
            d.requirements
                .iter()
                .map(|r| r.id.clone())
                .chain(d.tasks.iter().map(|t| t.id.clone()))
                .collect()
        };
        assert_eq!(ids(&first), ids(&second));
    }

    #[test]
    fn missing_dir_is_adapter_error() {
        let dir = TempDir::new().unwrap();
        let err = KiroAdapter::new()
            .parse(&dir.path().join("nope"))
            .unwrap_err();
        assert_eq!(err.code(), "ADAPTER_ERROR");
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn container_without_specs_is_adapter_error() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join(paths::KIRO_SPECS_DIR).join("empty")).unwrap();
        let err = KiroAdapter::new().parse(dir.path()).unwrap_err();
        assert!(err.to_string().contains("no specification files"));
    }

    #[test]
    fn requirement_without_description_is_adapter_error() {
        let dir = TempDir::new().unwrap();
        write_spec(
            dir.path(),
            "x",
            &[("requirements.md", "## Requirement 1: Empty\n## Requirement 2: B\n\nb\n")],
        );
        let err = KiroAdapter::new().parse(dir.path()).unwrap_err();
        assert!(matches!(err, SpecBridgeError::Adapter { ref adapter, .. } if adapter == "kiro"));
        assert!(err.to_string().contains("missing description"));
    }
}
