use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// Directory constants
// ---------------------------------------------------------------------------

pub const STATE_DIR: &str = ".specbridge";
pub const CONFIG_FILE: &str = ".specbridge.yaml";
pub const SYNC_STATE_FILE: &str = ".specbridge/sync-state.json";
pub const LAST_RUN_FILE: &str = ".specbridge/last-run.json";

pub const KIRO_DIR: &str = ".kiro";
pub const KIRO_SPECS_DIR: &str = ".kiro/specs";

pub const REQUIREMENTS_MD: &str = "requirements.md";
pub const DESIGN_MD: &str = "design.md";
pub const TASKS_MD: &str = "tasks.md";

/// The three well-known files that make a directory a spec.
pub const SPEC_FILES: [&str; 3] = [REQUIREMENTS_MD, DESIGN_MD, TASKS_MD];

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

pub fn config_path(root: &Path) -> PathBuf {
    root.join(CONFIG_FILE)
}

pub fn state_dir(root: &Path) -> PathBuf {
    root.join(STATE_DIR)
}

pub fn sync_state_path(root: &Path) -> PathBuf {
    root.join(SYNC_STATE_FILE)
}

pub fn last_run_path(root: &Path) -> PathBuf {
    root.join(LAST_RUN_FILE)
}

pub fn kiro_specs_dir(root: &Path) -> PathBuf {
    root.join(KIRO_SPECS_DIR)
}

/// True when `dir` directly contains at least one of the spec files.
pub fn has_spec_files(dir: &Path) -> bool {
    SPEC_FILES.iter().any(|f| dir.join(f).is_file())
}
