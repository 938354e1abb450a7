use specbridge_core::paths;
use std::path::{Path, PathBuf};

/// Resolve the project root directory.
///
/// Priority:
/// 1. `--root` flag / `SPECBRIDGE_ROOT` env var (passed in as `explicit`)
/// 2. Walk upward from `cwd` looking for `.specbridge.yaml`
/// 3. Walk upward from `cwd` looking for `.git/`
/// 4. Fall back to `cwd`
pub fn resolve_root(explicit: Option<&Path>) -> PathBuf {
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    resolve_from(explicit, &cwd)
}

fn resolve_from(explicit: Option<&Path>, cwd: &Path) -> PathBuf {
    if let Some(p) = explicit {
        return p.to_path_buf();
    }
    find_upward(cwd, |dir| paths::config_path(dir).is_file())
        .or_else(|| find_upward(cwd, |dir| dir.join(".git").is_dir()))
        .unwrap_or_else(|| cwd.to_path_buf())
}

fn find_upward(start: &Path, matches: impl Fn(&Path) -> bool) -> Option<PathBuf> {
    start.ancestors().find(|dir| matches(dir)).map(Path::to_path_buf)
}
