use crate::error::Result;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

/// Atomically write `data` to `path` using a tempfile in the same directory.
/// Prevents partial writes from corrupting state files.
pub fn atomic_write(path: &Path, data: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let dir = path.parent().unwrap_or(Path::new("."));
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(data)?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Read a file, returning `None` when it does not exist.
pub fn read_optional(path: &Path) -> Result<Option<String>> {
    match std::fs::read_to_string(path) {
        Ok(s) => Ok(Some(s)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// True if `root/.gitignore` has a line equal to `entry` (or `entry` without
/// its trailing slash).
pub fn gitignore_has_entry(root: &Path, entry: &str) -> Result<bool> {
    let Some(existing) = read_optional(&root.join(".gitignore"))? else {
        return Ok(false);
    };
    let bare = entry.trim_end_matches('/');
    Ok(existing
        .lines()
        .map(str::trim)
        .any(|l| l == entry || l == bare))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn atomic_write_creates_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.json");
        atomic_write(&path, b"{}").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "{}");
    }

    #[test]
    fn atomic_write_creates_parents() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a/b/c/state.json");
        atomic_write(&path, b"data").unwrap();
        assert!(path.exists());
    }

    #[test]
    fn atomic_write_replaces_existing() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.json");
        atomic_write(&path, b"old").unwrap();
        atomic_write(&path, b"new").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "new");
    }

    #[test]
    fn read_optional_missing_is_none() {
        let dir = TempDir::new().unwrap();
        assert!(read_optional(&dir.path().join("nope.md")).unwrap().is_none());
    }

    #[test]
    fn gitignore_entry_detection() {
        let dir = TempDir::new().unwrap();
        assert!(!gitignore_has_entry(dir.path(), ".specbridge/").unwrap());

        std::fs::write(dir.path().join(".gitignore"), "target\n.specbridge\n").unwrap();
        assert!(gitignore_has_entry(dir.path(), ".specbridge/").unwrap());
        assert!(!gitignore_has_entry(dir.path(), ".kiro/").unwrap());
    }
}
