use std::path::{Path, PathBuf};

use crate::layout::{Layout, TRASH_DIR};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EmptyDirsReport {
    /// Directories removed, or that would be in a dry run
    pub removed: Vec<PathBuf>,
    pub failed: usize,
}

/// Remove empty directories below every space's trash root.
///
/// Directories that only contain empty directories count as empty. The
///  trash roots themselves are kept, and symlinks are never followed.
pub fn purge_empty_dirs(root: &Path, dry_run: bool) -> Result<EmptyDirsReport, glob::PatternError> {
    let pattern = format!(
        "{}/*/*/{}",
        glob::Pattern::escape(&Layout::new(root).spaces_dir().to_string_lossy()),
        TRASH_DIR
    );

    let mut report = EmptyDirsReport::default();
    for entry in glob::glob(&pattern)? {
        match entry {
            Ok(trash_root) => {
                tracing::debug!(path = %trash_root.display(), "scanning trash");
                prune_children(&trash_root, dry_run, &mut report);
            }
            Err(e) => {
                tracing::warn!(path = %e.path().display(), error = %e.error(), "skipping unreadable trash");
                report.failed += 1;
            }
        }
    }
    Ok(report)
}

/// Prune below `dir`; returns whether `dir` ends up (or would end up) empty
fn prune_children(dir: &Path, dry_run: bool, report: &mut EmptyDirsReport) -> bool {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::warn!(path = %dir.display(), error = %e, "failed to list directory");
            report.failed += 1;
            return false;
        }
    };

    let mut empty = true;
    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(_) => {
                report.failed += 1;
                empty = false;
                continue;
            }
        };
        let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
        if !is_dir {
            empty = false;
            continue;
        }

        let path = entry.path();
        if !prune_children(&path, dry_run, report) {
            empty = false;
            continue;
        }

        if dry_run {
            tracing::info!(path = %path.display(), "would remove empty directory");
            report.removed.push(path);
            continue;
        }
        match std::fs::remove_dir(&path) {
            Ok(()) => {
                tracing::info!(path = %path.display(), "removed empty directory");
                report.removed.push(path);
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "failed to remove directory");
                report.failed += 1;
                empty = false;
            }
        }
    }
    empty
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn trash_fixture() -> (tempfile::TempDir, PathBuf) {
        let temp = tempfile::tempdir().unwrap();
        let trash = temp.path().join("spaces/ss/ss1111/trash");
        fs::create_dir_all(trash.join("ab/cd/ef")).unwrap();
        fs::create_dir_all(trash.join("ab/keep")).unwrap();
        fs::write(trash.join("ab/keep/item"), b"").unwrap();
        fs::create_dir_all(trash.join("zz")).unwrap();
        (temp, trash)
    }

    #[test]
    fn test_dry_run_keeps_everything() {
        let (temp, trash) = trash_fixture();
        let report = purge_empty_dirs(temp.path(), true).unwrap();

        let mut removed = report.removed.clone();
        removed.sort();
        assert_eq!(
            removed,
            vec![trash.join("ab/cd"), trash.join("ab/cd/ef"), trash.join("zz")]
        );
        assert!(trash.join("ab/cd/ef").exists());
    }

    #[test]
    fn test_removes_nested_empty_dirs() {
        let (temp, trash) = trash_fixture();
        let report = purge_empty_dirs(temp.path(), false).unwrap();

        assert_eq!(report.removed.len(), 3);
        assert_eq!(report.failed, 0);
        assert!(!trash.join("ab/cd").exists());
        assert!(!trash.join("zz").exists());
        assert!(trash.join("ab/keep/item").exists());
        assert!(trash.exists());
    }
}
