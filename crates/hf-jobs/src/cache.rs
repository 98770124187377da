//! Cache directory housekeeping.

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

/// Total size in bytes of all regular files under `root`.
///
/// Unreadable entries are skipped; a missing root counts as empty.
pub fn dir_size(root: &Path) -> u64 {
    WalkDir::new(root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter_map(|e| e.metadata().ok())
        .map(|m| m.len())
        .sum()
}

/// Result of [`clear_dir`].
#[derive(Debug, Default, Clone)]
pub struct ClearedFiles {
    /// Paths that were deleted.
    pub removed: Vec<PathBuf>,
    /// Bytes freed by the deletions.
    pub freed_bytes: u64,
    /// Files left in place because `keep` claimed them.
    pub kept: usize,
    /// Files that could not be deleted.
    pub failed: usize,
}

/// Delete every regular file under `root` for which `keep` returns false.
///
/// `keep` is asked right before each deletion, not up front, so it can
/// reflect state that changed during the walk. Directories are left in place.
pub fn clear_dir(root: &Path, keep: impl Fn(&Path) -> bool) -> ClearedFiles {
    let mut report = ClearedFiles::default();

    for entry in WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        if keep(path) {
            report.kept += 1;
            continue;
        }

        let len = entry.metadata().map(|m| m.len()).unwrap_or(0);
        match std::fs::remove_file(path) {
            Ok(()) => {
                report.freed_bytes += len;
                report.removed.push(path.to_path_buf());
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), "Failed to remove cache file: {e}");
                report.failed += 1;
            }
        }
    }

    report
}
