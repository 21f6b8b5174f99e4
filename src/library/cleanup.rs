use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;

use super::{is_video_file, is_within};
use crate::constants::TRIVIAL_FILE_MAX_BYTES;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntryInfo {
    pub path: PathBuf,
    pub is_dir: bool,
    pub size: u64,
}

pub trait DirLister: Send + Sync {
    /// Every entry below `dir`, recursively, excluding `dir` itself.
    fn list_recursive(&self, dir: &Path) -> io::Result<Vec<DirEntryInfo>>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct WalkDirLister;

impl DirLister for WalkDirLister {
    fn list_recursive(&self, dir: &Path) -> io::Result<Vec<DirEntryInfo>> {
        let mut entries = Vec::new();
        for entry in WalkDir::new(dir).min_depth(1) {
            let entry = entry.map_err(io::Error::other)?;
            let metadata = entry.metadata().map_err(io::Error::other)?;
            entries.push(DirEntryInfo {
                path: entry.into_path(),
                is_dir: metadata.is_dir(),
                size: metadata.len(),
            });
        }
        Ok(entries)
    }
}

/// A folder may go once it holds no video file and no file large enough to
/// be unprocessed content.
#[must_use]
pub fn is_safe_to_delete(entries: &[DirEntryInfo]) -> bool {
    entries
        .iter()
        .filter(|e| !e.is_dir)
        .all(|e| !is_video_file(&e.path) && e.size <= TRIVIAL_FILE_MAX_BYTES)
}

/// Removes `dir` when it lies strictly inside `library_root` and only holds
/// leftovers. Returns whether the folder was deleted.
pub fn remove_leftover_folder(
    dir: &Path,
    library_root: &Path,
    lister: &dyn DirLister,
) -> io::Result<bool> {
    if !is_within(dir, library_root) || dir == library_root || !dir.is_dir() {
        return Ok(false);
    }

    let entries = lister.list_recursive(dir)?;
    if !is_safe_to_delete(&entries) {
        debug!(path = %dir.display(), "Source folder still holds content, keeping it");
        return Ok(false);
    }

    std::fs::remove_dir_all(dir)?;
    info!(path = %dir.display(), "Removed leftover source folder");
    Ok(true)
}
