//! Filesystem side of importing: finding video files, placing them in the
//! library and tidying up afterwards.

pub mod cleanup;
pub mod paths;
pub mod recycle;

use anyhow::{Context, Result};
use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::constants::VIDEO_EXTENSIONS;

pub use cleanup::{
    DirEntryInfo, DirLister, WalkDirLister, is_safe_to_delete, remove_leftover_folder,
};
pub use paths::{PathQuery, PathResolver, Unresolved};
pub use recycle::{RecycleBin, discard_file};

#[must_use]
pub fn is_video_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| VIDEO_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
}

fn normalize_lexically(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Whether `path` is `root` or lies below it. Compares canonical paths when
/// both exist, lexically normalized ones otherwise.
#[must_use]
pub fn is_within(path: &Path, root: &Path) -> bool {
    match (path.canonicalize(), root.canonicalize()) {
        (Ok(p), Ok(r)) => p.starts_with(r),
        _ => normalize_lexically(path).starts_with(normalize_lexically(root)),
    }
}

/// Video files at `path` (itself, or recursively below it), largest first.
pub fn find_video_files(path: &Path) -> io::Result<Vec<(PathBuf, u64)>> {
    let metadata = std::fs::metadata(path)?;
    if metadata.is_file() {
        return Ok(if is_video_file(path) {
            vec![(path.to_path_buf(), metadata.len())]
        } else {
            Vec::new()
        });
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(path).follow_links(true) {
        let entry = entry.map_err(io::Error::other)?;
        if entry.file_type().is_file() && is_video_file(entry.path()) {
            let size = entry.metadata().map(|m| m.len()).unwrap_or(0);
            files.push((entry.into_path(), size));
        }
    }

    files.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    Ok(files)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlacementMethod {
    Move,
    Hardlink,
    Copy,
}

impl PlacementMethod {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Move => "move",
            Self::Hardlink => "hardlink",
            Self::Copy => "copy",
        }
    }
}

impl std::fmt::Display for PlacementMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

pub trait HardLinker: Send + Sync {
    fn hard_link(&self, source: &Path, destination: &Path) -> io::Result<()>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FsHardLinker;

impl HardLinker for FsHardLinker {
    fn hard_link(&self, source: &Path, destination: &Path) -> io::Result<()> {
        std::fs::hard_link(source, destination)
    }
}

/// Places files into the library: move when the source already lives inside
/// the library, hardlink otherwise, copy when linking is impossible.
#[derive(Clone)]
pub struct Placer {
    linker: Arc<dyn HardLinker>,
}

impl Default for Placer {
    fn default() -> Self {
        Self::new(Arc::new(FsHardLinker))
    }
}

impl Placer {
    #[must_use]
    pub fn new(linker: Arc<dyn HardLinker>) -> Self {
        Self { linker }
    }

    pub async fn place(
        &self,
        source: &Path,
        destination: &Path,
        library_root: &Path,
    ) -> Result<PlacementMethod> {
        if let Some(parent) = destination.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        if source == destination {
            debug!(path = %source.display(), "File already in place");
            return Ok(PlacementMethod::Move);
        }

        if tokio::fs::try_exists(destination).await.unwrap_or(false) {
            tokio::fs::remove_file(destination)
                .await
                .with_context(|| format!("Failed to replace {}", destination.display()))?;
        }

        let inside_library = is_within(source, library_root);

        if inside_library {
            match tokio::fs::rename(source, destination).await {
                Ok(()) => {
                    info!(from = %source.display(), to = %destination.display(), "Moved into library");
                    return Ok(PlacementMethod::Move);
                }
                Err(e) => warn!(error = %e, "Move failed, falling back to copy"),
            }
        } else {
            let linker = Arc::clone(&self.linker);
            let (src, dst) = (source.to_path_buf(), destination.to_path_buf());
            let linked = tokio::task::spawn_blocking(move || linker.hard_link(&src, &dst))
                .await
                .context("Hardlink task panicked")?;

            match linked {
                Ok(()) => {
                    info!(from = %source.display(), to = %destination.display(), "Hardlinked into library");
                    return Ok(PlacementMethod::Hardlink);
                }
                Err(e) => debug!(error = %e, "Hardlink failed, falling back to copy"),
            }
        }

        tokio::fs::copy(source, destination).await.with_context(|| {
            format!(
                "Failed to copy {} -> {}",
                source.display(),
                destination.display()
            )
        })?;

        if inside_library {
            tokio::fs::remove_file(source).await.with_context(|| {
                format!("Copied but could not remove source {}", source.display())
            })?;
        }

        info!(from = %source.display(), to = %destination.display(), "Copied into library");
        Ok(PlacementMethod::Copy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct CrossDevice;

    impl HardLinker for CrossDevice {
        fn hard_link(&self, _source: &Path, _destination: &Path) -> io::Result<()> {
            Err(io::Error::new(
                io::ErrorKind::CrossesDevices,
                "Invalid cross-device link",
            ))
        }
    }

    #[test]
    fn test_is_video_file() {
        assert!(is_video_file(Path::new("/a/b.MKV")));
        assert!(is_video_file(Path::new("movie.m2ts")));
        assert!(!is_video_file(Path::new("movie.nfo")));
        assert!(!is_video_file(Path::new("movie")));
    }

    #[test]
    fn test_is_within_lexical() {
        assert!(is_within(Path::new("/lib/movies/x/../y"), Path::new("/lib")));
        assert!(!is_within(Path::new("/library2/x"), Path::new("/library")));
        assert!(is_within(Path::new("/library"), Path::new("/library/")));
    }

    #[test]
    fn test_find_video_files_sorted_by_size() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("Sample");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(dir.path().join("movie.mkv"), vec![0u8; 300]).unwrap();
        std::fs::write(nested.join("sample.mkv"), vec![0u8; 20]).unwrap();
        std::fs::write(dir.path().join("movie.nfo"), vec![0u8; 900]).unwrap();

        let files = find_video_files(dir.path()).unwrap();
        assert_eq!(files.len(), 2);
        assert_eq!(files[0].0, dir.path().join("movie.mkv"));
        assert_eq!(files[0].1, 300);

        let single = find_video_files(&dir.path().join("movie.mkv")).unwrap();
        assert_eq!(single.len(), 1);
        assert!(find_video_files(&dir.path().join("movie.nfo")).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_source_inside_library_is_moved() {
        let library = tempfile::tempdir().unwrap();
        let release = library.path().join("Movie (2020)").join("Movie.2020.1080p-GRP");
        std::fs::create_dir_all(&release).unwrap();
        let source = release.join("movie.mkv");
        std::fs::write(&source, b"video").unwrap();
        let destination = library.path().join("Movie (2020)").join("Movie (2020).mkv");

        let method = Placer::new(Arc::new(CrossDevice))
            .place(&source, &destination, library.path())
            .await
            .unwrap();

        assert_eq!(method, PlacementMethod::Move);
        assert!(!source.exists());
        assert!(destination.exists());
    }

    #[tokio::test]
    async fn test_external_source_hardlinked() {
        let downloads = tempfile::tempdir().unwrap();
        let library = tempfile::tempdir().unwrap();
        let source = downloads.path().join("movie.mkv");
        std::fs::write(&source, b"video").unwrap();
        let destination = library.path().join("Movie (2020)").join("Movie (2020).mkv");

        let method = Placer::default()
            .place(&source, &destination, library.path())
            .await
            .unwrap();

        // Both temp dirs normally share a filesystem; if not, copy is fine too.
        assert!(matches!(
            method,
            PlacementMethod::Hardlink | PlacementMethod::Copy
        ));
        assert!(source.exists());
        assert!(destination.exists());
    }

    #[tokio::test]
    async fn test_cross_device_falls_back_to_copy_and_keeps_source() {
        let downloads = tempfile::tempdir().unwrap();
        let library = tempfile::tempdir().unwrap();
        let source = downloads.path().join("movie.mkv");
        std::fs::write(&source, b"video").unwrap();
        let destination = library.path().join("Movie (2020).mkv");

        let method = Placer::new(Arc::new(CrossDevice))
            .place(&source, &destination, library.path())
            .await
            .unwrap();

        assert_eq!(method, PlacementMethod::Copy);
        assert!(source.exists());
        assert_eq!(std::fs::read(&destination).unwrap(), b"video");
    }
}
