use anyhow::Result;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{info, warn};

/// Holding area for library files replaced by an upgrade.
#[derive(Debug, Clone)]
pub struct RecycleBin {
    path: PathBuf,
}

impl RecycleBin {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Moves `file_path` into the bin under a timestamp prefix. Falls back to
    /// copy-and-delete when the bin is on another filesystem.
    pub async fn recycle(&self, file_path: &Path, reason: &str) -> Result<PathBuf> {
        fs::create_dir_all(&self.path).await?;

        let filename = file_path
            .file_name()
            .ok_or_else(|| anyhow::anyhow!("Invalid file path: {}", file_path.display()))?;

        let timestamp = chrono::Utc::now().format("%Y%m%d_%H%M%S");
        let recycled_path = self
            .path
            .join(format!("{timestamp}_{}", filename.to_string_lossy()));

        if let Err(e) = fs::rename(file_path, &recycled_path).await {
            warn!(error = %e, "Rename into recycle bin failed, copying instead");
            fs::copy(file_path, &recycled_path).await?;
            fs::remove_file(file_path).await?;
        }

        info!(
            from = %file_path.display(),
            to = %recycled_path.display(),
            reason,
            "Recycled file"
        );
        Ok(recycled_path)
    }

    pub async fn list(&self) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();

        if !self.path.exists() {
            return Ok(files);
        }

        let mut entries = fs::read_dir(&self.path).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.is_file() {
                files.push(path);
            }
        }

        files.sort();
        Ok(files)
    }
}

/// Recycles `path` when a bin is configured, deletes it otherwise. A file that
/// is already gone is not an error.
pub async fn discard_file(path: &Path, bin: Option<&RecycleBin>, reason: &str) -> Result<()> {
    if !fs::try_exists(path).await.unwrap_or(false) {
        return Ok(());
    }

    match bin {
        Some(bin) => {
            bin.recycle(path, reason).await?;
        }
        None => {
            fs::remove_file(path).await?;
            info!(path = %path.display(), reason, "Deleted replaced file");
        }
    }
    Ok(())
}
