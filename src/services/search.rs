use anyhow::Result;
use async_trait::async_trait;
use tracing::info;

use crate::domain::MediaTarget;

/// Release search and hand-off, owned by another subsystem.
#[async_trait]
pub trait SearchCollaborator: Send + Sync {
    /// Searches for the target and grabs the best release. `Ok(false)` means
    /// nothing acceptable was found.
    async fn search_and_grab(&self, target: MediaTarget) -> Result<bool>;
}

/// Used when no search backend is wired in; every request finds nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSearch;

#[async_trait]
impl SearchCollaborator for NoSearch {
    async fn search_and_grab(&self, target: MediaTarget) -> Result<bool> {
        info!(%target, "No search backend configured, skipping re-download");
        Ok(false)
    }
}
