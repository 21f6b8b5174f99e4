use anyhow::Result;
use std::sync::Arc;
use tracing::{error, info, warn};

use super::search::SearchCollaborator;
use crate::clients::DownloadClient;
use crate::db::{NewBlacklistEntry, Store};
use crate::domain::events::{EventBus, NotificationEvent, emit};
use crate::domain::{Download, DownloadStatus};

/// Where a terminal failure was detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureStage {
    /// The client reported an error state.
    Remote,
    /// A tracked torrent disappeared from its client.
    Removed,
    /// Stalled with no seeds past the configured timeout.
    Stalled,
    PathResolution,
    /// Completed content held nothing importable.
    Content,
    Import,
}

impl FailureStage {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Remote => "remote",
            Self::Removed => "removed",
            Self::Stalled => "stalled",
            Self::PathResolution => "path_resolution",
            Self::Content => "content",
            Self::Import => "import",
        }
    }
}

/// The single place terminal failures go through: mark failed, purge the
/// remote item when configured, blacklist the release and optionally search
/// again.
pub struct FailureHandler {
    store: Store,
    search: Arc<dyn SearchCollaborator>,
    event_bus: EventBus,
    redownload: bool,
}

impl FailureHandler {
    #[must_use]
    pub fn new(
        store: Store,
        search: Arc<dyn SearchCollaborator>,
        event_bus: EventBus,
        redownload: bool,
    ) -> Self {
        Self {
            store,
            search,
            event_bus,
            redownload,
        }
    }

    /// Returns `false` when the download had already left `from` (cancelled or
    /// handled elsewhere); nothing else is done in that case.
    pub async fn handle(
        &self,
        download: &Download,
        from: DownloadStatus,
        client: Option<&Arc<dyn DownloadClient>>,
        stage: FailureStage,
        reason: &str,
    ) -> Result<bool> {
        if !self
            .store
            .transition_download(download.id, from, DownloadStatus::Failed, Some(reason))
            .await?
        {
            info!(
                download_id = download.id,
                "Download changed underneath failure handling, skipping"
            );
            return Ok(false);
        }

        metrics::counter!("fetcharr_downloads_failed_total", "stage" => stage.as_str())
            .increment(1);
        warn!(
            download_id = download.id,
            title = %download.title,
            stage = stage.as_str(),
            reason,
            event = "download.failed",
            "Download failed"
        );

        if let (Some(client), Some(remote_id)) = (client, download.remote_id.as_deref())
            && client.settings().remove_failed
            && stage != FailureStage::Removed
        {
            if let Err(e) = client.remove(remote_id, true).await {
                warn!(
                    download_id = download.id,
                    client = %client.settings().name,
                    error = %e,
                    "Failed to remove failed item from client"
                );
            }
        }

        let added = self
            .store
            .add_to_blacklist(NewBlacklistEntry {
                target: download.target,
                source_title: download.title.clone(),
                reason: reason.to_string(),
                indexer: download.indexer.clone(),
            })
            .await?;
        if added {
            emit(
                &self.event_bus,
                NotificationEvent::ReleaseBlacklisted {
                    target: download.target,
                    title: download.title.clone(),
                },
            );
        }

        emit(
            &self.event_bus,
            NotificationEvent::DownloadFailed {
                download_id: download.id,
                title: download.title.clone(),
                reason: reason.to_string(),
            },
        );

        if self.redownload {
            match self.search.search_and_grab(download.target).await {
                Ok(found) => {
                    info!(
                        download_id = download.id,
                        target = %download.target,
                        found,
                        "Re-download search finished"
                    );
                    emit(
                        &self.event_bus,
                        NotificationEvent::RedownloadRequested {
                            target: download.target,
                            found,
                        },
                    );
                }
                Err(e) => error!(
                    download_id = download.id,
                    target = %download.target,
                    error = %e,
                    "Re-download search failed"
                ),
            }
        }

        Ok(true)
    }
}
