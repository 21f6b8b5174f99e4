//! Handing releases to clients and cancelling tracked downloads.

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::clients::{AddRequest, ClientError, ClientSource};
use crate::db::{NewDownload, Store};
use crate::domain::events::{EventBus, NotificationEvent, emit};
use crate::domain::{ClientKind, Download, MediaTarget, ProperPreference};
use crate::quality::{RejectReason, RevisionFacts, UpgradeDecision, is_proper_or_repack, parse_quality};

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("No enabled {0} client configured")]
    NoClient(ClientKind),

    #[error("Download client error: {0}")]
    Client(#[from] ClientError),

    #[error("Download client rejected the release")]
    Rejected,

    #[error("Release is blacklisted for {0}")]
    Blacklisted(MediaTarget),

    #[error("Release is not an upgrade for {target}: {reason}")]
    NotAnUpgrade {
        target: MediaTarget,
        reason: RejectReason,
    },

    #[error("Download not found: {0}")]
    NotFound(i32),

    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<anyhow::Error> for DownloadError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(format!("{err:#}"))
    }
}

/// A release chosen by the search subsystem.
#[derive(Debug, Clone)]
pub struct GrabRequest {
    pub target: MediaTarget,
    pub kind: ClientKind,
    pub title: String,
    pub download_url: String,
    pub size: Option<i64>,
    pub seeders: Option<i32>,
    pub indexer: Option<String>,
    pub quality: Option<String>,
}

/// Quality and revision of the file currently on disk for a target.
struct CurrentFile {
    quality: String,
    proper: bool,
    profile_id: Option<i32>,
}

#[derive(Clone)]
pub struct DownloadService {
    store: Store,
    clients: ClientSource,
    event_bus: EventBus,
    proper_preference: ProperPreference,
}

impl DownloadService {
    #[must_use]
    pub fn new(store: Store, clients: ClientSource, event_bus: EventBus) -> Self {
        Self {
            store,
            clients,
            event_bus,
            proper_preference: ProperPreference::default(),
        }
    }

    #[must_use]
    pub const fn with_proper_preference(mut self, preference: ProperPreference) -> Self {
        self.proper_preference = preference;
        self
    }

    async fn current_file(&self, target: MediaTarget) -> Result<Option<CurrentFile>, DownloadError> {
        let current = match target {
            MediaTarget::Movie { movie_id } => {
                let Some(movie) = self.store.get_movie(movie_id).await? else {
                    return Ok(None);
                };
                self.store
                    .movie_files(movie_id)
                    .await?
                    .into_iter()
                    .next()
                    .map(|f| CurrentFile {
                        quality: f.quality,
                        proper: f.proper,
                        profile_id: movie.quality_profile_id,
                    })
            }
            MediaTarget::Episode {
                series_id,
                season_number,
                episode_number,
            } => {
                let Some(series) = self.store.get_series(series_id).await? else {
                    return Ok(None);
                };
                self.store
                    .episode_files(series_id, season_number, episode_number)
                    .await?
                    .into_iter()
                    .next()
                    .map(|f| CurrentFile {
                        quality: f.quality,
                        proper: f.proper,
                        profile_id: series.quality_profile_id,
                    })
            }
        };
        Ok(current)
    }

    /// A target without a file accepts anything; otherwise the release must
    /// be an upgrade under the target's profile.
    async fn check_upgrade(&self, request: &GrabRequest) -> Result<(), DownloadError> {
        let Some(current) = self.current_file(request.target).await? else {
            return Ok(());
        };

        let new_quality = request
            .quality
            .clone()
            .filter(|q| !q.trim().is_empty())
            .unwrap_or_else(|| parse_quality(&request.title).name());
        let profile = self.store.resolve_quality_profile(current.profile_id).await?;
        let ladder = self.store.quality_ladder().await?;

        match profile.evaluate_upgrade(
            &ladder,
            &current.quality,
            &new_quality,
            RevisionFacts {
                current_is_proper: current.proper,
                new_is_proper: is_proper_or_repack(&request.title),
            },
            self.proper_preference,
        ) {
            UpgradeDecision::Upgrade(reason) => {
                debug!(
                    target = %request.target,
                    current = %current.quality,
                    new = %new_quality,
                    %reason,
                    "Release upgrades existing file"
                );
                Ok(())
            }
            UpgradeDecision::Reject(reason) => Err(DownloadError::NotAnUpgrade {
                target: request.target,
                reason,
            }),
        }
    }

    /// Sends the release to the primary client of the requested kind and
    /// records it as queued.
    pub async fn grab(&self, request: GrabRequest) -> Result<Download, DownloadError> {
        if self
            .store
            .is_blacklisted(request.target, &request.title)
            .await?
        {
            return Err(DownloadError::Blacklisted(request.target));
        }
        self.check_upgrade(&request).await?;

        let registry = self.clients.load().await?;
        let client = registry
            .primary(request.kind)
            .ok_or(DownloadError::NoClient(request.kind))?;
        let settings = client.settings();
        let media_type = request.target.media_type();

        let save_path = settings.directory_for(media_type).map(str::to_string);
        let added = client
            .add(&AddRequest {
                url: request.download_url.clone(),
                category: settings.resolve_category(media_type),
                save_path: save_path.clone(),
                title: Some(request.title.clone()),
            })
            .await?;
        if !added.success {
            return Err(DownloadError::Rejected);
        }

        let download = self
            .store
            .create_download(NewDownload {
                target: request.target,
                title: request.title,
                download_url: request.download_url,
                size: request.size,
                seeders: request.seeders,
                indexer: request.indexer,
                quality: request.quality,
                client_id: Some(settings.id),
                remote_id: added.remote_id,
                save_path,
            })
            .await?;

        info!(
            download_id = download.id,
            title = %download.title,
            client = %settings.name,
            remote_id = ?download.remote_id,
            event = "download.grabbed",
            "Release sent to download client"
        );
        emit(
            &self.event_bus,
            NotificationEvent::DownloadGrabbed {
                download_id: download.id,
                title: download.title.clone(),
                client: settings.name.clone(),
            },
        );
        Ok(download)
    }

    /// Removes the remote item (best effort) and deletes the local record.
    pub async fn cancel(&self, id: i32, delete_files: bool) -> Result<Download, DownloadError> {
        let download = self
            .store
            .get_download(id)
            .await?
            .ok_or(DownloadError::NotFound(id))?;

        if let (Some(remote_id), Some(client_id)) =
            (download.remote_id.as_deref(), download.client_id)
        {
            let registry = self.clients.load().await?;
            match registry.get(client_id) {
                Some(client) => {
                    if let Err(e) = client.remove(remote_id, delete_files).await {
                        warn!(download_id = id, error = %e, "Failed to remove item from client");
                    }
                }
                None => warn!(
                    download_id = id,
                    client_id, "Owning client is not enabled, only deleting the record"
                ),
            }
        }

        if !self.store.delete_download(id).await? {
            return Err(DownloadError::NotFound(id));
        }

        info!(download_id = id, title = %download.title, event = "download.cancelled", "Download cancelled");
        emit(
            &self.event_bus,
            NotificationEvent::DownloadCancelled {
                download_id: id,
                title: download.title.clone(),
            },
        );
        Ok(download)
    }
}
