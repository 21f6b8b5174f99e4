//! One reconciliation pass: remote client state against local downloads.

use anyhow::Result;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use super::failure::{FailureHandler, FailureStage};
use super::import::ImportPipeline;
use super::matcher::TitleMatcher;
use crate::clients::{ClientRegistry, ClientSource, DownloadClient, RemoteItem, RemoteState};
use crate::db::Store;
use crate::domain::events::{DownloadProgress, EventBus, NotificationEvent, emit};
use crate::domain::{ClientKind, Download, DownloadStatus};

/// What happened to one download during a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Nothing to do yet: unmatched, queued usenet job not visible, or the
    /// owning client could not be asked.
    Waiting,
    Progressed,
    Imported,
    Failed,
    /// The row changed underneath the cycle (cancelled or handled elsewhere).
    Skipped,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub checked: usize,
    pub matched: usize,
    pub waiting: usize,
    pub progressed: usize,
    pub imported: usize,
    pub failed: usize,
    pub skipped: usize,
    /// Downloads whose handling raised an error; they are retried next cycle.
    pub errors: usize,
}

impl CycleReport {
    fn record(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Waiting => self.waiting += 1,
            Outcome::Progressed => self.progressed += 1,
            Outcome::Imported => self.imported += 1,
            Outcome::Failed => self.failed += 1,
            Outcome::Skipped => self.skipped += 1,
        }
    }
}

/// Aggregate remote state for one cycle, keyed by `(client_id, remote_id)`.
#[derive(Default)]
struct Snapshot {
    items: HashMap<(i32, String), RemoteItem>,
    failed_clients: HashSet<i32>,
}

impl Snapshot {
    fn get(&self, client_id: i32, remote_id: &str) -> Option<&RemoteItem> {
        self.items.get(&(client_id, remote_id.to_string()))
    }
}

pub struct Reconciler {
    store: Store,
    clients: ClientSource,
    matcher: Arc<dyn TitleMatcher>,
    import: Arc<ImportPipeline>,
    failures: Arc<FailureHandler>,
    event_bus: EventBus,
    stalled_timeout: Option<Duration>,
}

impl Reconciler {
    #[must_use]
    pub fn new(
        store: Store,
        clients: ClientSource,
        matcher: Arc<dyn TitleMatcher>,
        import: Arc<ImportPipeline>,
        failures: Arc<FailureHandler>,
        event_bus: EventBus,
    ) -> Self {
        Self {
            store,
            clients,
            matcher,
            import,
            failures,
            event_bus,
            stalled_timeout: None,
        }
    }

    /// Zero disables stall detection.
    #[must_use]
    pub const fn with_stalled_timeout(mut self, seconds: u64) -> Self {
        self.stalled_timeout = if seconds == 0 {
            None
        } else {
            Some(Duration::from_secs(seconds))
        };
        self
    }

    pub async fn run_cycle(&self) -> Result<CycleReport> {
        let downloads = self.store.list_active_downloads().await?;
        let mut report = CycleReport {
            checked: downloads.len(),
            ..CycleReport::default()
        };
        metrics::counter!("fetcharr_reconcile_cycles_total").increment(1);

        if downloads.is_empty() {
            debug!("No active downloads");
            return Ok(report);
        }

        let registry = self.clients.load().await?;
        let snapshot = Self::snapshot(&registry).await;

        // Ids of finished downloads count too; their torrents may still seed.
        let mut claimed: HashSet<String> =
            self.store.claimed_remote_ids().await?.into_iter().collect();
        let mut progress = Vec::new();

        for mut download in downloads {
            if download.remote_id.is_none() {
                match self.try_match(&mut download, &snapshot, &mut claimed).await {
                    Ok(true) => report.matched += 1,
                    Ok(false) => {
                        report.record(Outcome::Waiting);
                        progress.push(progress_entry(&download, download.progress, download.status));
                        continue;
                    }
                    Err(e) => {
                        report.errors += 1;
                        error!(download_id = download.id, error = %e, "Matching failed");
                        continue;
                    }
                }
            }

            match self.reconcile_one(&download, &registry, &snapshot).await {
                Ok((outcome, entry)) => {
                    report.record(outcome);
                    progress.extend(entry);
                }
                Err(e) => {
                    report.errors += 1;
                    error!(
                        download_id = download.id,
                        title = %download.title,
                        error = %e,
                        "Reconciling download failed"
                    );
                }
            }
        }

        if !progress.is_empty() {
            emit(
                &self.event_bus,
                NotificationEvent::DownloadProgress {
                    downloads: progress,
                },
            );
        }

        if report.imported > 0 || report.failed > 0 || report.matched > 0 {
            info!(
                checked = report.checked,
                matched = report.matched,
                imported = report.imported,
                failed = report.failed,
                "Reconciliation cycle finished"
            );
        } else {
            debug!(?report, "Reconciliation cycle finished");
        }
        Ok(report)
    }

    async fn snapshot(registry: &ClientRegistry) -> Snapshot {
        let fetches = registry.enabled().iter().map(|client| {
            let client = Arc::clone(client);
            async move {
                let result = client.list_active().await;
                (client, result)
            }
        });

        let mut snapshot = Snapshot::default();
        for (client, result) in futures::future::join_all(fetches).await {
            let settings = client.settings();
            match result {
                Ok(items) => {
                    debug!(client = %settings.name, items = items.len(), "Fetched client state");
                    for item in items {
                        snapshot
                            .items
                            .insert((item.client_id, item.remote_id.clone()), item);
                    }
                }
                Err(e) => {
                    metrics::counter!("fetcharr_client_fetch_errors_total", "client" => settings.name.clone())
                        .increment(1);
                    warn!(
                        client = %settings.name,
                        client_id = settings.id,
                        error = %e,
                        "Failed to fetch client state, skipping its downloads this cycle"
                    );
                    snapshot.failed_clients.insert(settings.id);
                }
            }
        }
        snapshot
    }

    /// Pairs an unmatched download with the best-scoring unclaimed remote item.
    async fn try_match(
        &self,
        download: &mut Download,
        snapshot: &Snapshot,
        claimed: &mut HashSet<String>,
    ) -> Result<bool> {
        let best = snapshot
            .items
            .values()
            .filter(|item| !claimed.contains(&item.remote_id))
            .filter(|item| download.client_id.is_none_or(|id| id == item.client_id))
            .filter_map(|item| {
                self.matcher
                    .score(&download.title, &item.name)
                    .map(|score| (score, item))
            })
            .max_by(|(a, x), (b, y)| a.cmp(b).then_with(|| y.remote_id.cmp(&x.remote_id)));

        let Some((score, item)) = best else {
            debug!(download_id = download.id, "No remote item matches yet");
            return Ok(false);
        };

        if !self
            .store
            .set_download_remote(download.id, &item.remote_id, item.client_id)
            .await?
        {
            return Ok(false);
        }

        info!(
            download_id = download.id,
            remote_id = %item.remote_id,
            client_id = item.client_id,
            score,
            event = "download.matched",
            "Matched download to remote item"
        );
        claimed.insert(item.remote_id.clone());
        download.remote_id = Some(item.remote_id.clone());
        download.client_id = Some(item.client_id);
        Ok(true)
    }

    async fn reconcile_one(
        &self,
        download: &Download,
        registry: &ClientRegistry,
        snapshot: &Snapshot,
    ) -> Result<(Outcome, Option<DownloadProgress>)> {
        let Some(remote_id) = download.remote_id.as_deref() else {
            return Ok((Outcome::Waiting, None));
        };
        let Some(client) = download.client_id.and_then(|id| registry.get(id)) else {
            debug!(
                download_id = download.id,
                client_id = ?download.client_id,
                "Owning client is not enabled, leaving download alone"
            );
            return Ok((Outcome::Waiting, None));
        };
        if snapshot.failed_clients.contains(&client.settings().id) {
            return Ok((Outcome::Waiting, None));
        }

        let Some(item) = snapshot.get(client.settings().id, remote_id) else {
            return self.handle_absent(download, &client).await;
        };

        // An interrupted import is picked up again before anything else.
        if download.status == DownloadStatus::Importing {
            return Ok((self.complete(download, Some(item), &client).await?, None));
        }

        if let RemoteState::Failed(reason) = &item.state {
            let reason = format!("Download client reported an error: {reason}");
            return Ok((
                self.fail(download, &client, FailureStage::Remote, &reason)
                    .await?,
                None,
            ));
        }

        if self.is_stalled(item) {
            return Ok((
                self.fail(download, &client, FailureStage::Stalled, "Stalled (0 seeds)")
                    .await?,
                None,
            ));
        }

        if item.is_complete() {
            return Ok((self.complete(download, Some(item), &client).await?, None));
        }

        self.update_progress(download, item).await
    }

    async fn handle_absent(
        &self,
        download: &Download,
        client: &Arc<dyn DownloadClient>,
    ) -> Result<(Outcome, Option<DownloadProgress>)> {
        match client.settings().kind {
            ClientKind::Torrent => Ok((
                self.fail(
                    download,
                    client,
                    FailureStage::Removed,
                    "Removed from download client",
                )
                .await?,
                None,
            )),
            ClientKind::Usenet => match download.status {
                DownloadStatus::Downloading | DownloadStatus::Importing => {
                    info!(
                        download_id = download.id,
                        "Usenet job left the queue without history, treating as complete"
                    );
                    Ok((self.complete(download, None, client).await?, None))
                }
                _ => Ok((
                    Outcome::Waiting,
                    Some(progress_entry(download, download.progress, download.status)),
                )),
            },
        }
    }

    fn is_stalled(&self, item: &RemoteItem) -> bool {
        let Some(timeout) = self.stalled_timeout else {
            return false;
        };
        if item.kind != ClientKind::Torrent
            || item.state != RemoteState::Stalled
            || item.seeds.unwrap_or(0) > 0
        {
            return false;
        }
        let Some(added_on) = item.added_on else {
            return false;
        };
        let elapsed = chrono::Utc::now().timestamp() - added_on;
        elapsed > i64::try_from(timeout.as_secs()).unwrap_or(i64::MAX)
    }

    async fn update_progress(
        &self,
        download: &Download,
        item: &RemoteItem,
    ) -> Result<(Outcome, Option<DownloadProgress>)> {
        let next = if download.status == DownloadStatus::Queued && item.progress > 0.0 {
            DownloadStatus::Downloading
        } else {
            download.status
        };

        let changed = next != download.status || (item.progress - download.progress).abs() > f64::EPSILON;
        if changed
            && !self
                .store
                .update_download_progress(download.id, download.status, next, item.progress)
                .await?
        {
            return Ok((Outcome::Skipped, None));
        }

        if next != download.status {
            info!(
                download_id = download.id,
                from = %download.status,
                to = %next,
                "Download started"
            );
        }

        Ok((
            Outcome::Progressed,
            Some(progress_entry(download, item.progress, next)),
        ))
    }

    /// Marks the download importing before touching the filesystem, imports,
    /// then completes it or routes the error to failure handling.
    async fn complete(
        &self,
        download: &Download,
        item: Option<&RemoteItem>,
        client: &Arc<dyn DownloadClient>,
    ) -> Result<Outcome> {
        if !self
            .store
            .transition_download(
                download.id,
                download.status,
                DownloadStatus::Importing,
                None,
            )
            .await?
        {
            return Ok(Outcome::Skipped);
        }
        info!(download_id = download.id, title = %download.title, "Importing download");

        let summary = match self
            .import
            .import(download, item, Some(client.settings()))
            .await
        {
            Ok(summary) => summary,
            Err(e) => {
                let handled = self
                    .failures
                    .handle(
                        download,
                        DownloadStatus::Importing,
                        Some(client),
                        e.stage(),
                        &e.to_string(),
                    )
                    .await?;
                return Ok(if handled {
                    Outcome::Failed
                } else {
                    Outcome::Skipped
                });
            }
        };

        if !self
            .store
            .transition_download(
                download.id,
                DownloadStatus::Importing,
                DownloadStatus::Completed,
                None,
            )
            .await?
        {
            warn!(download_id = download.id, "Download vanished while importing");
            return Ok(Outcome::Skipped);
        }

        if client.settings().remove_completed
            && let Some(remote_id) = download.remote_id.as_deref()
            && let Err(e) = client.remove(remote_id, false).await
        {
            warn!(
                download_id = download.id,
                client = %client.settings().name,
                error = %e,
                "Failed to remove completed item from client"
            );
        }

        emit(
            &self.event_bus,
            NotificationEvent::ImportCompleted {
                download_id: download.id,
                target: download.target,
                files: summary.files.len(),
            },
        );
        Ok(Outcome::Imported)
    }

    async fn fail(
        &self,
        download: &Download,
        client: &Arc<dyn DownloadClient>,
        stage: FailureStage,
        reason: &str,
    ) -> Result<Outcome> {
        let handled = self
            .failures
            .handle(download, download.status, Some(client), stage, reason)
            .await?;
        Ok(if handled {
            Outcome::Failed
        } else {
            Outcome::Skipped
        })
    }
}

fn progress_entry(download: &Download, progress: f64, status: DownloadStatus) -> DownloadProgress {
    DownloadProgress {
        download_id: download.id,
        title: download.title.clone(),
        progress,
        status: status.to_string(),
    }
}
