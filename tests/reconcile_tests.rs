//! End-to-end reconciliation cycles against a scripted download client.

use anyhow::Result;
use async_trait::async_trait;
use fetcharr::clients::{
    AddRequest, AddResult, ClientError, ClientRegistry, ClientSettings, ClientSource,
    DownloadClient, RemoteItem, RemoteState,
};
use fetcharr::config::Config;
use fetcharr::db::{NewDownload, NewMediaFile, NewMovie, Store};
use fetcharr::domain::{ClientKind, DownloadStatus, MediaTarget, ProperPreference};
use fetcharr::models::media::MediaInfo;
use fetcharr::quality::RejectReason;
use fetcharr::services::{DownloadError, GrabRequest, MediaProbe, SearchCollaborator};
use fetcharr::state::{Collaborators, SharedState};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tokio::sync::{Notify, broadcast};

const CLIENT_ID: i32 = 1;
const RELEASE: &str = "Movie.Title.2020.1080p.BluRay.x264-GRP";

struct FakeClient {
    settings: ClientSettings,
    items: Mutex<Vec<RemoteItem>>,
    removed: Mutex<Vec<(String, bool)>>,
    added: Mutex<Vec<AddRequest>>,
    unreachable: Mutex<bool>,
    /// `(entered, release)`: listing signals `entered`, then waits for `release`.
    gate: Mutex<Option<(Arc<Notify>, Arc<Notify>)>>,
}

impl FakeClient {
    fn new(kind: ClientKind) -> Self {
        Self::with_id(kind, CLIENT_ID)
    }

    fn with_id(kind: ClientKind, id: i32) -> Self {
        Self {
            settings: ClientSettings {
                id,
                name: "fake".to_string(),
                kind,
                host: "localhost".to_string(),
                port: 8080,
                use_tls: false,
                url_base: None,
                username: None,
                password: None,
                api_key: None,
                default_category: None,
                movie_category: None,
                tv_category: None,
                movie_directory: None,
                tv_directory: None,
                priority: 1,
                enabled: true,
                remove_completed: false,
                remove_failed: false,
            },
            items: Mutex::new(Vec::new()),
            removed: Mutex::new(Vec::new()),
            added: Mutex::new(Vec::new()),
            unreachable: Mutex::new(false),
            gate: Mutex::new(None),
        }
    }

    fn hold_listing(&self) -> (Arc<Notify>, Arc<Notify>) {
        let gate = (Arc::new(Notify::new()), Arc::new(Notify::new()));
        *self.gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    fn set_items(&self, items: Vec<RemoteItem>) {
        *self.items.lock().unwrap() = items;
    }

    fn removed(&self) -> Vec<(String, bool)> {
        self.removed.lock().unwrap().clone()
    }
}

#[async_trait]
impl DownloadClient for FakeClient {
    fn settings(&self) -> &ClientSettings {
        &self.settings
    }

    async fn test_connection(&self) -> Result<String, ClientError> {
        Ok("fake/1.0".to_string())
    }

    async fn add(&self, request: &AddRequest) -> Result<AddResult, ClientError> {
        self.added.lock().unwrap().push(request.clone());
        Ok(AddResult {
            success: true,
            remote_id: Some("grabbed-1".to_string()),
        })
    }

    async fn list_active(&self) -> Result<Vec<RemoteItem>, ClientError> {
        let gate = self.gate.lock().unwrap().clone();
        if let Some((entered, release)) = gate {
            entered.notify_one();
            release.notified().await;
        }
        if *self.unreachable.lock().unwrap() {
            return Err(ClientError::ConnectionRefused {
                url: "http://localhost:8080".to_string(),
            });
        }
        Ok(self.items.lock().unwrap().clone())
    }

    async fn remove(&self, remote_id: &str, delete_files: bool) -> Result<(), ClientError> {
        self.removed
            .lock()
            .unwrap()
            .push((remote_id.to_string(), delete_files));
        self.items
            .lock()
            .unwrap()
            .retain(|item| item.remote_id != remote_id);
        Ok(())
    }
}

#[derive(Default)]
struct RecordingSearch {
    requests: Mutex<Vec<MediaTarget>>,
}

#[async_trait]
impl SearchCollaborator for RecordingSearch {
    async fn search_and_grab(&self, target: MediaTarget) -> Result<bool> {
        self.requests.lock().unwrap().push(target);
        Ok(true)
    }
}

struct NoProbe;

#[async_trait]
impl MediaProbe for NoProbe {
    async fn probe(&self, _path: &Path) -> Result<MediaInfo> {
        anyhow::bail!("probe unavailable in tests")
    }
}

struct Harness {
    _dir: TempDir,
    root: PathBuf,
    state: SharedState,
    client: Arc<FakeClient>,
    extra: Vec<Arc<FakeClient>>,
    search: Arc<RecordingSearch>,
}

async fn harness(client: FakeClient, configure: impl FnOnce(&mut Config)) -> Harness {
    harness_with(client, Vec::new(), configure).await
}

/// `extra` clients are listed after `client` in the registry.
async fn harness_with(
    client: FakeClient,
    extra: Vec<FakeClient>,
    configure: impl FnOnce(&mut Config),
) -> Harness {
    let dir = tempfile::tempdir().expect("tempdir");
    let root = dir.path().to_path_buf();

    let mut config = Config::default();
    config.general.database_path = format!("sqlite:{}?mode=rwc", root.join("test.db").display());
    config.library.movie_root = root.join("library/movies").to_string_lossy().into_owned();
    config.library.tv_root = root.join("library/tv").to_string_lossy().into_owned();
    config.library.downloads_root = root.join("downloads").to_string_lossy().into_owned();
    configure(&mut config);

    let store = Store::new(&config.general.database_path)
        .await
        .expect("store");
    store.initialize(&config).await.expect("initialize");

    let client = Arc::new(client);
    let search = Arc::new(RecordingSearch::default());
    let extra: Vec<Arc<FakeClient>> = extra.into_iter().map(Arc::new).collect();
    let mut clients = vec![client.clone() as Arc<dyn DownloadClient>];
    clients.extend(extra.iter().map(|c| c.clone() as Arc<dyn DownloadClient>));
    let registry = ClientRegistry::from_clients(clients);
    let (event_bus, _) = broadcast::channel(64);

    let state = SharedState::assemble(
        config,
        store,
        event_bus,
        Collaborators {
            clients: Some(ClientSource::Fixed(registry)),
            probe: Arc::new(NoProbe),
            search: search.clone(),
        },
    );

    Harness {
        _dir: dir,
        root,
        state,
        client,
        extra,
        search,
    }
}

async fn add_movie(store: &Store) -> i32 {
    store
        .insert_movie(NewMovie {
            title: "Movie Title".to_string(),
            year: Some(2020),
            monitored: true,
            ..Default::default()
        })
        .await
        .expect("insert movie")
}

async fn add_download(
    store: &Store,
    movie_id: i32,
    remote_id: Option<&str>,
    save_path: Option<String>,
) -> i32 {
    store
        .create_download(NewDownload {
            target: MediaTarget::Movie { movie_id },
            title: RELEASE.to_string(),
            download_url: "magnet:?xt=urn:btih:abc".to_string(),
            size: Some(1_000),
            seeders: Some(10),
            indexer: Some("tracker".to_string()),
            quality: Some("Bluray-1080p".to_string()),
            remote_id: remote_id.map(str::to_string),
            client_id: Some(CLIENT_ID),
            save_path,
        })
        .await
        .expect("create download")
        .id
}

fn item(remote_id: &str, kind: ClientKind, state: RemoteState, progress: f64) -> RemoteItem {
    RemoteItem {
        remote_id: remote_id.to_string(),
        client_id: CLIENT_ID,
        kind,
        name: RELEASE.to_string(),
        progress,
        state,
        content_path: None,
        save_path: None,
        category: None,
        size_total: Some(1_000),
        size_left: Some(0),
        added_on: Some(chrono::Utc::now().timestamp()),
        seeds: Some(5),
    }
}

fn write_release(dir: &Path) -> PathBuf {
    let release_dir = dir.join(RELEASE);
    std::fs::create_dir_all(&release_dir).unwrap();
    let file = release_dir.join(format!("{RELEASE}.mkv"));
    std::fs::write(&file, vec![0u8; 2048]).unwrap();
    release_dir
}

async fn status_of(store: &Store, id: i32) -> DownloadStatus {
    store.get_download(id).await.unwrap().unwrap().status
}

#[tokio::test]
async fn test_vanished_torrent_fails_once() {
    let h = harness(FakeClient::new(ClientKind::Torrent), |_| {}).await;
    let store = &h.state.store;
    let movie_id = add_movie(store).await;
    let id = add_download(store, movie_id, Some("hash1"), None).await;

    let report = h.state.reconciler.run_cycle().await.unwrap();
    assert_eq!(report.failed, 1);

    let download = store.get_download(id).await.unwrap().unwrap();
    assert_eq!(download.status, DownloadStatus::Failed);
    assert_eq!(
        download.error_message.as_deref(),
        Some("Removed from download client")
    );

    let report = h.state.reconciler.run_cycle().await.unwrap();
    assert_eq!(report.checked, 0);

    let entries = store
        .blacklist_for_target(MediaTarget::Movie { movie_id })
        .await
        .unwrap();
    assert_eq!(entries.len(), 1);
    assert!(h.search.requests.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_unmatched_download_is_paired_by_title() {
    let h = harness(FakeClient::new(ClientKind::Torrent), |_| {}).await;
    let store = &h.state.store;
    let movie_id = add_movie(store).await;
    let id = add_download(store, movie_id, None, None).await;

    let mut remote = item("abc", ClientKind::Torrent, RemoteState::Downloading, 40.0);
    remote.name = "Movie Title 2020 1080p BluRay x264-GRP".to_string();
    let mut other = item("zzz", ClientKind::Torrent, RemoteState::Downloading, 10.0);
    other.name = "Completely Different Show S01E01".to_string();
    h.client.set_items(vec![other, remote]);

    let report = h.state.reconciler.run_cycle().await.unwrap();
    assert_eq!(report.matched, 1);
    assert_eq!(report.progressed, 1);

    let download = store.get_download(id).await.unwrap().unwrap();
    assert_eq!(download.remote_id.as_deref(), Some("abc"));
    assert_eq!(download.status, DownloadStatus::Downloading);
    assert!((download.progress - 40.0).abs() < f64::EPSILON);
}

#[tokio::test]
async fn test_unmatched_download_waits_without_candidates() {
    let h = harness(FakeClient::new(ClientKind::Torrent), |_| {}).await;
    let store = &h.state.store;
    let movie_id = add_movie(store).await;
    let id = add_download(store, movie_id, None, None).await;

    let mut unrelated = item("zzz", ClientKind::Torrent, RemoteState::Downloading, 10.0);
    unrelated.name = "Completely Different Show S01E01".to_string();
    h.client.set_items(vec![unrelated]);

    let report = h.state.reconciler.run_cycle().await.unwrap();
    assert_eq!(report.waiting, 1);
    assert_eq!(status_of(store, id).await, DownloadStatus::Queued);
}

#[tokio::test]
async fn test_completed_torrent_is_imported_and_removed() {
    let mut client = FakeClient::new(ClientKind::Torrent);
    client.settings.remove_completed = true;
    let h = harness(client, |_| {}).await;
    let store = &h.state.store;
    let movie_id = add_movie(store).await;
    let id = add_download(store, movie_id, Some("hash1"), None).await;

    let release_dir = write_release(&h.root.join("seeding"));
    let mut remote = item("hash1", ClientKind::Torrent, RemoteState::Completed, 100.0);
    remote.content_path = Some(release_dir.to_string_lossy().into_owned());
    h.client.set_items(vec![remote]);

    let report = h.state.reconciler.run_cycle().await.unwrap();
    assert_eq!(report.imported, 1, "{report:?}");
    assert_eq!(status_of(store, id).await, DownloadStatus::Completed);

    let files = store.movie_files(movie_id).await.unwrap();
    assert_eq!(files.len(), 1);
    assert!(Path::new(&files[0].path).exists());
    assert!(files[0].path.starts_with(&*h.state.config.library.movie_root));
    // Hardlinked out of the seeding folder, so the source stays for seeding.
    assert!(release_dir.join(format!("{RELEASE}.mkv")).exists());

    assert_eq!(h.client.removed(), vec![("hash1".to_string(), false)]);

    // Cutoff is Bluray-1080p in the default profile.
    let movie = store.get_movie(movie_id).await.unwrap().unwrap();
    assert!(!movie.monitored);

    // A second cycle finds nothing active and imports nothing again.
    let report = h.state.reconciler.run_cycle().await.unwrap();
    assert_eq!(report.checked, 0);
    assert_eq!(store.movie_files(movie_id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_usenet_job_leaving_queue_completes_from_save_path() {
    let h = harness(FakeClient::new(ClientKind::Usenet), |_| {}).await;
    let store = &h.state.store;
    let movie_id = add_movie(store).await;

    let complete_dir = h.root.join("usenet/complete");
    write_release(&complete_dir);
    let id = add_download(
        store,
        movie_id,
        Some("SABnzbd_nzo_1"),
        Some(complete_dir.to_string_lossy().into_owned()),
    )
    .await;

    // Seen in the queue first, so the download is known to have started.
    h.client.set_items(vec![item(
        "SABnzbd_nzo_1",
        ClientKind::Usenet,
        RemoteState::Downloading,
        50.0,
    )]);
    let report = h.state.reconciler.run_cycle().await.unwrap();
    assert_eq!(report.progressed, 1);
    assert_eq!(status_of(store, id).await, DownloadStatus::Downloading);

    h.client.set_items(Vec::new());
    let report = h.state.reconciler.run_cycle().await.unwrap();
    assert_eq!(report.imported, 1, "{report:?}");
    assert_eq!(status_of(store, id).await, DownloadStatus::Completed);
    assert_eq!(store.movie_files(movie_id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_queued_usenet_job_not_yet_visible_waits() {
    let h = harness(FakeClient::new(ClientKind::Usenet), |_| {}).await;
    let store = &h.state.store;
    let movie_id = add_movie(store).await;
    let id = add_download(store, movie_id, Some("SABnzbd_nzo_2"), None).await;

    let report = h.state.reconciler.run_cycle().await.unwrap();
    assert_eq!(report.waiting, 1);
    assert_eq!(status_of(store, id).await, DownloadStatus::Queued);
}

#[tokio::test]
async fn test_stalled_torrent_fails_and_is_purged() {
    let mut client = FakeClient::new(ClientKind::Torrent);
    client.settings.remove_failed = true;
    let h = harness(client, |c| c.monitor.stalled_timeout_seconds = 600).await;
    let store = &h.state.store;
    let movie_id = add_movie(store).await;
    let id = add_download(store, movie_id, Some("hash1"), None).await;

    let mut remote = item("hash1", ClientKind::Torrent, RemoteState::Stalled, 3.0);
    remote.seeds = Some(0);
    remote.added_on = Some(chrono::Utc::now().timestamp() - 3_600);
    h.client.set_items(vec![remote]);

    let report = h.state.reconciler.run_cycle().await.unwrap();
    assert_eq!(report.failed, 1);

    let download = store.get_download(id).await.unwrap().unwrap();
    assert_eq!(download.status, DownloadStatus::Failed);
    assert_eq!(download.error_message.as_deref(), Some("Stalled (0 seeds)"));
    assert_eq!(h.client.removed(), vec![("hash1".to_string(), true)]);
}

#[tokio::test]
async fn test_recently_added_stalled_torrent_keeps_waiting() {
    let h = harness(FakeClient::new(ClientKind::Torrent), |c| {
        c.monitor.stalled_timeout_seconds = 600;
    })
    .await;
    let store = &h.state.store;
    let movie_id = add_movie(store).await;
    let id = add_download(store, movie_id, Some("hash1"), None).await;

    let mut remote = item("hash1", ClientKind::Torrent, RemoteState::Stalled, 0.0);
    remote.seeds = Some(0);
    h.client.set_items(vec![remote]);

    let report = h.state.reconciler.run_cycle().await.unwrap();
    assert_eq!(report.failed, 0);
    assert_eq!(status_of(store, id).await, DownloadStatus::Queued);
}

#[tokio::test]
async fn test_client_error_state_triggers_redownload() {
    let h = harness(FakeClient::new(ClientKind::Torrent), |c| {
        c.media_management.redownload_failed = true;
    })
    .await;
    let store = &h.state.store;
    let movie_id = add_movie(store).await;
    let id = add_download(store, movie_id, Some("hash1"), None).await;

    h.client.set_items(vec![item(
        "hash1",
        ClientKind::Torrent,
        RemoteState::Failed("missing files".to_string()),
        12.0,
    )]);
    let mut events = h.state.event_bus.subscribe();

    let report = h.state.reconciler.run_cycle().await.unwrap();
    assert_eq!(report.failed, 1);

    let download = store.get_download(id).await.unwrap().unwrap();
    assert!(
        download
            .error_message
            .as_deref()
            .unwrap_or_default()
            .contains("missing files")
    );
    assert_eq!(
        *h.search.requests.lock().unwrap(),
        vec![MediaTarget::Movie { movie_id }]
    );
    // remove_failed is off, so the item stays on the client.
    assert!(h.client.removed().is_empty());

    let mut saw_redownload = false;
    while let Ok(event) = events.try_recv() {
        if matches!(
            event,
            fetcharr::domain::events::NotificationEvent::RedownloadRequested { found: true, .. }
        ) {
            saw_redownload = true;
        }
    }
    assert!(saw_redownload);
}

#[tokio::test]
async fn test_unreachable_client_leaves_downloads_alone() {
    let h = harness(FakeClient::new(ClientKind::Torrent), |_| {}).await;
    let store = &h.state.store;
    let movie_id = add_movie(store).await;
    let id = add_download(store, movie_id, Some("hash1"), None).await;
    *h.client.unreachable.lock().unwrap() = true;

    let report = h.state.reconciler.run_cycle().await.unwrap();
    assert_eq!(report.waiting, 1);
    assert_eq!(report.failed, 0);
    assert_eq!(status_of(store, id).await, DownloadStatus::Queued);
    assert!(
        store
            .blacklist_for_target(MediaTarget::Movie { movie_id })
            .await
            .unwrap()
            .is_empty()
    );
}

#[tokio::test]
async fn test_missing_content_fails_with_attempted_paths() {
    let h = harness(FakeClient::new(ClientKind::Torrent), |_| {}).await;
    let store = &h.state.store;
    let movie_id = add_movie(store).await;
    let id = add_download(store, movie_id, Some("hash1"), None).await;

    let mut remote = item("hash1", ClientKind::Torrent, RemoteState::Completed, 100.0);
    remote.content_path = Some("/remote/only/path/Movie".to_string());
    h.client.set_items(vec![remote]);

    let report = h.state.reconciler.run_cycle().await.unwrap();
    assert_eq!(report.failed, 1);

    let download = store.get_download(id).await.unwrap().unwrap();
    assert_eq!(download.status, DownloadStatus::Failed);
    let message = download.error_message.unwrap_or_default();
    assert!(message.contains("/remote/only/path/Movie"));
    assert!(message.contains("remote path mappings"));
}

#[tokio::test]
async fn test_monitor_runs_single_cycle() {
    let h = harness(FakeClient::new(ClientKind::Torrent), |_| {}).await;
    assert!(!h.state.monitor.is_running());

    let report = h.state.monitor.run_once().await.expect("cycle ran").unwrap();
    assert_eq!(report.checked, 0);
    assert!(!h.state.monitor.is_running());
}

#[tokio::test]
async fn test_grab_and_cancel() {
    let h = harness(FakeClient::new(ClientKind::Torrent), |_| {}).await;
    let store = &h.state.store;
    let movie_id = add_movie(store).await;

    let request = GrabRequest {
        target: MediaTarget::Movie { movie_id },
        kind: ClientKind::Torrent,
        title: RELEASE.to_string(),
        download_url: "magnet:?xt=urn:btih:abc".to_string(),
        size: Some(1_000),
        seeders: Some(3),
        indexer: Some("tracker".to_string()),
        quality: Some("Bluray-1080p".to_string()),
    };

    let download = h.state.downloads.grab(request.clone()).await.unwrap();
    assert_eq!(download.status, DownloadStatus::Queued);
    assert_eq!(download.remote_id.as_deref(), Some("grabbed-1"));
    assert_eq!(download.client_id, Some(CLIENT_ID));
    {
        let added = h.client.added.lock().unwrap();
        assert_eq!(added.len(), 1);
        assert_eq!(added[0].category.as_deref(), Some("movies"));
    }

    let cancelled = h.state.downloads.cancel(download.id, true).await.unwrap();
    assert_eq!(cancelled.id, download.id);
    assert_eq!(h.client.removed(), vec![("grabbed-1".to_string(), true)]);
    assert!(store.get_download(download.id).await.unwrap().is_none());

    assert!(matches!(
        h.state.downloads.cancel(download.id, false).await,
        Err(DownloadError::NotFound(_))
    ));

    store
        .add_to_blacklist(fetcharr::db::NewBlacklistEntry {
            target: MediaTarget::Movie { movie_id },
            source_title: RELEASE.to_string(),
            reason: "manual".to_string(),
            indexer: None,
        })
        .await
        .unwrap();
    assert!(matches!(
        h.state.downloads.grab(request).await,
        Err(DownloadError::Blacklisted(_))
    ));
}

#[tokio::test]
async fn test_fuzzy_match_skips_items_of_finished_downloads() {
    let h = harness(FakeClient::new(ClientKind::Torrent), |_| {}).await;
    let store = &h.state.store;
    let movie_id = add_movie(store).await;

    let old = add_download(store, movie_id, Some("oldhash"), None).await;
    for (from, to) in [
        (DownloadStatus::Queued, DownloadStatus::Importing),
        (DownloadStatus::Importing, DownloadStatus::Completed),
    ] {
        assert!(store.transition_download(old, from, to, None).await.unwrap());
    }
    let new = add_download(store, movie_id, None, None).await;

    // The previous release is still seeding under the same title.
    h.client.set_items(vec![item(
        "oldhash",
        ClientKind::Torrent,
        RemoteState::Completed,
        100.0,
    )]);

    let report = h.state.reconciler.run_cycle().await.unwrap();
    assert_eq!(report.matched, 0, "{report:?}");
    assert_eq!(report.failed, 0, "{report:?}");
    assert_eq!(report.waiting, 1);

    let download = store.get_download(new).await.unwrap().unwrap();
    assert_eq!(download.remote_id, None);
    assert_eq!(download.status, DownloadStatus::Queued);
    assert_eq!(status_of(store, old).await, DownloadStatus::Completed);
    assert!(
        store
            .blacklist_for_target(MediaTarget::Movie { movie_id })
            .await
            .unwrap()
            .is_empty()
    );
}

#[tokio::test]
async fn test_same_hash_on_two_clients_stays_with_owner() {
    const OTHER_CLIENT: i32 = 2;
    let h = harness_with(
        FakeClient::new(ClientKind::Torrent),
        vec![FakeClient::with_id(ClientKind::Torrent, OTHER_CLIENT)],
        |_| {},
    )
    .await;
    let store = &h.state.store;
    let movie_id = add_movie(store).await;
    let id = add_download(store, movie_id, Some("hash1"), None).await;

    h.client.set_items(vec![item(
        "hash1",
        ClientKind::Torrent,
        RemoteState::Downloading,
        30.0,
    )]);
    let mut foreign = item(
        "hash1",
        ClientKind::Torrent,
        RemoteState::Failed("tracker error".to_string()),
        0.0,
    );
    foreign.client_id = OTHER_CLIENT;
    h.extra[0].set_items(vec![foreign]);

    let report = h.state.reconciler.run_cycle().await.unwrap();
    assert_eq!(report.progressed, 1, "{report:?}");
    assert_eq!(report.failed, 0);

    let download = store.get_download(id).await.unwrap().unwrap();
    assert_eq!(download.status, DownloadStatus::Downloading);
    assert!((download.progress - 30.0).abs() < f64::EPSILON);
}

#[tokio::test]
async fn test_overlapping_tick_is_skipped() {
    let h = harness(FakeClient::new(ClientKind::Torrent), |_| {}).await;
    let store = &h.state.store;
    let movie_id = add_movie(store).await;
    add_download(store, movie_id, Some("hash1"), None).await;
    h.client.set_items(vec![item(
        "hash1",
        ClientKind::Torrent,
        RemoteState::Downloading,
        50.0,
    )]);
    let (entered, release) = h.client.hold_listing();

    let monitor = h.state.monitor.clone();
    let first = tokio::spawn(async move { monitor.run_once().await });
    entered.notified().await;

    assert!(h.state.monitor.is_running());
    assert!(h.state.monitor.run_once().await.is_none());

    release.notify_one();
    let report = first
        .await
        .unwrap()
        .expect("first cycle ran")
        .unwrap();
    assert_eq!(report.checked, 1);
    assert_eq!(report.progressed, 1);
    assert!(!h.state.monitor.is_running());
}

#[tokio::test]
async fn test_grab_rejects_release_that_is_not_an_upgrade() {
    let h = harness(FakeClient::new(ClientKind::Torrent), |_| {}).await;
    let store = &h.state.store;
    let movie_id = add_movie(store).await;
    store
        .add_movie_file(
            movie_id,
            NewMediaFile {
                path: "/library/movies/Movie Title (2020)/movie.mkv".to_string(),
                size: 4096,
                quality: "Bluray-1080p".to_string(),
                proper: false,
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let request = |title: &str, quality: &str| GrabRequest {
        target: MediaTarget::Movie { movie_id },
        kind: ClientKind::Torrent,
        title: title.to_string(),
        download_url: "magnet:?xt=urn:btih:def".to_string(),
        size: None,
        seeders: None,
        indexer: None,
        quality: Some(quality.to_string()),
    };

    let err = h
        .state
        .downloads
        .grab(request("Movie.Title.2020.720p.WEB-DL.x264-GRP", "WEBDL-720p"))
        .await
        .unwrap_err();
    assert!(
        matches!(
            err,
            DownloadError::NotAnUpgrade {
                reason: RejectReason::AlreadyAtCutoff,
                ..
            }
        ),
        "{err}"
    );
    assert!(h.client.added.lock().unwrap().is_empty());

    let proper = h
        .state
        .downloads
        .grab(request("Movie.Title.2020.1080p.BluRay.PROPER.x264-GRP", "Bluray-1080p"))
        .await
        .unwrap();
    assert_eq!(proper.status, DownloadStatus::Queued);
    assert_eq!(h.client.added.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_grab_honours_proper_preference() {
    let h = harness(FakeClient::new(ClientKind::Torrent), |c| {
        c.media_management.proper_preference = ProperPreference::DoNotUpgrade;
    })
    .await;
    let store = &h.state.store;
    let movie_id = add_movie(store).await;
    store
        .add_movie_file(
            movie_id,
            NewMediaFile {
                path: "/library/movies/Movie Title (2020)/movie.mkv".to_string(),
                size: 4096,
                quality: "Bluray-1080p".to_string(),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let err = h
        .state
        .downloads
        .grab(GrabRequest {
            target: MediaTarget::Movie { movie_id },
            kind: ClientKind::Torrent,
            title: "Movie.Title.2020.1080p.BluRay.PROPER.x264-GRP".to_string(),
            download_url: "magnet:?xt=urn:btih:def".to_string(),
            size: None,
            seeders: None,
            indexer: None,
            quality: None,
        })
        .await
        .unwrap_err();
    assert!(
        matches!(
            err,
            DownloadError::NotAnUpgrade {
                reason: RejectReason::PropersDisabled,
                ..
            }
        ),
        "{err}"
    );
}
