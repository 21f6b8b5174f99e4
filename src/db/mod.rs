use crate::clients::ClientSettings;
use crate::config::Config;
use crate::domain::{Download, DownloadStatus, MediaTarget};
use crate::naming::NamingConfig;
use crate::quality::{QualityLadder, QualityProfile};
use anyhow::Result;
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use std::path::Path;
use std::time::Duration;
use tracing::info;

pub mod migrator;
pub mod repositories;

pub use repositories::blacklist::{BlacklistEntry, NewBlacklistEntry, normalize_release_title};
pub use repositories::download::NewDownload;
pub use repositories::media::{
    Episode, EpisodeFile, Movie, MovieFile, NewEpisode, NewMediaFile, NewMovie, NewSeries,
    Season, SeriesRow,
};

#[derive(Clone)]
pub struct Store {
    pub conn: DatabaseConnection,
}

impl Store {
    pub async fn new(db_url: &str) -> Result<Self> {
        Self::with_pool_options(db_url, 5, 1).await
    }

    pub async fn with_pool_options(
        db_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self> {
        use sea_orm_migration::MigratorTrait;

        if !db_url.contains(":memory:") {
            let path_str = db_url
                .trim_start_matches("sqlite:")
                .split('?')
                .next()
                .unwrap_or_default();
            if let Some(parent) = Path::new(path_str).parent() {
                tokio::fs::create_dir_all(parent).await.ok();
            }
            if !Path::new(path_str).exists() {
                std::fs::File::create(path_str)?;
            }
        }

        let mut opt = ConnectOptions::new(db_url.to_string());
        opt.max_connections(max_connections)
            .min_connections(min_connections)
            .connect_timeout(Duration::from_secs(10))
            .acquire_timeout(Duration::from_secs(10))
            .idle_timeout(Duration::from_secs(300))
            .max_lifetime(Duration::from_secs(600))
            .sqlx_logging(false);

        let conn = Database::connect(opt).await?;

        migrator::Migrator::up(&conn, None).await?;

        info!(
            "Database connected & migrations applied (pool: {}-{})",
            min_connections, max_connections
        );

        Ok(Self { conn })
    }

    /// Seeds the quality ladder, syncs profiles and download clients from the
    /// configuration and makes sure the naming row exists.
    pub async fn initialize(&self, config: &Config) -> Result<()> {
        self.quality_repo().seed_definitions().await?;
        self.quality_repo().sync_profiles(&config.profiles).await?;
        self.client_repo()
            .sync_from_config(&config.download_clients)
            .await?;
        self.naming_repo().ensure(&config.naming).await?;
        Ok(())
    }

    fn download_repo(&self) -> repositories::download::DownloadRepository {
        repositories::download::DownloadRepository::new(self.conn.clone())
    }

    fn blacklist_repo(&self) -> repositories::blacklist::BlacklistRepository {
        repositories::blacklist::BlacklistRepository::new(self.conn.clone())
    }

    fn client_repo(&self) -> repositories::client::ClientRepository {
        repositories::client::ClientRepository::new(self.conn.clone())
    }

    fn quality_repo(&self) -> repositories::quality::QualityRepository {
        repositories::quality::QualityRepository::new(self.conn.clone())
    }

    fn naming_repo(&self) -> repositories::naming::NamingRepository {
        repositories::naming::NamingRepository::new(self.conn.clone())
    }

    fn media_repo(&self) -> repositories::media::MediaRepository {
        repositories::media::MediaRepository::new(self.conn.clone())
    }

    // Downloads

    pub async fn create_download(&self, new: NewDownload) -> Result<Download> {
        self.download_repo().create(new).await
    }

    pub async fn get_download(&self, id: i32) -> Result<Option<Download>> {
        self.download_repo().get(id).await
    }

    pub async fn list_active_downloads(&self) -> Result<Vec<Download>> {
        self.download_repo().list_active().await
    }

    pub async fn claimed_remote_ids(&self) -> Result<Vec<String>> {
        self.download_repo().claimed_remote_ids().await
    }

    pub async fn recent_downloads(&self, limit: u64) -> Result<Vec<Download>> {
        self.download_repo().recent(limit).await
    }

    pub async fn set_download_remote(
        &self,
        id: i32,
        remote_id: &str,
        client_id: i32,
    ) -> Result<bool> {
        self.download_repo()
            .set_remote(id, remote_id, client_id)
            .await
    }

    pub async fn transition_download(
        &self,
        id: i32,
        from: DownloadStatus,
        to: DownloadStatus,
        error_message: Option<&str>,
    ) -> Result<bool> {
        self.download_repo()
            .transition(id, from, to, error_message)
            .await
    }

    pub async fn update_download_progress(
        &self,
        id: i32,
        current: DownloadStatus,
        next: DownloadStatus,
        progress: f64,
    ) -> Result<bool> {
        self.download_repo()
            .update_progress(id, current, next, progress)
            .await
    }

    pub async fn delete_download(&self, id: i32) -> Result<bool> {
        self.download_repo().delete(id).await
    }

    // Blacklist

    pub async fn is_blacklisted(&self, target: MediaTarget, title: &str) -> Result<bool> {
        self.blacklist_repo().is_blacklisted(target, title).await
    }

    pub async fn add_to_blacklist(&self, entry: NewBlacklistEntry) -> Result<bool> {
        self.blacklist_repo().add(entry).await
    }

    pub async fn blacklist_for_target(&self, target: MediaTarget) -> Result<Vec<BlacklistEntry>> {
        self.blacklist_repo().list_for_target(target).await
    }

    pub async fn recent_blacklist(&self, limit: u64) -> Result<Vec<BlacklistEntry>> {
        self.blacklist_repo().recent(limit).await
    }

    // Download clients

    pub async fn list_download_clients(&self) -> Result<Vec<ClientSettings>> {
        self.client_repo().list_all().await
    }

    pub async fn list_enabled_clients(&self) -> Result<Vec<ClientSettings>> {
        self.client_repo().list_enabled().await
    }

    // Quality

    pub async fn quality_ladder(&self) -> Result<QualityLadder> {
        self.quality_repo().ladder().await
    }

    pub async fn get_quality_profile(&self, id: i32) -> Result<Option<QualityProfile>> {
        self.quality_repo().get_profile(id).await
    }

    pub async fn get_quality_profile_by_name(&self, name: &str) -> Result<Option<QualityProfile>> {
        self.quality_repo().get_profile_by_name(name).await
    }

    pub async fn default_quality_profile(&self) -> Result<QualityProfile> {
        self.quality_repo().default_profile().await
    }

    /// The item's profile, falling back to the default when it has none or the
    /// referenced profile is gone.
    pub async fn resolve_quality_profile(&self, id: Option<i32>) -> Result<QualityProfile> {
        if let Some(id) = id
            && let Some(profile) = self.get_quality_profile(id).await?
        {
            return Ok(profile);
        }
        self.default_quality_profile().await
    }

    // Naming

    pub async fn get_naming_config(&self) -> Result<NamingConfig> {
        self.naming_repo().get().await
    }

    pub async fn save_naming_config(&self, config: &NamingConfig) -> Result<()> {
        self.naming_repo().save(config).await
    }

    // Library catalog

    pub async fn insert_movie(&self, movie: NewMovie) -> Result<i32> {
        self.media_repo().insert_movie(movie).await
    }

    pub async fn get_movie(&self, id: i32) -> Result<Option<Movie>> {
        self.media_repo().get_movie(id).await
    }

    pub async fn set_movie_path(&self, id: i32, path: &str) -> Result<()> {
        self.media_repo().set_movie_path(id, path).await
    }

    pub async fn set_movie_monitored(&self, id: i32, monitored: bool) -> Result<bool> {
        self.media_repo().set_movie_monitored(id, monitored).await
    }

    pub async fn movie_files(&self, movie_id: i32) -> Result<Vec<MovieFile>> {
        self.media_repo().movie_files(movie_id).await
    }

    pub async fn delete_movie_file(&self, id: i32) -> Result<()> {
        self.media_repo().delete_movie_file(id).await
    }

    pub async fn add_movie_file(&self, movie_id: i32, file: NewMediaFile) -> Result<i32> {
        self.media_repo().add_movie_file(movie_id, file).await
    }

    pub async fn insert_series(&self, series: NewSeries) -> Result<i32> {
        self.media_repo().insert_series(series).await
    }

    pub async fn get_series(&self, id: i32) -> Result<Option<SeriesRow>> {
        self.media_repo().get_series(id).await
    }

    pub async fn set_series_path(&self, id: i32, path: &str) -> Result<()> {
        self.media_repo().set_series_path(id, path).await
    }

    pub async fn set_series_monitored(&self, id: i32, monitored: bool) -> Result<bool> {
        self.media_repo().set_series_monitored(id, monitored).await
    }

    pub async fn seasons(&self, series_id: i32) -> Result<Vec<Season>> {
        self.media_repo().seasons(series_id).await
    }

    pub async fn get_season(&self, series_id: i32, season_number: i32) -> Result<Option<Season>> {
        self.media_repo().get_season(series_id, season_number).await
    }

    pub async fn set_season_monitored(
        &self,
        series_id: i32,
        season_number: i32,
        monitored: bool,
    ) -> Result<()> {
        self.media_repo()
            .set_season_monitored(series_id, season_number, monitored)
            .await
    }

    pub async fn insert_episode(&self, episode: NewEpisode) -> Result<i32> {
        self.media_repo().insert_episode(episode).await
    }

    pub async fn get_episode(
        &self,
        series_id: i32,
        season_number: i32,
        episode_number: i32,
    ) -> Result<Option<Episode>> {
        self.media_repo()
            .get_episode(series_id, season_number, episode_number)
            .await
    }

    pub async fn episodes_in_season(&self, series_id: i32, season_number: i32) -> Result<Vec<Episode>> {
        self.media_repo()
            .episodes_in_season(series_id, season_number)
            .await
    }

    pub async fn count_monitored_in_season(&self, series_id: i32, season_number: i32) -> Result<u64> {
        self.media_repo()
            .count_monitored_in_season(series_id, season_number)
            .await
    }

    pub async fn set_episode_monitored(
        &self,
        series_id: i32,
        season_number: i32,
        episode_number: i32,
        monitored: bool,
    ) -> Result<bool> {
        self.media_repo()
            .set_episode_monitored(series_id, season_number, episode_number, monitored)
            .await
    }

    pub async fn set_episodes_monitored(
        &self,
        series_id: i32,
        season_number: Option<i32>,
        monitored: bool,
    ) -> Result<u64> {
        self.media_repo()
            .set_episodes_monitored(series_id, season_number, monitored)
            .await
    }

    pub async fn episode_files(
        &self,
        series_id: i32,
        season_number: i32,
        episode_number: i32,
    ) -> Result<Vec<EpisodeFile>> {
        self.media_repo()
            .episode_files(series_id, season_number, episode_number)
            .await
    }

    pub async fn delete_episode_file(&self, id: i32) -> Result<()> {
        self.media_repo().delete_episode_file(id).await
    }

    pub async fn add_episode_file(
        &self,
        series_id: i32,
        season_number: i32,
        episode_number: i32,
        file: NewMediaFile,
    ) -> Result<i32> {
        self.media_repo()
            .add_episode_file(series_id, season_number, episode_number, file)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DownloadClientConfig, QualityProfileConfig};
    use crate::domain::ClientKind;

    async fn temp_store() -> (tempfile::TempDir, Store) {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite:{}?mode=rwc", dir.path().join("test.db").display());
        let store = Store::new(&url).await.unwrap();
        (dir, store)
    }

    fn client(name: &str, kind: ClientKind, priority: i32) -> DownloadClientConfig {
        DownloadClientConfig {
            name: name.to_string(),
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
            priority,
            enabled: true,
            remove_completed: false,
            remove_failed: true,
        }
    }

    #[tokio::test]
    async fn test_initialize_seeds_and_syncs() {
        let (_dir, store) = temp_store().await;

        let mut config = Config::default();
        config.profiles = vec![QualityProfileConfig {
            name: "HD".to_string(),
            cutoff: "WEB-1080p".to_string(),
            upgrade_allowed: true,
            allowed_qualities: vec!["WEB-720p".to_string(), "WEB-1080p".to_string()],
        }];
        config.download_clients = vec![
            client("qbit", ClientKind::Torrent, 1),
            client("sab", ClientKind::Usenet, 2),
        ];

        store.initialize(&config).await.unwrap();
        // Second run must be idempotent.
        store.initialize(&config).await.unwrap();

        let ladder = store.quality_ladder().await.unwrap();
        assert_eq!(ladder.weight_of("Bluray-1080p"), 17);

        let profile = store
            .get_quality_profile_by_name("HD")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(profile.items.len(), 2);
        assert_eq!(profile.cutoff, "WEB-1080p");

        let clients = store.list_enabled_clients().await.unwrap();
        assert_eq!(clients.len(), 2);
        assert_eq!(clients[0].name, "qbit");

        config.download_clients.pop();
        store.initialize(&config).await.unwrap();
        assert_eq!(store.list_enabled_clients().await.unwrap().len(), 1);
        assert_eq!(store.list_download_clients().await.unwrap().len(), 2);

        assert_eq!(store.get_naming_config().await.unwrap(), NamingConfig::default());
    }

    #[tokio::test]
    async fn test_download_transitions_are_conditional() {
        let (_dir, store) = temp_store().await;

        let download = store
            .create_download(NewDownload {
                target: MediaTarget::Movie { movie_id: 1 },
                title: "Movie.2020.1080p".to_string(),
                download_url: "magnet:?xt=urn:btih:abc".to_string(),
                size: None,
                seeders: None,
                indexer: None,
                quality: None,
                remote_id: None,
                client_id: None,
                save_path: None,
            })
            .await
            .unwrap();
        assert_eq!(download.status, DownloadStatus::Queued);

        assert!(store.set_download_remote(download.id, "hash1", 1).await.unwrap());
        assert!(!store.set_download_remote(download.id, "hash2", 1).await.unwrap());

        assert!(
            store
                .update_download_progress(
                    download.id,
                    DownloadStatus::Queued,
                    DownloadStatus::Downloading,
                    12.5
                )
                .await
                .unwrap()
        );
        // Stale `from` status loses the race.
        assert!(
            !store
                .transition_download(
                    download.id,
                    DownloadStatus::Queued,
                    DownloadStatus::Failed,
                    Some("gone")
                )
                .await
                .unwrap()
        );
        assert!(
            store
                .transition_download(
                    download.id,
                    DownloadStatus::Downloading,
                    DownloadStatus::Importing,
                    None
                )
                .await
                .unwrap()
        );
        assert!(
            store
                .transition_download(
                    download.id,
                    DownloadStatus::Importing,
                    DownloadStatus::Downloading,
                    None
                )
                .await
                .is_err()
        );

        let stored = store.get_download(download.id).await.unwrap().unwrap();
        assert_eq!(stored.status, DownloadStatus::Importing);
        assert_eq!(stored.remote_id.as_deref(), Some("hash1"));
        assert!(store.list_active_downloads().await.unwrap().len() == 1);
    }

    #[tokio::test]
    async fn test_blacklist_is_unique_per_target_and_title() {
        let (_dir, store) = temp_store().await;
        let target = MediaTarget::Episode {
            series_id: 4,
            season_number: 1,
            episode_number: 2,
        };
        let entry = NewBlacklistEntry {
            target,
            source_title: "Show.S01E02.720p.HDTV-GRP".to_string(),
            reason: "Missing files".to_string(),
            indexer: Some("idx".to_string()),
        };

        assert!(store.add_to_blacklist(entry.clone()).await.unwrap());
        assert!(!store.add_to_blacklist(entry).await.unwrap());
        assert!(
            store
                .is_blacklisted(target, "show s01e02 720p hdtv grp")
                .await
                .unwrap()
        );
        assert!(
            !store
                .is_blacklisted(MediaTarget::Movie { movie_id: 4 }, "Show.S01E02.720p.HDTV-GRP")
                .await
                .unwrap()
        );
        assert_eq!(store.blacklist_for_target(target).await.unwrap().len(), 1);
    }
}
