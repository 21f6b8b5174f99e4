//! Turns completed downloads into named library files.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::failure::FailureStage;
use super::media::MediaProbe;
use super::monitoring::MonitorTree;
use crate::clients::{ClientSettings, RemoteItem};
use crate::config::Config;
use crate::db::{Movie, NewMediaFile, SeriesRow, Store};
use crate::domain::events::{EventBus, NotificationEvent, emit};
use crate::domain::{Download, MediaTarget};
use crate::library::{
    DirLister, PathQuery, PathResolver, PlacementMethod, Placer, RecycleBin, Unresolved,
    WalkDirLister, discard_file, find_video_files, remove_leftover_folder,
};
use crate::models::media::MediaInfo;
use crate::naming::{
    EpisodeNamingInfo, FileFacts, MovieNamingInfo, NamingConfig, NamingEngine, SeriesType,
    generate_episode_file_name, generate_movie_file_name, generate_movie_folder_name,
    generate_season_folder_name, generate_series_folder_name, sanitize_folder_path,
};
use crate::parser::{EpisodeNumbers, parse_episode_numbers, parse_release_group};
use crate::quality::{ParsedQuality, is_proper_or_repack, parse_quality};

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("{0}; check remote path mappings and volume mounts")]
    PathResolution(#[from] Unresolved),

    #[error("No video files found in {}", .path.display())]
    NoVideoFiles { path: PathBuf },

    #[error("No file in {} could be matched to an episode", .path.display())]
    NoEpisodeMatches { path: PathBuf },

    #[error("Import target not found: {0}")]
    TargetNotFound(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ImportError {
    #[must_use]
    pub const fn stage(&self) -> FailureStage {
        match self {
            Self::PathResolution(_) => FailureStage::PathResolution,
            Self::NoVideoFiles { .. } | Self::NoEpisodeMatches { .. } => FailureStage::Content,
            _ => FailureStage::Import,
        }
    }
}

impl From<anyhow::Error> for ImportError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(format!("{err:#}"))
    }
}

/// One file placed in the library.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportedFile {
    pub source: PathBuf,
    pub destination: PathBuf,
    pub method: PlacementMethod,
    pub quality: String,
    /// Episode numbers covered by the file; empty for movies.
    pub episodes: Vec<i32>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImportSummary {
    pub files: Vec<ImportedFile>,
    /// Targets unmonitored because their quality reached the cutoff.
    pub unmonitored: usize,
}

/// Quality named by the release, falling back to the file name when the
/// release title carries no usable markers.
fn release_quality(release_title: &str, file_name: &str) -> ParsedQuality {
    let from_release = parse_quality(release_title);
    if from_release.source.is_some() || from_release.resolution.is_some() {
        return from_release;
    }
    let from_file = parse_quality(file_name);
    ParsedQuality {
        proper: from_release.proper || from_file.proper,
        ..from_file
    }
}

fn is_sample(file_name: &str) -> bool {
    file_name
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .any(|token| token == "sample")
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn extension_of(path: &Path) -> String {
    path.extension()
        .map(|e| e.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn stem_of(path: &Path) -> String {
    path.file_stem()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn non_empty_path(path: Option<&str>) -> Option<PathBuf> {
    path.map(str::trim)
        .filter(|p| !p.is_empty())
        .map(PathBuf::from)
}

/// A stored media folder with every segment below the library root cleaned.
/// Folders outside the root are used verbatim.
fn library_folder(root: &Path, stored: Option<&str>, naming: &NamingConfig) -> Option<PathBuf> {
    let stored = non_empty_path(stored)?;
    match stored.strip_prefix(root) {
        Ok(relative) => {
            let cleaned = sanitize_folder_path(&relative.to_string_lossy(), naming, &[]);
            Some(if cleaned.is_empty() {
                root.to_path_buf()
            } else {
                root.join(cleaned)
            })
        }
        Err(_) => Some(stored),
    }
}

pub struct ImportPipeline {
    store: Store,
    naming: Arc<NamingEngine>,
    probe: Arc<dyn MediaProbe>,
    placer: Placer,
    lister: Arc<dyn DirLister>,
    resolver: PathResolver,
    movie_root: PathBuf,
    tv_root: PathBuf,
    recycle: Option<RecycleBin>,
    monitor: MonitorTree,
    event_bus: EventBus,
}

impl ImportPipeline {
    #[must_use]
    pub fn new(
        store: Store,
        naming: Arc<NamingEngine>,
        probe: Arc<dyn MediaProbe>,
        config: &Config,
        event_bus: EventBus,
    ) -> Self {
        let media = &config.media_management;
        let downloads_root = non_empty_path(Some(config.library.downloads_root.as_str()));

        Self {
            monitor: MonitorTree::new(store.clone()),
            store,
            naming,
            probe,
            placer: Placer::default(),
            lister: Arc::new(WalkDirLister),
            resolver: PathResolver::new(media.remote_path_mappings.clone(), downloads_root),
            movie_root: PathBuf::from(&config.library.movie_root),
            tv_root: PathBuf::from(&config.library.tv_root),
            recycle: non_empty_path(media.recycle_path.as_deref()).map(RecycleBin::new),
            event_bus,
        }
    }

    /// Builds the location query for a completed download.
    #[must_use]
    pub fn path_query(
        download: &Download,
        remote: Option<&RemoteItem>,
        client: Option<&ClientSettings>,
    ) -> PathQuery {
        let media_type = download.media_type();
        PathQuery {
            reported: remote.and_then(RemoteItem::reported_path).map(str::to_string),
            name: remote.map_or_else(|| download.title.clone(), |r| r.name.clone()),
            category: remote
                .and_then(|r| r.category.clone())
                .filter(|c| !c.is_empty())
                .or_else(|| client.and_then(|c| c.resolve_category(media_type))),
            save_path: remote
                .and_then(RemoteItem::save_path)
                .map(str::to_string)
                .or_else(|| download.save_path.clone()),
            client_directory: client
                .and_then(|c| c.directory_for(media_type))
                .map(str::to_string),
        }
    }

    pub async fn import(
        &self,
        download: &Download,
        remote: Option<&RemoteItem>,
        client: Option<&ClientSettings>,
    ) -> Result<ImportSummary, ImportError> {
        let query = Self::path_query(download, remote, client);
        let source = self.resolver.resolve(&query, |p: &Path| p.exists())?;
        debug!(download_id = download.id, path = %source.display(), "Resolved download content");

        let scan_root = source.clone();
        let files = tokio::task::spawn_blocking(move || find_video_files(&scan_root))
            .await
            .map_err(|e| ImportError::Internal(format!("Scan task failed: {e}")))??;
        if files.is_empty() {
            return Err(ImportError::NoVideoFiles { path: source });
        }

        let (summary, library_root) = match download.target {
            MediaTarget::Movie { movie_id } => (
                self.import_movie(download, movie_id, &files).await?,
                &self.movie_root,
            ),
            MediaTarget::Episode { series_id, .. } => {
                let summary = self.import_series(download, series_id, &files).await?;
                if summary.files.is_empty() {
                    return Err(ImportError::NoEpisodeMatches { path: source });
                }
                (summary, &self.tv_root)
            }
        };

        self.cleanup_source(&source, library_root).await;

        info!(
            download_id = download.id,
            target = %download.target,
            files = summary.files.len(),
            event = "download.imported",
            "Import finished"
        );
        Ok(summary)
    }

    async fn cleanup_source(&self, source: &Path, library_root: &Path) {
        let dir = if source.is_dir() {
            source.to_path_buf()
        } else {
            match source.parent() {
                Some(parent) => parent.to_path_buf(),
                None => return,
            }
        };

        let lister = Arc::clone(&self.lister);
        let root = library_root.to_path_buf();
        let result = tokio::task::spawn_blocking(move || {
            remove_leftover_folder(&dir, &root, lister.as_ref())
        })
        .await;

        match result {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => warn!(error = %e, "Failed to clean up source folder"),
            Err(e) => warn!(error = %e, "Cleanup task failed"),
        }
    }

    async fn probe_file(&self, path: &Path) -> Option<MediaInfo> {
        match self.probe.probe(path).await {
            Ok(info) => Some(info),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Media probe failed, continuing without stream facts");
                None
            }
        }
    }

    /// Renames `path` in place when the regenerated name differs. Returns the
    /// final path.
    async fn rename_if_changed(path: PathBuf, wanted: Option<String>) -> PathBuf {
        let Some(wanted) = wanted else {
            return path;
        };
        if file_name_of(&path) == wanted {
            return path;
        }
        let renamed = path.with_file_name(&wanted);
        match tokio::fs::rename(&path, &renamed).await {
            Ok(()) => {
                debug!(from = %path.display(), to = %renamed.display(), "Renamed after probe");
                renamed
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Rename after probe failed");
                path
            }
        }
    }

    async fn place(
        &self,
        source: &Path,
        destination: &Path,
        library_root: &Path,
    ) -> Result<PlacementMethod, ImportError> {
        let method = self.placer.place(source, destination, library_root).await?;
        metrics::counter!("fetcharr_imports_total", "method" => method.as_str()).increment(1);
        Ok(method)
    }

    async fn import_movie(
        &self,
        download: &Download,
        movie_id: i32,
        files: &[(PathBuf, u64)],
    ) -> Result<ImportSummary, ImportError> {
        let movie = self
            .store
            .get_movie(movie_id)
            .await?
            .ok_or_else(|| ImportError::TargetNotFound(format!("movie #{movie_id}")))?;
        let naming = self.naming.config().await?;

        let Some((source_file, size)) = files.first().cloned() else {
            return Err(ImportError::NoVideoFiles {
                path: self.movie_root.clone(),
            });
        };
        let file_name = file_name_of(&source_file);
        let extension = extension_of(&source_file);
        let parsed = release_quality(&download.title, &file_name);
        let proper = parsed.proper || is_proper_or_repack(&download.title);
        let release_group =
            parse_release_group(&download.title).or_else(|| parse_release_group(&file_name));

        let mut info = movie_naming_info(&movie);
        info.file = FileFacts {
            quality: parsed.name(),
            proper,
            release_group: release_group.clone(),
            media_info: None,
            original_filename: Some(stem_of(&source_file)),
            release_title: Some(download.title.clone()),
        };

        let folder = library_folder(&self.movie_root, movie.path.as_deref(), &naming)
            .unwrap_or_else(|| self.movie_root.join(generate_movie_folder_name(&naming, &info)));
        let destination = folder.join(
            generate_movie_file_name(&naming, &info, &extension).unwrap_or_else(|| file_name.clone()),
        );

        for old in self.store.movie_files(movie_id).await? {
            let old_path = PathBuf::from(&old.path);
            if old_path != source_file && old_path != destination {
                discard_file(&old_path, self.recycle.as_ref(), "upgrade").await?;
            }
            self.store.delete_movie_file(old.id).await?;
        }

        let method = self.place(&source_file, &destination, &self.movie_root).await?;

        let media_info = self.probe_file(&destination).await;
        let quality = parsed.with_probed_resolution(media_info.as_ref().and_then(MediaInfo::resolution));
        let quality_name = quality.name();
        info.file.quality.clone_from(&quality_name);
        info.file.media_info.clone_from(&media_info);
        let destination =
            Self::rename_if_changed(destination, generate_movie_file_name(&naming, &info, &extension))
                .await;

        self.store
            .add_movie_file(
                movie_id,
                NewMediaFile {
                    path: destination.to_string_lossy().into_owned(),
                    size: i64::try_from(size).unwrap_or(i64::MAX),
                    quality: quality_name.clone(),
                    proper,
                    release_group,
                    media_info: media_info.as_ref().and_then(|m| serde_json::to_string(m).ok()),
                },
            )
            .await?;
        self.store
            .set_movie_path(movie_id, &folder.to_string_lossy())
            .await?;

        let mut unmonitored = 0;
        if movie.monitored && self.meets_cutoff(movie.quality_profile_id, &quality_name).await? {
            if self.monitor.unmonitor_movie(movie_id).await? {
                unmonitored += 1;
                self.announce_unmonitored(download.target, &quality_name);
            }
        }

        Ok(ImportSummary {
            files: vec![ImportedFile {
                source: source_file,
                destination,
                method,
                quality: quality_name,
                episodes: Vec::new(),
            }],
            unmonitored,
        })
    }

    async fn import_series(
        &self,
        download: &Download,
        series_id: i32,
        files: &[(PathBuf, u64)],
    ) -> Result<ImportSummary, ImportError> {
        let series = self
            .store
            .get_series(series_id)
            .await?
            .ok_or_else(|| ImportError::TargetNotFound(format!("series #{series_id}")))?;
        let naming = self.naming.config().await?;
        let series_type = SeriesType::parse(&series.series_type);

        let base_info = series_naming_info(&series);
        let series_folder = library_folder(&self.tv_root, series.path.as_deref(), &naming)
            .unwrap_or_else(|| {
                self.tv_root
                    .join(generate_series_folder_name(&naming, &base_info))
            });

        let from_release = parse_episode_numbers(&download.title);
        let mut claimed: HashSet<(i32, i32)> = HashSet::new();
        let mut summary = ImportSummary::default();

        for (source_file, size) in files {
            let file_name = file_name_of(source_file);
            if files.len() > 1 && is_sample(&file_name) {
                debug!(file = %file_name, "Skipping sample file");
                continue;
            }

            let numbers = parse_episode_numbers(&file_name)
                .or_else(|| (files.len() == 1).then(|| from_release.clone()).flatten());
            let Some(EpisodeNumbers { season, episodes }) = numbers else {
                warn!(
                    download_id = download.id,
                    file = %file_name,
                    "No episode number found in file name, skipping"
                );
                continue;
            };

            let episodes: Vec<i32> = episodes
                .into_iter()
                .filter(|e| claimed.insert((season, *e)))
                .collect();
            if episodes.is_empty() {
                debug!(file = %file_name, "Episodes already imported from another file");
                continue;
            }

            let imported = self
                .import_episode_file(
                    download,
                    &series,
                    &base_info,
                    &naming,
                    series_type,
                    &series_folder,
                    season,
                    &episodes,
                    source_file,
                    *size,
                )
                .await?;
            summary.unmonitored += imported.1;
            summary.files.push(imported.0);
        }

        if !summary.files.is_empty() {
            self.store
                .set_series_path(series_id, &series_folder.to_string_lossy())
                .await?;
        }
        Ok(summary)
    }

    #[allow(clippy::too_many_arguments)]
    async fn import_episode_file(
        &self,
        download: &Download,
        series: &SeriesRow,
        base_info: &EpisodeNamingInfo,
        naming: &NamingConfig,
        series_type: SeriesType,
        series_folder: &Path,
        season: i32,
        episodes: &[i32],
        source_file: &Path,
        size: u64,
    ) -> Result<(ImportedFile, usize), ImportError> {
        let series_id = series.id;
        let file_name = file_name_of(source_file);
        let extension = extension_of(source_file);
        let parsed = release_quality(&download.title, &file_name);
        let proper = parsed.proper || is_proper_or_repack(&file_name);
        let release_group =
            parse_release_group(&file_name).or_else(|| parse_release_group(&download.title));

        let mut info = base_info.clone();
        info.season_number = season;
        info.episode_numbers = episodes.to_vec();

        let mut previously_monitored = Vec::new();
        for &episode_number in episodes {
            let Some(row) = self
                .store
                .get_episode(series_id, season, episode_number)
                .await?
            else {
                debug!(series_id, season, episode_number, "Episode not in catalog");
                continue;
            };
            if let Some(title) = row.title.filter(|t| !t.is_empty()) {
                info.episode_titles.push(title);
            }
            if let Some(absolute) = row.absolute_number {
                info.absolute_numbers.push(absolute);
            }
            if info.air_date.is_none() {
                info.air_date = row.air_date;
            }
            if row.monitored {
                previously_monitored.push(episode_number);
            }
        }

        info.file = FileFacts {
            quality: parsed.name(),
            proper,
            release_group: release_group.clone(),
            media_info: None,
            original_filename: Some(stem_of(source_file)),
            release_title: Some(download.title.clone()),
        };

        let folder = series_folder.join(generate_season_folder_name(naming, season));
        let destination = folder.join(
            generate_episode_file_name(naming, &info, series_type, &extension)
                .unwrap_or_else(|| file_name.clone()),
        );

        for &episode_number in episodes {
            for old in self
                .store
                .episode_files(series_id, season, episode_number)
                .await?
            {
                let old_path = PathBuf::from(&old.path);
                if old_path != source_file && old_path != destination {
                    discard_file(&old_path, self.recycle.as_ref(), "upgrade").await?;
                }
                self.store.delete_episode_file(old.id).await?;
            }
        }

        let method = self.place(source_file, &destination, &self.tv_root).await?;

        let media_info = self.probe_file(&destination).await;
        let quality = parsed.with_probed_resolution(media_info.as_ref().and_then(MediaInfo::resolution));
        let quality_name = quality.name();
        info.file.quality.clone_from(&quality_name);
        info.file.media_info.clone_from(&media_info);
        let destination = Self::rename_if_changed(
            destination,
            generate_episode_file_name(naming, &info, series_type, &extension),
        )
        .await;

        let media_info_json = media_info.as_ref().and_then(|m| serde_json::to_string(m).ok());
        for &episode_number in episodes {
            self.store
                .add_episode_file(
                    series_id,
                    season,
                    episode_number,
                    NewMediaFile {
                        path: destination.to_string_lossy().into_owned(),
                        size: i64::try_from(size).unwrap_or(i64::MAX),
                        quality: quality_name.clone(),
                        proper,
                        release_group: release_group.clone(),
                        media_info: media_info_json.clone(),
                    },
                )
                .await?;
        }

        let mut unmonitored = 0;
        if !previously_monitored.is_empty()
            && self.meets_cutoff(series.quality_profile_id, &quality_name).await?
        {
            for episode_number in previously_monitored {
                let outcome = self
                    .monitor
                    .unmonitor_episode(series_id, season, episode_number)
                    .await?;
                if outcome.episode {
                    unmonitored += 1;
                    self.announce_unmonitored(
                        MediaTarget::Episode {
                            series_id,
                            season_number: season,
                            episode_number,
                        },
                        &quality_name,
                    );
                }
            }
        }

        Ok((
            ImportedFile {
                source: source_file.to_path_buf(),
                destination,
                method,
                quality: quality_name,
                episodes: episodes.to_vec(),
            },
            unmonitored,
        ))
    }

    async fn meets_cutoff(&self, profile_id: Option<i32>, quality: &str) -> Result<bool, ImportError> {
        let profile = self.store.resolve_quality_profile(profile_id).await?;
        let ladder = self.store.quality_ladder().await?;
        Ok(profile.meets_cutoff(&ladder, quality))
    }

    fn announce_unmonitored(&self, target: MediaTarget, quality: &str) {
        info!(%target, quality, event = "media.auto_unmonitored", "Cutoff met, unmonitored");
        emit(
            &self.event_bus,
            NotificationEvent::AutoUnmonitored {
                target,
                quality: quality.to_string(),
            },
        );
    }
}

fn movie_naming_info(movie: &Movie) -> MovieNamingInfo {
    MovieNamingInfo {
        title: movie.title.clone(),
        original_title: movie.original_title.clone(),
        year: movie.year,
        imdb_id: movie.imdb_id.clone(),
        tmdb_id: movie.tmdb_id,
        file: FileFacts::default(),
    }
}

fn series_naming_info(series: &SeriesRow) -> EpisodeNamingInfo {
    EpisodeNamingInfo {
        series_title: series.title.clone(),
        series_year: series.year,
        tvdb_id: series.tvdb_id,
        tmdb_id: series.tmdb_id,
        imdb_id: series.imdb_id.clone(),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_release_quality_prefers_release_title() {
        let q = release_quality("Movie.2020.1080p.BluRay.x264-GRP", "movie.mkv");
        assert_eq!(q.name(), "Bluray-1080p");

        let q = release_quality("Movie 2020", "Movie.2020.720p.WEB-DL.mkv");
        assert_eq!(q.resolution, Some(720));

        let q = release_quality("Movie.2020.CAM", "movie.2160p.mkv");
        assert_eq!(q.name(), "CAM");
    }

    #[test]
    fn test_is_sample() {
        assert!(is_sample("show.s01e01.sample.mkv"));
        assert!(is_sample("Sample-show.mkv"));
        assert!(!is_sample("samples.of.life.s01e01.mkv"));
    }

    #[test]
    fn test_library_folder_cleans_segments_below_root() {
        let naming = NamingConfig::default();
        let root = Path::new("/library/movies");

        assert_eq!(
            library_folder(root, Some("/library/movies/Foo: Bar? (2020)"), &naming),
            Some(PathBuf::from("/library/movies/Foo - Bar (2020)"))
        );
        assert_eq!(
            library_folder(root, Some("/elsewhere/Foo: Bar"), &naming),
            Some(PathBuf::from("/elsewhere/Foo: Bar"))
        );
        assert_eq!(library_folder(root, Some("  "), &naming), None);
        assert_eq!(library_folder(root, None, &naming), None);
    }

    #[test]
    fn test_error_stages() {
        let unresolved = Unresolved {
            attempted: vec![PathBuf::from("/downloads/a")],
        };
        let err = ImportError::from(unresolved);
        assert_eq!(err.stage(), FailureStage::PathResolution);
        assert!(err.to_string().contains("/downloads/a"));
        assert!(err.to_string().contains("remote path mappings"));

        let err = ImportError::NoVideoFiles {
            path: PathBuf::from("/x"),
        };
        assert_eq!(err.stage(), FailureStage::Content);
        assert_eq!(
            ImportError::TargetNotFound("movie #1".into()).stage(),
            FailureStage::Import
        );
    }
}
