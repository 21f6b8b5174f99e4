//! Library file and folder naming.
//!
//! Formats are plain strings with `{Token}` placeholders. Generation is pure
//! given a [`NamingConfig`] snapshot; [`NamingEngine`] caches that snapshot and
//! drops it whenever the stored configuration changes.

pub mod sanitize;
pub mod tokens;

pub use sanitize::{clean_title, cleanup_formatted, sanitize_folder_path};
pub use tokens::{EpisodeNamingInfo, FileFacts, MovieNamingInfo};

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tokio::sync::RwLock;

use crate::db::Store;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MultiEpisodeStyle {
    #[default]
    Extend,
    Duplicate,
    Repeat,
    Scene,
    Range,
    PrefixedRange,
}

impl MultiEpisodeStyle {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Extend => "extend",
            Self::Duplicate => "duplicate",
            Self::Repeat => "repeat",
            Self::Scene => "scene",
            Self::Range => "range",
            Self::PrefixedRange => "prefixed_range",
        }
    }
}

impl fmt::Display for MultiEpisodeStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MultiEpisodeStyle {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "extend" => Ok(Self::Extend),
            "duplicate" => Ok(Self::Duplicate),
            "repeat" => Ok(Self::Repeat),
            "scene" => Ok(Self::Scene),
            "range" => Ok(Self::Range),
            "prefixed_range" | "prefixedrange" => Ok(Self::PrefixedRange),
            other => anyhow::bail!("Unknown multi-episode style '{other}'"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SeriesType {
    #[default]
    Standard,
    Daily,
    Anime,
}

impl SeriesType {
    /// Unknown values fall back to standard numbering.
    #[must_use]
    pub fn parse(value: &str) -> Self {
        match value.to_lowercase().as_str() {
            "daily" => Self::Daily,
            "anime" => Self::Anime,
            _ => Self::Standard,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NamingConfig {
    pub rename_movies: bool,

    pub rename_episodes: bool,

    /// Strip `< > " / \ | ? *` from generated names.
    pub replace_illegal_characters: bool,

    pub colon_replacement: String,

    pub movie_file_format: String,

    pub movie_folder_format: String,

    pub standard_episode_format: String,

    pub daily_episode_format: String,

    pub anime_episode_format: String,

    pub series_folder_format: String,

    pub season_folder_format: String,

    pub specials_folder_format: String,

    pub multi_episode_style: MultiEpisodeStyle,
}

impl Default for NamingConfig {
    fn default() -> Self {
        Self {
            rename_movies: true,
            rename_episodes: true,
            replace_illegal_characters: true,
            colon_replacement: " - ".to_string(),
            movie_file_format: "{Movie Title} ({Release Year}) [{Quality Full}]{-Release Group}"
                .to_string(),
            movie_folder_format: "{Movie Title} ({Release Year})".to_string(),
            standard_episode_format:
                "{Series Title} - S{season:00}E{episode:00} - {Episode Title} [{Quality Full}]"
                    .to_string(),
            daily_episode_format: "{Series Title} - {Air-Date} - {Episode Title} [{Quality Full}]"
                .to_string(),
            anime_episode_format:
                "{Series Title} - S{season:00}E{episode:00} - {absolute:000} - {Episode Title} [{Quality Full}]"
                    .to_string(),
            series_folder_format: "{Series Title} ({Series Year})".to_string(),
            season_folder_format: "Season {season:00}".to_string(),
            specials_folder_format: "Specials".to_string(),
            multi_episode_style: MultiEpisodeStyle::Extend,
        }
    }
}

fn with_extension(name: &str, extension: &str) -> String {
    let extension = extension.trim_start_matches('.');
    if extension.is_empty() {
        name.to_string()
    } else {
        format!("{name}.{extension}")
    }
}

fn finish_name(raw: &str, config: &NamingConfig) -> String {
    clean_title(&cleanup_formatted(raw), config)
}

/// `None` when movie renaming is off; the caller keeps the original name.
#[must_use]
pub fn generate_movie_file_name(
    config: &NamingConfig,
    info: &MovieNamingInfo,
    extension: &str,
) -> Option<String> {
    if !config.rename_movies {
        return None;
    }
    let raw = tokens::movie_tokens(info, config).apply(&config.movie_file_format);
    let name = finish_name(&raw, config);
    (!name.is_empty()).then(|| with_extension(&name, extension))
}

#[must_use]
pub fn generate_movie_folder_name(config: &NamingConfig, info: &MovieNamingInfo) -> String {
    let raw = tokens::movie_tokens(info, config).apply(&config.movie_folder_format);
    finish_name(&raw, config)
}

/// `None` when episode renaming is off.
#[must_use]
pub fn generate_episode_file_name(
    config: &NamingConfig,
    info: &EpisodeNamingInfo,
    series_type: SeriesType,
    extension: &str,
) -> Option<String> {
    if !config.rename_episodes {
        return None;
    }

    let format = match series_type {
        SeriesType::Daily if info.air_date.is_some() => &config.daily_episode_format,
        SeriesType::Anime => &config.anime_episode_format,
        _ => &config.standard_episode_format,
    };

    let numbered = tokens::apply_numbering(format, info, config.multi_episode_style);
    let raw = tokens::episode_tokens(info, config).apply(&numbered);
    let name = finish_name(&raw, config);
    (!name.is_empty()).then(|| with_extension(&name, extension))
}

#[must_use]
pub fn generate_series_folder_name(config: &NamingConfig, info: &EpisodeNamingInfo) -> String {
    let raw = tokens::series_tokens(info, config).apply(&config.series_folder_format);
    finish_name(&raw, config)
}

/// Season 0 uses the specials folder format.
#[must_use]
pub fn generate_season_folder_name(config: &NamingConfig, season_number: i32) -> String {
    let format = if season_number == 0 {
        &config.specials_folder_format
    } else {
        &config.season_folder_format
    };
    let info = EpisodeNamingInfo {
        season_number,
        ..Default::default()
    };
    let raw = tokens::apply_numbering(format, &info, config.multi_episode_style)
        .replace("{season}", &season_number.to_string());
    finish_name(&raw, config)
}

/// Cached access to the stored naming configuration.
pub struct NamingEngine {
    store: Store,
    cached: RwLock<Option<NamingConfig>>,
}

impl NamingEngine {
    #[must_use]
    pub fn new(store: Store) -> Self {
        Self {
            store,
            cached: RwLock::new(None),
        }
    }

    pub async fn config(&self) -> Result<NamingConfig> {
        if let Some(config) = self.cached.read().await.clone() {
            return Ok(config);
        }

        let fresh = self.store.get_naming_config().await?;
        *self.cached.write().await = Some(fresh.clone());
        Ok(fresh)
    }

    /// Drops the cached snapshot; the next read goes to the store.
    pub async fn refresh_config(&self) {
        *self.cached.write().await = None;
    }

    /// Persists an edited configuration and invalidates the cache.
    pub async fn update_config(&self, config: &NamingConfig) -> Result<()> {
        self.store.save_naming_config(config).await?;
        self.refresh_config().await;
        Ok(())
    }
}
