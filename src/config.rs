use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::domain::{ClientKind, ProperPreference};
use crate::naming::NamingConfig;
use crate::quality::{ProfileItem, QualityProfile};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub general: GeneralConfig,

    pub monitor: MonitorConfig,

    pub media_management: MediaManagementConfig,

    pub library: LibraryConfig,

    pub naming: NamingConfig,

    #[serde(default)]
    pub profiles: Vec<QualityProfileConfig>,

    #[serde(default)]
    pub download_clients: Vec<DownloadClientConfig>,

    #[serde(default)]
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    pub metrics_enabled: bool,

    pub metrics_port: Option<u16>,

    /// Emit logs as JSON lines instead of the human-readable format.
    pub json_logs: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            metrics_enabled: true,
            metrics_port: None,
            json_logs: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    pub database_path: String,

    pub log_level: String,

    #[serde(default)]
    pub suppress_connection_errors: bool,

    /// Event bus buffer size (default: 100)
    pub event_bus_buffer_size: usize,

    /// Number of tokio worker threads (default: 2)
    /// Set to 0 to use the number of CPU cores
    pub worker_threads: usize,

    pub max_db_connections: u32,

    pub min_db_connections: u32,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            database_path: "sqlite:data/fetcharr.db".to_string(),
            log_level: "info".to_string(),
            suppress_connection_errors: false,
            event_bus_buffer_size: 100,
            worker_threads: 2,
            max_db_connections: 5,
            min_db_connections: 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub enabled: bool,

    pub interval_seconds: u64,

    pub startup_delay_seconds: u64,

    /// Seconds a torrent may sit stalled with no seeds before it is failed.
    /// 0 disables stall detection.
    pub stalled_timeout_seconds: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_seconds: crate::constants::intervals::RECONCILE.as_secs(),
            startup_delay_seconds: crate::constants::intervals::STARTUP_DELAY.as_secs(),
            stalled_timeout_seconds: 900,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaManagementConfig {
    /// Search again for the same movie/episode after a download fails.
    pub redownload_failed: bool,

    pub proper_preference: ProperPreference,

    /// Replaced files are moved here instead of being deleted.
    pub recycle_path: Option<String>,

    /// `(remote_prefix, local_prefix)` pairs applied to paths reported by clients.
    pub remote_path_mappings: Vec<(String, String)>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LibraryConfig {
    pub movie_root: String,

    pub tv_root: String,

    /// Where clients drop completed content when they do not report a path.
    pub downloads_root: String,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            movie_root: "./library/movies".to_string(),
            tv_root: "./library/tv".to_string(),
            downloads_root: "./downloads".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityProfileConfig {
    pub name: String,

    pub cutoff: String,

    #[serde(default = "default_true")]
    pub upgrade_allowed: bool,

    pub allowed_qualities: Vec<String>,
}

impl QualityProfileConfig {
    #[must_use]
    pub fn to_profile(&self) -> QualityProfile {
        QualityProfile {
            id: 0,
            name: self.name.clone(),
            cutoff: self.cutoff.clone(),
            upgrade_allowed: self.upgrade_allowed,
            items: self
                .allowed_qualities
                .iter()
                .map(|quality| ProfileItem {
                    quality: quality.clone(),
                    allowed: true,
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadClientConfig {
    pub name: String,

    pub kind: ClientKind,

    pub host: String,

    pub port: u16,

    #[serde(default)]
    pub use_tls: bool,

    #[serde(default)]
    pub url_base: Option<String>,

    #[serde(default)]
    pub username: Option<String>,

    #[serde(default)]
    pub password: Option<String>,

    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default)]
    pub default_category: Option<String>,

    #[serde(default)]
    pub movie_category: Option<String>,

    #[serde(default)]
    pub tv_category: Option<String>,

    /// Local directory the client places completed movie downloads in.
    #[serde(default)]
    pub movie_directory: Option<String>,

    #[serde(default)]
    pub tv_directory: Option<String>,

    /// Lower values are preferred when several clients of one kind are enabled.
    #[serde(default = "default_priority")]
    pub priority: i32,

    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default)]
    pub remove_completed: bool,

    #[serde(default)]
    pub remove_failed: bool,
}

const fn default_true() -> bool {
    true
}

const fn default_priority() -> i32 {
    1
}

impl Default for Config {
    fn default() -> Self {
        Self {
            general: GeneralConfig::default(),
            monitor: MonitorConfig::default(),
            media_management: MediaManagementConfig::default(),
            library: LibraryConfig::default(),
            naming: NamingConfig::default(),
            profiles: vec![QualityProfileConfig {
                name: "Default".to_string(),
                cutoff: "Bluray-1080p".to_string(),
                upgrade_allowed: true,
                allowed_qualities: vec![
                    "HDTV-720p".to_string(),
                    "WEB-720p".to_string(),
                    "Bluray-720p".to_string(),
                    "HDTV-1080p".to_string(),
                    "WEB-1080p".to_string(),
                    "Bluray-1080p".to_string(),
                ],
            }],
            download_clients: Vec::new(),
            observability: ObservabilityConfig::default(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let paths = Self::config_paths();

        for path in &paths {
            if path.exists() {
                info!("Loading config from: {}", path.display());
                return Self::load_from_path(path);
            }
        }

        info!("No config file found, using defaults");
        Ok(Self::default())
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    fn config_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from("config.toml")];

        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("fetcharr").join("config.toml"));
        }

        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".fetcharr").join("config.toml"));
        }

        paths
    }

    pub fn validate(&self) -> Result<()> {
        if self.monitor.enabled && self.monitor.interval_seconds == 0 {
            anyhow::bail!("Monitor interval must be > 0");
        }

        let mut names = HashSet::new();
        for client in &self.download_clients {
            if !names.insert(client.name.as_str()) {
                anyhow::bail!("Duplicate download client name '{}'", client.name);
            }
            if client.port == 0 {
                anyhow::bail!("Download client '{}' has no port", client.name);
            }
            if client.host.trim().is_empty() {
                anyhow::bail!("Download client '{}' has no host", client.name);
            }
        }

        for profile in &self.profiles {
            if !profile.to_profile().is_quality_allowed(&profile.cutoff) {
                anyhow::bail!(
                    "Profile '{}' cutoff '{}' is not in its allowed qualities",
                    profile.name,
                    profile.cutoff
                );
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(name: &str, port: u16) -> DownloadClientConfig {
        DownloadClientConfig {
            name: name.to_string(),
            kind: ClientKind::Torrent,
            host: "localhost".to_string(),
            port,
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
        }
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.monitor.interval_seconds, 60);
        assert_eq!(config.monitor.stalled_timeout_seconds, 900);
        assert!(!config.media_management.redownload_failed);
        assert_eq!(
            config.media_management.proper_preference,
            ProperPreference::PreferAndUpgrade
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("[general]"));
        assert!(toml_str.contains("[monitor]"));
        assert!(toml_str.contains("[naming]"));
    }

    #[test]
    fn test_config_deserialization() {
        let toml_str = r#"
            [general]
            log_level = "debug"

            [monitor]
            interval_seconds = 30

            [media_management]
            redownload_failed = true
            proper_preference = "do_not_upgrade"
            remote_path_mappings = [["/downloads", "/mnt/media/downloads"]]

            [[download_clients]]
            name = "qbit"
            kind = "torrent"
            host = "localhost"
            port = 8080
            username = "admin"
            password = "secret"

            [[download_clients]]
            name = "sab"
            kind = "usenet"
            host = "localhost"
            port = 8081
            api_key = "abc"
            priority = 2
        "#;

        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.general.log_level, "debug");
        assert_eq!(config.monitor.interval_seconds, 30);
        assert_eq!(config.monitor.startup_delay_seconds, 10);
        assert!(config.media_management.redownload_failed);
        assert_eq!(
            config.media_management.proper_preference,
            ProperPreference::DoNotUpgrade
        );
        assert_eq!(config.media_management.remote_path_mappings.len(), 1);
        assert_eq!(config.download_clients.len(), 2);
        assert_eq!(config.download_clients[1].kind, ClientKind::Usenet);
        assert!(config.download_clients[0].enabled);
        assert_eq!(config.download_clients[0].priority, 1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_interval() {
        let mut config = Config::default();
        config.monitor.interval_seconds = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_duplicate_clients() {
        let mut config = Config::default();
        config.download_clients = vec![client("a", 8080), client("a", 8081)];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_missing_port() {
        let mut config = Config::default();
        config.download_clients = vec![client("a", 0)];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_cutoff_outside_allow_list() {
        let mut config = Config::default();
        config.profiles[0].cutoff = "Remux-2160p".to_string();
        assert!(config.validate().is_err());
    }
}
