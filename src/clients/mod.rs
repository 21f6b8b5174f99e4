//! Download client adapters.
//!
//! Every adapter exposes the same surface ([`DownloadClient`]) and reports its
//! items as [`RemoteItem`]s so the reconciliation loop never handles
//! client-specific payloads.

pub mod qbittorrent;
pub mod registry;
pub mod sabnzbd;
pub mod session;

pub use qbittorrent::QBitClient;
pub use registry::{ClientRegistry, ClientSource};
pub use sabnzbd::SabnzbdClient;
pub use session::SessionCache;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::constants::categories;
use crate::constants::limits::MAX_ERROR_BODY_CHARS;
use crate::domain::{ClientKind, MediaType};
use crate::entities::download_clients;

/// Connection and behavior settings of one client instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientSettings {
    pub id: i32,
    pub name: String,
    pub kind: ClientKind,
    pub host: String,
    pub port: u16,
    pub use_tls: bool,
    pub url_base: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub api_key: Option<String>,
    pub default_category: Option<String>,
    pub movie_category: Option<String>,
    pub tv_category: Option<String>,
    pub movie_directory: Option<String>,
    pub tv_directory: Option<String>,
    pub priority: i32,
    pub enabled: bool,
    pub remove_completed: bool,
    pub remove_failed: bool,
}

impl From<download_clients::Model> for ClientSettings {
    fn from(m: download_clients::Model) -> Self {
        Self {
            id: m.id,
            name: m.name,
            kind: m.kind,
            host: m.host,
            port: u16::try_from(m.port).unwrap_or_default(),
            use_tls: m.use_tls,
            url_base: m.url_base,
            username: m.username,
            password: m.password,
            api_key: m.api_key,
            default_category: m.default_category,
            movie_category: m.movie_category,
            tv_category: m.tv_category,
            movie_directory: m.movie_directory,
            tv_directory: m.tv_directory,
            priority: m.priority,
            enabled: m.enabled,
            remove_completed: m.remove_completed,
            remove_failed: m.remove_failed,
        }
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

impl ClientSettings {
    /// `http(s)://host:port[/url_base]` without a trailing slash.
    #[must_use]
    pub fn base_url(&self) -> String {
        let scheme = if self.use_tls { "https" } else { "http" };
        let host = self
            .host
            .trim()
            .trim_start_matches("http://")
            .trim_start_matches("https://")
            .trim_end_matches('/');

        match non_empty(self.url_base.as_deref()).map(|b| b.trim_matches('/')) {
            Some(base) if !base.is_empty() => format!("{scheme}://{host}:{}/{base}", self.port),
            _ => format!("{scheme}://{host}:{}", self.port),
        }
    }

    /// Per-media override, then the client default, then (torrent only) a
    /// built-in name. Usenet returns `None` so the server default applies.
    #[must_use]
    pub fn resolve_category(&self, media_type: MediaType) -> Option<String> {
        let per_media = match media_type {
            MediaType::Movie => self.movie_category.as_deref(),
            MediaType::Tv => self.tv_category.as_deref(),
        };

        if let Some(category) = non_empty(per_media).or_else(|| non_empty(self.default_category.as_deref())) {
            return Some(category.to_string());
        }

        match (self.kind, media_type) {
            (ClientKind::Torrent, MediaType::Movie) => Some(categories::TORRENT_MOVIES.to_string()),
            (ClientKind::Torrent, MediaType::Tv) => Some(categories::TORRENT_TV.to_string()),
            (ClientKind::Usenet, _) => None,
        }
    }

    /// Local directory completed downloads of this media type land in.
    #[must_use]
    pub fn directory_for(&self, media_type: MediaType) -> Option<&str> {
        match media_type {
            MediaType::Movie => non_empty(self.movie_directory.as_deref()),
            MediaType::Tv => non_empty(self.tv_directory.as_deref()),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("connection refused by {url}")]
    ConnectionRefused { url: String },

    #[error("host unreachable: {url}: {message}")]
    Unreachable { url: String, message: String },

    #[error("TLS handshake with {url} failed (check the TLS setting): {message}")]
    TlsMismatch { url: String, message: String },

    #[error("request to {url} timed out")]
    Timeout { url: String },

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("unexpected HTTP {status} from {url}: {body}")]
    Http {
        status: u16,
        url: String,
        body: String,
    },

    #[error("could not decode response from {url}: {message}")]
    Decode { url: String, message: String },

    #[error("{0}")]
    Unsupported(String),
}

impl ClientError {
    /// Sorts a transport failure into the diagnostic buckets users can act on.
    #[must_use]
    pub fn from_transport(err: &reqwest::Error, url: &str) -> Self {
        let url = url.to_string();
        if err.is_timeout() {
            return Self::Timeout { url };
        }

        let chain = error_chain(err);
        let lower = chain.to_lowercase();

        if lower.contains("connection refused") {
            Self::ConnectionRefused { url }
        } else if lower.contains("certificate")
            || lower.contains("tls")
            || lower.contains("ssl")
            || lower.contains("handshake")
            || lower.contains("invalid http version")
        {
            Self::TlsMismatch {
                url,
                message: chain,
            }
        } else if err.is_decode() {
            Self::Decode {
                url,
                message: chain,
            }
        } else {
            Self::Unreachable {
                url,
                message: chain,
            }
        }
    }

    #[must_use]
    pub fn http(status: reqwest::StatusCode, url: &str, body: &str) -> Self {
        Self::Http {
            status: status.as_u16(),
            url: url.to_string(),
            body: truncate(body),
        }
    }

    /// Transport-level problems that say nothing about individual downloads.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::ConnectionRefused { .. }
                | Self::Unreachable { .. }
                | Self::Timeout { .. }
                | Self::TlsMismatch { .. }
        )
    }
}

fn error_chain(err: &dyn std::error::Error) -> String {
    let mut parts = vec![err.to_string()];
    let mut source = err.source();
    while let Some(inner) = source {
        parts.push(inner.to_string());
        source = inner.source();
    }
    parts.join(": ")
}

pub(crate) fn truncate(body: &str) -> String {
    if body.chars().count() > MAX_ERROR_BODY_CHARS {
        let cut: String = body.chars().take(MAX_ERROR_BODY_CHARS).collect();
        format!("{cut}...")
    } else {
        body.to_string()
    }
}

/// Normalized remote lifecycle state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RemoteState {
    Queued,
    Downloading,
    /// Downloading but not receiving data.
    Stalled,
    Paused,
    Checking,
    /// Unpacking, verifying or moving after the transfer finished.
    PostProcessing,
    Completed,
    Failed(String),
}

impl fmt::Display for RemoteState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Queued => write!(f, "queued"),
            Self::Downloading => write!(f, "downloading"),
            Self::Stalled => write!(f, "stalled"),
            Self::Paused => write!(f, "paused"),
            Self::Checking => write!(f, "checking"),
            Self::PostProcessing => write!(f, "post-processing"),
            Self::Completed => write!(f, "completed"),
            Self::Failed(reason) => write!(f, "failed: {reason}"),
        }
    }
}

/// One torrent or usenet job as reported by its client.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteItem {
    pub remote_id: String,
    pub client_id: i32,
    pub kind: ClientKind,
    pub name: String,
    /// 0-100.
    pub progress: f64,
    pub state: RemoteState,
    pub content_path: Option<String>,
    pub save_path: Option<String>,
    pub category: Option<String>,
    pub size_total: Option<i64>,
    pub size_left: Option<i64>,
    /// Unix seconds.
    pub added_on: Option<i64>,
    pub seeds: Option<i64>,
}

impl RemoteItem {
    /// Torrents also count as complete once every piece is present, whatever
    /// state the client reports. Usenet jobs only complete through history.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        match self.kind {
            ClientKind::Torrent => self.state == RemoteState::Completed || self.progress >= 100.0,
            ClientKind::Usenet => self.state == RemoteState::Completed,
        }
    }

    /// Path of the content itself. The save path is a parent folder shared
    /// with other items and is never returned here.
    #[must_use]
    pub fn reported_path(&self) -> Option<&str> {
        non_empty(self.content_path.as_deref())
    }

    #[must_use]
    pub fn save_path(&self) -> Option<&str> {
        non_empty(self.save_path.as_deref())
    }
}

#[derive(Debug, Clone, Default)]
pub struct AddRequest {
    pub url: String,
    pub category: Option<String>,
    pub save_path: Option<String>,
    /// Display name hint for clients that support one.
    pub title: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddResult {
    pub success: bool,
    pub remote_id: Option<String>,
}

#[async_trait]
pub trait DownloadClient: Send + Sync {
    fn settings(&self) -> &ClientSettings;

    /// Returns the client's version string.
    async fn test_connection(&self) -> Result<String, ClientError>;

    async fn add(&self, request: &AddRequest) -> Result<AddResult, ClientError>;

    async fn list_active(&self) -> Result<Vec<RemoteItem>, ClientError>;

    async fn remove(&self, remote_id: &str, delete_files: bool) -> Result<(), ClientError>;
}
