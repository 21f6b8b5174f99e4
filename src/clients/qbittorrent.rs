use async_trait::async_trait;
use reqwest::header::{COOKIE, REFERER, SET_COOKIE};
use reqwest::{Client, Method, Response, StatusCode};
use serde::Deserialize;
use std::fmt;
use tracing::debug;
use url::Url;

use super::{
    AddRequest, AddResult, ClientError, ClientSettings, DownloadClient, RemoteItem, RemoteState,
    SessionCache,
};
use crate::constants::intervals::CLIENT_REQUEST_TIMEOUT;

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum TorrentState {
    Error,
    MissingFiles,
    Uploading,
    PausedUP,
    QueuedUP,
    StalledUP,
    #[serde(rename = "checkingUP")]
    CheckingUP,
    #[serde(rename = "forcedUP")]
    ForcedUP,
    #[serde(rename = "stoppedUP")]
    StoppedUP,
    #[serde(rename = "stoppedDL")]
    StoppedDL,
    #[serde(rename = "allocating")]
    Allocating,
    Downloading,
    MetaDL,
    #[serde(rename = "forcedMetaDL")]
    ForcedMetaDL,
    PausedDL,
    QueuedDL,
    StalledDL,
    CheckingDL,
    ForcedDL,
    CheckingResumeData,
    Moving,
    #[serde(other)]
    Unknown,
}

impl TorrentState {
    #[must_use]
    pub const fn is_completed(&self) -> bool {
        matches!(
            self,
            Self::Uploading
                | Self::PausedUP
                | Self::QueuedUP
                | Self::StalledUP
                | Self::ForcedUP
                | Self::StoppedUP
        )
    }

    #[must_use]
    pub const fn is_error(&self) -> bool {
        matches!(self, Self::Error | Self::MissingFiles)
    }

    #[must_use]
    pub fn to_remote_state(&self) -> RemoteState {
        match self {
            s if s.is_error() => RemoteState::Failed(s.to_string()),
            s if s.is_completed() => RemoteState::Completed,
            Self::CheckingUP | Self::CheckingDL | Self::CheckingResumeData => RemoteState::Checking,
            Self::Moving => RemoteState::PostProcessing,
            Self::Downloading
            | Self::ForcedDL
            | Self::MetaDL
            | Self::ForcedMetaDL
            | Self::Allocating => RemoteState::Downloading,
            Self::StalledDL => RemoteState::Stalled,
            Self::PausedDL | Self::StoppedDL => RemoteState::Paused,
            _ => RemoteState::Queued,
        }
    }
}

impl fmt::Display for TorrentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Error => "Error",
            Self::MissingFiles => "Missing Files",
            Self::Uploading => "Seeding",
            Self::PausedUP => "Paused (Seeding)",
            Self::QueuedUP => "Queued (Seeding)",
            Self::StalledUP => "Stalled (Seeding)",
            Self::CheckingUP | Self::CheckingDL => "Checking",
            Self::ForcedUP => "Forced Seeding",
            Self::Allocating => "Allocating",
            Self::Downloading => "Downloading",
            Self::MetaDL | Self::ForcedMetaDL => "Downloading Metadata",
            Self::PausedDL => "Paused",
            Self::QueuedDL => "Queued",
            Self::StalledDL => "Stalled",
            Self::ForcedDL => "Forced Download",
            Self::CheckingResumeData => "Checking Resume",
            Self::Moving => "Moving",
            Self::StoppedDL => "Stopped",
            Self::StoppedUP => "Seeding Complete",
            Self::Unknown => "Unknown",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TorrentInfo {
    pub hash: String,

    pub name: String,

    pub state: TorrentState,

    pub progress: f64,

    #[serde(default)]
    pub size: i64,

    #[serde(default)]
    pub amount_left: i64,

    #[serde(default)]
    pub num_seeds: i64,

    #[serde(default)]
    pub save_path: String,

    #[serde(default)]
    pub category: String,

    #[serde(default)]
    pub content_path: String,

    #[serde(default)]
    pub added_on: i64,
}

impl TorrentInfo {
    fn into_remote_item(self, client_id: i32) -> RemoteItem {
        RemoteItem {
            remote_id: self.hash.to_lowercase(),
            client_id,
            kind: crate::domain::ClientKind::Torrent,
            name: self.name,
            progress: (self.progress * 100.0).clamp(0.0, 100.0),
            state: self.state.to_remote_state(),
            content_path: Some(self.content_path).filter(|p| !p.is_empty()),
            save_path: Some(self.save_path).filter(|p| !p.is_empty()),
            category: Some(self.category).filter(|c| !c.is_empty()),
            size_total: Some(self.size),
            size_left: Some(self.amount_left),
            added_on: (self.added_on > 0).then_some(self.added_on),
            seeds: Some(self.num_seeds),
        }
    }
}

/// Lowercase hex info-hash of a magnet link, when it carries one.
#[must_use]
pub fn extract_info_hash(url: &str) -> Option<String> {
    let lower = url.to_lowercase();
    let start = lower.find("xt=urn:btih:")? + "xt=urn:btih:".len();
    let hash: String = lower[start..]
        .chars()
        .take_while(char::is_ascii_alphanumeric)
        .collect();

    (hash.len() == 40 && hash.chars().all(|c| c.is_ascii_hexdigit())).then_some(hash)
}

fn session_cookie_from(response: &Response) -> Option<String> {
    response
        .headers()
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find(|v| v.starts_with("SID="))
        .and_then(|v| v.split(';').next())
        .map(str::to_string)
}

/// qBittorrent Web API adapter.
#[derive(Debug, Clone)]
pub struct QBitClient {
    http: Client,
    settings: ClientSettings,
    base_url: String,
    sessions: SessionCache,
}

impl QBitClient {
    pub fn new(settings: ClientSettings, sessions: SessionCache) -> Result<Self, ClientError> {
        let http = Client::builder()
            .timeout(CLIENT_REQUEST_TIMEOUT)
            .user_agent(concat!("Fetcharr/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ClientError::Unsupported(format!("Failed to build HTTP client: {e}")))?;

        let base_url = settings.base_url();
        Ok(Self {
            http,
            settings,
            base_url,
            sessions,
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, ClientError> {
        Url::parse(&format!("{}{path}", self.base_url)).map_err(|e| {
            ClientError::Unsupported(format!("Invalid qBittorrent URL {}: {e}", self.base_url))
        })
    }

    /// Logs in and caches the session cookie. An empty cookie means the
    /// server accepted the login without issuing one (auth bypass).
    pub async fn login(&self) -> Result<String, ClientError> {
        let url = self.endpoint("/api/v2/auth/login")?;
        let params = [
            ("username", self.settings.username.clone().unwrap_or_default()),
            ("password", self.settings.password.clone().unwrap_or_default()),
        ];

        let response = self
            .http
            .post(url.clone())
            .header(REFERER, &self.base_url)
            .form(&params)
            .send()
            .await
            .map_err(|e| ClientError::from_transport(&e, url.as_str()))?;

        let status = response.status();
        let cookie = session_cookie_from(&response);
        let body = response
            .text()
            .await
            .map_err(|e| ClientError::from_transport(&e, url.as_str()))?;

        if status == StatusCode::FORBIDDEN {
            return Err(ClientError::Auth(
                "qBittorrent refused the login (too many failed attempts?)".to_string(),
            ));
        }
        if !status.is_success() {
            return Err(ClientError::http(status, url.as_str(), &body));
        }
        if body.trim().starts_with("Fails") {
            return Err(ClientError::Auth(
                "qBittorrent rejected the username or password".to_string(),
            ));
        }

        let cookie = cookie.unwrap_or_default();
        debug!(client = %self.settings.name, "Authenticated with qBittorrent");
        self.sessions.store(self.settings.id, cookie.clone()).await;
        Ok(cookie)
    }

    async fn session(&self) -> Result<String, ClientError> {
        match self.sessions.get(self.settings.id).await {
            Some(cookie) => Ok(cookie),
            None => self.login().await,
        }
    }

    async fn send_once(
        &self,
        method: &Method,
        url: &Url,
        form: Option<&[(&str, String)]>,
        cookie: &str,
    ) -> Result<Response, ClientError> {
        let mut request = self
            .http
            .request(method.clone(), url.clone())
            .header(REFERER, &self.base_url);
        if !cookie.is_empty() {
            request = request.header(COOKIE, cookie);
        }
        if let Some(form) = form {
            request = request.form(form);
        }

        request
            .send()
            .await
            .map_err(|e| ClientError::from_transport(&e, url.as_str()))
    }

    /// Sends an authenticated request. A 403 drops the cached session and
    /// retries exactly once after a fresh login.
    async fn execute(
        &self,
        method: Method,
        path: &str,
        form: Option<&[(&str, String)]>,
    ) -> Result<(StatusCode, String), ClientError> {
        let url = self.endpoint(path)?;
        let cookie = self.session().await?;
        let mut response = self.send_once(&method, &url, form, &cookie).await?;

        if response.status() == StatusCode::FORBIDDEN {
            debug!(client = %self.settings.name, "qBittorrent session expired, logging in again");
            self.sessions.invalidate(self.settings.id).await;
            let cookie = self.login().await?;
            response = self.send_once(&method, &url, form, &cookie).await?;

            if response.status() == StatusCode::FORBIDDEN {
                self.sessions.invalidate(self.settings.id).await;
                return Err(ClientError::Auth(
                    "qBittorrent rejected the request after re-login".to_string(),
                ));
            }
        }

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ClientError::from_transport(&e, url.as_str()))?;
        Ok((status, body))
    }

    pub async fn get_torrents(&self) -> Result<Vec<TorrentInfo>, ClientError> {
        let path = "/api/v2/torrents/info";
        let (status, body) = self.execute(Method::GET, path, None).await?;
        if !status.is_success() {
            return Err(ClientError::http(status, path, &body));
        }

        serde_json::from_str(&body).map_err(|e| ClientError::Decode {
            url: format!("{}{path}", self.base_url),
            message: e.to_string(),
        })
    }
}

#[async_trait]
impl DownloadClient for QBitClient {
    fn settings(&self) -> &ClientSettings {
        &self.settings
    }

    async fn test_connection(&self) -> Result<String, ClientError> {
        let path = "/api/v2/app/version";
        let (status, body) = self.execute(Method::GET, path, None).await?;
        if !status.is_success() {
            return Err(ClientError::http(status, path, &body));
        }
        Ok(body.trim().to_string())
    }

    async fn add(&self, request: &AddRequest) -> Result<AddResult, ClientError> {
        let mut form = vec![("urls", request.url.clone())];
        if let Some(category) = request.category.as_ref().filter(|c| !c.is_empty()) {
            form.push(("category", category.clone()));
        }
        if let Some(path) = request.save_path.as_ref().filter(|p| !p.is_empty()) {
            form.push(("savepath", path.clone()));
        }

        let path = "/api/v2/torrents/add";
        let (status, body) = self.execute(Method::POST, path, Some(&form)).await?;

        if status == StatusCode::UNSUPPORTED_MEDIA_TYPE {
            return Err(ClientError::Unsupported(
                "Torrent file is not valid".to_string(),
            ));
        }
        if !status.is_success() {
            return Err(ClientError::http(status, path, &body));
        }

        let success = !body.trim().starts_with("Fails");
        Ok(AddResult {
            success,
            remote_id: success.then(|| extract_info_hash(&request.url)).flatten(),
        })
    }

    async fn list_active(&self) -> Result<Vec<RemoteItem>, ClientError> {
        let client_id = self.settings.id;
        Ok(self
            .get_torrents()
            .await?
            .into_iter()
            .map(|t| t.into_remote_item(client_id))
            .collect())
    }

    async fn remove(&self, remote_id: &str, delete_files: bool) -> Result<(), ClientError> {
        let form = [
            ("hashes", remote_id.to_string()),
            ("deleteFiles", delete_files.to_string()),
        ];
        let path = "/api/v2/torrents/delete";
        let (status, body) = self.execute(Method::POST, path, Some(&form)).await?;
        if !status.is_success() {
            return Err(ClientError::http(status, path, &body));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_torrent_state_mapping() {
        assert_eq!(
            TorrentState::Uploading.to_remote_state(),
            RemoteState::Completed
        );
        assert_eq!(
            TorrentState::PausedUP.to_remote_state(),
            RemoteState::Completed
        );
        assert_eq!(
            TorrentState::QueuedUP.to_remote_state(),
            RemoteState::Completed
        );
        assert_eq!(
            TorrentState::StalledDL.to_remote_state(),
            RemoteState::Stalled
        );
        assert_eq!(
            TorrentState::MetaDL.to_remote_state(),
            RemoteState::Downloading
        );
        assert!(matches!(
            TorrentState::MissingFiles.to_remote_state(),
            RemoteState::Failed(_)
        ));
    }

    #[test]
    fn test_unknown_state_deserializes() {
        let state: TorrentState = serde_json::from_str("\"someFutureState\"").unwrap();
        assert_eq!(state, TorrentState::Unknown);
    }

    #[test]
    fn test_torrent_info_into_remote_item() {
        let json = r#"{
            "hash": "ABCDEF0123456789ABCDEF0123456789ABCDEF01",
            "name": "The Great Movie 2020 1080p BluRay x264-GROUP",
            "state": "stalledDL",
            "progress": 0.5,
            "size": 1000,
            "amount_left": 500,
            "num_seeds": 0,
            "save_path": "/downloads/movies",
            "content_path": "/downloads/movies/The Great Movie 2020 1080p BluRay x264-GROUP",
            "category": "movies",
            "added_on": 1700000000
        }"#;
        let info: TorrentInfo = serde_json::from_str(json).unwrap();
        let item = info.into_remote_item(7);

        assert_eq!(item.remote_id, "abcdef0123456789abcdef0123456789abcdef01");
        assert_eq!(item.client_id, 7);
        assert!((item.progress - 50.0).abs() < f64::EPSILON);
        assert_eq!(item.state, RemoteState::Stalled);
        assert_eq!(item.category.as_deref(), Some("movies"));
        assert_eq!(item.seeds, Some(0));
        assert_eq!(
            item.reported_path(),
            Some("/downloads/movies/The Great Movie 2020 1080p BluRay x264-GROUP")
        );
    }

    #[test]
    fn test_extract_info_hash() {
        let magnet = "magnet:?xt=urn:btih:ABCDEF0123456789ABCDEF0123456789ABCDEF01&dn=Movie";
        assert_eq!(
            extract_info_hash(magnet).as_deref(),
            Some("abcdef0123456789abcdef0123456789abcdef01")
        );
        assert_eq!(extract_info_hash("https://indexer/download/123.torrent"), None);
        assert_eq!(
            extract_info_hash("magnet:?xt=urn:btih:MFRGGZDFMZTWQ2LKNNWG23TPOBYXE43U"),
            None
        );
    }
}
