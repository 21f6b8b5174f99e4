use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::collections::HashMap;
use tracing::debug;
use url::Url;

use super::{
    AddRequest, AddResult, ClientError, ClientSettings, DownloadClient, RemoteItem, RemoteState,
};
use crate::constants::intervals::CLIENT_REQUEST_TIMEOUT;
use crate::domain::ClientKind;

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// SABnzbd reports most numbers as strings; accept either.
fn lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}

#[derive(Debug, Deserialize)]
struct ApiStatus {
    #[serde(default)]
    status: Option<bool>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct VersionResponse {
    version: String,
}

#[derive(Debug, Deserialize)]
struct AddUrlResponse {
    #[serde(default)]
    status: bool,
    #[serde(default)]
    nzo_ids: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct QueueResponse {
    queue: QueuePayload,
}

#[derive(Debug, Default, Deserialize)]
struct QueuePayload {
    #[serde(default)]
    slots: Vec<QueueSlot>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QueueSlot {
    pub nzo_id: String,

    #[serde(default)]
    pub filename: String,

    #[serde(default)]
    pub status: String,

    #[serde(default, deserialize_with = "lenient_f64")]
    pub percentage: Option<f64>,

    #[serde(default, deserialize_with = "lenient_f64")]
    pub mb: Option<f64>,

    #[serde(default, deserialize_with = "lenient_f64")]
    pub mbleft: Option<f64>,

    #[serde(default)]
    pub cat: Option<String>,
}

#[derive(Debug, Deserialize)]
struct HistoryResponse {
    history: HistoryPayload,
}

#[derive(Debug, Default, Deserialize)]
struct HistoryPayload {
    #[serde(default)]
    slots: Vec<HistorySlot>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HistorySlot {
    pub nzo_id: String,

    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub status: String,

    #[serde(default)]
    pub storage: Option<String>,

    #[serde(default)]
    pub category: Option<String>,

    #[serde(default, deserialize_with = "lenient_f64")]
    pub bytes: Option<f64>,

    #[serde(default)]
    pub fail_message: Option<String>,

    #[serde(default)]
    pub completed: Option<i64>,
}

fn queue_state(status: &str) -> RemoteState {
    match status.to_ascii_lowercase().as_str() {
        "downloading" => RemoteState::Downloading,
        "paused" => RemoteState::Paused,
        "checking" | "quickcheck" => RemoteState::Checking,
        "verifying" | "repairing" | "extracting" | "moving" | "running" => {
            RemoteState::PostProcessing
        }
        "completed" => RemoteState::Completed,
        "failed" => RemoteState::Failed("Failed".to_string()),
        _ => RemoteState::Queued,
    }
}

/// Server percentage when present, else derived from the size fields.
fn queue_progress(slot: &QueueSlot) -> f64 {
    if let Some(percentage) = slot.percentage {
        return percentage.clamp(0.0, 100.0);
    }
    match (slot.mb, slot.mbleft) {
        (Some(total), Some(left)) if total > 0.0 => ((total - left) / total * 100.0).clamp(0.0, 100.0),
        _ => 0.0,
    }
}

#[allow(clippy::cast_possible_truncation)]
fn mb_to_bytes(mb: Option<f64>) -> Option<i64> {
    mb.map(|mb| (mb * BYTES_PER_MB) as i64)
}

impl QueueSlot {
    fn into_remote_item(self, client_id: i32) -> RemoteItem {
        RemoteItem {
            progress: queue_progress(&self),
            state: queue_state(&self.status),
            remote_id: self.nzo_id,
            client_id,
            kind: ClientKind::Usenet,
            name: self.filename,
            content_path: None,
            save_path: None,
            category: self.cat.filter(|c| !c.is_empty() && c != "*"),
            size_total: mb_to_bytes(self.mb),
            size_left: mb_to_bytes(self.mbleft),
            added_on: None,
            seeds: None,
        }
    }
}

impl HistorySlot {
    /// History is authoritative: Completed and Failed are terminal, anything
    /// else is post-processing of a fully fetched job.
    fn state(&self) -> RemoteState {
        match self.status.to_ascii_lowercase().as_str() {
            "completed" => RemoteState::Completed,
            "failed" => RemoteState::Failed(
                self.fail_message
                    .clone()
                    .filter(|m| !m.trim().is_empty())
                    .unwrap_or_else(|| "Failed".to_string()),
            ),
            _ => RemoteState::PostProcessing,
        }
    }

    #[allow(clippy::cast_possible_truncation)]
    fn into_remote_item(self, client_id: i32) -> RemoteItem {
        RemoteItem {
            state: self.state(),
            remote_id: self.nzo_id,
            client_id,
            kind: ClientKind::Usenet,
            name: self.name,
            progress: 100.0,
            content_path: self.storage.filter(|s| !s.is_empty()),
            save_path: None,
            category: self.category.filter(|c| !c.is_empty() && c != "*"),
            size_total: self.bytes.map(|b| b as i64),
            size_left: Some(0),
            added_on: self.completed,
            seeds: None,
        }
    }
}

/// Combines the queue and history views. History entries replace queue
/// entries with the same id.
#[must_use]
pub fn merge_views(
    queue: Vec<QueueSlot>,
    history: Vec<HistorySlot>,
    client_id: i32,
) -> Vec<RemoteItem> {
    let mut by_id: HashMap<String, RemoteItem> = HashMap::new();
    let mut order = Vec::new();

    for slot in queue {
        let item = slot.into_remote_item(client_id);
        order.push(item.remote_id.clone());
        by_id.insert(item.remote_id.clone(), item);
    }
    for slot in history {
        let item = slot.into_remote_item(client_id);
        if !by_id.contains_key(&item.remote_id) {
            order.push(item.remote_id.clone());
        }
        by_id.insert(item.remote_id.clone(), item);
    }

    order.into_iter().filter_map(|id| by_id.remove(&id)).collect()
}

/// SABnzbd API adapter. Every call is authenticated by the API key, so there
/// is no session to manage.
#[derive(Debug, Clone)]
pub struct SabnzbdClient {
    http: Client,
    settings: ClientSettings,
    base_url: String,
}

impl SabnzbdClient {
    pub fn new(settings: ClientSettings) -> Result<Self, ClientError> {
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
        })
    }

    fn api_url(&self, mode: &str, params: &[(&str, &str)]) -> Result<Url, ClientError> {
        let mut url = Url::parse(&format!("{}/api", self.base_url)).map_err(|e| {
            ClientError::Unsupported(format!("Invalid SABnzbd URL {}: {e}", self.base_url))
        })?;

        {
            let mut query = url.query_pairs_mut();
            query.append_pair("mode", mode);
            for (key, value) in params {
                query.append_pair(key, value);
            }
            query.append_pair("output", "json");
            if let Some(key) = self.settings.api_key.as_deref() {
                query.append_pair("apikey", key);
            }
        }

        Ok(url)
    }

    /// Display form of a URL with the API key masked.
    fn redacted(url: &Url) -> String {
        let mut shown = url.clone();
        let pairs: Vec<(String, String)> = url
            .query_pairs()
            .map(|(k, v)| {
                let v = if k == "apikey" { "***".to_string() } else { v.into_owned() };
                (k.into_owned(), v)
            })
            .collect();
        shown.query_pairs_mut().clear().extend_pairs(pairs);
        shown.to_string()
    }

    async fn call(&self, mode: &str, params: &[(&str, &str)]) -> Result<String, ClientError> {
        let url = self.api_url(mode, params)?;
        let shown = Self::redacted(&url);

        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| ClientError::from_transport(&e, &shown))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ClientError::from_transport(&e, &shown))?;

        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(ClientError::Auth(format!(
                "SABnzbd rejected the API key (HTTP {status})"
            )));
        }
        if !status.is_success() {
            return Err(ClientError::http(status, &shown, &body));
        }

        if let Ok(ApiStatus {
            status: Some(false),
            error,
        }) = serde_json::from_str::<ApiStatus>(&body)
        {
            let message = error.unwrap_or_else(|| "request rejected".to_string());
            if message.to_lowercase().contains("api key") {
                return Err(ClientError::Auth(message));
            }
            return Err(ClientError::Unsupported(format!("SABnzbd: {message}")));
        }

        debug!(client = %self.settings.name, mode, "SABnzbd call succeeded");
        Ok(body)
    }

    async fn call_json<T: serde::de::DeserializeOwned>(
        &self,
        mode: &str,
        params: &[(&str, &str)],
    ) -> Result<T, ClientError> {
        let body = self.call(mode, params).await?;
        serde_json::from_str(&body).map_err(|e| ClientError::Decode {
            url: format!("{}/api?mode={mode}", self.base_url),
            message: e.to_string(),
        })
    }

    pub async fn get_queue(&self) -> Result<Vec<QueueSlot>, ClientError> {
        let response: QueueResponse = self.call_json("queue", &[]).await?;
        Ok(response.queue.slots)
    }

    pub async fn get_history(&self) -> Result<Vec<HistorySlot>, ClientError> {
        let response: HistoryResponse = self.call_json("history", &[("limit", "100")]).await?;
        Ok(response.history.slots)
    }
}

#[async_trait]
impl DownloadClient for SabnzbdClient {
    fn settings(&self) -> &ClientSettings {
        &self.settings
    }

    async fn test_connection(&self) -> Result<String, ClientError> {
        let version: VersionResponse = self.call_json("version", &[]).await?;
        // The version call does not check the key, the queue call does.
        self.get_queue().await?;
        Ok(version.version)
    }

    async fn add(&self, request: &AddRequest) -> Result<AddResult, ClientError> {
        let mut params = vec![("name", request.url.as_str())];
        if let Some(category) = request.category.as_deref().filter(|c| !c.trim().is_empty()) {
            params.push(("cat", category));
        }
        if let Some(title) = request.title.as_deref().filter(|t| !t.trim().is_empty()) {
            params.push(("nzbname", title));
        }

        let response: AddUrlResponse = self.call_json("addurl", &params).await?;
        Ok(AddResult {
            success: response.status,
            remote_id: response.nzo_ids.into_iter().next(),
        })
    }

    async fn list_active(&self) -> Result<Vec<RemoteItem>, ClientError> {
        let (queue, history) = futures::try_join!(self.get_queue(), self.get_history())?;
        Ok(merge_views(queue, history, self.settings.id))
    }

    async fn remove(&self, remote_id: &str, delete_files: bool) -> Result<(), ClientError> {
        let del_files = if delete_files { "1" } else { "0" };
        let params = [
            ("name", "delete"),
            ("value", remote_id),
            ("del_files", del_files),
        ];

        self.call("queue", &params).await?;
        self.call("history", &params).await?;
        Ok(())
    }
}
