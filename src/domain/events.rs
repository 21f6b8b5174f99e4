//! Domain events for the application.
//!
//! Events are fire-and-forget: they are pushed onto a broadcast channel and a
//! send without subscribers is not an error.

use serde::Serialize;

use super::MediaTarget;

pub type EventBus = tokio::sync::broadcast::Sender<NotificationEvent>;

#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", content = "payload")]
pub enum NotificationEvent {
    DownloadGrabbed {
        download_id: i32,
        title: String,
        client: String,
    },
    DownloadProgress {
        downloads: Vec<DownloadProgress>,
    },
    DownloadFailed {
        download_id: i32,
        title: String,
        reason: String,
    },
    DownloadCancelled {
        download_id: i32,
        title: String,
    },
    ReleaseBlacklisted {
        target: MediaTarget,
        title: String,
    },
    ImportCompleted {
        download_id: i32,
        target: MediaTarget,
        files: usize,
    },
    AutoUnmonitored {
        target: MediaTarget,
        quality: String,
    },
    RedownloadRequested {
        target: MediaTarget,
        found: bool,
    },
}

#[derive(Clone, Debug, Serialize)]
pub struct DownloadProgress {
    pub download_id: i32,
    pub title: String,
    pub progress: f64,
    pub status: String,
}

/// Sends an event, ignoring the absence of subscribers.
pub fn emit(bus: &EventBus, event: NotificationEvent) {
    let _ = bus.send(event);
}
