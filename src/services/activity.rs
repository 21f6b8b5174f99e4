use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::domain::events::{EventBus, NotificationEvent};

/// Writes lifecycle events to the log. Progress events are only traced.
pub struct ActivityLog {
    event_bus: EventBus,
}

/// `(level, message)` for one event; `None` level means debug-only.
fn describe(event: &NotificationEvent) -> (Option<&'static str>, String) {
    match event {
        NotificationEvent::DownloadGrabbed { title, client, .. } => {
            (Some("info"), format!("Grabbed {title} via {client}"))
        }
        NotificationEvent::DownloadProgress { downloads } => {
            (None, format!("{} active download(s)", downloads.len()))
        }
        NotificationEvent::DownloadFailed { title, reason, .. } => {
            (Some("warn"), format!("Download failed: {title} ({reason})"))
        }
        NotificationEvent::DownloadCancelled { title, .. } => {
            (Some("info"), format!("Download cancelled: {title}"))
        }
        NotificationEvent::ReleaseBlacklisted { target, title } => {
            (Some("info"), format!("Blacklisted {title} for {target}"))
        }
        NotificationEvent::ImportCompleted { target, files, .. } => {
            (Some("info"), format!("Imported {files} file(s) for {target}"))
        }
        NotificationEvent::AutoUnmonitored { target, quality } => (
            Some("info"),
            format!("{target} reached cutoff with {quality}, unmonitored"),
        ),
        NotificationEvent::RedownloadRequested { target, found } => (
            Some("info"),
            if *found {
                format!("Re-download grabbed a new release for {target}")
            } else {
                format!("Re-download found nothing for {target}")
            },
        ),
    }
}

impl ActivityLog {
    #[must_use]
    pub const fn new(event_bus: EventBus) -> Self {
        Self { event_bus }
    }

    pub fn start_listener(self) -> JoinHandle<()> {
        let mut rx = self.event_bus.subscribe();

        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) => match describe(&event) {
                        (Some("warn"), message) => warn!(target: "activity", "{message}"),
                        (Some(_), message) => info!(target: "activity", "{message}"),
                        (None, message) => debug!(target: "activity", "{message}"),
                    },
                    Err(broadcast::error::RecvError::Lagged(count)) => {
                        error!(count, "Activity log lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        debug!("Activity log event bus closed");
                        break;
                    }
                }
            }
        })
    }
}
