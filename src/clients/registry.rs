use anyhow::Result;
use std::sync::Arc;
use tracing::warn;

use super::{ClientSettings, DownloadClient, QBitClient, SabnzbdClient, SessionCache};
use crate::db::Store;
use crate::domain::ClientKind;

/// The set of configured client instances, built once per reconciliation
/// cycle from the stored settings.
#[derive(Clone, Default)]
pub struct ClientRegistry {
    clients: Vec<Arc<dyn DownloadClient>>,
}

impl ClientRegistry {
    /// Builds one adapter per enabled settings row. Rows whose adapter cannot
    /// be constructed are logged and left out.
    #[must_use]
    pub fn build(settings: Vec<ClientSettings>, sessions: &SessionCache) -> Self {
        let mut clients: Vec<Arc<dyn DownloadClient>> = Vec::new();

        for s in settings.into_iter().filter(|s| s.enabled) {
            let name = s.name.clone();
            let built: Result<Arc<dyn DownloadClient>, _> = match s.kind {
                ClientKind::Torrent => {
                    QBitClient::new(s, sessions.clone()).map(|c| Arc::new(c) as _)
                }
                ClientKind::Usenet => SabnzbdClient::new(s).map(|c| Arc::new(c) as _),
            };

            match built {
                Ok(client) => clients.push(client),
                Err(e) => warn!(client = %name, error = %e, "Skipping download client"),
            }
        }

        Self::from_clients(clients)
    }

    #[must_use]
    pub fn from_clients(mut clients: Vec<Arc<dyn DownloadClient>>) -> Self {
        clients.sort_by_key(|c| (c.settings().priority, c.settings().id));
        Self { clients }
    }

    #[must_use]
    pub fn enabled(&self) -> &[Arc<dyn DownloadClient>] {
        &self.clients
    }

    #[must_use]
    pub fn get(&self, id: i32) -> Option<Arc<dyn DownloadClient>> {
        self.clients.iter().find(|c| c.settings().id == id).cloned()
    }

    /// Lowest-priority enabled instance of the requested kind.
    #[must_use]
    pub fn primary(&self, kind: ClientKind) -> Option<Arc<dyn DownloadClient>> {
        self.clients
            .iter()
            .find(|c| c.settings().kind == kind && c.settings().enabled)
            .cloned()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.clients.len()
    }
}

/// Where the reconciler and grab helper get their client set from.
#[derive(Clone)]
pub enum ClientSource {
    /// Rebuilt from the stored settings on every load, so config syncs and
    /// enable/disable changes apply on the next cycle.
    Stored { store: Store, sessions: SessionCache },
    Fixed(ClientRegistry),
}

impl ClientSource {
    pub async fn load(&self) -> Result<ClientRegistry> {
        match self {
            Self::Stored { store, sessions } => {
                let settings = store.list_enabled_clients().await?;
                Ok(ClientRegistry::build(settings, sessions))
            }
            Self::Fixed(registry) => Ok(registry.clone()),
        }
    }
}
