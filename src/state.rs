use std::sync::Arc;
use tokio::sync::broadcast;

use crate::clients::{ClientSource, SessionCache};
use crate::config::Config;
use crate::db::Store;
use crate::domain::events::EventBus;
use crate::naming::NamingEngine;
use crate::services::{
    DownloadService, FailureHandler, FfprobeProbe, ImportPipeline, MediaProbe, Monitor,
    MonitorTree, NoSearch, Reconciler, SearchCollaborator, TokenMatcher,
};

/// Everything the daemon and CLI commands share, wired once at startup.
#[derive(Clone)]
pub struct SharedState {
    pub config: Arc<Config>,

    pub store: Store,

    pub event_bus: EventBus,

    pub sessions: SessionCache,

    pub naming: Arc<NamingEngine>,

    pub import: Arc<ImportPipeline>,

    pub failures: Arc<FailureHandler>,

    pub reconciler: Arc<Reconciler>,

    pub monitor: Monitor,

    pub monitor_tree: MonitorTree,

    pub downloads: DownloadService,
}

/// Collaborators that differ between production and tests.
pub struct Collaborators {
    pub clients: Option<ClientSource>,
    pub probe: Arc<dyn MediaProbe>,
    pub search: Arc<dyn SearchCollaborator>,
}

impl Default for Collaborators {
    fn default() -> Self {
        Self {
            clients: None,
            probe: Arc::new(FfprobeProbe),
            search: Arc::new(NoSearch),
        }
    }
}

impl SharedState {
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let (event_bus, _) = broadcast::channel(config.general.event_bus_buffer_size.max(1));
        Self::with_event_bus(config, event_bus).await
    }

    pub async fn with_event_bus(config: Config, event_bus: EventBus) -> anyhow::Result<Self> {
        let store = Store::with_pool_options(
            &config.general.database_path,
            config.general.max_db_connections,
            config.general.min_db_connections,
        )
        .await?;
        store.initialize(&config).await?;

        Ok(Self::assemble(
            config,
            store,
            event_bus,
            Collaborators::default(),
        ))
    }

    /// Wires the services over an already initialized store.
    #[must_use]
    pub fn assemble(
        config: Config,
        store: Store,
        event_bus: EventBus,
        collaborators: Collaborators,
    ) -> Self {
        let sessions = SessionCache::new();
        let clients = collaborators.clients.unwrap_or_else(|| ClientSource::Stored {
            store: store.clone(),
            sessions: sessions.clone(),
        });

        let naming = Arc::new(NamingEngine::new(store.clone()));
        let import = Arc::new(ImportPipeline::new(
            store.clone(),
            Arc::clone(&naming),
            collaborators.probe,
            &config,
            event_bus.clone(),
        ));
        let failures = Arc::new(FailureHandler::new(
            store.clone(),
            collaborators.search,
            event_bus.clone(),
            config.media_management.redownload_failed,
        ));
        let reconciler = Arc::new(
            Reconciler::new(
                store.clone(),
                clients.clone(),
                Arc::new(TokenMatcher),
                Arc::clone(&import),
                Arc::clone(&failures),
                event_bus.clone(),
            )
            .with_stalled_timeout(config.monitor.stalled_timeout_seconds),
        );
        let monitor = Monitor::new(Arc::clone(&reconciler), &config.monitor);
        let downloads = DownloadService::new(store.clone(), clients, event_bus.clone())
            .with_proper_preference(config.media_management.proper_preference);

        Self {
            config: Arc::new(config),
            monitor_tree: MonitorTree::new(store.clone()),
            store,
            event_bus,
            sessions,
            naming,
            import,
            failures,
            reconciler,
            monitor,
            downloads,
        }
    }
}
