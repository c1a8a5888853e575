//! Wiring shared by the CLI commands: backend client, catalog, history
//! store and orchestrator built from one loaded [`Config`].

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;

use crate::adapters::channel::{FallbackUpdateSource, SimulatedUpdateSource, WebSocketUpdateSource};
use crate::adapters::http::BackendClient;
use crate::adapters::sqlite::{database_url, initialize_database, PoolConfig, SqliteHistoryRepository};
use crate::domain::models::{AgentCatalog, Config, HistoryStorage};
use crate::domain::ports::{
    CatalogSource, ExecutionFeed, HistoryRepository, NullHistoryRepository, UpdateSource,
};
use crate::services::{CatalogOrigin, CatalogService, EventBus, HistoryStore, Orchestrator, UpdateSources};

pub struct AppContext {
    pub config: Config,
    pub backend: Arc<BackendClient>,
}

impl AppContext {
    pub fn new(config: Config) -> Result<Self> {
        let backend = BackendClient::new(&config.backend).context("Failed to build backend client")?;
        Ok(Self {
            config,
            backend: Arc::new(backend),
        })
    }

    /// Backend catalog when reachable, built-in otherwise.
    pub async fn catalog(&self) -> (Arc<AgentCatalog>, CatalogOrigin) {
        let source = self
            .backend
            .is_configured()
            .then(|| Arc::clone(&self.backend) as Arc<dyn CatalogSource>);
        let (catalog, origin) = CatalogService::new(source).load().await;
        (Arc::new(catalog), origin)
    }

    /// Open the configured history storage and load its records.
    pub async fn history(&self) -> Result<Arc<HistoryStore>> {
        let repository: Arc<dyn HistoryRepository> = match self.config.history.storage {
            HistoryStorage::Sqlite => {
                let url = database_url(&self.config.history.database_path);
                let pool = initialize_database(
                    &url,
                    Some(PoolConfig {
                        max_connections: self.config.history.max_connections,
                    }),
                )
                .await
                .with_context(|| format!("Failed to open history database at {url}"))?;
                Arc::new(SqliteHistoryRepository::new(pool))
            }
            HistoryStorage::Memory => Arc::new(NullHistoryRepository::new()),
        };

        let store = Arc::new(HistoryStore::new(repository));
        store.load().await.context("Failed to load execution history")?;

        if self.config.history.seed_from_backend && self.backend.is_configured() {
            match self.backend.fetch_executions().await {
                Ok(executions) => {
                    let added = store.seed(executions).await?;
                    tracing::info!(added, "seeded execution history from backend");
                }
                Err(e) => tracing::warn!(error = %e, "could not fetch executions from backend"),
            }
        }
        Ok(store)
    }

    pub fn orchestrator(&self, catalog: Arc<AgentCatalog>, history: Arc<HistoryStore>) -> Orchestrator {
        let channel = &self.config.channel;
        let simulated: Arc<dyn UpdateSource> = Arc::new(SimulatedUpdateSource::new(&channel.simulation));
        let websocket: Arc<dyn UpdateSource> = Arc::new(WebSocketUpdateSource::new(
            channel.ws_url_template.clone(),
            Duration::from_millis(channel.connect_timeout_ms),
        ));
        let live: Arc<dyn UpdateSource> = Arc::new(FallbackUpdateSource::new(websocket, Arc::clone(&simulated)));

        Orchestrator::new(
            catalog,
            self.backend.clone(),
            UpdateSources { live, simulated },
            history,
            Arc::new(EventBus::default()),
        )
        .with_submission_fallback(channel.simulate_on_submission_failure)
    }
}
