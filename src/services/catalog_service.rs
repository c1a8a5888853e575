//! Catalog loading with a built-in fallback.

use std::sync::Arc;

use serde::Serialize;

use crate::domain::models::AgentCatalog;
use crate::domain::ports::CatalogSource;

/// Where the active catalog came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CatalogOrigin {
    Backend,
    Builtin,
}

impl std::fmt::Display for CatalogOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Backend => write!(f, "backend"),
            Self::Builtin => write!(f, "built-in"),
        }
    }
}

pub struct CatalogService {
    source: Option<Arc<dyn CatalogSource>>,
}

impl CatalogService {
    pub fn new(source: Option<Arc<dyn CatalogSource>>) -> Self {
        Self { source }
    }

    /// Fetch agents and templates, falling back to the built-in catalog when
    /// the source is missing, unreachable or returns no agents.
    pub async fn load(&self) -> (AgentCatalog, CatalogOrigin) {
        let Some(source) = &self.source else {
            return (AgentCatalog::builtin(), CatalogOrigin::Builtin);
        };

        let fetched = async {
            let agents = source.fetch_agents().await?;
            let templates = source.fetch_templates().await?;
            Ok::<_, crate::domain::errors::BackendError>((agents, templates))
        }
        .await;

        match fetched {
            Ok((agents, templates)) if !agents.is_empty() => {
                tracing::info!(agents = agents.len(), templates = templates.len(), "loaded catalog from backend");
                (AgentCatalog::new(agents, templates), CatalogOrigin::Backend)
            }
            Ok(_) => {
                tracing::warn!("backend returned an empty catalog, using built-in catalog");
                (AgentCatalog::builtin(), CatalogOrigin::Builtin)
            }
            Err(e) => {
                tracing::warn!(error = %e, "catalog unavailable, using built-in catalog");
                (AgentCatalog::builtin(), CatalogOrigin::Builtin)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::errors::BackendError;
    use crate::domain::models::{AgentDefinition, WorkflowTemplate};
    use async_trait::async_trait;

    struct StaticSource(Result<Vec<AgentDefinition>, BackendError>);

    #[async_trait]
    impl CatalogSource for StaticSource {
        async fn fetch_agents(&self) -> Result<Vec<AgentDefinition>, BackendError> {
            self.0.clone()
        }

        async fn fetch_templates(&self) -> Result<Vec<WorkflowTemplate>, BackendError> {
            Ok(vec![])
        }
    }

    #[tokio::test]
    async fn test_no_source_uses_builtin() {
        let (catalog, origin) = CatalogService::new(None).load().await;
        assert_eq!(origin, CatalogOrigin::Builtin);
        assert!(catalog.template("risk-sweep").is_some());
    }

    #[tokio::test]
    async fn test_backend_failure_uses_builtin() {
        let source = StaticSource(Err(BackendError::Request("connection refused".into())));
        let (_, origin) = CatalogService::new(Some(Arc::new(source))).load().await;
        assert_eq!(origin, CatalogOrigin::Builtin);
    }

    #[tokio::test]
    async fn test_backend_catalog_used_when_available() {
        let agent = AgentCatalog::builtin().agent("fraud-detector").unwrap().clone();
        let source = StaticSource(Ok(vec![agent]));
        let (catalog, origin) = CatalogService::new(Some(Arc::new(source))).load().await;
        assert_eq!(origin, CatalogOrigin::Backend);
        assert_eq!(catalog.agents.len(), 1);
    }
}
