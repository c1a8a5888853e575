//! Catalog source port.

use async_trait::async_trait;

use crate::domain::errors::BackendError;
use crate::domain::models::{AgentDefinition, WorkflowTemplate};

/// Where agent definitions and workflow templates come from.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    /// Fetch every available agent definition.
    async fn fetch_agents(&self) -> Result<Vec<AgentDefinition>, BackendError>;

    /// Fetch every workflow template.
    async fn fetch_templates(&self) -> Result<Vec<WorkflowTemplate>, BackendError>;
}
