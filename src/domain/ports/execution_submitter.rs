//! Execution submission port.

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::errors::BackendError;
use crate::domain::models::WorkflowExecution;

/// Body of an execution submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template_id: Option<String>,
    pub agent_ids: Vec<String>,
    pub execution_date: NaiveDate,
    #[serde(default)]
    pub parameters: serde_json::Value,
}

/// Starts executions on the backend.
#[async_trait]
pub trait ExecutionSubmitter: Send + Sync {
    /// Submit a run and return the workflow id the backend assigned.
    async fn submit(&self, request: &ExecutionRequest) -> Result<String, BackendError>;
}

/// Past executions recorded by the backend, used to seed local history.
#[async_trait]
pub trait ExecutionFeed: Send + Sync {
    async fn fetch_executions(&self) -> Result<Vec<WorkflowExecution>, BackendError>;
}
