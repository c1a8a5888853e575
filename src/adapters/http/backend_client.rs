//! HTTP client for the agent backend API.
//!
//! Endpoints, relative to the configured base URL:
//!
//! | Method | Path                  | Returns                    |
//! |--------|-----------------------|----------------------------|
//! | GET    | `/available-agents`   | agent definitions          |
//! | GET    | `/workflow-templates` | workflow templates         |
//! | POST   | `/execute`            | `{"workflowId": "..."}`    |
//! | GET    | `/executions`         | past execution records     |
//!
//! List endpoints may answer with a bare array or with the array wrapped
//! under a named key.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::domain::errors::BackendError;
use crate::domain::models::{AgentDefinition, BackendConfig, WorkflowExecution, WorkflowTemplate};
use crate::domain::ports::{CatalogSource, ExecutionFeed, ExecutionRequest, ExecutionSubmitter};

#[derive(Deserialize)]
#[serde(untagged)]
enum ListResponse<T> {
    Bare(Vec<T>),
    Wrapped {
        #[serde(alias = "agents", alias = "templates", alias = "executions", alias = "items")]
        data: Vec<T>,
    },
}

impl<T> ListResponse<T> {
    fn into_vec(self) -> Vec<T> {
        match self {
            Self::Bare(items) | Self::Wrapped { data: items } => items,
        }
    }
}

#[derive(Deserialize)]
struct ExecuteResponse {
    #[serde(alias = "workflow_id", rename = "workflowId")]
    workflow_id: String,
}

#[derive(Debug, Clone)]
pub struct BackendClient {
    http: Client,
    base_url: Option<String>,
}

impl BackendClient {
    pub fn new(config: &BackendConfig) -> Result<Self, BackendError> {
        let http = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| BackendError::Request(e.to_string()))?;
        Ok(Self {
            http,
            base_url: config
                .base_url
                .as_deref()
                .map(|url| url.trim_end_matches('/').to_string()),
        })
    }

    pub fn is_configured(&self) -> bool {
        self.base_url.is_some()
    }

    fn url(&self, path: &str) -> Result<String, BackendError> {
        let base = self.base_url.as_deref().ok_or(BackendError::NotConfigured)?;
        Ok(format!("{base}{path}"))
    }

    async fn get_list<T: DeserializeOwned>(&self, path: &str) -> Result<Vec<T>, BackendError> {
        let url = self.url(path)?;
        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| BackendError::Request(e.to_string()))?;
        let resp = check_status(resp).await?;
        let list: ListResponse<T> = resp
            .json()
            .await
            .map_err(|e| BackendError::Decode(e.to_string()))?;
        Ok(list.into_vec())
    }
}

async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response, BackendError> {
    if resp.status().is_success() {
        return Ok(resp);
    }
    let status = resp.status().as_u16();
    let body = resp.text().await.unwrap_or_default();
    Err(BackendError::Status { status, body })
}

#[async_trait]
impl CatalogSource for BackendClient {
    async fn fetch_agents(&self) -> Result<Vec<AgentDefinition>, BackendError> {
        self.get_list("/available-agents").await
    }

    async fn fetch_templates(&self) -> Result<Vec<WorkflowTemplate>, BackendError> {
        self.get_list("/workflow-templates").await
    }
}

#[async_trait]
impl ExecutionSubmitter for BackendClient {
    async fn submit(&self, request: &ExecutionRequest) -> Result<String, BackendError> {
        let url = self.url("/execute")?;
        let resp = self
            .http
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(|e| BackendError::Request(e.to_string()))?;
        let resp = check_status(resp).await?;
        let accepted: ExecuteResponse = resp
            .json()
            .await
            .map_err(|e| BackendError::Decode(e.to_string()))?;

        tracing::info!(workflow_id = %accepted.workflow_id, agents = request.agent_ids.len(), "execution submitted");
        Ok(accepted.workflow_id)
    }
}

#[async_trait]
impl ExecutionFeed for BackendClient {
    async fn fetch_executions(&self) -> Result<Vec<WorkflowExecution>, BackendError> {
        self.get_list("/executions").await
    }
}
