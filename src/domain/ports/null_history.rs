//! Null history repository implementation.
//!
//! Used for in-memory history: records live only in the store's cache.

use async_trait::async_trait;

use super::HistoryRepository;
use crate::domain::errors::DomainResult;
use crate::domain::models::WorkflowExecution;

/// A no-op history repository that stores nothing.
#[derive(Debug, Clone, Default)]
pub struct NullHistoryRepository;

impl NullHistoryRepository {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl HistoryRepository for NullHistoryRepository {
    async fn append(&self, _execution: &WorkflowExecution) -> DomainResult<()> {
        Ok(())
    }

    async fn load_all(&self) -> DomainResult<Vec<WorkflowExecution>> {
        Ok(Vec::new())
    }
}
