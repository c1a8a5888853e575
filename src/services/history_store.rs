//! Execution history store.
//!
//! Records are appended once per finished run and cached in memory for
//! querying; the repository only persists them.

use std::cmp::Ordering;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::WorkflowExecution;
use crate::domain::ports::{HistoryFilter, HistoryRepository, HistorySort, SortDirection, SortField};

pub struct HistoryStore {
    repository: Arc<dyn HistoryRepository>,
    records: RwLock<Vec<WorkflowExecution>>,
}

impl HistoryStore {
    pub fn new(repository: Arc<dyn HistoryRepository>) -> Self {
        Self {
            repository,
            records: RwLock::new(Vec::new()),
        }
    }

    /// Replace the cache with whatever the repository holds.
    pub async fn load(&self) -> DomainResult<usize> {
        let loaded = self.repository.load_all().await?;
        let count = loaded.len();
        *self.records.write().await = loaded;
        tracing::debug!(count, "loaded execution history");
        Ok(count)
    }

    /// Append a finalized execution. Workflow ids are unique.
    pub async fn append(&self, execution: WorkflowExecution) -> DomainResult<()> {
        let mut records = self.records.write().await;
        if records.iter().any(|r| r.workflow_id == execution.workflow_id) {
            return Err(DomainError::ValidationFailed(format!(
                "execution {} already recorded",
                execution.workflow_id
            )));
        }
        self.repository.append(&execution).await?;
        tracing::info!(workflow_id = %execution.workflow_id, status = %execution.status, "execution recorded");
        records.push(execution);
        Ok(())
    }

    /// Import records from elsewhere, skipping ids already present.
    /// Returns how many were added.
    pub async fn seed(&self, executions: Vec<WorkflowExecution>) -> DomainResult<usize> {
        let mut added = 0;
        for execution in executions {
            match self.append(execution).await {
                Ok(()) => added += 1,
                Err(DomainError::ValidationFailed(_)) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(added)
    }

    pub async fn get(&self, workflow_id: &str) -> Option<WorkflowExecution> {
        self.records
            .read()
            .await
            .iter()
            .find(|r| r.workflow_id == workflow_id)
            .cloned()
    }

    pub async fn list(&self, filter: &HistoryFilter, sort: HistorySort) -> Vec<WorkflowExecution> {
        query(&self.records.read().await, filter, sort)
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

/// Filter then stable-sort a set of records.
pub fn query(records: &[WorkflowExecution], filter: &HistoryFilter, sort: HistorySort) -> Vec<WorkflowExecution> {
    let mut matched: Vec<WorkflowExecution> = records
        .iter()
        .filter(|r| matches_filter(r, filter))
        .cloned()
        .collect();

    matched.sort_by(|a, b| {
        let ordering = compare(a, b, sort.field);
        match sort.direction {
            SortDirection::Ascending => ordering,
            SortDirection::Descending => ordering.reverse(),
        }
    });
    matched
}

fn matches_filter(record: &WorkflowExecution, filter: &HistoryFilter) -> bool {
    if filter.from.is_some_and(|from| record.execution_date < from) {
        return false;
    }
    if filter.to.is_some_and(|to| record.execution_date > to) {
        return false;
    }
    if filter.status.is_some_and(|status| record.status != status) {
        return false;
    }
    match filter.agent.as_deref().map(str::trim) {
        Some(needle) if !needle.is_empty() => {
            let needle = needle.to_lowercase();
            record
                .agent_names()
                .any(|name| name.to_lowercase().contains(&needle))
        }
        _ => true,
    }
}

fn compare(a: &WorkflowExecution, b: &WorkflowExecution, field: SortField) -> Ordering {
    match field {
        SortField::CreatedAt => a.created_at.cmp(&b.created_at),
        SortField::Name => a.name.to_lowercase().cmp(&b.name.to_lowercase()),
        SortField::TotalDuration => a.total_duration_ms().cmp(&b.total_duration_ms()),
        SortField::Status => a.status.as_str().cmp(b.status.as_str()),
        SortField::ExecutionDate => a.execution_date.cmp(&b.execution_date),
    }
}
