//! Execution history repository port.

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::domain::errors::DomainResult;
use crate::domain::models::{ExecutionStatus, WorkflowExecution};

/// Filter criteria for listing executions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HistoryFilter {
    /// Inclusive lower bound on `execution_date`.
    pub from: Option<NaiveDate>,
    /// Inclusive upper bound on `execution_date`.
    pub to: Option<NaiveDate>,
    /// `None` matches every status.
    pub status: Option<ExecutionStatus>,
    /// Case-insensitive substring matched against agent names.
    pub agent: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortField {
    #[default]
    CreatedAt,
    Name,
    TotalDuration,
    Status,
    ExecutionDate,
}

impl SortField {
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "created_at" | "createdat" | "created" => Some(Self::CreatedAt),
            "name" => Some(Self::Name),
            "total_duration" | "duration" => Some(Self::TotalDuration),
            "status" => Some(Self::Status),
            "execution_date" | "date" => Some(Self::ExecutionDate),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    Ascending,
    #[default]
    Descending,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HistorySort {
    pub field: SortField,
    pub direction: SortDirection,
}

/// Repository interface for execution history persistence.
///
/// Records are append-only; there is no update or delete. Lookups by id are
/// served from the history store's cache after [`HistoryRepository::load_all`].
#[async_trait]
pub trait HistoryRepository: Send + Sync {
    /// Persist a finalized execution.
    async fn append(&self, execution: &WorkflowExecution) -> DomainResult<()>;

    /// Load every stored execution in insertion order.
    async fn load_all(&self) -> DomainResult<Vec<WorkflowExecution>>;
}
