//! SQLite implementation of the HistoryRepository.

use async_trait::async_trait;
use sqlx::SqlitePool;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::WorkflowExecution;
use crate::domain::ports::HistoryRepository;

#[derive(Clone)]
pub struct SqliteHistoryRepository {
    pool: SqlitePool,
}

impl SqliteHistoryRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl HistoryRepository for SqliteHistoryRepository {
    async fn append(&self, execution: &WorkflowExecution) -> DomainResult<()> {
        let record_json = serde_json::to_string(execution)?;

        sqlx::query(
            "INSERT INTO workflow_executions (workflow_id, name, status, execution_date, created_at, record_json)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&execution.workflow_id)
        .bind(&execution.name)
        .bind(execution.status.as_str())
        .bind(execution.execution_date.to_string())
        .bind(execution.created_at.to_rfc3339())
        .bind(&record_json)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn load_all(&self) -> DomainResult<Vec<WorkflowExecution>> {
        let rows: Vec<(String,)> =
            sqlx::query_as("SELECT record_json FROM workflow_executions ORDER BY seq")
                .fetch_all(&self.pool)
                .await?;

        rows.into_iter()
            .map(|(json,)| serde_json::from_str(&json).map_err(DomainError::from))
            .collect()
    }
}
