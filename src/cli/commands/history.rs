//! Execution history CLI commands.

use anyhow::{anyhow, Result};
use chrono::NaiveDate;
use clap::{Args, Subcommand};

use crate::cli::context::AppContext;
use crate::cli::output::{format_duration_ms, output, CommandOutput, TableFormatter};
use crate::domain::models::{ExecutionStatus, WorkflowExecution};
use crate::domain::ports::{HistoryFilter, HistorySort, SortDirection, SortField};

#[derive(Args, Debug)]
pub struct HistoryArgs {
    #[command(subcommand)]
    pub command: HistoryCommands,
}

#[derive(Subcommand, Debug)]
pub enum HistoryCommands {
    /// List recorded executions
    List {
        /// Earliest execution date (inclusive)
        #[arg(long)]
        from: Option<NaiveDate>,
        /// Latest execution date (inclusive)
        #[arg(long)]
        to: Option<NaiveDate>,
        /// Only executions with this status (completed, failed, ...)
        #[arg(short, long)]
        status: Option<String>,
        /// Only executions involving an agent whose name contains this text
        #[arg(short, long)]
        agent: Option<String>,
        /// Sort field: created_at, name, duration, status, date
        #[arg(long, default_value = "created_at")]
        sort: String,
        /// Sort ascending instead of descending
        #[arg(long)]
        asc: bool,
        /// Maximum number of rows
        #[arg(short, long)]
        limit: Option<usize>,
    },
    /// Show one execution in detail
    Show {
        /// Workflow id
        workflow_id: String,
    },
}

#[derive(Debug, serde::Serialize)]
pub struct HistoryListOutput {
    pub executions: Vec<WorkflowExecution>,
    pub total: usize,
}

impl CommandOutput for HistoryListOutput {
    fn to_human(&self) -> String {
        if self.executions.is_empty() {
            return "No executions found.".to_string();
        }
        let mut header = format!("Found {} execution(s)", self.total);
        if self.executions.len() < self.total {
            header.push_str(&format!(", showing {}", self.executions.len()));
        }
        format!("{header}:\n{}", TableFormatter::new().format_executions(&self.executions))
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

#[derive(Debug, serde::Serialize)]
#[serde(transparent)]
pub struct ExecutionDetailOutput {
    pub execution: WorkflowExecution,
}

impl CommandOutput for ExecutionDetailOutput {
    fn to_human(&self) -> String {
        let execution = &self.execution;
        let expansion = execution.expand();
        let environment = expansion.execution_environment;
        let metrics = expansion.performance_metrics;

        let mut lines = vec![
            format!("Execution: {}", execution.name),
            format!("Workflow ID: {}", execution.workflow_id),
            format!("Status: {}", execution.status),
            format!("Execution date: {}", execution.execution_date),
            format!("Created: {}", execution.created_at.format("%Y-%m-%d %H:%M:%S UTC")),
            format!(
                "Duration: {}",
                execution
                    .total_duration_ms()
                    .map_or_else(|| "-".to_string(), format_duration_ms)
            ),
            format!(
                "Environment: {} ({}, {} agent(s))",
                environment.template_id.as_deref().unwrap_or("custom"),
                environment.mode,
                environment.agent_count
            ),
            format!(
                "\nMetrics: avg agent {}  insights {}  success {}%  errors {}",
                format_duration_ms(metrics.avg_agent_duration_ms),
                metrics.total_insights,
                metrics.success_rate,
                metrics.error_count
            ),
        ];

        if !expansion.agent_details.is_empty() {
            lines.push(String::new());
            lines.push(TableFormatter::new().format_agent_details(expansion.agent_details));
        }
        lines.join("\n")
    }
}

fn parse_status(raw: Option<&str>) -> Result<Option<ExecutionStatus>> {
    raw.map(|s| ExecutionStatus::from_str(s).ok_or_else(|| anyhow!("Invalid status: {s}")))
        .transpose()
}

pub async fn execute(args: HistoryArgs, ctx: &AppContext, json_mode: bool) -> Result<()> {
    let store = ctx.history().await?;

    match args.command {
        HistoryCommands::List {
            from,
            to,
            status,
            agent,
            sort,
            asc,
            limit,
        } => {
            let filter = HistoryFilter {
                from,
                to,
                status: parse_status(status.as_deref())?,
                agent,
            };
            let sort = HistorySort {
                field: SortField::from_str(&sort).ok_or_else(|| anyhow!("Invalid sort field: {sort}"))?,
                direction: if asc {
                    SortDirection::Ascending
                } else {
                    SortDirection::Descending
                },
            };

            let mut executions = store.list(&filter, sort).await;
            let total = executions.len();
            if let Some(limit) = limit {
                executions.truncate(limit);
            }
            output(&HistoryListOutput { executions, total }, json_mode);
        }
        HistoryCommands::Show { workflow_id } => {
            let execution = store
                .get(&workflow_id)
                .await
                .ok_or_else(|| anyhow!("Execution not found: {workflow_id}"))?;
            output(&ExecutionDetailOutput { execution }, json_mode);
        }
    }
    Ok(())
}
