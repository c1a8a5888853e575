//! `agentflow run`: submit a template or graph and follow it live.

use anyhow::{bail, Context, Result};
use chrono::{Local, NaiveDate};
use clap::{ArgGroup, Args};
use console::style;
use std::path::PathBuf;
use std::sync::Arc;

use super::graph::load_graph;
use crate::cli::context::AppContext;
use crate::cli::output::progress::RunProgress;
use crate::cli::output::{format_duration_ms, output, CommandOutput, TableFormatter};
use crate::domain::models::{ExecutionMode, ExecutionStatus, WorkflowExecution};
use crate::services::{ExecutionSnapshot, RunOutcome, RunRequest, RunSelection};

#[derive(Args, Debug)]
#[command(group(ArgGroup::new("pipeline").required(true).args(["template", "graph"])))]
pub struct RunArgs {
    /// Workflow template id
    #[arg(short, long)]
    pub template: Option<String>,

    /// Graph document (.json, .yaml or .yml)
    #[arg(short, long)]
    pub graph: Option<PathBuf>,

    /// Execution date (YYYY-MM-DD), defaults to today
    #[arg(short, long)]
    pub date: Option<NaiveDate>,

    /// Simulate locally instead of submitting to the backend
    #[arg(long)]
    pub simulate: bool,

    /// Extra execution parameter (key=value), repeatable
    #[arg(short, long = "param", value_parser = parse_param)]
    pub params: Vec<(String, String)>,
}

fn parse_param(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => Ok((key.trim().to_string(), value.to_string())),
        _ => Err(format!("expected key=value, got '{raw}'")),
    }
}

fn parameters(params: &[(String, String)]) -> serde_json::Value {
    if params.is_empty() {
        return serde_json::Value::Null;
    }
    let map = params
        .iter()
        .map(|(k, v)| (k.clone(), serde_json::Value::String(v.clone())))
        .collect();
    serde_json::Value::Object(map)
}

#[derive(Debug, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunResult {
    Completed,
    Failed,
    Cancelled,
}

#[derive(Debug, serde::Serialize)]
pub struct RunOutput {
    pub workflow_id: String,
    pub mode: ExecutionMode,
    pub result: RunResult,
    pub recorded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution: Option<WorkflowExecution>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snapshot: Option<ExecutionSnapshot>,
}

impl CommandOutput for RunOutput {
    fn to_human(&self) -> String {
        let mut lines = Vec::new();
        match (&self.execution, &self.snapshot) {
            (Some(execution), _) => {
                let duration = execution
                    .total_duration_ms()
                    .map_or_else(|| "-".to_string(), format_duration_ms);
                let status = match execution.status {
                    ExecutionStatus::Completed => style(execution.status).green(),
                    ExecutionStatus::Failed => style(execution.status).red(),
                    _ => style(execution.status).yellow(),
                };
                lines.push(format!(
                    "{} ({}) {} in {}",
                    style(format!("Execution {}", self.workflow_id)).bold(),
                    self.mode,
                    status,
                    duration
                ));
                lines.push(TableFormatter::new().format_agent_details(&execution.agent_details));
                let metrics = &execution.performance_metrics;
                lines.push(format!(
                    "Insights: {}  Success rate: {}%  Errors: {}",
                    metrics.total_insights, metrics.success_rate, metrics.error_count
                ));
                if self.recorded {
                    lines.push("Recorded in execution history.".to_string());
                } else {
                    lines.push("Warning: the execution could not be recorded in history.".to_string());
                }
            }
            (None, Some(snapshot)) => {
                lines.push(format!(
                    "Execution {} cancelled at {}%; nothing recorded.",
                    self.workflow_id, snapshot.flow.overall_progress
                ));
                lines.push(TableFormatter::new().format_agent_states(&snapshot.agents));
            }
            (None, None) => lines.push(format!("Execution {} ended.", self.workflow_id)),
        }
        lines.join("\n")
    }
}

pub async fn execute(args: RunArgs, ctx: &AppContext, json_mode: bool) -> Result<()> {
    let (catalog, origin) = ctx.catalog().await;
    let history = ctx.history().await?;
    let orchestrator = ctx.orchestrator(Arc::clone(&catalog), history);

    let selection = match (args.template, args.graph) {
        (Some(template), _) => RunSelection::Template(template),
        (None, Some(path)) => RunSelection::Graph(load_graph(&path, Arc::clone(&catalog)).await?),
        (None, None) => bail!("either --template or --graph is required"),
    };

    let simulate = args.simulate || !ctx.backend.is_configured();
    if simulate && !args.simulate {
        tracing::info!("no backend configured, simulating locally");
    }
    tracing::debug!(catalog = %origin, simulate, "submitting execution");

    let handle = orchestrator
        .submit(RunRequest {
            selection,
            execution_date: args.date.unwrap_or_else(|| Local::now().date_naive()),
            parameters: parameters(&args.params),
            simulate,
        })
        .await
        .context("Failed to start execution")?;

    let workflow_id = handle.workflow_id.clone();
    let mut snapshots = handle.snapshots.clone();
    let first = snapshots.borrow_and_update().clone();
    let progress = if json_mode {
        RunProgress::hidden(&first)
    } else {
        RunProgress::new(&first)
    };

    // ends when the run loop drops its snapshot sender
    let render = tokio::spawn(async move {
        let mut last = first;
        while snapshots.changed().await.is_ok() {
            last = snapshots.borrow_and_update().clone();
            progress.update(&last);
        }
        (progress, last)
    });

    let wait = handle.wait();
    tokio::pin!(wait);
    let outcome = tokio::select! {
        outcome = &mut wait => outcome?,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!(workflow_id = %workflow_id, "cancelling execution");
            if let Err(e) = orchestrator.cancel(&workflow_id).await {
                tracing::warn!(workflow_id = %workflow_id, error = %e, "cancel request ignored");
            }
            wait.await?
        }
    };

    let (progress, last) = render.await.context("progress renderer stopped unexpectedly")?;

    let out = match outcome {
        RunOutcome::Finished { record, recorded } => {
            let result = if record.status == ExecutionStatus::Completed {
                RunResult::Completed
            } else {
                RunResult::Failed
            };
            progress.finish(&last, record.status.to_string());
            RunOutput {
                workflow_id,
                mode: record.execution_environment.mode,
                result,
                recorded,
                execution: Some(*record),
                snapshot: None,
            }
        }
        RunOutcome::Cancelled(snapshot) => {
            progress.finish(&snapshot, "cancelled");
            RunOutput {
                workflow_id,
                mode: snapshot.mode,
                result: RunResult::Cancelled,
                recorded: false,
                execution: None,
                snapshot: Some(*snapshot),
            }
        }
    };

    output(&out, json_mode);
    if matches!(out.result, RunResult::Failed) {
        bail!("execution {} failed", out.workflow_id);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_param() {
        assert_eq!(parse_param("region=eu=west").unwrap(), ("region".into(), "eu=west".into()));
        assert!(parse_param("novalue").is_err());
        assert!(parse_param("=x").is_err());
    }

    #[test]
    fn test_parameters_object() {
        assert_eq!(parameters(&[]), serde_json::Value::Null);
        let value = parameters(&[("region".into(), "eu".into())]);
        assert_eq!(value["region"], "eu");
    }
}
