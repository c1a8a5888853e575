//! Execution history records.
//!
//! A [`WorkflowExecution`] is materialized once, when a run finalizes, and
//! is never mutated afterwards.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::flow::{percent, StepStatus, AGENT_STEPS};
use super::lifecycle::{AgentRuntimeState, AgentStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    #[default]
    Pending,
    Running,
    Completed,
    Failed,
}

impl ExecutionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "running" => Some(Self::Running),
            "completed" | "complete" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

impl std::fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where lifecycle messages for a run came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    #[default]
    Live,
    Simulated,
}

impl std::fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Live => write!(f, "live"),
            Self::Simulated => write!(f, "simulated"),
        }
    }
}

/// Flat step view kept for older consumers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionStepSummary {
    pub name: String,
    pub agent: Option<String>,
    pub status: StepStatus,
    pub duration_ms: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentDetail {
    pub agent_id: String,
    pub agent_name: String,
    pub status: AgentStatus,
    pub duration_ms: Option<i64>,
    pub steps_completed: usize,
    pub insight_count: usize,
    pub performance_score: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AgentDetail {
    /// Summarize an agent's runtime state and the number of its flow steps
    /// that completed.
    pub fn from_state(state: &AgentRuntimeState, steps_completed: usize) -> Self {
        let result = state.result.as_ref();
        let insight_count = result.map_or(0, insight_count);
        let performance_score = result
            .and_then(reported_score)
            .unwrap_or_else(|| match state.status {
                AgentStatus::Completed => 100,
                _ => percent(steps_completed, AGENT_STEPS.len()),
            });

        Self {
            agent_id: state.agent_id.clone(),
            agent_name: state.agent_name.clone(),
            status: state.status,
            duration_ms: state.duration_ms(),
            steps_completed,
            insight_count,
            performance_score,
            error: state.error.clone(),
        }
    }
}

/// Insights reported in an agent result: an `insights` array, or an
/// explicit count.
fn insight_count(result: &serde_json::Value) -> usize {
    if let Some(items) = result.get("insights").and_then(serde_json::Value::as_array) {
        return items.len();
    }
    ["insightCount", "insight_count"]
        .iter()
        .find_map(|key| result.get(key).and_then(serde_json::Value::as_u64))
        .and_then(|n| usize::try_from(n).ok())
        .unwrap_or(0)
}

fn reported_score(result: &serde_json::Value) -> Option<u8> {
    ["performanceScore", "performance_score"]
        .iter()
        .find_map(|key| result.get(key).and_then(serde_json::Value::as_f64))
        .map(|score| {
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let clamped = score.clamp(0.0, 100.0).round() as u8;
            clamped
        })
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceMetrics {
    pub avg_agent_duration_ms: i64,
    pub total_insights: usize,
    /// Percentage of agents that completed.
    pub success_rate: u8,
    pub error_count: usize,
}

impl PerformanceMetrics {
    pub fn from_details(details: &[AgentDetail]) -> Self {
        let durations: Vec<i64> = details.iter().filter_map(|d| d.duration_ms).collect();
        let avg_agent_duration_ms = if durations.is_empty() {
            0
        } else {
            durations.iter().sum::<i64>() / i64::try_from(durations.len()).unwrap_or(1)
        };
        let completed = details
            .iter()
            .filter(|d| d.status == AgentStatus::Completed)
            .count();

        Self {
            avg_agent_duration_ms,
            total_insights: details.iter().map(|d| d.insight_count).sum(),
            success_rate: percent(completed, details.len()),
            error_count: details
                .iter()
                .filter(|d| d.status == AgentStatus::Error)
                .count(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionEnvironment {
    pub template_id: Option<String>,
    pub template_name: String,
    pub agent_count: usize,
    pub mode: ExecutionMode,
}

/// Immutable record of one finished run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowExecution {
    pub workflow_id: String,
    pub name: String,
    pub status: ExecutionStatus,
    pub execution_date: NaiveDate,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub steps: Vec<ExecutionStepSummary>,
    #[serde(default)]
    pub agent_details: Vec<AgentDetail>,
    #[serde(default)]
    pub performance_metrics: PerformanceMetrics,
    #[serde(default)]
    pub execution_environment: ExecutionEnvironment,
}

/// Read-side projection of a record's detail sections.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionExpansion<'a> {
    pub performance_metrics: &'a PerformanceMetrics,
    pub execution_environment: &'a ExecutionEnvironment,
    pub agent_details: &'a [AgentDetail],
}

impl WorkflowExecution {
    pub fn total_duration_ms(&self) -> Option<i64> {
        match (self.started_at, self.completed_at) {
            (Some(start), Some(end)) => Some((end - start).num_milliseconds()),
            _ => None,
        }
    }

    pub fn agent_names(&self) -> impl Iterator<Item = &str> {
        self.agent_details.iter().map(|d| d.agent_name.as_str())
    }

    pub fn expand(&self) -> ExecutionExpansion<'_> {
        ExecutionExpansion {
            performance_metrics: &self.performance_metrics,
            execution_environment: &self.execution_environment,
            agent_details: &self.agent_details,
        }
    }
}
