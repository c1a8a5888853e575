//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use agentflow::domain::errors::{BackendError, ChannelError};
use agentflow::domain::models::{
    AgentCatalog, AgentDetail, AgentStatus, ExecutionEnvironment, ExecutionMode, ExecutionStatus,
    PerformanceMetrics, SimulationConfig, StreamMessage, WorkflowExecution,
};
use agentflow::domain::ports::{
    ExecutionRequest, ExecutionSubmitter, NullHistoryRepository, RunPlan, UpdateSource,
    UpdateSubscription,
};
use agentflow::adapters::channel::SimulatedUpdateSource;
use agentflow::services::{EventBus, HistoryStore, Orchestrator, UpdateSources};
use async_trait::async_trait;
use chrono::{Duration, NaiveDate, TimeZone, Utc};
use tokio::sync::mpsc;

/// Accepts every submission and answers with a fixed workflow id.
pub struct StaticSubmitter(pub String);

#[async_trait]
impl ExecutionSubmitter for StaticSubmitter {
    async fn submit(&self, _request: &ExecutionRequest) -> Result<String, BackendError> {
        Ok(self.0.clone())
    }
}

/// Rejects every submission.
pub struct OfflineSubmitter;

#[async_trait]
impl ExecutionSubmitter for OfflineSubmitter {
    async fn submit(&self, _request: &ExecutionRequest) -> Result<String, BackendError> {
        Err(BackendError::NotConfigured)
    }
}

/// Update source whose messages are pushed by the test.
#[derive(Default)]
pub struct ScriptedSource {
    sender: Mutex<Option<mpsc::Sender<StreamMessage>>>,
    mode: Option<ExecutionMode>,
}

impl ScriptedSource {
    pub fn live() -> Self {
        Self {
            sender: Mutex::new(None),
            mode: Some(ExecutionMode::Live),
        }
    }

    /// Sender for the most recent subscription.
    pub fn take_sender(&self) -> mpsc::Sender<StreamMessage> {
        self.sender.lock().unwrap().take().expect("no subscription yet")
    }
}

#[async_trait]
impl UpdateSource for ScriptedSource {
    async fn subscribe(&self, _plan: &RunPlan) -> Result<UpdateSubscription, ChannelError> {
        let (tx, rx) = mpsc::channel(64);
        *self.sender.lock().unwrap() = Some(tx);
        Ok(UpdateSubscription {
            receiver: rx,
            mode: self.mode.unwrap_or(ExecutionMode::Simulated),
        })
    }
}

/// Simulation that emits every message immediately.
pub fn instant_simulation(fail_agents: &[&str]) -> Arc<SimulatedUpdateSource> {
    Arc::new(SimulatedUpdateSource::new(&SimulationConfig {
        tick_ms: 0,
        progress_updates: 2,
        fail_agents: fail_agents.iter().map(ToString::to_string).collect(),
    }))
}

pub fn memory_history() -> Arc<HistoryStore> {
    Arc::new(HistoryStore::new(Arc::new(NullHistoryRepository::new())))
}

pub fn orchestrator(
    submitter: Arc<dyn ExecutionSubmitter>,
    live: Arc<dyn UpdateSource>,
    simulated: Arc<dyn UpdateSource>,
    history: Arc<HistoryStore>,
) -> Orchestrator {
    Orchestrator::new(
        Arc::new(AgentCatalog::builtin()),
        submitter,
        UpdateSources { live, simulated },
        history,
        Arc::new(EventBus::default()),
    )
}

pub fn date(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 12, day).unwrap()
}

/// History record executed on 2024-12-`day`, created `created_minute`
/// minutes after midnight that day.
pub fn execution(
    id: &str,
    name: &str,
    day: u32,
    created_minute: i64,
    status: ExecutionStatus,
    agents: &[&str],
) -> WorkflowExecution {
    let created_at = Utc.with_ymd_and_hms(2024, 12, day, 0, 0, 0).unwrap() + Duration::minutes(created_minute);
    let agent_details: Vec<AgentDetail> = agents
        .iter()
        .map(|name| AgentDetail {
            agent_id: name.to_lowercase().replace(' ', "-"),
            agent_name: (*name).to_string(),
            status: if status == ExecutionStatus::Failed {
                AgentStatus::Error
            } else {
                AgentStatus::Completed
            },
            duration_ms: Some(30_000),
            steps_completed: 5,
            insight_count: 2,
            performance_score: 90,
            error: None,
        })
        .collect();

    WorkflowExecution {
        workflow_id: id.to_string(),
        name: name.to_string(),
        status,
        execution_date: date(day),
        created_at,
        started_at: Some(created_at),
        completed_at: Some(created_at + Duration::minutes(3)),
        steps: vec![],
        performance_metrics: PerformanceMetrics::from_details(&agent_details),
        agent_details,
        execution_environment: ExecutionEnvironment {
            template_id: None,
            template_name: name.to_string(),
            agent_count: agents.len(),
            mode: ExecutionMode::Simulated,
        },
    }
}
