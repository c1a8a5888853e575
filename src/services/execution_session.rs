//! Per-execution state and the streaming message dispatcher.
//!
//! An [`ExecutionSession`] owns the orchestration flow and the runtime state
//! of every agent in one run. [`ExecutionSession::dispatch`] is the single
//! entry point that applies a [`StreamMessage`]; a rejected message leaves
//! the session exactly as it was.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::errors::{DispatchError, FlowError};
use crate::domain::models::flow::{agent_phase_id, step_id, COMPLETION_PHASE_ID, INITIALIZATION_PHASE_ID};
use crate::domain::models::{
    AgentDefinition, AgentDetail, AgentRuntimeState, AgentStatus, ExecutionEnvironment,
    ExecutionMode, ExecutionStatus, ExecutionStepSummary, MessageType, OrchestrationFlow,
    PerformanceMetrics, PhaseKind, StepStatus, StreamMessage, WorkflowExecution,
};

/// Message attached to whatever was running when a run is cancelled.
pub const CANCELLED_MESSAGE: &str = "Execution cancelled by user";

const INITIALIZATION_KEYS: [&str; 2] = ["load-configuration", "validate-dependencies"];
const COMPLETION_KEYS: [&str; 3] = ["aggregate-results", "generate-report", "save-to-history"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Running)
    }

    pub fn execution_status(&self) -> ExecutionStatus {
        match self {
            Self::Running => ExecutionStatus::Running,
            Self::Completed => ExecutionStatus::Completed,
            Self::Failed | Self::Cancelled => ExecutionStatus::Failed,
        }
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything needed to open a session.
#[derive(Debug, Clone)]
pub struct SessionSpec {
    pub workflow_id: String,
    pub name: String,
    pub template_id: Option<String>,
    pub execution_date: NaiveDate,
    /// Agents in execution order.
    pub agents: Vec<AgentDefinition>,
    pub mode: ExecutionMode,
}

/// Result of a successfully applied message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    Continue,
    /// `workflow_completed` was applied; the session accepts nothing more.
    Finished,
}

/// Read-only copy of a session handed to renderers.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionSnapshot {
    pub workflow_id: String,
    pub name: String,
    pub status: SessionStatus,
    pub mode: ExecutionMode,
    pub flow: OrchestrationFlow,
    pub agents: Vec<AgentRuntimeState>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct ExecutionSession {
    workflow_id: String,
    name: String,
    template_id: Option<String>,
    execution_date: NaiveDate,
    mode: ExecutionMode,
    agents: Vec<AgentDefinition>,
    /// Parallel to `agents`.
    states: Vec<AgentRuntimeState>,
    flow: OrchestrationFlow,
    status: SessionStatus,
    created_at: DateTime<Utc>,
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
}

impl ExecutionSession {
    pub fn new(spec: SessionSpec) -> Result<Self, FlowError> {
        let flow = OrchestrationFlow::new(&spec.agents)?;
        let states = spec
            .agents
            .iter()
            .map(|a| AgentRuntimeState::new(a.id.clone(), a.name.clone()))
            .collect();
        Ok(Self {
            workflow_id: spec.workflow_id,
            name: spec.name,
            template_id: spec.template_id,
            execution_date: spec.execution_date,
            mode: spec.mode,
            agents: spec.agents,
            states,
            flow,
            status: SessionStatus::Running,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
        })
    }

    pub fn workflow_id(&self) -> &str {
        &self.workflow_id
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn mode(&self) -> ExecutionMode {
        self.mode
    }

    /// Record that updates now come from a different source. Progress made
    /// so far is kept.
    pub fn switch_mode(&mut self, mode: ExecutionMode) {
        self.mode = mode;
    }

    pub fn flow(&self) -> &OrchestrationFlow {
        &self.flow
    }

    pub fn agent_states(&self) -> &[AgentRuntimeState] {
        &self.states
    }

    /// Apply one streaming message.
    pub fn dispatch(&mut self, message: &StreamMessage) -> Result<DispatchOutcome, DispatchError> {
        if self.status.is_terminal() {
            return Err(DispatchError::ExecutionClosed(self.status.to_string()));
        }
        if message.workflow_id != self.workflow_id {
            return Err(DispatchError::WrongWorkflow {
                expected: self.workflow_id.clone(),
                received: message.workflow_id.clone(),
            });
        }

        match message.message_type {
            MessageType::WorkflowStarted => {
                self.start_workflow()?;
                Ok(DispatchOutcome::Continue)
            }
            MessageType::AgentStarted => {
                let index = self.agent_index(message)?;
                self.start_agent(index)?;
                Ok(DispatchOutcome::Continue)
            }
            MessageType::AgentProgress => {
                let index = self.agent_index(message)?;
                self.record_progress(index, message.progress.unwrap_or(0), message.message.as_deref())?;
                Ok(DispatchOutcome::Continue)
            }
            MessageType::AgentCompleted => {
                let index = self.agent_index(message)?;
                self.complete_agent(index, message.result.clone())?;
                Ok(DispatchOutcome::Continue)
            }
            MessageType::AgentError => {
                let index = self.agent_index(message)?;
                let error = message
                    .error
                    .as_deref()
                    .or(message.message.as_deref())
                    .unwrap_or("Agent reported an error");
                self.fail_agent(index, error)?;
                Ok(DispatchOutcome::Continue)
            }
            MessageType::WorkflowCompleted => {
                self.complete_workflow()?;
                Ok(DispatchOutcome::Finished)
            }
        }
    }

    fn agent_index(&self, message: &StreamMessage) -> Result<usize, DispatchError> {
        let name = message
            .agent_name
            .as_deref()
            .ok_or_else(|| DispatchError::MissingAgentName(message.message_type.to_string()))?;
        self.agents
            .iter()
            .position(|a| a.matches_name(name))
            .ok_or_else(|| DispatchError::UnknownAgent(name.to_string()))
    }

    fn start_workflow(&mut self) -> Result<(), FlowError> {
        if self.started_at.is_none() {
            self.started_at = Some(Utc::now());
        }
        for key in INITIALIZATION_KEYS {
            self.run_step(INITIALIZATION_PHASE_ID, key, "Initialization step finished")?;
        }
        Ok(())
    }

    fn start_agent(&mut self, index: usize) -> Result<(), DispatchError> {
        // agents run in plan order: every earlier agent must be resolved
        if let Some(blocking) = self.states[..index].iter().find(|s| !s.status.is_terminal()) {
            return Err(DispatchError::SequencingViolation {
                agent: self.agents[index].name.clone(),
                blocking: blocking.agent_name.clone(),
            });
        }

        self.states[index].advance_to(AgentStatus::Running)?;
        // a backend that skips workflow_started still gets a complete flow
        self.start_workflow()?;

        let phase = agent_phase_id(&self.agents[index].id);
        for key in ["prepare", "load-prompts", "retrieve-data"] {
            self.run_step(&phase, key, "Agent step finished")?;
        }
        self.flow.advance_step(
            &step_id(&phase, "execute"),
            StepStatus::Running,
            0,
            &[format!("{} started", self.agents[index].name)],
        )?;
        Ok(())
    }

    fn record_progress(&mut self, index: usize, progress: u8, label: Option<&str>) -> Result<(), DispatchError> {
        self.states[index].update_progress(progress, label)?;
        let logs: Vec<String> = label.map(str::to_string).into_iter().collect();
        self.flow.advance_step(
            &step_id(&agent_phase_id(&self.agents[index].id), "execute"),
            StepStatus::Running,
            progress,
            &logs,
        )?;
        Ok(())
    }

    fn complete_agent(&mut self, index: usize, result: Option<serde_json::Value>) -> Result<(), DispatchError> {
        self.states[index].complete(result)?;
        let phase = agent_phase_id(&self.agents[index].id);
        self.flow
            .advance_step(&step_id(&phase, "execute"), StepStatus::Completed, 100, &[])?;
        self.run_step(&phase, "finalize", "Results finalized")?;
        tracing::debug!(workflow_id = %self.workflow_id, agent = %self.agents[index].name, "agent completed");
        Ok(())
    }

    fn fail_agent(&mut self, index: usize, error: &str) -> Result<(), DispatchError> {
        self.states[index].fail(error)?;
        let phase_id = agent_phase_id(&self.agents[index].id);
        let phase = self
            .flow
            .phase(&phase_id)
            .ok_or_else(|| FlowError::StepNotFound(step_id(&phase_id, "execute")))?;
        let target = phase
            .steps
            .iter()
            .find(|s| s.status == StepStatus::Running)
            .or_else(|| phase.steps.iter().find(|s| s.status == StepStatus::Pending))
            .map(|s| (s.id.clone(), s.progress));
        if let Some((id, progress)) = target {
            self.flow
                .advance_step(&id, StepStatus::Error, progress, &[error.to_string()])?;
        }
        tracing::warn!(workflow_id = %self.workflow_id, agent = %self.agents[index].name, error, "agent failed");
        Ok(())
    }

    fn complete_workflow(&mut self) -> Result<(), DispatchError> {
        for state in &mut self.states {
            if state.status.is_active() {
                state.fail("Workflow completed before the agent reported a result")?;
            }
        }
        for agent in &self.agents {
            let phase = self.flow.phase(&agent_phase_id(&agent.id));
            let running: Vec<String> = phase
                .map(|p| {
                    p.steps
                        .iter()
                        .filter(|s| s.status == StepStatus::Running)
                        .map(|s| s.id.clone())
                        .collect()
                })
                .unwrap_or_default();
            for id in running {
                self.flow.advance_step(&id, StepStatus::Error, 0, &[])?;
            }
        }
        for key in COMPLETION_KEYS {
            self.run_step(COMPLETION_PHASE_ID, key, "Completion step finished")?;
        }

        let all_completed = self.states.iter().all(|s| s.status == AgentStatus::Completed);
        self.status = if all_completed && self.flow.is_complete() {
            SessionStatus::Completed
        } else {
            SessionStatus::Failed
        };
        self.completed_at = Some(Utc::now());
        if self.started_at.is_none() {
            self.started_at = self.completed_at;
        }
        tracing::info!(
            workflow_id = %self.workflow_id,
            status = %self.status,
            progress = self.flow.overall_progress,
            "workflow completed"
        );
        Ok(())
    }

    /// Move an open step through running to completed. Resolved steps are
    /// left alone.
    fn run_step(&mut self, phase: &str, key: &str, log: &str) -> Result<(), FlowError> {
        let id = step_id(phase, key);
        let step = self
            .flow
            .step(&id)
            .ok_or_else(|| FlowError::StepNotFound(id.clone()))?;
        if step.status.is_open() {
            self.flow.advance_step(&id, StepStatus::Running, 0, &[])?;
            self.flow
                .advance_step(&id, StepStatus::Completed, 100, &[log.to_string()])?;
        }
        Ok(())
    }

    /// Stop the run: the running step and the active agent become errors,
    /// progress stays where it is.
    pub fn cancel(&mut self) -> Result<(), DispatchError> {
        if self.status.is_terminal() {
            return Err(DispatchError::ExecutionClosed(self.status.to_string()));
        }
        let running: Vec<(String, u8)> = self
            .flow
            .running_steps()
            .map(|s| (s.id.clone(), s.progress))
            .collect();
        for (id, progress) in running {
            self.flow
                .advance_step(&id, StepStatus::Error, progress, &[CANCELLED_MESSAGE.to_string()])?;
        }
        for state in &mut self.states {
            if state.status.is_active() {
                state.fail(CANCELLED_MESSAGE)?;
            }
        }
        self.status = SessionStatus::Cancelled;
        self.completed_at = Some(Utc::now());
        tracing::info!(workflow_id = %self.workflow_id, progress = self.flow.overall_progress, "execution cancelled");
        Ok(())
    }

    pub fn snapshot(&self) -> ExecutionSnapshot {
        ExecutionSnapshot {
            workflow_id: self.workflow_id.clone(),
            name: self.name.clone(),
            status: self.status,
            mode: self.mode,
            flow: self.flow.clone(),
            agents: self.states.clone(),
            started_at: self.started_at,
            completed_at: self.completed_at,
        }
    }

    /// Summarize the session as a history record.
    pub fn to_record(&self) -> WorkflowExecution {
        let agent_details: Vec<AgentDetail> = self
            .agents
            .iter()
            .zip(&self.states)
            .map(|(agent, state)| {
                let steps_completed = self
                    .flow
                    .phase(&agent_phase_id(&agent.id))
                    .map_or(0, |p| p.completed_steps());
                AgentDetail::from_state(state, steps_completed)
            })
            .collect();

        let steps = self
            .flow
            .phases
            .iter()
            .flat_map(|phase| {
                let agent = match &phase.kind {
                    PhaseKind::Agent { agent_id } => self
                        .agents
                        .iter()
                        .find(|a| &a.id == agent_id)
                        .map(|a| a.name.clone()),
                    _ => None,
                };
                phase.steps.iter().map(move |step| ExecutionStepSummary {
                    name: step.name.clone(),
                    agent: agent.clone(),
                    status: step.status,
                    duration_ms: step.duration_ms,
                })
            })
            .collect();

        WorkflowExecution {
            workflow_id: self.workflow_id.clone(),
            name: self.name.clone(),
            status: self.status.execution_status(),
            execution_date: self.execution_date,
            created_at: self.created_at,
            started_at: self.started_at,
            completed_at: self.completed_at,
            steps,
            performance_metrics: PerformanceMetrics::from_details(&agent_details),
            execution_environment: ExecutionEnvironment {
                template_id: self.template_id.clone(),
                template_name: self.name.clone(),
                agent_count: self.agents.len(),
                mode: self.mode,
            },
            agent_details,
        }
    }
}
