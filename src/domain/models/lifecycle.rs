//! Per-agent execution state machine.
//!
//! ```text
//! Idle → Preparing → PullingPrompts → RetrievingData → Running → Processing → Completed
//!           ↘              ↘                ↘             ↘           ↘
//!                                   Error (terminal)
//! ```
//!
//! Transitions only move forward; a state is never revisited. Progress
//! updates are accepted while `Running` and stay inside the running band.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::errors::LifecycleError;

/// Lower bound of the progress band reported while an agent is running.
pub const RUNNING_PROGRESS_FLOOR: u8 = 25;
/// Upper bound of the progress band reported while an agent is running.
pub const RUNNING_PROGRESS_CEILING: u8 = 95;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    #[default]
    Idle,
    Preparing,
    PullingPrompts,
    RetrievingData,
    Running,
    Processing,
    Completed,
    Error,
}

impl AgentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Preparing => "preparing",
            Self::PullingPrompts => "pulling_prompts",
            Self::RetrievingData => "retrieving_data",
            Self::Running => "running",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Error => "error",
        }
    }

    /// Position in the forward chain. `Error` sits outside it.
    fn rank(self) -> Option<u8> {
        match self {
            Self::Idle => Some(0),
            Self::Preparing => Some(1),
            Self::PullingPrompts => Some(2),
            Self::RetrievingData => Some(3),
            Self::Running => Some(4),
            Self::Processing => Some(5),
            Self::Completed => Some(6),
            Self::Error => None,
        }
    }

    /// Progress assigned on entering this state.
    pub fn progress_floor(&self) -> u8 {
        match self {
            Self::Idle => 0,
            Self::Preparing => 5,
            Self::PullingPrompts => 15,
            Self::RetrievingData => 20,
            Self::Running => RUNNING_PROGRESS_FLOOR,
            Self::Processing => RUNNING_PROGRESS_CEILING,
            Self::Completed => 100,
            Self::Error => 0,
        }
    }

    fn default_label(&self) -> &'static str {
        match self {
            Self::Idle => "Waiting",
            Self::Preparing => "Preparing agent",
            Self::PullingPrompts => "Pulling prompts",
            Self::RetrievingData => "Retrieving data",
            Self::Running => "Running analysis",
            Self::Processing => "Processing results",
            Self::Completed => "Completed",
            Self::Error => "Failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Error)
    }

    /// Whether the agent has started and not yet finished.
    pub fn is_active(&self) -> bool {
        !matches!(self, Self::Idle) && !self.is_terminal()
    }

    /// Next state in the forward chain, if any.
    pub fn next(&self) -> Option<Self> {
        match self {
            Self::Idle => Some(Self::Preparing),
            Self::Preparing => Some(Self::PullingPrompts),
            Self::PullingPrompts => Some(Self::RetrievingData),
            Self::RetrievingData => Some(Self::Running),
            Self::Running => Some(Self::Processing),
            Self::Processing => Some(Self::Completed),
            Self::Completed | Self::Error => None,
        }
    }

    /// Only the immediate successor is reachable, plus `Error` from any
    /// started non-terminal state.
    pub fn can_transition_to(&self, to: Self) -> bool {
        if to == Self::Error {
            return self.is_active();
        }
        self.next() == Some(to)
    }
}

impl std::fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Mutable per-execution record for one agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentRuntimeState {
    pub agent_id: String,
    pub agent_name: String,
    pub status: AgentStatus,
    pub progress: u8,
    pub current_step_label: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub result: Option<serde_json::Value>,
    pub error: Option<String>,
    #[serde(default)]
    pub logs: Vec<String>,
}

impl AgentRuntimeState {
    pub fn new(agent_id: impl Into<String>, agent_name: impl Into<String>) -> Self {
        Self {
            agent_id: agent_id.into(),
            agent_name: agent_name.into(),
            status: AgentStatus::Idle,
            progress: 0,
            current_step_label: None,
            start_time: None,
            end_time: None,
            result: None,
            error: None,
            logs: Vec::new(),
        }
    }

    /// Move to `to`, applying its progress floor and appending a log line.
    pub fn transition(&mut self, to: AgentStatus, label: Option<&str>) -> Result<(), LifecycleError> {
        self.transition_at(to, label, Utc::now())
    }

    pub(crate) fn transition_at(
        &mut self,
        to: AgentStatus,
        label: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<(), LifecycleError> {
        if !self.status.can_transition_to(to) {
            return Err(LifecycleError::InvalidTransition {
                agent: self.agent_name.clone(),
                from: self.status,
                to,
            });
        }

        let from = self.status;
        self.status = to;
        if to != AgentStatus::Error {
            // error keeps whatever progress was reached
            self.progress = self.progress.max(to.progress_floor());
        }
        let label = label.unwrap_or_else(|| to.default_label()).to_string();
        self.logs.push(format!("[{}] {} -> {}: {}", now.format("%H:%M:%S"), from, to, label));
        self.current_step_label = Some(label);

        if self.start_time.is_none() {
            self.start_time = Some(now);
        }
        if to.is_terminal() {
            self.end_time = Some(now);
        }
        Ok(())
    }

    /// Walk forward through every intermediate state until `to` is reached.
    pub fn advance_to(&mut self, to: AgentStatus) -> Result<(), LifecycleError> {
        let now = Utc::now();
        let agent = self.agent_name.clone();
        let from = self.status;
        let invalid = || LifecycleError::InvalidTransition {
            agent: agent.clone(),
            from,
            to,
        };
        match (self.status.rank(), to.rank()) {
            (Some(from), Some(target)) if target > from => {}
            _ => return Err(invalid()),
        }
        while self.status != to {
            let next = self.status.next().ok_or_else(invalid)?;
            self.transition_at(next, None, now)?;
        }
        Ok(())
    }

    /// Record backend progress (0-100) while running, mapped into the
    /// running band. Progress never decreases.
    pub fn update_progress(&mut self, backend_progress: u8, label: Option<&str>) -> Result<(), LifecycleError> {
        if self.status != AgentStatus::Running {
            return Err(LifecycleError::NotRunning {
                agent: self.agent_name.clone(),
                status: self.status,
            });
        }
        let span = u32::from(RUNNING_PROGRESS_CEILING - RUNNING_PROGRESS_FLOOR);
        let scaled = u32::from(backend_progress.min(100)) * span / 100;
        let mapped = RUNNING_PROGRESS_FLOOR + u8::try_from(scaled).unwrap_or(0);
        self.progress = self.progress.max(mapped);
        if let Some(label) = label {
            self.current_step_label = Some(label.to_string());
            self.logs.push(label.to_string());
        }
        Ok(())
    }

    /// Finish a running agent. Agents that never reached `Running` are
    /// rejected so a completion cannot overtake its start.
    pub fn complete(&mut self, result: Option<serde_json::Value>) -> Result<(), LifecycleError> {
        if !matches!(self.status, AgentStatus::Running | AgentStatus::Processing) {
            return Err(LifecycleError::InvalidTransition {
                agent: self.agent_name.clone(),
                from: self.status,
                to: AgentStatus::Completed,
            });
        }
        self.advance_to(AgentStatus::Completed)?;
        self.result = result;
        Ok(())
    }

    pub fn fail(&mut self, error: impl Into<String>) -> Result<(), LifecycleError> {
        let error = error.into();
        self.transition(AgentStatus::Error, Some(&error))?;
        self.error = Some(error);
        Ok(())
    }

    /// Return to idle for a fresh execution.
    pub fn reset(&mut self) {
        *self = Self::new(std::mem::take(&mut self.agent_id), std::mem::take(&mut self.agent_name));
    }

    /// Wall-clock time between the first transition and the terminal one.
    pub fn duration_ms(&self) -> Option<i64> {
        match (self.start_time, self.end_time) {
            (Some(start), Some(end)) => Some((end - start).num_milliseconds()),
            _ => None,
        }
    }
}
