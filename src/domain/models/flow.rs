//! Orchestration flow: phases of steps with derived progress.
//!
//! A flow is built once per execution from the ordered agent list:
//!
//! ```text
//! initialization: load-configuration, validate-dependencies
//! agent:<id> x N: prepare, load-prompts, retrieve-data, execute, finalize
//! completion:     aggregate-results, generate-report, save-to-history
//! ```
//!
//! `total_steps` is fixed at construction. Phase status/progress, the
//! flow-wide `completed_steps`/`overall_progress` and the current position
//! are recomputed after every [`OrchestrationFlow::advance_step`] and are
//! never set directly.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::agent::AgentDefinition;
use crate::domain::errors::FlowError;

pub const INITIALIZATION_PHASE_ID: &str = "initialization";
pub const COMPLETION_PHASE_ID: &str = "completion";

const INITIALIZATION_STEPS: &[(&str, &str)] = &[
    ("load-configuration", "Load configuration"),
    ("validate-dependencies", "Validate dependencies"),
];

/// Steps every agent phase goes through, in order.
pub const AGENT_STEPS: &[(&str, &str)] = &[
    ("prepare", "Prepare agent"),
    ("load-prompts", "Load prompts"),
    ("retrieve-data", "Retrieve data"),
    ("execute", "Execute analysis"),
    ("finalize", "Finalize results"),
];

const COMPLETION_STEPS: &[(&str, &str)] = &[
    ("aggregate-results", "Aggregate results"),
    ("generate-report", "Generate report"),
    ("save-to-history", "Save to history"),
];

/// Status shared by steps and phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    #[default]
    Pending,
    Running,
    Completed,
    Error,
}

impl StepStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Error => "error",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Error)
    }

    /// Unresolved work: the flow's current position points at these.
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Pending | Self::Running)
    }
}

impl std::fmt::Display for StepStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a phase represents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PhaseKind {
    Initialization,
    Agent { agent_id: String },
    Completion,
}

/// Smallest trackable unit of work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrchestrationStep {
    /// Unique across the flow (`<phase id>:<step key>`).
    pub id: String,
    pub name: String,
    pub agent_ref: Option<String>,
    pub status: StepStatus,
    pub progress: u8,
    pub logs: Vec<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub duration_ms: Option<i64>,
}

impl OrchestrationStep {
    fn new(phase_id: &str, key: &str, name: &str, agent_ref: Option<&str>) -> Self {
        Self {
            id: step_id(phase_id, key),
            name: name.to_string(),
            agent_ref: agent_ref.map(str::to_string),
            status: StepStatus::Pending,
            progress: 0,
            logs: Vec::new(),
            start_time: None,
            end_time: None,
            duration_ms: None,
        }
    }
}

/// Build the flow-wide id of a step.
pub fn step_id(phase_id: &str, key: &str) -> String {
    format!("{phase_id}:{key}")
}

/// Id of the phase tracking one agent. Prefixed so no agent id can alias
/// the fixed phases.
pub fn agent_phase_id(agent_id: &str) -> String {
    format!("agent:{agent_id}")
}

/// A named group of steps with derived status and progress.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrchestrationPhase {
    pub id: String,
    pub name: String,
    pub kind: PhaseKind,
    pub steps: Vec<OrchestrationStep>,
    pub status: StepStatus,
    pub progress: u8,
}

impl OrchestrationPhase {
    fn new(id: &str, name: &str, kind: PhaseKind, steps: &[(&str, &str)]) -> Self {
        let agent_ref = match &kind {
            PhaseKind::Agent { agent_id } => Some(agent_id.clone()),
            _ => None,
        };
        Self {
            id: id.to_string(),
            name: name.to_string(),
            steps: steps
                .iter()
                .map(|(key, name)| OrchestrationStep::new(id, key, name, agent_ref.as_deref()))
                .collect(),
            kind,
            status: StepStatus::Pending,
            progress: 0,
        }
    }

    pub fn completed_steps(&self) -> usize {
        self.steps
            .iter()
            .filter(|s| s.status == StepStatus::Completed)
            .count()
    }

    /// Derive status and progress from the steps.
    fn recompute(&mut self) {
        self.progress = percent(self.completed_steps(), self.steps.len());
        self.status = if self.steps.iter().any(|s| s.status == StepStatus::Error) {
            StepStatus::Error
        } else if !self.steps.is_empty() && self.steps.iter().all(|s| s.status == StepStatus::Completed) {
            StepStatus::Completed
        } else if self
            .steps
            .iter()
            .any(|s| matches!(s.status, StepStatus::Running | StepStatus::Completed))
        {
            StepStatus::Running
        } else {
            StepStatus::Pending
        };
    }

    pub fn step(&self, key: &str) -> Option<&OrchestrationStep> {
        let id = step_id(&self.id, key);
        self.steps.iter().find(|s| s.id == id)
    }
}

/// Whole-execution aggregate of phases.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrchestrationFlow {
    pub phases: Vec<OrchestrationPhase>,
    /// First phase holding unresolved work; `None` once everything resolved.
    pub current_phase_index: Option<usize>,
    pub current_step_index: Option<usize>,
    pub total_steps: usize,
    pub completed_steps: usize,
    pub overall_progress: u8,
}

impl OrchestrationFlow {
    /// Build the phase/step structure for the given agents, in order.
    pub fn new(agents: &[AgentDefinition]) -> Result<Self, FlowError> {
        let mut seen = HashSet::new();
        let mut phases = Vec::with_capacity(agents.len() + 2);
        phases.push(OrchestrationPhase::new(
            INITIALIZATION_PHASE_ID,
            "Initialization",
            PhaseKind::Initialization,
            INITIALIZATION_STEPS,
        ));
        for agent in agents {
            if !seen.insert(agent.id.as_str()) {
                return Err(FlowError::DuplicateAgent(agent.id.clone()));
            }
            phases.push(OrchestrationPhase::new(
                &agent_phase_id(&agent.id),
                &agent.name,
                PhaseKind::Agent {
                    agent_id: agent.id.clone(),
                },
                AGENT_STEPS,
            ));
        }
        phases.push(OrchestrationPhase::new(
            COMPLETION_PHASE_ID,
            "Completion",
            PhaseKind::Completion,
            COMPLETION_STEPS,
        ));

        let total_steps = phases.iter().map(|p| p.steps.len()).sum();
        let mut flow = Self {
            phases,
            current_phase_index: None,
            current_step_index: None,
            total_steps,
            completed_steps: 0,
            overall_progress: 0,
        };
        flow.recompute_position();
        Ok(flow)
    }

    pub fn phase(&self, id: &str) -> Option<&OrchestrationPhase> {
        self.phases.iter().find(|p| p.id == id)
    }

    pub fn step(&self, step_id: &str) -> Option<&OrchestrationStep> {
        self.phases
            .iter()
            .flat_map(|p| p.steps.iter())
            .find(|s| s.id == step_id)
    }

    /// The step the flow currently points at.
    pub fn current_step(&self) -> Option<&OrchestrationStep> {
        let phase = self.phases.get(self.current_phase_index?)?;
        phase.steps.get(self.current_step_index?)
    }

    /// Succeeds only when every phase completed.
    pub fn is_complete(&self) -> bool {
        self.phases.iter().all(|p| p.status == StepStatus::Completed)
    }

    pub fn has_errors(&self) -> bool {
        self.phases.iter().any(|p| p.status == StepStatus::Error)
    }

    /// Update one step and recompute every derived figure.
    pub fn advance_step(
        &mut self,
        step_id: &str,
        status: StepStatus,
        progress: u8,
        logs: &[String],
    ) -> Result<&OrchestrationStep, FlowError> {
        self.advance_step_at(step_id, status, progress, logs, Utc::now())
    }

    pub(crate) fn advance_step_at(
        &mut self,
        step_id: &str,
        status: StepStatus,
        progress: u8,
        logs: &[String],
        now: DateTime<Utc>,
    ) -> Result<&OrchestrationStep, FlowError> {
        let (phase_idx, step_idx) = self
            .locate(step_id)
            .ok_or_else(|| FlowError::StepNotFound(step_id.to_string()))?;

        let phase = &mut self.phases[phase_idx];
        let step = &mut phase.steps[step_idx];
        let previous = step.status;
        step.status = status;
        step.progress = progress.min(100);
        step.logs.extend(logs.iter().cloned());

        if status == StepStatus::Running && step.start_time.is_none() {
            step.start_time = Some(now);
        }
        if status.is_terminal() && !previous.is_terminal() {
            step.end_time = Some(now);
            step.duration_ms = step.start_time.map(|start| (now - start).num_milliseconds());
        }

        phase.recompute();
        self.completed_steps = self.phases.iter().map(OrchestrationPhase::completed_steps).sum();
        self.overall_progress = percent(self.completed_steps, self.total_steps);
        self.recompute_position();

        Ok(&self.phases[phase_idx].steps[step_idx])
    }

    /// Point at the earliest unresolved step, scanning phases in order.
    fn recompute_position(&mut self) {
        let position = self.phases.iter().enumerate().find_map(|(pi, phase)| {
            phase
                .steps
                .iter()
                .position(|s| s.status.is_open())
                .map(|si| (pi, si))
        });
        self.current_phase_index = position.map(|(p, _)| p);
        self.current_step_index = position.map(|(_, s)| s);
    }

    fn locate(&self, step_id: &str) -> Option<(usize, usize)> {
        self.phases.iter().enumerate().find_map(|(pi, phase)| {
            phase
                .steps
                .iter()
                .position(|s| s.id == step_id)
                .map(|si| (pi, si))
        })
    }

    /// Every step currently running, in flow order.
    pub fn running_steps(&self) -> impl Iterator<Item = &OrchestrationStep> {
        self.phases
            .iter()
            .flat_map(|p| p.steps.iter())
            .filter(|s| s.status == StepStatus::Running)
    }
}

/// `round(part / whole * 100)`, 0 for an empty whole.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
pub fn percent(part: usize, whole: usize) -> u8 {
    if whole == 0 {
        return 0;
    }
    ((part as f64 / whole as f64) * 100.0).round().min(100.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::AgentCatalog;

    fn agents(ids: &[&str]) -> Vec<AgentDefinition> {
        let catalog = AgentCatalog::builtin();
        ids.iter()
            .map(|id| catalog.agent(id).unwrap().clone())
            .collect()
    }

    fn three_agent_flow() -> OrchestrationFlow {
        OrchestrationFlow::new(&agents(&[
            "performance-analyzer",
            "routing-optimizer",
            "report-generator",
        ]))
        .unwrap()
    }

    #[test]
    fn test_three_agents_yield_twenty_steps() {
        let flow = three_agent_flow();
        assert_eq!(flow.phases.len(), 5);
        assert_eq!(flow.total_steps, 2 + 3 * 5 + 3);
        assert_eq!(flow.overall_progress, 0);
        assert_eq!(flow.current_phase_index, Some(0));
        assert_eq!(flow.current_step_index, Some(0));
        assert_eq!(
            flow.current_step().map(|s| s.id.as_str()),
            Some("initialization:load-configuration")
        );
    }

    #[test]
    fn test_duplicate_agent_rejected() {
        let err = OrchestrationFlow::new(&agents(&["fraud-detector", "fraud-detector"])).unwrap_err();
        assert_eq!(err, FlowError::DuplicateAgent("fraud-detector".into()));
    }

    #[test]
    fn test_agent_ids_cannot_alias_fixed_phases() {
        let catalog = AgentCatalog::builtin();
        let base = catalog.agent("fraud-detector").unwrap().clone();
        let named = |id: &str| AgentDefinition {
            id: id.to_string(),
            name: format!("{id} agent"),
            ..base.clone()
        };
        let flow = OrchestrationFlow::new(&[named(INITIALIZATION_PHASE_ID), named(COMPLETION_PHASE_ID)]).unwrap();

        assert_eq!(flow.total_steps, 2 + 2 * 5 + 3);
        assert_eq!(flow.phase(INITIALIZATION_PHASE_ID).unwrap().kind, PhaseKind::Initialization);
        assert_eq!(flow.phase(COMPLETION_PHASE_ID).unwrap().kind, PhaseKind::Completion);
        assert_eq!(
            flow.phase(&agent_phase_id(COMPLETION_PHASE_ID)).unwrap().kind,
            PhaseKind::Agent {
                agent_id: COMPLETION_PHASE_ID.into()
            }
        );

        let mut ids: Vec<&str> = flow
            .phases
            .iter()
            .flat_map(|p| p.steps.iter().map(|s| s.id.as_str()))
            .collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), flow.total_steps);
    }

    #[test]
    fn test_unknown_step() {
        let mut flow = three_agent_flow();
        let err = flow
            .advance_step("nope:prepare", StepStatus::Running, 0, &[])
            .unwrap_err();
        assert_eq!(err, FlowError::StepNotFound("nope:prepare".into()));
        assert_eq!(flow, three_agent_flow());
    }

    #[test]
    fn test_step_timestamps() {
        let mut flow = three_agent_flow();
        let id = step_id(&agent_phase_id("performance-analyzer"), "execute");
        let step = flow
            .advance_step(&id, StepStatus::Running, 10, &["started".into()])
            .unwrap();
        assert!(step.start_time.is_some());
        assert!(step.end_time.is_none());

        let step = flow
            .advance_step(&id, StepStatus::Completed, 100, &["done".into()])
            .unwrap();
        assert!(step.end_time.is_some());
        assert!(step.duration_ms.unwrap() >= 0);
        assert_eq!(step.logs, vec!["started", "done"]);
    }

    #[test]
    fn test_phase_status_derivation() {
        let mut flow = three_agent_flow();
        let phase_id = agent_phase_id("routing-optimizer");
        assert_eq!(flow.phase(&phase_id).unwrap().status, StepStatus::Pending);

        flow.advance_step(&step_id(&phase_id, "prepare"), StepStatus::Completed, 100, &[])
            .unwrap();
        let phase = flow.phase(&phase_id).unwrap();
        assert_eq!(phase.status, StepStatus::Running);
        assert_eq!(phase.progress, 20);

        flow.advance_step(&step_id(&phase_id, "load-prompts"), StepStatus::Error, 0, &[])
            .unwrap();
        assert_eq!(flow.phase(&phase_id).unwrap().status, StepStatus::Error);
        assert!(flow.has_errors());
    }

    #[test]
    fn test_current_position_is_earliest_unresolved() {
        let mut flow = three_agent_flow();
        // touch a later step first
        flow.advance_step(&step_id(&agent_phase_id("report-generator"), "prepare"), StepStatus::Running, 0, &[])
            .unwrap();
        assert_eq!(flow.current_phase_index, Some(0));
        assert_eq!(flow.current_step_index, Some(0));

        flow.advance_step("initialization:load-configuration", StepStatus::Completed, 100, &[])
            .unwrap();
        assert_eq!(flow.current_phase_index, Some(0));
        assert_eq!(flow.current_step_index, Some(1));
    }

    #[test]
    fn test_full_run_reaches_100_only_at_the_end() {
        let mut flow = three_agent_flow();
        let ids: Vec<String> = flow
            .phases
            .iter()
            .flat_map(|p| p.steps.iter().map(|s| s.id.clone()))
            .collect();
        assert_eq!(ids.len(), 20);

        for (i, id) in ids.iter().enumerate() {
            flow.advance_step(id, StepStatus::Completed, 100, &[]).unwrap();
            assert_eq!(flow.completed_steps, i + 1);
            assert_eq!(flow.overall_progress, percent(i + 1, 20));
            if i + 1 < ids.len() {
                assert!(flow.overall_progress < 100);
                assert!(!flow.is_complete());
            }
        }
        assert_eq!(flow.overall_progress, 100);
        assert!(flow.is_complete());
        assert_eq!(flow.current_phase_index, None);
        assert_eq!(flow.current_step_index, None);
    }

    #[test]
    fn test_percent_rounds() {
        assert_eq!(percent(1, 3), 33);
        assert_eq!(percent(2, 3), 67);
        assert_eq!(percent(0, 0), 0);
        assert_eq!(percent(19, 20), 95);
    }
}
