//! Progress rendering for running executions using indicatif.
//!
//! A run is drawn as one bar over the flow's steps plus one spinner line per
//! agent, all fed from execution snapshots.

use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::time::Duration;

use crate::domain::models::{AgentRuntimeState, AgentStatus};
use crate::services::ExecutionSnapshot;

const PROGRESS_TEMPLATE: &str = "[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} steps {msg}";
const AGENT_TEMPLATE: &str = "  {spinner:.green} {prefix:<24} {msg}";

const PROGRESS_CHARS: &str = "█▓▒░ ";
const SPINNER_CHARS: &str = "⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏ ";

/// Create a progress bar over `total` steps.
pub fn create_progress_bar(total: u64) -> ProgressBar {
    let pb = ProgressBar::new(total);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(PROGRESS_TEMPLATE)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars(PROGRESS_CHARS),
    );
    pb
}

fn create_agent_line(name: &str) -> ProgressBar {
    let line = ProgressBar::new_spinner();
    line.set_style(
        ProgressStyle::default_spinner()
            .template(AGENT_TEMPLATE)
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_chars(SPINNER_CHARS),
    );
    line.set_prefix(name.to_string());
    line
}

/// Extension trait for ProgressBar to add common utility methods
pub trait ProgressBarExt {
    /// Finish with a success message (green checkmark)
    fn finish_success(&self, message: impl Into<String>);

    /// Finish with an error message (red X)
    fn finish_error(&self, message: impl Into<String>);

    /// Finish with a warning message (yellow !)
    fn finish_warning(&self, message: impl Into<String>);
}

impl ProgressBarExt for ProgressBar {
    fn finish_success(&self, message: impl Into<String>) {
        self.finish_with_message(format!("✓ {}", message.into()));
    }

    fn finish_error(&self, message: impl Into<String>) {
        self.finish_with_message(format!("✗ {}", message.into()));
    }

    fn finish_warning(&self, message: impl Into<String>) {
        self.finish_with_message(format!("! {}", message.into()));
    }
}

/// Live view of one execution.
pub struct RunProgress {
    _multi: MultiProgress,
    overall: ProgressBar,
    agents: Vec<ProgressBar>,
}

impl RunProgress {
    pub fn new(snapshot: &ExecutionSnapshot) -> Self {
        Self::with_target(snapshot, ProgressDrawTarget::stderr())
    }

    /// Nothing is drawn; used in JSON mode and tests.
    pub fn hidden(snapshot: &ExecutionSnapshot) -> Self {
        Self::with_target(snapshot, ProgressDrawTarget::hidden())
    }

    fn with_target(snapshot: &ExecutionSnapshot, target: ProgressDrawTarget) -> Self {
        let multi = MultiProgress::with_draw_target(target);
        let overall = multi.add(create_progress_bar(snapshot.flow.total_steps as u64));
        let agents = snapshot
            .agents
            .iter()
            .map(|agent| {
                let line = multi.add(create_agent_line(&agent.agent_name));
                line.enable_steady_tick(Duration::from_millis(100));
                line
            })
            .collect();

        let progress = Self {
            _multi: multi,
            overall,
            agents,
        };
        progress.update(snapshot);
        progress
    }

    pub fn update(&self, snapshot: &ExecutionSnapshot) {
        self.overall.set_position(snapshot.flow.completed_steps as u64);
        self.overall.set_message(format!("{}%", snapshot.flow.overall_progress));

        for (line, agent) in self.agents.iter().zip(&snapshot.agents) {
            let message = agent_message(agent);
            match agent.status {
                AgentStatus::Completed if !line.is_finished() => line.finish_success(message),
                AgentStatus::Error if !line.is_finished() => line.finish_error(message),
                _ if !line.is_finished() => line.set_message(message),
                _ => {}
            }
        }
    }

    /// Freeze every line with the final state.
    pub fn finish(&self, snapshot: &ExecutionSnapshot, message: impl Into<String>) {
        self.update(snapshot);
        for line in &self.agents {
            if !line.is_finished() {
                line.finish_warning(line.message());
            }
        }
        self.overall.finish_with_message(message.into());
    }

    pub fn position(&self) -> u64 {
        self.overall.position()
    }
}

fn agent_message(agent: &AgentRuntimeState) -> String {
    match (&agent.error, &agent.current_step_label) {
        (Some(error), _) => format!("{} {}", agent.status, error),
        (None, Some(label)) => format!("{} {:>3}% {}", agent.status, agent.progress, label),
        (None, None) => format!("{} {:>3}%", agent.status, agent.progress),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{AgentCatalog, ExecutionMode, StreamMessage};
    use crate::services::{ExecutionSession, SessionSpec};
    use chrono::NaiveDate;

    #[test]
    fn test_progress_follows_snapshots() {
        let catalog = AgentCatalog::builtin();
        let agents: Vec<_> = catalog.agents.iter().take(1).cloned().collect();
        let name = agents[0].name.clone();
        let mut session = ExecutionSession::new(SessionSpec {
            workflow_id: "wf-1".into(),
            name: "test".into(),
            template_id: None,
            execution_date: NaiveDate::from_ymd_opt(2024, 12, 15).unwrap(),
            agents,
            mode: ExecutionMode::Simulated,
        })
        .unwrap();

        let progress = RunProgress::hidden(&session.snapshot());
        assert_eq!(progress.position(), 0);

        session.dispatch(&StreamMessage::workflow_started("wf-1")).unwrap();
        session.dispatch(&StreamMessage::agent_started("wf-1", &name)).unwrap();
        progress.update(&session.snapshot());
        assert_eq!(progress.position(), session.flow().completed_steps as u64);
        assert!(progress.position() > 0);
    }
}
