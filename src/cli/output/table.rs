//! Table output formatting for CLI commands
//!
//! Catalog, history and live-run tables rendered with comfy-table.
//! Colors are dropped when `NO_COLOR` is set or the terminal is dumb.

use comfy_table::{presets, Attribute, Cell, Color, ContentArrangement, Table};
use std::env;

use super::{format_duration_ms, truncate};
use crate::domain::models::{
    AgentDefinition, AgentDetail, AgentRuntimeState, AgentStatus, ExecutionStatus,
    OrchestrationFlow, StepStatus, WorkflowExecution, WorkflowTemplate,
};

/// Table formatter for CLI output
pub struct TableFormatter {
    use_colors: bool,
    max_width: Option<u16>,
}

impl TableFormatter {
    pub fn new() -> Self {
        Self {
            use_colors: supports_color(),
            max_width: None,
        }
    }

    pub fn with_config(use_colors: bool, max_width: Option<u16>) -> Self {
        Self {
            use_colors,
            max_width,
        }
    }

    pub fn format_agents(&self, agents: &[AgentDefinition]) -> String {
        let mut table = self.create_base_table();
        table.set_header(header(&["ID", "Name", "Category", "Inputs", "Outputs", "Est. Duration"]));

        for agent in agents {
            table.add_row(vec![
                Cell::new(&agent.id),
                Cell::new(&agent.name),
                Cell::new(agent.category),
                Cell::new(agent.inputs.join(", ")),
                Cell::new(agent.outputs.join(", ")),
                Cell::new(&agent.estimated_duration),
            ]);
        }
        table.to_string()
    }

    pub fn format_templates(&self, templates: &[WorkflowTemplate]) -> String {
        let mut table = self.create_base_table();
        table.set_header(header(&["ID", "Name", "Agents", "Est. Duration", "Frequency"]));

        for template in templates {
            table.add_row(vec![
                Cell::new(&template.id),
                Cell::new(&template.name),
                Cell::new(template.agent_ids.join(" → ")),
                Cell::new(&template.estimated_duration),
                Cell::new(&template.frequency),
            ]);
        }
        table.to_string()
    }

    pub fn format_executions(&self, executions: &[WorkflowExecution]) -> String {
        let mut table = self.create_base_table();
        table.set_header(header(&["Workflow", "Name", "Status", "Date", "Duration", "Agents", "Success"]));

        for execution in executions {
            let duration = execution
                .total_duration_ms()
                .map_or_else(|| "-".to_string(), format_duration_ms);
            table.add_row(vec![
                Cell::new(truncate(&execution.workflow_id, 14)),
                Cell::new(truncate(&execution.name, 32)),
                self.execution_status_cell(execution.status),
                Cell::new(execution.execution_date),
                Cell::new(duration),
                Cell::new(execution.agent_details.len()),
                Cell::new(format!("{}%", execution.performance_metrics.success_rate)),
            ]);
        }
        table.to_string()
    }

    pub fn format_agent_details(&self, details: &[AgentDetail]) -> String {
        let mut table = self.create_base_table();
        table.set_header(header(&["Agent", "Status", "Duration", "Steps", "Insights", "Score", "Error"]));

        for detail in details {
            table.add_row(vec![
                Cell::new(&detail.agent_name),
                self.agent_status_cell(detail.status),
                Cell::new(detail.duration_ms.map_or_else(|| "-".to_string(), format_duration_ms)),
                Cell::new(detail.steps_completed),
                Cell::new(detail.insight_count),
                Cell::new(detail.performance_score),
                Cell::new(detail.error.as_deref().map_or_else(|| "-".to_string(), |e| truncate(e, 40))),
            ]);
        }
        table.to_string()
    }

    /// One row per step, phases in order.
    pub fn format_flow(&self, flow: &OrchestrationFlow) -> String {
        let mut table = self.create_base_table();
        table.set_header(header(&["Phase", "Step", "Status", "Progress"]));

        for phase in &flow.phases {
            for step in &phase.steps {
                table.add_row(vec![
                    Cell::new(&phase.name),
                    Cell::new(&step.name),
                    self.step_status_cell(step.status),
                    Cell::new(format!("{}%", step.progress)),
                ]);
            }
        }
        table.to_string()
    }

    pub fn format_agent_states(&self, agents: &[AgentRuntimeState]) -> String {
        let mut table = self.create_base_table();
        table.set_header(header(&["Agent", "Status", "Progress", "Current Step"]));

        for agent in agents {
            table.add_row(vec![
                Cell::new(&agent.agent_name),
                self.agent_status_cell(agent.status),
                Cell::new(format!("{}%", agent.progress)),
                Cell::new(agent.current_step_label.as_deref().unwrap_or("-")),
            ]);
        }
        table.to_string()
    }

    fn execution_status_cell(&self, status: ExecutionStatus) -> Cell {
        let color = match status {
            ExecutionStatus::Completed => Color::Green,
            ExecutionStatus::Failed => Color::Red,
            ExecutionStatus::Running => Color::Cyan,
            ExecutionStatus::Pending => Color::Yellow,
        };
        self.colored(status.to_string(), color)
    }

    fn agent_status_cell(&self, status: AgentStatus) -> Cell {
        let color = match status {
            AgentStatus::Completed => Color::Green,
            AgentStatus::Error => Color::Red,
            AgentStatus::Idle => Color::DarkGrey,
            _ => Color::Cyan,
        };
        self.colored(status.to_string(), color)
    }

    fn step_status_cell(&self, status: StepStatus) -> Cell {
        let color = match status {
            StepStatus::Completed => Color::Green,
            StepStatus::Error => Color::Red,
            StepStatus::Running => Color::Cyan,
            StepStatus::Pending => Color::DarkGrey,
        };
        self.colored(status.to_string(), color)
    }

    fn colored(&self, text: String, color: Color) -> Cell {
        if self.use_colors {
            Cell::new(text).fg(color)
        } else {
            Cell::new(text)
        }
    }

    fn create_base_table(&self) -> Table {
        let mut table = Table::new();
        table
            .load_preset(presets::UTF8_FULL)
            .set_content_arrangement(ContentArrangement::Dynamic);

        if let Some(width) = self.max_width {
            table.set_width(width);
        }
        table
    }
}

impl Default for TableFormatter {
    fn default() -> Self {
        Self::new()
    }
}

fn header(titles: &[&str]) -> Vec<Cell> {
    titles
        .iter()
        .map(|title| Cell::new(title).add_attribute(Attribute::Bold))
        .collect()
}

fn supports_color() -> bool {
    if env::var("NO_COLOR").is_ok() {
        return false;
    }
    !matches!(env::var("TERM").as_deref(), Ok("dumb"))
}
