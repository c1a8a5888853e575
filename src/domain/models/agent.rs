//! Agent catalog entries and workflow templates.
//!
//! Both are read-only once loaded: the engine never mutates a definition,
//! it only places instances of it into graphs and flows.

use serde::{Deserialize, Serialize};

/// Functional category an agent belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AgentCategory {
    Performance,
    Routing,
    Settlement,
    Financial,
    Security,
    Compliance,
    #[default]
    #[serde(other)]
    Other,
}

impl AgentCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Performance => "performance",
            Self::Routing => "routing",
            Self::Settlement => "settlement",
            Self::Financial => "financial",
            Self::Security => "security",
            Self::Compliance => "compliance",
            Self::Other => "other",
        }
    }
}

impl std::fmt::Display for AgentCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable catalog entry describing an agent's contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentDefinition {
    /// Stable identifier (e.g., "fraud-detector").
    pub id: String,
    /// Display name; streaming messages refer to agents by this name.
    pub name: String,
    #[serde(default)]
    pub category: AgentCategory,
    /// Capabilities this agent consumes, in declaration order.
    #[serde(default)]
    pub inputs: Vec<String>,
    /// Capabilities this agent produces, in declaration order.
    #[serde(default)]
    pub outputs: Vec<String>,
    /// Human label only; never used for scheduling.
    #[serde(default)]
    pub estimated_duration: String,
    #[serde(default)]
    pub description: String,
}

impl AgentDefinition {
    pub fn has_input(&self, port: &str) -> bool {
        self.inputs.iter().any(|p| p == port)
    }

    pub fn has_output(&self, port: &str) -> bool {
        self.outputs.iter().any(|p| p == port)
    }

    /// Whether a streaming message's `agentName` refers to this agent.
    ///
    /// Backends address agents by display name; ids are accepted too.
    pub fn matches_name(&self, name: &str) -> bool {
        self.name == name || self.id == name
    }
}

/// Named, reusable selection of agents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowTemplate {
    pub id: String,
    pub name: String,
    /// Agents in execution order.
    pub agent_ids: Vec<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub estimated_duration: String,
    /// How often the template is meant to run (e.g., "daily").
    #[serde(default)]
    pub frequency: String,
}

/// Lookup over the agents and templates available to the engine.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentCatalog {
    pub agents: Vec<AgentDefinition>,
    pub templates: Vec<WorkflowTemplate>,
}

impl AgentCatalog {
    pub fn new(agents: Vec<AgentDefinition>, templates: Vec<WorkflowTemplate>) -> Self {
        Self { agents, templates }
    }

    pub fn agent(&self, id: &str) -> Option<&AgentDefinition> {
        self.agents.iter().find(|a| a.id == id)
    }

    pub fn template(&self, id: &str) -> Option<&WorkflowTemplate> {
        self.templates.iter().find(|t| t.id == id)
    }

    /// Built-in catalog used whenever the backend catalog is unreachable.
    pub fn builtin() -> Self {
        let agents = vec![
            agent(
                "performance-analyzer",
                "Performance Analyzer",
                AgentCategory::Performance,
                &["transactions"],
                &["performance_metrics", "anomalies"],
                "2-3 min",
                "Computes approval rates, latency percentiles and volume trends",
            ),
            agent(
                "routing-optimizer",
                "Routing Optimizer",
                AgentCategory::Routing,
                &["transactions", "performance_metrics"],
                &["routing_recommendations"],
                "3-5 min",
                "Recommends acquirer routing changes from performance data",
            ),
            agent(
                "settlement-reconciler",
                "Settlement Reconciler",
                AgentCategory::Settlement,
                &["transactions", "settlement_files"],
                &["reconciliation_report", "discrepancies"],
                "4-6 min",
                "Matches settled funds against captured transactions",
            ),
            agent(
                "financial-forecaster",
                "Financial Forecaster",
                AgentCategory::Financial,
                &["performance_metrics", "reconciliation_report"],
                &["revenue_forecast"],
                "3-4 min",
                "Projects revenue and fee exposure for the coming period",
            ),
            agent(
                "fraud-detector",
                "Fraud Detector",
                AgentCategory::Security,
                &["transactions", "anomalies"],
                &["fraud_alerts"],
                "2-4 min",
                "Flags suspicious transaction clusters",
            ),
            agent(
                "compliance-auditor",
                "Compliance Auditor",
                AgentCategory::Compliance,
                &["transactions", "fraud_alerts"],
                &["compliance_findings"],
                "5-7 min",
                "Checks activity against scheme and regulatory rules",
            ),
            agent(
                "report-generator",
                "Report Generator",
                AgentCategory::Other,
                &[
                    "performance_metrics",
                    "routing_recommendations",
                    "reconciliation_report",
                    "revenue_forecast",
                    "fraud_alerts",
                    "compliance_findings",
                ],
                &["executive_report"],
                "1-2 min",
                "Assembles agent outputs into a single report",
            ),
        ];

        let templates = vec![
            template(
                "daily-performance-review",
                "Daily Performance Review",
                &["performance-analyzer", "routing-optimizer", "report-generator"],
                "Daily look at performance with routing suggestions",
                "6-10 min",
                "daily",
            ),
            template(
                "settlement-audit",
                "Settlement Audit",
                &["settlement-reconciler", "financial-forecaster", "report-generator"],
                "Reconcile settlements and project financial impact",
                "8-12 min",
                "weekly",
            ),
            template(
                "risk-sweep",
                "Risk & Compliance Sweep",
                &[
                    "performance-analyzer",
                    "fraud-detector",
                    "compliance-auditor",
                    "report-generator",
                ],
                "Detect anomalies, fraud and compliance gaps",
                "10-15 min",
                "daily",
            ),
        ];

        Self { agents, templates }
    }
}

fn agent(
    id: &str,
    name: &str,
    category: AgentCategory,
    inputs: &[&str],
    outputs: &[&str],
    estimated_duration: &str,
    description: &str,
) -> AgentDefinition {
    AgentDefinition {
        id: id.to_string(),
        name: name.to_string(),
        category,
        inputs: inputs.iter().map(ToString::to_string).collect(),
        outputs: outputs.iter().map(ToString::to_string).collect(),
        estimated_duration: estimated_duration.to_string(),
        description: description.to_string(),
    }
}

fn template(
    id: &str,
    name: &str,
    agent_ids: &[&str],
    description: &str,
    estimated_duration: &str,
    frequency: &str,
) -> WorkflowTemplate {
    WorkflowTemplate {
        id: id.to_string(),
        name: name.to_string(),
        agent_ids: agent_ids.iter().map(ToString::to_string).collect(),
        description: description.to_string(),
        estimated_duration: estimated_duration.to_string(),
        frequency: frequency.to_string(),
    }
}
