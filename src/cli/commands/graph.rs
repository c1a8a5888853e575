//! Graph document CLI commands.

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::cli::context::AppContext;
use crate::cli::output::{output, CommandOutput};
use crate::domain::models::{AgentCatalog, Graph, GraphDocument, Position};

/// Horizontal gap between generated nodes.
const NODE_SPACING: f64 = 240.0;

#[derive(Args, Debug)]
pub struct GraphArgs {
    #[command(subcommand)]
    pub command: GraphCommands,
}

#[derive(Subcommand, Debug)]
pub enum GraphCommands {
    /// Validate a graph document against the catalog
    Validate {
        /// Graph document (.json, .yaml or .yml)
        file: PathBuf,
    },
    /// Build a graph document from a workflow template
    FromTemplate {
        /// Template id
        template: String,
        /// Write the document here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Debug, serde::Serialize)]
pub struct GraphValidationOutput {
    pub file: PathBuf,
    pub node_count: usize,
    pub edge_count: usize,
    pub execution_order: Vec<String>,
    pub cycle: Option<Vec<String>>,
}

impl CommandOutput for GraphValidationOutput {
    fn to_human(&self) -> String {
        let mut lines = vec![
            format!("Graph {} is valid.", self.file.display()),
            format!("Nodes: {}  Edges: {}", self.node_count, self.edge_count),
        ];
        if self.execution_order.is_empty() {
            lines.push("No agents placed; nothing to run.".to_string());
        } else {
            lines.push(format!("Execution order: {}", self.execution_order.join(" → ")));
        }
        if let Some(cycle) = &self.cycle {
            lines.push(format!(
                "Warning: cycle {} detected; agents run in placement order.",
                cycle.join(" -> ")
            ));
        }
        lines.join("\n")
    }
}

#[derive(Debug, serde::Serialize)]
pub struct GraphDocumentOutput {
    pub written_to: Option<PathBuf>,
    pub document: GraphDocument,
}

impl CommandOutput for GraphDocumentOutput {
    fn to_human(&self) -> String {
        match &self.written_to {
            Some(path) => format!(
                "Wrote graph with {} node(s) and {} edge(s) to {}",
                self.document.nodes.len(),
                self.document.edges.len(),
                path.display()
            ),
            None => serde_json::to_string_pretty(&self.document).unwrap_or_default(),
        }
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(&self.document).unwrap_or_default()
    }
}

fn is_yaml(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml" | "yml")
    )
}

/// Read a graph document and rebuild it against the catalog.
pub async fn load_graph(path: &Path, catalog: Arc<AgentCatalog>) -> Result<Graph> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read graph document {}", path.display()))?;

    let document: GraphDocument = if is_yaml(path) {
        serde_yaml::from_str(&raw).with_context(|| format!("Invalid YAML graph document {}", path.display()))?
    } else {
        serde_json::from_str(&raw).with_context(|| format!("Invalid JSON graph document {}", path.display()))?
    };

    Graph::from_document(document, catalog)
        .with_context(|| format!("Graph document {} failed validation", path.display()))
}

/// Lay the template's agents out left to right and connect each pair of
/// neighbours on the first capability one produces and the other consumes.
pub fn graph_from_template(template_id: &str, catalog: Arc<AgentCatalog>) -> Result<Graph> {
    let template = catalog
        .template(template_id)
        .with_context(|| format!("Template not found: {template_id}"))?
        .clone();

    let mut graph = Graph::new(Arc::clone(&catalog));
    let mut placed = Vec::with_capacity(template.agent_ids.len());
    for (i, agent_id) in template.agent_ids.iter().enumerate() {
        #[allow(clippy::cast_precision_loss)]
        let x = i as f64 * NODE_SPACING;
        placed.push(graph.add_node(agent_id, Position::new(x, 0.0))?);
    }

    for pair in placed.windows(2) {
        let (source, target) = (&pair[0], &pair[1]);
        let (Some(producer), Some(consumer)) = (catalog.agent(&source.agent_ref), catalog.agent(&target.agent_ref)) else {
            continue;
        };
        if let Some(capability) = producer.outputs.iter().find(|c| consumer.has_input(c)) {
            graph.connect(&source.id, capability, &target.id, capability)?;
        }
    }
    Ok(graph)
}

pub async fn execute(args: GraphArgs, ctx: &AppContext, json_mode: bool) -> Result<()> {
    let (catalog, _) = ctx.catalog().await;

    match args.command {
        GraphCommands::Validate { file } => {
            let graph = load_graph(&file, catalog).await?;
            let out = GraphValidationOutput {
                node_count: graph.node_count(),
                edge_count: graph.edges().len(),
                execution_order: graph.agent_sequence(),
                cycle: graph.find_cycle(),
                file,
            };
            output(&out, json_mode);
        }
        GraphCommands::FromTemplate { template, output: path } => {
            let document = graph_from_template(&template, catalog)?.to_document();
            if let Some(path) = &path {
                let body = if is_yaml(path) {
                    serde_yaml::to_string(&document)?
                } else {
                    serde_json::to_string_pretty(&document)?
                };
                tokio::fs::write(path, body)
                    .await
                    .with_context(|| format!("Failed to write {}", path.display()))?;
            }
            output(
                &GraphDocumentOutput {
                    written_to: path,
                    document,
                },
                json_mode,
            );
        }
    }
    Ok(())
}
