//! Catalog CLI commands.

use anyhow::Result;
use clap::{Args, Subcommand};

use crate::cli::context::AppContext;
use crate::cli::output::{output, CommandOutput, TableFormatter};
use crate::domain::models::{AgentDefinition, WorkflowTemplate};
use crate::services::CatalogOrigin;

#[derive(Args, Debug)]
pub struct CatalogArgs {
    #[command(subcommand)]
    pub command: CatalogCommands,
}

#[derive(Subcommand, Debug)]
pub enum CatalogCommands {
    /// List agent definitions
    Agents {
        /// Only agents of this category (performance, routing, ...)
        #[arg(short, long)]
        category: Option<String>,
    },
    /// List workflow templates
    Templates,
}

#[derive(Debug, serde::Serialize)]
pub struct AgentListOutput {
    pub origin: CatalogOrigin,
    pub agents: Vec<AgentDefinition>,
}

impl CommandOutput for AgentListOutput {
    fn to_human(&self) -> String {
        if self.agents.is_empty() {
            return "No agents found.".to_string();
        }
        format!(
            "{} agent(s) from the {} catalog:\n{}",
            self.agents.len(),
            self.origin,
            TableFormatter::new().format_agents(&self.agents)
        )
    }
}

#[derive(Debug, serde::Serialize)]
pub struct TemplateListOutput {
    pub origin: CatalogOrigin,
    pub templates: Vec<WorkflowTemplate>,
}

impl CommandOutput for TemplateListOutput {
    fn to_human(&self) -> String {
        if self.templates.is_empty() {
            return "No templates found.".to_string();
        }
        format!(
            "{} template(s) from the {} catalog:\n{}",
            self.templates.len(),
            self.origin,
            TableFormatter::new().format_templates(&self.templates)
        )
    }
}

pub async fn execute(args: CatalogArgs, ctx: &AppContext, json_mode: bool) -> Result<()> {
    let (catalog, origin) = ctx.catalog().await;

    match args.command {
        CatalogCommands::Agents { category } => {
            let agents = catalog
                .agents
                .iter()
                .filter(|agent| {
                    category
                        .as_deref()
                        .is_none_or(|c| agent.category.as_str().eq_ignore_ascii_case(c))
                })
                .cloned()
                .collect();
            output(&AgentListOutput { origin, agents }, json_mode);
        }
        CatalogCommands::Templates => {
            let out = TemplateListOutput {
                origin,
                templates: catalog.templates.clone(),
            };
            output(&out, json_mode);
        }
    }
    Ok(())
}
