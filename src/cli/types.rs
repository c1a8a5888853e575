//! CLI type definitions
//!
//! Top-level clap parser; each subcommand's arguments live next to its
//! implementation in [`crate::cli::commands`].

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use super::commands::catalog::CatalogArgs;
use super::commands::graph::GraphArgs;
use super::commands::history::HistoryArgs;
use super::commands::init::InitArgs;
use super::commands::run::RunArgs;

#[derive(Parser, Debug)]
#[command(name = "agentflow")]
#[command(about = "Agentflow - agent pipeline orchestration", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output in JSON format
    #[arg(short, long, global = true)]
    pub json: bool,

    /// Config file to use instead of .agentflow/config.yaml
    #[arg(short, long, global = true, env = "AGENTFLOW_CONFIG")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create .agentflow/config.yaml and the history database
    Init(InitArgs),

    /// Browse agent definitions and workflow templates
    Catalog(CatalogArgs),

    /// Validate or generate graph documents
    Graph(GraphArgs),

    /// Run a template or graph and follow its progress
    Run(RunArgs),

    /// Query execution history
    History(HistoryArgs),
}
