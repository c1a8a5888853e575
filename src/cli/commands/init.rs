//! Implementation of the `agentflow init` command.

use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;
use tokio::fs;

use crate::adapters::sqlite::{database_url, initialize_database};
use crate::cli::output::{output, CommandOutput};
use crate::domain::models::{Config, HistoryStorage};
use crate::infrastructure::config::loader::PROJECT_DIR;

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Overwrite an existing config file
    #[arg(long, short)]
    pub force: bool,

    /// Target directory (defaults to current directory)
    #[arg(default_value = ".")]
    pub path: PathBuf,
}

#[derive(Debug, serde::Serialize)]
pub struct InitOutput {
    pub success: bool,
    pub message: String,
    pub config_path: PathBuf,
    pub database_path: Option<PathBuf>,
}

impl CommandOutput for InitOutput {
    fn to_human(&self) -> String {
        let mut lines = vec![self.message.clone()];
        if self.success {
            lines.push(format!("Config written to {}", self.config_path.display()));
        }
        if let Some(db) = &self.database_path {
            lines.push(format!("History database initialized at {}", db.display()));
        }
        lines.join("\n")
    }
}

pub async fn execute(args: InitArgs, json_mode: bool) -> Result<()> {
    let project_dir = args.path.join(PROJECT_DIR);
    let config_path = project_dir.join("config.yaml");

    if config_path.exists() && !args.force {
        let out = InitOutput {
            success: false,
            message: "Project already initialized. Use --force to overwrite the config.".to_string(),
            config_path,
            database_path: None,
        };
        output(&out, json_mode);
        return Ok(());
    }

    fs::create_dir_all(&project_dir)
        .await
        .with_context(|| format!("Failed to create {}", project_dir.display()))?;

    let config = Config::default();
    let yaml = serde_yaml::to_string(&config).context("Failed to render default config")?;
    fs::write(&config_path, yaml)
        .await
        .with_context(|| format!("Failed to write {}", config_path.display()))?;

    let database_path = if config.history.storage == HistoryStorage::Sqlite {
        let db_path = args.path.join(&config.history.database_path);
        initialize_database(&database_url(&db_path.to_string_lossy()), None)
            .await
            .context("Failed to initialize history database")?;
        Some(db_path)
    } else {
        None
    };

    let out = InitOutput {
        success: true,
        message: if args.force {
            "Project reinitialized.".to_string()
        } else {
            "Project initialized.".to_string()
        },
        config_path,
        database_path,
    };
    output(&out, json_mode);
    Ok(())
}
