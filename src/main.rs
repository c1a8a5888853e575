//! Agentflow CLI entry point.

use clap::Parser;

use agentflow::cli::commands::{catalog, graph, history, init, run};
use agentflow::cli::{handle_error, AppContext, Cli, Commands};
use agentflow::infrastructure::config::ConfigLoader;
use agentflow::infrastructure::logging::{LogConfig, LogRetention, LoggerImpl};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => ConfigLoader::load_from_file(path),
        None => ConfigLoader::load(),
    };
    let config = match config {
        Ok(config) => config,
        Err(err) => handle_error(err, cli.json),
    };

    let _logger = match LoggerImpl::init(&LogConfig::from(&config.logging)) {
        Ok(logger) => Some(logger),
        Err(err) => {
            eprintln!("Warning: logging disabled: {err:#}");
            None
        }
    };

    if let Some(log_dir) = config.logging.log_dir.clone() {
        let retention = LogRetention::new(config.logging.retention_days);
        tokio::spawn(async move {
            if let Err(e) = retention.cleanup_old_logs(&log_dir).await {
                tracing::warn!(error = %e, "log cleanup failed");
            }
        });
    }

    let ctx = match AppContext::new(config) {
        Ok(ctx) => ctx,
        Err(err) => handle_error(err, cli.json),
    };

    let result = match cli.command {
        Commands::Init(args) => init::execute(args, cli.json).await,
        Commands::Catalog(args) => catalog::execute(args, &ctx, cli.json).await,
        Commands::Graph(args) => graph::execute(args, &ctx, cli.json).await,
        Commands::Run(args) => run::execute(args, &ctx, cli.json).await,
        Commands::History(args) => history::execute(args, &ctx, cli.json).await,
    };

    if let Err(err) = result {
        handle_error(err, cli.json);
    }
}
