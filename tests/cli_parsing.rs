use agentflow::cli::commands::catalog::CatalogCommands;
use agentflow::cli::commands::graph::GraphCommands;
use agentflow::cli::commands::history::HistoryCommands;
use agentflow::cli::{Cli, Commands};
use clap::Parser;
use std::path::PathBuf;

#[test]
fn test_parse_run_with_params() {
    let cli = Cli::try_parse_from([
        "agentflow",
        "run",
        "--graph",
        "pipeline.yaml",
        "-p",
        "region=EU",
        "--param",
        "threshold=0.8",
    ])
    .unwrap();

    match cli.command {
        Commands::Run(args) => {
            assert_eq!(args.graph, Some(PathBuf::from("pipeline.yaml")));
            assert!(args.template.is_none());
            assert!(!args.simulate);
            assert_eq!(
                args.params,
                vec![
                    ("region".to_string(), "EU".to_string()),
                    ("threshold".to_string(), "0.8".to_string()),
                ]
            );
        }
        _ => panic!("Wrong top-level command"),
    }
}

#[test]
fn test_parse_run_rejects_malformed_param() {
    let result = Cli::try_parse_from(["agentflow", "run", "-t", "risk-sweep", "-p", "no-equals-sign"]);
    assert!(result.is_err());
}

#[test]
fn test_parse_run_rejects_bad_date() {
    let result = Cli::try_parse_from(["agentflow", "run", "-t", "risk-sweep", "--date", "15/12/2024"]);
    assert!(result.is_err());
}

#[test]
fn test_parse_catalog_agents_with_category() {
    let cli = Cli::try_parse_from(["agentflow", "catalog", "agents", "--category", "security"]).unwrap();

    match cli.command {
        Commands::Catalog(args) => match args.command {
            CatalogCommands::Agents { category } => assert_eq!(category.as_deref(), Some("security")),
            CatalogCommands::Templates => panic!("Wrong catalog command"),
        },
        _ => panic!("Wrong top-level command"),
    }
}

#[test]
fn test_parse_graph_from_template() {
    let cli = Cli::try_parse_from(["agentflow", "graph", "from-template", "risk-sweep", "-o", "risk.json"]).unwrap();

    match cli.command {
        Commands::Graph(args) => match args.command {
            GraphCommands::FromTemplate { template, output } => {
                assert_eq!(template, "risk-sweep");
                assert_eq!(output, Some(PathBuf::from("risk.json")));
            }
            GraphCommands::Validate { .. } => panic!("Wrong graph command"),
        },
        _ => panic!("Wrong top-level command"),
    }
}

#[test]
fn test_parse_history_show_with_global_flags() {
    let cli = Cli::try_parse_from(["agentflow", "history", "show", "wf-123", "--json", "-c", "custom.yaml"]).unwrap();

    assert!(cli.json);
    assert_eq!(cli.config, Some(PathBuf::from("custom.yaml")));
    match cli.command {
        Commands::History(args) => match args.command {
            HistoryCommands::Show { workflow_id } => assert_eq!(workflow_id, "wf-123"),
            HistoryCommands::List { .. } => panic!("Wrong history command"),
        },
        _ => panic!("Wrong top-level command"),
    }
}

#[test]
fn test_parse_history_list_defaults() {
    let cli = Cli::try_parse_from(["agentflow", "history", "list"]).unwrap();

    match cli.command {
        Commands::History(args) => match args.command {
            HistoryCommands::List {
                from,
                status,
                sort,
                asc,
                limit,
                ..
            } => {
                assert!(from.is_none());
                assert!(status.is_none());
                assert_eq!(sort, "created_at");
                assert!(!asc);
                assert!(limit.is_none());
            }
            HistoryCommands::Show { .. } => panic!("Wrong history command"),
        },
        _ => panic!("Wrong top-level command"),
    }
}
