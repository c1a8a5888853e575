use std::path::Path;

use anyhow::{Context, Result};
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Yaml};
use thiserror::Error;

use crate::domain::models::config::{Config, HistoryStorage};

/// Project directory holding config and the history database.
pub const PROJECT_DIR: &str = ".agentflow";

/// Prefix for environment overrides, e.g. `AGENTFLOW_LOGGING__LEVEL=debug`.
pub const ENV_PREFIX: &str = "AGENTFLOW_";

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("Invalid log format: {0}. Must be one of: json, pretty")]
    InvalidLogFormat(String),

    #[error("Database path cannot be empty")]
    EmptyDatabasePath,

    #[error("Invalid max_connections: {0}. Must be at least 1")]
    InvalidMaxConnections(u32),

    #[error("Invalid {field}: {value}. Must be positive")]
    InvalidTimeout { field: &'static str, value: u64 },

    #[error("Invalid ws_url_template: {0}. Must be a ws:// or wss:// URL containing {{workflow_id}}")]
    InvalidWsTemplate(String),

    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),
}

/// Configuration loader with hierarchical merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration for the current directory.
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. .agentflow/config.yaml (project config)
    /// 3. .agentflow/local.yaml (project local overrides, optional)
    /// 4. Environment variables (AGENTFLOW_* prefix, highest priority)
    pub fn load() -> Result<Config> {
        Self::load_in(".")
    }

    /// Same as [`ConfigLoader::load`] with the project directory under `root`.
    pub fn load_in(root: impl AsRef<Path>) -> Result<Config> {
        let project = root.as_ref().join(PROJECT_DIR);
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(project.join("config.yaml")))
            .merge(Yaml::file(project.join("local.yaml")))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .context("Failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific file; environment variables still
    /// override it.
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path.as_ref()))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .context(format!(
                "Failed to load config from {}",
                path.as_ref().display()
            ))?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Validate configuration after loading
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        if config.history.storage == HistoryStorage::Sqlite {
            if config.history.database_path.trim().is_empty() {
                return Err(ConfigError::EmptyDatabasePath);
            }
            if config.history.max_connections == 0 {
                return Err(ConfigError::InvalidMaxConnections(
                    config.history.max_connections,
                ));
            }
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }

        let valid_log_formats = ["json", "pretty"];
        if !valid_log_formats.contains(&config.logging.format.as_str()) {
            return Err(ConfigError::InvalidLogFormat(config.logging.format.clone()));
        }

        if config.backend.timeout_ms == 0 {
            return Err(ConfigError::InvalidTimeout {
                field: "backend.timeout_ms",
                value: 0,
            });
        }
        if config.channel.connect_timeout_ms == 0 {
            return Err(ConfigError::InvalidTimeout {
                field: "channel.connect_timeout_ms",
                value: 0,
            });
        }

        let template = &config.channel.ws_url_template;
        let ws_scheme = template.starts_with("ws://") || template.starts_with("wss://");
        if !ws_scheme || !template.contains("{workflow_id}") {
            return Err(ConfigError::InvalidWsTemplate(template.clone()));
        }

        if let Some(base_url) = &config.backend.base_url {
            if reqwest::Url::parse(base_url).is_err() {
                return Err(ConfigError::ValidationFailed(format!(
                    "backend.base_url is not a valid URL: {base_url}"
                )));
            }
        }

        if config.channel.simulation.progress_updates == 0 {
            return Err(ConfigError::ValidationFailed(
                "channel.simulation.progress_updates must be at least 1".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::{NamedTempFile, TempDir};

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.history.database_path, ".agentflow/history.db");
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.channel.ws_url_template, "ws://localhost:8000/ws/{workflow_id}");
        ConfigLoader::validate(&config).expect("Default config should be valid");
    }

    #[test]
    fn test_yaml_parsing() {
        let yaml = r"
backend:
  base_url: http://localhost:8000/api
  timeout_ms: 2500
channel:
  connect_timeout_ms: 500
  simulate_on_submission_failure: true
history:
  database_path: /custom/history.db
  max_connections: 2
logging:
  level: debug
  format: json
  retention_days: 7
";

        let config: Config = serde_yaml::from_str(yaml).expect("YAML should parse");

        assert_eq!(config.backend.base_url.as_deref(), Some("http://localhost:8000/api"));
        assert_eq!(config.backend.timeout_ms, 2500);
        assert_eq!(config.channel.connect_timeout_ms, 500);
        assert!(config.channel.simulate_on_submission_failure);
        assert_eq!(config.history.database_path, "/custom/history.db");
        assert_eq!(config.history.max_connections, 2);
        assert_eq!(config.logging.format, "json");
        assert_eq!(config.logging.retention_days, 7);

        ConfigLoader::validate(&config).expect("Parsed config should be valid");
    }

    #[test]
    fn test_validate_invalid_log_level() {
        let mut config = Config::default();
        config.logging.level = "invalid".to_string();

        match ConfigLoader::validate(&config).unwrap_err() {
            ConfigError::InvalidLogLevel(level) => assert_eq!(level, "invalid"),
            other => panic!("Expected InvalidLogLevel error, got {other:?}"),
        }
    }

    #[test]
    fn test_validate_invalid_log_format() {
        let mut config = Config::default();
        config.logging.format = "xml".to_string();

        assert!(matches!(
            ConfigLoader::validate(&config).unwrap_err(),
            ConfigError::InvalidLogFormat(f) if f == "xml"
        ));
    }

    #[test]
    fn test_validate_empty_database_path() {
        let mut config = Config::default();
        config.history.database_path = String::new();
        assert!(matches!(
            ConfigLoader::validate(&config).unwrap_err(),
            ConfigError::EmptyDatabasePath
        ));

        // irrelevant for in-memory history
        config.history.storage = HistoryStorage::Memory;
        assert!(ConfigLoader::validate(&config).is_ok());
    }

    #[test]
    fn test_validate_zero_max_connections() {
        let mut config = Config::default();
        config.history.max_connections = 0;
        assert!(matches!(
            ConfigLoader::validate(&config).unwrap_err(),
            ConfigError::InvalidMaxConnections(0)
        ));
    }

    #[test]
    fn test_validate_zero_timeouts() {
        let mut config = Config::default();
        config.channel.connect_timeout_ms = 0;
        assert!(matches!(
            ConfigLoader::validate(&config).unwrap_err(),
            ConfigError::InvalidTimeout { field: "channel.connect_timeout_ms", .. }
        ));
    }

    #[test]
    fn test_validate_ws_template() {
        let mut config = Config::default();
        config.channel.ws_url_template = "ws://localhost:8000/ws".to_string();
        assert!(matches!(
            ConfigLoader::validate(&config).unwrap_err(),
            ConfigError::InvalidWsTemplate(_)
        ));

        config.channel.ws_url_template = "http://localhost/{workflow_id}".to_string();
        assert!(matches!(
            ConfigLoader::validate(&config).unwrap_err(),
            ConfigError::InvalidWsTemplate(_)
        ));
    }

    #[test]
    fn test_validate_base_url() {
        let mut config = Config::default();
        config.backend.base_url = Some("not a url".to_string());
        assert!(matches!(
            ConfigLoader::validate(&config).unwrap_err(),
            ConfigError::ValidationFailed(_)
        ));
    }

    #[test]
    fn test_env_override() {
        let dir = TempDir::new().unwrap();
        temp_env::with_vars(
            [
                ("AGENTFLOW_LOGGING__LEVEL", Some("debug")),
                ("AGENTFLOW_CHANNEL__SIMULATION__TICK_MS", Some("5")),
            ],
            || {
                let config = ConfigLoader::load_in(dir.path()).unwrap();
                assert_eq!(config.logging.level, "debug");
                assert_eq!(config.channel.simulation.tick_ms, 5);
            },
        );
    }

    #[test]
    fn test_project_files_merge() {
        let dir = TempDir::new().unwrap();
        let project = dir.path().join(PROJECT_DIR);
        std::fs::create_dir_all(&project).unwrap();
        std::fs::write(
            project.join("config.yaml"),
            "logging:\n  level: warn\n  format: json\nhistory:\n  storage: memory\n",
        )
        .unwrap();
        std::fs::write(project.join("local.yaml"), "logging:\n  level: trace\n").unwrap();

        temp_env::with_var_unset("AGENTFLOW_LOGGING__LEVEL", || {
            let config = ConfigLoader::load_in(dir.path()).unwrap();
            assert_eq!(config.logging.level, "trace", "local.yaml should win");
            assert_eq!(config.logging.format, "json");
            assert_eq!(config.history.storage, HistoryStorage::Memory);
        });
    }

    #[test]
    fn test_invalid_file_is_rejected() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "logging:\n  format: xml").unwrap();
        file.flush().unwrap();

        assert!(ConfigLoader::load_from_file(file.path()).is_err());
    }

    #[test]
    fn test_hierarchical_merging() {
        let mut base_file = NamedTempFile::new().unwrap();
        writeln!(
            base_file,
            "channel:\n  connect_timeout_ms: 1000\nlogging:\n  level: info\n  format: json"
        )
        .unwrap();
        base_file.flush().unwrap();

        let mut override_file = NamedTempFile::new().unwrap();
        writeln!(override_file, "channel:\n  connect_timeout_ms: 200\nlogging:\n  level: debug").unwrap();
        override_file.flush().unwrap();

        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(base_file.path()))
            .merge(Yaml::file(override_file.path()))
            .extract()
            .unwrap();

        assert_eq!(config.channel.connect_timeout_ms, 200, "Override should win");
        assert_eq!(config.logging.level, "debug", "Override should win for nested fields");
        assert_eq!(config.logging.format, "json", "Base value should persist when not overridden");
    }
}
