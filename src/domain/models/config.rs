use serde::{Deserialize, Serialize};

/// Main configuration structure for agentflow
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// Backend HTTP API
    #[serde(default)]
    pub backend: BackendConfig,

    /// Streaming update channel
    #[serde(default)]
    pub channel: ChannelConfig,

    /// Execution history storage
    #[serde(default)]
    pub history: HistoryConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Backend API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct BackendConfig {
    /// Base URL of the backend API; `None` runs fully offline
    #[serde(default)]
    pub base_url: Option<String>,

    /// Request timeout in milliseconds
    #[serde(default = "default_request_timeout_ms")]
    pub timeout_ms: u64,
}

const fn default_request_timeout_ms() -> u64 {
    10_000
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout_ms: default_request_timeout_ms(),
        }
    }
}

/// Streaming update channel configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ChannelConfig {
    /// WebSocket URL with a `{workflow_id}` placeholder
    #[serde(default = "default_ws_url_template")]
    pub ws_url_template: String,

    /// Connection timeout in milliseconds before falling back to simulation
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    /// Mint a local workflow id and simulate when submission fails
    #[serde(default)]
    pub simulate_on_submission_failure: bool,

    #[serde(default)]
    pub simulation: SimulationConfig,
}

fn default_ws_url_template() -> String {
    "ws://localhost:8000/ws/{workflow_id}".to_string()
}

const fn default_connect_timeout_ms() -> u64 {
    3_000
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            ws_url_template: default_ws_url_template(),
            connect_timeout_ms: default_connect_timeout_ms(),
            simulate_on_submission_failure: false,
            simulation: SimulationConfig::default(),
        }
    }
}

/// Local simulation of a run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SimulationConfig {
    /// Delay between simulated messages in milliseconds
    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,

    /// Number of `agent_progress` messages per agent
    #[serde(default = "default_progress_updates")]
    pub progress_updates: u8,

    /// Agent ids or names the simulation reports as failed
    #[serde(default)]
    pub fail_agents: Vec<String>,
}

const fn default_tick_ms() -> u64 {
    400
}

const fn default_progress_updates() -> u8 {
    4
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            tick_ms: default_tick_ms(),
            progress_updates: default_progress_updates(),
            fail_agents: vec![],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum HistoryStorage {
    #[default]
    Sqlite,
    Memory,
}

/// Execution history configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct HistoryConfig {
    #[serde(default)]
    pub storage: HistoryStorage,

    /// Path to `SQLite` database file
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Maximum number of database connections in pool
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Import the backend's execution list on startup
    #[serde(default)]
    pub seed_from_backend: bool,
}

fn default_database_path() -> String {
    ".agentflow/history.db".to_string()
}

const fn default_max_connections() -> u32 {
    5
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            storage: HistoryStorage::default(),
            database_path: default_database_path(),
            max_connections: default_max_connections(),
            seed_from_backend: false,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: json or pretty
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Directory for rolling log files; stderr only when unset
    #[serde(default)]
    pub log_dir: Option<String>,

    /// Number of days to retain logs
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

const fn default_retention_days() -> u32 {
    14
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            log_dir: None,
            retention_days: default_retention_days(),
        }
    }
}
