//! Agentflow - agent pipeline orchestration engine
//!
//! Assembles agents into pipelines, submits them for execution, follows
//! their progress over a streaming update channel and keeps a queryable
//! history of finished runs.
//!
//! # Architecture
//!
//! - **Domain Layer** (`domain`): graph, lifecycle, flow and history models
//!   plus the port traits adapters implement
//! - **Adapter Layer** (`adapters`): HTTP backend client, WebSocket and
//!   simulated update sources, SQLite history
//! - **Service Layer** (`services`): execution sessions, orchestrator,
//!   event bus, history store and catalog loading
//! - **Infrastructure Layer** (`infrastructure`): configuration and logging
//! - **CLI Layer** (`cli`): command-line interface
//!
//! # Example
//!
//! ```ignore
//! use agentflow::services::{RunRequest, RunSelection};
//!
//! let handle = orchestrator
//!     .submit(RunRequest {
//!         selection: RunSelection::Template("daily-performance-review".into()),
//!         execution_date: chrono::Local::now().date_naive(),
//!         parameters: serde_json::Value::Null,
//!         simulate: true,
//!     })
//!     .await?;
//! let outcome = handle.wait().await?;
//! ```

pub mod adapters;
pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

pub use domain::errors::{
    ChannelError, DispatchError, DomainError, DomainResult, FlowError, GraphError, LifecycleError,
    OrchestratorError,
};
pub use domain::models::{
    AgentCatalog, AgentDefinition, AgentRuntimeState, AgentStatus, Config, ExecutionStatus, Graph,
    GraphDocument, OrchestrationFlow, StreamMessage, WorkflowExecution, WorkflowTemplate,
};
pub use infrastructure::config::{ConfigError, ConfigLoader};
pub use services::{
    EventBus, ExecutionHandle, ExecutionSession, ExecutionSnapshot, HistoryStore, Orchestrator,
    RunOutcome, RunRequest, RunSelection,
};
