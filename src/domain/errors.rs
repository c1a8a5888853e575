//! Domain errors for the agentflow orchestration engine.
//!
//! Errors are grouped by the taxonomy the engine reacts to:
//! structural (graph edits), transitional (lifecycle and flow updates),
//! execution (submission) and channel (update source) failures.

use thiserror::Error;

use super::models::lifecycle::AgentStatus;

/// Structural errors raised synchronously by the graph model.
///
/// A graph edit that fails with one of these leaves the graph unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    #[error("Node not found: {0}")]
    NodeNotFound(String),

    #[error("Duplicate node id: {0}")]
    DuplicateNode(String),

    #[error("Edge not found: {0}")]
    EdgeNotFound(String),

    #[error("Agent not found in catalog: {0}")]
    AgentNotFound(String),

    #[error("Port '{port}' is not a declared {direction} of node {node_id}")]
    InvalidPort {
        node_id: String,
        port: String,
        direction: PortDirection,
    },

    #[error("Edge already exists: {source_node_id}.{source_port} -> {target_node_id}.{target_port}")]
    DuplicateEdge {
        source_node_id: String,
        source_port: String,
        target_node_id: String,
        target_port: String,
    },

    #[error("Node {0} cannot be connected to itself")]
    SelfLoop(String),
}

/// Which side of a node a port lives on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortDirection {
    Input,
    Output,
}

impl std::fmt::Display for PortDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Input => write!(f, "input"),
            Self::Output => write!(f, "output"),
        }
    }
}

/// Rejected agent lifecycle transitions.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LifecycleError {
    #[error("Invalid transition for agent {agent}: {from} -> {to}")]
    InvalidTransition {
        agent: String,
        from: AgentStatus,
        to: AgentStatus,
    },

    #[error("Agent {agent} is {status}; progress updates require running")]
    NotRunning { agent: String, status: AgentStatus },
}

/// Errors raised by the orchestration flow.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FlowError {
    #[error("Step not found: {0}")]
    StepNotFound(String),

    #[error("Duplicate agent in flow: {0}")]
    DuplicateAgent(String),
}

/// Reasons the dispatcher drops a streaming message.
///
/// These are logged and the message is ignored; the execution keeps going.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    #[error(transparent)]
    Flow(#[from] FlowError),

    #[error("Message for workflow {received} delivered to execution {expected}")]
    WrongWorkflow { expected: String, received: String },

    #[error("Message of type {0} is missing agentName")]
    MissingAgentName(String),

    #[error("Unknown agent in message: {0}")]
    UnknownAgent(String),

    #[error("Agent {agent} cannot start before {blocking} has finished")]
    SequencingViolation { agent: String, blocking: String },

    #[error("Execution is already {0}")]
    ExecutionClosed(String),
}

/// Failures establishing or reading a streaming update channel.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChannelError {
    #[error("Invalid channel URL: {0}")]
    InvalidUrl(String),

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Connection timed out after {0}ms")]
    Timeout(u64),
}

/// Failures talking to the backend HTTP API.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    #[error("Backend base URL is not configured")]
    NotConfigured,

    #[error("Request failed: {0}")]
    Request(String),

    #[error("Backend returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Failed to decode backend response: {0}")]
    Decode(String),
}

/// Failures submitting or controlling executions.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("Execution submission failed: {0}")]
    Submission(#[source] BackendError),

    #[error("Workflow template not found: {0}")]
    TemplateNotFound(String),

    #[error("Agent not found in catalog: {0}")]
    AgentNotFound(String),

    #[error("No agents selected for execution")]
    EmptySelection,

    #[error("Execution not found: {0}")]
    ExecutionNotFound(String),

    #[error("Execution already active: {0}")]
    AlreadyActive(String),

    #[error(transparent)]
    Flow(#[from] FlowError),

    #[error(transparent)]
    Channel(#[from] ChannelError),

    #[error("Execution task aborted: {0}")]
    Aborted(String),
}

/// Persistence-level errors.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

pub type DomainResult<T> = Result<T, DomainError>;

impl From<sqlx::Error> for DomainError {
    fn from(err: sqlx::Error) -> Self {
        DomainError::DatabaseError(err.to_string())
    }
}

impl From<serde_json::Error> for DomainError {
    fn from(err: serde_json::Error) -> Self {
        DomainError::SerializationError(err.to_string())
    }
}
