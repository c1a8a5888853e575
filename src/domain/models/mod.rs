pub mod agent;
pub mod config;
pub mod execution;
pub mod flow;
pub mod graph;
pub mod lifecycle;
pub mod message;

pub use agent::{AgentCatalog, AgentCategory, AgentDefinition, WorkflowTemplate};
pub use config::{
    BackendConfig, ChannelConfig, Config, HistoryConfig, HistoryStorage, LoggingConfig,
    SimulationConfig,
};
pub use execution::{
    AgentDetail, ExecutionEnvironment, ExecutionExpansion, ExecutionMode, ExecutionStatus,
    ExecutionStepSummary, PerformanceMetrics, WorkflowExecution,
};
pub use flow::{
    OrchestrationFlow, OrchestrationPhase, OrchestrationStep, PhaseKind, StepStatus,
};
pub use graph::{Graph, GraphDocument, GraphEdge, GraphNode, Position};
pub use lifecycle::{AgentRuntimeState, AgentStatus};
pub use message::{MessageType, StreamMessage};
