//! Domain layer for the agentflow orchestration engine
//!
//! Core models, error taxonomy and the ports adapters implement.

pub mod errors;
pub mod models;
pub mod ports;

pub use errors::{
    BackendError, ChannelError, DispatchError, DomainError, DomainResult, FlowError, GraphError,
    LifecycleError, OrchestratorError,
};
