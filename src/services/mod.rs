pub mod catalog_service;
pub mod event_bus;
pub mod execution_session;
pub mod history_store;
pub mod orchestrator;

pub use catalog_service::{CatalogOrigin, CatalogService};
pub use event_bus::{EngineEvent, EventBus, EventBusConfig, EventPayload, SequenceNumber};
pub use execution_session::{
    DispatchOutcome, ExecutionSession, ExecutionSnapshot, SessionSpec, SessionStatus,
};
pub use history_store::HistoryStore;
pub use orchestrator::{
    ExecutionHandle, Orchestrator, RunOutcome, RunRequest, RunSelection, UpdateSources,
};
