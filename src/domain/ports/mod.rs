//! Port trait definitions (Hexagonal Architecture)
//!
//! Async interfaces the adapters implement:
//! - CatalogSource: agent definitions and workflow templates
//! - ExecutionSubmitter / ExecutionFeed: backend execution API
//! - UpdateSource: streaming lifecycle messages
//! - HistoryRepository: execution history persistence

pub mod catalog_source;
pub mod execution_submitter;
pub mod history_repository;
pub mod null_history;
pub mod update_source;

pub use catalog_source::CatalogSource;
pub use execution_submitter::{ExecutionFeed, ExecutionRequest, ExecutionSubmitter};
pub use history_repository::{
    HistoryFilter, HistoryRepository, HistorySort, SortDirection, SortField,
};
pub use null_history::NullHistoryRepository;
pub use update_source::{RunPlan, UpdateSource, UpdateSubscription};
