//! CLI command implementations.

pub mod catalog;
pub mod graph;
pub mod history;
pub mod init;
pub mod run;
