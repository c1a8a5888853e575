//! Logging infrastructure
//!
//! Structured logging using tracing and tracing-subscriber:
//! - Pretty or JSON output on stderr
//! - Rolling JSON log files
//! - Retention cleanup for old log files

pub mod config;
pub mod logger;
pub mod rotation;

pub use config::{LogConfig, LogFormat, RotationPolicy};
pub use logger::{LoggerImpl, LOG_FILE_NAME};
pub use rotation::LogRetention;
