//! Adapters implementing the domain ports.

pub mod channel;
pub mod http;
pub mod sqlite;
