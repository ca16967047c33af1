//! Data models for the PostgreSQL schema MCP server.
//!
//! This module re-exports all model types used throughout the application.

pub mod connection;
pub mod query;
pub mod schema;

// Re-export commonly used types
pub use connection::ConnectionTarget;
pub use query::{QueryResult, Record, SqlValue};
pub use schema::{ColumnDescriptor, DEFAULT_SCHEMA, TableDescriptor};
