//! Database access layer.
//!
//! - Per-operation connections
//! - Read-only query execution
//! - Schema introspection
//! - Type mappings

pub mod connection;
pub mod executor;
pub mod schema;
pub mod types;

pub use connection::ConnectionProvider;
pub use executor::ReadOnlyExecutor;
pub use schema::SchemaInspector;
