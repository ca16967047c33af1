//! PostgreSQL schema MCP server library.
//!
//! Exposes a read-only `query` tool and `table-schema://<table>` resources
//! for one PostgreSQL database over the Model Context Protocol.

pub mod config;
pub mod db;
pub mod error;
pub mod mcp;
pub mod models;
pub mod tools;
pub mod transport;

pub use config::Config;
pub use error::DbError;
pub use mcp::DbService;
