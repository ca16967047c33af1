//! MCP server integration module.
//!
//! Binds the query tool and schema resources to the MCP protocol using the
//! rmcp framework.

pub mod service;

pub use service::DbService;
