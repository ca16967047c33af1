//! MCP tool and resource implementations.
//!
//! - `query`: run a statement in a read-only transaction
//! - `schema`: `table-schema://` resources
//! - `format`: JSON serialization of results

pub mod format;
pub mod query;
pub mod schema;

pub use query::{QueryInput, QueryToolHandler};
pub use schema::{ResourceRef, ResourceText, SchemaResourceHandler, TableResource, table_uri};
