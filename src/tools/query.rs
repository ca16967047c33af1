//! Query execution tool.
//!
//! This module implements the `query` MCP tool. The statement runs inside a
//! read-only transaction; writes are rejected by PostgreSQL itself.

use crate::db::ReadOnlyExecutor;
use crate::error::DbResult;
use crate::tools::format::to_pretty_json;
use schemars::JsonSchema;
use serde::Deserialize;
use tracing::{info, warn};

/// Input for the query tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct QueryInput {
    /// SQL statement to run. It executes inside a READ ONLY transaction.
    pub sql: String,
}

/// Handler for the query tool.
#[derive(Debug, Clone)]
pub struct QueryToolHandler {
    executor: ReadOnlyExecutor,
}

impl QueryToolHandler {
    pub fn new(executor: ReadOnlyExecutor) -> Self {
        Self { executor }
    }

    /// Run the statement and serialize its rows.
    pub async fn query(&self, input: QueryInput) -> DbResult<String> {
        let result = self.executor.run(&input.sql).await?;
        info!(
            rows = result.row_count(),
            execution_time_ms = result.execution_time_ms,
            "Query executed"
        );
        to_pretty_json(&result)
    }

    /// Run the tool and render any failure as an `Error: ...` payload.
    pub async fn run_tool(&self, input: QueryInput) -> String {
        match self.query(input).await {
            Ok(text) => text,
            Err(e) => {
                if e.is_read_only_violation() {
                    warn!(error = %e, "Rejected write in read-only query");
                } else {
                    warn!(error = %e, "Query failed");
                }
                format!("Error: {e}")
            }
        }
    }
}
