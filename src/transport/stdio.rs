//! Stdio transport for the MCP server.
//!
//! Reads JSON-RPC messages from stdin and writes responses to stdout. Logs go
//! to stderr so they never interleave with protocol traffic.

use crate::error::{DbError, DbResult};
use crate::mcp::DbService;
use crate::models::ConnectionTarget;
use crate::transport::{Transport, wait_for_signal};
use rmcp::{ServiceExt, transport::stdio};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Stdio transport implementation.
pub struct StdioTransport {
    target: Arc<ConnectionTarget>,
    query_timeout: Option<Duration>,
}

impl StdioTransport {
    pub fn new(target: Arc<ConnectionTarget>, query_timeout: Option<Duration>) -> Self {
        Self {
            target,
            query_timeout,
        }
    }
}

impl Transport for StdioTransport {
    async fn run(&self) -> DbResult<()> {
        info!("Starting MCP server with stdio transport");

        let service = DbService::new(self.target.clone(), self.query_timeout);
        let running_service = service.serve(stdio()).await.map_err(|e| {
            DbError::internal(format!("Failed to start stdio transport: {e}"))
        })?;

        tokio::select! {
            result = running_service.waiting() => match result {
                Ok(_quit_reason) => info!("Stdio transport completed normally"),
                Err(e) => {
                    warn!(error = %e, "Stdio transport error");
                    return Err(DbError::internal(format!("Stdio transport error: {e}")));
                }
            },
            _ = wait_for_signal() => {
                // A pending stdin read cannot be cancelled, so leave directly
                info!("Shutdown signal received, exiting");
                std::process::exit(0);
            }
        }

        Ok(())
    }

    fn name(&self) -> &'static str {
        "stdio"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stdio_transport_creation() {
        let target = ConnectionTarget::parse("postgres://localhost/app").unwrap();
        let transport = StdioTransport::new(Arc::new(target), None);
        assert_eq!(transport.name(), "stdio");
    }
}
