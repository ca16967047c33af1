//! Read-only query execution.
//!
//! # Security boundary
//!
//! The statement text is executed verbatim. There is no SQL parser and no
//! statement whitelist: the **only** protection against writes is that the
//! surrounding transaction is set to `READ ONLY` before the statement runs,
//! so PostgreSQL rejects INSERT/UPDATE/DELETE/DDL with SQLSTATE 25006. The
//! transaction is always rolled back, never committed.
//!
//! The statement goes through the extended query protocol as a single
//! prepared statement, so strings carrying several statements (for example a
//! `COMMIT` followed by a write) are rejected by the server.

use crate::db::connection::ConnectionProvider;
use crate::db::types::row_to_record;
use crate::error::{DbError, DbResult};
use crate::models::{QueryResult, Record};
use sqlx::{Connection, PgConnection};
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::debug;

const SET_READ_ONLY: &str = "SET TRANSACTION READ ONLY";

/// Executes client-supplied SQL inside a read-only transaction.
#[derive(Debug, Clone)]
pub struct ReadOnlyExecutor {
    provider: ConnectionProvider,
    /// None means no limit: a hung query blocks its own invocation.
    query_timeout: Option<Duration>,
}

impl ReadOnlyExecutor {
    /// Create an executor without a query timeout.
    pub fn new(provider: ConnectionProvider) -> Self {
        Self {
            provider,
            query_timeout: None,
        }
    }

    pub fn with_timeout(mut self, query_timeout: Option<Duration>) -> Self {
        self.query_timeout = query_timeout;
        self
    }

    pub fn query_timeout(&self) -> Option<Duration> {
        self.query_timeout
    }

    /// Run one statement and return all of its rows.
    pub async fn run(&self, sql: &str) -> DbResult<QueryResult> {
        let start = Instant::now();
        debug!(sql = %sql, timeout_secs = ?self.query_timeout.map(|t| t.as_secs()), "Executing read-only query");

        let statement = sql.to_string();
        let work = self
            .provider
            .with_connection(|conn| Box::pin(fetch_read_only(conn, statement)));

        let mut result = match self.query_timeout {
            Some(limit) => timeout(limit, work)
                .await
                .map_err(|_| DbError::timeout("query", limit.as_secs()))??,
            None => work.await?,
        };

        result.execution_time_ms = start.elapsed().as_millis() as u64;
        debug!(
            rows = result.row_count(),
            execution_time_ms = result.execution_time_ms,
            "Read-only query completed"
        );
        Ok(result)
    }
}

/// BEGIN, mark read-only, run the statement, decode, ROLLBACK.
async fn fetch_read_only(conn: &mut PgConnection, sql: String) -> DbResult<QueryResult> {
    let mut tx = conn.begin().await?;
    sqlx::query(SET_READ_ONLY).execute(&mut *tx).await?;
    let rows = sqlx::query(&sql).fetch_all(&mut *tx).await?;
    tx.rollback().await?;

    let records = rows.iter().map(row_to_record).collect::<DbResult<Vec<_>>>()?;
    Ok(result_from_records(records))
}

/// Column names follow the records' keys, so repeated names collapse the
/// same way they do inside each record.
fn result_from_records(records: Vec<Record>) -> QueryResult {
    let columns = records
        .first()
        .map(|r| r.keys().map(String::from).collect())
        .unwrap_or_default();
    QueryResult {
        columns,
        rows: records,
        execution_time_ms: 0,
    }
}
