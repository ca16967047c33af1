//! Schema introspection.
//!
//! Tables and columns are read from `information_schema.columns`. Every
//! client-supplied identifier is passed as a bind parameter; nothing is
//! spliced into SQL text.

use crate::db::connection::ConnectionProvider;
use crate::error::DbResult;
use crate::models::{ColumnDescriptor, DEFAULT_SCHEMA, TableDescriptor};
use sqlx::{PgConnection, Row};
use std::collections::HashSet;
use tracing::debug;

// =============================================================================
// SQL Query Templates
// =============================================================================

mod queries {
    /// Identifier columns are `sql_identifier` domains; cast so they decode as text.
    pub const LIST_TABLES: &str = r#"
        SELECT DISTINCT table_name::text AS table_name
        FROM information_schema.columns
        WHERE table_schema = $1
        ORDER BY table_name
        "#;

    pub const DESCRIBE_COLUMNS: &str = r#"
        SELECT
            column_name::text AS column_name,
            data_type::text AS data_type
        FROM information_schema.columns
        WHERE table_name = $1 AND table_schema = $2
        ORDER BY ordinal_position
        "#;
}

/// Schema inspector for database introspection, scoped to the `public` schema.
#[derive(Debug, Clone)]
pub struct SchemaInspector {
    provider: ConnectionProvider,
}

impl SchemaInspector {
    pub fn new(provider: ConnectionProvider) -> Self {
        Self { provider }
    }

    /// List the distinct tables of the schema, one descriptor per name.
    pub async fn list_tables(&self) -> DbResult<Vec<TableDescriptor>> {
        let names = self
            .provider
            .with_connection(|conn| Box::pin(fetch_table_names(conn)))
            .await?;

        let tables = dedup_table_names(names)
            .into_iter()
            .map(TableDescriptor::new)
            .collect::<Vec<_>>();

        debug!(count = tables.len(), schema = DEFAULT_SCHEMA, "Listed tables");
        Ok(tables)
    }

    /// Describe the columns of one table. Unknown tables yield an empty list.
    pub async fn describe_table(&self, table_name: &str) -> DbResult<Vec<ColumnDescriptor>> {
        let table = table_name.to_string();
        let columns = self
            .provider
            .with_connection(|conn| Box::pin(fetch_columns(conn, table)))
            .await?;

        debug!(
            table = table_name,
            count = columns.len(),
            "Described table columns"
        );
        Ok(columns)
    }
}

async fn fetch_table_names(conn: &mut PgConnection) -> DbResult<Vec<String>> {
    let rows = sqlx::query(queries::LIST_TABLES)
        .bind(DEFAULT_SCHEMA)
        .fetch_all(&mut *conn)
        .await?;

    let names = rows
        .iter()
        .map(|row| row.try_get::<String, _>("table_name"))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(names)
}

async fn fetch_columns(conn: &mut PgConnection, table: String) -> DbResult<Vec<ColumnDescriptor>> {
    let rows = sqlx::query(queries::DESCRIBE_COLUMNS)
        .bind(&table)
        .bind(DEFAULT_SCHEMA)
        .fetch_all(&mut *conn)
        .await?;

    let columns = rows
        .iter()
        .map(|row| {
            Ok(ColumnDescriptor::new(
                row.try_get::<String, _>("column_name")?,
                row.try_get::<String, _>("data_type")?,
            ))
        })
        .collect::<Result<Vec<_>, sqlx::Error>>()?;
    Ok(columns)
}

/// Collapse repeated table names, keeping the first occurrence's position.
///
/// The catalog holds one row per column, so a table appears once per column
/// unless the query itself deduplicates.
pub fn dedup_table_names(names: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::with_capacity(names.len());
    names
        .into_iter()
        .filter(|name| !name.is_empty() && seen.insert(name.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ConnectionTarget;
    use std::sync::Arc;

    fn inspector() -> SchemaInspector {
        let target = ConnectionTarget::parse("postgres://127.0.0.1:1/app").unwrap();
        SchemaInspector::new(ConnectionProvider::new(Arc::new(target)))
    }

    #[test]
    fn test_dedup_table_names() {
        let names = vec![
            "users".to_string(),
            "orders".to_string(),
            "users".to_string(),
            "orders".to_string(),
            "items".to_string(),
        ];
        assert_eq!(dedup_table_names(names), vec!["users", "orders", "items"]);
    }

    #[test]
    fn test_dedup_skips_empty_names() {
        let names = vec![String::new(), "users".to_string()];
        assert_eq!(dedup_table_names(names), vec!["users"]);
    }

    #[test]
    fn test_queries_use_bind_parameters() {
        assert!(queries::LIST_TABLES.contains("table_schema = $1"));
        assert!(queries::DESCRIBE_COLUMNS.contains("table_name = $1"));
        assert!(queries::DESCRIBE_COLUMNS.contains("table_schema = $2"));
        // data_type must come from its own catalog column
        assert!(queries::DESCRIBE_COLUMNS.contains("data_type::text AS data_type"));
    }

    #[tokio::test]
    async fn test_describe_table_unreachable_fails() {
        let err = inspector().describe_table("users").await.unwrap_err();
        assert!(err.to_string().starts_with("Connection failed"));
    }
}
