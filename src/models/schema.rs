//! Schema-related data models.
//!
//! This module defines the descriptors produced by schema introspection.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Schema that table listing and column lookup are scoped to.
pub const DEFAULT_SCHEMA: &str = "public";

/// One table of the introspected schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableDescriptor {
    pub name: String,
    pub schema: String,
}

impl TableDescriptor {
    /// Create a descriptor for a table in the default schema.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            schema: DEFAULT_SCHEMA.to_string(),
        }
    }
}

/// One column of a table, as reported by the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ColumnDescriptor {
    pub column_name: String,
    /// Declared SQL type (e.g., "integer", "character varying")
    pub data_type: String,
}

impl ColumnDescriptor {
    pub fn new(column_name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            column_name: column_name.into(),
            data_type: data_type.into(),
        }
    }
}
