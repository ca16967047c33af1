//! Connection target model.
//!
//! A [`ConnectionTarget`] is the validated PostgreSQL DSN the server was
//! started with. It is built once from the configuration and then shared
//! read-only by every component.

use crate::error::{DbError, DbResult};
use sqlx::postgres::PgConnectOptions;
use std::str::FromStr;
use url::Url;

/// URL schemes accepted for the database connection string.
pub const SUPPORTED_SCHEMES: &[&str] = &["postgres", "postgresql"];

/// Validated, immutable connection descriptor for the PostgreSQL server.
#[derive(Debug, Clone)]
pub struct ConnectionTarget {
    /// Contains sensitive data - never log
    connection_string: String,
    options: PgConnectOptions,
}

impl ConnectionTarget {
    /// Validate a connection string and parse it into driver options.
    ///
    /// An empty string, an unparseable URL or a non-PostgreSQL scheme is a
    /// configuration error.
    pub fn parse(connection_string: &str) -> DbResult<Self> {
        let trimmed = connection_string.trim();
        if trimmed.is_empty() {
            return Err(DbError::configuration(
                "A database URL must be provided via --database or DATABASE_URL",
            ));
        }

        let url = Url::parse(trimmed)
            .map_err(|e| DbError::configuration(format!("Invalid database URL: {e}")))?;
        let scheme = url.scheme().to_ascii_lowercase();
        if !SUPPORTED_SCHEMES.contains(&scheme.as_str()) {
            return Err(DbError::configuration(format!(
                "Unsupported database URL scheme '{scheme}': expected postgres:// or postgresql://"
            )));
        }

        let options = PgConnectOptions::from_str(trimmed)
            .map_err(|e| DbError::configuration(format!("Invalid database URL: {e}")))?;

        Ok(Self {
            connection_string: trimmed.to_string(),
            options,
        })
    }

    /// Driver connect options for opening a new connection.
    pub fn connect_options(&self) -> &PgConnectOptions {
        &self.options
    }

    /// Get a display-safe version of the connection string (password masked).
    pub fn masked_connection_string(&self) -> String {
        match Url::parse(&self.connection_string) {
            Ok(mut url) if url.password().is_some() => {
                // set_password only fails for cannot-be-a-base URLs, which were rejected in parse
                let _ = url.set_password(Some("****"));
                url.to_string()
            }
            _ => self.connection_string.clone(),
        }
    }
}
