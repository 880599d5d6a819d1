//! Database error types.

use thiserror::Error;

/// Baculum error identifiers carried by catalog failures.
pub const ERROR_DB_CONNECTION_PROBLEM: u32 = 2;
pub const ERROR_DATABASE_ACCESS_NOT_SUPPORTED: u32 = 3;
pub const ERROR_INTERNAL_ERROR: u32 = 1000;

/// Errors from catalog access and query execution.
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// SQLite error from rusqlite.
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// PostgreSQL or MySQL error from sqlx.
    #[error("SQL error: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// Catalog access is disabled in the API config.
    #[error("Catalog database access is not supported")]
    AccessNotSupported,

    /// The connection to the catalog could not be established.
    #[error("Problem with connection to the database: {message}")]
    ConnectionProblem { message: String },

    /// The operation has no SQL form for the configured dialect.
    #[error("Unsupported database dialect '{dialect}' for {operation}")]
    UnsupportedDialect { dialect: String, operation: String },

    /// A placeholder in the SQL text has no bound value.
    #[error("No value bound for placeholder :{0}")]
    UnboundParameter(String),

    /// A bound value cannot be converted to the type the server expects.
    #[error("Value '{value}' is not a valid {expected}")]
    InvalidParameter { value: String, expected: String },

    /// A failed statement together with its SQL text. Displays as the
    /// underlying error; the text is available through [`DatabaseError::statement`].
    #[error("{source}")]
    Statement {
        sql: String,
        #[source]
        source: Box<DatabaseError>,
    },
}

impl DatabaseError {
    /// Attaches the SQL text of the failing statement.
    pub fn in_statement(self, sql: &str) -> Self {
        match self {
            DatabaseError::Statement { .. } => self,
            other => DatabaseError::Statement {
                sql: sql.to_string(),
                source: Box::new(other),
            },
        }
    }

    /// SQL text of the failing statement, when known.
    pub fn statement(&self) -> Option<&str> {
        match self {
            DatabaseError::Statement { sql, .. } => Some(sql),
            _ => None,
        }
    }

    /// Numeric error identifier reported to API clients.
    pub fn code(&self) -> u32 {
        match self {
            DatabaseError::AccessNotSupported => ERROR_DATABASE_ACCESS_NOT_SUPPORTED,
            DatabaseError::ConnectionProblem { .. } => ERROR_DB_CONNECTION_PROBLEM,
            DatabaseError::Statement { source, .. } => source.code(),
            _ => ERROR_INTERNAL_ERROR,
        }
    }
}
