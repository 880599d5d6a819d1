//! Catalog access: criteria, SQL dialects, execution and post-processing.
//!
//! Every request opens its own [`QueryExecutor`] through [`Catalog::connect`]
//! and hands it by reference to the query services. There is no shared
//! connection state.

pub mod columns;
pub mod criteria;
pub mod dialect;
pub mod error;
pub mod executor;
pub mod grouping;
pub mod mysql;
pub mod postgres;
pub mod scratch;
pub mod server;
pub mod sqlite;

pub use columns::{Column, SortEntity};
pub use criteria::{build_where, Clause, Criteria, CriteriaError, Operator, Params, SqlValue, WhereClause};
pub use dialect::{Dialect, LatestPerKey};
pub use error::DatabaseError;
pub use executor::{QueryExecutor, Row, RowExt};
pub use grouping::{group_by, group_rows_by, GroupOptions, Grouped, OverviewEntry, OverviewSort};
pub use mysql::MySqlSession;
pub use postgres::PgSession;
pub use scratch::{ScratchTable, TransactionGuard};
pub use sqlite::SqliteSession;

use crate::config::DbConfig;

/// Opens catalog sessions for one configured database.
pub struct Catalog<'a> {
    config: &'a DbConfig,
}

impl<'a> Catalog<'a> {
    pub fn new(config: &'a DbConfig) -> Self {
        Self { config }
    }

    /// Opens a new session. Each call returns its own connection.
    pub fn connect(&self) -> Result<Box<dyn QueryExecutor>, DatabaseError> {
        if !self.config.enabled {
            return Err(DatabaseError::AccessNotSupported);
        }
        let session: Box<dyn QueryExecutor> = match self.config.dialect {
            Dialect::Sqlite => {
                let path = self.config.path.as_ref().ok_or_else(|| {
                    DatabaseError::ConnectionProblem {
                        message: "no catalog path configured".to_string(),
                    }
                })?;
                Box::new(SqliteSession::open(path).inspect_err(|e| self.log_failure(e))?)
            }
            Dialect::PostgreSql => {
                Box::new(PgSession::connect(self.config).inspect_err(|e| self.log_failure(e))?)
            }
            Dialect::MySql => {
                Box::new(MySqlSession::connect(self.config).inspect_err(|e| self.log_failure(e))?)
            }
        };
        Ok(session)
    }

    fn log_failure(&self, e: &DatabaseError) {
        log::error!("Catalog connection to {} failed: {}", self.config.describe(), e);
    }

    /// True when the catalog answers with a positive schema version.
    pub fn test_connection(&self, exec: &dyn QueryExecutor) -> bool {
        match exec.run_one("SELECT versionid FROM Version", &Params::new()) {
            Ok(Some(row)) => row.get_i64("versionid").is_some_and(|v| v > 0),
            Ok(None) => false,
            Err(e) => {
                log::warn!("Catalog connection test failed: {}", e);
                false
            }
        }
    }

    /// Catalog size in bytes.
    pub fn database_size(&self, exec: &dyn QueryExecutor) -> Result<u64, DatabaseError> {
        let dialect = exec.dialect();
        let db_name = self.config.name.as_deref().unwrap_or_default();
        let queries = dialect.database_size_sql(db_name);
        let mut size: u64 = 1;
        for sql in &queries {
            let row = exec.run_one(sql, &Params::new())?;
            let value = row
                .and_then(|r| r.values().next().cloned())
                .and_then(|v| match v {
                    serde_json::Value::Number(n) => n.as_u64(),
                    serde_json::Value::String(s) => s.parse::<u64>().ok(),
                    _ => None,
                })
                .unwrap_or(0);
            // SQLite answers with page count and page size.
            size *= value;
        }
        Ok(size)
    }
}
