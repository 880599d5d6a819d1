//! SQL dialect capabilities.
//!
//! Every piece of SQL that differs between the three supported catalog
//! backends is produced here, so the job/object/source services stay
//! dialect-agnostic and only ask the active [`Dialect`] for fragments.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::error::DatabaseError;

/// Catalog database type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Dialect {
    #[serde(rename = "pgsql", alias = "postgresql")]
    PostgreSql,
    #[serde(rename = "mysql")]
    MySql,
    #[serde(rename = "sqlite")]
    Sqlite,
}

/// How "most recent row per key" projections are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LatestPerKey {
    /// `SELECT DISTINCT ON (key) ... ORDER BY key, id DESC`
    DistinctOn,
    /// Join against a `MAX(id) ... GROUP BY key` subquery.
    JoinMax,
}

impl Dialect {
    /// Name used in the API config (`pgsql`, `mysql`, `sqlite`).
    pub fn as_str(&self) -> &'static str {
        match self {
            Dialect::PostgreSql => "pgsql",
            Dialect::MySql => "mysql",
            Dialect::Sqlite => "sqlite",
        }
    }

    /// Truncates a timestamp expression to the first second of its month.
    pub fn date_trunc_month(&self, expr: &str) -> String {
        match self {
            Dialect::PostgreSql => format!("date_trunc('month', {})", expr),
            Dialect::MySql => format!("DATE_FORMAT({}, '%Y-%m-01 00:00:00')", expr),
            Dialect::Sqlite => format!("strftime('%Y-%m-01 00:00:00', {})", expr),
        }
    }

    /// String concatenation of two expressions.
    pub fn concat(&self, a: &str, b: &str) -> String {
        match self {
            Dialect::MySql => format!("CONCAT({}, {})", a, b),
            Dialect::PostgreSql | Dialect::Sqlite => format!("{} || {}", a, b),
        }
    }

    /// Difference in seconds between two timestamp expressions.
    pub fn epoch_diff(&self, end: &str, start: &str) -> String {
        match self {
            Dialect::PostgreSql => format!(
                "date_part('epoch', {}) - date_part('epoch', {})",
                end, start
            ),
            Dialect::MySql => format!("UNIX_TIMESTAMP({}) - UNIX_TIMESTAMP({})", end, start),
            Dialect::Sqlite => format!("strftime('%s', {}) - strftime('%s', {})", end, start),
        }
    }

    /// `CREATE ... TABLE name AS select` for a short-lived staging table.
    ///
    /// MySQL gets an ordinary table: a temporary table cannot be referenced
    /// twice in one query there, which the overview UNIONs need.
    pub fn create_scratch_table(&self, name: &str, select: &str) -> String {
        match self {
            Dialect::PostgreSql | Dialect::Sqlite => {
                format!("CREATE TEMPORARY TABLE {} AS {}", name, select)
            }
            Dialect::MySql => format!("CREATE TABLE {} AS {}", name, select),
        }
    }

    pub fn drop_table(&self, name: &str) -> String {
        format!("DROP TABLE IF EXISTS {}", name)
    }

    /// Applies the backend's folding of unquoted identifiers.
    pub fn fold_identifier(&self, ident: &str) -> String {
        match self {
            Dialect::PostgreSql => ident.to_lowercase(),
            Dialect::MySql | Dialect::Sqlite => ident.to_string(),
        }
    }

    /// Quotes an identifier that clashes with a reserved word (e.g. `all`).
    pub fn quote_identifier(&self, ident: &str) -> String {
        match self {
            Dialect::MySql => format!("`{}`", ident),
            Dialect::PostgreSql | Dialect::Sqlite => format!("\"{}\"", ident),
        }
    }

    /// ` LIMIT n OFFSET m` fragment. Zero means "not set".
    ///
    /// MySQL and SQLite reject OFFSET without LIMIT, so an unbounded limit
    /// is spelled out for them.
    pub fn limit_offset(&self, limit: u64, offset: u64) -> String {
        let mut sql = String::new();
        if limit > 0 {
            sql.push_str(&format!(" LIMIT {}", limit));
        } else if offset > 0 {
            match self {
                Dialect::PostgreSql => {}
                Dialect::MySql => sql.push_str(" LIMIT 18446744073709551615"),
                Dialect::Sqlite => sql.push_str(" LIMIT -1"),
            }
        }
        if offset > 0 {
            sql.push_str(&format!(" OFFSET {}", offset));
        }
        sql
    }

    /// Makes a path/filename column usable with `LOWER()`.
    pub fn text_for_lower(&self, expr: &str) -> String {
        match self {
            Dialect::MySql => format!("CONVERT({} USING utf8mb4)", expr),
            Dialect::PostgreSql | Dialect::Sqlite => expr.to_string(),
        }
    }

    pub fn begin_transaction(&self) -> &'static str {
        match self {
            Dialect::MySql => "START TRANSACTION",
            Dialect::PostgreSql | Dialect::Sqlite => "BEGIN",
        }
    }

    /// Whether `REGR_SLOPE`/`REGR_INTERCEPT`/`CORR` aggregates exist.
    pub fn supports_regression(&self) -> bool {
        matches!(self, Dialect::PostgreSql)
    }

    pub fn latest_per_key(&self) -> LatestPerKey {
        match self {
            Dialect::PostgreSql => LatestPerKey::DistinctOn,
            Dialect::MySql | Dialect::Sqlite => LatestPerKey::JoinMax,
        }
    }

    /// Query returning the catalog size in bytes. `db_name` is only used on
    /// PostgreSQL and must come from the trusted API config.
    pub fn database_size_sql(&self, db_name: &str) -> Vec<String> {
        match self {
            Dialect::PostgreSql => vec![format!(
                "SELECT pg_database_size('{}') AS dbsize",
                db_name.replace('\'', "''")
            )],
            Dialect::MySql => vec![
                "SELECT SUM(data_length + index_length) AS dbsize FROM information_schema.tables"
                    .to_string(),
            ],
            Dialect::Sqlite => vec![
                "PRAGMA page_count".to_string(),
                "PRAGMA page_size".to_string(),
            ],
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Dialect {
    type Err = DatabaseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pgsql" | "postgresql" | "postgres" => Ok(Dialect::PostgreSql),
            "mysql" => Ok(Dialect::MySql),
            "sqlite" | "sqlite3" => Ok(Dialect::Sqlite),
            other => Err(DatabaseError::UnsupportedDialect {
                dialect: other.to_string(),
                operation: "catalog access".to_string(),
            }),
        }
    }
}
