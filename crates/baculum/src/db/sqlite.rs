//! SQLite catalog session on top of rusqlite.

use std::path::Path;

use rusqlite::types::{ToSql, ToSqlOutput, Value as SqlOwned, ValueRef};
use rusqlite::{Connection, OpenFlags};
use serde_json::Value;

use super::criteria::{Params, SqlValue};
use super::dialect::Dialect;
use super::error::DatabaseError;
use super::executor::{QueryExecutor, Row};

impl ToSql for SqlValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            SqlValue::Null => ToSqlOutput::Owned(SqlOwned::Null),
            SqlValue::Integer(i) => ToSqlOutput::Owned(SqlOwned::Integer(*i)),
            SqlValue::Real(f) => ToSqlOutput::Owned(SqlOwned::Real(*f)),
            SqlValue::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
        })
    }
}

/// One SQLite connection serving one request.
pub struct SqliteSession {
    conn: Connection,
}

impl SqliteSession {
    /// Opens an existing catalog file. A missing file is a connection
    /// problem, not a reason to create an empty catalog.
    pub fn open(path: &Path) -> Result<Self, DatabaseError> {
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_URI
            | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        let conn = Connection::open_with_flags(path, flags).map_err(|e| {
            DatabaseError::ConnectionProblem {
                message: format!("{}: {}", path.display(), e),
            }
        })?;
        log::info!("Catalog opened at {}", path.display());
        Ok(Self { conn })
    }

    /// In-memory catalog, used by tests and tooling.
    pub fn open_in_memory() -> Result<Self, DatabaseError> {
        Ok(Self {
            conn: Connection::open_in_memory()?,
        })
    }

    pub fn from_connection(conn: Connection) -> Self {
        Self { conn }
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

fn to_json(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        // Bacula stores Path.Path and File.Filename as BLOB on SQLite.
        ValueRef::Text(t) | ValueRef::Blob(t) => {
            Value::String(String::from_utf8_lossy(t).into_owned())
        }
    }
}

fn named(params: &Params) -> Vec<(&str, &dyn ToSql)> {
    params
        .iter()
        .map(|(k, v)| (k.as_str(), v as &dyn ToSql))
        .collect()
}

impl SqliteSession {
    fn query_rows(&self, sql: &str, params: &Params) -> rusqlite::Result<Vec<Row>> {
        let mut stmt = self.conn.prepare(sql)?;
        let columns: Vec<String> = stmt
            .column_names()
            .iter()
            .map(|c| c.to_lowercase())
            .collect();
        let bound = named(params);
        let mut rows = stmt.query(bound.as_slice())?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            let mut record = Row::new();
            for (i, name) in columns.iter().enumerate() {
                record.insert(name.clone(), to_json(row.get_ref(i)?));
            }
            out.push(record);
        }
        Ok(out)
    }

    fn execute_statement(&self, sql: &str, params: &Params) -> rusqlite::Result<usize> {
        if params.is_empty() {
            self.conn.execute_batch(sql)?;
            return Ok(self.conn.changes() as usize);
        }
        let mut stmt = self.conn.prepare(sql)?;
        let bound = named(params);
        stmt.execute(bound.as_slice())
    }
}

impl QueryExecutor for SqliteSession {
    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    fn run(&self, sql: &str, params: &Params) -> Result<Vec<Row>, DatabaseError> {
        log::debug!("SQL: {} {:?}", sql, params);
        self.query_rows(sql, params)
            .map_err(|e| DatabaseError::from(e).in_statement(sql))
    }

    fn execute(&self, sql: &str, params: &Params) -> Result<usize, DatabaseError> {
        log::debug!("SQL: {} {:?}", sql, params);
        self.execute_statement(sql, params)
            .map_err(|e| DatabaseError::from(e).in_statement(sql))
    }
}
