//! The executor seam every query service runs through.

use serde_json::{Map, Value};

use super::criteria::Params;
use super::dialect::Dialect;
use super::error::DatabaseError;

/// One result row. Keys are lower-cased column labels on every backend.
pub type Row = Map<String, Value>;

/// Runs SQL against one catalog session.
///
/// Implementations own exactly one connection; callers create one executor
/// per request and pass it by reference into the services.
pub trait QueryExecutor {
    /// The SQL dialect of the underlying connection.
    fn dialect(&self) -> Dialect;

    /// Runs a query and returns all rows.
    fn run(&self, sql: &str, params: &Params) -> Result<Vec<Row>, DatabaseError>;

    /// Runs a statement and returns the number of affected rows.
    ///
    /// With no parameters the text is executed directly, so multi-statement
    /// text and parameter-less DDL work on every backend.
    fn execute(&self, sql: &str, params: &Params) -> Result<usize, DatabaseError>;

    /// First row of a query, if any.
    fn run_one(&self, sql: &str, params: &Params) -> Result<Option<Row>, DatabaseError> {
        Ok(self.run(sql, params)?.into_iter().next())
    }

    fn begin(&self) -> Result<(), DatabaseError> {
        self.execute(self.dialect().begin_transaction(), &Params::new())
            .map(|_| ())
    }

    fn commit(&self) -> Result<(), DatabaseError> {
        self.execute("COMMIT", &Params::new()).map(|_| ())
    }

    fn rollback(&self) -> Result<(), DatabaseError> {
        self.execute("ROLLBACK", &Params::new()).map(|_| ())
    }
}

/// Typed accessors over [`Row`] values.
///
/// Numeric columns may come back as numbers or as numeric strings depending
/// on the backend and expression type, so both are accepted.
pub trait RowExt {
    fn get_i64(&self, key: &str) -> Option<i64>;
    fn get_f64(&self, key: &str) -> Option<f64>;
    fn get_str(&self, key: &str) -> Option<&str>;
    /// Value rendered as a grouping key; `None` when absent.
    fn key_string(&self, key: &str) -> Option<String>;
}

impl RowExt for Row {
    fn get_i64(&self, key: &str) -> Option<i64> {
        match self.get(key)? {
            Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
            Value::String(s) => s
                .trim()
                .parse::<i64>()
                .ok()
                .or_else(|| s.trim().parse::<f64>().ok().map(|f| f as i64)),
            Value::Bool(b) => Some(*b as i64),
            _ => None,
        }
    }

    fn get_f64(&self, key: &str) -> Option<f64> {
        match self.get(key)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        }
    }

    fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key)?.as_str()
    }

    fn key_string(&self, key: &str) -> Option<String> {
        match self.get(key)? {
            Value::String(s) => Some(s.clone()),
            Value::Null => Some(String::new()),
            other => Some(other.to_string()),
        }
    }
}
