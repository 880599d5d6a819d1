use std::cell::RefCell;

use crate::db::server::{positional, PlaceholderStyle};
use crate::db::{DatabaseError, Dialect, Params, QueryExecutor, Row, SqliteSession};

const CATALOG_SQL: &str = include_str!("../tests/fixtures/catalog.sql");

/// In-memory catalog loaded with the shared fixture history.
pub fn catalog() -> SqliteSession {
    let session = SqliteSession::open_in_memory().unwrap();
    session.connection().execute_batch(CATALOG_SQL).unwrap();
    session
}

/// Fixture catalog plus extra statements.
pub fn catalog_with(sql: &str) -> SqliteSession {
    let session = catalog();
    session.connection().execute_batch(sql).unwrap();
    session
}

/// Records the SQL generated for a server dialect and answers with no rows.
pub struct RecordingExecutor {
    dialect: Dialect,
    statements: RefCell<Vec<(String, Params)>>,
}

impl RecordingExecutor {
    pub fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            statements: RefCell::new(Vec::new()),
        }
    }

    pub fn statements(&self) -> Vec<String> {
        self.statements
            .borrow()
            .iter()
            .map(|(sql, _)| sql.clone())
            .collect()
    }

    /// First recorded statement containing `needle`.
    pub fn find(&self, needle: &str) -> Option<String> {
        self.statements().into_iter().find(|s| s.contains(needle))
    }

    /// Every statement rewritten into the dialect's positional form, which
    /// fails when a placeholder has no bound value.
    pub fn positional(&self) -> Vec<String> {
        let style = match self.dialect {
            Dialect::MySql => PlaceholderStyle::QuestionMark,
            _ => PlaceholderStyle::Numbered,
        };
        self.statements
            .borrow()
            .iter()
            .map(|(sql, params)| positional(sql, params, style).unwrap().0)
            .collect()
    }

    fn record(&self, sql: &str, params: &Params) {
        self.statements
            .borrow_mut()
            .push((sql.to_string(), params.clone()));
    }
}

impl QueryExecutor for RecordingExecutor {
    fn dialect(&self) -> Dialect {
        self.dialect
    }

    fn run(&self, sql: &str, params: &Params) -> Result<Vec<Row>, DatabaseError> {
        self.record(sql, params);
        Ok(Vec::new())
    }

    fn execute(&self, sql: &str, params: &Params) -> Result<usize, DatabaseError> {
        self.record(sql, params);
        Ok(0)
    }
}
