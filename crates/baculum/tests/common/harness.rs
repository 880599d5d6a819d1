//! Isolated catalog per test.

#![allow(dead_code)]

use std::path::{Path, PathBuf};

use tempfile::TempDir;

use baculum::config::{load_config, ApiConfig};
use baculum::db::Catalog;
use baculum::QueryExecutor;

pub const CATALOG_SQL: &str = include_str!("../fixtures/catalog.sql");

/// A temp directory holding `bacula.db` and `api.json`.
pub struct CatalogHarness {
    temp_dir: TempDir,
    pub config: ApiConfig,
}

impl CatalogHarness {
    /// Catalog seeded with the shared fixture history.
    pub fn new() -> Self {
        Self::with_sql(CATALOG_SQL)
    }

    pub fn with_sql(sql: &str) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db_path = temp_dir.path().join("bacula.db");
        let conn = rusqlite::Connection::open(&db_path).expect("Failed to create catalog");
        conn.execute_batch(sql).expect("Failed to load catalog fixture");
        drop(conn);

        let config_path = temp_dir.path().join("api.json");
        let config_json = serde_json::json!({
            "db": { "enabled": true, "type": "sqlite", "path": db_path },
            "console": {
                "bconsole_path": "/usr/sbin/bconsole",
                "config_path": temp_dir.path().join("bconsole.conf"),
            }
        });
        std::fs::write(&config_path, config_json.to_string()).expect("Failed to write config");
        let config = load_config(&config_path).expect("Failed to load config");

        Self { temp_dir, config }
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn db_path(&self) -> PathBuf {
        self.temp_dir.path().join("bacula.db")
    }

    /// Opens a fresh session the way a request handler does.
    pub fn connect(&self) -> Box<dyn QueryExecutor> {
        Catalog::new(&self.config.db)
            .connect()
            .expect("Failed to connect to catalog")
    }
}
