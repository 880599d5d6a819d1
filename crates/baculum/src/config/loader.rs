use std::path::{Path, PathBuf};

use crate::config::schema::ApiConfig;
use crate::db::Dialect;
use crate::error::ConfigError;

const SCHEMA_JSON: &str = include_str!("../../schema/api-config.json");

/// Returns the default config location: `~/.baculum/api.json`.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".baculum").join("api.json"))
}

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<ApiConfig, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    load_config_from_str(&content)
}

pub fn load_config_from_str(content: &str) -> Result<ApiConfig, ConfigError> {
    let json_value: serde_json::Value = serde_json::from_str(content)?;

    validate_schema(&json_value)?;

    let config: ApiConfig = serde_json::from_value(json_value)?;

    validate_config(&config)?;

    Ok(config)
}

fn validate_schema(json_value: &serde_json::Value) -> Result<(), ConfigError> {
    let schema: serde_json::Value =
        serde_json::from_str(SCHEMA_JSON).map_err(|e| ConfigError::Validation {
            message: format!("Invalid embedded schema JSON: {}", e),
        })?;

    let validator = jsonschema::validator_for(&schema).map_err(|e| ConfigError::Validation {
        message: format!("Failed to compile JSON schema: {}", e),
    })?;

    let error_messages: Vec<String> = validator
        .iter_errors(json_value)
        .map(|e| e.to_string())
        .collect();
    if !error_messages.is_empty() {
        return Err(ConfigError::SchemaValidation {
            errors: error_messages.join("; "),
        });
    }

    Ok(())
}

fn validate_config(config: &ApiConfig) -> Result<(), ConfigError> {
    let db = &config.db;
    match db.dialect {
        Dialect::Sqlite => {
            if db.path.is_none() {
                return Err(ConfigError::Validation {
                    message: "SQLite catalog requires 'path'".to_string(),
                });
            }
        }
        Dialect::PostgreSql | Dialect::MySql => {
            if db.name.as_deref().map_or(true, str::is_empty) {
                return Err(ConfigError::Validation {
                    message: format!("{} catalog requires 'name'", db.dialect),
                });
            }
            if db.ip_addr.is_none() {
                return Err(ConfigError::Validation {
                    message: format!("{} catalog requires 'ip_addr'", db.dialect),
                });
            }
        }
    }

    Ok(())
}
