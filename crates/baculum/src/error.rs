use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BaculumError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] crate::db::DatabaseError),

    #[error("Criteria error: {0}")]
    Criteria(#[from] crate::db::CriteriaError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Console error: {0}")]
    Console(#[from] ConsoleError),
}

impl BaculumError {
    /// Numeric Baculum error identifier for API responses.
    pub fn code(&self) -> u32 {
        match self {
            BaculumError::Database(e) => e.code(),
            BaculumError::Validation(e) => e.code(),
            BaculumError::Console(e) => e.code(),
            BaculumError::Config(_) | BaculumError::Criteria(_) => {
                crate::db::error::ERROR_INTERNAL_ERROR
            }
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },

    #[error("Schema validation failed: {errors}")]
    SchemaValidation { errors: String },
}

pub const ERROR_INVALID_PROPERTY: u32 = 520;
pub const ERROR_INVALID_NAME: u32 = 530;
pub const ERROR_INVALID_ORDER: u32 = 540;
pub const ERROR_INVALID_IDS_LIST: u32 = 550;

/// Request parameters rejected before any SQL is built.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Invalid property '{property}'. Allowed: {allowed}")]
    InvalidProperty { property: String, allowed: String },

    #[error("Invalid name '{0}'")]
    InvalidName(String),

    #[error("Invalid order direction '{0}'. Allowed: asc, desc")]
    InvalidOrder(String),

    #[error("Invalid ids list '{0}'")]
    InvalidIdsList(String),
}

impl ValidationError {
    pub fn code(&self) -> u32 {
        match self {
            ValidationError::InvalidProperty { .. } => ERROR_INVALID_PROPERTY,
            ValidationError::InvalidName(_) => ERROR_INVALID_NAME,
            ValidationError::InvalidOrder(_) => ERROR_INVALID_ORDER,
            ValidationError::InvalidIdsList(_) => ERROR_INVALID_IDS_LIST,
        }
    }
}

/// Console command failure. Carries the raw output upward.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConsoleError {
    #[error("Console command '{command}' failed with exit code {exitcode}: {}", output.join("\n"))]
    Command {
        command: String,
        exitcode: i32,
        output: Vec<String>,
    },

    #[error("Console unavailable: {0}")]
    Unavailable(String),

    /// A resource name that cannot be passed to the director safely.
    #[error("Invalid resource name for console command: {0}")]
    InvalidName(String),
}

impl ConsoleError {
    pub fn code(&self) -> u32 {
        match self {
            ConsoleError::Command { exitcode, .. } if *exitcode > 0 => *exitcode as u32,
            ConsoleError::InvalidName(_) => ERROR_INVALID_NAME,
            _ => crate::db::error::ERROR_INTERNAL_ERROR,
        }
    }
}

pub type Result<T> = std::result::Result<T, BaculumError>;
