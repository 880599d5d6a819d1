pub mod acl;
pub mod config;
pub mod console;
pub mod db;
pub mod error;
pub mod job;
pub mod object;
pub mod resources;
pub mod source;
pub mod validation;

#[cfg(test)]
mod testutil;

pub use acl::{AclResource, AllowedResources};
pub use config::{load_config, load_config_from_str, ApiConfig, ConsoleConfig, DbConfig};
pub use console::{BconsoleGateway, ConsoleGateway, ConsoleOutput};
pub use db::{Catalog, Clause, Criteria, Dialect, QueryExecutor, Row, SqliteSession};
pub use error::{BaculumError, ConfigError, ConsoleError, Result, ValidationError};
pub use job::JobManager;
pub use object::ObjectManager;
pub use resources::{Resource, ResourceManager};
pub use source::SourceManager;
pub use validation::OrderDirection;
