use std::fmt;
use std::path::PathBuf;

use secrecy::SecretString;
use serde::{Deserialize, Deserializer};

use crate::db::Dialect;

#[derive(Debug, Deserialize)]
pub struct ApiConfig {
    pub db: DbConfig,
    #[serde(default)]
    pub console: ConsoleConfig,
}

/// Catalog connection parameters.
#[derive(Deserialize)]
pub struct DbConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(rename = "type")]
    pub dialect: Dialect,
    /// Database name on server dialects.
    #[serde(default)]
    pub name: Option<String>,
    /// Catalog file on SQLite.
    #[serde(default)]
    pub path: Option<PathBuf>,
    #[serde(default)]
    pub ip_addr: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub login: Option<String>,
    #[serde(default, deserialize_with = "deserialize_secret")]
    pub password: Option<SecretString>,
}

fn default_true() -> bool {
    true
}

fn deserialize_secret<'de, D>(deserializer: D) -> Result<Option<SecretString>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.map(SecretString::from))
}

impl DbConfig {
    /// Connection target for log lines, without credentials.
    pub fn describe(&self) -> String {
        match (&self.path, &self.ip_addr) {
            (Some(path), _) => format!("{}:{}", self.dialect, path.display()),
            (None, Some(host)) => format!(
                "{}://{}@{}:{}/{}",
                self.dialect,
                self.login.as_deref().unwrap_or(""),
                host,
                self.port.map(|p| p.to_string()).unwrap_or_default(),
                self.name.as_deref().unwrap_or("")
            ),
            (None, None) => format!("{}:{}", self.dialect, self.name.as_deref().unwrap_or("")),
        }
    }
}

impl fmt::Debug for DbConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DbConfig")
            .field("enabled", &self.enabled)
            .field("dialect", &self.dialect)
            .field("name", &self.name)
            .field("path", &self.path)
            .field("ip_addr", &self.ip_addr)
            .field("port", &self.port)
            .field("login", &self.login)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .finish()
    }
}

/// How to reach `bconsole`.
#[derive(Debug, Clone, Deserialize)]
pub struct ConsoleConfig {
    #[serde(default = "default_bconsole_path")]
    pub bconsole_path: PathBuf,
    #[serde(default = "default_bconsole_config")]
    pub config_path: PathBuf,
    #[serde(default)]
    pub use_sudo: bool,
}

fn default_bconsole_path() -> PathBuf {
    PathBuf::from("/usr/sbin/bconsole")
}

fn default_bconsole_config() -> PathBuf {
    PathBuf::from("/etc/bacula/bconsole.conf")
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            bconsole_path: default_bconsole_path(),
            config_path: default_bconsole_config(),
            use_sudo: false,
        }
    }
}
