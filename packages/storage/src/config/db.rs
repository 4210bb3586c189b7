use std::env;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::StorageError;
use crate::infra::db::conn_string::ConnectionString;

/// Credentials and target for one Postgres database.
///
/// Every field is carried verbatim: the builder never validates contents, so
/// empty or garbage values only surface when a pool is opened.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct ConnectionInfo {
    pub user: String,
    pub host: String,
    pub port: String,
    pub name: String,
    /// Rendered only when non-empty.
    pub password: String,
    pub connect_timeout: String,
    pub ssl_mode: String,
    /// Migrations are applied on open when this is set to a non-empty path.
    pub migration_dir: Option<PathBuf>,
}

impl fmt::Debug for ConnectionInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let password = if self.password.is_empty() { "" } else { "***" };
        f.debug_struct("ConnectionInfo")
            .field("user", &self.user)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("name", &self.name)
            .field("password", &password)
            .field("connect_timeout", &self.connect_timeout)
            .field("ssl_mode", &self.ssl_mode)
            .field("migration_dir", &self.migration_dir)
            .finish()
    }
}

impl ConnectionInfo {
    /// Load connection parameters from `DB_*` environment variables.
    ///
    /// `DB_USER` and `DB_NAME` are required; host, port, connect timeout and
    /// SSL mode fall back to `localhost`, `5432`, `5` and `require`.
    pub fn from_env() -> Result<Self, StorageError> {
        Ok(Self {
            user: must_var("DB_USER")?,
            host: var_or("DB_HOST", "localhost"),
            port: var_or("DB_PORT", "5432"),
            name: must_var("DB_NAME")?,
            password: env::var("DB_PASSWORD").unwrap_or_default(),
            connect_timeout: var_or("DB_CONNECT_TIMEOUT", "5"),
            ssl_mode: var_or("DB_SSLMODE", "require"),
            migration_dir: env::var("DB_MIGRATION_DIR")
                .ok()
                .filter(|dir| !dir.is_empty())
                .map(PathBuf::from),
        })
    }

    /// Render this record as a keyword/value connection string.
    pub fn connection_string(&self) -> ConnectionString {
        crate::infra::db::conn_string::build(self)
    }
}

impl FromStr for ConnectionInfo {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ConnectionString::new(s).parse_info()
    }
}

/// What a pool is going to be used for; each purpose gets its own sizing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolPurpose {
    /// Long-lived application handle
    Runtime,
    /// Single session used only for CREATE/DROP DATABASE
    Ddl,
    /// Handle on a disposable test database
    Ephemeral,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolSettings {
    pub max_connections: u32,
    pub min_connections: u32,
    pub max_lifetime: Option<Duration>,
}

impl PoolSettings {
    pub fn for_purpose(purpose: PoolPurpose) -> Self {
        match purpose {
            PoolPurpose::Runtime => Self {
                max_connections: 10,
                min_connections: 0,
                max_lifetime: Some(Duration::from_secs(30 * 60)),
            },
            PoolPurpose::Ddl => Self {
                max_connections: 1,
                min_connections: 0,
                max_lifetime: None,
            },
            PoolPurpose::Ephemeral => Self {
                max_connections: 50,
                min_connections: 0,
                max_lifetime: Some(Duration::from_secs(60)),
            },
        }
    }
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self::for_purpose(PoolPurpose::Runtime)
    }
}

fn var_or(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

/// Get required environment variable or return error
fn must_var(name: &str) -> Result<String, StorageError> {
    env::var(name).map_err(|_| {
        StorageError::config(format!("Required environment variable '{name}' is not set"))
    })
}
