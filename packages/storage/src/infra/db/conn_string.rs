//! Keyword/value connection strings (`user=a host=b port=5432 ...`).
//!
//! Strings are split on single spaces, then each token on its first `=`.
//! Values are never quoted or escaped, so a value containing a space cannot be
//! represented.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use sqlx::postgres::{PgConnectOptions, PgSslMode};

use crate::config::db::ConnectionInfo;
use crate::error::StorageError;

const DBNAME_PREFIX: &str = "dbname=";
const PASSWORD_PREFIX: &str = "password=";

#[derive(Clone, PartialEq, Eq, Hash)]
pub struct ConnectionString(String);

/// Render `info` in the fixed token order
/// `user host port dbname connect_timeout sslmode [password]`.
pub fn build(info: &ConnectionInfo) -> ConnectionString {
    let mut tokens = vec![
        format!("user={}", info.user),
        format!("host={}", info.host),
        format!("port={}", info.port),
        format!("dbname={}", info.name),
        format!("connect_timeout={}", info.connect_timeout),
        format!("sslmode={}", info.ssl_mode),
    ];

    if !info.password.is_empty() {
        tokens.push(format!("password={}", info.password));
    }

    ConnectionString(tokens.join(" "))
}

/// Replace the `dbname` token wherever it appears, leaving every other token
/// (and its position) untouched.
pub fn with_database_name(conn: &ConnectionString, new_name: &str) -> ConnectionString {
    let replaced: Vec<String> = conn
        .0
        .split(' ')
        .map(|token| {
            if token.starts_with(DBNAME_PREFIX) {
                format!("{DBNAME_PREFIX}{new_name}")
            } else {
                token.to_string()
            }
        })
        .collect();

    ConnectionString(replaced.join(" "))
}

/// Driver options resolved from a connection string.
pub(crate) struct PgTarget {
    pub(crate) options: PgConnectOptions,
    pub(crate) connect_timeout: Option<Duration>,
}

impl ConnectionString {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `(key, value)` pairs in order of appearance. Empty tokens are skipped.
    pub fn tokens(&self) -> impl Iterator<Item = Result<(&str, &str), StorageError>> {
        self.0.split(' ').filter(|t| !t.is_empty()).map(|token| {
            token.split_once('=').ok_or_else(|| {
                StorageError::config(format!(
                    "connection string token '{}' has no '='",
                    redact_token(token)
                ))
            })
        })
    }

    /// Value of the first `dbname` token, if any.
    pub fn database_name(&self) -> Option<&str> {
        self.0
            .split(' ')
            .find_map(|token| token.strip_prefix(DBNAME_PREFIX))
    }

    /// The string with any password value masked, safe for logs.
    pub fn redacted(&self) -> String {
        self.0
            .split(' ')
            .map(redact_token)
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Parse back into a [`ConnectionInfo`]. Missing `sslmode` defaults to
    /// `require`; the migration directory is never part of the string.
    pub fn parse_info(&self) -> Result<ConnectionInfo, StorageError> {
        let mut info = ConnectionInfo {
            ssl_mode: "require".to_string(),
            ..Default::default()
        };

        for token in self.tokens() {
            let (key, value) = token?;
            let value = value.to_string();
            match key {
                "user" => info.user = value,
                "host" => info.host = value,
                "port" => info.port = value,
                "dbname" => info.name = value,
                "password" => info.password = value,
                "connect_timeout" => info.connect_timeout = value,
                "sslmode" => info.ssl_mode = value,
                other => {
                    return Err(StorageError::config(format!(
                        "unsupported connection parameter '{other}'"
                    )))
                }
            }
        }

        Ok(info)
    }

    /// Resolve driver connect options. Performs no I/O; this is the step
    /// where malformed strings are rejected.
    pub(crate) fn pg_target(&self) -> Result<PgTarget, StorageError> {
        let mut options = PgConnectOptions::new_without_pgpass();
        let mut connect_timeout = None;

        for token in self.tokens() {
            let (key, value) = token?;
            // Empty values fall back to driver defaults.
            if value.is_empty() {
                continue;
            }
            options = match key {
                "user" => options.username(value),
                "password" => options.password(value),
                "host" => options.host(value),
                "dbname" => options.database(value),
                "application_name" => options.application_name(value),
                "port" => {
                    let port = value.parse::<u16>().map_err(|e| {
                        StorageError::config(format!("invalid port '{value}': {e}"))
                    })?;
                    options.port(port)
                }
                "sslmode" => {
                    let mode = PgSslMode::from_str(value).map_err(|e| {
                        StorageError::config(format!("invalid sslmode '{value}': {e}"))
                    })?;
                    options.ssl_mode(mode)
                }
                "connect_timeout" => {
                    let secs = value.parse::<u64>().map_err(|e| {
                        StorageError::config(format!("invalid connect_timeout '{value}': {e}"))
                    })?;
                    // Zero means wait indefinitely, same as libpq.
                    connect_timeout = (secs > 0).then(|| Duration::from_secs(secs));
                    options
                }
                other => {
                    return Err(StorageError::config(format!(
                        "unsupported connection parameter '{other}'"
                    )))
                }
            };
        }

        Ok(PgTarget {
            options,
            connect_timeout,
        })
    }
}

fn redact_token(token: &str) -> &str {
    if token.starts_with(PASSWORD_PREFIX) {
        "password=***"
    } else {
        token
    }
}

impl fmt::Display for ConnectionString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.redacted())
    }
}

impl fmt::Debug for ConnectionString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ConnectionString").field(&self.redacted()).finish()
    }
}

impl From<String> for ConnectionString {
    fn from(raw: String) -> Self {
        Self(raw)
    }
}

impl From<&str> for ConnectionString {
    fn from(raw: &str) -> Self {
        Self(raw.to_string())
    }
}

impl From<&ConnectionInfo> for ConnectionString {
    fn from(info: &ConnectionInfo) -> Self {
        build(info)
    }
}
