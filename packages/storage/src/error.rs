use sea_orm::DbErr;
use thiserror::Error;

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Failure taxonomy for the bootstrap path. Every variant names the phase that
/// failed; the wrapped cause (when there is one) is kept as the error source.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Malformed connection parameters. Never retried.
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// The database could not be reached or rejected the session.
    #[error("Connectivity error: {message}: {source}")]
    Connectivity {
        message: String,
        #[source]
        source: DbErr,
    },

    /// The connection's engine has no migration dialect.
    #[error("Dialect error: {message}")]
    Dialect { message: String },

    /// A migration step failed to load or apply; the schema may be partially migrated.
    #[error("Migration error: {message}: {source}")]
    Migration {
        message: String,
        #[source]
        source: BoxError,
    },

    #[error("Provisioning error: {message}: {source}")]
    Provisioning {
        message: String,
        #[source]
        source: BoxError,
    },

    #[error("Teardown error: {message}: {source}")]
    Teardown {
        message: String,
        #[source]
        source: BoxError,
    },
}

impl StorageError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn connectivity(message: impl Into<String>, source: DbErr) -> Self {
        Self::Connectivity {
            message: message.into(),
            source,
        }
    }

    pub fn dialect(message: impl Into<String>) -> Self {
        Self::Dialect {
            message: message.into(),
        }
    }

    pub fn migration(message: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self::Migration {
            message: message.into(),
            source: source.into(),
        }
    }

    pub fn provisioning(message: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self::Provisioning {
            message: message.into(),
            source: source.into(),
        }
    }

    pub fn teardown(message: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self::Teardown {
            message: message.into(),
            source: source.into(),
        }
    }

    /// Stable code for logs and assertions.
    pub fn code(&self) -> &'static str {
        match self {
            StorageError::Configuration { .. } => "CONFIGURATION",
            StorageError::Connectivity { .. } => "CONNECTIVITY",
            StorageError::Dialect { .. } => "DIALECT",
            StorageError::Migration { .. } => "MIGRATION",
            StorageError::Provisioning { .. } => "PROVISIONING",
            StorageError::Teardown { .. } => "TEARDOWN",
        }
    }

    /// Only connectivity failures are transient. Retry policy belongs to the caller.
    pub fn is_retryable(&self) -> bool {
        matches!(self, StorageError::Connectivity { .. })
    }
}
