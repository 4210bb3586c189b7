use std::path::Path;

use sea_orm::{DatabaseConnection, SqlxPostgresConnector};
use sqlx::postgres::PgPoolOptions;
use tracing::{info, warn};

use crate::config::db::{ConnectionInfo, PoolPurpose, PoolSettings};
use crate::error::StorageError;
use crate::infra::db::conn_string::{build, ConnectionString, PgTarget};
use crate::infra::db::diagnostics::storage_counters;
use crate::infra::db::migrate::run_migrations;

/// One live, verified (and optionally migrated) Postgres pool.
///
/// Only ever constructed after every bootstrap step succeeded; the caller owns
/// it and is expected to call [`StorageHandle::close`].
#[derive(Debug)]
pub struct StorageHandle {
    conn: DatabaseConnection,
    database: String,
}

impl StorageHandle {
    /// Borrow the underlying connection for raw statements.
    pub fn db(&self) -> &DatabaseConnection {
        &self.conn
    }

    pub fn database_name(&self) -> &str {
        &self.database
    }

    pub async fn ping(&self) -> Result<(), StorageError> {
        self.conn
            .ping()
            .await
            .map_err(|e| StorageError::connectivity("failed to ping database", e))
    }

    /// Close every pooled connection and wait for them to terminate.
    pub async fn close(self) -> Result<(), StorageError> {
        let database = self.database;
        self.conn
            .close()
            .await
            .map_err(|e| StorageError::connectivity(format!("failed to close pool for '{database}'"), e))?;
        info!(database = %database, "pool=closed");
        Ok(())
    }

    /// Handle over a lazy pool that has never dialed the server.
    #[cfg(test)]
    pub(crate) fn detached(conn: &ConnectionString) -> Result<Self, StorageError> {
        let target = conn.pg_target()?;
        let database = target.options.get_database().unwrap_or_default().to_string();
        Ok(Self {
            conn: lazy_pool(target, &PoolSettings::for_purpose(PoolPurpose::Ddl)),
            database,
        })
    }
}

/// Open, ping and (when `info.migration_dir` is set) migrate.
pub async fn open(info: &ConnectionInfo) -> Result<StorageHandle, StorageError> {
    open_with(info, &PoolSettings::for_purpose(PoolPurpose::Runtime)).await
}

pub async fn open_with(
    info: &ConnectionInfo,
    settings: &PoolSettings,
) -> Result<StorageHandle, StorageError> {
    let conn = build(info);
    open_connection_string(&conn, info.migration_dir.as_deref(), settings).await
}

/// Bootstrap from an already rendered connection string.
///
/// On any failure after the pool exists, the pool is closed here before the
/// error is returned.
pub async fn open_connection_string(
    conn: &ConnectionString,
    migration_dir: Option<&Path>,
    settings: &PoolSettings,
) -> Result<StorageHandle, StorageError> {
    let target = conn.pg_target()?;
    let database = target.options.get_database().unwrap_or_default().to_string();
    let pool = lazy_pool(target, settings);

    if let Err(e) = pool.ping().await {
        storage_counters::ping_failed();
        warn!(conn = %conn, error = %e, "open=ping_failed");
        close_quietly(pool, &database).await;
        return Err(StorageError::connectivity(
            format!("failed to ping database '{database}'"),
            e,
        ));
    }

    if let Some(dir) = migration_dir.filter(|dir| !dir.as_os_str().is_empty()) {
        if let Err(e) = run_migrations(&pool, dir).await {
            close_quietly(pool, &database).await;
            return Err(e);
        }
    }

    storage_counters::opened();
    info!(conn = %conn, "open=ready");

    Ok(StorageHandle {
        conn: pool,
        database,
    })
}

/// Pool with no connections yet; the first query dials the server.
fn lazy_pool(target: PgTarget, settings: &PoolSettings) -> DatabaseConnection {
    let mut options = PgPoolOptions::new()
        .max_connections(settings.max_connections)
        .min_connections(settings.min_connections)
        .max_lifetime(settings.max_lifetime);
    if let Some(timeout) = target.connect_timeout {
        options = options.acquire_timeout(timeout);
    }

    SqlxPostgresConnector::from_sqlx_postgres_pool(options.connect_lazy_with(target.options))
}

async fn close_quietly(pool: DatabaseConnection, database: &str) {
    if let Err(e) = pool.close().await {
        warn!(database = %database, error = %e, "Failed to close pool after bootstrap error");
    }
}
