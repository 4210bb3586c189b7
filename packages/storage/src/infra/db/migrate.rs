use std::path::Path;
use std::time::Instant;

use sea_orm::{ConnectionTrait, DatabaseBackend, DatabaseConnection, Statement};
use sqlx::migrate::Migrator;
use sqlx::PgPool;
use tracing::{error, info, trace};

use crate::error::StorageError;
use crate::infra::db::diagnostics::storage_counters;

/// Bookkeeping table owned by the sqlx migrator.
const MIGRATIONS_TABLE: &str = "_sqlx_migrations";

/// Pick the migration dialect for this connection. Only Postgres has one.
fn postgres_pool(conn: &DatabaseConnection) -> Result<&PgPool, StorageError> {
    match conn.get_database_backend() {
        DatabaseBackend::Postgres => Ok(conn.get_postgres_connection_pool()),
        other => Err(StorageError::dialect(format!(
            "no migration dialect for {other:?} backend"
        ))),
    }
}

/// Apply every migration in `dir` that is not yet recorded as applied,
/// ascending by the version prefix of its file name.
///
/// Each migration runs and is recorded on its own; if one fails, the ones
/// before it in this run stay applied.
pub async fn run_migrations(conn: &DatabaseConnection, dir: &Path) -> Result<(), StorageError> {
    let pool = postgres_pool(conn)?;

    let migrator = Migrator::new(dir).await.map_err(|e| {
        storage_counters::migration_failed();
        StorageError::migration(
            format!("failed to load migrations from {}", dir.display()),
            e,
        )
    })?;

    let defined = migrator
        .iter()
        .filter(|m| !m.migration_type.is_down_migration())
        .count();
    let applied_before = migration_status(conn).await?.len();

    info!(
        dir = %dir.display(),
        defined = defined,
        applied = applied_before,
        "migrate=start"
    );

    let start = Instant::now();
    if let Err(e) = migrator.run(pool).await {
        storage_counters::migration_failed();
        error!(dir = %dir.display(), error = %e, "migrate=failed");
        return Err(StorageError::migration("failed to run database migrations", e));
    }
    storage_counters::migrator_ran();

    let applied_after = migration_status(conn).await?.len();
    info!(
        applied = applied_after,
        newly_applied = applied_after.saturating_sub(applied_before),
        elapsed_ms = start.elapsed().as_millis(),
        "migrate=done"
    );

    Ok(())
}

/// Versions of successfully applied migrations, ascending. Empty when the
/// bookkeeping table has not been created yet.
pub async fn migration_status(conn: &DatabaseConnection) -> Result<Vec<i64>, StorageError> {
    postgres_pool(conn)?;

    let present = conn
        .query_one(Statement::from_string(
            DatabaseBackend::Postgres,
            format!("SELECT to_regclass('{MIGRATIONS_TABLE}') IS NOT NULL AS present"),
        ))
        .await
        .map_err(|e| StorageError::migration("failed to look up migrations table", e))?
        .map(|row| row.try_get::<bool>("", "present"))
        .transpose()
        .map_err(|e| StorageError::migration("failed to read migrations table lookup", e))?
        .unwrap_or(false);

    if !present {
        trace!(table = MIGRATIONS_TABLE, "migrate=status table_missing");
        return Ok(Vec::new());
    }

    let rows = conn
        .query_all(Statement::from_string(
            DatabaseBackend::Postgres,
            format!("SELECT version FROM {MIGRATIONS_TABLE} WHERE success ORDER BY version"),
        ))
        .await
        .map_err(|e| StorageError::migration("failed to list applied migrations", e))?;

    rows.iter()
        .map(|row| {
            row.try_get::<i64>("", "version")
                .map_err(|e| StorageError::migration("failed to read migration version", e))
        })
        .collect()
}
