//! Disposable, uniquely named databases for isolated test runs.
//!
//! [`provision`] connects to a provisioning database (any existing database
//! the role may issue `CREATE DATABASE` / `DROP DATABASE` from), creates a
//! fresh database, and hands back an [`EphemeralDatabase`] guard. The guard
//! drops the database exactly once: either through [`EphemeralDatabase::teardown`]
//! or, if that was never called, when the guard goes out of scope (including
//! during a panic).

use std::path::Path;
use std::thread;

use sea_orm::{ConnectionTrait, DatabaseBackend, Statement, Value};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::db::{PoolPurpose, PoolSettings};
use crate::error::StorageError;
use crate::infra::db::conn_string::{with_database_name, ConnectionString};
use crate::infra::db::core::{open_connection_string, StorageHandle};
use crate::infra::db::diagnostics::storage_counters;

/// Prefix shared by every generated database, so leaked ones are easy to spot.
pub const EPHEMERAL_DB_PREFIX: &str = "ephemeral_";

/// `ephemeral_<uuid v4, simple form>`: 122 random bits, 42 characters, well
/// under the 63-byte identifier limit.
pub fn ephemeral_database_name() -> String {
    format!("{EPHEMERAL_DB_PREFIX}{}", Uuid::new_v4().simple())
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// A provisioned database and its cleanup obligation.
///
/// `handle` is dropped before `cleanup`, so the pool is closed by the time the
/// drop-time `DROP DATABASE` runs.
#[derive(Debug)]
pub struct EphemeralDatabase {
    handle: StorageHandle,
    conn_string: ConnectionString,
    cleanup: Cleanup,
}

impl EphemeralDatabase {
    pub fn handle(&self) -> &StorageHandle {
        &self.handle
    }

    pub fn name(&self) -> &str {
        &self.cleanup.name
    }

    /// Connection string pointing at the ephemeral database.
    pub fn connection_string(&self) -> &ConnectionString {
        &self.conn_string
    }

    /// Close the handle, then drop the database from the provisioning connection.
    ///
    /// Fails with `Teardown` if another session is still attached. The guard
    /// stays armed until the drop succeeds, so on failure the drop-time
    /// cleanup evicts the remaining sessions and drops the database anyway.
    pub async fn teardown(self) -> Result<(), StorageError> {
        let EphemeralDatabase {
            handle,
            mut cleanup,
            ..
        } = self;
        cleanup.finish(handle).await
    }
}

/// Create a uniquely named database next to `provisioning` and open a handle
/// on it, applying migrations from `migration_dir` when given.
///
/// Any failure after `CREATE DATABASE` succeeded drops the new database again
/// before the error is returned.
pub async fn provision(
    provisioning: &ConnectionString,
    migration_dir: Option<&Path>,
) -> Result<EphemeralDatabase, StorageError> {
    let name = ephemeral_database_name();
    info!(database = %name, provisioning = %provisioning, "provision=start");

    if let Err(e) = create_database(provisioning, &name).await {
        storage_counters::provision_failed();
        return Err(e);
    }

    let conn_string = with_database_name(provisioning, &name);
    let settings = PoolSettings::for_purpose(PoolPurpose::Ephemeral);
    let handle = match open_connection_string(&conn_string, migration_dir, &settings).await {
        Ok(handle) => handle,
        Err(e) => {
            storage_counters::provision_failed();
            warn!(database = %name, error = %e, "provision=open_failed dropping database");
            if let Err(drop_err) = drop_database(provisioning, &name, DropMode::Evict).await {
                error!(database = %name, error = %drop_err, "Failed to drop database after provisioning error");
            }
            return Err(e);
        }
    };

    storage_counters::provisioned();
    info!(database = %name, "provision=done");

    Ok(EphemeralDatabase {
        handle,
        conn_string,
        cleanup: Cleanup {
            name,
            provisioning: provisioning.clone(),
            armed: true,
        },
    })
}

async fn create_database(provisioning: &ConnectionString, name: &str) -> Result<(), StorageError> {
    let ddl = open_connection_string(
        provisioning,
        None,
        &PoolSettings::for_purpose(PoolPurpose::Ddl),
    )
    .await
    .map_err(|e| match e {
        StorageError::Configuration { .. } => e,
        other => StorageError::provisioning("failed to open provisioning connection", other),
    })?;

    let created = ddl
        .db()
        .execute_unprepared(&format!("CREATE DATABASE {}", quote_ident(name)))
        .await;

    let closed = ddl.close().await;

    created.map_err(|e| StorageError::provisioning(format!("failed to create database '{name}'"), e))?;
    closed.map_err(|e| {
        StorageError::provisioning("failed to close provisioning connection", e)
    })?;
    Ok(())
}

/// How [`drop_database`] treats sessions still attached to the database.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DropMode {
    /// Plain `DROP DATABASE`; Postgres refuses while anyone is connected.
    Strict,
    /// Terminate every other backend on the database first.
    Evict,
}

async fn drop_database(
    provisioning: &ConnectionString,
    name: &str,
    mode: DropMode,
) -> Result<(), StorageError> {
    let ddl = open_connection_string(
        provisioning,
        None,
        &PoolSettings::for_purpose(PoolPurpose::Ddl),
    )
    .await
    .map_err(|e| StorageError::teardown("failed to reopen provisioning connection", e))?;

    let dropped = async {
        if mode == DropMode::Evict {
            let evicted = ddl
                .db()
                .query_all(Statement::from_sql_and_values(
                    DatabaseBackend::Postgres,
                    "SELECT pg_terminate_backend(pid) FROM pg_stat_activity \
                     WHERE datname = $1 AND pid <> pg_backend_pid()",
                    [Value::from(name)],
                ))
                .await
                .map_err(|e| {
                    StorageError::teardown(format!("failed to evict sessions on '{name}'"), e)
                })?;
            if !evicted.is_empty() {
                warn!(database = %name, sessions = evicted.len(), "teardown=evicted");
            }
        }
        ddl.db()
            .execute_unprepared(&format!("DROP DATABASE {}", quote_ident(name)))
            .await
            .map_err(|e| StorageError::teardown(format!("failed to drop database '{name}'"), e))
    }
    .await;

    let closed = ddl.close().await;

    dropped?;
    closed.map_err(|e| StorageError::teardown("failed to close provisioning connection", e))?;
    Ok(())
}

/// Drop-time half of the guard. Runs `DROP DATABASE` at most once, on its own
/// thread and runtime so it works from sync code and from inside a blocked
/// runtime.
///
/// The drop path evicts attached sessions: a pooled connection released on
/// the blocked runtime is only returned by a task that cannot run until this
/// drop finishes, so its backend would otherwise still be attached.
#[derive(Debug)]
struct Cleanup {
    name: String,
    provisioning: ConnectionString,
    armed: bool,
}

impl Cleanup {
    /// Explicit teardown. Disarms only once the database is gone; the close
    /// error, if any, wins over the drop error.
    async fn finish(&mut self, handle: StorageHandle) -> Result<(), StorageError> {
        let closed = handle.close().await.map_err(|e| {
            StorageError::teardown(format!("failed to close handle on '{}'", self.name), e)
        });
        let dropped = drop_database(&self.provisioning, &self.name, DropMode::Strict).await;
        if dropped.is_ok() {
            self.armed = false;
        }

        let result = closed.and(dropped);
        match &result {
            Ok(()) => {
                storage_counters::torn_down();
                info!(database = %self.name, "teardown=done");
            }
            Err(e) => {
                storage_counters::teardown_failed();
                error!(database = %self.name, error = %e, armed = self.armed, "teardown=failed");
            }
        }
        result
    }
}

impl Drop for Cleanup {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        self.armed = false;
        storage_counters::teardown_on_drop();

        if thread::panicking() {
            warn!(database = %self.name, "teardown=on_drop while panicking");
        }

        let name = self.name.clone();
        let provisioning = self.provisioning.clone();
        let outcome = thread::spawn(move || {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .map_err(|e| StorageError::teardown("failed to build cleanup runtime", e))?;
            runtime.block_on(drop_database(&provisioning, &name, DropMode::Evict))
        })
        .join();

        match outcome {
            Ok(Ok(())) => {
                storage_counters::torn_down();
                info!(database = %self.name, "teardown=done on_drop=true");
            }
            Ok(Err(e)) => {
                storage_counters::teardown_failed();
                error!(database = %self.name, error = %e, "teardown=failed on_drop=true");
            }
            Err(_) => {
                storage_counters::teardown_failed();
                error!(database = %self.name, "teardown=failed cleanup thread panicked");
            }
        }
    }
}
