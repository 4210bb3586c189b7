//! Postgres storage bootstrap.
//!
//! Turns a [`ConnectionInfo`] into a pinged, migrated [`StorageHandle`], and
//! provisions disposable [`EphemeralDatabase`]s for isolated test runs.

pub mod config;
pub mod error;
pub mod infra;

pub use config::db::{ConnectionInfo, PoolPurpose, PoolSettings};
pub use error::StorageError;
pub use infra::db::{
    build, migration_status, open, open_connection_string, open_with, provision, run_migrations,
    with_database_name, ConnectionString, EphemeralDatabase, StorageHandle,
};

#[cfg(test)]
#[ctor::ctor]
fn init_test_logging() {
    storage_test_support::logging::init();
}
