//! Database infrastructure - connection strings, bootstrap, migrations, and ephemeral test databases.

pub mod conn_string;
pub mod core;
pub mod diagnostics;
pub mod ephemeral;
pub mod migrate;

pub use conn_string::{build, with_database_name, ConnectionString};
pub use self::core::{open, open_connection_string, open_with, StorageHandle};
pub use diagnostics::storage_counters;
pub use ephemeral::{ephemeral_database_name, provision, EphemeralDatabase, EPHEMERAL_DB_PREFIX};
pub use migrate::{migration_status, run_migrations};
