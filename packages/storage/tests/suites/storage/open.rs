use sea_orm::{ConnectionTrait, DatabaseBackend, Statement};
use storage::{open, provision, with_database_name, ConnectionInfo, StorageError};

use crate::support::{fixture_migrations, provisioning, table_exists, FIXTURE_VERSIONS};

#[tokio::test]
async fn open_pings_and_serves_queries() {
    let Some(provisioning) = provisioning() else {
        return;
    };
    let info = provisioning.parse_info().expect("parse provisioning string");

    let handle = open(&info).await.expect("open");
    handle.ping().await.expect("ping");
    let ok = handle
        .db()
        .execute(Statement::from_string(DatabaseBackend::Postgres, "SELECT 1"))
        .await;
    assert!(ok.is_ok(), "basic SELECT 1 should succeed");
    assert_eq!(handle.database_name(), info.name);

    handle.close().await.expect("close");
}

#[tokio::test]
async fn open_unknown_database_is_connectivity_error() {
    let Some(provisioning) = provisioning() else {
        return;
    };
    let missing = with_database_name(&provisioning, "definitely_not_here_9f2c");
    let info = missing.parse_info().expect("parse");

    let err = open(&info).await.unwrap_err();
    assert!(matches!(err, StorageError::Connectivity { .. }), "got {err}");
    assert!(err.to_string().contains("does not exist"), "got {err}");
}

#[tokio::test]
async fn open_with_migration_dir_migrates() {
    let Some(provisioning) = provisioning() else {
        return;
    };
    // Bootstrap the empty ephemeral database through the ConnectionInfo path.
    let eph = provision(&provisioning, None).await.expect("provision");
    let info = ConnectionInfo {
        migration_dir: Some(fixture_migrations()),
        ..eph.connection_string().parse_info().expect("parse")
    };

    let handle = open(&info).await.expect("open with migrations");
    assert!(table_exists(&handle, "accounts").await);
    assert!(table_exists(&handle, "sessions").await);
    assert_eq!(
        storage::migration_status(handle.db()).await.expect("status"),
        FIXTURE_VERSIONS.to_vec()
    );

    handle.close().await.expect("close");
    eph.teardown().await.expect("teardown");
}
