use storage::{migration_status, open_connection_string, provision, run_migrations, PoolSettings, StorageError};
use storage_test_support::migrations::MigrationDir;

use crate::support::{
    fixture_migrations, provisioning, table_exists, user_table_count, FIXTURE_VERSIONS,
};

#[tokio::test]
async fn migrations_are_idempotent() {
    let Some(provisioning) = provisioning() else {
        return;
    };
    let eph = provision(&provisioning, Some(&fixture_migrations()))
        .await
        .expect("provision");
    let before = migration_status(eph.handle().db()).await.expect("status");
    assert_eq!(before, FIXTURE_VERSIONS.to_vec());

    run_migrations(eph.handle().db(), &fixture_migrations())
        .await
        .expect("second run is a no-op");
    run_migrations(eph.handle().db(), &fixture_migrations())
        .await
        .expect("third run is a no-op");

    let after = migration_status(eph.handle().db()).await.expect("status");
    assert_eq!(before, after, "migration count changed on rerun");
    assert_eq!(user_table_count(eph.handle()).await, 2);

    eph.teardown().await.expect("teardown");
}

#[tokio::test]
async fn migrations_apply_in_version_order() {
    let Some(provisioning) = provisioning() else {
        return;
    };
    // Written newest first; version 2 only works after version 1.
    let dir = MigrationDir::new()
        .unwrap()
        .with(2, "add_widget_color", "ALTER TABLE widgets ADD COLUMN color TEXT;")
        .unwrap()
        .with(1, "create_widgets", "CREATE TABLE widgets (id BIGINT PRIMARY KEY);")
        .unwrap();

    let eph = provision(&provisioning, None).await.expect("provision");
    assert!(migration_status(eph.handle().db()).await.unwrap().is_empty());

    run_migrations(eph.handle().db(), dir.path()).await.expect("migrate");
    assert_eq!(migration_status(eph.handle().db()).await.unwrap(), vec![1, 2]);

    eph.teardown().await.expect("teardown");
}

#[tokio::test]
async fn failed_step_leaves_earlier_steps_applied() {
    let Some(provisioning) = provisioning() else {
        return;
    };
    let dir = MigrationDir::new()
        .unwrap()
        .with(1, "create_widgets", "CREATE TABLE widgets (id BIGINT PRIMARY KEY);")
        .unwrap()
        .with(2, "broken", "CREATE TABLE gadgets (id BIGINT PRIMARY KEY, oops);")
        .unwrap();

    let eph = provision(&provisioning, None).await.expect("provision");
    let err = run_migrations(eph.handle().db(), dir.path()).await.unwrap_err();
    assert!(matches!(err, StorageError::Migration { .. }), "got {err}");

    assert_eq!(migration_status(eph.handle().db()).await.unwrap(), vec![1]);
    assert!(table_exists(eph.handle(), "widgets").await);
    assert!(!table_exists(eph.handle(), "gadgets").await);

    eph.teardown().await.expect("teardown");
}

#[tokio::test]
async fn missing_directory_is_migration_error() {
    let Some(provisioning) = provisioning() else {
        return;
    };
    let eph = provision(&provisioning, None).await.expect("provision");

    let missing = std::env::temp_dir().join("storage-no-such-migrations-dir");
    let err = run_migrations(eph.handle().db(), &missing).await.unwrap_err();
    assert_eq!(err.code(), "MIGRATION");

    eph.teardown().await.expect("teardown");
}

#[tokio::test]
async fn open_does_not_return_handle_when_migration_fails() {
    let Some(provisioning) = provisioning() else {
        return;
    };
    let dir = MigrationDir::new()
        .unwrap()
        .with(1, "broken", "THIS IS NOT SQL;")
        .unwrap();

    let eph = provision(&provisioning, None).await.expect("provision");
    let err = open_connection_string(
        eph.connection_string(),
        Some(dir.path()),
        &PoolSettings::default(),
    )
    .await
    .unwrap_err();
    assert_eq!(err.code(), "MIGRATION");

    // The failed open closed its own pool, so the drop is not blocked.
    eph.teardown().await.expect("teardown");
}
