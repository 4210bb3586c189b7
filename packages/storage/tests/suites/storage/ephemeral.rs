use std::collections::HashSet;

use futures::future::join_all;
use storage::infra::db::EPHEMERAL_DB_PREFIX;
use storage::{open_connection_string, provision, PoolSettings, StorageError};

use crate::support::{
    fixture_migrations, provisioning, scalar_i64, table_exists, user_table_count,
};

async fn assert_database_gone(conn: &storage::ConnectionString) {
    let err = open_connection_string(conn, None, &PoolSettings::default())
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::Connectivity { .. }), "got {err}");
    assert!(err.to_string().contains("does not exist"), "got {err}");
}

#[tokio::test]
async fn provision_without_migrations_has_no_schema() {
    let Some(provisioning) = provisioning() else {
        return;
    };
    let eph = provision(&provisioning, None).await.expect("provision");

    assert!(eph.name().starts_with(EPHEMERAL_DB_PREFIX));
    assert_eq!(eph.connection_string().database_name(), Some(eph.name()));
    assert_eq!(eph.handle().database_name(), eph.name());
    assert_eq!(scalar_i64(eph.handle(), "SELECT 1::BIGINT AS n").await, 1);
    assert_eq!(user_table_count(eph.handle()).await, 0);

    eph.teardown().await.expect("teardown");
}

#[tokio::test]
async fn provision_with_migrations_has_final_schema() {
    let Some(provisioning) = provisioning() else {
        return;
    };
    let eph = provision(&provisioning, Some(&fixture_migrations()))
        .await
        .expect("provision");

    assert!(table_exists(eph.handle(), "accounts").await);
    assert!(table_exists(eph.handle(), "sessions").await);
    assert_eq!(user_table_count(eph.handle()).await, 2);

    eph.teardown().await.expect("teardown");
}

#[tokio::test]
async fn teardown_removes_database() {
    let Some(provisioning) = provisioning() else {
        return;
    };
    let eph = provision(&provisioning, None).await.expect("provision");
    let conn = eph.connection_string().clone();

    eph.teardown().await.expect("teardown");
    assert_database_gone(&conn).await;
}

#[tokio::test]
async fn dropping_guard_removes_database() {
    let Some(provisioning) = provisioning() else {
        return;
    };
    let conn = {
        let eph = provision(&provisioning, None).await.expect("provision");
        eph.connection_string().clone()
    };

    assert_database_gone(&conn).await;
}

#[tokio::test]
async fn guard_cleans_up_after_panic() {
    let Some(provisioning) = provisioning() else {
        return;
    };
    let eph = provision(&provisioning, None).await.expect("provision");
    let conn = eph.connection_string().clone();

    let outcome = std::thread::spawn(move || {
        let _eph = eph;
        panic!("test body failed");
    })
    .join();
    assert!(outcome.is_err());

    assert_database_gone(&conn).await;
}

#[tokio::test]
async fn teardown_fails_while_database_in_use() {
    let Some(provisioning) = provisioning() else {
        return;
    };
    let eph = provision(&provisioning, None).await.expect("provision");
    let conn = eph.connection_string().clone();

    let squatter = open_connection_string(&conn, None, &PoolSettings::default())
        .await
        .expect("second handle");

    let err = eph.teardown().await.unwrap_err();
    assert!(matches!(err, StorageError::Teardown { .. }), "got {err}");
    assert!(err.to_string().contains("drop database"), "got {err}");

    // The guard stayed armed, so its drop evicted the squatter and finished the job.
    assert!(squatter.ping().await.is_err());
    let _ = squatter.close().await;
    assert_database_gone(&conn).await;
}

/// Several hundred live provisions, in chunks so the burst stays under the
/// server's connection limit. The 1000-way name property is covered by the
/// unit test on name generation.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_provisions_are_isolated() {
    const TOTAL: usize = 256;
    const CHUNK: usize = 16;

    let Some(provisioning) = provisioning() else {
        return;
    };

    let mut names = HashSet::new();
    for _ in 0..TOTAL / CHUNK {
        let results = join_all((0..CHUNK).map(|_| provision(&provisioning, None))).await;
        let databases: Vec<_> = results
            .into_iter()
            .map(|r| r.expect("provision"))
            .collect();

        for db in &databases {
            assert!(names.insert(db.name().to_string()), "duplicate {}", db.name());
        }

        let teardowns = join_all(databases.into_iter().map(|db| db.teardown())).await;
        for result in teardowns {
            result.expect("teardown");
        }
    }
    assert_eq!(names.len(), TOTAL);
}
