/// Storage counters - module-local atomics
pub mod storage_counters {
    use std::sync::atomic::{AtomicUsize, Ordering};

    static OPENED_TOTAL: AtomicUsize = AtomicUsize::new(0);
    static PING_FAILED_TOTAL: AtomicUsize = AtomicUsize::new(0);
    static MIGRATOR_RAN_TOTAL: AtomicUsize = AtomicUsize::new(0);
    static MIGRATION_FAILED_TOTAL: AtomicUsize = AtomicUsize::new(0);
    static PROVISIONED_TOTAL: AtomicUsize = AtomicUsize::new(0);
    static PROVISION_FAILED_TOTAL: AtomicUsize = AtomicUsize::new(0);
    static TORN_DOWN_TOTAL: AtomicUsize = AtomicUsize::new(0);
    static TEARDOWN_FAILED_TOTAL: AtomicUsize = AtomicUsize::new(0);
    static TEARDOWN_ON_DROP_TOTAL: AtomicUsize = AtomicUsize::new(0);

    pub fn opened() {
        OPENED_TOTAL.fetch_add(1, Ordering::Relaxed);
    }

    pub fn ping_failed() {
        PING_FAILED_TOTAL.fetch_add(1, Ordering::Relaxed);
    }

    pub fn migrator_ran() {
        MIGRATOR_RAN_TOTAL.fetch_add(1, Ordering::Relaxed);
    }

    pub fn migration_failed() {
        MIGRATION_FAILED_TOTAL.fetch_add(1, Ordering::Relaxed);
    }

    pub fn provisioned() {
        PROVISIONED_TOTAL.fetch_add(1, Ordering::Relaxed);
    }

    pub fn provision_failed() {
        PROVISION_FAILED_TOTAL.fetch_add(1, Ordering::Relaxed);
    }

    pub fn torn_down() {
        TORN_DOWN_TOTAL.fetch_add(1, Ordering::Relaxed);
    }

    pub fn teardown_failed() {
        TEARDOWN_FAILED_TOTAL.fetch_add(1, Ordering::Relaxed);
    }

    pub fn teardown_on_drop() {
        TEARDOWN_ON_DROP_TOTAL.fetch_add(1, Ordering::Relaxed);
    }

    #[derive(Debug, Clone, Copy)]
    pub struct Snapshot {
        pub opened_total: usize,
        pub ping_failed_total: usize,
        pub migrator_ran_total: usize,
        pub migration_failed_total: usize,
        pub provisioned_total: usize,
        pub provision_failed_total: usize,
        pub torn_down_total: usize,
        pub teardown_failed_total: usize,
        pub teardown_on_drop_total: usize,
    }

    pub fn snapshot() -> Snapshot {
        Snapshot {
            opened_total: OPENED_TOTAL.load(Ordering::Relaxed),
            ping_failed_total: PING_FAILED_TOTAL.load(Ordering::Relaxed),
            migrator_ran_total: MIGRATOR_RAN_TOTAL.load(Ordering::Relaxed),
            migration_failed_total: MIGRATION_FAILED_TOTAL.load(Ordering::Relaxed),
            provisioned_total: PROVISIONED_TOTAL.load(Ordering::Relaxed),
            provision_failed_total: PROVISION_FAILED_TOTAL.load(Ordering::Relaxed),
            torn_down_total: TORN_DOWN_TOTAL.load(Ordering::Relaxed),
            teardown_failed_total: TEARDOWN_FAILED_TOTAL.load(Ordering::Relaxed),
            teardown_on_drop_total: TEARDOWN_ON_DROP_TOTAL.load(Ordering::Relaxed),
        }
    }

    pub fn log_snapshot(context: &str) {
        let s = snapshot();
        tracing::info!(
            context = context,
            opened_total = s.opened_total,
            ping_failed_total = s.ping_failed_total,
            migrator_ran_total = s.migrator_ran_total,
            migration_failed_total = s.migration_failed_total,
            provisioned_total = s.provisioned_total,
            provision_failed_total = s.provision_failed_total,
            torn_down_total = s.torn_down_total,
            teardown_failed_total = s.teardown_failed_total,
            teardown_on_drop_total = s.teardown_on_drop_total,
            "storage_counters_snapshot"
        );
    }

}
