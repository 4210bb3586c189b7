//! Test environment: which Postgres server database-backed tests run against.

use once_cell::sync::Lazy;

/// Variable holding the provisioning connection string, e.g.
/// `user=postgres host=localhost port=5432 dbname=postgres connect_timeout=5 sslmode=disable password=postgres`.
pub const PROVISIONING_VAR: &str = "DATABASE_CONNECTION";

static LOADED: Lazy<()> = Lazy::new(|| {
    dotenvy::from_filename(".env.test").ok();
});

/// Load `.env.test` once, without failing when it is absent.
pub fn load_test_env() {
    Lazy::force(&LOADED);
}

/// The provisioning connection string, or `None` when database-backed tests
/// should be skipped.
pub fn provisioning_connection() -> Option<String> {
    load_test_env();
    std::env::var(PROVISIONING_VAR)
        .ok()
        .filter(|value| !value.trim().is_empty())
}
