//! Log capture for storage tests.

use once_cell::sync::OnceCell;
use tracing_subscriber::EnvFilter;

/// Checked before `RUST_LOG`, so storage logs can be raised without flooding
/// output from every other crate.
pub const TEST_LOG_VAR: &str = "TEST_LOG";

/// Used when neither variable is set: bootstrap and teardown warnings from this
/// workspace, errors from the driver.
const DEFAULT_DIRECTIVES: &str = "warn,sqlx=error";

static SUBSCRIBER: OnceCell<bool> = OnceCell::new();

fn filter() -> EnvFilter {
    EnvFilter::try_from_env(TEST_LOG_VAR)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVES))
}

/// Install the test subscriber once per process. Returns whether this crate's
/// subscriber is the active one; `false` means another global subscriber won.
pub fn init() -> bool {
    *SUBSCRIBER.get_or_init(|| {
        tracing_subscriber::fmt()
            .with_env_filter(filter())
            .with_test_writer()
            .with_target(true)
            .without_time()
            .try_init()
            .is_ok()
    })
}
