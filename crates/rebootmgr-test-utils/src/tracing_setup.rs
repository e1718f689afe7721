//! Tracing for tests.
//!
//! [`init_test_tracing`] installs one subscriber per process that writes
//! through the test harness, so output only shows for failing tests or with
//! `--nocapture`.

use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is unset.
pub const DEFAULT_TEST_FILTER: &str = "warn,rebootmgr_config=debug,rebootmgr_core=debug";

/// Install the test subscriber. Later calls are ignored.
///
/// ```ignore
/// #[tokio::test]
/// async fn resolves_layers() {
///     rebootmgr_test_utils::tracing_setup::init_test_tracing();
///     tracing::debug!("captured by the harness");
/// }
/// ```
pub fn init_test_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_TEST_FILTER));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}
