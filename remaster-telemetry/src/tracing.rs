//! Tracing initialization for reload runs and tests.

use std::sync::Once;

use tracing_subscriber::EnvFilter;

/// Default directive applied when `RUST_LOG` is not set.
const DEFAULT_DIRECTIVE: &str = "info";

static INIT: Once = Once::new();

/// Initializes the global tracing subscriber for a reload run.
///
/// Respects `RUST_LOG` for filtering and falls back to `info`. Safe to call
/// multiple times; only the first call installs the subscriber.
pub fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVE)),
            )
            .init();
    });
}

/// Initializes tracing for tests.
///
/// Uses the test writer so output is captured per test, and tolerates being
/// called from every test in the binary.
pub fn init_test_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVE)),
            )
            .with_test_writer()
            .init();
    });
}
