//! Tracing initialization for binaries and tests.

use std::sync::Once;

use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Default filter directive applied when `RUST_LOG` is unset.
const DEFAULT_FILTER: &str = "info";

// Tracing may only install one global subscriber per process; tests initialize from many
// entry points, so initialization is guarded.
static INIT_TEST_TRACING: Once = Once::new();

/// Initializes the process-wide tracing subscriber.
///
/// The filter is taken from `RUST_LOG` when set, and falls back to `info` otherwise.
/// Call once at startup, before any spans or events are emitted.
pub fn init_tracing() {
    tracing_subscriber::registry()
        .with(env_filter())
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Initializes tracing for tests.
///
/// Safe to call from every test; only the first call installs the subscriber. Output is
/// routed through the test writer so it is captured per test.
pub fn init_test_tracing() {
    INIT_TEST_TRACING.call_once(|| {
        let _ = tracing_subscriber::registry()
            .with(env_filter())
            .with(tracing_subscriber::fmt::layer().with_test_writer())
            .try_init();
    });
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}
