//! Logging setup helpers.
//!
//! The crate is a library: it never installs a global `tracing` subscriber
//! on its own. This module only provides a convenience initializer for
//! tests, examples and benchmarks, mirroring the teacher codebase's
//! `tracing-subscriber` dev usage.

use std::sync::Once;

static INIT: Once = Once::new();

/// Install a `tracing-subscriber` `fmt` layer once, reading filter
/// directives from `RUST_LOG` (defaulting to `info`). Safe to call from
/// every test — subsequent calls are no-ops.
pub fn init_test_subscriber() {
    INIT.call_once(|| {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}
