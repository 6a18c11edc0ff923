use std::sync::Once;

use tracing_subscriber::EnvFilter;

/// Installs a fmt subscriber that writes through the libtest capture.
///
/// Respects `RUST_LOG`, falling back to `default_level`. Safe to call from
/// every test; only the first call installs anything.
pub fn init_test_tracing(default_level: &str) {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(default_level))
            .unwrap_or_else(|_| EnvFilter::new("info"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_test_writer()
            .try_init();
    });
}
