// ABOUTME: Tracing subscriber setup for the evald binary

use tracing_subscriber::EnvFilter;

use evald_config::defaults;

/// Install the global subscriber. `RUST_LOG` overrides the default filter.
pub fn init() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(defaults::LOG_FILTER)),
        )
        .with_target(false)
        .compact()
        .init();
}
