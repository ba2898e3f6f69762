//! Structured logging setup.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Default filter when `RUST_LOG` is not set.
pub fn default_filter(verbose: bool) -> &'static str {
    if verbose {
        "repo_mirror=debug,tower_http=debug"
    } else {
        "repo_mirror=info,tower_http=warn"
    }
}

/// Install the global tracing subscriber. `RUST_LOG` takes precedence.
pub fn init_logging(verbose: bool) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter(verbose).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// nginx `error_log` level matching the mirror's verbosity.
pub fn proxy_log_level(verbose: bool) -> &'static str {
    if verbose {
        "debug"
    } else {
        "warn"
    }
}
