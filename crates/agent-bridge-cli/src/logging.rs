//! Logging setup.

use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is not set.
pub const fn default_filter(verbose: bool) -> &'static str {
    if verbose {
        "info,agent_bridge_core=debug,agent_bridge_proxy=debug,agent_bridge_cli=debug,tower_http=debug"
    } else {
        "info"
    }
}

/// Install the global fmt subscriber. `RUST_LOG` wins over `verbose`.
pub fn init_logging(verbose: bool) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter(verbose)));

    tracing_subscriber::fmt().with_env_filter(env_filter).init();
}
