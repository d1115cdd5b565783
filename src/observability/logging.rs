//! Structured logging setup for the binary.

use tracing_subscriber::{filter::EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt, Registry};

/// Default filter when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "api_orchestrator=info,tower_http=info";

/// Install the global subscriber.
///
/// `RUST_LOG` takes precedence over `level`. Returns `false` when a
/// subscriber was already installed (e.g. by a test harness).
pub fn init_tracing(level: &str, json: bool) -> bool {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let installed = if json {
        Registry::default()
            .with(env_filter)
            .with(fmt::layer().json().with_target(true).with_current_span(false))
            .try_init()
            .is_ok()
    } else {
        Registry::default()
            .with(env_filter)
            .with(fmt::layer().with_target(true))
            .try_init()
            .is_ok()
    };

    if installed {
        tracing::debug!(level, json, "Tracing initialized");
    }
    installed
}
