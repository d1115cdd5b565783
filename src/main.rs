//! Standalone orchestrator.
//!
//! Runs with the default configuration. `APP_CONFIG` may name a TOML file of
//! overrides; `APP_ENV=production` switches to JSON logs and the combined
//! access log format.

use std::path::PathBuf;

use api_orchestrator::config::loader::load_overrides;
use api_orchestrator::config::Environment;
use api_orchestrator::lifecycle::shutdown_signal;
use api_orchestrator::observability::logging::{init_tracing, DEFAULT_FILTER};
use api_orchestrator::Orchestrator;
use serde_json::Value;

/// Environment variable naming an optional TOML overrides file.
const CONFIG_VAR: &str = "APP_CONFIG";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let environment = Environment::from_env();
    init_tracing(DEFAULT_FILTER, environment.is_production());

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        environment = ?environment,
        "api-orchestrator starting"
    );

    let overrides = match std::env::var_os(CONFIG_VAR) {
        Some(path) => {
            let path = PathBuf::from(path);
            tracing::info!(path = %path.display(), "Loading configuration overrides");
            load_overrides(&path)?
        }
        None => Value::Null,
    };

    let mut orchestrator = Orchestrator::builder()
        .environment(environment)
        .overrides(overrides)
        .build()?;
    let server = orchestrator.start().await?;

    shutdown_signal().await;
    server.shutdown();
    server.wait().await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
