//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate paths and required values
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Runs after merging, before the config is accepted by the orchestrator

use crate::config::schema::OrchestratorConfig;
use crate::error::ConfigError;

/// Validate a merged configuration.
pub fn validate_config(config: &OrchestratorConfig) -> Result<(), ConfigError> {
    let mut errors = Vec::new();

    if config.listen.host.trim().is_empty() {
        errors.push("listen.host cannot be empty".to_string());
    }

    if !config.api_path.starts_with('/') {
        errors.push(format!("api_path '{}' must start with '/'", config.api_path));
    }

    if !config.realtime.path.starts_with('/') || config.realtime.path == "/" {
        errors.push(format!(
            "realtime.path '{}' must start with '/' and not be the root",
            config.realtime.path
        ));
    }

    let session = &config.security.session_options;
    if session.secret.is_empty() {
        errors.push("session secret cannot be empty".to_string());
    }
    if session.name.trim().is_empty() {
        errors.push("session cookie name cannot be empty".to_string());
    }

    if config.body_limit == 0 {
        errors.push("body_limit must be greater than 0".to_string());
    }

    if config.discovery.pattern.trim().is_empty() {
        errors.push("discovery.pattern cannot be empty".to_string());
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::Invalid(errors))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::Environment;

    fn valid() -> OrchestratorConfig {
        OrchestratorConfig::defaults(Environment::Development, "secret")
    }

    #[test]
    fn test_defaults_are_valid() {
        assert!(validate_config(&valid()).is_ok());
    }

    #[test]
    fn test_reports_all_errors() {
        let mut config = valid();
        config.api_path = "api".to_string();
        config.body_limit = 0;
        config.security.session_options.secret.clear();

        match validate_config(&config) {
            Err(ConfigError::Invalid(errors)) => assert_eq!(errors.len(), 3),
            other => panic!("expected validation errors, got {other:?}"),
        }
    }

    #[test]
    fn test_realtime_path_cannot_be_root() {
        let mut config = valid();
        config.realtime.path = "/".to_string();
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("realtime.path"));
    }
}
