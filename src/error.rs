//! Error taxonomy for the orchestrator.
//!
//! # Propagation
//! - Configuration and lifecycle errors are returned synchronously to the caller
//!   of `initialize` / `configure` / `start` and abort whatever was in progress.
//! - Bind failures are logged by the transport and returned from `start`.
//! - Socket notices are never errors here; they travel over the notice channel
//!   (see `loader::events`).

use thiserror::Error;

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error.
#[derive(Debug, Error)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("lifecycle violation: {0}")]
    Lifecycle(#[from] LifecycleError),

    #[error("startup failure: {0}")]
    Startup(#[from] StartupError),

    #[error("session error: {0}")]
    Session(#[from] SessionError),

    /// A route or socket loader hook failed.
    #[error("loader error: {0}")]
    Loader(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create a loader error.
    pub fn loader(msg: impl Into<String>) -> Self {
        Self::Loader(msg.into())
    }
}

/// Fatal configuration problems detected while merging or initializing.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The session `store` field names a backend that is not supported.
    #[error("unsupported session store '{store}'")]
    UnsupportedStore { store: String },

    /// A security header value could not be encoded.
    #[error("invalid value for header {header}: {value:?}")]
    InvalidHeader { header: &'static str, value: String },

    #[error("invalid referrer policy '{0}'")]
    InvalidReferrerPolicy(String),

    #[error("invalid CORS option: {0}")]
    InvalidCors(String),

    #[error("invalid redis url '{url}': {reason}")]
    InvalidRedisUrl { url: String, reason: String },

    #[error("invalid discovery pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    /// Overrides could not be parsed or did not fit the schema.
    #[error("parse error: {0}")]
    Parse(String),

    /// Semantic validation failed; every failure is listed.
    #[error("validation failed: {}", .0.join(", "))]
    Invalid(Vec<String>),
}

/// Illegal lifecycle transitions.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LifecycleError {
    /// `configure` was called after `start`.
    #[error("the server is already active; configuration callbacks are no longer accepted")]
    AlreadyActive,

    /// `start` was called a second time.
    #[error("the server has already been started")]
    AlreadyStarted,
}

/// Transport-level startup failures.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("invalid listen address {address}: {reason}")]
    Address { address: String, reason: String },

    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },
}

/// Session store failures.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("session serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unsupported_store_names_identifier() {
        let err: Error = ConfigError::UnsupportedStore {
            store: "mongo-store".to_string(),
        }
        .into();
        assert!(matches!(err, Error::Config(_)));
        assert!(err.to_string().contains("mongo-store"));
    }

    #[test]
    fn test_validation_lists_every_failure() {
        let err = ConfigError::Invalid(vec!["a".into(), "b".into()]);
        assert_eq!(err.to_string(), "validation failed: a, b");
    }

    #[test]
    fn test_bind_error_display() {
        let err = StartupError::Bind {
            address: "127.0.0.1:80".to_string(),
            source: std::io::Error::new(std::io::ErrorKind::AddrInUse, "address in use"),
        };
        assert_eq!(
            err.to_string(),
            "failed to bind 127.0.0.1:80: address in use"
        );
    }

    #[test]
    fn test_lifecycle_conversion() {
        let err: Error = LifecycleError::AlreadyActive.into();
        assert!(matches!(err, Error::Lifecycle(LifecycleError::AlreadyActive)));
    }
}
