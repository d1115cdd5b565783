//! Session store abstraction and resolution.
//!
//! # Resolution
//! ```text
//! SessionOptions.store + optional inline instance
//!     → StoreConfig::from_options   (Inline | Named(kind, options) | Default)
//!     → resolve_store               (store handle, or None for the in-memory fallback)
//! ```

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::config::schema::{SessionOptions, StoreOptions};
use crate::error::{ConfigError, Result, SessionError};
use crate::session::redis_store::RedisSessionStore;

/// Persisted session payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionData(pub Map<String, Value>);

impl SessionData {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// A backend persisting sessions across requests.
#[async_trait]
pub trait SessionStore: Send + Sync + fmt::Debug {
    /// Load a session; `None` when unknown or expired.
    async fn load(&self, id: &str) -> std::result::Result<Option<SessionData>, SessionError>;

    /// Insert or replace a session.
    async fn save(
        &self,
        id: &str,
        data: &SessionData,
        ttl: Option<Duration>,
    ) -> std::result::Result<(), SessionError>;

    async fn destroy(&self, id: &str) -> std::result::Result<(), SessionError>;

    /// Short backend name for logs.
    fn kind(&self) -> &'static str;
}

/// Store backends that can be selected by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    Redis,
}

impl FromStr for StoreKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "connect-redis" | "redis" => Ok(StoreKind::Redis),
            other => Err(ConfigError::UnsupportedStore {
                store: other.to_string(),
            }),
        }
    }
}

/// Where the session store comes from.
#[derive(Debug, Clone)]
pub enum StoreConfig {
    /// A store constructed by the caller.
    Inline(Arc<dyn SessionStore>),
    /// A store to construct from options.
    Named(StoreKind, StoreOptions),
    /// No store configured; the session stage falls back to memory.
    Default,
}

impl StoreConfig {
    /// Classify the configured store. An inline instance wins over a name.
    ///
    /// # Errors
    ///
    /// [`ConfigError::UnsupportedStore`] when `store` names an unknown backend.
    pub fn from_options(
        options: &SessionOptions,
        inline: Option<Arc<dyn SessionStore>>,
    ) -> std::result::Result<Self, ConfigError> {
        if let Some(store) = inline {
            return Ok(StoreConfig::Inline(store));
        }

        match options.store.as_deref() {
            Some(name) => Ok(StoreConfig::Named(
                name.parse()?,
                options.store_options.clone(),
            )),
            None => Ok(StoreConfig::Default),
        }
    }
}

/// Turn a store configuration into a store handle.
///
/// `None` means the session stage uses its process-local memory store.
pub fn resolve_store(config: StoreConfig) -> Result<Option<Arc<dyn SessionStore>>> {
    match config {
        StoreConfig::Inline(store) => Ok(Some(store)),
        StoreConfig::Named(StoreKind::Redis, options) => {
            let store = RedisSessionStore::new(&options)?;
            tracing::info!(url = %options.url, prefix = %options.prefix, "Redis session store configured");
            Ok(Some(Arc::new(store)))
        }
        StoreConfig::Default => Ok(None),
    }
}
