//! Redis-backed session store.
//!
//! Construction only parses the URL; the connection is opened on first use
//! and then shared (multiplexed) by all requests.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use tokio::sync::OnceCell;

use crate::config::schema::StoreOptions;
use crate::error::{ConfigError, SessionError};
use crate::session::store::{SessionData, SessionStore};

pub struct RedisSessionStore {
    client: redis::Client,
    connection: OnceCell<MultiplexedConnection>,
    prefix: String,
    default_ttl: Duration,
}

impl fmt::Debug for RedisSessionStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisSessionStore")
            .field("prefix", &self.prefix)
            .field("default_ttl", &self.default_ttl)
            .field("connected", &self.connection.initialized())
            .finish()
    }
}

impl RedisSessionStore {
    /// Build a store from options without connecting.
    pub fn new(options: &StoreOptions) -> Result<Self, ConfigError> {
        let client =
            redis::Client::open(options.url.as_str()).map_err(|e| ConfigError::InvalidRedisUrl {
                url: options.url.clone(),
                reason: e.to_string(),
            })?;

        Ok(Self {
            client,
            connection: OnceCell::new(),
            prefix: options.prefix.clone(),
            default_ttl: Duration::from_secs(options.ttl_secs.max(1)),
        })
    }

    fn key(&self, id: &str) -> String {
        format!("{}{}", self.prefix, id)
    }

    async fn connection(&self) -> Result<MultiplexedConnection, SessionError> {
        let conn = self
            .connection
            .get_or_try_init(|| self.client.get_multiplexed_async_connection())
            .await?;
        Ok(conn.clone())
    }
}

#[async_trait]
impl SessionStore for RedisSessionStore {
    async fn load(&self, id: &str) -> Result<Option<SessionData>, SessionError> {
        let mut conn = self.connection().await?;
        let raw: Option<String> = conn.get(self.key(id)).await?;
        raw.map(|raw| serde_json::from_str(&raw))
            .transpose()
            .map_err(SessionError::from)
    }

    async fn save(
        &self,
        id: &str,
        data: &SessionData,
        ttl: Option<Duration>,
    ) -> Result<(), SessionError> {
        let payload = serde_json::to_string(data)?;
        let seconds = ttl.unwrap_or(self.default_ttl).as_secs().max(1);

        let mut conn = self.connection().await?;
        let _: () = conn.set_ex(self.key(id), payload, seconds).await?;
        Ok(())
    }

    async fn destroy(&self, id: &str) -> Result<(), SessionError> {
        let mut conn = self.connection().await?;
        let _: () = conn.del(self.key(id)).await?;
        Ok(())
    }

    fn kind(&self) -> &'static str {
        "redis"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_does_not_connect() {
        let store = RedisSessionStore::new(&StoreOptions::default()).unwrap();
        assert!(!store.connection.initialized());
        assert_eq!(store.key("abc"), "sess:abc");
    }

    #[test]
    fn test_zero_ttl_is_clamped() {
        let options = StoreOptions {
            ttl_secs: 0,
            ..StoreOptions::default()
        };
        let store = RedisSessionStore::new(&options).unwrap();
        assert_eq!(store.default_ttl, Duration::from_secs(1));
    }
}
