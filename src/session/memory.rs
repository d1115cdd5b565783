//! Process-local session store.
//!
//! Sessions live in this process only: they are lost on restart and are not
//! shared between processes, so this store is unsuitable for multi-process
//! deployments.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;

use crate::error::SessionError;
use crate::session::store::{SessionData, SessionStore};

/// Expired sessions are swept once every this many saves.
const SWEEP_EVERY: usize = 128;

#[derive(Debug)]
struct Entry {
    data: SessionData,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// In-memory session store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    sessions: DashMap<String, Entry>,
    saves: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored sessions, including expired ones not yet swept.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Drop every expired session. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.sessions.len();
        self.sessions.retain(|_, entry| !entry.is_expired(now));
        let removed = before.saturating_sub(self.sessions.len());
        if removed > 0 {
            tracing::debug!(removed, "Expired in-memory sessions purged");
        }
        removed
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn load(&self, id: &str) -> Result<Option<SessionData>, SessionError> {
        let now = Instant::now();
        let expired = match self.sessions.get(id) {
            Some(entry) if !entry.is_expired(now) => return Ok(Some(entry.data.clone())),
            Some(_) => true,
            None => false,
        };

        if expired {
            self.sessions.remove(id);
        }
        Ok(None)
    }

    async fn save(
        &self,
        id: &str,
        data: &SessionData,
        ttl: Option<Duration>,
    ) -> Result<(), SessionError> {
        if (self.saves.fetch_add(1, Ordering::Relaxed) + 1) % SWEEP_EVERY == 0 {
            self.purge_expired();
        }
        self.sessions.insert(
            id.to_string(),
            Entry {
                data: data.clone(),
                expires_at: ttl.map(|ttl| Instant::now() + ttl),
            },
        );
        Ok(())
    }

    async fn destroy(&self, id: &str) -> Result<(), SessionError> {
        self.sessions.remove(id);
        Ok(())
    }

    fn kind(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn data() -> SessionData {
        let mut data = SessionData::default();
        data.0.insert("user".to_string(), json!("alice"));
        data
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let store = MemoryStore::new();
        store.save("a", &data(), None).await.unwrap();
        assert_eq!(store.load("a").await.unwrap(), Some(data()));
        assert_eq!(store.load("b").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_expired_sessions_are_evicted() {
        let store = MemoryStore::new();
        store
            .save("a", &data(), Some(Duration::from_millis(0)))
            .await
            .unwrap();
        assert_eq!(store.load("a").await.unwrap(), None);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_abandoned_sessions_are_swept_on_save() {
        let store = MemoryStore::new();
        for i in 0..SWEEP_EVERY - 1 {
            store
                .save(&format!("visitor-{i}"), &data(), Some(Duration::ZERO))
                .await
                .unwrap();
        }
        assert_eq!(store.len(), SWEEP_EVERY - 1);

        store.save("kept", &data(), None).await.unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(store.load("kept").await.unwrap(), Some(data()));
    }

    #[tokio::test]
    async fn test_purge_expired_keeps_live_sessions() {
        let store = MemoryStore::new();
        store.save("old", &data(), Some(Duration::from_millis(1))).await.unwrap();
        store.save("live", &data(), Some(Duration::from_secs(60))).await.unwrap();
        store.save("forever", &data(), None).await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert_eq!(store.purge_expired(), 1);
        assert_eq!(store.len(), 2);
        assert_eq!(store.purge_expired(), 0);
    }

    #[tokio::test]
    async fn test_destroy() {
        let store = MemoryStore::new();
        store.save("a", &data(), None).await.unwrap();
        store.destroy("a").await.unwrap();
        assert_eq!(store.load("a").await.unwrap(), None);
    }
}
