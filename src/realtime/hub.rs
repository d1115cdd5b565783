//! Realtime hub: namespaces, clients and broadcasts.
//!
//! # Data Flow
//! ```text
//! SocketModule registered  → Namespace { module, broadcast channel, client count }
//! client frame (JSON)      → Envelope → module.on_event
//! RealtimeHandle::emit     → broadcast → every client task in the namespace
//! SocketClient::emit       → that client's outbound queue only
//! ```
//!
//! # Design Decisions
//! - The hub refuses clients until `connect` marks it ready
//! - Problems are reported as notices, never as errors to the caller

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::{broadcast, mpsc};

use crate::loader::events::{EventSender, SocketEvent};

/// Per-namespace broadcast buffer.
const BROADCAST_CAPACITY: usize = 256;

/// A single message on the wire: `{"event": "...", "data": ...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub event: String,
    #[serde(default)]
    pub data: Value,
}

impl Envelope {
    pub fn new(event: impl Into<String>, data: Value) -> Self {
        Self {
            event: event.into(),
            data,
        }
    }
}

/// Application code served on one namespace.
#[async_trait]
pub trait SocketModule: Send + Sync {
    /// Namespace name, without slashes.
    fn namespace(&self) -> &str;

    async fn on_connect(&self, _client: &SocketClient) {}

    async fn on_event(&self, client: &SocketClient, envelope: Envelope);

    async fn on_disconnect(&self, _client: &SocketClient) {}
}

/// One connected client, as seen by a [`SocketModule`].
#[derive(Debug, Clone)]
pub struct SocketClient {
    id: String,
    namespace: String,
    outbound: mpsc::UnboundedSender<Envelope>,
    handle: RealtimeHandle,
}

impl SocketClient {
    pub(crate) fn new(
        namespace: &str,
        outbound: mpsc::UnboundedSender<Envelope>,
        handle: RealtimeHandle,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            namespace: namespace.to_string(),
            outbound,
            handle,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Send to this client only. Returns `false` once it has disconnected.
    pub fn emit(&self, event: impl Into<String>, data: Value) -> bool {
        self.outbound.send(Envelope::new(event, data)).is_ok()
    }

    /// Send to every client in this client's namespace, itself included.
    pub fn broadcast(&self, event: impl Into<String>, data: Value) -> usize {
        self.handle.emit(&self.namespace, event, data)
    }
}

pub(crate) struct Namespace {
    pub(crate) module: Arc<dyn SocketModule>,
    pub(crate) sender: broadcast::Sender<Envelope>,
    clients: AtomicUsize,
}

impl Namespace {
    fn new(module: Arc<dyn SocketModule>) -> Self {
        let (sender, _) = broadcast::channel(BROADCAST_CAPACITY);
        Self {
            module,
            sender,
            clients: AtomicUsize::new(0),
        }
    }

    pub(crate) fn client_joined(&self) {
        self.clients.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn client_left(&self) {
        self.clients.fetch_sub(1, Ordering::SeqCst);
    }
}

struct HubInner {
    namespaces: RwLock<BTreeMap<String, Arc<Namespace>>>,
    ready: AtomicBool,
    events: EventSender,
}

/// Shared handle to the realtime hub.
///
/// This is the value application code uses to reach connected clients; the
/// orchestrator publishes it process-wide.
#[derive(Clone)]
pub struct RealtimeHandle {
    inner: Arc<HubInner>,
}

impl fmt::Debug for RealtimeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RealtimeHandle")
            .field("namespaces", &self.namespaces())
            .field("ready", &self.is_ready())
            .finish()
    }
}

impl RealtimeHandle {
    /// Create a hub that reports notices on `events`.
    pub fn new(events: EventSender) -> Self {
        Self {
            inner: Arc::new(HubInner {
                namespaces: RwLock::new(BTreeMap::new()),
                ready: AtomicBool::new(false),
                events,
            }),
        }
    }

    /// Register a namespace. Returns `false` if the name is already taken.
    pub fn register(&self, module: Arc<dyn SocketModule>) -> bool {
        let name = module.namespace().trim_matches('/').to_string();
        let mut namespaces = self.inner.namespaces.write();
        if namespaces.contains_key(&name) {
            return false;
        }
        namespaces.insert(name, Arc::new(Namespace::new(module)));
        true
    }

    pub fn namespaces(&self) -> Vec<String> {
        self.inner.namespaces.read().keys().cloned().collect()
    }

    pub(crate) fn namespace(&self, name: &str) -> Option<Arc<Namespace>> {
        self.inner.namespaces.read().get(name).cloned()
    }

    /// Start accepting clients.
    pub(crate) fn mark_ready(&self) {
        self.inner.ready.store(true, Ordering::SeqCst);
    }

    pub fn is_ready(&self) -> bool {
        self.inner.ready.load(Ordering::SeqCst)
    }

    /// Whether both handles refer to the same hub.
    pub fn same_hub(&self, other: &RealtimeHandle) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Broadcast to every client of `namespace`. Returns how many received it.
    pub fn emit(&self, namespace: &str, event: impl Into<String>, data: Value) -> usize {
        match self.namespace(namespace) {
            Some(ns) => ns.sender.send(Envelope::new(event, data)).unwrap_or(0),
            None => {
                self.notify(SocketEvent::Error(format!(
                    "emit to unknown namespace '{namespace}'"
                )));
                0
            }
        }
    }

    pub fn client_count(&self, namespace: &str) -> usize {
        self.namespace(namespace)
            .map(|ns| ns.clients.load(Ordering::SeqCst))
            .unwrap_or(0)
    }

    pub(crate) fn notify(&self, event: SocketEvent) {
        // Only fails once the bridge is gone, i.e. during shutdown.
        let _ = self.inner.events.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::events;
    use serde_json::json;

    struct Echo;

    #[async_trait]
    impl SocketModule for Echo {
        fn namespace(&self) -> &str {
            "/echo/"
        }

        async fn on_event(&self, client: &SocketClient, envelope: Envelope) {
            client.emit(envelope.event, envelope.data);
        }
    }

    #[test]
    fn test_register_normalizes_and_rejects_duplicates() {
        let (tx, _rx) = events::channel();
        let hub = RealtimeHandle::new(tx);
        assert!(hub.register(Arc::new(Echo)));
        assert!(!hub.register(Arc::new(Echo)));
        assert_eq!(hub.namespaces(), vec!["echo".to_string()]);
    }

    #[test]
    fn test_emit_without_clients_reaches_nobody() {
        let (tx, _rx) = events::channel();
        let hub = RealtimeHandle::new(tx);
        hub.register(Arc::new(Echo));
        assert_eq!(hub.emit("echo", "ping", json!(1)), 0);
    }

    #[test]
    fn test_emit_to_unknown_namespace_is_a_notice() {
        let (tx, mut rx) = events::channel();
        let hub = RealtimeHandle::new(tx);
        assert_eq!(hub.emit("missing", "ping", Value::Null), 0);
        assert!(matches!(rx.try_recv(), Ok(SocketEvent::Error(msg)) if msg.contains("missing")));
    }

    #[tokio::test]
    async fn test_broadcast_subscribers_receive() {
        let (tx, _rx) = events::channel();
        let hub = RealtimeHandle::new(tx);
        hub.register(Arc::new(Echo));
        let mut sub = hub.namespace("echo").unwrap().sender.subscribe();

        assert_eq!(hub.emit("echo", "news", json!({"n": 1})), 1);
        assert_eq!(sub.recv().await.unwrap(), Envelope::new("news", json!({"n": 1})));
    }

    #[test]
    fn test_envelope_data_defaults_to_null() {
        let envelope: Envelope = serde_json::from_str(r#"{"event":"hello"}"#).unwrap();
        assert_eq!(envelope, Envelope::new("hello", Value::Null));
    }
}
