//! Socket namespace loader.

use std::sync::Arc;

use axum::Router;

use crate::config::schema::RealtimeConfig;
use crate::error::{Error, Result};
use crate::loader::events::{self, EventReceiver, SocketEvent};
use crate::loader::SocketLoader;
use crate::realtime::{socket_router, RealtimeHandle, SocketModule};

/// A registered namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SocketEntry {
    pub namespace: String,
    /// Full upgrade path, e.g. `/socket/chat`.
    pub path: String,
}

/// Read-only view of registered namespaces.
#[derive(Debug, Clone, Default)]
pub struct SocketRegistry {
    entries: Vec<SocketEntry>,
}

impl SocketRegistry {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SocketEntry> {
        self.entries.iter()
    }

    pub fn get(&self, namespace: &str) -> Option<&SocketEntry> {
        self.entries.iter().find(|e| e.namespace == namespace)
    }
}

/// Default [`SocketLoader`] serving [`SocketModule`]s through the realtime hub.
pub struct SocketModuleLoader {
    config: RealtimeConfig,
    modules: Vec<Arc<dyn SocketModule>>,
    hub: RealtimeHandle,
    events: Option<EventReceiver>,
    registry: SocketRegistry,
    initialized: bool,
    connected: bool,
}

impl std::fmt::Debug for SocketModuleLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SocketModuleLoader")
            .field("path", &self.config.path)
            .field("registry", &self.registry)
            .field("connected", &self.connected)
            .finish()
    }
}

impl SocketModuleLoader {
    pub fn new(config: RealtimeConfig, modules: Vec<Arc<dyn SocketModule>>) -> Self {
        let (tx, rx) = events::channel();
        Self {
            config,
            modules,
            hub: RealtimeHandle::new(tx),
            events: Some(rx),
            registry: SocketRegistry::default(),
            initialized: false,
            connected: false,
        }
    }
}

impl SocketLoader for SocketModuleLoader {
    fn initialize(&mut self) -> Result<()> {
        if self.initialized {
            return Ok(());
        }

        let base = self.config.path.trim_end_matches('/');
        let taken = self.hub.namespaces();
        let mut entries: Vec<SocketEntry> = Vec::with_capacity(self.modules.len());
        for module in &self.modules {
            let namespace = module.namespace().trim_matches('/').to_string();
            if taken.contains(&namespace) || entries.iter().any(|e| e.namespace == namespace) {
                return Err(Error::loader(format!(
                    "socket namespace '{namespace}' registered twice"
                )));
            }
            entries.push(SocketEntry {
                path: format!("{base}/{namespace}"),
                namespace,
            });
        }

        // Nothing reaches the hub unless every namespace is unique.
        for module in &self.modules {
            self.hub.register(Arc::clone(module));
        }

        tracing::debug!(namespaces = entries.len(), "Socket namespaces registered");
        self.registry = SocketRegistry { entries };
        self.initialized = true;
        Ok(())
    }

    fn connect(&mut self) -> usize {
        if self.connected {
            return self.registry.len();
        }

        self.hub.mark_ready();
        self.connected = true;
        for entry in self.registry.iter() {
            self.hub
                .notify(SocketEvent::Status(format!("Socket namespace ready at {}", entry.path)));
        }
        self.registry.len()
    }

    fn sockets(&self) -> &SocketRegistry {
        &self.registry
    }

    fn io(&self) -> RealtimeHandle {
        self.hub.clone()
    }

    fn take_events(&mut self) -> Option<EventReceiver> {
        self.events.take()
    }

    fn attach(&self) -> Router {
        socket_router(&self.config.path, self.hub.clone())
    }
}
