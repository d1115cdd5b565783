//! Route and socket loaders.
//!
//! # Data Flow
//! ```text
//! initialize()   → discover modules, register namespaces
//! set_config()   → per-module configuration hooks (before listening)
//! set_apis(path) → Router nested under the mount path
//! connect()      → socket namespaces start accepting clients (after listening)
//! ```
//!
//! # Design Decisions
//! - Loaders are trait objects so embedders can bring their own
//! - Registries are read-only views; only the loader mutates them
//! - Socket notices travel over a channel owned by the socket loader

use std::sync::Arc;

use axum::Router;

use crate::config::OrchestratorConfig;
use crate::error::Result;
use crate::http::settings::AppSettings;
use crate::realtime::RealtimeHandle;

pub mod events;
pub mod routes;
pub mod sockets;

pub use events::{spawn_notice_bridge, EventReceiver, SocketEvent};
pub use routes::{ApiModule, ModuleRouteLoader, ServiceEntry, ServiceRegistry};
pub use sockets::{SocketEntry, SocketModuleLoader, SocketRegistry};

/// What loaders see when configuration hooks run.
#[derive(Debug, Clone)]
pub struct LoaderContext {
    pub config: Arc<OrchestratorConfig>,
    pub settings: AppSettings,
    pub io: RealtimeHandle,
}

/// Discovers and mounts HTTP route modules.
pub trait RouteLoader: Send + Sync {
    /// Idempotent setup.
    fn initialize(&mut self) -> Result<()>;

    /// Run configuration hooks before the server listens.
    fn set_config(&mut self, ctx: &LoaderContext) -> Result<()>;

    /// Build the router with every discovered module below `mount_path`.
    fn set_apis(&mut self, mount_path: &str) -> Result<Router>;

    fn services(&self) -> &ServiceRegistry;
}

/// Manages realtime socket namespaces.
pub trait SocketLoader: Send + Sync {
    /// Idempotent setup.
    fn initialize(&mut self) -> Result<()>;

    /// Start accepting clients. Returns the number of connected namespaces.
    fn connect(&mut self) -> usize;

    fn sockets(&self) -> &SocketRegistry;

    /// The realtime handle shared with application code.
    fn io(&self) -> RealtimeHandle;

    /// Hand out the notice receiver. Only the first call gets it.
    fn take_events(&mut self) -> Option<EventReceiver>;

    /// Router carrying the upgrade endpoint.
    fn attach(&self) -> Router;
}
