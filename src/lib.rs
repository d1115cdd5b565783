//! Service lifecycle orchestrator.
//!
//! Merges configuration over defaults, builds a fixed middleware pipeline,
//! and brings an HTTP server plus realtime socket namespaces up in a
//! well-defined order.
//!
//! ```text
//! Orchestrator::new(overrides)
//!     → initialize  (session store, trust proxy, pipeline, loader setup)
//!     → configure   (callbacks over the final registries; refused once active)
//!     → start       (bind → mount routes → publish io → serve → connect sockets)
//! ```

pub mod config;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod loader;
pub mod net;
pub mod observability;
pub mod realtime;
pub mod registry;
pub mod security;
pub mod session;

pub use config::OrchestratorConfig;
pub use error::{Error, Result};
pub use lifecycle::{ConfigureContext, LifecycleState, Orchestrator, OrchestratorBuilder};
pub use loader::{ApiModule, SocketEvent};
pub use net::ServerHandle;
pub use realtime::{Envelope, RealtimeHandle, SocketClient, SocketModule};
pub use registry::ProcessRegistry;
