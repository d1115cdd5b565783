//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Merge config → initialize (store, trust proxy, pipeline, loaders)
//!         → start (loader config hooks → Active → bind → mount → serve → connect sockets)
//!
//! Shutdown (shutdown.rs):
//!     Signal received → stop accepting → drain in-flight requests → exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Transitions only move forward; `initialize` is idempotent
//! - Configuration callbacks are refused once Active
//! - Startup errors are fatal, nothing is retried

pub mod shutdown;
pub mod signals;
pub mod startup;
pub mod state;

pub use shutdown::Shutdown;
pub use signals::shutdown_signal;
pub use startup::{ConfigureContext, Orchestrator, OrchestratorBuilder};
pub use state::LifecycleState;
