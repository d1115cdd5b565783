//! Network transport.
//!
//! # Data Flow
//! ```text
//! ListenConfig
//!     → bind() (resolve address, bind TcpListener, log success or failure)
//!     → BoundServer::serve(router) (axum::serve with graceful shutdown, spawned)
//!     → ServerHandle (address, counts, shutdown, wait)
//! ```
//!
//! # Design Decisions
//! - Binding and serving are separate steps so routes can be mounted after the
//!   port is confirmed and before the first connection is processed
//! - Bind failures are fatal; there is no retry or fallback port

pub mod server;

pub use server::{bind, BoundServer, ServerHandle};
