//! Realtime communication subsystem.
//!
//! # Data Flow
//! ```text
//! SocketModule registrations
//!     → hub.rs (namespaces, broadcast channels, RealtimeHandle)
//!     → websocket.rs (upgrade route mounted beside the HTTP pipeline)
//!     → notices → loader::events bridge → log
//! ```

pub mod hub;
pub mod websocket;

pub use hub::{Envelope, RealtimeHandle, SocketClient, SocketModule};
pub use websocket::socket_router;
