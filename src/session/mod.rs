//! Session subsystem.
//!
//! # Data Flow
//! ```text
//! Initialization:
//!     SessionOptions.store → store.rs (classify, construct) → Option<Arc<dyn SessionStore>>
//!
//! Per request (pipeline stages 6 and 7):
//!     Cookie header → cookies.rs (parse, unsign) → Cookies extension
//!     Cookies → middleware.rs (load/create) → Session extension → handler
//!     handler returns → middleware.rs (save, Set-Cookie)
//! ```
//!
//! # Design Decisions
//! - Unknown store names are fatal configuration errors
//! - No configured store means a process-local MemoryStore
//! - Secure cookies are only set when a trusted proxy reports https

pub mod cookies;
pub mod memory;
pub mod middleware;
pub mod redis_store;
pub mod store;

pub use cookies::{CookieSigner, Cookies};
pub use memory::MemoryStore;
pub use middleware::{Session, SessionState};
pub use redis_store::RedisSessionStore;
pub use store::{resolve_store, SessionData, SessionStore, StoreConfig, StoreKind};
