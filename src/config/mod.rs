//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! caller overrides (JSON value) / TOML file (loader.rs)
//!     → merge.rs (deep merge over defaults built with a pre-generated secret)
//!     → validation.rs (semantic checks)
//!     → OrchestratorConfig (owned by the orchestrator)
//! ```
//!
//! # Design Decisions
//! - Every field has a default, so any partial document is accepted
//! - Merging is pure; the session secret is generated once, outside the merge
//! - Config is immutable once handed to the orchestrator

pub mod loader;
pub mod merge;
pub mod schema;
pub mod validation;

pub use merge::{generate_secret, merge_values};
pub use schema::{
    CookieOptions, CorsOptions, DiscoveryConfig, Environment, ListenConfig, LogFormat,
    LoggingConfig, OrchestratorConfig, SecurityConfig, SessionOptions, StoreOptions,
};
