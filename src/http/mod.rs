//! HTTP middleware subsystem.
//!
//! # Data Flow
//! ```text
//! request
//!     → pipeline.rs (installs the stages below, outermost first)
//!     → security headers (security::headers)
//!     → body.rs (JSON, then URL-encoded)
//!     → CORS (security::cors)
//!     → access_log.rs
//!     → cookie parsing, session (session::*)
//!     → application routes
//! ```

pub mod access_log;
pub mod body;
pub mod pipeline;
pub mod settings;

pub use body::ParsedBody;
pub use pipeline::{Pipeline, Stage};
pub use settings::AppSettings;
