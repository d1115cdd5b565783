//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! SecurityConfig
//!     → headers.rs (CSP, Referrer-Policy, hardening headers; stage 1)
//!     → cors.rs (CorsLayer; stage 4)
//!     → installed by http::pipeline
//! ```
//!
//! # Design Decisions
//! - Everything is validated while the pipeline is built
//! - Fail closed: an invalid policy aborts initialization

pub mod cors;
pub mod headers;

pub use cors::build_cors_layer;
pub use headers::SecurityHeaders;
