//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → tracing events (subscriber installed by logging.rs)
//!     → metrics.rs (counters, histograms through the `metrics` facade)
//!
//! Consumers:
//!     → stdout (pretty in development, JSON in production)
//!     → whichever metrics recorder the embedding process installs
//! ```
//!
//! # Design Decisions
//! - The library never installs a subscriber or recorder; the binary does
//! - Socket notices and access lines use their own targets so they can be filtered

pub mod logging;
pub mod metrics;

pub use logging::init_tracing;
