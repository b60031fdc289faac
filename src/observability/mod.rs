//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Request handling, store, upstream client:
//!     → logging.rs (structured log events, app_log entries)
//!     → metrics.rs (counters, histograms)
//!
//! Consumers:
//!     → stdout (pretty or JSON)
//!     → Prometheus scrape endpoint (optional)
//! ```

pub mod logging;
pub mod metrics;

pub use logging::init_logging;
pub use metrics::init_metrics;
