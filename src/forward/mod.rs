//! Generic HTTP forwarding subsystem.
//!
//! # Data Flow
//! ```text
//! Unrouted inbound request
//!     → envelope.rs (ForwardRequest: method, path, query, headers, body)
//!     → engine.rs (strip Host/Content-Length, one upstream call)
//!     → engine.rs (normalize status, headers, body)
//!     → envelope.rs (ForwardResponse rendered to the client)
//! ```

pub mod engine;
pub mod envelope;

pub use engine::{normalize, Forwarder};
pub use envelope::{ForwardMethod, ForwardRequest, ForwardResponse, ResponseBody};
