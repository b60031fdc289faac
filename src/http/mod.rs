//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware)
//!     → request.rs (request id, trace span)
//!     → api routes (shared-secret check, dispatch)
//!        or forwarding fallback (external service)
//!     → error.rs (ApiError → status + {"error": ...})
//! ```

pub mod error;
pub mod request;
pub mod server;

pub use error::{ApiError, ApiResult};
pub use request::X_REQUEST_ID;
pub use server::{AppState, HttpServer};
