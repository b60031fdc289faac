//! Service proxy library.
//!
//! Sits between an application runtime and an externally hosted service:
//! forwards generic HTTP traffic to the service and answers configuration,
//! event, log, file, lock and document-store calls itself.

pub mod api;
pub mod config;
pub mod forward;
pub mod http;
pub mod observability;
pub mod platform;
pub mod store;
pub mod upstream;

pub use config::schema::ProxyConfig;
pub use http::{AppState, HttpServer};
