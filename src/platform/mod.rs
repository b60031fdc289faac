//! Application platform collaborators.
//!
//! # Responsibilities
//! - Event delivery, application logs, files and locks behind traits
//! - Function delivery and descriptor merging against the external service
//!
//! The proxy only passes these calls through. The bundled implementations
//! keep everything in process memory.

pub mod events;
pub mod files;
pub mod functions;
pub mod locks;
pub mod logs;
pub mod metadata;

use std::sync::Arc;

use thiserror::Error;

use crate::upstream::{Upstream, UpstreamError};

pub use events::{Event, EventBus, LocalEventBus};
pub use files::{FileMetadata, FileStore, MemoryFileStore, StoredFile};
pub use functions::FunctionCall;
pub use locks::{LocalLocks, LockService};
pub use logs::{AppLog, AppLogSink, TracingAppLogs};
pub use metadata::MetadataCache;

#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("{0}")]
    EventRejected(String),

    #[error("no handler registered for event [{0}]")]
    NoHandler(String),

    #[error("file error: {0}")]
    File(String),

    #[error("no upstream service configured")]
    NoUpstream,

    #[error(transparent)]
    Upstream(#[from] UpstreamError),
}

pub type PlatformResult<T> = Result<T, PlatformError>;

/// Collaborators shared by every request.
#[derive(Clone)]
pub struct Platform {
    pub events: Arc<dyn EventBus>,
    pub app_logs: Arc<dyn AppLogSink>,
    pub files: Arc<dyn FileStore>,
    pub locks: Arc<dyn LockService>,
    pub metadata: Arc<MetadataCache>,
}

impl Platform {
    /// In-process collaborators, with descriptor merging against `upstream`.
    pub fn local(upstream: Option<Arc<dyn Upstream>>) -> Self {
        Self {
            events: Arc::new(LocalEventBus::default()),
            app_logs: Arc::new(TracingAppLogs),
            files: Arc::new(MemoryFileStore::new()),
            locks: Arc::new(LocalLocks::new()),
            metadata: Arc::new(MetadataCache::new(upstream)),
        }
    }
}
