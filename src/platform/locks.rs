//! Named locks.
//!
//! Locks are advisory and process-local; nothing in the proxy takes them
//! itself.

use async_trait::async_trait;
use dashmap::DashSet;

#[async_trait]
pub trait LockService: Send + Sync {
    /// `true` when the key was free and is now held.
    async fn lock(&self, key: &str) -> bool;

    /// `true` when the key was held and is now free.
    async fn unlock(&self, key: &str) -> bool;
}

#[derive(Debug, Default)]
pub struct LocalLocks {
    held: DashSet<String>,
}

impl LocalLocks {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LockService for LocalLocks {
    async fn lock(&self, key: &str) -> bool {
        !key.is_empty() && self.held.insert(key.to_string())
    }

    async fn unlock(&self, key: &str) -> bool {
        self.held.remove(key).is_some()
    }
}
