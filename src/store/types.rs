//! Store error and result types.

use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

/// A stored or returned document body.
pub type Fields = Map<String, Value>;

/// Errors raised by the document store and the collection layer.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Writes need a collection name.
    #[error("collection name must not be blank")]
    InvalidCollection,

    /// The backing store returned something the layer cannot interpret.
    #[error("malformed stored record: {0}")]
    Malformed(String),

    /// Unexpected condition inside the backing store.
    #[error("document store failure: {0}")]
    Backend(String),
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// A page of documents.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FindResult {
    pub items: Vec<Fields>,
    pub total: u64,
    pub offset: u64,
}

impl FindResult {
    pub fn empty() -> Self {
        Self::default()
    }
}
