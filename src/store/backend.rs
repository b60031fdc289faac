//! Flat document store primitive.
//!
//! # Responsibilities
//! - Define the store contract the collection layer is built on
//! - Carry filters as raw key/value predicates
//!
//! # Design Decisions
//! - Records are keyed by an internal identifier in `_id`
//! - The store knows nothing about collections or caller identifiers
//! - Predicate syntax and pagination keys belong to each store's dialect
//! - One predicate per key: a repeated query key keeps its last value

use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::store::types::{Fields, FindResult, StoreResult};

/// Field holding the store-assigned identifier.
pub const INTERNAL_ID_FIELD: &str = "_id";

/// Pagination: maximum number of items returned by `find`.
pub const PAGE_SIZE_KEY: &str = "_size";

/// Pagination: number of matching items skipped by `find`.
pub const PAGE_OFFSET_KEY: &str = "_offset";

/// Raw key/value predicates, interpreted by the store's filter dialect.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filter {
    conditions: BTreeMap<String, String>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(key, value);
        self
    }

    /// Set a predicate, replacing any previous one on the same key. Returns
    /// the replaced value.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.conditions.insert(key.into(), value.into())
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.conditions.get(key).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.conditions.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.conditions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }
}

/// Key/value document collection keyed by an internal identifier.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Records matching `filter`, paginated by the dialect's page keys.
    async fn find(&self, filter: &Filter) -> StoreResult<FindResult>;

    /// Number of records matching `filter`, ignoring pagination.
    async fn count(&self, filter: &Filter) -> StoreResult<u64>;

    /// Insert when `_id` is absent or unknown, replace otherwise. Returns
    /// the stored record including its `_id`.
    async fn save(&self, record: Fields) -> StoreResult<Fields>;

    /// Delete one record by internal identifier.
    async fn remove_by_id(&self, id: &str) -> StoreResult<bool>;

    /// Delete every record matching `filter`. Reports success, not a count.
    async fn remove(&self, filter: &Filter) -> StoreResult<bool>;
}
