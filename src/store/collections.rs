//! Named collections on top of the flat document store.
//!
//! # Responsibilities
//! - Address documents by `(collection, id)` instead of the store's `_id`
//! - Upsert by caller id: resolve the stored `_id` before every save
//! - Scope every query, count and delete to one collection
//!
//! # Design Decisions
//! - The stored `_id` is re-resolved on every lookup and never returned
//! - Blank collections read as empty and delete nothing
//! - Concurrent saves of a new pair may both insert; no local locking

use std::sync::Arc;

use serde_json::Value;

use crate::observability::metrics;
use crate::store::backend::{DocumentStore, Filter};
use crate::store::document::{id_text, is_reserved, VirtualDocument, COLLECTION_FIELD, EXTERNAL_ID_FIELD, ID_FIELD};
use crate::store::types::{Fields, FindResult, StoreError, StoreResult};

/// Collection-scoped view of a shared document store.
#[derive(Clone)]
pub struct CollectionStore {
    backend: Arc<dyn DocumentStore>,
}

impl CollectionStore {
    pub fn new(backend: Arc<dyn DocumentStore>) -> Self {
        Self { backend }
    }

    /// Insert or replace the document identified by `(collection, id)`.
    ///
    /// The id is `external_id` when given, else the document's own `id`
    /// field, else a fresh UUID. Returns the document in caller shape.
    pub async fn save_or_update(
        &self,
        collection: &str,
        external_id: Option<&str>,
        document: &Fields,
    ) -> StoreResult<Fields> {
        if is_blank(collection) {
            return Err(StoreError::InvalidCollection);
        }

        let id = external_id
            .filter(|id| !is_blank(id))
            .map(str::to_string)
            .or_else(|| document.get(ID_FIELD).and_then(id_text))
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        let existing = self.find_record(collection, &id).await?;
        let internal_id = existing.and_then(|record| record.internal_id);
        let label = if internal_id.is_some() { "updated" } else { "saved" };

        let document = VirtualDocument::new(collection, id.as_str(), document).with_internal_id(internal_id);
        let saved = self.backend.save(document.to_stored()).await?;
        let saved = VirtualDocument::from_stored(&saved)
            .ok_or_else(|| StoreError::Malformed(format!("saved record for [{}] lost its identity", id)))?;

        tracing::info!(
            collection,
            id = %id,
            internal_id = saved.internal_id.as_deref().unwrap_or("-"),
            "Data store - {}",
            label
        );
        metrics::record_store_operation(label);

        Ok(saved.into_public())
    }

    /// Document in caller shape, or `None` when absent.
    pub async fn find_by_id(&self, collection: &str, external_id: &str) -> StoreResult<Option<Fields>> {
        metrics::record_store_operation("find_by_id");
        Ok(self
            .find_record(collection, external_id)
            .await?
            .map(VirtualDocument::into_public))
    }

    /// Stored record for `(collection, id)` without converting it to caller
    /// shape. Takes the first match; uniqueness is kept by this layer, not
    /// the store.
    pub async fn find_record(&self, collection: &str, external_id: &str) -> StoreResult<Option<VirtualDocument>> {
        if is_blank(collection) || is_blank(external_id) {
            return Ok(None);
        }

        let filter = Filter::new()
            .with(COLLECTION_FIELD, collection)
            .with(EXTERNAL_ID_FIELD, external_id);
        let result = self.backend.find(&filter).await?;

        let record = result.items.iter().find_map(VirtualDocument::from_stored);
        match &record {
            Some(_) => tracing::info!(collection, id = external_id, "Data store - found"),
            None => tracing::info!(collection, id = external_id, "Data store - not found"),
        }
        Ok(record)
    }

    /// Documents of `collection` matching the caller's parameters.
    pub async fn find(&self, collection: &str, parameters: &[(String, String)]) -> StoreResult<FindResult> {
        if is_blank(collection) {
            return Ok(FindResult::empty());
        }
        metrics::record_store_operation("find");

        let result = self.backend.find(&scoped_filter(collection, parameters)).await?;
        let items: Vec<Fields> = result
            .items
            .iter()
            .filter_map(|record| {
                let document = VirtualDocument::from_stored(record);
                if document.is_none() {
                    tracing::warn!(collection, "Skipping stored record without identity fields");
                }
                document.map(VirtualDocument::into_public)
            })
            .collect();

        tracing::info!(collection, found = items.len(), total = result.total, "Data store - found");
        Ok(FindResult {
            items,
            total: result.total,
            offset: result.offset,
        })
    }

    /// Number of documents of `collection` matching the caller's parameters.
    pub async fn count(&self, collection: &str, parameters: &[(String, String)]) -> StoreResult<u64> {
        if is_blank(collection) {
            return Ok(0);
        }
        metrics::record_store_operation("count");

        let total = self.backend.count(&scoped_filter(collection, parameters)).await?;
        tracing::info!(collection, total, "Data store - count");
        Ok(total)
    }

    /// Delete one document. `false` when it does not exist.
    pub async fn delete_by_id(&self, collection: &str, external_id: &str) -> StoreResult<bool> {
        let removed = match self.find_record(collection, external_id).await? {
            Some(VirtualDocument {
                internal_id: Some(internal_id),
                ..
            }) => self.backend.remove_by_id(&internal_id).await?,
            _ => false,
        };

        metrics::record_store_operation("delete_by_id");
        tracing::info!(collection, id = external_id, removed, "Data store - removed");
        Ok(removed)
    }

    /// Delete every document of `collection` matching the parameters.
    /// Returns the store's success flag.
    pub async fn delete_all(&self, collection: &str, parameters: &[(String, String)]) -> StoreResult<bool> {
        if is_blank(collection) {
            return Ok(false);
        }

        let removed = self.backend.remove(&scoped_filter(collection, parameters)).await?;
        metrics::record_store_operation("delete_all");
        tracing::info!(collection, removed, "Data store - removed all");
        Ok(removed)
    }
}

/// Caller parameters scoped to one collection. `id` targets the pairing
/// key; reserved fields are dropped so the scope cannot be overridden.
fn scoped_filter(collection: &str, parameters: &[(String, String)]) -> Filter {
    let mut filter = Filter::new();
    for (key, value) in parameters {
        let replaced = if key == ID_FIELD {
            filter.set(EXTERNAL_ID_FIELD, value.as_str())
        } else if is_reserved(key) {
            tracing::debug!(key = %key, "Ignoring filter on reserved field");
            None
        } else {
            filter.set(key.as_str(), value.as_str())
        };
        if let Some(previous) = replaced {
            tracing::debug!(key = %key, previous = %previous, value = %value, "Repeated filter key, keeping last value");
        }
    }
    filter.set(COLLECTION_FIELD, collection);
    filter
}

fn is_blank(value: &str) -> bool {
    value.trim().is_empty()
}

/// Parse a JSON request body into a document. An empty body is `{}`.
pub fn document_from_json(value: Value) -> StoreResult<Fields> {
    match value {
        Value::Object(map) => Ok(map),
        Value::Null => Ok(Fields::new()),
        other => Err(StoreError::Malformed(format!(
            "documents must be JSON objects, got {}",
            other
        ))),
    }
}
