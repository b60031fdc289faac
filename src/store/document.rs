//! Virtual document identity.
//!
//! A caller sees `{id, ...payload}`. The flat store holds
//! `{_id, __ds_name__, __ds_id__, ...payload}`. `VirtualDocument` is the
//! typed bridge between the two shapes; every conversion builds a new map.

use serde_json::Value;

use crate::store::backend::INTERNAL_ID_FIELD;
use crate::store::types::Fields;

/// Caller-visible identifier field.
pub const ID_FIELD: &str = "id";

/// Stored collection discriminator.
pub const COLLECTION_FIELD: &str = "__ds_name__";

/// Stored caller-visible identifier (pairing key).
pub const EXTERNAL_ID_FIELD: &str = "__ds_id__";

/// Fields callers can never write or filter on.
pub const RESERVED_FIELDS: [&str; 3] = [INTERNAL_ID_FIELD, COLLECTION_FIELD, EXTERNAL_ID_FIELD];

pub fn is_reserved(field: &str) -> bool {
    RESERVED_FIELDS.contains(&field)
}

/// A document with its identity kept outside the payload.
#[derive(Debug, Clone, PartialEq)]
pub struct VirtualDocument {
    pub collection: String,
    pub external_id: String,
    pub internal_id: Option<String>,
    payload: Fields,
}

impl VirtualDocument {
    /// Build from a caller payload. Identifier and reserved fields are
    /// dropped from the payload.
    pub fn new(collection: impl Into<String>, external_id: impl Into<String>, payload: &Fields) -> Self {
        Self {
            collection: collection.into(),
            external_id: external_id.into(),
            internal_id: None,
            payload: payload
                .iter()
                .filter(|(key, _)| key.as_str() != ID_FIELD && !is_reserved(key))
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect(),
        }
    }

    /// Same document, addressed at an existing stored record.
    pub fn with_internal_id(self, internal_id: Option<String>) -> Self {
        Self { internal_id, ..self }
    }

    /// Read a record in stored shape. `None` when the bookkeeping fields are
    /// missing.
    pub fn from_stored(record: &Fields) -> Option<Self> {
        let collection = record.get(COLLECTION_FIELD)?.as_str()?.to_string();
        let external_id = record.get(EXTERNAL_ID_FIELD).and_then(id_text)?;
        let internal_id = record.get(INTERNAL_ID_FIELD).and_then(id_text);
        let payload = record
            .iter()
            .filter(|(key, _)| !is_reserved(key))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();

        Some(Self {
            collection,
            external_id,
            internal_id,
            payload,
        })
    }

    pub fn payload(&self) -> &Fields {
        &self.payload
    }

    /// Stored shape: payload plus bookkeeping and, when known, `_id`.
    pub fn to_stored(&self) -> Fields {
        let mut record = self.payload.clone();
        record.insert(COLLECTION_FIELD.to_string(), Value::String(self.collection.clone()));
        record.insert(EXTERNAL_ID_FIELD.to_string(), Value::String(self.external_id.clone()));
        if let Some(internal_id) = &self.internal_id {
            record.insert(INTERNAL_ID_FIELD.to_string(), Value::String(internal_id.clone()));
        }
        record
    }

    /// Caller shape: payload plus `id`, nothing else.
    pub fn into_public(self) -> Fields {
        let mut document = self.payload;
        document.insert(ID_FIELD.to_string(), Value::String(self.external_id));
        document
    }
}

/// Identifier text from a string or number value; blank strings are absent.
pub fn id_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
