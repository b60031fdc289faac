//! In-memory document store.
//!
//! # Filter Dialect
//! - `key=value` equality; numbers compare numerically, arrays match when
//!   any element matches
//! - `key=gt(x)`, `gte(x)`, `lt(x)`, `lte(x)`, `ne(x)` range and negation
//! - Dotted keys (`customer.name`) reach into nested objects
//! - `_size` / `_offset` paginate `find`; `count` and `remove` ignore them
//!
//! Results come back in insertion order.

use std::cmp::Ordering as CmpOrdering;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde_json::Value;

use crate::store::backend::{DocumentStore, Filter, INTERNAL_ID_FIELD, PAGE_OFFSET_KEY, PAGE_SIZE_KEY};
use crate::store::types::{Fields, FindResult, StoreResult};

struct StoredRecord {
    seq: u64,
    fields: Fields,
}

/// Thread-safe document store living in process memory.
pub struct MemoryStore {
    records: DashMap<String, StoredRecord>,
    sequence: AtomicU64,
    default_page_size: usize,
}

impl MemoryStore {
    pub fn new(default_page_size: usize) -> Self {
        Self {
            records: DashMap::new(),
            sequence: AtomicU64::new(0),
            default_page_size: default_page_size.max(1),
        }
    }

    /// Number of stored records across every collection.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Matching records as `(id, fields)` in insertion order.
    fn matching(&self, filter: &Filter) -> Vec<(String, Fields)> {
        let predicates: Vec<(&str, Predicate)> = filter
            .iter()
            .filter(|(key, _)| *key != PAGE_SIZE_KEY && *key != PAGE_OFFSET_KEY)
            .map(|(key, raw)| (key, Predicate::parse(raw)))
            .collect();

        let mut hits: Vec<(u64, String, Fields)> = self
            .records
            .iter()
            .filter(|entry| {
                predicates
                    .iter()
                    .all(|(key, predicate)| predicate.matches(lookup(&entry.value().fields, key)))
            })
            .map(|entry| (entry.value().seq, entry.key().clone(), entry.value().fields.clone()))
            .collect();

        hits.sort_by_key(|(seq, _, _)| *seq);
        hits.into_iter().map(|(_, id, fields)| (id, fields)).collect()
    }

    fn page_param(filter: &Filter, key: &str, default: usize) -> usize {
        match filter.get(key) {
            None => default,
            Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
                tracing::warn!(key, value = raw, "Ignoring invalid pagination value");
                default
            }),
        }
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn find(&self, filter: &Filter) -> StoreResult<FindResult> {
        let size = Self::page_param(filter, PAGE_SIZE_KEY, self.default_page_size);
        let offset = Self::page_param(filter, PAGE_OFFSET_KEY, 0);

        let hits = self.matching(filter);
        let total = hits.len() as u64;
        let items = hits
            .into_iter()
            .skip(offset)
            .take(size)
            .map(|(_, fields)| fields)
            .collect();

        Ok(FindResult {
            items,
            total,
            offset: offset as u64,
        })
    }

    async fn count(&self, filter: &Filter) -> StoreResult<u64> {
        Ok(self.matching(filter).len() as u64)
    }

    async fn save(&self, mut record: Fields) -> StoreResult<Fields> {
        let id = match record.get(INTERNAL_ID_FIELD).and_then(Value::as_str) {
            Some(id) if !id.trim().is_empty() => id.to_string(),
            _ => uuid::Uuid::new_v4().to_string(),
        };
        record.insert(INTERNAL_ID_FIELD.to_string(), Value::String(id.clone()));

        match self.records.entry(id) {
            Entry::Occupied(mut existing) => {
                existing.get_mut().fields = record.clone();
            }
            Entry::Vacant(slot) => {
                let seq = self.sequence.fetch_add(1, Ordering::Relaxed);
                slot.insert(StoredRecord {
                    seq,
                    fields: record.clone(),
                });
            }
        }
        Ok(record)
    }

    async fn remove_by_id(&self, id: &str) -> StoreResult<bool> {
        Ok(self.records.remove(id).is_some())
    }

    async fn remove(&self, filter: &Filter) -> StoreResult<bool> {
        for (id, _) in self.matching(filter) {
            self.records.remove(&id);
        }
        Ok(true)
    }
}

/// Resolve a dotted path inside a record.
fn lookup<'a>(fields: &'a Fields, path: &str) -> Option<&'a Value> {
    let mut parts = path.split('.');
    let mut current = fields.get(parts.next()?)?;
    for part in parts {
        current = current.as_object()?.get(part)?;
    }
    Some(current)
}

#[derive(Debug, Clone, PartialEq)]
enum Predicate {
    Eq(String),
    Ne(String),
    Gt(String),
    Gte(String),
    Lt(String),
    Lte(String),
}

impl Predicate {
    fn parse(raw: &str) -> Self {
        let operator = |name: &str| {
            raw.strip_prefix(name)
                .and_then(|rest| rest.strip_prefix('('))
                .and_then(|rest| rest.strip_suffix(')'))
                .map(str::to_string)
        };
        if let Some(operand) = operator("gte") {
            Predicate::Gte(operand)
        } else if let Some(operand) = operator("gt") {
            Predicate::Gt(operand)
        } else if let Some(operand) = operator("lte") {
            Predicate::Lte(operand)
        } else if let Some(operand) = operator("lt") {
            Predicate::Lt(operand)
        } else if let Some(operand) = operator("ne") {
            Predicate::Ne(operand)
        } else {
            Predicate::Eq(raw.to_string())
        }
    }

    fn matches(&self, value: Option<&Value>) -> bool {
        match self {
            Predicate::Eq(operand) => value.is_some_and(|v| equals(v, operand)),
            Predicate::Ne(operand) => !value.is_some_and(|v| equals(v, operand)),
            Predicate::Gt(operand) => ordering(value, operand) == Some(CmpOrdering::Greater),
            Predicate::Gte(operand) => matches!(
                ordering(value, operand),
                Some(CmpOrdering::Greater | CmpOrdering::Equal)
            ),
            Predicate::Lt(operand) => ordering(value, operand) == Some(CmpOrdering::Less),
            Predicate::Lte(operand) => matches!(
                ordering(value, operand),
                Some(CmpOrdering::Less | CmpOrdering::Equal)
            ),
        }
    }
}

fn equals(value: &Value, operand: &str) -> bool {
    match value {
        Value::Array(items) => items.iter().any(|item| equals(item, operand)),
        Value::Null => operand == "null",
        other => compare(other, operand) == Some(CmpOrdering::Equal),
    }
}

fn ordering(value: Option<&Value>, operand: &str) -> Option<CmpOrdering> {
    value.and_then(|v| compare(v, operand))
}

fn compare(value: &Value, operand: &str) -> Option<CmpOrdering> {
    match value {
        Value::Number(n) => {
            let operand: f64 = operand.trim().parse().ok()?;
            n.as_f64()?.partial_cmp(&operand)
        }
        Value::String(s) => Some(s.as_str().cmp(operand)),
        Value::Bool(b) => Some(b.cmp(&operand.parse::<bool>().ok()?)),
        _ => None,
    }
}
