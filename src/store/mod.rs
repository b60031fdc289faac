//! Document storage.
//!
//! # Data Flow
//! ```text
//! caller {id, ...payload}
//!     -> CollectionStore (collection scoping, id pairing)
//!     -> VirtualDocument (stored shape)
//!     -> DocumentStore (flat records keyed by _id)
//! ```

pub mod backend;
pub mod collections;
pub mod document;
pub mod memory;
pub mod types;

pub use backend::{DocumentStore, Filter};
pub use collections::{document_from_json, CollectionStore};
pub use document::VirtualDocument;
pub use memory::MemoryStore;
pub use types::{Fields, FindResult, StoreError, StoreResult};
