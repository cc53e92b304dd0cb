//! Main fluentdoc crate: typed, metadata-driven helpers over a document database client.
//!
//! A document type declares its collection, its identity field, its indexes and the fields
//! that are never persisted. The [`DocumentStore`](store::DocumentStore) then resolves the
//! collection on first use (creating the indexes once) and exposes key-based helpers.
//!
//! # Quick Start
//!
//! ```ignore
//! use fluentdoc::{prelude::*, memory::InMemoryStore};
//! use serde::{Serialize, Deserialize};
//! use std::collections::HashMap;
//!
//! #[derive(Debug, Clone, Serialize, Deserialize, Document)]
//! #[document(collection = "entities")]
//! pub struct Entity {
//!     #[document(id)]
//!     pub key: String,
//!     pub name: String,
//!     #[document(ignore)]
//!     #[serde(default)]
//!     pub some_cache: HashMap<String, String>,
//!     #[document(index)]
//!     pub age: i32,
//! }
//!
//! #[tokio::main]
//! async fn main() -> DocumentStoreResult<()> {
//!     let store = DocumentStore::new(InMemoryStore::builder().build().await?);
//!
//!     store.upsert(&Entity {
//!         key: "k1".into(),
//!         name: "Test 1".into(),
//!         some_cache: HashMap::new(),
//!         age: 17,
//!     }).await?;
//!
//!     let entity = store.get::<Entity>("k1").await?;
//!     let old = store.get_all_where::<Entity>(Filter::gt("age", 70)).await?;
//!     let ages: Vec<i32> = store.get_vector::<Entity, _>("age").await?;
//!     let matched = store.set_field::<Entity, _>("k1", "age", 18).await?;
//!
//!     store.shutdown().await
//! }
//! ```
//!
//! # Backends
//!
//! - [`memory`] - In-memory storage for development and testing
//! - [`mongodb`] - MongoDB backend (requires the `mongodb` feature)

#[allow(unused_extern_crates)]
extern crate self as fluentdoc;

pub mod prelude;

pub use fluentdoc_core::{
    backend, collection, document, error, identity, metadata, query, schema, store, update,
};
pub use fluentdoc_macros::Document;

// Re-export BSON types for convenience
pub use bson;
#[doc(hidden)]
pub use serde;

/// In-memory storage backend implementations.
pub mod memory {
    pub use fluentdoc_memory::{InMemoryStore, InMemoryStoreBuilder};
}

/// MongoDB storage backend implementations.
///
/// This module is only available when the `mongodb` feature is enabled.
#[cfg(feature = "mongodb")]
pub mod mongodb {
    pub use fluentdoc_mongodb::{MongoDbStore, MongoDbStoreBuilder};
}
