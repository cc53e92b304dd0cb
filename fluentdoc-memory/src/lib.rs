//! In-memory document storage backend for fluentdoc.
//!
//! This crate provides a thread-safe, in-memory implementation of the `StoreBackend` trait.
//! It behaves like the database client where the helpers can observe it: upserts report
//! whether they inserted, `_id` is immutable, projections keep `_id`, and unique indexes
//! reject duplicates. It is meant for development and tests.
//!
//! # Quick Start
//!
//! ```ignore
//! use fluentdoc::{prelude::*, memory::InMemoryStore};
//!
//! let store = DocumentStore::new(InMemoryStore::builder().build().await?);
//!
//! store.upsert(&Entity { key: "k1".into(), name: "Test 1".into(), age: 17 }).await?;
//! assert!(store.get::<Entity>("k1").await?.is_some());
//! ```

#[allow(unused_extern_crates)]
extern crate self as fluentdoc_memory;

pub mod evaluator;
pub mod store;

pub use store::{InMemoryStore, InMemoryStoreBuilder};
