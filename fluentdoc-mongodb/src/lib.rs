//! MongoDB backend implementation for fluentdoc.
//!
//! This crate provides a MongoDB-based implementation of the `StoreBackend` trait on top of
//! the official async driver. To use it, enable the `mongodb` feature:
//!
//! ```toml
//! [dependencies]
//! fluentdoc = { version = "x.y.z", features = ["mongodb"] }
//! ```
//!
//! Filters are translated into native query documents, index declarations become
//! `createIndexes` calls and unique index violations surface as
//! `DocumentStoreError::DuplicateKey`.
//!
//! # Example
//!
//! ```ignore
//! use fluentdoc::{prelude::*, mongodb::MongoDbStore};
//! use std::time::Duration;
//!
//! let backend = MongoDbStore::builder("mongodb://localhost:27017", "my_database")
//!     .app_name("inventory")
//!     .server_selection_timeout(Duration::from_secs(5))
//!     .build()
//!     .await?;
//! let store = DocumentStore::new(backend);
//! ```

#[allow(unused_extern_crates)]
extern crate self as fluentdoc_mongodb;

pub mod query;
pub mod store;

pub use store::{MongoDbStore, MongoDbStoreBuilder};
