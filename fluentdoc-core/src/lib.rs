//! Metadata-driven helpers for typed document collections.
//!
//! This crate is the core of the fluentdoc project and provides:
//!
//! - **Document traits** ([`document`]) - The trait every stored type implements
//! - **Schemas** ([`schema`]) - Per-type configuration: identity, indexes, ignored fields
//! - **Metadata registry** ([`metadata`]) - Validated, memoized per-type metadata
//! - **Identity filters** ([`identity`]) - Equality filters from entities or raw keys
//! - **Queries and updates** ([`query`], [`update`]) - Filters, projections and `$set` updates
//! - **Backend abstraction** ([`backend`]) - The client surface the helpers delegate to
//! - **Collections** ([`collection`]) - Key-based CRUD, projection and field helpers
//! - **Document store** ([`store`]) - Memoized collection resolution with index creation
//! - **Error handling** ([`error`])
//!
//! # Example
//!
//! ```ignore
//! use fluentdoc::prelude::*;
//! use serde::{Serialize, Deserialize};
//!
//! #[derive(Debug, Clone, Serialize, Deserialize, Document)]
//! #[document(collection = "entities")]
//! pub struct Entity {
//!     #[document(id)]
//!     pub key: String,
//!     pub name: String,
//!     #[document(index)]
//!     pub age: i32,
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as fluentdoc_core;

pub mod backend;
pub mod collection;
pub mod document;
pub mod error;
pub mod identity;
pub mod metadata;
pub mod query;
pub mod schema;
pub mod store;
pub mod update;
