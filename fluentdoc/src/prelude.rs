//! Convenient re-exports of commonly used types from fluentdoc.
//!
//! ```ignore
//! use fluentdoc::prelude::*;
//! ```

pub use fluentdoc_core::{
    backend::{StoreBackend, StoreBackendBuilder},
    collection::TypedCollection,
    document::{Document, DocumentExt},
    error::{DocumentStoreError, DocumentStoreResult},
    identity::{IdFilter, KeyFilter},
    query::{Expr, Filter, Projection, Query},
    schema::{DocumentSchema, FieldSchema, IndexSpec},
    store::DocumentStore,
    update::{Update, WriteOutcome},
};
pub use fluentdoc_macros::Document;
