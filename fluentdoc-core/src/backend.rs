//! Storage backend abstraction.
//!
//! [`StoreBackend`] is the narrow, stable surface of the underlying database client that the
//! helpers in this crate are written against. Each method maps one-to-one onto a single
//! client call; backends add no retry, batching or recovery of their own.
//!
//! # Traits
//!
//! - [`StoreBackend`]: the client operations used by the helpers
//! - [`StoreBackendBuilder`]: factory trait for creating backend instances

use async_trait::async_trait;
use bson::Document as BsonDocument;
use std::fmt::Debug;

use crate::{
    error::DocumentStoreResult,
    query::{Expr, Query},
    schema::IndexSpec,
    update::{Update, WriteOutcome},
};

/// Abstract interface for document database clients.
///
/// Documents cross this boundary in their stored form: the identity key is held under
/// `_id` and ignored fields are already removed.
///
/// # Thread Safety
///
/// Implementations must be thread-safe and support concurrent access from multiple async
/// tasks.
#[async_trait]
pub trait StoreBackend: Send + Sync + Debug {
    /// Creates the given single-field indexes on a collection.
    ///
    /// Creating an index that already exists is not an error.
    ///
    /// # Returns
    ///
    /// The names of the indexes, in the order given.
    async fn create_indexes(
        &self,
        collection: &str,
        indexes: &[IndexSpec],
    ) -> DocumentStoreResult<Vec<String>>;

    /// Lists the secondary indexes present on a collection.
    ///
    /// The implicit `_id` index is not reported.
    async fn list_indexes(&self, collection: &str) -> DocumentStoreResult<Vec<IndexSpec>>;

    /// Replaces the first document matching `filter` with `replacement`.
    ///
    /// When nothing matches and `upsert` is set, `replacement` is inserted instead.
    async fn replace_one(
        &self,
        collection: &str,
        filter: &Expr,
        replacement: BsonDocument,
        upsert: bool,
    ) -> DocumentStoreResult<WriteOutcome>;

    /// Returns every document matching the query, projected if the query says so.
    async fn find(&self, collection: &str, query: Query) -> DocumentStoreResult<Vec<BsonDocument>>;

    /// Returns the first document matching `filter`, if any.
    async fn find_one(
        &self,
        collection: &str,
        filter: &Expr,
    ) -> DocumentStoreResult<Option<BsonDocument>>;

    /// Applies `update` to the first document matching `filter`.
    async fn update_one(
        &self,
        collection: &str,
        filter: &Expr,
        update: &Update,
    ) -> DocumentStoreResult<WriteOutcome>;

    /// Deletes the first document matching `filter`.
    ///
    /// # Returns
    ///
    /// The number of deleted documents (0 or 1).
    async fn delete_one(&self, collection: &str, filter: &Expr) -> DocumentStoreResult<u64>;

    /// Cleanly shuts down the backend, releasing all resources.
    ///
    /// The default implementation is a no-op.
    async fn shutdown(self) -> DocumentStoreResult<()>
    where
        Self: Sized,
    {
        Ok(())
    }
}

#[async_trait]
impl<B> StoreBackend for &B
where
    B: StoreBackend,
{
    async fn create_indexes(
        &self,
        collection: &str,
        indexes: &[IndexSpec],
    ) -> DocumentStoreResult<Vec<String>> {
        (**self).create_indexes(collection, indexes).await
    }

    async fn list_indexes(&self, collection: &str) -> DocumentStoreResult<Vec<IndexSpec>> {
        (**self).list_indexes(collection).await
    }

    async fn replace_one(
        &self,
        collection: &str,
        filter: &Expr,
        replacement: BsonDocument,
        upsert: bool,
    ) -> DocumentStoreResult<WriteOutcome> {
        (**self)
            .replace_one(collection, filter, replacement, upsert)
            .await
    }

    async fn find(&self, collection: &str, query: Query) -> DocumentStoreResult<Vec<BsonDocument>> {
        (**self).find(collection, query).await
    }

    async fn find_one(
        &self,
        collection: &str,
        filter: &Expr,
    ) -> DocumentStoreResult<Option<BsonDocument>> {
        (**self).find_one(collection, filter).await
    }

    async fn update_one(
        &self,
        collection: &str,
        filter: &Expr,
        update: &Update,
    ) -> DocumentStoreResult<WriteOutcome> {
        (**self).update_one(collection, filter, update).await
    }

    async fn delete_one(&self, collection: &str, filter: &Expr) -> DocumentStoreResult<u64> {
        (**self).delete_one(collection, filter).await
    }
}

/// Factory for backend instances.
#[async_trait]
pub trait StoreBackendBuilder {
    type Backend: StoreBackend;

    async fn build(self) -> DocumentStoreResult<Self::Backend>;
}
