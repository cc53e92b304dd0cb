//! Main document store interface.
//!
//! [`DocumentStore`] wraps a backend and resolves typed collections on demand. Resolution
//! is memoized per document type: the first call creates every declared secondary index,
//! later calls return the cached handle.
//!
//! # Example
//!
//! ```ignore
//! use fluentdoc::{prelude::*, memory::InMemoryStore};
//!
//! let store = DocumentStore::new(InMemoryStore::builder().build().await?);
//!
//! store.upsert(&Entity { key: "k1".into(), name: "Test 1".into(), age: 17 }).await?;
//! let entity = store.get::<Entity>("k1").await?;
//! let young: Vec<i32> = store.get_vector_where::<Entity, _>("age", Filter::lt("age", 20)).await?;
//! ```

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::{any::TypeId, sync::Arc};
use tracing::debug;

use crate::{
    backend::StoreBackend,
    collection::{CollectionHandle, TypedCollection},
    document::Document,
    error::DocumentStoreResult,
    metadata::entity_metadata,
    query::Expr,
    update::WriteOutcome,
};

/// A document store bound to a specific backend implementation.
#[derive(Debug)]
pub struct DocumentStore<B: StoreBackend> {
    backend: B,
    collections: DashMap<TypeId, Arc<CollectionHandle>>,
}

impl<B: StoreBackend> DocumentStore<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            collections: DashMap::new(),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Resolves the collection that stores `D`.
    ///
    /// The first resolution of a type validates its metadata and creates its declared
    /// indexes; the handle is then cached. If two tasks race on the first resolution, both
    /// create the (idempotent) indexes and the first cached handle wins.
    ///
    /// # Errors
    ///
    /// Fails if `D` is misconfigured (e.g. declares no identity field), or if index
    /// creation fails. Failures are not cached.
    pub async fn collection<D: Document>(&self) -> DocumentStoreResult<TypedCollection<'_, B, D>> {
        Ok(TypedCollection::new(self.resolve::<D>().await?, &self.backend))
    }

    async fn resolve<D: Document>(&self) -> DocumentStoreResult<Arc<CollectionHandle>> {
        let type_id = TypeId::of::<D>();

        if let Some(handle) = self.collections.get(&type_id) {
            return Ok(handle.value().clone());
        }

        let metadata = entity_metadata::<D>()?;
        let indexes = if metadata.indexes().is_empty() {
            Vec::new()
        } else {
            self.backend
                .create_indexes(metadata.collection(), metadata.indexes())
                .await?
        };

        debug!(collection = metadata.collection(), ?indexes, "resolved collection");

        Ok(self
            .collections
            .entry(type_id)
            .or_insert_with(|| Arc::new(CollectionHandle::new(metadata, indexes)))
            .value()
            .clone())
    }

    /// See [`TypedCollection::upsert`].
    pub async fn upsert<D: Document>(&self, entity: &D) -> DocumentStoreResult<WriteOutcome> {
        self.collection::<D>().await?.upsert(entity).await
    }

    /// See [`TypedCollection::get`].
    pub async fn get<D: Document>(&self, key: &str) -> DocumentStoreResult<Option<D>> {
        self.collection::<D>().await?.get(key).await
    }

    pub async fn get_all<D: Document>(&self) -> DocumentStoreResult<Vec<D>> {
        self.collection::<D>().await?.get_all().await
    }

    pub async fn get_all_where<D: Document>(&self, filter: Expr) -> DocumentStoreResult<Vec<D>> {
        self.collection::<D>().await?.get_all_where(filter).await
    }

    /// See [`TypedCollection::get_vector`].
    pub async fn get_vector<D, T>(&self, field: &str) -> DocumentStoreResult<Vec<T>>
    where
        D: Document,
        T: for<'de> Deserialize<'de>,
    {
        self.collection::<D>().await?.get_vector(field).await
    }

    pub async fn get_vector_where<D, T>(
        &self,
        field: &str,
        filter: Expr,
    ) -> DocumentStoreResult<Vec<T>>
    where
        D: Document,
        T: for<'de> Deserialize<'de>,
    {
        self.collection::<D>()
            .await?
            .get_vector_where(field, filter)
            .await
    }

    /// See [`TypedCollection::set_field`].
    pub async fn set_field<D, V>(&self, key: &str, field: &str, value: V) -> DocumentStoreResult<bool>
    where
        D: Document,
        V: Serialize,
    {
        self.collection::<D>()
            .await?
            .set_field(key, field, value)
            .await
    }

    pub async fn delete<D: Document>(&self, key: &str) -> DocumentStoreResult<bool> {
        self.collection::<D>().await?.delete(key).await
    }

    /// Shuts down the underlying backend.
    pub async fn shutdown(self) -> DocumentStoreResult<()> {
        self.backend.shutdown().await
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use bson::Document as BsonDocument;
    use serde::{Deserialize, Serialize};
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::{
        error::DocumentStoreError,
        query::Query,
        schema::{DocumentSchema, FieldSchema, IndexSpec},
        update::Update,
    };

    #[derive(Debug, Default)]
    struct CountingBackend {
        index_calls: AtomicUsize,
    }

    #[async_trait]
    impl StoreBackend for CountingBackend {
        async fn create_indexes(
            &self,
            _collection: &str,
            indexes: &[IndexSpec],
        ) -> DocumentStoreResult<Vec<String>> {
            self.index_calls.fetch_add(1, Ordering::SeqCst);
            Ok(indexes.iter().map(IndexSpec::name).collect())
        }

        async fn list_indexes(&self, _collection: &str) -> DocumentStoreResult<Vec<IndexSpec>> {
            Ok(Vec::new())
        }

        async fn replace_one(
            &self,
            _collection: &str,
            _filter: &Expr,
            _replacement: BsonDocument,
            _upsert: bool,
        ) -> DocumentStoreResult<WriteOutcome> {
            Ok(WriteOutcome::default())
        }

        async fn find(&self, _collection: &str, _query: Query) -> DocumentStoreResult<Vec<BsonDocument>> {
            Ok(Vec::new())
        }

        async fn find_one(
            &self,
            _collection: &str,
            _filter: &Expr,
        ) -> DocumentStoreResult<Option<BsonDocument>> {
            Ok(None)
        }

        async fn update_one(
            &self,
            _collection: &str,
            _filter: &Expr,
            _update: &Update,
        ) -> DocumentStoreResult<WriteOutcome> {
            Ok(WriteOutcome::default())
        }

        async fn delete_one(&self, _collection: &str, _filter: &Expr) -> DocumentStoreResult<u64> {
            Ok(0)
        }
    }

    #[derive(Debug, Serialize, Deserialize)]
    struct Sensor {
        serial: String,
        zone: String,
        reading: f64,
    }

    impl Document for Sensor {
        fn collection_name() -> &'static str {
            "sensors"
        }

        fn schema() -> DocumentSchema {
            DocumentSchema::new()
                .field(FieldSchema::new("serial").identity())
                .field(FieldSchema::new("zone").indexed())
                .field(FieldSchema::new("reading").indexed())
        }
    }

    #[derive(Debug, Serialize, Deserialize)]
    struct Orphan {
        value: i32,
    }

    impl Document for Orphan {
        fn collection_name() -> &'static str {
            "orphans"
        }

        fn schema() -> DocumentSchema {
            DocumentSchema::new().field(FieldSchema::new("value").indexed())
        }
    }

    #[tokio::test]
    async fn resolution_creates_indexes_once() {
        let store = DocumentStore::new(CountingBackend::default());

        let first = store.collection::<Sensor>().await.unwrap();
        assert_eq!(first.name(), "sensors");
        assert_eq!(
            first.handle().created_indexes(),
            &["zone_1".to_string(), "reading_1".to_string()]
        );

        store.collection::<Sensor>().await.unwrap();
        store.get::<Sensor>("s1").await.unwrap();

        assert_eq!(store.backend().index_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn misconfigured_type_fails_before_touching_the_backend() {
        let store = DocumentStore::new(CountingBackend::default());

        let err = store.collection::<Orphan>().await.unwrap_err();
        assert!(matches!(err, DocumentStoreError::MissingIdentity(_)));

        let err = store.get::<Orphan>("x").await.unwrap_err();
        assert!(matches!(err, DocumentStoreError::MissingIdentity(_)));

        assert_eq!(store.backend().index_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn set_field_rejects_identity_and_reports_misses() {
        let store = DocumentStore::new(CountingBackend::default());

        let err = store
            .set_field::<Sensor, _>("s1", "serial", "s2")
            .await
            .unwrap_err();
        assert!(matches!(err, DocumentStoreError::InvalidField(..)));

        assert!(!store.set_field::<Sensor, _>("s1", "zone", "north").await.unwrap());
    }
}
