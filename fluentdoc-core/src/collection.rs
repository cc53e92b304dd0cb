//! Typed collection helpers.
//!
//! A [`TypedCollection`] pairs a resolved [`CollectionHandle`] with a backend and exposes
//! the key-based CRUD helpers for one document type.
//!
//! # Example
//!
//! ```ignore
//! let entities = store.collection::<Entity>().await?;
//!
//! entities.upsert(&Entity { key: "k1".into(), name: "Test 1".into(), age: 17 }).await?;
//! let found = entities.get("k1").await?;
//! let old = entities.get_all_where(Filter::gt("age", 70)).await?;
//! let ages: Vec<i32> = entities.get_vector("age").await?;
//! let matched = entities.set_field("k1", "age", 18).await?;
//! ```

use bson::{Bson, de::deserialize_from_bson, ser::serialize_to_bson};
use serde::{Deserialize, Serialize};
use std::{marker::PhantomData, sync::Arc};
use tracing::trace;

use crate::{
    backend::StoreBackend,
    document::Document,
    error::{DocumentStoreError, DocumentStoreResult},
    identity::key_filter,
    metadata::{EntityMetadata, ID_FIELD},
    query::{Expr, Projection, Query, lookup},
    schema::IndexSpec,
    update::{Update, WriteOutcome},
};

/// A collection resolved for a document type: its name, metadata and created indexes.
#[derive(Debug)]
pub struct CollectionHandle {
    name: String,
    metadata: Arc<EntityMetadata>,
    indexes: Vec<String>,
}

impl CollectionHandle {
    pub fn new(metadata: Arc<EntityMetadata>, indexes: Vec<String>) -> Self {
        Self {
            name: metadata.collection().to_string(),
            metadata,
            indexes,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn metadata(&self) -> &EntityMetadata {
        &self.metadata
    }

    /// Names of the indexes created when the collection was resolved.
    pub fn created_indexes(&self) -> &[String] {
        &self.indexes
    }
}

/// A type-safe view of the collection that stores `D`.
#[derive(Debug)]
pub struct TypedCollection<'a, B: StoreBackend, D: Document> {
    handle: Arc<CollectionHandle>,
    backend: &'a B,
    _marker: PhantomData<D>,
}

impl<'a, B: StoreBackend, D: Document> TypedCollection<'a, B, D> {
    pub fn new(handle: Arc<CollectionHandle>, backend: &'a B) -> Self {
        Self {
            handle,
            backend,
            _marker: PhantomData,
        }
    }

    pub fn name(&self) -> &str {
        self.handle.name()
    }

    pub fn handle(&self) -> &CollectionHandle {
        &self.handle
    }

    /// Lists the secondary indexes currently present on the collection.
    pub async fn indexes(&self) -> DocumentStoreResult<Vec<IndexSpec>> {
        self.backend.list_indexes(self.name()).await
    }

    /// Replaces the stored record with the same identity as `entity`, inserting it if absent.
    pub async fn upsert(&self, entity: &D) -> DocumentStoreResult<WriteOutcome> {
        let (key, document) = self.handle.metadata.encode(entity)?;
        trace!(collection = self.name(), %key, "upsert");

        self.backend
            .replace_one(self.name(), &key_filter(key), document, true)
            .await
    }

    /// Fetches the record stored under `key`.
    pub async fn get(&self, key: &str) -> DocumentStoreResult<Option<D>> {
        trace!(collection = self.name(), key, "get");

        self.backend
            .find_one(self.name(), &key_filter(key))
            .await?
            .map(|document| self.handle.metadata.decode(document))
            .transpose()
    }

    pub async fn get_all(&self) -> DocumentStoreResult<Vec<D>> {
        self.fetch(None).await
    }

    pub async fn get_all_where(&self, filter: Expr) -> DocumentStoreResult<Vec<D>> {
        self.fetch(Some(filter)).await
    }

    /// Returns the values of a single field across every record.
    ///
    /// Records lacking the field yield `null`, which only deserializes into option-like
    /// targets. The identity field is read from its stored key, so its values are strings.
    pub async fn get_vector<T>(&self, field: &str) -> DocumentStoreResult<Vec<T>>
    where
        T: for<'de> Deserialize<'de>,
    {
        self.vector(field, None).await
    }

    /// Like [`get_vector`](Self::get_vector), restricted to records matching `filter`.
    pub async fn get_vector_where<T>(&self, field: &str, filter: Expr) -> DocumentStoreResult<Vec<T>>
    where
        T: for<'de> Deserialize<'de>,
    {
        self.vector(field, Some(filter)).await
    }

    /// Sets one field on the record stored under `key`.
    ///
    /// Returns whether a record matched. The identity field and ignored fields cannot be set.
    pub async fn set_field<V: Serialize>(
        &self,
        key: &str,
        field: &str,
        value: V,
    ) -> DocumentStoreResult<bool> {
        let metadata = self.handle.metadata();
        if field == metadata.identity() || field == ID_FIELD || metadata.is_ignored(field) {
            return Err(DocumentStoreError::InvalidField(
                field.to_string(),
                self.name().to_string(),
            ));
        }

        trace!(collection = self.name(), key, field, "set field");
        let update = Update::set(field, serialize_to_bson(&value)?);

        Ok(self
            .backend
            .update_one(self.name(), &key_filter(key), &update)
            .await?
            .matched
            > 0)
    }

    /// Deletes the record stored under `key`, returning whether one was removed.
    pub async fn delete(&self, key: &str) -> DocumentStoreResult<bool> {
        trace!(collection = self.name(), key, "delete");

        Ok(self
            .backend
            .delete_one(self.name(), &key_filter(key))
            .await?
            > 0)
    }

    async fn fetch(&self, filter: Option<Expr>) -> DocumentStoreResult<Vec<D>> {
        trace!(collection = self.name(), filtered = filter.is_some(), "get all");

        self.backend
            .find(self.name(), Query::builder().maybe_filter(filter).build())
            .await?
            .into_iter()
            .map(|document| self.handle.metadata.decode(document))
            .collect()
    }

    async fn vector<T>(&self, field: &str, filter: Option<Expr>) -> DocumentStoreResult<Vec<T>>
    where
        T: for<'de> Deserialize<'de>,
    {
        if self.handle.metadata.is_ignored(field) {
            return Err(DocumentStoreError::InvalidField(
                field.to_string(),
                self.name().to_string(),
            ));
        }

        let target = self.handle.metadata.storage_field(field);
        trace!(collection = self.name(), field = target, "get vector");

        let query = Query::builder()
            .maybe_filter(filter)
            .project(Projection::field(target))
            .build();

        self.backend
            .find(self.name(), query)
            .await?
            .into_iter()
            .map(|document| {
                let value = lookup(&document, target).cloned().unwrap_or(Bson::Null);
                Ok(deserialize_from_bson(value)?)
            })
            .collect()
    }
}
