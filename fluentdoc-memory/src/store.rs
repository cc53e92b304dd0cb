//! In-memory storage implementation for document stores.
//!
//! Documents are kept in stored form, keyed by the string form of their `_id`, inside an
//! async-aware read-write lock. Filters are evaluated by scanning the collection.

use async_trait::async_trait;
use bson::{Bson, Document as BsonDocument};
use mea::rwlock::RwLock;
use std::{collections::BTreeMap, sync::Arc};
use tracing::debug;

use fluentdoc_core::{
    backend::{StoreBackend, StoreBackendBuilder},
    error::{DocumentStoreError, DocumentStoreResult},
    identity::key_string,
    metadata::ID_FIELD,
    query::{Expr, Query, lookup},
    schema::IndexSpec,
    update::{Update, WriteOutcome},
};

use crate::evaluator::{Comparable, DocumentEvaluator};

/// Name the server gives the implicit index on `_id`.
const ID_INDEX: &str = "_id_";

#[derive(Debug, Default)]
struct MemoryCollection {
    documents: BTreeMap<String, BsonDocument>,
    indexes: Vec<IndexSpec>,
}

impl MemoryCollection {
    fn first_match(&self, filter: &Expr) -> DocumentStoreResult<Option<String>> {
        for (key, document) in &self.documents {
            if DocumentEvaluator::matches(document, filter)? {
                return Ok(Some(key.clone()));
            }
        }

        Ok(None)
    }

    /// Fails if `candidate`, stored under `key`, would collide with another document on a
    /// unique index. Missing values count as null, as on the server.
    fn check_unique(
        &self,
        collection: &str,
        key: &str,
        candidate: &BsonDocument,
    ) -> DocumentStoreResult<()> {
        for index in self.indexes.iter().filter(|index| index.unique) {
            let value = field_value(candidate, &index.field);

            let collides = self
                .documents
                .iter()
                .filter(|(other, _)| other.as_str() != key)
                .any(|(_, document)| field_value(document, &index.field) == value);

            if collides {
                return Err(DocumentStoreError::DuplicateKey(
                    index.name(),
                    collection.to_string(),
                ));
            }
        }

        Ok(())
    }

    /// Fails if the stored documents already hold a repeated value for `index`.
    fn ensure_distinct(&self, collection: &str, index: &IndexSpec) -> DocumentStoreResult<()> {
        let mut seen = Vec::with_capacity(self.documents.len());

        for document in self.documents.values() {
            let value = field_value(document, &index.field);
            if seen.contains(&value) {
                return Err(DocumentStoreError::DuplicateKey(
                    index.name(),
                    collection.to_string(),
                ));
            }
            seen.push(value);
        }

        Ok(())
    }
}

fn field_value<'a>(document: &'a BsonDocument, field: &str) -> Comparable<'a> {
    lookup(document, field)
        .map(Comparable::from)
        .unwrap_or(Comparable::Null)
}

/// Assigns `value` at a possibly dotted path, creating intermediate documents as needed.
fn assign(document: &mut BsonDocument, path: &str, value: Bson) -> DocumentStoreResult<()> {
    match path.split_once('.') {
        None => {
            document.insert(path, value);
            Ok(())
        }
        Some((head, rest)) => {
            let child = document
                .entry(head.to_string())
                .or_insert_with(|| Bson::Document(BsonDocument::new()));

            match child {
                Bson::Document(nested) => assign(nested, rest, value),
                _ => Err(DocumentStoreError::InvalidDocument(format!(
                    "cannot set {path}: {head} is not a document"
                ))),
            }
        }
    }
}

/// Keeps `_id` and the listed fields, rebuilding the nesting of dotted paths.
fn project(document: &BsonDocument, fields: &[String]) -> DocumentStoreResult<BsonDocument> {
    let mut projected = BsonDocument::new();

    if let Some(id) = document.get(ID_FIELD) {
        projected.insert(ID_FIELD, id.clone());
    }
    for field in fields {
        if let Some(value) = lookup(document, field) {
            assign(&mut projected, field, value.clone())?;
        }
    }

    Ok(projected)
}

/// Thread-safe in-memory document storage backend.
///
/// `InMemoryStore` is cloneable and every clone shares the same underlying data, so it can
/// be handed to several stores or tasks at once. Index declarations are recorded and unique
/// indexes are enforced on every write.
///
/// # Example
///
/// ```ignore
/// use fluentdoc::{DocumentStore, memory::InMemoryStore};
///
/// let store = DocumentStore::new(InMemoryStore::new());
/// store.upsert(&entity).await?;
/// ```
#[derive(Default, Clone, Debug)]
pub struct InMemoryStore {
    /// collection name -> collection contents
    collections: Arc<RwLock<BTreeMap<String, MemoryCollection>>>,
}

impl InMemoryStore {
    /// Creates a new empty in-memory document store.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builder() -> InMemoryStoreBuilder {
        InMemoryStoreBuilder
    }

    /// Names of the collections that have been written to or indexed.
    pub async fn list_collections(&self) -> Vec<String> {
        self.collections.read().await.keys().cloned().collect()
    }
}

#[async_trait]
impl StoreBackend for InMemoryStore {
    async fn create_indexes(
        &self,
        collection: &str,
        indexes: &[IndexSpec],
    ) -> DocumentStoreResult<Vec<String>> {
        let mut collections = self.collections.write().await;
        let target = collections.entry(collection.to_string()).or_default();

        // The batch is validated as a whole; nothing is registered if any index fails
        let mut staged = target.indexes.clone();
        let mut created = Vec::new();

        for index in indexes {
            match staged.iter().find(|existing| existing.field == index.field) {
                Some(existing) if existing == index => {}
                Some(_) => {
                    return Err(DocumentStoreError::Backend(format!(
                        "an index named {} already exists with different options",
                        index.name()
                    )));
                }
                None => {
                    if index.unique {
                        target.ensure_distinct(collection, index)?;
                    }
                    staged.push(index.clone());
                    created.push(index);
                }
            }
        }

        target.indexes = staged;
        for index in created {
            debug!(collection, index = %index.name(), unique = index.unique, "created index");
        }

        Ok(indexes.iter().map(IndexSpec::name).collect())
    }

    async fn list_indexes(&self, collection: &str) -> DocumentStoreResult<Vec<IndexSpec>> {
        Ok(self
            .collections
            .read()
            .await
            .get(collection)
            .map(|target| target.indexes.clone())
            .unwrap_or_default())
    }

    async fn replace_one(
        &self,
        collection: &str,
        filter: &Expr,
        mut replacement: BsonDocument,
        upsert: bool,
    ) -> DocumentStoreResult<WriteOutcome> {
        let mut collections = self.collections.write().await;
        let target = collections.entry(collection.to_string()).or_default();

        if let Some(key) = target.first_match(filter)? {
            match replacement.get(ID_FIELD) {
                Some(id) if key_string(id).as_deref() != Some(key.as_str()) => {
                    return Err(DocumentStoreError::InvalidDocument(format!(
                        "the _id of {key} in {collection} is immutable"
                    )));
                }
                Some(_) => {}
                None => {
                    let id = target.documents[&key].get(ID_FIELD).cloned().unwrap_or(Bson::Null);
                    replacement.insert(ID_FIELD, id);
                }
            }

            target.check_unique(collection, &key, &replacement)?;

            let modified = target.documents.get(&key) != Some(&replacement);
            target.documents.insert(key, replacement);

            return Ok(WriteOutcome {
                matched: 1,
                modified: u64::from(modified),
                upserted_id: None,
            });
        }

        if !upsert {
            return Ok(WriteOutcome::default());
        }

        let key = replacement
            .get(ID_FIELD)
            .and_then(key_string)
            .ok_or_else(|| {
                DocumentStoreError::InvalidIdentity(format!(
                    "upserted document in {collection} has no usable _id"
                ))
            })?;

        if target.documents.contains_key(&key) {
            return Err(DocumentStoreError::DuplicateKey(
                ID_INDEX.to_string(),
                collection.to_string(),
            ));
        }
        target.check_unique(collection, &key, &replacement)?;
        target.documents.insert(key.clone(), replacement);

        Ok(WriteOutcome {
            matched: 0,
            modified: 0,
            upserted_id: Some(key),
        })
    }

    async fn find(&self, collection: &str, query: Query) -> DocumentStoreResult<Vec<BsonDocument>> {
        let collections = self.collections.read().await;
        let Some(target) = collections.get(collection) else {
            return Ok(vec![]);
        };

        let mut documents = Vec::new();

        for document in target.documents.values() {
            if let Some(filter) = &query.filter {
                if !DocumentEvaluator::matches(document, filter)? {
                    continue;
                }
            }

            documents.push(match &query.projection {
                Some(projection) => project(document, projection.fields())?,
                None => document.clone(),
            });
        }

        Ok(documents)
    }

    async fn find_one(
        &self,
        collection: &str,
        filter: &Expr,
    ) -> DocumentStoreResult<Option<BsonDocument>> {
        let collections = self.collections.read().await;
        let Some(target) = collections.get(collection) else {
            return Ok(None);
        };

        Ok(target
            .first_match(filter)?
            .and_then(|key| target.documents.get(&key).cloned()))
    }

    async fn update_one(
        &self,
        collection: &str,
        filter: &Expr,
        update: &Update,
    ) -> DocumentStoreResult<WriteOutcome> {
        if update.assignments().contains_key(ID_FIELD) {
            return Err(DocumentStoreError::InvalidDocument(format!(
                "the _id of documents in {collection} is immutable"
            )));
        }

        let mut collections = self.collections.write().await;
        let Some(target) = collections.get_mut(collection) else {
            return Ok(WriteOutcome::default());
        };
        let Some(key) = target.first_match(filter)? else {
            return Ok(WriteOutcome::default());
        };

        let mut updated = target.documents[&key].clone();
        for (field, value) in update.assignments() {
            assign(&mut updated, field, value.clone())?;
        }
        target.check_unique(collection, &key, &updated)?;

        let modified = target.documents.get(&key) != Some(&updated);
        target.documents.insert(key, updated);

        Ok(WriteOutcome {
            matched: 1,
            modified: u64::from(modified),
            upserted_id: None,
        })
    }

    async fn delete_one(&self, collection: &str, filter: &Expr) -> DocumentStoreResult<u64> {
        let mut collections = self.collections.write().await;
        let Some(target) = collections.get_mut(collection) else {
            return Ok(0);
        };

        Ok(match target.first_match(filter)? {
            Some(key) => u64::from(target.documents.remove(&key).is_some()),
            None => 0,
        })
    }
}

/// Builder for constructing [`InMemoryStore`] instances.
#[derive(Debug, Default)]
pub struct InMemoryStoreBuilder;

#[async_trait]
impl StoreBackendBuilder for InMemoryStoreBuilder {
    type Backend = InMemoryStore;

    async fn build(self) -> DocumentStoreResult<Self::Backend> {
        Ok(InMemoryStore::new())
    }
}

#[cfg(test)]
mod tests {
    use bson::doc;
    use fluentdoc_core::query::{Filter, Projection};

    use super::*;

    const PEOPLE: &str = "people";

    async fn seeded() -> InMemoryStore {
        let store = InMemoryStore::builder().build().await.unwrap();

        for (key, name, age) in [("k1", "Test 1", 17), ("k2", "Test 2", 71), ("k3", "Test 3", 40)] {
            store
                .replace_one(
                    PEOPLE,
                    &Filter::eq("_id", key),
                    doc! { "_id": key, "key": key, "name": name, "age": age },
                    true,
                )
                .await
                .unwrap();
        }

        store
    }

    #[tokio::test]
    async fn replace_one_reports_upserts_and_modifications() {
        let store = InMemoryStore::new();
        let filter = Filter::eq("_id", "k1");

        let inserted = store
            .replace_one(PEOPLE, &filter, doc! { "_id": "k1", "age": 1 }, true)
            .await
            .unwrap();
        assert_eq!(inserted.upserted_id.as_deref(), Some("k1"));
        assert_eq!(inserted.matched, 0);

        let unchanged = store
            .replace_one(PEOPLE, &filter, doc! { "_id": "k1", "age": 1 }, true)
            .await
            .unwrap();
        assert_eq!((unchanged.matched, unchanged.modified), (1, 0));

        let changed = store
            .replace_one(PEOPLE, &filter, doc! { "_id": "k1", "age": 2 }, true)
            .await
            .unwrap();
        assert_eq!((changed.matched, changed.modified), (1, 1));

        let found = store.find_one(PEOPLE, &filter).await.unwrap().unwrap();
        assert_eq!(found.get_i32("age").unwrap(), 2);
    }

    #[tokio::test]
    async fn replace_one_without_upsert_leaves_missing_documents_missing() {
        let store = InMemoryStore::new();
        let filter = Filter::eq("_id", "k1");

        let outcome = store
            .replace_one(PEOPLE, &filter, doc! { "_id": "k1" }, false)
            .await
            .unwrap();
        assert_eq!(outcome, WriteOutcome::default());
        assert!(store.find_one(PEOPLE, &filter).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn replacing_the_id_is_rejected() {
        let store = seeded().await;

        let err = store
            .replace_one(PEOPLE, &Filter::eq("_id", "k1"), doc! { "_id": "k9" }, true)
            .await
            .unwrap_err();
        assert!(matches!(err, DocumentStoreError::InvalidDocument(_)));
    }

    #[tokio::test]
    async fn find_applies_filter_and_projection() {
        let store = seeded().await;

        let query = Query::builder()
            .filter(Filter::gt("age", 30))
            .project(Projection::field("name"))
            .build();
        let found = store.find(PEOPLE, query).await.unwrap();

        assert_eq!(
            found,
            vec![
                doc! { "_id": "k2", "name": "Test 2" },
                doc! { "_id": "k3", "name": "Test 3" },
            ]
        );
        assert!(store.find("nothing", Query::new()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn projection_keeps_nested_paths_nested() {
        let store = seeded().await;
        store
            .update_one(
                PEOPLE,
                &Filter::eq("_id", "k1"),
                &Update::set("address", doc! { "city": "Lisbon", "zip": "1000" }),
            )
            .await
            .unwrap();

        let query = Query::builder()
            .filter(Filter::eq("_id", "k1"))
            .project(Projection::include(["address.city", "address.street"]))
            .build();
        let found = store.find(PEOPLE, query).await.unwrap();

        assert_eq!(found, vec![doc! { "_id": "k1", "address": { "city": "Lisbon" } }]);
    }

    #[tokio::test]
    async fn update_one_sets_nested_fields() {
        let store = seeded().await;
        let filter = Filter::eq("_id", "k3");

        let outcome = store
            .update_one(PEOPLE, &filter, &Update::set("age", 41).and_set("address.city", "Porto"))
            .await
            .unwrap();
        assert_eq!((outcome.matched, outcome.modified), (1, 1));

        let found = store.find_one(PEOPLE, &filter).await.unwrap().unwrap();
        assert_eq!(found.get_i32("age").unwrap(), 41);
        assert_eq!(
            found.get_document("address").unwrap().get_str("city").unwrap(),
            "Porto"
        );

        let missed = store
            .update_one(PEOPLE, &Filter::eq("_id", "nope"), &Update::set("age", 1))
            .await
            .unwrap();
        assert_eq!(missed.matched, 0);

        let err = store
            .update_one(PEOPLE, &filter, &Update::set("_id", "k4"))
            .await
            .unwrap_err();
        assert!(matches!(err, DocumentStoreError::InvalidDocument(_)));
    }

    #[tokio::test]
    async fn delete_one_removes_a_single_match() {
        let store = seeded().await;

        assert_eq!(store.delete_one(PEOPLE, &Filter::eq("_id", "k1")).await.unwrap(), 1);
        assert_eq!(store.delete_one(PEOPLE, &Filter::eq("_id", "k1")).await.unwrap(), 0);
        assert_eq!(store.find(PEOPLE, Query::new()).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn create_indexes_is_idempotent() {
        let store = InMemoryStore::new();
        let indexes = [IndexSpec::new("age"), IndexSpec::unique("name")];

        let names = store.create_indexes(PEOPLE, &indexes).await.unwrap();
        assert_eq!(names, vec!["age_1".to_string(), "name_1".to_string()]);

        store.create_indexes(PEOPLE, &indexes).await.unwrap();
        assert_eq!(store.list_indexes(PEOPLE).await.unwrap(), indexes.to_vec());

        let err = store
            .create_indexes(PEOPLE, &[IndexSpec::unique("age")])
            .await
            .unwrap_err();
        assert!(matches!(err, DocumentStoreError::Backend(_)));
    }

    #[tokio::test]
    async fn unique_indexes_reject_duplicates() {
        let store = seeded().await;
        store
            .create_indexes(PEOPLE, &[IndexSpec::unique("name")])
            .await
            .unwrap();

        let err = store
            .replace_one(
                PEOPLE,
                &Filter::eq("_id", "k4"),
                doc! { "_id": "k4", "name": "Test 1" },
                true,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DocumentStoreError::DuplicateKey(ref index, _) if index == "name_1"));

        let err = store
            .update_one(PEOPLE, &Filter::eq("_id", "k2"), &Update::set("name", "Test 3"))
            .await
            .unwrap_err();
        assert!(matches!(err, DocumentStoreError::DuplicateKey(..)));

        // Rewriting a document with its own value is fine
        store
            .update_one(PEOPLE, &Filter::eq("_id", "k2"), &Update::set("name", "Test 2"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn unique_index_on_conflicting_data_is_not_created() {
        let store = seeded().await;
        store
            .update_one(PEOPLE, &Filter::eq("_id", "k2"), &Update::set("age", 17))
            .await
            .unwrap();

        let err = store
            .create_indexes(PEOPLE, &[IndexSpec::unique("age")])
            .await
            .unwrap_err();
        assert!(matches!(err, DocumentStoreError::DuplicateKey(..)));
        assert!(store.list_indexes(PEOPLE).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn failing_index_batches_register_nothing() {
        let store = seeded().await;
        store
            .update_one(PEOPLE, &Filter::eq("_id", "k2"), &Update::set("age", 17))
            .await
            .unwrap();

        let err = store
            .create_indexes(PEOPLE, &[IndexSpec::new("name"), IndexSpec::unique("age")])
            .await
            .unwrap_err();
        assert!(matches!(err, DocumentStoreError::DuplicateKey(..)));
        assert!(store.list_indexes(PEOPLE).await.unwrap().is_empty());

        let err = store
            .create_indexes(PEOPLE, &[IndexSpec::new("key"), IndexSpec::unique("key")])
            .await
            .unwrap_err();
        assert!(matches!(err, DocumentStoreError::Backend(_)));
        assert!(store.list_indexes(PEOPLE).await.unwrap().is_empty());
    }
}
