//! Core traits for document types.
//!
//! A document type is any serde record that can say which collection it lives in and how
//! its fields are persisted. Both are usually generated by `#[derive(Document)]`.

use bson::Document as BsonDocument;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::{
    error::DocumentStoreResult,
    metadata::{EntityMetadata, entity_metadata},
    schema::DocumentSchema,
};

/// Core trait that all documents stored in a document store must implement.
///
/// # Example
///
/// ```ignore
/// use fluentdoc::prelude::*;
/// use serde::{Serialize, Deserialize};
///
/// #[derive(Debug, Clone, Serialize, Deserialize, Document)]
/// #[document(collection = "entities")]
/// pub struct Entity {
///     #[document(id)]
///     pub key: String,
///     pub name: String,
///     #[document(index)]
///     pub age: i32,
/// }
/// ```
///
/// The same configuration written by hand:
///
/// ```ignore
/// impl Document for Entity {
///     fn collection_name() -> &'static str {
///         "entities"
///     }
///
///     fn schema() -> DocumentSchema {
///         DocumentSchema::new()
///             .field(FieldSchema::new("key").identity())
///             .field(FieldSchema::new("name"))
///             .field(FieldSchema::new("age").indexed())
///     }
/// }
/// ```
pub trait Document: Serialize + for<'de> Deserialize<'de> + Send + Sync + 'static {
    /// Returns the name of the collection this document belongs to.
    fn collection_name() -> &'static str;

    /// Returns the persistence configuration of this document type.
    ///
    /// Exactly one field must be declared as identity. This is checked the first time the
    /// type is used, not at compile time.
    fn schema() -> DocumentSchema;
}

/// Metadata-aware conversions, implemented for every [`Document`].
pub trait DocumentExt: Document {
    /// The cached metadata of this type, resolving it on first use.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the type's schema is invalid.
    fn metadata() -> DocumentStoreResult<Arc<EntityMetadata>>;

    /// The identity value of this document, as an opaque string key.
    fn identity_key(&self) -> DocumentStoreResult<String>;

    /// Converts this document to its stored form.
    fn to_document(&self) -> DocumentStoreResult<BsonDocument>;

    /// Rebuilds a document from its stored form.
    fn from_document(document: BsonDocument) -> DocumentStoreResult<Self>;
}

impl<D: Document> DocumentExt for D {
    fn metadata() -> DocumentStoreResult<Arc<EntityMetadata>> {
        entity_metadata::<D>()
    }

    fn identity_key(&self) -> DocumentStoreResult<String> {
        Ok(Self::metadata()?.encode(self)?.0)
    }

    fn to_document(&self) -> DocumentStoreResult<BsonDocument> {
        Ok(Self::metadata()?.encode(self)?.1)
    }

    fn from_document(document: BsonDocument) -> DocumentStoreResult<Self> {
        Self::metadata()?.decode(document)
    }
}
