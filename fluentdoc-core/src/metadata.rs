//! Resolved per-type metadata and the process-wide registry that memoizes it.
//!
//! [`entity_metadata`] validates a type's [`DocumentSchema`] the first time the type is used
//! and caches the result for the rest of the process. Invalid configurations are never
//! cached, so every use of a misconfigured type fails the same way.

use bson::{Bson, Document as BsonDocument, de::deserialize_from_bson, ser::serialize_to_bson};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::{
    any::{TypeId, type_name},
    sync::{Arc, LazyLock},
};
use tracing::error;

use crate::{
    document::Document,
    error::{DocumentStoreError, DocumentStoreResult},
    identity::key_string,
    schema::{DocumentSchema, IndexSpec},
};

/// The reserved key the identity value is stored under.
pub const ID_FIELD: &str = "_id";

static REGISTRY: LazyLock<DashMap<TypeId, Arc<EntityMetadata>>> = LazyLock::new(DashMap::new);

/// Validated persistence metadata of a document type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityMetadata {
    type_name: &'static str,
    collection: &'static str,
    identity: &'static str,
    indexes: Vec<IndexSpec>,
    ignored: Vec<&'static str>,
}

impl EntityMetadata {
    /// Validates `schema` and extracts the metadata.
    ///
    /// # Errors
    ///
    /// - [`DocumentStoreError::MissingIdentity`] if no field is declared as identity.
    /// - [`DocumentStoreError::DuplicateIdentity`] if more than one is.
    /// - [`DocumentStoreError::InvalidSchema`] if the identity or an indexed field is ignored.
    pub fn from_schema(
        type_name: &'static str,
        collection: &'static str,
        schema: &DocumentSchema,
    ) -> DocumentStoreResult<Self> {
        let identities = schema.identity_fields();
        let identity = match identities.as_slice() {
            [] => return Err(DocumentStoreError::MissingIdentity(type_name)),
            [identity] => *identity,
            _ => return Err(DocumentStoreError::DuplicateIdentity(type_name, identities)),
        };

        let ignored = schema.ignored_fields();
        if ignored.contains(&identity) {
            return Err(DocumentStoreError::InvalidSchema(
                type_name,
                format!("identity field {identity} is ignored"),
            ));
        }

        let indexes = schema.indexes();
        if let Some(index) = indexes
            .iter()
            .find(|index| ignored.contains(&index.field.as_str()))
        {
            return Err(DocumentStoreError::InvalidSchema(
                type_name,
                format!("index declared on ignored field {}", index.field),
            ));
        }

        Ok(Self {
            type_name,
            collection,
            identity,
            indexes,
            ignored,
        })
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn collection(&self) -> &'static str {
        self.collection
    }

    /// The name of the identity field as declared on the type.
    pub fn identity(&self) -> &'static str {
        self.identity
    }

    pub fn indexes(&self) -> &[IndexSpec] {
        &self.indexes
    }

    pub fn ignored(&self) -> &[&'static str] {
        &self.ignored
    }

    /// Whether `field`, or the field a dotted path starts from, is excluded from storage.
    pub fn is_ignored(&self, field: &str) -> bool {
        let root = field.split('.').next().unwrap_or(field);
        self.ignored.contains(&root)
    }

    /// Maps the identity field to [`ID_FIELD`], leaving every other field untouched.
    pub fn storage_field<'a>(&self, field: &'a str) -> &'a str {
        if field == self.identity { ID_FIELD } else { field }
    }

    /// Serializes `entity` into its stored form and extracts its identity key.
    ///
    /// Ignored fields are dropped and the key is mirrored under [`ID_FIELD`].
    pub fn encode<D: Serialize>(&self, entity: &D) -> DocumentStoreResult<(String, BsonDocument)> {
        let mut document = match serialize_to_bson(entity)? {
            Bson::Document(document) => document,
            other => {
                return Err(DocumentStoreError::InvalidDocument(format!(
                    "{} serialized to {:?}, expected a document",
                    self.type_name,
                    other.element_type()
                )));
            }
        };

        for field in &self.ignored {
            document.remove(*field);
        }

        let key = match document.get(self.identity) {
            // The key replaces the stored value, so only strings survive a round trip
            Some(value) if self.identity == ID_FIELD && !matches!(value, Bson::String(_)) => {
                return Err(DocumentStoreError::InvalidIdentity(format!(
                    "{}.{ID_FIELD} must hold a string",
                    self.type_name
                )));
            }
            Some(value) => key_string(value).ok_or_else(|| {
                DocumentStoreError::InvalidIdentity(format!(
                    "{}.{} holds unsupported value {value}",
                    self.type_name, self.identity
                ))
            })?,
            None => {
                return Err(DocumentStoreError::InvalidIdentity(format!(
                    "{}.{} is missing",
                    self.type_name, self.identity
                )));
            }
        };

        document.insert(ID_FIELD, key.clone());

        Ok((key, document))
    }

    /// Rebuilds an entity from its stored form.
    pub fn decode<D>(&self, mut document: BsonDocument) -> DocumentStoreResult<D>
    where
        D: for<'de> Deserialize<'de>,
    {
        if self.identity != ID_FIELD {
            document.remove(ID_FIELD);
        }

        Ok(deserialize_from_bson(Bson::Document(document))?)
    }
}

/// Resolves the metadata of `D`, memoized for the lifetime of the process.
///
/// # Errors
///
/// Returns the configuration error raised by [`EntityMetadata::from_schema`].
pub fn entity_metadata<D: Document>() -> DocumentStoreResult<Arc<EntityMetadata>> {
    let type_id = TypeId::of::<D>();

    if let Some(metadata) = REGISTRY.get(&type_id) {
        return Ok(metadata.value().clone());
    }

    let metadata = EntityMetadata::from_schema(type_name::<D>(), D::collection_name(), &D::schema())
        .inspect_err(|err| {
            error!(type_name = type_name::<D>(), %err, "invalid document configuration");
        })?;

    Ok(REGISTRY
        .entry(type_id)
        .or_insert_with(|| Arc::new(metadata))
        .value()
        .clone())
}
