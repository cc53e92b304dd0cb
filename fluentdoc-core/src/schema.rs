//! Declarative per-type configuration.
//!
//! A [`DocumentSchema`] is the configuration struct that describes how a document type is
//! persisted: which field is its identity, which fields carry a secondary index and which
//! fields are never written. It is normally generated by `#[derive(Document)]`, but can be
//! written by hand:
//!
//! ```ignore
//! use fluentdoc::schema::{DocumentSchema, FieldSchema};
//!
//! let schema = DocumentSchema::new()
//!     .field(FieldSchema::new("key").identity())
//!     .field(FieldSchema::new("name"))
//!     .field(FieldSchema::new("age").indexed())
//!     .field(FieldSchema::new("cache").ignored());
//! ```

/// A single-field ascending secondary index.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IndexSpec {
    /// The indexed field name, as stored.
    pub field: String,
    /// Whether the index enforces uniqueness.
    pub unique: bool,
}

impl IndexSpec {
    pub fn new(field: impl Into<String>) -> Self {
        Self { field: field.into(), unique: false }
    }

    pub fn unique(field: impl Into<String>) -> Self {
        Self { field: field.into(), unique: true }
    }

    /// The index name, following the server's default `<field>_1` convention.
    pub fn name(&self) -> String {
        format!("{}_1", self.field)
    }
}

/// Persistence settings for one field of a document type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSchema {
    /// The field name as it appears in the serialized document.
    pub name: &'static str,
    /// Whether this field is the document's identity.
    pub identity: bool,
    /// Whether a secondary index is declared on this field, and if it is unique.
    pub index: Option<bool>,
    /// Whether this field is excluded from persistence.
    pub ignored: bool,
}

impl FieldSchema {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            identity: false,
            index: None,
            ignored: false,
        }
    }

    /// Marks this field as the identity field.
    pub fn identity(mut self) -> Self {
        self.identity = true;
        self
    }

    /// Declares a secondary index on this field.
    pub fn indexed(mut self) -> Self {
        self.index.get_or_insert(false);
        self
    }

    /// Declares a unique secondary index on this field.
    pub fn unique(mut self) -> Self {
        self.index = Some(true);
        self
    }

    /// Excludes this field from persistence.
    pub fn ignored(mut self) -> Self {
        self.ignored = true;
        self
    }

    /// The index declared on this field, if any.
    pub fn index_spec(&self) -> Option<IndexSpec> {
        self.index.map(|unique| IndexSpec {
            field: self.name.to_string(),
            unique,
        })
    }
}

/// Ordered collection of [`FieldSchema`] entries for a document type.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentSchema {
    fields: Vec<FieldSchema>,
}

impl DocumentSchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a field declaration.
    pub fn field(mut self, field: FieldSchema) -> Self {
        self.fields.push(field);
        self
    }

    pub fn fields(&self) -> &[FieldSchema] {
        &self.fields
    }

    /// Every field declared as identity, in declaration order.
    pub fn identity_fields(&self) -> Vec<&'static str> {
        self.fields
            .iter()
            .filter(|f| f.identity)
            .map(|f| f.name)
            .collect()
    }

    pub fn indexes(&self) -> Vec<IndexSpec> {
        self.fields
            .iter()
            .filter_map(FieldSchema::index_spec)
            .collect()
    }

    pub fn ignored_fields(&self) -> Vec<&'static str> {
        self.fields
            .iter()
            .filter(|f| f.ignored)
            .map(|f| f.name)
            .collect()
    }
}
