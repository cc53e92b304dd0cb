//! Error types and result types for document store operations.
//!
//! Configuration errors ([`DocumentStoreError::MissingIdentity`] and friends) are raised
//! the first time a misconfigured type is used. Everything reported by the underlying
//! client is passed through as [`DocumentStoreError::Backend`] with its original message.

use bson::error::Error as BsonError;
use thiserror::Error;

/// Represents all possible errors that can occur when interacting with a document store.
#[derive(Error, Debug)]
pub enum DocumentStoreError {
    /// Serialization/deserialization error when converting between Rust values and BSON.
    #[error("Serialization error: {0}")]
    Serialization(String),
    /// Error during store initialization or connection setup.
    #[error("Initialization error: {0}")]
    Initialization(String),
    /// The document type does not declare an identity field.
    #[error("No identity field declared on {0}")]
    MissingIdentity(&'static str),
    /// The document type declares more than one identity field.
    /// The first argument is the type name, the second the offending fields.
    #[error("Multiple identity fields declared on {0}: {1:?}")]
    DuplicateIdentity(&'static str, Vec<&'static str>),
    /// The declared schema is contradictory (e.g. an ignored identity field).
    #[error("Invalid schema for {0}: {1}")]
    InvalidSchema(&'static str, String),
    /// The identity value of a document is missing or cannot be used as a key.
    #[error("Invalid identity value: {0}")]
    InvalidIdentity(String),
    /// The field cannot be targeted by the requested operation.
    /// The first argument is the field name, the second is the collection name.
    #[error("Field {0} cannot be targeted in collection {1}")]
    InvalidField(String, String),
    /// The document violates schema constraints or has invalid structure.
    #[error("Invalid document: {0}")]
    InvalidDocument(String),
    /// A write would violate a unique index.
    /// The first argument is the index name, the second is the collection name.
    #[error("Duplicate key for index {0} in collection {1}")]
    DuplicateKey(String, String),
    /// An error occurred in the underlying storage backend.
    #[error("Backend error: {0}")]
    Backend(String),
}

/// A specialized `Result` type for document store operations.
pub type DocumentStoreResult<T> = Result<T, DocumentStoreError>;

impl From<BsonError> for DocumentStoreError {
    fn from(err: BsonError) -> Self {
        DocumentStoreError::Serialization(err.to_string())
    }
}
