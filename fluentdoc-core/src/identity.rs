//! Identity keys and the equality filters built from them.
//!
//! Identity values are compared as opaque strings, whatever their declared type. A filter
//! can be built from a live entity or from a raw key:
//!
//! ```ignore
//! use fluentdoc::identity::{IdFilter, KeyFilter};
//!
//! let by_entity = entity.id_filter()?;
//! let by_key = "k1".id_filter_for::<Entity>()?;
//! assert_eq!(by_entity, by_key);
//! ```

use bson::Bson;

use crate::{
    document::Document,
    error::DocumentStoreResult,
    metadata::{ID_FIELD, entity_metadata},
    query::{Expr, Filter},
};

/// Converts an identity value into its opaque string key.
///
/// Strings are used as-is, integers in decimal form and object ids in hex form. Any other
/// value (including null) has no key.
pub fn key_string(value: &Bson) -> Option<String> {
    match value {
        Bson::String(key) => Some(key.clone()),
        Bson::Int32(key) => Some(key.to_string()),
        Bson::Int64(key) => Some(key.to_string()),
        Bson::ObjectId(key) => Some(key.to_hex()),
        _ => None,
    }
}

/// The equality filter on the stored identity key.
pub fn key_filter(key: impl Into<String>) -> Expr {
    Filter::eq(ID_FIELD, key.into())
}

/// Maps a field of `D` to the name it is queried under in storage.
///
/// The identity field maps to `_id`; any other name is returned unchanged.
pub fn storage_field<D: Document>(field: &str) -> DocumentStoreResult<&str> {
    Ok(entity_metadata::<D>()?.storage_field(field))
}

/// Builds the identity filter of a live entity.
pub trait IdFilter {
    fn id_filter(&self) -> DocumentStoreResult<Expr>;
}

impl<D: Document> IdFilter for D {
    fn id_filter(&self) -> DocumentStoreResult<Expr> {
        let (key, _) = entity_metadata::<D>()?.encode(self)?;
        Ok(key_filter(key))
    }
}

/// Builds the identity filter of a raw key for a given document type.
pub trait KeyFilter {
    /// # Errors
    ///
    /// Fails if `D` has no valid identity declaration, even though the key itself is not
    /// inspected.
    fn id_filter_for<D: Document>(&self) -> DocumentStoreResult<Expr>;
}

impl<K: AsRef<str> + ?Sized> KeyFilter for K {
    fn id_filter_for<D: Document>(&self) -> DocumentStoreResult<Expr> {
        entity_metadata::<D>()?;
        Ok(key_filter(self.as_ref()))
    }
}

#[cfg(test)]
mod tests {
    use serde::{Deserialize, Serialize};

    use super::*;
    use crate::{
        error::DocumentStoreError,
        schema::{DocumentSchema, FieldSchema},
    };

    #[derive(Debug, Serialize, Deserialize)]
    struct Account {
        handle: String,
        balance: i64,
    }

    impl Document for Account {
        fn collection_name() -> &'static str {
            "accounts"
        }

        fn schema() -> DocumentSchema {
            DocumentSchema::new()
                .field(FieldSchema::new("handle").identity())
                .field(FieldSchema::new("balance"))
        }
    }

    #[derive(Debug, Serialize, Deserialize)]
    struct Anonymous {
        balance: i64,
    }

    impl Document for Anonymous {
        fn collection_name() -> &'static str {
            "anonymous"
        }

        fn schema() -> DocumentSchema {
            DocumentSchema::new().field(FieldSchema::new("balance"))
        }
    }

    #[test]
    fn entity_and_key_filters_agree() {
        let account = Account {
            handle: "ada".to_string(),
            balance: 10,
        };

        let by_entity = account.id_filter().unwrap();
        let by_key = "ada".id_filter_for::<Account>().unwrap();

        assert_eq!(by_entity, by_key);
        assert_eq!(by_key, Filter::eq("_id", "ada"));
    }

    #[test]
    fn key_filter_fails_fast_without_identity() {
        let err = "x".id_filter_for::<Anonymous>().unwrap_err();
        assert!(matches!(err, DocumentStoreError::MissingIdentity(_)));

        let err = Anonymous { balance: 1 }.id_filter().unwrap_err();
        assert!(matches!(err, DocumentStoreError::MissingIdentity(_)));
    }

    #[test]
    fn storage_field_renames_identity() {
        assert_eq!(storage_field::<Account>("handle").unwrap(), "_id");
        assert_eq!(storage_field::<Account>("balance").unwrap(), "balance");
    }

    #[test]
    fn unsupported_values_have_no_key() {
        assert_eq!(key_string(&Bson::Null), None);
        assert_eq!(key_string(&Bson::Double(1.5)), None);
        assert_eq!(key_string(&Bson::Int32(7)), Some("7".to_string()));
    }
}
