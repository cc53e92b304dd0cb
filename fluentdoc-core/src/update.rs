//! Field updates and write results.

use bson::{Bson, Document as BsonDocument, doc};

/// A `$set` update: assigns new values to one or more fields.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Update {
    set: BsonDocument,
}

impl Update {
    pub fn set(field: impl Into<String>, value: impl Into<Bson>) -> Self {
        Self::default().and_set(field, value)
    }

    pub fn and_set(mut self, field: impl Into<String>, value: impl Into<Bson>) -> Self {
        self.set.insert(field.into(), value.into());
        self
    }

    /// The field assignments, keyed by field name.
    pub fn assignments(&self) -> &BsonDocument {
        &self.set
    }

    /// The update in the server's `{ "$set": { .. } }` form.
    pub fn to_document(&self) -> BsonDocument {
        doc! { "$set": self.set.clone() }
    }
}

/// What a single-document write did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteOutcome {
    /// Number of documents matched by the filter.
    pub matched: u64,
    /// Number of matched documents whose content changed.
    pub modified: u64,
    /// Identity of the document inserted by an upsert, if one was.
    pub upserted_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chained_sets_accumulate() {
        let update = Update::set("age", 18).and_set("name", "Test");
        assert_eq!(
            update.to_document(),
            doc! { "$set": { "age": 18, "name": "Test" } }
        );
    }
}
