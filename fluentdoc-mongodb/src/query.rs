//! Query translation from fluentdoc expressions to MongoDB query syntax.

use bson::{Bson, Document, doc};
use regex::escape;

use fluentdoc_core::{
    error::DocumentStoreError,
    query::{Expr, FieldOp, QueryVisitor},
};

/// Translates fluentdoc query expressions into MongoDB query documents.
///
/// String operators become anchored, escaped regular expressions, so user input is always
/// matched literally.
pub(crate) struct MongoQueryTranslator;

impl MongoQueryTranslator {
    /// Translates an optional filter; no filter matches every document.
    pub fn translate(filter: Option<&Expr>) -> Result<Document, DocumentStoreError> {
        match filter {
            Some(expr) => MongoQueryTranslator.visit_expr(expr),
            None => Ok(doc! {}),
        }
    }

    fn visit_all(&mut self, exprs: &[Expr]) -> Result<Vec<Document>, DocumentStoreError> {
        exprs.iter().map(|expr| self.visit_expr(expr)).collect()
    }
}

impl QueryVisitor for MongoQueryTranslator {
    type Output = Document;
    type Error = DocumentStoreError;

    fn visit_and(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        Ok(doc! { "$and": self.visit_all(exprs)? })
    }

    fn visit_or(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        Ok(doc! { "$or": self.visit_all(exprs)? })
    }

    // `$not` only applies to operator expressions, `$nor` negates a whole clause
    fn visit_not(&mut self, expr: &Expr) -> Result<Self::Output, Self::Error> {
        let clause = self.visit_expr(expr)?;
        Ok(doc! { "$nor": [clause] })
    }

    fn visit_exists(&mut self, field: &str, should_exist: bool) -> Result<Self::Output, Self::Error> {
        Ok(doc! {
            field: { "$exists": should_exist },
        })
    }

    fn visit_field(&mut self, field: &str, op: &FieldOp, value: &Bson) -> Result<Self::Output, Self::Error> {
        Ok(doc! {
            field: match op {
                FieldOp::Eq => doc! { "$eq": value },
                FieldOp::Ne => doc! { "$ne": value },
                FieldOp::Gt => doc! { "$gt": value },
                FieldOp::Gte => doc! { "$gte": value },
                FieldOp::Lt => doc! { "$lt": value },
                FieldOp::Lte => doc! { "$lte": value },
                FieldOp::Contains => match value {
                    Bson::String(s) => doc! { "$regex": escape(s) },
                    Bson::Array(arr) => doc! { "$all": arr },
                    other => doc! { "$eq": other },
                },
                FieldOp::NotContains => match value {
                    Bson::String(s) => doc! { "$not": { "$regex": escape(s) } },
                    Bson::Array(arr) => doc! { "$not": { "$all": arr } },
                    other => doc! { "$ne": other },
                },
                FieldOp::StartsWith => match value {
                    Bson::String(s) => doc! { "$regex": format!("^{}", escape(s)) },
                    _ => return Err(DocumentStoreError::InvalidDocument(
                        format!("starts-with on {field} requires a string value"),
                    )),
                },
                FieldOp::EndsWith => match value {
                    Bson::String(s) => doc! { "$regex": format!("{}$", escape(s)) },
                    _ => return Err(DocumentStoreError::InvalidDocument(
                        format!("ends-with on {field} requires a string value"),
                    )),
                },
                FieldOp::AnyOf => doc! { "$in": value },
                FieldOp::NoneOf => doc! { "$nin": value },
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use fluentdoc_core::query::Filter;

    use super::*;

    fn translate(expr: Expr) -> Document {
        MongoQueryTranslator::translate(Some(&expr)).unwrap()
    }

    #[test]
    fn missing_filter_matches_everything() {
        assert_eq!(MongoQueryTranslator::translate(None).unwrap(), doc! {});
    }

    #[test]
    fn comparisons_translate_to_operators() {
        assert_eq!(
            translate(Filter::and([Filter::eq("_id", "k1"), Filter::gt("age", 70)])),
            doc! { "$and": [{ "_id": { "$eq": "k1" } }, { "age": { "$gt": 70 } }] }
        );
        assert_eq!(
            translate(Filter::any_of("name", vec!["a", "b"])),
            doc! { "name": { "$in": ["a", "b"] } }
        );
    }

    #[test]
    fn negation_wraps_the_whole_clause() {
        assert_eq!(
            translate(Filter::eq("age", 17).not()),
            doc! { "$nor": [{ "age": { "$eq": 17 } }] }
        );
    }

    #[test]
    fn string_operators_escape_their_input() {
        assert_eq!(
            translate(Filter::starts_with("name", "a.b")),
            doc! { "name": { "$regex": "^a\\.b" } }
        );
        assert_eq!(
            translate(Filter::ends_with("name", "(x)")),
            doc! { "name": { "$regex": "\\(x\\)$" } }
        );
    }

    #[test]
    fn string_operators_reject_other_values() {
        let err = MongoQueryTranslator::translate(Some(&Filter::starts_with("age", 1))).unwrap_err();
        assert!(matches!(err, DocumentStoreError::InvalidDocument(_)));
    }
}
