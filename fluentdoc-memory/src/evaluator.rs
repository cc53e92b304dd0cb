//! Filter evaluation for in-memory documents.
//!
//! Values are compared through [`Comparable`]. Integers of either width compare exactly,
//! and against doubles by value, so `Int32(17)` equals `Int64(17)` and `17.0` the way the
//! server treats them. Array fields match a scalar operand when any element does.

use bson::{Bson, Document as BsonDocument, datetime::DateTime, oid::ObjectId};
use std::{cmp::Ordering, collections::HashMap};

use fluentdoc_core::{
    error::{DocumentStoreError, DocumentStoreResult},
    query::{Expr, FieldOp, QueryVisitor, lookup},
};

/// Type-erased, comparable view of a BSON value.
#[derive(Debug)]
pub(crate) enum Comparable<'a> {
    Null,
    Bool(bool),
    /// 32 and 64-bit integers.
    Int(i64),
    Number(f64),
    DateTime(DateTime),
    ObjectId(ObjectId),
    String(&'a str),
    Array(Vec<Comparable<'a>>),
    Map(HashMap<&'a str, Comparable<'a>>),
}

impl<'a> From<&'a Bson> for Comparable<'a> {
    fn from(bson: &'a Bson) -> Self {
        match bson {
            Bson::Boolean(value) => Comparable::Bool(*value),
            Bson::Int32(value) => Comparable::Int(i64::from(*value)),
            Bson::Int64(value) => Comparable::Int(*value),
            Bson::Double(value) => Comparable::Number(*value),
            Bson::DateTime(value) => Comparable::DateTime(*value),
            Bson::ObjectId(value) => Comparable::ObjectId(*value),
            Bson::String(value) => Comparable::String(value),
            Bson::Array(values) => Comparable::Array(values.iter().map(Comparable::from).collect()),
            Bson::Document(document) => Comparable::Map(
                document
                    .iter()
                    .map(|(key, value)| (key.as_str(), Comparable::from(value)))
                    .collect(),
            ),
            // Anything else only ever equals null
            _ => Comparable::Null,
        }
    }
}

/// Orders an integer against a double without rounding the integer through `f64`.
fn cmp_int_float(int: i64, float: f64) -> Option<Ordering> {
    // 2^63, the first double past i64::MAX
    const LIMIT: f64 = 9_223_372_036_854_775_808.0;

    if float.is_nan() {
        None
    } else if float >= LIMIT {
        Some(Ordering::Less)
    } else if float < -LIMIT {
        Some(Ordering::Greater)
    } else {
        let whole = float.trunc();
        match int.cmp(&(whole as i64)) {
            Ordering::Equal => 0.0_f64.partial_cmp(&(float - whole)),
            unequal => Some(unequal),
        }
    }
}

impl PartialEq for Comparable<'_> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Comparable::Null, Comparable::Null) => true,
            (Comparable::Bool(a), Comparable::Bool(b)) => a == b,
            (Comparable::Int(a), Comparable::Int(b)) => a == b,
            (Comparable::Int(a), Comparable::Number(b)) | (Comparable::Number(b), Comparable::Int(a)) => {
                cmp_int_float(*a, *b) == Some(Ordering::Equal)
            }
            (Comparable::Number(a), Comparable::Number(b)) => a == b,
            (Comparable::DateTime(a), Comparable::DateTime(b)) => a == b,
            (Comparable::ObjectId(a), Comparable::ObjectId(b)) => a == b,
            (Comparable::String(a), Comparable::String(b)) => a == b,
            (Comparable::Array(a), Comparable::Array(b)) => a == b,
            (Comparable::Map(a), Comparable::Map(b)) => a == b,
            _ => false,
        }
    }
}

impl PartialOrd for Comparable<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Comparable::Bool(a), Comparable::Bool(b)) => a.partial_cmp(b),
            (Comparable::Int(a), Comparable::Int(b)) => a.partial_cmp(b),
            (Comparable::Int(a), Comparable::Number(b)) => cmp_int_float(*a, *b),
            (Comparable::Number(a), Comparable::Int(b)) => cmp_int_float(*b, *a).map(Ordering::reverse),
            (Comparable::Number(a), Comparable::Number(b)) => a.partial_cmp(b),
            (Comparable::DateTime(a), Comparable::DateTime(b)) => a.partial_cmp(b),
            (Comparable::String(a), Comparable::String(b)) => a.partial_cmp(b),
            _ => None,
        }
    }
}

/// Evaluates a filter expression against a single document.
pub(crate) struct DocumentEvaluator<'a> {
    document: &'a BsonDocument,
}

impl<'a> DocumentEvaluator<'a> {
    pub fn new(document: &'a BsonDocument) -> Self {
        Self { document }
    }

    pub fn matches(document: &'a BsonDocument, expr: &Expr) -> DocumentStoreResult<bool> {
        DocumentEvaluator::new(document).visit_expr(expr)
    }

    /// Applies `predicate` to the value itself, then to each element of an array value.
    fn any_value(field_value: &Comparable<'_>, predicate: impl Fn(&Comparable<'_>) -> bool) -> bool {
        predicate(field_value)
            || matches!(field_value, Comparable::Array(items) if items.iter().any(&predicate))
    }

    /// Equality with the server's array rule: `{ tags: "a" }` matches `["a", "b"]`.
    fn equals(field_value: &Comparable<'_>, expected: &Comparable<'_>) -> bool {
        field_value == expected
            || matches!(field_value, Comparable::Array(items) if items.contains(expected))
    }

    fn compares(field_value: &Comparable<'_>, expected: &Comparable<'_>, accept: &[Ordering]) -> bool {
        Self::any_value(field_value, |value| {
            value
                .partial_cmp(expected)
                .is_some_and(|ordering| accept.contains(&ordering))
        })
    }

    /// Substring match for strings (on any element of an array), every element for an
    /// array operand, plain equality otherwise.
    fn contains(field_value: &Comparable<'_>, expected: &Comparable<'_>) -> bool {
        match expected {
            Comparable::Array(values) => {
                !values.is_empty() && values.iter().all(|value| Self::equals(field_value, value))
            }
            Comparable::String(needle) => Self::any_value(field_value, |value| {
                matches!(value, Comparable::String(haystack) if haystack.contains(*needle))
            }),
            _ => Self::equals(field_value, expected),
        }
    }

    fn text(field_value: &Comparable<'_>, expected: &Comparable<'_>, test: fn(&str, &str) -> bool) -> bool {
        let Comparable::String(pattern) = expected else {
            return false;
        };

        Self::any_value(field_value, |value| {
            matches!(value, Comparable::String(text) if test(text, pattern))
        })
    }

    /// Whether the field value, or one of its elements, equals any candidate.
    fn intersects(field_value: &Comparable<'_>, candidates: &Comparable<'_>) -> bool {
        match candidates {
            Comparable::Array(values) => values.iter().any(|value| Self::equals(field_value, value)),
            single => Self::equals(field_value, single),
        }
    }
}

impl QueryVisitor for DocumentEvaluator<'_> {
    type Output = bool;
    type Error = DocumentStoreError;

    fn visit_and(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        for expr in exprs {
            if !self.visit_expr(expr)? {
                return Ok(false);
            }
        }

        Ok(true)
    }

    fn visit_or(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        for expr in exprs {
            if self.visit_expr(expr)? {
                return Ok(true);
            }
        }

        Ok(false)
    }

    fn visit_not(&mut self, expr: &Expr) -> Result<Self::Output, Self::Error> {
        Ok(!self.visit_expr(expr)?)
    }

    fn visit_exists(&mut self, field: &str, should_exist: bool) -> Result<Self::Output, Self::Error> {
        Ok(lookup(self.document, field).is_some() == should_exist)
    }

    fn visit_field(&mut self, field: &str, op: &FieldOp, value: &Bson) -> Result<Self::Output, Self::Error> {
        let expected = Comparable::from(value);

        let Some(actual) = lookup(self.document, field).map(Comparable::from) else {
            // A missing field behaves like null for negative operators
            return Ok(match op {
                FieldOp::Eq => expected == Comparable::Null,
                FieldOp::Ne => expected != Comparable::Null,
                FieldOp::NotContains | FieldOp::NoneOf => true,
                _ => false,
            });
        };

        Ok(match op {
            FieldOp::Eq => Self::equals(&actual, &expected),
            FieldOp::Ne => !Self::equals(&actual, &expected),
            FieldOp::Gt => Self::compares(&actual, &expected, &[Ordering::Greater]),
            FieldOp::Gte => Self::compares(&actual, &expected, &[Ordering::Greater, Ordering::Equal]),
            FieldOp::Lt => Self::compares(&actual, &expected, &[Ordering::Less]),
            FieldOp::Lte => Self::compares(&actual, &expected, &[Ordering::Less, Ordering::Equal]),
            FieldOp::Contains => Self::contains(&actual, &expected),
            FieldOp::NotContains => !Self::contains(&actual, &expected),
            FieldOp::StartsWith => Self::text(&actual, &expected, |text, prefix| text.starts_with(prefix)),
            FieldOp::EndsWith => Self::text(&actual, &expected, |text, suffix| text.ends_with(suffix)),
            FieldOp::AnyOf => Self::intersects(&actual, &expected),
            FieldOp::NoneOf => !Self::intersects(&actual, &expected),
        })
    }
}

#[cfg(test)]
mod tests {
    use bson::doc;
    use fluentdoc_core::query::Filter;

    use super::*;

    fn entity() -> BsonDocument {
        doc! {
            "_id": "k1",
            "name": "Test 1",
            "age": 17,
            "tags": ["a", "b"],
            "scores": [1, 3],
            "big": 9_007_199_254_740_993_i64,
            "address": { "city": "Lisbon" },
        }
    }

    fn check(expr: Expr) -> bool {
        DocumentEvaluator::matches(&entity(), &expr).unwrap()
    }

    #[test]
    fn numbers_compare_across_widths() {
        assert!(check(Filter::eq("age", 17_i64)));
        assert!(check(Filter::gt("age", 16.5)));
        assert!(!check(Filter::gt("age", 70)));
        assert!(check(Filter::lte("age", 17)));
    }

    #[test]
    fn integers_compare_exactly_beyond_double_precision() {
        assert!(!check(Filter::eq("big", 9_007_199_254_740_992_i64)));
        assert!(check(Filter::eq("big", 9_007_199_254_740_993_i64)));
        assert!(check(Filter::gt("big", 9_007_199_254_740_992_i64)));
        assert!(check(Filter::gt("big", 9_007_199_254_740_992.0)));
        assert!(check(Filter::eq("age", 17.0)));
        assert!(!check(Filter::eq("age", 17.5)));
        assert!(check(Filter::lt("age", 17.5)));
    }

    #[test]
    fn array_fields_match_their_elements() {
        assert!(check(Filter::eq("tags", "a")));
        assert!(!check(Filter::ne("tags", "a")));
        assert!(check(Filter::ne("tags", "z")));
        assert!(check(Filter::gt("scores", 2)));
        assert!(!check(Filter::lt("scores", 1)));
        assert!(check(Filter::starts_with("tags", "b")));
        assert!(check(Filter::none_of("scores", vec![2, 4])));
    }

    #[test]
    fn contains_falls_back_to_equality_for_other_scalars() {
        assert!(check(Filter::contains("scores", 3)));
        assert!(!check(Filter::contains("scores", 2)));
        assert!(check(Filter::contains("age", 17)));
        assert!(check(Filter::not_contains("age", 18)));
        assert!(!check(Filter::contains("tags", Vec::<String>::new())));
    }

    #[test]
    fn dotted_paths_reach_nested_values() {
        assert!(check(Filter::eq("address.city", "Lisbon")));
        assert!(check(Filter::not_exists("address.zip")));
        assert!(!check(Filter::exists("name.first")));
    }

    #[test]
    fn missing_fields_only_satisfy_negative_operators() {
        assert!(!check(Filter::gt("height", 1)));
        assert!(check(Filter::ne("height", 1)));
        assert!(check(Filter::none_of("height", vec![Bson::Int32(1)])));
    }

    #[test]
    fn arrays_and_strings_support_membership() {
        assert!(check(Filter::contains("tags", "a")));
        assert!(check(Filter::not_contains("tags", "z")));
        assert!(check(Filter::contains("tags", vec!["b", "a"])));
        assert!(!check(Filter::contains("tags", vec!["a", "z"])));
        assert!(check(Filter::any_of("tags", vec!["z", "b"])));
        assert!(check(Filter::any_of("name", vec!["Test 1", "Test 2"])));
        assert!(check(Filter::starts_with("name", "Test")));
        assert!(!check(Filter::ends_with("name", "2")));
    }

    #[test]
    fn logical_operators_compose() {
        assert!(check(Filter::and([Filter::eq("_id", "k1"), Filter::lt("age", 20)])));
        assert!(check(Filter::or([Filter::eq("_id", "k2"), Filter::lt("age", 20)])));
        assert!(check(Filter::eq("_id", "k2").not()));
    }
}
