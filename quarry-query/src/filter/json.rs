//! Parsing predicate documents from JSON.

use serde_json::{Map, Value as Json};

use crate::error::{QueryError, QueryResult};
use crate::value::{Record, Value};

use super::{Comparison, Condition, PatternKind, Where, WhereEntry};

impl Where {
    /// Parse a predicate document for `model` from JSON.
    ///
    /// Property values are either literals (equality), arrays (membership),
    /// entity-like objects (equality on their primary key) or operator objects
    /// using `!`, `like`, `startsWith`, `endsWith`, `contains`, `>`, `>=`, `<`,
    /// `<=`, `!=` and `=`. The `and`/`or` keys hold arrays of nested documents.
    /// Errors name `model` and the offending property.
    ///
    /// ```rust
    /// use quarry_query::filter::Where;
    /// use serde_json::json;
    ///
    /// let filter = Where::from_json("Product", &json!({
    ///     "name": { "!": { "startsWith": "tmp" } },
    ///     "or": [{ "store": 1 }, { "store": null }]
    /// }))
    /// .unwrap();
    /// assert_eq!(filter.len(), 2);
    /// ```
    pub fn from_json(model: &str, document: &Json) -> QueryResult<Self> {
        DocumentParser { model }.document(document)
    }
}

struct DocumentParser<'a> {
    model: &'a str,
}

impl DocumentParser<'_> {
    fn document(&self, document: &Json) -> QueryResult<Where> {
        let Json::Object(map) = document else {
            return Err(QueryError::invalid_where(format!(
                "expected an object, got {}",
                document
            ))
            .with_model(self.model));
        };

        map.iter()
            .map(|(key, value)| match key.as_str() {
                "and" => Ok(WhereEntry::And(self.group(key, value)?)),
                "or" => Ok(WhereEntry::Or(self.group(key, value)?)),
                _ => Ok(WhereEntry::Property {
                    path: key.clone(),
                    condition: self.condition(key, value)?,
                }),
            })
            .collect()
    }

    fn group(&self, key: &str, value: &Json) -> QueryResult<Vec<Where>> {
        let Json::Array(items) = value else {
            return Err(QueryError::invalid_where(format!(
                "`{}` must hold an array of documents",
                key
            ))
            .with_model(self.model));
        };
        items.iter().map(|item| self.document(item)).collect()
    }

    fn condition(&self, property: &str, value: &Json) -> QueryResult<Condition> {
        match value {
            Json::Object(map) if map.is_empty() => Err(QueryError::undefined_value(self.model, property)),
            Json::Object(map) if map.keys().any(|k| is_operator(k)) => self.operators(property, map),
            other => Ok(Condition::Equals(literal(other)?)),
        }
    }

    fn operators(&self, property: &str, map: &Map<String, Json>) -> QueryResult<Condition> {
        let mut conditions = Vec::with_capacity(map.len());
        for (op, operand) in map {
            let condition = match op.as_str() {
                "!" => self.condition(property, operand)?.negate(),
                "like" => Condition::Pattern(PatternKind::Like, literal(operand)?),
                "startsWith" => Condition::Pattern(PatternKind::StartsWith, literal(operand)?),
                "endsWith" => Condition::Pattern(PatternKind::EndsWith, literal(operand)?),
                // Objects stay JSON here: on JSON columns they are containment documents.
                "contains" => Condition::Pattern(PatternKind::Contains, Value::from_json(operand.clone())),
                "=" => Condition::Equals(literal(operand)?),
                "!=" => Condition::Equals(literal(operand)?).negate(),
                cmp => match Comparison::parse(cmp) {
                    Some(comparison) => Condition::Compare(
                        comparison,
                        super::Operand::Value(literal(operand)?),
                    ),
                    None => {
                        return Err(QueryError::unsupported_operator(self.model, property, cmp));
                    }
                },
            };
            conditions.push(condition);
        }

        if conditions.len() == 1 {
            Ok(conditions.remove(0))
        } else {
            Ok(Condition::All(conditions))
        }
    }
}

fn is_operator(key: &str) -> bool {
    matches!(
        key,
        "!" | "like" | "startsWith" | "endsWith" | "contains" | ">" | ">=" | "<" | "<=" | "!=" | "="
    )
}

/// Convert a JSON operand, turning entity-like objects into records.
fn literal(value: &Json) -> QueryResult<Value> {
    match value {
        Json::Object(_) => Ok(Value::from(Record::from_json(value.clone())?)),
        Json::Array(items) => items.iter().map(literal).collect::<QueryResult<Vec<_>>>().map(Value::List),
        other => Ok(Value::from_json(other.clone())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::Operand;
    use serde_json::json;

    fn single(document: Json) -> Condition {
        let filter = Where::from_json("Product", &document).unwrap();
        match filter.entries() {
            [WhereEntry::Property { condition, .. }] => condition.clone(),
            other => panic!("expected a single property entry, got {:?}", other),
        }
    }

    #[test]
    fn test_literals_are_equality() {
        assert_eq!(single(json!({ "name": "a" })), Condition::equals("a"));
        assert_eq!(single(json!({ "store": null })), Condition::Equals(Value::Null));
        assert_eq!(single(json!({ "id": [1, 2] })), Condition::equals(vec![1, 2]));
    }

    #[test]
    fn test_negation() {
        assert_eq!(single(json!({ "name": { "!": "a" } })), Condition::not_equals("a"));
        assert_eq!(
            single(json!({ "name": { "!": { "like": "a%" } } })),
            Condition::like("a%").negate()
        );
        assert_eq!(single(json!({ "name": { "!=": "a" } })), Condition::not_equals("a"));
    }

    #[test]
    fn test_comparisons() {
        assert_eq!(
            single(json!({ "price": { ">": 5 } })),
            Condition::Compare(Comparison::Gt, Operand::Value(Value::Int(5)))
        );
        assert_eq!(
            single(json!({ "price": { ">=": 1, "<": 10 } })),
            Condition::All(vec![Condition::gte(1), Condition::lt(10)])
        );
    }

    #[test]
    fn test_object_value_becomes_record() {
        match single(json!({ "store": { "id": 3, "name": "Acme" } })) {
            Condition::Equals(Value::Record(record)) => {
                assert_eq!(record.get("id"), Some(&Value::Int(3)));
            }
            other => panic!("expected a record, got {:?}", other),
        }
    }

    #[test]
    fn test_contains_keeps_json_objects() {
        assert_eq!(
            single(json!({ "meta": { "contains": { "a": 1 } } })),
            Condition::contains(json!({ "a": 1 }))
        );
    }

    #[test]
    fn test_groups() {
        let filter = Where::from_json("Product", &json!({ "or": [{ "a": 1 }, { "b": 2 }] })).unwrap();
        match &filter.entries()[0] {
            WhereEntry::Or(members) => assert_eq!(members.len(), 2),
            other => panic!("expected or, got {:?}", other),
        }
        assert!(Where::from_json("Product", &json!({ "and": { "a": 1 } })).is_err());
    }

    #[test]
    fn test_unknown_operator_is_rejected() {
        let err = Where::from_json("Product", &json!({ "name": { "like": "a", "~": "b" } })).unwrap_err();
        assert_eq!(err.code, crate::error::ErrorCode::UnsupportedOperator);
        assert_eq!(err.context.model.as_deref(), Some("Product"));
    }

    #[test]
    fn test_empty_operator_object_is_undefined() {
        let err = Where::from_json("Product", &json!({ "or": [{ "name": {} }] })).unwrap_err();
        assert_eq!(err.code, crate::error::ErrorCode::UndefinedValue);
        assert_eq!(err.context.model.as_deref(), Some("Product"));
        assert_eq!(err.context.field.as_deref(), Some("name"));
        assert!(err.message.contains("on Product"));
    }
}
