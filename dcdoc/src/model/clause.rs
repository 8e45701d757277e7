use serde::Serialize;
use serde_json::{json, Map, Value};

use crate::error::ParseError;
use crate::model::Property;

/// Boolean operators a macOS clause node may carry.
pub const OPERATORS: [&str; 3] = ["and", "or", "not"];

/// A node of a macOS clause tree.
///
/// Leaf criteria live in `properties`; nested operator nodes in
/// `sub_clauses`. Both may be populated on the same node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Clause {
    pub clause_type: String,
    pub properties: Vec<Property>,
    pub sub_clauses: Vec<Clause>,
}

impl Clause {
    pub fn new(clause_type: impl Into<String>) -> Self {
        Self {
            clause_type: clause_type.into(),
            properties: Vec::new(),
            sub_clauses: Vec::new(),
        }
    }

    /// Order-independent canonical text of the whole subtree.
    pub fn encoding(&self) -> String {
        let mut parts: Vec<String> = self.properties.iter().map(Property::encoding).collect();
        parts.sort();
        let mut nested: Vec<String> = self.sub_clauses.iter().map(Clause::encoding).collect();
        nested.sort();
        parts.extend(nested);
        format!("{}({})", self.clause_type, parts.join(","))
    }

    /// Number of operator levels, counting this node.
    pub fn depth(&self) -> usize {
        1 + self
            .sub_clauses
            .iter()
            .map(Clause::depth)
            .max()
            .unwrap_or(0)
    }

    /// Every leaf property in the subtree, depth first.
    pub fn all_properties(&self) -> Vec<&Property> {
        let mut out: Vec<&Property> = self.properties.iter().collect();
        for sub in &self.sub_clauses {
            out.extend(sub.all_properties());
        }
        out
    }

    /// Build a clause from a macOS `{"$type": ..., "clauses": [...]}` object.
    pub fn from_mac_json(value: &Value) -> Result<Self, ParseError> {
        let object = value
            .as_object()
            .ok_or_else(|| ParseError::Shape(format!("clause is not an object: {value}")))?;
        let clause_type = type_of(object)?;
        if !OPERATORS.contains(&clause_type) {
            return Err(ParseError::Shape(format!(
                "clause operator '{clause_type}' is not one of and/or/not"
            )));
        }

        let mut clause = Clause::new(clause_type);
        let children = object
            .get("clauses")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();
        for child in children {
            let child_object = child
                .as_object()
                .ok_or_else(|| ParseError::Shape(format!("clause is not an object: {child}")))?;
            let child_type = type_of(child_object)?;
            if OPERATORS.contains(&child_type) {
                clause.sub_clauses.push(Clause::from_mac_json(child)?);
            } else {
                let value = child_object.get("value").map(scalar_text).unwrap_or_default();
                clause.properties.push(Property::new(child_type, value));
            }
        }
        Ok(clause)
    }

    /// macOS JSON form of this clause tree.
    pub fn to_mac_json(&self) -> Value {
        let mut clauses: Vec<Value> = self
            .properties
            .iter()
            .map(|property| json!({"$type": property.name, "value": scalar_value(&property.value)}))
            .collect();
        clauses.extend(self.sub_clauses.iter().map(Clause::to_mac_json));
        json!({"$type": self.clause_type, "clauses": clauses})
    }
}

fn type_of(object: &Map<String, Value>) -> Result<&str, ParseError> {
    object
        .get("$type")
        .and_then(Value::as_str)
        .ok_or_else(|| ParseError::Shape("clause without $type".to_string()))
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

fn scalar_value(text: &str) -> Value {
    match text {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        other => Value::String(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::Clause;

    fn nested() -> serde_json::Value {
        json!({
            "$type": "or",
            "clauses": [
                {"$type": "primaryId", "value": "removable_media_devices"},
                {"$type": "and", "clauses": [
                    {"$type": "vendorId", "value": "0951"},
                    {"$type": "productId", "value": "1666"}
                ]}
            ]
        })
    }

    #[test]
    fn parses_leaves_and_sub_clauses() {
        let clause = Clause::from_mac_json(&nested()).expect("clause");
        assert_eq!(clause.clause_type, "or");
        assert_eq!(clause.properties.len(), 1);
        assert_eq!(clause.sub_clauses.len(), 1);
        assert_eq!(clause.sub_clauses[0].properties.len(), 2);
        assert_eq!(clause.depth(), 2);
    }

    #[test]
    fn encoding_ignores_order() {
        let a = Clause::from_mac_json(&nested()).expect("clause");
        let mut b = a.clone();
        b.sub_clauses[0].properties.reverse();
        assert_eq!(a.encoding(), b.encoding());
    }

    #[test]
    fn rejects_unknown_operator() {
        let err = Clause::from_mac_json(&json!({"$type": "xor", "clauses": []}));
        assert!(err.is_err());
    }

    #[test]
    fn json_round_trip_keeps_booleans() {
        let value = json!({"$type": "and", "clauses": [{"$type": "encryption", "value": true}]});
        let clause = Clause::from_mac_json(&value).expect("clause");
        assert_eq!(clause.to_mac_json(), value);
    }
}
