//! Tagged value tree for Actions, ActionStates, and handler responses
//!
//! Actions are arbitrarily nested JSON-LD objects. The engine walks them as an
//! explicit tree instead of probing shapes at runtime: every traversal matches
//! on [`Node`] and treats `Object` as the only recursive container.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Ordered map used for object nodes
pub type NodeMap = BTreeMap<String, Node>;

/// A value inside an Action or ActionState
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Node {
    /// Explicit null; treated the same as an absent key
    #[default]
    Null,
    /// Boolean
    Bool(bool),
    /// Number
    Number(f64),
    /// String
    String(String),
    /// Date-time value
    Date(DateTime<Utc>),
    /// Array of nodes
    Array(Vec<Node>),
    /// Nested object
    Object(NodeMap),
}

impl Node {
    /// Create an empty object node
    pub fn object() -> Self {
        Node::Object(NodeMap::new())
    }

    /// Whether this node is null
    pub fn is_null(&self) -> bool {
        matches!(self, Node::Null)
    }

    /// Borrow as an object map
    pub fn as_object(&self) -> Option<&NodeMap> {
        match self {
            Node::Object(map) => Some(map),
            _ => None,
        }
    }

    /// Borrow as a mutable object map
    pub fn as_object_mut(&mut self) -> Option<&mut NodeMap> {
        match self {
            Node::Object(map) => Some(map),
            _ => None,
        }
    }

    /// Borrow as a string
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Node::String(s) => Some(s),
            _ => None,
        }
    }

    /// Read as a number
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Node::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Borrow as an array
    pub fn as_array(&self) -> Option<&[Node]> {
        match self {
            Node::Array(items) => Some(items),
            _ => None,
        }
    }

    /// Look up a key on an object node; `None` for non-objects and null values
    pub fn get(&self, key: &str) -> Option<&Node> {
        self.as_object()
            .and_then(|map| map.get(key))
            .filter(|value| !value.is_null())
    }

    /// Insert a key, converting a non-object node into an empty object first
    pub fn insert(&mut self, key: impl Into<String>, value: Node) {
        if !matches!(self, Node::Object(_)) {
            *self = Node::object();
        }
        if let Node::Object(map) = self {
            map.insert(key.into(), value);
        }
    }

    /// Short type name used in diagnostics
    pub fn kind(&self) -> &'static str {
        match self {
            Node::Null => "null",
            Node::Bool(_) => "boolean",
            Node::Number(_) => "number",
            Node::String(_) => "string",
            Node::Date(_) => "date",
            Node::Array(_) => "array",
            Node::Object(_) => "object",
        }
    }

    /// Convert to a JSON value; dates render as RFC 3339 strings
    pub fn to_json(&self) -> Value {
        match self {
            Node::Null => Value::Null,
            Node::Bool(b) => Value::Bool(*b),
            Node::Number(n) => number_to_json(*n),
            Node::String(s) => Value::String(s.clone()),
            Node::Date(dt) => Value::String(dt.to_rfc3339_opts(SecondsFormat::Millis, true)),
            Node::Array(items) => Value::Array(items.iter().map(Node::to_json).collect()),
            Node::Object(map) => Value::Object(
                map.iter()
                    .map(|(key, value)| (key.clone(), value.to_json()))
                    .collect::<Map<String, Value>>(),
            ),
        }
    }
}

fn number_to_json(n: f64) -> Value {
    if n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
        Value::from(n as i64)
    } else {
        serde_json::Number::from_f64(n)
            .map(Value::Number)
            .unwrap_or(Value::Null)
    }
}

impl From<Value> for Node {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Node::Null,
            Value::Bool(b) => Node::Bool(b),
            Value::Number(n) => n.as_f64().map(Node::Number).unwrap_or(Node::Null),
            Value::String(s) => Node::String(s),
            Value::Array(items) => Node::Array(items.into_iter().map(Node::from).collect()),
            Value::Object(map) => Node::Object(
                map.into_iter()
                    .map(|(key, value)| (key, Node::from(value)))
                    .collect(),
            ),
        }
    }
}

impl From<&Node> for Value {
    fn from(node: &Node) -> Self {
        node.to_json()
    }
}

impl From<&str> for Node {
    fn from(value: &str) -> Self {
        Node::String(value.to_string())
    }
}

impl From<String> for Node {
    fn from(value: String) -> Self {
        Node::String(value)
    }
}

impl From<f64> for Node {
    fn from(value: f64) -> Self {
        Node::Number(value)
    }
}

impl From<i64> for Node {
    fn from(value: i64) -> Self {
        Node::Number(value as f64)
    }
}

impl From<bool> for Node {
    fn from(value: bool) -> Self {
        Node::Bool(value)
    }
}

impl From<DateTime<Utc>> for Node {
    fn from(value: DateTime<Utc>) -> Self {
        Node::Date(value)
    }
}

impl From<NodeMap> for Node {
    fn from(value: NodeMap) -> Self {
        Node::Object(value)
    }
}

impl Serialize for Node {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Node {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Value::deserialize(deserializer).map(Node::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn test_json_conversion_preserves_structure() {
        let value = json!({
            "name": "search",
            "count": 3,
            "ratio": 0.5,
            "tags": ["a", "b"],
            "nested": {"flag": true, "empty": null}
        });

        let node = Node::from(value.clone());
        assert_eq!(node.to_json(), value);
        assert_eq!(node.get("count"), Some(&Node::Number(3.0)));
        assert!(node.get("nested").unwrap().get("empty").is_none());
    }

    #[test]
    fn test_date_renders_rfc3339() {
        let dt = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        assert_eq!(Node::Date(dt).to_json(), json!("2024-01-02T03:04:05.000Z"));
    }

    #[test]
    fn test_insert_promotes_to_object() {
        let mut node = Node::Null;
        node.insert("a", Node::from(1i64));
        assert_eq!(node.to_json(), json!({"a": 1}));
    }

    #[test]
    fn test_serde_round_trip() {
        let node: Node = serde_json::from_str(r#"{"query":"hello"}"#).unwrap();
        assert_eq!(node.get("query").and_then(Node::as_str), Some("hello"));
        assert_eq!(serde_json::to_string(&node).unwrap(), r#"{"query":"hello"}"#);
    }
}
