//! Recursive schema builder
//!
//! Walks an Action and compiles every marker of one mode into a nested
//! schema mirroring the Action's own shape. Branches without any marker of
//! that mode are left out entirely.

use serde_json::{Map, Value};
use std::collections::BTreeMap;

use super::Mode;
use super::error::{SpecError, SpecResult, ValidationError, ValidationFailure, ValidationResult};
use super::node::Node;
use super::spec::parse_spec;
use super::validator::FieldValidator;
use super::{INPUT_SUFFIX, OUTPUT_SUFFIX, is_marker};

/// One entry in a schema
#[derive(Debug, Clone)]
pub enum SchemaNode {
    /// Constrained field
    Field(FieldValidator),
    /// Nested object containing constrained fields
    Object(Schema),
}

/// Compiled validation schema for one mode
#[derive(Debug, Clone)]
pub struct Schema {
    mode: Mode,
    entries: BTreeMap<String, SchemaNode>,
}

impl Schema {
    /// Create an empty schema
    pub fn empty(mode: Mode) -> Self {
        Self {
            mode,
            entries: BTreeMap::new(),
        }
    }

    /// Mode the schema was built for
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Whether no constrained fields exist anywhere
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Look up a top-level entry
    pub fn get(&self, key: &str) -> Option<&SchemaNode> {
        self.entries.get(key)
    }

    /// Iterate top-level entries
    pub fn entries(&self) -> impl Iterator<Item = (&str, &SchemaNode)> {
        self.entries.iter().map(|(key, node)| (key.as_str(), node))
    }

    /// Count constrained fields in the whole tree
    pub fn field_count(&self) -> usize {
        self.entries
            .values()
            .map(|node| match node {
                SchemaNode::Field(_) => 1,
                SchemaNode::Object(nested) => nested.field_count(),
            })
            .sum()
    }

    /// Check a state, reporting the first violation.
    ///
    /// Keys the schema does not mention are ignored. A missing nested object
    /// is checked as if it were empty.
    pub fn check(&self, state: &Node) -> ValidationResult<()> {
        match state {
            Node::Object(_) | Node::Null => self.check_object(state),
            _ => Err(ValidationError::new("", ValidationFailure::NotAnObject)),
        }
    }

    fn check_object(&self, state: &Node) -> ValidationResult<()> {
        for (key, entry) in &self.entries {
            let value = state.get(key);
            match entry {
                SchemaNode::Field(validator) => validator
                    .check(value)
                    .map_err(|reason| ValidationError::new(key.clone(), reason))?,
                SchemaNode::Object(nested) => match value {
                    None | Some(Node::Object(_)) => nested
                        .check_object(value.unwrap_or(&Node::Null))
                        .map_err(|err| err.within(key))?,
                    Some(_) => {
                        return Err(ValidationError::new(
                            key.clone(),
                            ValidationFailure::NotAnObject,
                        ));
                    }
                },
            }
        }
        Ok(())
    }

    /// JSON description for inspection tools
    pub fn describe(&self) -> Value {
        let map: Map<String, Value> = self
            .entries
            .iter()
            .map(|(key, node)| {
                let described = match node {
                    SchemaNode::Field(validator) => validator.describe(),
                    SchemaNode::Object(nested) => nested.describe(),
                };
                (key.clone(), described)
            })
            .collect();
        Value::Object(map)
    }
}

/// Build the schema for one mode
pub fn build_schema(action: &Node, mode: Mode) -> SpecResult<Schema> {
    let schema = build_level(action, mode)?;
    tracing::debug!(
        mode = %mode,
        fields = schema.field_count(),
        "Built action schema"
    );
    Ok(schema)
}

fn build_level(action: &Node, mode: Mode) -> SpecResult<Schema> {
    let mut schema = Schema::empty(mode);
    let Some(map) = action.as_object() else {
        return Ok(schema);
    };

    for (key, value) in map {
        if let Some(name) = mode.unprefixed(key) {
            let spec = parse_spec(value)?;
            let choices = map.get(name).and_then(Node::as_array).unwrap_or(&[]);
            schema.entries.insert(
                name.to_string(),
                SchemaNode::Field(FieldValidator::compile(&spec, choices)),
            );
        } else if matches!(value, Node::Object(_)) && !is_marker(key) {
            let nested = build_level(value, mode)?;
            if !nested.is_empty() {
                schema
                    .entries
                    .insert(key.clone(), SchemaNode::Object(nested));
            }
        }
    }

    Ok(schema)
}

/// Reject actions where one key carries both `-input` and `-output` markers
pub fn check_markers(action: &Node) -> SpecResult<()> {
    check_markers_at(action, "")
}

fn check_markers_at(action: &Node, prefix: &str) -> SpecResult<()> {
    let Some(map) = action.as_object() else {
        return Ok(());
    };

    for (key, value) in map {
        if let Some(name) = key.strip_suffix(INPUT_SUFFIX) {
            if map.contains_key(&format!("{}{}", name, OUTPUT_SUFFIX)) {
                return Err(SpecError::ConflictingMarkers {
                    key: join_path(prefix, name),
                });
            }
        } else if matches!(value, Node::Object(_)) && !is_marker(key) {
            check_markers_at(value, &join_path(prefix, key))?;
        }
    }

    Ok(())
}

fn join_path(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{}.{}", prefix, key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn node(value: serde_json::Value) -> Node {
        Node::from(value)
    }

    fn review_action() -> Node {
        node(json!({
            "@type": "ReviewAction",
            "name": "Review",
            "object": {"@type": "Thing", "url-input": "required"},
            "result": {
                "reviewBody-input": "required",
                "reviewRating": {"ratingValue-input": "required min=1 max=5"},
                "url-output": "required",
                "author": {"name": "static"}
            }
        }))
    }

    #[test]
    fn test_input_schema_mirrors_shape() {
        let schema = build_schema(&review_action(), Mode::Input).unwrap();
        assert_eq!(schema.field_count(), 3);
        assert!(schema.get("name").is_none());

        let Some(SchemaNode::Object(result)) = schema.get("result") else {
            panic!("expected nested result schema");
        };
        assert!(matches!(result.get("reviewBody"), Some(SchemaNode::Field(_))));
        assert!(result.get("url").is_none());
        assert!(result.get("author").is_none());
    }

    #[test]
    fn test_output_schema_only_has_output_fields() {
        let schema = build_schema(&review_action(), Mode::Output).unwrap();
        assert_eq!(schema.field_count(), 1);
        assert!(schema.get("object").is_none());
    }

    #[test]
    fn test_empty_schema_accepts_anything_object_like() {
        let schema = build_schema(&node(json!({"name": "x"})), Mode::Input).unwrap();
        assert!(schema.is_empty());
        assert!(schema.check(&Node::object()).is_ok());
        assert!(schema.check(&node(json!({"other": 1}))).is_ok());
    }

    #[test]
    fn test_check_reports_nested_path() {
        let schema = build_schema(&review_action(), Mode::Input).unwrap();
        let state = node(json!({
            "object": {"url": "https://example.com"},
            "result": {"reviewBody": "great", "reviewRating": {"ratingValue": 9}}
        }));
        let err = schema.check(&state).unwrap_err();
        assert_eq!(err.path, "result.reviewRating.ratingValue");
        assert_eq!(err.reason, ValidationFailure::RangeOverflow);
    }

    #[test]
    fn test_missing_nested_object_checks_as_empty() {
        let schema = build_schema(&review_action(), Mode::Input).unwrap();
        let err = schema.check(&Node::object()).unwrap_err();
        assert_eq!(err.path, "object.url");
        assert_eq!(err.reason, ValidationFailure::Missing);
    }

    #[test]
    fn test_nested_non_object_fails() {
        let schema = build_schema(&review_action(), Mode::Input).unwrap();
        let err = schema.check(&node(json!({"object": "oops"}))).unwrap_err();
        assert_eq!(err.reason, ValidationFailure::NotAnObject);
    }

    #[test]
    fn test_sibling_array_becomes_choices() {
        let action = node(json!({
            "color": ["red", "green"],
            "color-input": "required"
        }));
        let schema = build_schema(&action, Mode::Input).unwrap();
        assert!(schema.check(&node(json!({"color": "red"}))).is_ok());
        let err = schema.check(&node(json!({"color": "blue"}))).unwrap_err();
        assert_eq!(err.reason, ValidationFailure::NotAllowed);
    }

    #[test]
    fn test_invalid_spec_propagates() {
        let action = node(json!({"q-input": {"@type": "Thing"}}));
        assert!(matches!(
            build_schema(&action, Mode::Input),
            Err(SpecError::UnknownType(_))
        ));
    }

    #[test]
    fn test_conflicting_markers_detected() {
        let action = node(json!({"result": {"x-input": "required", "x-output": "required"}}));
        let err = check_markers(&action).unwrap_err();
        assert!(matches!(err, SpecError::ConflictingMarkers { key } if key == "result.x"));
        assert!(check_markers(&review_action()).is_ok());
    }

    #[test]
    fn test_describe_nested() {
        let schema = build_schema(&review_action(), Mode::Input).unwrap();
        let description = schema.describe();
        assert_eq!(
            description["result"]["reviewRating"]["ratingValue"]["required"],
            json!(true)
        );
    }
}
