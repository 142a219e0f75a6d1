//! Named-variable extraction and merging
//!
//! A marker whose spec declares `valueName` (`name=` in the compact form)
//! binds its field to a flat variable, typically consumed by URL-template
//! expansion. Fields without a name never appear in the map.

use std::collections::BTreeMap;

use super::Mode;
use super::error::SpecResult;
use super::node::Node;
use super::schema::{Schema, SchemaNode, build_schema};
use super::state::{ActionState, merge_state};

/// Flat mapping from `valueName` to the current field value (`Null` when unset)
pub type VariableMap = BTreeMap<String, Node>;

/// Collect named variables for `mode`, reading values from the live state
pub fn extract_variables(action: &Node, state: &Node, mode: Mode) -> SpecResult<VariableMap> {
    let schema = build_schema(action, mode)?;
    Ok(schema_variables(&schema, state))
}

/// Collect named variables from an already compiled schema
pub fn schema_variables(schema: &Schema, state: &Node) -> VariableMap {
    let mut variables = VariableMap::new();
    collect(schema, Some(state), &mut variables);
    variables
}

fn collect(schema: &Schema, state: Option<&Node>, variables: &mut VariableMap) {
    for (key, entry) in schema.entries() {
        match entry {
            SchemaNode::Field(validator) => {
                if let Some(variable) = &validator.spec().value_name {
                    let current = state.and_then(|s| s.get(key)).cloned().unwrap_or_default();
                    variables.insert(variable.clone(), current);
                }
            }
            SchemaNode::Object(nested) => collect(nested, state.and_then(|s| s.get(key)), variables),
        }
    }
}

/// Merge a flat variable map back into nested state shape.
///
/// Each named field takes the variable's value when it is set; every other
/// field keeps its value from `base`.
pub fn merge_variables(
    action: &Node,
    base: &Node,
    variables: &VariableMap,
    mode: Mode,
) -> SpecResult<ActionState> {
    let schema = build_schema(action, mode)?;
    let update = expand(&schema, variables);
    Ok(merge_state(action, base, &update, mode))
}

fn expand(schema: &Schema, variables: &VariableMap) -> Node {
    let mut update = Node::object();

    for (key, entry) in schema.entries() {
        match entry {
            SchemaNode::Field(validator) => {
                let bound = validator
                    .spec()
                    .value_name
                    .as_ref()
                    .and_then(|variable| variables.get(variable))
                    .filter(|value| !value.is_null());
                if let Some(bound) = bound {
                    update.insert(key, bound.clone());
                }
            }
            SchemaNode::Object(nested) => {
                let nested = expand(nested, variables);
                if nested.as_object().is_some_and(|m| !m.is_empty()) {
                    update.insert(key, nested);
                }
            }
        }
    }

    update
}
