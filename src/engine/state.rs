//! ActionState extraction and merging
//!
//! The ActionState is the Action with every marker key stripped: only the
//! fields governed by an `-input`/`-output` marker survive, plus nested
//! objects that contain such fields, plus the synthetic `actionStatus`.
//! All merges rebuild the tree top-down and never mutate their inputs.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::error::ValidationFailure;
use super::node::{Node, NodeMap};
use super::{Mode, is_marker};

/// Key holding the lifecycle status inside an ActionState
pub const ACTION_STATUS_KEY: &str = "actionStatus";

/// Editable/observable projection of an Action
pub type ActionState = Node;

/// Lifecycle status of an action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActionStatusType {
    /// Idle, nothing performed yet
    PotentialActionStatus,
    /// Handler in flight
    ActiveActionStatus,
    /// Handler succeeded and its response was merged
    CompletedActionStatus,
    /// Validation or handler failure
    FailedActionStatus,
}

const STATUS_PREFIXES: &[&str] = &["https://schema.org/", "http://schema.org/", "schema:"];

impl ActionStatusType {
    /// Schema.org name of the status
    pub fn as_str(self) -> &'static str {
        match self {
            ActionStatusType::PotentialActionStatus => "PotentialActionStatus",
            ActionStatusType::ActiveActionStatus => "ActiveActionStatus",
            ActionStatusType::CompletedActionStatus => "CompletedActionStatus",
            ActionStatusType::FailedActionStatus => "FailedActionStatus",
        }
    }

    /// Status as a state node
    pub fn to_node(self) -> Node {
        Node::from(self.as_str())
    }
}

impl fmt::Display for ActionStatusType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionStatusType {
    type Err = ValidationFailure;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = STATUS_PREFIXES
            .iter()
            .find_map(|prefix| s.strip_prefix(prefix))
            .unwrap_or(s);

        match name {
            "PotentialActionStatus" => Ok(ActionStatusType::PotentialActionStatus),
            "ActiveActionStatus" => Ok(ActionStatusType::ActiveActionStatus),
            "CompletedActionStatus" => Ok(ActionStatusType::CompletedActionStatus),
            "FailedActionStatus" => Ok(ActionStatusType::FailedActionStatus),
            _ => Err(ValidationFailure::InvalidStatus(s.to_string())),
        }
    }
}

/// Read the status stored in a state, if present and valid
pub fn status_of(state: &Node) -> Option<ActionStatusType> {
    state
        .get(ACTION_STATUS_KEY)
        .and_then(Node::as_str)
        .and_then(|s| s.parse().ok())
}

/// Set the status stored in a state
pub fn set_status(state: &mut Node, status: ActionStatusType) {
    state.insert(ACTION_STATUS_KEY, status.to_node());
}

/// Merge `update` into `base` for every field governed by a `mode` marker.
///
/// Per field the update wins when it holds a non-null value, otherwise the
/// base value is kept. Base fields that no marker governs pass through.
/// Nested objects are merged recursively. A branch is kept, possibly empty,
/// when a `mode` marker appears anywhere below it, and omitted otherwise
/// unless `base` already holds it. The root is always an object.
pub fn merge_state(action: &Node, base: &Node, update: &Node, mode: Mode) -> ActionState {
    merge_level(action, Some(base), Some(update), mode).unwrap_or_else(Node::object)
}

fn merge_level(
    action: &Node,
    base: Option<&Node>,
    update: Option<&Node>,
    mode: Mode,
) -> Option<Node> {
    let action_map = action.as_object()?;
    let base_map = base.and_then(Node::as_object);
    let mut result: NodeMap = base_map.cloned().unwrap_or_default();
    let mut governed = false;

    for (key, value) in action_map {
        if let Some(name) = mode.unprefixed(key) {
            governed = true;
            let next = update
                .and_then(|u| u.get(name))
                .or_else(|| base.and_then(|b| b.get(name)));
            match next {
                Some(value) => {
                    result.insert(name.to_string(), value.clone());
                }
                None => {
                    result.remove(name);
                }
            }
        } else if matches!(value, Node::Object(_)) && !is_marker(key) {
            let nested = merge_level(
                value,
                base.and_then(|b| b.get(key)),
                update.and_then(|u| u.get(key)),
                mode,
            );
            if let Some(nested) = nested {
                governed = true;
                result.insert(key.clone(), nested);
            }
        }
    }

    if !governed && result.is_empty() && base_map.is_none() {
        None
    } else {
        Some(Node::Object(result))
    }
}

/// Extract the marker-governed values an Action declares for itself
pub fn extract_state(action: &Node) -> ActionState {
    let inputs = merge_state(action, &Node::object(), action, Mode::Input);
    merge_state(action, &inputs, action, Mode::Output)
}

/// Initial ActionState for a store: extracted values plus a status
pub fn initial_state(action: &Node, status: ActionStatusType) -> ActionState {
    let mut state = extract_state(action);
    set_status(&mut state, status);
    state
}

/// Apply a handler response onto the current state for `-output` fields
pub fn merge_response(action: &Node, current: &Node, response: &Node) -> ActionState {
    merge_state(action, current, response, Mode::Output)
}

/// Request view sent to a handler: only `-input` governed fields
pub fn request_view(action: &Node, state: &Node) -> ActionState {
    merge_state(action, &Node::object(), state, Mode::Input)
}
