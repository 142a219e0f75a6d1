//! Action engine and public API
//!
//! This module wires the constraint compiler, schema builder, state and
//! variable traversals, and the lifecycle store together, and exposes the
//! configuration shared by all of them.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

// Submodules
pub mod error;
pub mod node;
pub mod schema;
pub mod spec;
pub mod state;
pub mod store;
pub mod validator;
pub mod validity;
pub mod variables;

/// Suffix marking a user-editable field
pub const INPUT_SUFFIX: &str = "-input";

/// Suffix marking a handler-populated field
pub const OUTPUT_SUFFIX: &str = "-output";

/// Which family of markers a traversal follows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// `-input` markers
    Input,
    /// `-output` markers
    Output,
}

impl Mode {
    /// Marker suffix for this mode
    pub fn suffix(self) -> &'static str {
        match self {
            Mode::Input => INPUT_SUFFIX,
            Mode::Output => OUTPUT_SUFFIX,
        }
    }

    /// Strip this mode's suffix from a key, returning the governed field name
    pub fn unprefixed(self, key: &str) -> Option<&str> {
        key.strip_suffix(self.suffix())
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Mode::Input => write!(f, "input"),
            Mode::Output => write!(f, "output"),
        }
    }
}

/// Whether a key carries either marker suffix
pub fn is_marker(key: &str) -> bool {
    key.ends_with(INPUT_SUFFIX) || key.ends_with(OUTPUT_SUFFIX)
}

/// Configuration for an [`ActionStore`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Validate handler responses against the output schema
    pub validate_output: bool,

    /// Refuse actions where a key has both `-input` and `-output` markers
    pub reject_conflicting_markers: bool,

    /// Status assigned to a freshly created store
    pub initial_status: ActionStatusType,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            validate_output: true,
            reject_conflicting_markers: true,
            initial_status: ActionStatusType::PotentialActionStatus,
        }
    }
}

impl StoreConfig {
    /// Load configuration from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        let config = serde_json::from_str(&data)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;
        Ok(config)
    }
}

// Re-export commonly used types
pub use error::{PerformError, SpecError, ValidationError, ValidationFailure};
pub use node::{Node, NodeMap};
pub use schema::{Schema, build_schema};
pub use spec::{PropertyValueSpec, SpecRecord, parse_spec};
pub use state::{ActionState, ActionStatusType, extract_state, merge_response, merge_state};
pub use store::{ActionControls, ActionHandler, ActionStore, HandlerInit};
pub use validity::{ValidityState, validate};
pub use variables::{VariableMap, extract_variables, merge_variables};
