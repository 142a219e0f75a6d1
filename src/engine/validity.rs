//! Pass/fail validation shaped like the DOM `ValidityState`
//!
//! Only `valid` and `customError` are ever set; field-level detail stays on
//! [`Schema::check`](super::schema::Schema::check).

use serde::{Deserialize, Serialize};

use super::error::ValidationError;
use super::node::Node;
use super::schema::Schema;

/// Validation outcome with the DOM `ValidityState` flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidityState {
    /// Value could not be converted
    pub bad_input: bool,
    /// Validation failed
    pub custom_error: bool,
    /// Pattern mismatch
    pub pattern_mismatch: bool,
    /// Above maximum
    pub range_overflow: bool,
    /// Below minimum
    pub range_underflow: bool,
    /// Step mismatch
    pub step_mismatch: bool,
    /// Too long
    pub too_long: bool,
    /// Too short
    pub too_short: bool,
    /// Wrong type
    pub type_mismatch: bool,
    /// Validation passed
    pub valid: bool,
    /// Required value missing
    pub value_missing: bool,
}

impl ValidityState {
    /// Passing state
    pub fn passed() -> Self {
        Self {
            valid: true,
            ..Self::default()
        }
    }

    /// Failing state
    pub fn failed() -> Self {
        Self {
            custom_error: true,
            ..Self::default()
        }
    }
}

impl From<&Result<(), ValidationError>> for ValidityState {
    fn from(result: &Result<(), ValidationError>) -> Self {
        match result {
            Ok(()) => ValidityState::passed(),
            Err(_) => ValidityState::failed(),
        }
    }
}

/// Validate a candidate state against a schema
pub fn validate(schema: &Schema, candidate: &Node) -> ValidityState {
    ValidityState::from(&schema.check(candidate))
}
