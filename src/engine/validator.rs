//! Field-level validators compiled from a [`SpecRecord`]
//!
//! A field's runtime type is not known statically, so each validator holds
//! up to three branches tried in a fixed order: date, number, string. A value
//! is accepted as soon as one branch accepts it. When every branch refuses,
//! the reported failure comes from the first branch whose type matched the
//! value, falling back to a type mismatch.

use chrono::{DateTime, Utc};
use serde_json::{Value, json};

use super::error::ValidationFailure;
use super::node::Node;
use super::spec::{SpecRecord, SpecValue, ValuePattern};

/// Primitive type handled by a branch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BranchKind {
    /// Date-time values
    Date,
    /// Numeric values
    Number,
    /// String values
    String,
}

impl BranchKind {
    fn as_str(self) -> &'static str {
        match self {
            BranchKind::Date => "date",
            BranchKind::Number => "number",
            BranchKind::String => "string",
        }
    }
}

#[derive(Debug, Clone)]
enum Rules {
    Date {
        min: Option<DateTime<Utc>>,
        max: Option<DateTime<Utc>>,
        step: Option<f64>,
    },
    Number {
        min: Option<f64>,
        max: Option<f64>,
        step: Option<f64>,
    },
    String {
        pattern: Option<ValuePattern>,
        min_length: Option<usize>,
        max_length: Option<usize>,
    },
}

#[derive(Debug, Clone)]
struct Branch {
    rules: Rules,
    optional: bool,
}

enum Outcome {
    Accepted,
    Incompatible,
    Rejected(ValidationFailure),
}

impl Branch {
    fn kind(&self) -> BranchKind {
        match self.rules {
            Rules::Date { .. } => BranchKind::Date,
            Rules::Number { .. } => BranchKind::Number,
            Rules::String { .. } => BranchKind::String,
        }
    }

    fn check(&self, value: &Node) -> Outcome {
        match (&self.rules, value) {
            (Rules::Date { min, max, step }, Node::Date(dt)) => {
                if min.is_some_and(|min| *dt < min) {
                    return Outcome::Rejected(ValidationFailure::RangeUnderflow);
                }
                if max.is_some_and(|max| *dt > max) {
                    return Outcome::Rejected(ValidationFailure::RangeOverflow);
                }
                if step.is_some_and(|step| !is_multiple(dt.timestamp_millis() as f64, step)) {
                    return Outcome::Rejected(ValidationFailure::StepMismatch);
                }
                Outcome::Accepted
            }
            (Rules::Number { min, max, step }, Node::Number(n)) => {
                if min.is_some_and(|min| *n < min) {
                    return Outcome::Rejected(ValidationFailure::RangeUnderflow);
                }
                if max.is_some_and(|max| *n > max) {
                    return Outcome::Rejected(ValidationFailure::RangeOverflow);
                }
                if step.is_some_and(|step| !is_multiple(*n, step)) {
                    return Outcome::Rejected(ValidationFailure::StepMismatch);
                }
                Outcome::Accepted
            }
            (
                Rules::String {
                    pattern,
                    min_length,
                    max_length,
                },
                Node::String(text),
            ) => {
                // Lengths count UTF-16 code units, like HTML `maxlength`
                let len = text.encode_utf16().count();
                if min_length.is_some_and(|min| len < min) {
                    return Outcome::Rejected(ValidationFailure::TooShort);
                }
                if max_length.is_some_and(|max| len > max) {
                    return Outcome::Rejected(ValidationFailure::TooLong);
                }
                if pattern.as_ref().is_some_and(|p| !p.is_match(text)) {
                    return Outcome::Rejected(ValidationFailure::PatternMismatch);
                }
                Outcome::Accepted
            }
            _ => Outcome::Incompatible,
        }
    }
}

/// A step that is not positive places no constraint on the value
fn is_multiple(value: f64, step: f64) -> bool {
    step <= 0.0 || value % step == 0.0
}

/// Validator for a single constrained field
#[derive(Debug, Clone)]
pub struct FieldValidator {
    spec: SpecRecord,
    branches: Vec<Branch>,
    choices: Vec<Node>,
}

impl FieldValidator {
    /// Compile a spec; a non-empty `choices` list restricts every branch to those values
    pub fn compile(spec: &SpecRecord, choices: &[Node]) -> Self {
        let optional_for = |kind: BranchKind| {
            let default_matches = match &spec.default_value {
                Some(SpecValue::Date(_)) => kind == BranchKind::Date,
                Some(SpecValue::Number(_)) => kind == BranchKind::Number,
                Some(SpecValue::Text(_)) => kind == BranchKind::String,
                None => false,
            };
            default_matches || !spec.value_required
        };

        let date = Branch {
            rules: Rules::Date {
                min: spec.min_value.as_ref().and_then(SpecValue::as_date),
                max: spec.max_value.as_ref().and_then(SpecValue::as_date),
                step: spec.step_value,
            },
            optional: optional_for(BranchKind::Date),
        };

        let number = Branch {
            rules: Rules::Number {
                min: spec.min_value.as_ref().and_then(SpecValue::as_number),
                max: spec.max_value.as_ref().and_then(SpecValue::as_number),
                step: spec.step_value,
            },
            optional: optional_for(BranchKind::Number),
        };

        let string = Branch {
            rules: Rules::String {
                pattern: spec.value_pattern.clone(),
                min_length: spec.value_min_length,
                max_length: spec.value_max_length,
            },
            optional: optional_for(BranchKind::String),
        };

        Self {
            spec: spec.clone(),
            branches: vec![date, number, string],
            choices: choices.iter().filter(|c| !c.is_null()).cloned().collect(),
        }
    }

    /// The spec this validator was compiled from
    pub fn spec(&self) -> &SpecRecord {
        &self.spec
    }

    /// Whether an absent value fails validation
    pub fn is_required(&self) -> bool {
        !self.branches.iter().any(|b| b.optional)
    }

    /// Whether the field holds an array
    pub fn is_multiple(&self) -> bool {
        self.spec.multiple_values
    }

    /// Allowed values, empty when unrestricted
    pub fn choices(&self) -> &[Node] {
        &self.choices
    }

    /// Check a field value; `None` and `Null` both mean absent
    pub fn check(&self, value: Option<&Node>) -> Result<(), ValidationFailure> {
        let value = match value.filter(|v| !v.is_null()) {
            Some(value) => value,
            None if self.is_required() => return Err(ValidationFailure::Missing),
            None => return Ok(()),
        };

        if self.spec.multiple_values {
            let items = value.as_array().ok_or(ValidationFailure::TypeMismatch)?;
            self.first_accepting(|branch| self.check_items(branch, items))
        } else {
            self.first_accepting(|branch| self.check_one(branch, value))
        }
    }

    fn first_accepting<F>(&self, mut attempt: F) -> Result<(), ValidationFailure>
    where
        F: FnMut(&Branch) -> Outcome,
    {
        let mut failure = None;
        for branch in &self.branches {
            match attempt(branch) {
                Outcome::Accepted => return Ok(()),
                Outcome::Rejected(reason) => {
                    if failure.is_none() {
                        failure = Some(reason);
                    }
                }
                Outcome::Incompatible => {}
            }
        }
        Err(failure.unwrap_or(ValidationFailure::TypeMismatch))
    }

    fn check_items(&self, branch: &Branch, items: &[Node]) -> Outcome {
        for item in items {
            match self.check_one(branch, item) {
                Outcome::Accepted => {}
                other => return other,
            }
        }
        Outcome::Accepted
    }

    fn check_one(&self, branch: &Branch, value: &Node) -> Outcome {
        match branch.check(value) {
            Outcome::Accepted if !self.choices.is_empty() && !self.choices.contains(value) => {
                Outcome::Rejected(ValidationFailure::NotAllowed)
            }
            outcome => outcome,
        }
    }

    /// JSON description for inspection tools
    pub fn describe(&self) -> Value {
        let types: Vec<&str> = self.branches.iter().map(|b| b.kind().as_str()).collect();
        let mut description = json!({
            "types": types,
            "required": self.is_required(),
            "multiple": self.spec.multiple_values,
            "constraints": serde_json::to_value(&self.spec).unwrap_or(Value::Null),
        });
        if !self.choices.is_empty() {
            description["choices"] = Value::Array(self.choices.iter().map(Node::to_json).collect());
        }
        description
    }
}
