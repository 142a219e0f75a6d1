//! Error types for the action engine
//!
//! Domain errors use thiserror; the handler boundary carries `anyhow::Error`
//! so caller-supplied failures propagate without re-wording.

use std::fmt;
use thiserror::Error;

/// Errors raised while parsing or compiling a PropertyValueSpecification
#[derive(Debug, Error)]
pub enum SpecError {
    /// Structured spec carried an `@type` other than PropertyValueSpecification
    #[error("Unknown specification type '{0}'")]
    UnknownType(String),

    /// A structured spec field had the wrong shape
    #[error("Invalid field '{field}': {detail}")]
    InvalidField {
        /// Field name
        field: String,
        /// Description of the problem
        detail: String,
    },

    /// Spec value was neither a string nor an object
    #[error("Specification must be a string or an object, found {0}")]
    InvalidShape(&'static str),

    /// `valuePattern` did not compile
    #[error("Invalid pattern '{pattern}': {source}")]
    InvalidPattern {
        /// Pattern text
        pattern: String,
        /// Underlying regex error
        #[source]
        source: regex::Error,
    },

    /// A key carried both `-input` and `-output` markers
    #[error("Key '{key}' declares both -input and -output markers")]
    ConflictingMarkers {
        /// Dotted path of the unprefixed key
        key: String,
    },
}

/// Convenience result alias for spec operations
pub type SpecResult<T> = std::result::Result<T, SpecError>;

/// Reason a value failed its constraints
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationFailure {
    /// Required value is absent
    Missing,
    /// Value matches none of the date/number/string branches
    TypeMismatch,
    /// Value below `minValue`
    RangeUnderflow,
    /// Value above `maxValue`
    RangeOverflow,
    /// Value not divisible by `stepValue`
    StepMismatch,
    /// String does not match `valuePattern`
    PatternMismatch,
    /// String shorter than `valueMinLength`
    TooShort,
    /// String longer than `valueMaxLength`
    TooLong,
    /// Value not in the declared allow-list
    NotAllowed,
    /// Expected a nested object
    NotAnObject,
    /// `actionStatus` is not a legal ActionStatusType
    InvalidStatus(String),
}

impl fmt::Display for ValidationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationFailure::Missing => write!(f, "value is required"),
            ValidationFailure::TypeMismatch => write!(f, "value has an unsupported type"),
            ValidationFailure::RangeUnderflow => write!(f, "value is below the minimum"),
            ValidationFailure::RangeOverflow => write!(f, "value is above the maximum"),
            ValidationFailure::StepMismatch => write!(f, "value does not match the step"),
            ValidationFailure::PatternMismatch => write!(f, "value does not match the pattern"),
            ValidationFailure::TooShort => write!(f, "value is too short"),
            ValidationFailure::TooLong => write!(f, "value is too long"),
            ValidationFailure::NotAllowed => write!(f, "value is not one of the allowed choices"),
            ValidationFailure::NotAnObject => write!(f, "expected an object"),
            ValidationFailure::InvalidStatus(status) => {
                write!(f, "'{}' is not a valid action status", status)
            }
        }
    }
}

/// First constraint violation found while checking a state against a schema
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{path}: {reason}")]
pub struct ValidationError {
    /// Dotted path of the failing field (empty for the root)
    pub path: String,
    /// What went wrong
    pub reason: ValidationFailure,
}

impl ValidationError {
    /// Create an error at the given path
    pub fn new(path: impl Into<String>, reason: ValidationFailure) -> Self {
        Self {
            path: path.into(),
            reason,
        }
    }

    /// Prefix the path with a parent key
    pub fn within(mut self, parent: &str) -> Self {
        self.path = if self.path.is_empty() {
            parent.to_string()
        } else {
            format!("{}.{}", parent, self.path)
        };
        self
    }
}

/// Convenience result alias for validation
pub type ValidationResult<T> = std::result::Result<T, ValidationError>;

/// Failures surfaced by `perform`
#[derive(Debug, Error)]
pub enum PerformError {
    /// Pre-flight validation failed; the handler was not called
    #[error("Input is invalid")]
    InputInvalid(#[source] ValidationError),

    /// Handler response failed output validation
    #[error("Output is invalid")]
    OutputInvalid(#[source] ValidationError),

    /// Handler rejected; the original error is passed through
    #[error(transparent)]
    HandlerRejected(anyhow::Error),
}

impl PerformError {
    /// Underlying validation error for `InputInvalid`/`OutputInvalid`
    pub fn validation_error(&self) -> Option<&ValidationError> {
        match self {
            PerformError::InputInvalid(err) | PerformError::OutputInvalid(err) => Some(err),
            PerformError::HandlerRejected(_) => None,
        }
    }

    /// Handler error for `HandlerRejected`
    pub fn handler_error(&self) -> Option<&anyhow::Error> {
        match self {
            PerformError::HandlerRejected(err) => Some(err),
            _ => None,
        }
    }
}

/// Convenience result alias for perform
pub type PerformResult<T> = std::result::Result<T, PerformError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_paths() {
        let err = ValidationError::new("url", ValidationFailure::Missing)
            .within("object")
            .within("result");
        assert_eq!(err.path, "result.object.url");
        assert_eq!(err.to_string(), "result.object.url: value is required");
    }

    #[test]
    fn test_handler_error_is_transparent() {
        let err = PerformError::HandlerRejected(anyhow::anyhow!("network down"));
        assert_eq!(err.to_string(), "network down");
        assert!(err.validation_error().is_none());
    }
}
