//! PropertyValueSpecification parsing
//!
//! A constraint arrives either as a compact token string
//! (`"required maxlength=100 name=q"`) or as a structured object
//! (`{"valueRequired": true, "valueMaxLength": 100, "valueName": "q"}`).
//! Both normalize into a single [`SpecRecord`] before compilation.

use chrono::{DateTime, SecondsFormat, Utc};
use regex::Regex;
use serde::{Serialize, Serializer};

use super::error::{SpecError, SpecResult};
use super::node::{Node, NodeMap};
use crate::PROPERTY_VALUE_SPECIFICATION;
use crate::util::html;

/// Raw constraint as declared on an `-input`/`-output` key
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValueSpec {
    /// Whitespace-delimited token form
    Compact(String),
    /// Object form
    Structured(NodeMap),
}

impl PropertyValueSpec {
    /// Classify a marker value
    pub fn from_node(node: &Node) -> SpecResult<Self> {
        match node {
            Node::String(text) => Ok(PropertyValueSpec::Compact(text.clone())),
            Node::Object(map) => Ok(PropertyValueSpec::Structured(map.clone())),
            other => Err(SpecError::InvalidShape(other.kind())),
        }
    }

    /// Normalize into the canonical record
    pub fn normalize(&self) -> SpecResult<SpecRecord> {
        match self {
            PropertyValueSpec::Compact(text) => parse_compact(text),
            PropertyValueSpec::Structured(map) => parse_structured(map),
        }
    }
}

/// A bound or default value
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SpecValue {
    /// Numeric value
    Number(f64),
    /// Text, interpreted later as a date, a number, or a plain string
    Text(String),
    /// Date value
    Date(DateTime<Utc>),
}

impl SpecValue {
    fn from_node(field: &str, node: &Node) -> SpecResult<Self> {
        match node {
            Node::Number(n) => Ok(SpecValue::Number(*n)),
            Node::String(s) => Ok(SpecValue::Text(s.clone())),
            Node::Date(dt) => Ok(SpecValue::Date(*dt)),
            other => Err(invalid(field, format!("expected string, number or date, found {}", other.kind()))),
        }
    }

    /// Interpret as a number bound
    pub fn as_number(&self) -> Option<f64> {
        match self {
            SpecValue::Number(n) => Some(*n),
            SpecValue::Text(text) => html::parse_number(text),
            SpecValue::Date(_) => None,
        }
    }

    /// Interpret as a date bound; numbers are milliseconds since the epoch
    pub fn as_date(&self) -> Option<DateTime<Utc>> {
        match self {
            SpecValue::Number(n) => DateTime::from_timestamp_millis(*n as i64),
            SpecValue::Text(text) => html::parse_date(text),
            SpecValue::Date(dt) => Some(*dt),
        }
    }

    fn to_token(&self) -> Option<String> {
        match self {
            SpecValue::Number(n) if n.fract() == 0.0 => Some(format!("{}", *n as i64)),
            SpecValue::Number(_) => None,
            SpecValue::Text(text) if text.chars().any(char::is_whitespace) => None,
            SpecValue::Text(text) => Some(text.clone()),
            SpecValue::Date(dt) => Some(dt.to_rfc3339_opts(SecondsFormat::Millis, true)),
        }
    }
}

/// A compiled `valuePattern`, anchored to match the whole string
#[derive(Debug, Clone)]
pub struct ValuePattern {
    source: String,
    regex: Regex,
}

impl ValuePattern {
    /// Compile a pattern
    pub fn new(source: &str) -> SpecResult<Self> {
        let regex = Regex::new(&format!("^(?:{})$", source)).map_err(|err| {
            SpecError::InvalidPattern {
                pattern: source.to_string(),
                source: err,
            }
        })?;
        Ok(Self {
            source: source.to_string(),
            regex,
        })
    }

    /// Original pattern text
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Whole-string match
    pub fn is_match(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }
}

impl PartialEq for ValuePattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

impl Serialize for ValuePattern {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.source)
    }
}

/// Canonical PropertyValueSpecification
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpecRecord {
    /// Value used when the field is absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_value: Option<SpecValue>,
    /// Upper bound
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_value: Option<SpecValue>,
    /// Lower bound
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_value: Option<SpecValue>,
    /// Step for numbers and dates
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step_value: Option<f64>,
    /// Maximum string length
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value_max_length: Option<usize>,
    /// Minimum string length
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value_min_length: Option<usize>,
    /// External variable name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value_name: Option<String>,
    /// Whole-string pattern
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value_pattern: Option<ValuePattern>,
    /// Field holds an array
    pub multiple_values: bool,
    /// Field must be present
    pub value_required: bool,
}

impl SpecRecord {
    /// Render back into the compact token grammar.
    ///
    /// Returns `None` when a value cannot be expressed as a single token
    /// (embedded whitespace, fractional numbers).
    pub fn to_compact(&self) -> Option<String> {
        let mut tokens = Vec::new();

        if self.value_required {
            tokens.push("required".to_string());
        }
        if self.multiple_values {
            tokens.push("multiple".to_string());
        }
        if let Some(name) = &self.value_name {
            if name.chars().any(char::is_whitespace) {
                return None;
            }
            tokens.push(format!("name={}", name));
        }
        if let Some(value) = &self.default_value {
            tokens.push(format!("value={}", value.to_token()?));
        }
        if let Some(value) = &self.min_value {
            tokens.push(format!("min={}", value.to_token()?));
        }
        if let Some(value) = &self.max_value {
            tokens.push(format!("max={}", value.to_token()?));
        }
        if let Some(step) = self.step_value {
            tokens.push(format!("step={}", SpecValue::Number(step).to_token()?));
        }
        if let Some(len) = self.value_min_length {
            tokens.push(format!("minlength={}", len));
        }
        if let Some(len) = self.value_max_length {
            tokens.push(format!("maxlength={}", len));
        }
        if let Some(pattern) = &self.value_pattern {
            if pattern.source().chars().any(char::is_whitespace) {
                return None;
            }
            tokens.push(format!("pattern={}", pattern.source()));
        }

        Some(tokens.join(" "))
    }
}

/// Parse a marker value in either form
pub fn parse_spec(node: &Node) -> SpecResult<SpecRecord> {
    PropertyValueSpec::from_node(node)?.normalize()
}

/// Parse the compact token form; unknown tokens are ignored
pub fn parse_compact(text: &str) -> SpecResult<SpecRecord> {
    let mut record = SpecRecord::default();

    for token in text.split_whitespace() {
        let (key, value) = match token.split_once('=') {
            Some((key, value)) => (key, value),
            None => (token, ""),
        };

        match key {
            "name" => record.value_name = Some(value.to_string()),
            "max" => record.max_value = Some(SpecValue::Text(value.to_string())),
            "min" => record.min_value = Some(SpecValue::Text(value.to_string())),
            "value" => record.default_value = Some(SpecValue::Text(value.to_string())),
            "maxlength" => record.value_max_length = Some(length_token("maxlength", value)?),
            "minlength" => record.value_min_length = Some(length_token("minlength", value)?),
            "step" => {
                record.step_value = Some(
                    html::parse_number(value)
                        .ok_or_else(|| invalid("step", format!("'{}' is not a number", value)))?,
                )
            }
            "pattern" => record.value_pattern = Some(ValuePattern::new(value)?),
            "multiple" => record.multiple_values = true,
            "required" => record.value_required = true,
            _ => {}
        }
    }

    Ok(record)
}

fn length_token(field: &str, value: &str) -> SpecResult<usize> {
    html::parse_length(value)
        .ok_or_else(|| invalid(field, format!("'{}' is not a valid length", value)))
}

/// Parse the structured object form
pub fn parse_structured(map: &NodeMap) -> SpecResult<SpecRecord> {
    if let Some(kind) = map.get("@type").filter(|v| !v.is_null()) {
        match kind.as_str() {
            Some(PROPERTY_VALUE_SPECIFICATION) => {}
            Some(other) => return Err(SpecError::UnknownType(other.to_string())),
            None => return Err(SpecError::UnknownType(kind.to_json().to_string())),
        }
    }

    let field = |name: &str| map.get(name).filter(|v| !v.is_null());
    let mut record = SpecRecord::default();

    if let Some(node) = field("defaultValue") {
        record.default_value = Some(SpecValue::from_node("defaultValue", node)?);
    }
    if let Some(node) = field("maxValue") {
        record.max_value = Some(SpecValue::from_node("maxValue", node)?);
    }
    if let Some(node) = field("minValue") {
        record.min_value = Some(SpecValue::from_node("minValue", node)?);
    }
    if let Some(node) = field("stepValue") {
        record.step_value = Some(numeric_field("stepValue", node)?);
    }
    if let Some(node) = field("valueMaxLength") {
        record.value_max_length = Some(length_field("valueMaxLength", node)?);
    }
    if let Some(node) = field("valueMinLength") {
        record.value_min_length = Some(length_field("valueMinLength", node)?);
    }
    if let Some(node) = field("valueName") {
        let name = node
            .as_str()
            .ok_or_else(|| invalid("valueName", format!("expected string, found {}", node.kind())))?;
        record.value_name = Some(name.to_string());
    }
    if let Some(node) = field("valuePattern") {
        let pattern = node
            .as_str()
            .ok_or_else(|| invalid("valuePattern", format!("expected string, found {}", node.kind())))?;
        record.value_pattern = Some(ValuePattern::new(pattern)?);
    }
    if let Some(node) = field("multipleValues") {
        record.multiple_values = bool_field("multipleValues", node)?;
    }
    if let Some(node) = field("valueRequired") {
        record.value_required = bool_field("valueRequired", node)?;
    }

    Ok(record)
}

fn numeric_field(field: &str, node: &Node) -> SpecResult<f64> {
    match node {
        Node::Number(n) => Ok(*n),
        Node::String(text) => html::parse_number(text)
            .ok_or_else(|| invalid(field, format!("'{}' is not a number", text))),
        other => Err(invalid(field, format!("expected number, found {}", other.kind()))),
    }
}

fn length_field(field: &str, node: &Node) -> SpecResult<usize> {
    let value = numeric_field(field, node)?;
    if value < 0.0 {
        return Err(invalid(field, "length must not be negative"));
    }
    Ok(value as usize)
}

fn bool_field(field: &str, node: &Node) -> SpecResult<bool> {
    match node {
        Node::Bool(b) => Ok(*b),
        other => Err(invalid(field, format!("expected boolean, found {}", other.kind()))),
    }
}

fn invalid(field: &str, detail: impl Into<String>) -> SpecError {
    SpecError::InvalidField {
        field: field.to_string(),
        detail: detail.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn structured(value: serde_json::Value) -> SpecResult<SpecRecord> {
        parse_spec(&Node::from(value))
    }

    #[test]
    fn test_compact_tokens() {
        let record = parse_compact("required maxlength=100 name=q").unwrap();
        assert!(record.value_required);
        assert_eq!(record.value_max_length, Some(100));
        assert_eq!(record.value_name.as_deref(), Some("q"));
        assert!(!record.multiple_values);
    }

    #[test]
    fn test_compact_ignores_unknown_tokens() {
        let record = parse_compact("readonly size=4 multiple").unwrap();
        assert!(record.multiple_values);
        assert_eq!(record.value_name, None);
    }

    #[test]
    fn test_compact_pattern_keeps_remainder() {
        let record = parse_compact("pattern=a=b+").unwrap();
        let pattern = record.value_pattern.unwrap();
        assert_eq!(pattern.source(), "a=b+");
        assert!(pattern.is_match("a=bbb"));
        assert!(!pattern.is_match("xa=b"));
    }

    #[test]
    fn test_compact_bounds_stay_textual() {
        let record = parse_compact("min=2024-01-01 max=10 value=5").unwrap();
        assert_eq!(record.min_value, Some(SpecValue::Text("2024-01-01".into())));
        assert_eq!(record.max_value.unwrap().as_number(), Some(10.0));
        assert_eq!(record.default_value, Some(SpecValue::Text("5".into())));
    }

    #[test]
    fn test_compact_rejects_bad_lengths() {
        assert!(matches!(
            parse_compact("maxlength=abc"),
            Err(SpecError::InvalidField { .. })
        ));
    }

    #[test]
    fn test_structured_matches_compact() {
        let from_object = structured(json!({
            "@type": "PropertyValueSpecification",
            "valueRequired": true,
            "valueMaxLength": 100,
            "valueName": "q"
        }))
        .unwrap();
        let from_string = parse_compact("required maxlength=100 name=q").unwrap();
        assert_eq!(from_object, from_string);
    }

    #[test]
    fn test_structured_numeric_strings() {
        let record = structured(json!({"valueMinLength": "3", "stepValue": "5"})).unwrap();
        assert_eq!(record.value_min_length, Some(3));
        assert_eq!(record.step_value, Some(5.0));
    }

    #[test]
    fn test_structured_unknown_type_fails() {
        let err = structured(json!({"@type": "Thing", "valueRequired": true})).unwrap_err();
        assert!(matches!(err, SpecError::UnknownType(t) if t == "Thing"));
    }

    #[test]
    fn test_structured_wrong_field_type_fails() {
        assert!(structured(json!({"valueRequired": "yes"})).is_err());
        assert!(structured(json!({"valueName": 4})).is_err());
    }

    #[test]
    fn test_invalid_shape() {
        assert!(matches!(
            parse_spec(&Node::Bool(true)),
            Err(SpecError::InvalidShape("boolean"))
        ));
    }

    #[test]
    fn test_invalid_pattern() {
        assert!(matches!(
            parse_compact("pattern=(unclosed"),
            Err(SpecError::InvalidPattern { .. })
        ));
    }

    #[test]
    fn test_to_compact_round_trip() {
        let record = parse_compact("required multiple name=tags minlength=2 maxlength=8 pattern=[a-z]+").unwrap();
        let compact = record.to_compact().unwrap();
        assert_eq!(parse_compact(&compact).unwrap(), record);
    }

    #[test]
    fn test_to_compact_rejects_whitespace() {
        let record = structured(json!({"defaultValue": "two words"})).unwrap();
        assert_eq!(record.to_compact(), None);
    }

    #[test]
    fn test_record_serializes_camel_case() {
        let record = parse_compact("required name=q pattern=\\d+").unwrap();
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["valueName"], json!("q"));
        assert_eq!(json["valuePattern"], json!("\\d+"));
        assert_eq!(json["valueRequired"], json!(true));
        assert!(json.get("maxValue").is_none());
    }
}
