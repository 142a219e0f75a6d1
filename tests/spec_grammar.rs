//! PropertyValueSpecification grammar tests
//!
//! Verifies that the compact token form and the structured object form
//! compile into validators with identical accept/reject behavior.

use chrono::{TimeZone, Utc};
use potential_action::engine::spec::{parse_compact, parse_spec};
use potential_action::engine::validator::FieldValidator;
use potential_action::engine::{Node, SpecError};
use proptest::prelude::*;
use serde_json::{Value, json};

fn probes() -> Vec<Option<Node>> {
    let scalars = vec![
        Node::Number(-5.0),
        Node::Number(0.0),
        Node::Number(3.0),
        Node::Number(4.0),
        Node::Number(42.0),
        Node::from(""),
        Node::from("abc"),
        Node::from("a1c"),
        Node::from("123"),
        Node::from("abcdefghijklmnop"),
        Node::Bool(true),
    ];

    let mut probes: Vec<Option<Node>> = vec![None, Some(Node::Null)];
    probes.extend(scalars.iter().cloned().map(Some));
    probes.push(Some(Node::Array(vec![])));
    probes.push(Some(Node::Array(vec![Node::from("abc"), Node::from("xyz")])));
    probes.push(Some(Node::Array(vec![Node::Number(2.0), Node::Number(4.0)])));
    probes.push(Some(Node::Array(vec![Node::from("abc"), Node::Number(1.0)])));
    probes
}

fn spec_object() -> impl Strategy<Value = Value> {
    (
        any::<bool>(),
        any::<bool>(),
        prop::option::of("[a-z]{1,8}"),
        prop::option::of(-50i64..50),
        prop::option::of(-50i64..50),
        prop::option::of(1i64..6),
        prop::option::of(0u64..6),
        prop::option::of(0u64..12),
        prop::option::of(prop::sample::select(vec!["[a-z]+", "\\d+", "a.c", "[a-z]{2,4}"])),
    )
        .prop_map(
            |(required, multiple, name, min, max, step, min_len, max_len, pattern)| {
                let mut obj = serde_json::Map::new();
                obj.insert("@type".into(), json!("PropertyValueSpecification"));
                obj.insert("valueRequired".into(), json!(required));
                obj.insert("multipleValues".into(), json!(multiple));
                if let Some(name) = name {
                    obj.insert("valueName".into(), json!(name));
                }
                if let Some(min) = min {
                    obj.insert("minValue".into(), json!(min));
                }
                if let Some(max) = max {
                    obj.insert("maxValue".into(), json!(max));
                }
                if let Some(step) = step {
                    obj.insert("stepValue".into(), json!(step));
                }
                if let Some(len) = min_len {
                    obj.insert("valueMinLength".into(), json!(len));
                }
                if let Some(len) = max_len {
                    obj.insert("valueMaxLength".into(), json!(len));
                }
                if let Some(pattern) = pattern {
                    obj.insert("valuePattern".into(), json!(pattern));
                }
                Value::Object(obj)
            },
        )
}

proptest! {
    #[test]
    fn compact_form_matches_structured(object in spec_object()) {
        let structured = parse_spec(&Node::from(object)).unwrap();
        let compact_text = structured.to_compact().unwrap();
        let compact = parse_compact(&compact_text).unwrap();

        let from_object = FieldValidator::compile(&structured, &[]);
        let from_string = FieldValidator::compile(&compact, &[]);

        for probe in probes() {
            prop_assert_eq!(
                from_object.check(probe.as_ref()),
                from_string.check(probe.as_ref()),
                "probe {:?} with compact spec '{}'",
                probe,
                compact_text
            );
        }
    }
}

#[test]
fn compact_and_structured_agree_on_example() {
    let compact = parse_compact("required maxlength=100 name=q").unwrap();
    let structured = parse_spec(&Node::from(json!({
        "valueRequired": true,
        "valueMaxLength": "100",
        "valueName": "q"
    })))
    .unwrap();
    assert_eq!(compact, structured);
}

#[test]
fn date_bounds_from_strings() {
    let spec = parse_compact("required min=2024-01-01 max=2024-01-31T23:59").unwrap();
    let validator = FieldValidator::compile(&spec, &[]);

    let inside = Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap();
    let after = Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap();
    assert!(validator.check(Some(&Node::Date(inside))).is_ok());
    assert!(validator.check(Some(&Node::Date(after))).is_err());
}

#[test]
fn date_step_uses_epoch_millis() {
    let spec = parse_compact("step=1000").unwrap();
    let validator = FieldValidator::compile(&spec, &[]);

    let whole_second = Utc.timestamp_millis_opt(5_000).unwrap();
    let fraction = Utc.timestamp_millis_opt(5_500).unwrap();
    assert!(validator.check(Some(&Node::Date(whole_second))).is_ok());
    assert!(validator.check(Some(&Node::Date(fraction))).is_err());
}

#[test]
fn unknown_type_is_rejected() {
    let err = parse_spec(&Node::from(json!({"@type": "QuantitativeValue"}))).unwrap_err();
    assert!(matches!(err, SpecError::UnknownType(_)));
}
