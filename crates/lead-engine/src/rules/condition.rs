//! Condition evaluation against a single enquiry
//!
//! Evaluation is pure: fields are resolved by name into a [`FieldValue`] and
//! compared with the condition's JSON value. Anything the evaluator cannot
//! interpret fails closed.

use serde_json::Value;

use crate::enquiry::{Enquiry, LeadDetails};

use super::{Condition, Operator};

/// A resolved enquiry field
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    Number(f64),
    List(Vec<String>),
    Absent,
}

impl FieldValue {
    fn from_option(value: Option<&str>) -> Self {
        match value {
            Some(v) => FieldValue::Text(v.to_string()),
            None => FieldValue::Absent,
        }
    }

    fn from_json(value: &Value) -> Self {
        match value {
            Value::Null => FieldValue::Absent,
            Value::Bool(b) => FieldValue::Text(b.to_string()),
            Value::Number(n) => n.as_f64().map(FieldValue::Number).unwrap_or(FieldValue::Absent),
            Value::String(s) => FieldValue::Text(s.clone()),
            Value::Array(items) => FieldValue::List(items.iter().filter_map(json_scalar_text).collect()),
            Value::Object(_) => FieldValue::Text(value.to_string()),
        }
    }

    fn as_number(&self) -> Option<f64> {
        match self {
            FieldValue::Number(n) => Some(*n),
            FieldValue::Text(s) => parse_finite(s),
            _ => None,
        }
    }

    fn as_text(&self) -> Option<String> {
        match self {
            FieldValue::Text(s) => Some(s.clone()),
            FieldValue::Number(n) => Some(format_number(*n)),
            _ => None,
        }
    }
}

/// Resolve `field` on the enquiry. Typed fields win over custom attributes.
pub fn resolve_field(enquiry: &Enquiry, field: &str) -> FieldValue {
    match field.trim() {
        "name" => FieldValue::from_option(enquiry.name.as_deref()),
        "mobile" => FieldValue::Text(enquiry.mobile.clone()),
        "email" => FieldValue::from_option(enquiry.email.as_deref()),
        "lead_type" => FieldValue::Text(enquiry.lead_type().as_str().to_string()),
        "profile" | "profile_type" => FieldValue::Text(enquiry.profile.as_str().to_string()),
        "source" | "channel" => FieldValue::from_option(enquiry.source.as_deref()),
        "city" => FieldValue::from_option(enquiry.city.as_deref()),
        "state" => FieldValue::from_option(enquiry.state.as_deref()),
        "tags" => FieldValue::List(enquiry.tags.clone()),
        "status" => FieldValue::Text(enquiry.status.as_str().to_string()),
        "stage" => FieldValue::Text(enquiry.stage.as_str().to_string()),
        "priority" => FieldValue::Text(enquiry.priority.as_str().to_string()),
        "assigned_team" => FieldValue::from_option(enquiry.assigned_team.as_deref()),
        "business_model" => match &enquiry.lead {
            LeadDetails::B2b { business_model, .. } => FieldValue::Text(business_model.clone()),
            LeadDetails::B2c { .. } => FieldValue::Absent,
        },
        "company_name" => match &enquiry.lead {
            LeadDetails::B2b { company_name, .. } => FieldValue::Text(company_name.clone()),
            LeadDetails::B2c { .. } => FieldValue::Absent,
        },
        "capacity" => match &enquiry.lead {
            LeadDetails::B2c { capacity, .. } => FieldValue::Number(*capacity),
            LeadDetails::B2b { .. } => FieldValue::Absent,
        },
        "category" => match &enquiry.lead {
            LeadDetails::B2c { category, .. } => FieldValue::Text(category.clone()),
            LeadDetails::B2b { .. } => FieldValue::Absent,
        },
        other => enquiry
            .attributes
            .get(other)
            .map(FieldValue::from_json)
            .unwrap_or(FieldValue::Absent),
    }
}

/// Evaluate a single condition
pub fn evaluate_condition(condition: &Condition, enquiry: &Enquiry) -> bool {
    let field = resolve_field(enquiry, &condition.field);
    let expected = &condition.value;

    match condition.operator {
        Operator::Equals => equals(&field, expected),
        Operator::NotEquals => !equals(&field, expected),
        Operator::Contains => contains(&field, expected).unwrap_or(false),
        Operator::NotContains => contains(&field, expected).map(|hit| !hit).unwrap_or(true),
        Operator::GreaterThan => compare(&field, expected).map(|o| o.is_gt()).unwrap_or(false),
        Operator::LessThan => compare(&field, expected).map(|o| o.is_lt()).unwrap_or(false),
        Operator::In => membership(&field, expected).unwrap_or(false),
        Operator::NotIn => match expected {
            Value::Array(_) => membership(&field, expected).map(|hit| !hit).unwrap_or(true),
            _ => false,
        },
        Operator::Unsupported => false,
    }
}

/// Logical AND over all conditions; an empty list always matches
pub fn evaluate_conditions(conditions: &[Condition], enquiry: &Enquiry) -> bool {
    conditions.iter().all(|condition| evaluate_condition(condition, enquiry))
}

fn equals(field: &FieldValue, expected: &Value) -> bool {
    match field {
        FieldValue::Absent => false,
        FieldValue::List(items) => match expected {
            Value::Array(values) => {
                let wanted: Vec<String> = values.iter().filter_map(json_scalar_text).collect();
                items.len() == wanted.len()
                    && items.iter().zip(wanted.iter()).all(|(a, b)| text_eq(a, b))
            }
            _ => false,
        },
        scalar => scalar_equals(scalar, expected),
    }
}

fn scalar_equals(field: &FieldValue, expected: &Value) -> bool {
    if let (Some(actual), Some(wanted)) = (field.as_number(), json_number(expected)) {
        return actual == wanted;
    }
    match (field.as_text(), json_scalar_text(expected)) {
        (Some(actual), Some(wanted)) => text_eq(&actual, &wanted),
        _ => false,
    }
}

/// `None` when the field cannot be tested for containment
fn contains(field: &FieldValue, expected: &Value) -> Option<bool> {
    let needle = json_scalar_text(expected)?;
    match field {
        FieldValue::Text(haystack) => Some(haystack.to_lowercase().contains(&needle.to_lowercase())),
        FieldValue::List(items) => Some(items.iter().any(|item| text_eq(item, &needle))),
        FieldValue::Number(_) | FieldValue::Absent => None,
    }
}

fn compare(field: &FieldValue, expected: &Value) -> Option<std::cmp::Ordering> {
    let actual = field.as_number()?;
    let wanted = json_number(expected)?;
    actual.partial_cmp(&wanted)
}

/// `None` when the field is absent or the value is not a list
fn membership(field: &FieldValue, expected: &Value) -> Option<bool> {
    let Value::Array(values) = expected else {
        return None;
    };
    match field {
        FieldValue::Absent => None,
        FieldValue::List(items) => Some(
            items
                .iter()
                .any(|item| values.iter().any(|v| scalar_equals(&FieldValue::Text(item.clone()), v))),
        ),
        scalar => Some(values.iter().any(|v| scalar_equals(scalar, v))),
    }
}

fn json_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => parse_finite(s),
        _ => None,
    }
}

/// "nan" and "inf" parse as floats but are words here
fn parse_finite(s: &str) -> Option<f64> {
    s.trim().parse::<f64>().ok().filter(|n| n.is_finite())
}

fn json_scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => n.as_f64().map(format_number),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

fn text_eq(a: &str, b: &str) -> bool {
    a.trim().eq_ignore_ascii_case(b.trim())
}
