use std::fmt::{self, Display};

use serde::Serialize;
use serde_json::{Map, Value};

/// Differences beyond this count are not collected.
pub const MAX_DIFFERENCES: usize = 50;

const PREVIEW_CHARS: usize = 120;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DifferenceKind {
    ValueMismatch,
    TypeMismatch,
    MissingKey,
    UnexpectedKey,
    LengthMismatch,
}

impl DifferenceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DifferenceKind::ValueMismatch => "value_mismatch",
            DifferenceKind::TypeMismatch => "type_mismatch",
            DifferenceKind::MissingKey => "missing_key",
            DifferenceKind::UnexpectedKey => "unexpected_key",
            DifferenceKind::LengthMismatch => "length_mismatch",
        }
    }
}

/// One location where the actual document departs from the expected one.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Difference {
    /// JSONPath-style location, e.g. `$.items[2].name`.
    pub path: String,
    pub kind: DifferenceKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actual: Option<Value>,
}

impl Display for Difference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let expected = self.expected.as_ref().map(preview).unwrap_or_default();
        let actual = self.actual.as_ref().map(preview).unwrap_or_default();
        match self.kind {
            DifferenceKind::ValueMismatch => write!(f, "{}: expected {expected}, got {actual}", self.path),
            DifferenceKind::TypeMismatch => write!(
                f,
                "{}: expected {} {expected}, got {} {actual}",
                self.path,
                self.expected.as_ref().map(type_name).unwrap_or("nothing"),
                self.actual.as_ref().map(type_name).unwrap_or("nothing"),
            ),
            DifferenceKind::MissingKey => {
                write!(f, "{}: missing from actual response (expected {expected})", self.path)
            }
            DifferenceKind::UnexpectedKey => {
                write!(f, "{}: not present in expected response (got {actual})", self.path)
            }
            DifferenceKind::LengthMismatch => {
                write!(f, "{}: expected {expected} elements, got {actual}", self.path)
            }
        }
    }
}

/// Result of a structural comparison.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Comparison {
    differences: Vec<Difference>,
}

impl Comparison {
    pub fn is_match(&self) -> bool {
        self.differences.is_empty()
    }

    pub fn differences(&self) -> &[Difference] {
        &self.differences
    }

    pub fn first(&self) -> Option<&Difference> {
        self.differences.first()
    }

    /// True when collection stopped at [`MAX_DIFFERENCES`].
    pub fn is_truncated(&self) -> bool {
        self.differences.len() >= MAX_DIFFERENCES
    }

    pub fn into_differences(self) -> Vec<Difference> {
        self.differences
    }
}

/// Exact structural comparison of two JSON documents.
///
/// Object key order is irrelevant, array order is significant, and scalars
/// must agree in both type and value (`1` is neither `"1"` nor `1.0`).
/// A key holding `null` is not the same as an absent key.
pub fn compare(actual: &Value, expected: &Value) -> Comparison {
    let mut differences = Vec::new();
    walk(expected, actual, "$", &mut differences);
    Comparison { differences }
}

/// Returns false once the difference limit is reached.
fn walk(expected: &Value, actual: &Value, path: &str, out: &mut Vec<Difference>) -> bool {
    match (expected, actual) {
        (Value::Object(expected), Value::Object(actual)) => walk_object(expected, actual, path, out),
        (Value::Array(expected_items), Value::Array(actual_items)) => {
            if expected_items.len() != actual_items.len()
                && !record(
                    out,
                    path.to_string(),
                    DifferenceKind::LengthMismatch,
                    Some(Value::from(expected_items.len())),
                    Some(Value::from(actual_items.len())),
                )
            {
                return false;
            }
            for (index, (expected, actual)) in expected_items.iter().zip(actual_items).enumerate() {
                if !walk(expected, actual, &format!("{path}[{index}]"), out) {
                    return false;
                }
            }
            true
        }
        _ if expected == actual => true,
        _ => {
            let kind = if type_name(expected) == type_name(actual) {
                DifferenceKind::ValueMismatch
            } else {
                DifferenceKind::TypeMismatch
            };
            record(out, path.to_string(), kind, Some(expected.clone()), Some(actual.clone()))
        }
    }
}

fn walk_object(
    expected: &Map<String, Value>,
    actual: &Map<String, Value>,
    path: &str,
    out: &mut Vec<Difference>,
) -> bool {
    for (key, expected_value) in expected {
        let child = child_path(path, key);
        let keep_going = match actual.get(key) {
            Some(actual_value) => walk(expected_value, actual_value, &child, out),
            None => record(out, child, DifferenceKind::MissingKey, Some(expected_value.clone()), None),
        };
        if !keep_going {
            return false;
        }
    }

    for (key, actual_value) in actual {
        if expected.contains_key(key) {
            continue;
        }
        let child = child_path(path, key);
        if !record(out, child, DifferenceKind::UnexpectedKey, None, Some(actual_value.clone())) {
            return false;
        }
    }

    true
}

fn record(
    out: &mut Vec<Difference>,
    path: String,
    kind: DifferenceKind,
    expected: Option<Value>,
    actual: Option<Value>,
) -> bool {
    out.push(Difference {
        path,
        kind,
        expected,
        actual,
    });
    out.len() < MAX_DIFFERENCES
}

fn child_path(parent: &str, key: &str) -> String {
    let mut chars = key.chars();
    let plain = chars
        .next()
        .is_some_and(|first| first.is_ascii_alphabetic() || first == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');

    if plain {
        format!("{parent}.{key}")
    } else {
        let escaped = key.replace('\\', "\\\\").replace('\'', "\\'");
        format!("{parent}['{escaped}']")
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn preview(value: &Value) -> String {
    let rendered = value.to_string();
    if rendered.chars().count() <= PREVIEW_CHARS {
        return rendered;
    }
    let cut: String = rendered.chars().take(PREVIEW_CHARS).collect();
    format!("{cut}...")
}
