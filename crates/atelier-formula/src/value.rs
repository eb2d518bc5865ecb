use crate::coercion::{normalize, normalize_number, normalize_str};
use atelier_model::FieldValue;
use std::fmt;

/// Runtime value of the formula interpreter, and the result type of an evaluation.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Number(f64),
    Text(String),
    Boolean(bool),
    /// Empty string: a blank field, or an `IF` without an else branch.
    Empty,
}

impl Value {
    /// How a row field is seen by formulas: blanks and booleans pass through, everything else is
    /// normalized to a number.
    pub(crate) fn from_field(field: &FieldValue) -> Self {
        match field {
            FieldValue::Null => Value::Empty,
            FieldValue::Text(s) if s.is_empty() => Value::Empty,
            FieldValue::Bool(b) => Value::Boolean(*b),
            other => Value::Number(normalize(other)),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Value::Empty)
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Numeric reading for built-in function arguments: the same normalization as field reads.
    pub(crate) fn normalized(&self) -> f64 {
        match self {
            Value::Number(n) => normalize_number(*n),
            Value::Text(s) => normalize_str(s),
            Value::Boolean(b) => f64::from(u8::from(*b)),
            Value::Empty => 0.0,
        }
    }

    /// Numeric reading for operators. Text that is not a plain number becomes `NaN`, which then
    /// surfaces as an empty result rather than as a silently wrong amount.
    pub(crate) fn coerce_number(&self) -> f64 {
        match self {
            Value::Number(n) => *n,
            Value::Text(s) => parse_numeric_text(s).unwrap_or(f64::NAN),
            Value::Boolean(b) => f64::from(u8::from(*b)),
            Value::Empty => 0.0,
        }
    }

    pub(crate) fn truthy(&self) -> bool {
        match self {
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::Text(s) => !s.is_empty(),
            Value::Boolean(b) => *b,
            Value::Empty => false,
        }
    }

    /// Final shaping of an evaluation result: finite numbers stay, numeric-looking text and
    /// booleans become numbers, other text is kept verbatim, anything else is empty.
    pub(crate) fn finish(self) -> Value {
        match self {
            Value::Number(n) if n.is_finite() => Value::Number(n),
            Value::Number(_) => Value::Empty,
            Value::Boolean(b) => Value::Number(f64::from(u8::from(b))),
            Value::Text(s) => match parse_numeric_text(&s) {
                Some(n) => Value::Number(n),
                None => Value::Text(s),
            },
            Value::Empty => Value::Empty,
        }
    }

    /// Convert into the row representation. Empty results are written as an empty string.
    pub fn into_field_value(self) -> FieldValue {
        match self {
            Value::Number(n) => FieldValue::Number(n),
            Value::Text(s) => FieldValue::Text(s),
            Value::Boolean(b) => FieldValue::Bool(b),
            Value::Empty => FieldValue::Text(String::new()),
        }
    }
}

/// Strict numeric text: optional surrounding whitespace, a finite decimal literal. Empty text is
/// not numeric.
fn parse_numeric_text(s: &str) -> Option<f64> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return None;
    }
    let first = trimmed.chars().next()?;
    if !(first.is_ascii_digit() || matches!(first, '-' | '+' | '.')) {
        // Rejects `inf` / `NaN` spellings `f64::from_str` would accept.
        return None;
    }
    trimmed.parse::<f64>().ok().filter(|n| n.is_finite())
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Number(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Boolean(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(n) => write!(f, "{n}"),
            Value::Text(s) => f.write_str(s),
            Value::Boolean(b) => write!(f, "{b}"),
            Value::Empty => Ok(()),
        }
    }
}
