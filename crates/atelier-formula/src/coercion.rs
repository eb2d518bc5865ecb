//! Numeric normalization of user input.
//!
//! Every field a formula reads and every monetary amount the engine sums goes through
//! [`normalize`], so locale-formatted text (`"1 234,50 €"`) and stray garbage degrade to a finite
//! number instead of failing.

use atelier_model::FieldValue;

/// Convert a field value to a finite number, or `0`.
pub fn normalize(value: &FieldValue) -> f64 {
    match value {
        FieldValue::Number(n) => normalize_number(*n),
        FieldValue::Text(s) => normalize_str(s),
        FieldValue::Bool(true) => 1.0,
        FieldValue::Bool(false) | FieldValue::Null | FieldValue::List(_) => 0.0,
    }
}

pub fn normalize_number(n: f64) -> f64 {
    if n.is_finite() {
        n
    } else {
        0.0
    }
}

/// Text -> number: drop whitespace (including non-breaking spaces) and every character other
/// than digits, `.`, `,` and `-`, turn the first `,` into the decimal point, then read the longest
/// numeric prefix.
pub fn normalize_str(input: &str) -> f64 {
    let mut cleaned = String::with_capacity(input.len());
    let mut seen_comma = false;
    for ch in input.chars() {
        match ch {
            '0'..='9' | '.' | '-' => cleaned.push(ch),
            ',' if !seen_comma => {
                seen_comma = true;
                cleaned.push('.');
            }
            ',' => cleaned.push(','),
            _ => {}
        }
    }
    parse_float_prefix(&cleaned).map_or(0.0, normalize_number)
}

/// Longest prefix of the form `-?digits[.digits]`, requiring at least one digit.
fn parse_float_prefix(s: &str) -> Option<f64> {
    let bytes = s.as_bytes();
    let mut end = 0;
    if bytes.first() == Some(&b'-') {
        end = 1;
    }
    let int_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    let mut digits = end - int_start;
    if end < bytes.len() && bytes[end] == b'.' {
        let frac_start = end + 1;
        let mut frac_end = frac_start;
        while frac_end < bytes.len() && bytes[frac_end].is_ascii_digit() {
            frac_end += 1;
        }
        digits += frac_end - frac_start;
        end = frac_end;
    }
    if digits == 0 {
        return None;
    }
    s[..end].trim_end_matches('.').parse::<f64>().ok()
}

/// Canonical form used to match bare formula identifiers against row keys: lowercase, with every
/// run of non-alphanumeric characters collapsed to `_`.
pub fn normalize_key(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    let mut in_gap = false;
    for ch in key.chars().flat_map(char::to_lowercase) {
        if ch.is_ascii_alphanumeric() {
            out.push(ch);
            in_gap = false;
        } else if !in_gap {
            out.push('_');
            in_gap = true;
        }
    }
    out
}
