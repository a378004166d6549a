//! Text form of leaf values for the untyped formats (INI and XML).
//!
//! Leaves are written as bare text when reading that text back infers the
//! same value, and as a JSON literal otherwise.

use serde_json::{Number, Value};

/// Infers a leaf value from its text form.
pub(super) fn infer(text: &str) -> Value {
    match text {
        "true" => return Value::Bool(true),
        "false" => return Value::Bool(false),
        "null" => return Value::Null,
        _ => {}
    }

    if let Ok(int) = text.parse::<i64>() {
        return Value::from(int);
    }

    if looks_numeric(text) {
        let number = text
            .parse::<f64>()
            .ok()
            .filter(|f| f.is_finite())
            .and_then(Number::from_f64);
        if let Some(number) = number {
            return Value::Number(number);
        }
    }

    if text.starts_with('[') || text.starts_with('"') {
        if let Ok(value @ (Value::Array(_) | Value::String(_))) = serde_json::from_str(text) {
            return value;
        }
    }

    Value::String(text.to_string())
}

/// Renders a leaf value so that [`infer`] maps it back to the same value.
///
/// Mappings are not leaves and render as their JSON text.
pub(super) fn render(value: &Value) -> String {
    match value {
        Value::String(s) if round_trips(s) => s.clone(),
        Value::String(s) => Value::String(s.clone()).to_string(),
        Value::Null => "null".to_string(),
        other => other.to_string(),
    }
}

fn round_trips(s: &str) -> bool {
    s.trim() == s && matches!(infer(s), Value::String(ref inferred) if inferred == s)
}

// Rust's float parser also accepts "inf", "NaN" and friends, which are kept
// as strings here.
fn looks_numeric(text: &str) -> bool {
    let digits = text.strip_prefix(['-', '+']).unwrap_or(text);
    digits.starts_with(|c: char| c.is_ascii_digit() || c == '.')
        && digits
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, '.' | 'e' | 'E' | '-' | '+'))
}
