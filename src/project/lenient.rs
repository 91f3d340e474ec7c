//! Lenient numeric decoding for stored and submitted material fields.
//!
//! Records written by older clients carry numbers as strings (`"12.34"`),
//! so every numeric field accepts either form. Anything that cannot be read
//! as a number becomes `NaN` and is neutralised later by the sanitizer.
//! Non-finite values are written back as strings (`"NaN"`, `"inf"`), which
//! read back unchanged; JSON `null` would come back as `0`.

use serde::{Deserialize, Deserializer, Serializer};
use serde_json::Value;

pub fn coerce(value: &Value) -> f64 {
    match value {
        Value::Number(n) => n.as_f64().unwrap_or(f64::NAN),
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                0.0
            } else {
                trimmed.parse::<f64>().unwrap_or(f64::NAN)
            }
        }
        Value::Bool(b) => {
            if *b {
                1.0
            } else {
                0.0
            }
        }
        Value::Null => 0.0,
        Value::Array(_) | Value::Object(_) => f64::NAN,
    }
}

pub fn number<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(coerce(&value))
}

pub fn serialize_number<S>(value: &f64, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    if value.is_finite() {
        serializer.serialize_f64(*value)
    } else {
        serializer.serialize_str(&value.to_string())
    }
}

/// `null` or an absent field means "not supplied"; anything else is coerced.
pub fn optional_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.filter(|v| !v.is_null()).map(|v| coerce(&v)))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{coerce, serialize_number};

    #[test]
    fn coerces_numbers_and_numeric_strings() {
        assert_eq!(coerce(&json!(12.5)), 12.5);
        assert_eq!(coerce(&json!("12.34")), 12.34);
        assert_eq!(coerce(&json!(" 7 ")), 7.0);
        assert_eq!(coerce(&json!("")), 0.0);
        assert_eq!(coerce(&json!(null)), 0.0);
    }

    #[test]
    fn non_finite_values_are_written_as_strings() {
        let mut out = serde_json::Serializer::new(Vec::new());
        serialize_number(&f64::NAN, &mut out).unwrap();
        assert_eq!(out.into_inner(), b"\"NaN\"");

        let mut out = serde_json::Serializer::new(Vec::new());
        serialize_number(&f64::NEG_INFINITY, &mut out).unwrap();
        let written: serde_json::Value = serde_json::from_slice(&out.into_inner()).unwrap();
        assert_eq!(coerce(&written), f64::NEG_INFINITY);

        let mut out = serde_json::Serializer::new(Vec::new());
        serialize_number(&12.5, &mut out).unwrap();
        assert_eq!(out.into_inner(), b"12.5");
    }

    #[test]
    fn non_numeric_input_becomes_nan() {
        assert!(coerce(&json!("lots")).is_nan());
        assert!(coerce(&json!([1, 2])).is_nan());
    }
}
