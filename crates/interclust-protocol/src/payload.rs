//! Deserialization helpers for the engine's loosely typed fields.
//!
//! The engine uses `"-"` as a placeholder wherever a value does not apply
//! (root node, leaf node, non-numeric column) and ships some tables as JSON
//! encoded strings inside the JSON payload.

use serde::de::{DeserializeOwned, Error as _};
use serde::{Deserialize, Deserializer};
use serde_json::Value;

const PLACEHOLDER: &str = "-";

/// Numeric value range of a relevant feature, `None` for non-numeric columns.
pub type ThresholdRange = Option<(String, String)>;

fn is_placeholder(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(text) => text.trim() == PLACEHOLDER || text.trim().is_empty(),
        _ => false,
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        _ => None,
    }
}

/// Number or placeholder.
pub(crate) fn number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    if is_placeholder(&value) {
        return Ok(None);
    }
    match &value {
        Value::Number(number) => Ok(number.as_f64()),
        Value::String(text) => text
            .trim()
            .parse::<f64>()
            .map(Some)
            .map_err(|_| D::Error::custom(format!("expected a number, found '{text}'"))),
        other => Err(D::Error::custom(format!("expected a number, found {other}"))),
    }
}

/// Index list or placeholder (empty).
pub(crate) fn indices<'de, D>(deserializer: D) -> Result<Vec<usize>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    if is_placeholder(&value) {
        return Ok(Vec::new());
    }
    let Value::Array(items) = value else {
        return Err(D::Error::custom("expected an index list"));
    };
    items
        .iter()
        .map(|item| {
            item.as_u64()
                .and_then(|index| usize::try_from(index).ok())
                .ok_or_else(|| D::Error::custom(format!("invalid attribute index {item}")))
        })
        .collect()
}

/// List of `[min, max]` pairs where `["-", "-"]` marks a non-numeric column.
pub(crate) fn ranges<'de, D>(deserializer: D) -> Result<Vec<ThresholdRange>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    if is_placeholder(&value) {
        return Ok(Vec::new());
    }
    let Value::Array(items) = value else {
        return Err(D::Error::custom("expected a threshold list"));
    };
    items
        .iter()
        .map(|item| match item.as_array().map(Vec::as_slice) {
            Some([low, high]) if is_placeholder(low) || is_placeholder(high) => Ok(None),
            Some([low, high]) => match (scalar_text(low), scalar_text(high)) {
                (Some(low), Some(high)) => Ok(Some((low, high))),
                _ => Err(D::Error::custom(format!("invalid threshold pair {item}"))),
            },
            _ => Err(D::Error::custom(format!("expected a threshold pair, found {item}"))),
        })
        .collect()
}

/// Record list shipped either as a JSON encoded string or inline.
pub(crate) fn embedded<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    match value {
        Value::String(text) if text.trim().is_empty() || text.trim() == PLACEHOLDER => {
            Ok(Vec::new())
        }
        Value::String(text) => serde_json::from_str(&text).map_err(D::Error::custom),
        Value::Null => Ok(Vec::new()),
        inline @ Value::Array(_) => serde_json::from_value(inline).map_err(D::Error::custom),
        other => Err(D::Error::custom(format!("expected embedded records, found {other}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, Deserialize)]
    struct Probe {
        #[serde(default, deserialize_with = "number")]
        value: Option<f64>,
        #[serde(default, deserialize_with = "indices")]
        order: Vec<usize>,
        #[serde(default, deserialize_with = "ranges")]
        limits: Vec<ThresholdRange>,
    }

    #[test]
    fn placeholders_become_absent_values() {
        let probe: Probe = serde_json::from_value(json!({
            "value": "-",
            "order": "-",
            "limits": [["-", "-"], ["1.5", "2"], [0, 3]],
        }))
        .unwrap();
        assert_eq!(probe.value, None);
        assert!(probe.order.is_empty());
        assert_eq!(
            probe.limits,
            vec![
                None,
                Some(("1.5".to_string(), "2".to_string())),
                Some(("0".to_string(), "3".to_string())),
            ]
        );
    }

    #[test]
    fn numeric_strings_are_accepted() {
        let probe: Probe = serde_json::from_value(json!({ "value": "0.25" })).unwrap();
        assert_eq!(probe.value, Some(0.25));
    }

    #[test]
    fn wrong_shapes_are_rejected() {
        assert!(serde_json::from_value::<Probe>(json!({ "value": [1] })).is_err());
        assert!(serde_json::from_value::<Probe>(json!({ "order": [-1] })).is_err());
        assert!(serde_json::from_value::<Probe>(json!({ "limits": [[1]] })).is_err());
    }
}
