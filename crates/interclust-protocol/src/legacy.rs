//! Positional broadcast messages of the dataset-level analysis pipeline.
//!
//! These predate per-session addressing: payloads are flat JSON lists whose
//! last element names the target panel.

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::ProtocolError;
use crate::inbound::PlotPayload;
use crate::outbound::FeatureMethod;

/// Feature-method output for one analysis panel.
#[derive(Debug, Clone, PartialEq)]
pub struct MethodResult {
    pub method: FeatureMethod,
    pub panel: usize,
    pub algorithm: String,
    /// Majority label per cluster; `-1` marks the noise cluster.
    pub labels: Vec<Value>,
    pub instances: Vec<u64>,
    /// Relevant feature names. Per cluster for method 1, one shared list
    /// for the other methods.
    pub features: Vec<Vec<String>>,
    /// `[low, high]` per cluster and feature.
    pub thresholds: Vec<Vec<(f64, f64)>>,
    pub additional_features: Vec<String>,
    pub additional_thresholds: Vec<Vec<(f64, f64)>>,
}

/// Broadcast messages every client may act on.
#[derive(Debug, Clone, PartialEq)]
pub enum LegacyMessage {
    /// `method1`, `method2`, `method3`, `modified_method3`
    MethodResult(MethodResult),
    /// `attributes`: column names of the configured dataset and the reason
    /// they were requested.
    Attributes {
        attributes: Vec<String>,
        reason: String,
    },
    /// Positional `graph_data` for a panel.
    GraphData { panel: usize, plot: PlotPayload },
    /// `testMessage`
    Test,
}

impl LegacyMessage {
    /// Decodes a broadcast payload. Non-list payloads and unknown topics
    /// yield `Ok(None)`.
    pub fn decode(name: &str, value: &Value) -> Result<Option<Self>, ProtocolError> {
        if name == "testMessage" {
            return Ok(Some(Self::Test));
        }
        let Some(items) = value.as_array() else {
            return Ok(None);
        };
        let message = match name {
            "method1" | "method2" | "method3" | "modified_method3" => {
                let Some(method) = FeatureMethod::parse(name) else {
                    return Ok(None);
                };
                Self::MethodResult(method_result(name, method, items)?)
            }
            "attributes" => Self::Attributes {
                attributes: field(name, items, 0)?,
                reason: items
                    .get(1)
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
            },
            "graph_data" => match graph_data(name, items)? {
                Some(message) => message,
                None => return Ok(None),
            },
            _ => return Ok(None),
        };
        Ok(Some(message))
    }
}

fn field<T: DeserializeOwned>(name: &str, items: &[Value], index: usize) -> Result<T, ProtocolError> {
    let value = items
        .get(index)
        .ok_or_else(|| ProtocolError::malformed(name, format!("missing element {index}")))?;
    serde_json::from_value(value.clone())
        .map_err(|err| ProtocolError::malformed(name, format!("element {index}: {err}")))
}

fn panel_id(name: &str, items: &[Value]) -> Result<usize, ProtocolError> {
    items
        .last()
        .and_then(Value::as_u64)
        .and_then(|id| usize::try_from(id).ok())
        .ok_or_else(|| ProtocolError::malformed(name, "last element must be a panel id"))
}

fn method_result(
    name: &str,
    method: FeatureMethod,
    items: &[Value],
) -> Result<MethodResult, ProtocolError> {
    let expected = match method {
        FeatureMethod::Method1 => 5,
        FeatureMethod::Method2 | FeatureMethod::Method3 => 6,
        FeatureMethod::ModifiedMethod3 => 8,
    };
    if items.len() != expected {
        return Err(ProtocolError::malformed(
            name,
            format!("expected {expected} elements, found {}", items.len()),
        ));
    }
    let algorithm = match &items[0] {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    };
    let (thresholds, additional_features, additional_thresholds) = match method {
        FeatureMethod::Method1 => (Vec::new(), Vec::new(), Vec::new()),
        FeatureMethod::Method2 | FeatureMethod::Method3 => {
            (field(name, items, 4)?, Vec::new(), Vec::new())
        }
        FeatureMethod::ModifiedMethod3 => (
            field(name, items, 4)?,
            field(name, items, 5)?,
            field(name, items, 6)?,
        ),
    };
    Ok(MethodResult {
        method,
        panel: panel_id(name, items)?,
        algorithm,
        labels: field(name, items, 1)?,
        instances: field(name, items, 2)?,
        features: field(name, items, 3)?,
        thresholds,
        additional_features,
        additional_thresholds,
    })
}

fn graph_data(name: &str, items: &[Value]) -> Result<Option<LegacyMessage>, ProtocolError> {
    // `[[], [], 0]` is sent when the engine has nothing to plot.
    let Some(kind) = items.get(2).and_then(Value::as_str) else {
        return Ok(None);
    };
    let panel = panel_id(name, items)?;
    let plot = if kind == "coordinates" {
        PlotPayload::Coordinates {
            rows: field(name, items, 0)?,
            attributes: field(name, items, 1)?,
        }
    } else {
        PlotPayload::Histogram {
            cluster_values: field(name, items, 0)?,
            reference_values: field(name, items, 1)?,
            attribute: field(name, items, 3)?,
            range: field(name, items, 4)?,
        }
    };
    Ok(Some(LegacyMessage::GraphData { panel, plot }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn method_result_takes_panel_from_last_element() {
        let payload = json!([
            "dbscan",
            [-1, 0, 1],
            [4, 60, 86],
            [["a", "b"]],
            [[[0.1, 0.2], [1.0, 2.0]], [[0.3, 0.4], [2.0, 3.0]], [[0.5, 0.6], [3.0, 4.0]]],
            2
        ]);
        let Some(LegacyMessage::MethodResult(result)) = LegacyMessage::decode("method2", &payload).unwrap() else {
            panic!("expected method result");
        };
        assert_eq!(result.panel, 2);
        assert_eq!(result.method, FeatureMethod::Method2);
        assert_eq!(result.instances, vec![4, 60, 86]);
        assert_eq!(result.thresholds[1][0], (0.3, 0.4));
    }

    #[test]
    fn method_result_with_wrong_arity_is_malformed() {
        let payload = json!(["pckmeans", [0], [3], 0]);
        assert!(LegacyMessage::decode("method1", &payload).is_err());
    }

    #[test]
    fn attribute_list_carries_reason() {
        let payload = json!([["sepal_length", "class"], "graph"]);
        assert_eq!(
            LegacyMessage::decode("attributes", &payload).unwrap(),
            Some(LegacyMessage::Attributes {
                attributes: vec!["sepal_length".into(), "class".into()],
                reason: "graph".into(),
            })
        );
    }

    #[test]
    fn session_objects_are_not_legacy() {
        let payload = json!({ "instance_id": "other", "version": "v" });
        assert_eq!(LegacyMessage::decode("graph_data", &payload).unwrap(), None);
    }

    #[test]
    fn empty_legacy_graph_is_skipped() {
        assert_eq!(
            LegacyMessage::decode("graph_data", &json!([[], [], 0])).unwrap(),
            None
        );
    }

    #[test]
    fn legacy_histogram_is_positional() {
        let payload = json!([[1, 2], [2, 3], "histogram", "x", [1, 3], 1]);
        assert_eq!(
            LegacyMessage::decode("graph_data", &payload).unwrap(),
            Some(LegacyMessage::GraphData {
                panel: 1,
                plot: PlotPayload::Histogram {
                    attribute: "x".into(),
                    cluster_values: vec![1.0, 2.0],
                    reference_values: vec![2.0, 3.0],
                    range: (1.0, 3.0),
                },
            })
        );
    }
}
