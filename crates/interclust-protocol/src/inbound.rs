//! Messages published by the clustering engine.

use std::collections::BTreeMap;

use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use smol_str::SmolStr;

use crate::error::ProtocolError;
use crate::legacy::LegacyMessage;
use crate::payload::{self, ThresholdRange};
use crate::topics;

/// Column carrying the engine's unique row id in data tables.
pub const ROW_ID_COLUMN: &str = "un_row_id_random12345613";
/// Column carrying a row's current cluster in data tables.
pub const ASSIGNMENT_COLUMN: &str = "cluster_assignment";

/// Per-attribute summary statistics row (`count`, `mean`, ... in order).
pub type StatRow = BTreeMap<String, Option<f64>>;
/// One raw data table row, column order preserved.
pub type TableRow = IndexMap<String, Value>;

/// Who an inbound payload is addressed to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Addressing {
    /// Tagged with this client's session id.
    Local,
    /// Tagged with a different session id.
    Foreign(SmolStr),
    /// No session tag (legacy broadcast format).
    Unaddressed,
}

impl Addressing {
    /// Classifies a payload against the local session id.
    #[must_use]
    pub fn of(payload: &Value, session_id: &str) -> Self {
        match payload.get("instance_id") {
            Some(Value::String(id)) if id == session_id => Self::Local,
            Some(Value::String(id)) => Self::Foreign(id.as_str().into()),
            Some(other) if !other.is_null() => Self::Foreign(other.to_string().into()),
            _ => Self::Unaddressed,
        }
    }
}

/// Result of classifying one inbound message.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// Addressed to this session.
    Session(SessionMessage),
    /// Legacy broadcast every client may act on.
    Legacy(LegacyMessage),
    /// Nothing to do: other session's traffic or an unknown topic.
    Ignored {
        name: SmolStr,
        addressing: Addressing,
    },
}

/// Decodes an inbound message received on `topic`.
///
/// Payloads tagged with `session_id` decode into [`SessionMessage`]; anything
/// else is offered to the legacy broadcast decoder.
pub fn decode(topic: &str, payload: &[u8], session_id: &str) -> Result<Inbound, ProtocolError> {
    let name = topics::frontend_name(topic).ok_or_else(|| ProtocolError::ForeignTopic(topic.into()))?;
    let value: Value = serde_json::from_slice(payload).map_err(|err| ProtocolError::InvalidJson {
        topic: name.into(),
        detail: err.to_string().into(),
    })?;
    let addressing = Addressing::of(&value, session_id);
    let decoded = match addressing {
        Addressing::Local => SessionMessage::decode(name, value)?.map(Inbound::Session),
        Addressing::Foreign(_) | Addressing::Unaddressed => {
            LegacyMessage::decode(name, &value)?.map(Inbound::Legacy)
        }
    };
    Ok(decoded.unwrap_or_else(|| Inbound::Ignored {
        name: name.into(),
        addressing,
    }))
}

/// Session-scoped engine messages, one variant per topic.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionMessage {
    /// `nodeInfoUpdateFrontend`
    NodeInfo(NodeInfo),
    /// `graph_data`
    GraphData(GraphData),
    /// `get_data_table`
    DataTable(DataTable),
    /// `request_active_query`
    ActiveQuery(ActiveQuery),
    /// `get_clust_result`
    ClusteringResult(ClusteringResult),
}

impl SessionMessage {
    fn decode(name: &str, value: Value) -> Result<Option<Self>, ProtocolError> {
        let message = match name {
            "nodeInfoUpdateFrontend" => Self::NodeInfo(typed(name, value)?),
            "graph_data" => Self::GraphData(GraphData::from_raw(name, typed(name, value)?)?),
            "get_data_table" => Self::DataTable(typed(name, value)?),
            "request_active_query" => Self::ActiveQuery(typed(name, value)?),
            "get_clust_result" => Self::ClusteringResult(typed(name, value)?),
            _ => return Ok(None),
        };
        Ok(Some(message))
    }

    /// Bare topic name the message arrived on.
    #[must_use]
    pub fn topic_name(&self) -> &'static str {
        match self {
            Self::NodeInfo(_) => "nodeInfoUpdateFrontend",
            Self::GraphData(_) => "graph_data",
            Self::DataTable(_) => "get_data_table",
            Self::ActiveQuery(_) => "request_active_query",
            Self::ClusteringResult(_) => "get_clust_result",
        }
    }
}

fn typed<T: DeserializeOwned>(name: &str, value: Value) -> Result<T, ProtocolError> {
    serde_json::from_value(value).map_err(|err| ProtocolError::malformed(name, err))
}

/// Quality indicator entry `[name, value, description]`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(from = "(String, Value, String)")]
pub struct QualityIndicator {
    pub name: String,
    pub value: Option<f64>,
    pub description: String,
}

impl From<(String, Value, String)> for QualityIndicator {
    fn from((name, value, description): (String, Value, String)) -> Self {
        Self {
            name,
            value: value.as_f64(),
            description,
        }
    }
}

/// Analytic state of one node as computed by the engine.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NodeInfo {
    pub node_id: SmolStr,
    pub num_instances: u64,
    /// Share of the parent's instances; absent for the root.
    #[serde(default, deserialize_with = "payload::number")]
    pub relative_num_instances: Option<f64>,
    /// Attributes characterizing the node's own content.
    #[serde(default)]
    pub important_features_within_clust: Vec<String>,
    #[serde(default, deserialize_with = "payload::ranges")]
    pub important_within_thresholds: Vec<ThresholdRange>,
    /// Attributes separating the node's children.
    #[serde(default)]
    pub important_features_between_cluster: Vec<String>,
    #[serde(default, deserialize_with = "payload::ranges")]
    pub important_between_thresholds: Vec<ThresholdRange>,
    /// Silhouette score of the node's split; absent for leaves.
    #[serde(default, deserialize_with = "payload::number")]
    pub quality_indicator: Option<f64>,
    pub attributes: Vec<String>,
    #[serde(default, deserialize_with = "payload::indices")]
    pub sorted_feature_importance_indice: Vec<usize>,
    #[serde(default, deserialize_with = "payload::embedded")]
    pub stat_summary: Vec<StatRow>,
    #[serde(default)]
    pub quality_indicator_list: Vec<QualityIndicator>,
}

/// Plot data carried by graph messages.
#[derive(Debug, Clone, PartialEq)]
pub enum PlotPayload {
    /// Row-level data for a parallel-coordinates plot. The last attribute is
    /// the cluster label.
    Coordinates {
        rows: Vec<Vec<Value>>,
        attributes: Vec<String>,
    },
    /// One attribute's values in a cluster against a reference distribution.
    Histogram {
        attribute: String,
        cluster_values: Vec<f64>,
        reference_values: Vec<f64>,
        range: (f64, f64),
    },
}

/// Graph data for one panel, tagged with the selection version it was
/// computed for.
#[derive(Debug, Clone, PartialEq)]
pub struct GraphData {
    pub version: SmolStr,
    pub vis_type: SmolStr,
    pub panel_id: Option<usize>,
    pub plot: PlotPayload,
}

#[derive(Debug, Deserialize)]
struct RawGraphData {
    version: SmolStr,
    vis_type: SmolStr,
    #[serde(default)]
    panel_id: Option<usize>,
    #[serde(default)]
    data: Option<Vec<Vec<Value>>>,
    #[serde(default)]
    attributes: Option<Vec<String>>,
    #[serde(default)]
    clu_val: Option<Vec<f64>>,
    #[serde(default)]
    cla_val: Option<Vec<f64>>,
    #[serde(default)]
    att_range: Option<(f64, f64)>,
    #[serde(default)]
    attribute: Option<String>,
}

impl GraphData {
    fn from_raw(name: &str, raw: RawGraphData) -> Result<Self, ProtocolError> {
        let missing = |field: &str| ProtocolError::malformed(name, format!("missing field `{field}`"));
        let plot = if raw.vis_type == "coordinates" {
            PlotPayload::Coordinates {
                rows: raw.data.ok_or_else(|| missing("data"))?,
                attributes: raw.attributes.ok_or_else(|| missing("attributes"))?,
            }
        } else {
            PlotPayload::Histogram {
                attribute: raw.attribute.ok_or_else(|| missing("attribute"))?,
                cluster_values: raw.clu_val.ok_or_else(|| missing("clu_val"))?,
                reference_values: raw.cla_val.unwrap_or_default(),
                range: raw.att_range.ok_or_else(|| missing("att_range"))?,
            }
        };
        Ok(Self {
            version: raw.version,
            vis_type: raw.vis_type,
            panel_id: raw.panel_id,
            plot,
        })
    }
}

/// Raw rows of a node (or of all its children when it has any).
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DataTable {
    pub node_id: SmolStr,
    #[serde(rename = "table_data", deserialize_with = "payload::embedded")]
    pub rows: Vec<TableRow>,
}

/// Pairwise "same cluster?" question for the operator.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ActiveQuery {
    pub node_id: SmolStr,
    #[serde(default)]
    pub query_id: Vec<Value>,
    pub query_data: (Vec<Value>, Vec<Value>),
}

/// Final clustering result as CSV text.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ClusteringResult {
    pub data: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn decode_json(name: &str, payload: &Value) -> Result<Inbound, ProtocolError> {
        decode(
            &topics::frontend(name),
            payload.to_string().as_bytes(),
            "local",
        )
    }

    #[test]
    fn root_node_info_accepts_placeholders() {
        let payload = json!({
            "instance_id": "local",
            "node_id": "root",
            "num_instances": 150,
            "relative_num_instances": "-",
            "important_features_within_clust": [],
            "important_within_thresholds": [],
            "important_features_between_cluster": ["petal_length"],
            "important_between_thresholds": [["1.0", "6.9"]],
            "quality_indicator": "-",
            "attributes": ["sepal_length", "petal_length"],
            "sorted_feature_importance_indice": "-",
            "stat_summary": "[{\"sepal_length\":150.0,\"petal_length\":150.0},{\"sepal_length\":5.84,\"petal_length\":null}]",
            "quality_indicator_list": [["Silhouettenkoeffizient", 0.55, "[-1, 1]"]],
        });
        let Inbound::Session(SessionMessage::NodeInfo(info)) = decode_json("nodeInfoUpdateFrontend", &payload).unwrap() else {
            panic!("expected node info");
        };
        assert_eq!(info.node_id, "root");
        assert_eq!(info.relative_num_instances, None);
        assert_eq!(info.quality_indicator, None);
        assert!(info.sorted_feature_importance_indice.is_empty());
        assert_eq!(info.stat_summary.len(), 2);
        assert_eq!(info.stat_summary[1]["petal_length"], None);
        assert_eq!(info.quality_indicator_list[0].value, Some(0.55));
    }

    #[test]
    fn node_info_without_attributes_is_malformed() {
        let payload = json!({ "instance_id": "local", "node_id": "n1", "num_instances": 3 });
        let err = decode_json("nodeInfoUpdateFrontend", &payload).unwrap_err();
        assert!(matches!(err, ProtocolError::Malformed { .. }));
        assert_eq!(err.topic(), "nodeInfoUpdateFrontend");
    }

    #[test]
    fn graph_data_selects_plot_kind_by_vis_type() {
        let coordinates = json!({
            "instance_id": "local",
            "version": "v1",
            "vis_type": "coordinates",
            "data": [[1.0, 2.0, "a"]],
            "attributes": ["x", "y", "class"],
        });
        let Inbound::Session(SessionMessage::GraphData(graph)) = decode_json("graph_data", &coordinates).unwrap() else {
            panic!("expected graph data");
        };
        assert_eq!(graph.panel_id, None);
        assert!(matches!(graph.plot, PlotPayload::Coordinates { .. }));

        let histogram = json!({
            "instance_id": "local",
            "version": "v1",
            "vis_type": "histogram",
            "clu_val": [1, 2, 2],
            "cla_val": [],
            "att_range": [1, 2],
            "attribute": "x",
            "panel_id": 1,
        });
        let Inbound::Session(SessionMessage::GraphData(graph)) = decode_json("graph_data", &histogram).unwrap() else {
            panic!("expected graph data");
        };
        assert_eq!(graph.panel_id, Some(1));
        assert_eq!(
            graph.plot,
            PlotPayload::Histogram {
                attribute: "x".into(),
                cluster_values: vec![1.0, 2.0, 2.0],
                reference_values: vec![],
                range: (1.0, 2.0),
            }
        );
    }

    #[test]
    fn histogram_without_range_is_malformed() {
        let payload = json!({
            "instance_id": "local",
            "version": "v1",
            "vis_type": "histogram",
            "clu_val": [1],
            "attribute": "x",
        });
        assert!(decode_json("graph_data", &payload).is_err());
    }

    #[test]
    fn data_table_rows_are_unpacked_in_column_order() {
        let payload = json!({
            "instance_id": "local",
            "node_id": "n1",
            "table_data": "[{\"un_row_id_random12345613\":7,\"b\":1,\"a\":2,\"cluster_assignment\":\"-\"}]",
        });
        let Inbound::Session(SessionMessage::DataTable(table)) = decode_json("get_data_table", &payload).unwrap() else {
            panic!("expected data table");
        };
        let columns: Vec<&str> = table.rows[0].keys().map(String::as_str).collect();
        assert_eq!(columns, [ROW_ID_COLUMN, "b", "a", ASSIGNMENT_COLUMN]);
    }

    #[test]
    fn other_session_payload_is_ignored() {
        let payload = json!({ "instance_id": "someone-else", "node_id": "n1", "table_data": "[]" });
        assert_eq!(
            decode_json("get_data_table", &payload).unwrap(),
            Inbound::Ignored {
                name: "get_data_table".into(),
                addressing: Addressing::Foreign("someone-else".into()),
            }
        );
    }

    #[test]
    fn unknown_session_topic_is_ignored() {
        let payload = json!({ "instance_id": "local" });
        assert!(matches!(
            decode_json("shiny_new_thing", &payload).unwrap(),
            Inbound::Ignored { addressing: Addressing::Local, .. }
        ));
    }

    #[test]
    fn non_json_and_foreign_topics_are_errors() {
        let err = decode("clustering_communicator/frontend/graph_data", b"{oops", "local").unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidJson { .. }));
        let err = decode("other/topic", b"{}", "local").unwrap_err();
        assert_eq!(err, ProtocolError::ForeignTopic("other/topic".into()));
    }
}
