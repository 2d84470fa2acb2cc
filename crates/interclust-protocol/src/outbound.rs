//! Requests published to the clustering engine.

use std::fmt;

use serde::{Serialize, Serializer};
use serde_json::{json, Map, Value};
use smol_str::SmolStr;

use crate::error::ProtocolError;
use crate::topics;

/// Clustering algorithm run by the engine for the analysis panels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Algorithm {
    Pckmeans,
    Dbscan,
    Optics,
}

impl Algorithm {
    /// Parses a case-insensitive algorithm name.
    pub fn parse(text: &str) -> Option<Self> {
        match text.trim().to_ascii_lowercase().as_str() {
            "pckmeans" => Some(Self::Pckmeans),
            "dbscan" => Some(Self::Dbscan),
            "optics" => Some(Self::Optics),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pckmeans => "pckmeans",
            Self::Dbscan => "dbscan",
            Self::Optics => "optics",
        }
    }

    /// Label of the first per-panel parameter.
    #[must_use]
    pub fn primary_parameter(self) -> &'static str {
        match self {
            Self::Pckmeans => "k",
            Self::Dbscan | Self::Optics => "Min Samples",
        }
    }

    /// Whether the algorithm takes a second per-panel parameter (eps).
    #[must_use]
    pub fn takes_eps(self) -> bool {
        matches!(self, Self::Dbscan)
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Feature-finding method whose results feed the analysis panels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureMethod {
    Method1,
    Method2,
    Method3,
    ModifiedMethod3,
}

impl FeatureMethod {
    pub fn parse(text: &str) -> Option<Self> {
        match text.trim().to_ascii_lowercase().as_str() {
            "method1" => Some(Self::Method1),
            "method2" => Some(Self::Method2),
            "method3" => Some(Self::Method3),
            "modified_method3" => Some(Self::ModifiedMethod3),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Method1 => "method1",
            Self::Method2 => "method2",
            Self::Method3 => "method3",
            Self::ModifiedMethod3 => "modified_method3",
        }
    }

    /// Heading shown above the per-cluster summaries of this method.
    #[must_use]
    pub fn header(self) -> &'static str {
        match self {
            Self::Method1 => "Relevant Features per Cluster",
            Self::Method2 => "Features differentiating Cluster",
            Self::Method3 => "Overall relevant Features",
            Self::ModifiedMethod3 => "Overall relevant Features and additional Attributes",
        }
    }
}

impl fmt::Display for FeatureMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Plot kind requested for a graph panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagramKind {
    #[default]
    Coordinates,
    Histogram,
}

impl DiagramKind {
    pub fn parse(text: &str) -> Option<Self> {
        match text.trim().to_ascii_lowercase().as_str() {
            "coordinates" | "parallel" => Some(Self::Coordinates),
            "histogram" | "hist" => Some(Self::Histogram),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Coordinates => "coordinates",
            Self::Histogram => "histogram",
        }
    }
}

/// Comparison operator of a hierarchical restriction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Comparator {
    #[serde(rename = "<")]
    Less,
    #[serde(rename = ">")]
    Greater,
    #[serde(rename = "=")]
    Equal,
}

impl Comparator {
    pub fn parse(text: &str) -> Option<Self> {
        match text.trim() {
            "<" => Some(Self::Less),
            ">" => Some(Self::Greater),
            "=" | "==" => Some(Self::Equal),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Less => "<",
            Self::Greater => ">",
            Self::Equal => "=",
        }
    }
}

impl fmt::Display for Comparator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Attribute constraint limiting which rows may be assigned to a node.
///
/// Encoded positionally as `[attribute, comparator, value]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Restriction {
    pub attribute: String,
    pub comparator: Comparator,
    pub value: String,
}

impl Serialize for Restriction {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        (&self.attribute, self.comparator, &self.value).serialize(serializer)
    }
}

impl fmt::Display for Restriction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.attribute, self.comparator, self.value)
    }
}

/// Body of a `get_graph` request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphRequest {
    pub version: String,
    pub attribute: String,
    pub cluster: SmolStr,
    #[serde(rename = "type")]
    pub kind: DiagramKind,
    pub selected_node_id: SmolStr,
    pub panel_id: usize,
}

/// Body of a per-method execution request, published under the method name.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MethodExecution {
    pub id: usize,
    pub dataset: String,
    pub separator: String,
    pub algorithm: Algorithm,
    pub param: Vec<f64>,
    #[serde(rename = "addAttr", skip_serializing_if = "Option::is_none")]
    pub add_attr: Option<Vec<String>>,
}

/// Every request the client publishes, one variant per backend topic.
#[derive(Debug, Clone, PartialEq)]
pub enum BackendRequest {
    RegisterRoot {
        root_id: SmolStr,
    },
    AddNode {
        node_id: SmolStr,
        node_name: String,
        parent_id: SmolStr,
        immediate_calc: bool,
    },
    RemoveNode {
        node_id: SmolStr,
    },
    ChangeName {
        node_id: SmolStr,
        new_name: String,
    },
    SetAttributeWeights {
        node_id: SmolStr,
        weights: Vec<f64>,
    },
    Recluster {
        node_id: SmolStr,
    },
    SetNodeRestrictions {
        node_id: SmolStr,
        restrictions: Vec<Restriction>,
    },
    GetDataTable {
        node_id: SmolStr,
    },
    RequestActiveQuery {
        node_id: SmolStr,
    },
    QueryAnswer {
        node_id: SmolStr,
        same_cluster: bool,
    },
    ReassignInstance {
        node_id: SmolStr,
        assigned_cluster: SmolStr,
        backend_row_id: String,
    },
    GetGraph(GraphRequest),
    ConfigureDataSource {
        data_source: String,
        separator: String,
        algorithm: Algorithm,
    },
    ClusteringResult,
    AttributeList {
        reason: String,
        dataset: String,
        separator: String,
    },
    ExecuteMethod {
        method: FeatureMethod,
        execution: MethodExecution,
    },
}

impl BackendRequest {
    /// Bare topic name, without the backend prefix.
    #[must_use]
    pub fn topic_name(&self) -> &'static str {
        match self {
            Self::RegisterRoot { .. } => "register_root",
            Self::AddNode { .. } => "add_node",
            Self::RemoveNode { .. } => "remove_node",
            Self::ChangeName { .. } => "change_name",
            Self::SetAttributeWeights { .. } => "set_attribute_weights",
            Self::Recluster { .. } => "re_cluster",
            Self::SetNodeRestrictions { .. } => "set_node_restrictions",
            Self::GetDataTable { .. } => "get_data_table",
            Self::RequestActiveQuery { .. } => "request_active_query",
            Self::QueryAnswer { .. } => "q_answer",
            Self::ReassignInstance { .. } => "reassign_instance_clust",
            Self::GetGraph(_) => "get_graph",
            Self::ConfigureDataSource { .. } => "config_datasc_algo",
            Self::ClusteringResult => "get_clust_result",
            Self::AttributeList { .. } => "attributes",
            Self::ExecuteMethod { method, .. } => method.as_str(),
        }
    }

    /// Full topic the request is published to.
    #[must_use]
    pub fn topic(&self) -> String {
        topics::backend(self.topic_name())
    }

    /// Whether the payload is tagged with the session's `instance_id`.
    ///
    /// Dataset-level requests shared by every session are not.
    #[must_use]
    pub fn is_session_scoped(&self) -> bool {
        !matches!(self, Self::AttributeList { .. } | Self::ExecuteMethod { .. })
    }

    /// JSON body without the session tag.
    pub fn body(&self) -> Result<Value, ProtocolError> {
        let body = match self {
            Self::RegisterRoot { root_id } => json!({ "root_id": root_id }),
            Self::AddNode {
                node_id,
                node_name,
                parent_id,
                immediate_calc,
            } => json!({
                "node_id": node_id,
                "node_name": node_name,
                "parent_id": parent_id,
                "immidiate_calc": immediate_calc,
            }),
            Self::RemoveNode { node_id }
            | Self::Recluster { node_id }
            | Self::GetDataTable { node_id }
            | Self::RequestActiveQuery { node_id } => json!({ "node_id": node_id }),
            Self::ChangeName { node_id, new_name } => {
                json!({ "node_id": node_id, "new_name": new_name })
            }
            Self::SetAttributeWeights { node_id, weights } => {
                json!({ "node_id": node_id, "att_weights": weights })
            }
            Self::SetNodeRestrictions {
                node_id,
                restrictions,
            } => json!({ "node_id": node_id, "restrictions": restrictions }),
            Self::QueryAnswer {
                node_id,
                same_cluster,
            } => json!({ "node_id": node_id, "q_answer": same_cluster }),
            Self::ReassignInstance {
                node_id,
                assigned_cluster,
                backend_row_id,
            } => json!({
                "node_id": node_id,
                "assigned_cluster": assigned_cluster,
                "backend_row_id": backend_row_id,
            }),
            Self::GetGraph(request) => self.encode(request)?,
            Self::ConfigureDataSource {
                data_source,
                separator,
                algorithm,
            } => json!({
                "data_source": data_source,
                "separator": separator,
                "algorithm": algorithm,
            }),
            Self::ClusteringResult => Value::Object(Map::new()),
            Self::AttributeList {
                reason,
                dataset,
                separator,
            } => json!({ "reason": reason, "dataset": dataset, "separator": separator }),
            Self::ExecuteMethod { execution, .. } => self.encode(execution)?,
        };
        Ok(body)
    }

    /// Serialized payload, tagged with `instance_id` for session-scoped requests.
    pub fn to_payload(&self, instance_id: &str) -> Result<Vec<u8>, ProtocolError> {
        let mut body = self.body()?;
        if self.is_session_scoped() {
            if let Value::Object(map) = &mut body {
                map.insert("instance_id".into(), Value::String(instance_id.into()));
            }
        }
        serde_json::to_vec(&body).map_err(|err| self.encode_error(err))
    }

    fn encode<T: Serialize>(&self, value: &T) -> Result<Value, ProtocolError> {
        serde_json::to_value(value).map_err(|err| self.encode_error(err))
    }

    fn encode_error(&self, err: serde_json::Error) -> ProtocolError {
        ProtocolError::Encode {
            topic: self.topic_name().into(),
            detail: err.to_string().into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use expect_test::expect;

    fn payload_text(request: &BackendRequest) -> String {
        String::from_utf8(request.to_payload("session-1").unwrap()).unwrap()
    }

    #[test]
    fn add_node_keeps_engine_field_spelling() {
        let request = BackendRequest::AddNode {
            node_id: "abc".into(),
            node_name: "abc12".into(),
            parent_id: "root".into(),
            immediate_calc: true,
        };
        assert_eq!(request.topic(), "clustering_communicator/backend/add_node");
        expect![[r#"{"immidiate_calc":true,"instance_id":"session-1","node_id":"abc","node_name":"abc12","parent_id":"root"}"#]]
            .assert_eq(&payload_text(&request));
    }

    #[test]
    fn restrictions_encode_as_triples() {
        let request = BackendRequest::SetNodeRestrictions {
            node_id: "n1".into(),
            restrictions: vec![
                Restriction {
                    attribute: "age".into(),
                    comparator: Comparator::Greater,
                    value: "30".into(),
                },
                Restriction {
                    attribute: "city".into(),
                    comparator: Comparator::Equal,
                    value: "Bonn".into(),
                },
            ],
        };
        expect![[r#"{"instance_id":"session-1","node_id":"n1","restrictions":[["age",">","30"],["city","=","Bonn"]]}"#]]
            .assert_eq(&payload_text(&request));
    }

    #[test]
    fn graph_request_uses_type_key() {
        let request = BackendRequest::GetGraph(GraphRequest {
            version: "v1".into(),
            attribute: "age".into(),
            cluster: "c1".into(),
            kind: DiagramKind::Histogram,
            selected_node_id: "root".into(),
            panel_id: 0,
        });
        expect![[r#"{"attribute":"age","cluster":"c1","instance_id":"session-1","panel_id":0,"selected_node_id":"root","type":"histogram","version":"v1"}"#]]
            .assert_eq(&payload_text(&request));
    }

    #[test]
    fn method_execution_is_not_session_tagged() {
        let request = BackendRequest::ExecuteMethod {
            method: FeatureMethod::ModifiedMethod3,
            execution: MethodExecution {
                id: 1,
                dataset: "iris.csv".into(),
                separator: ",".into(),
                algorithm: Algorithm::Dbscan,
                param: vec![5.0, 0.5],
                add_attr: Some(vec!["petal_width".into()]),
            },
        };
        assert_eq!(
            request.topic(),
            "clustering_communicator/backend/modified_method3"
        );
        expect![[r#"{"addAttr":["petal_width"],"algorithm":"dbscan","dataset":"iris.csv","id":1,"param":[5.0,0.5],"separator":","}"#]]
            .assert_eq(&payload_text(&request));
    }

    #[test]
    fn result_download_carries_only_session() {
        expect![[r#"{"instance_id":"session-1"}"#]]
            .assert_eq(&payload_text(&BackendRequest::ClusteringResult));
    }

    #[test]
    fn enum_names_parse_case_insensitively() {
        assert_eq!(Algorithm::parse(" DBSCAN "), Some(Algorithm::Dbscan));
        assert_eq!(FeatureMethod::parse("Method2"), Some(FeatureMethod::Method2));
        assert_eq!(Comparator::parse("=="), Some(Comparator::Equal));
        assert_eq!(DiagramKind::parse("kmeans"), None);
    }
}
