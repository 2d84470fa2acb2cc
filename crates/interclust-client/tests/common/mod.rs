#![allow(dead_code)]

use interclust_client::{ClientConfig, DispatchOutcome, RecordingTransport, Session, SessionId};
use interclust_protocol::topics;
use serde_json::{json, Value};

pub const SESSION: &str = "session-under-test";

pub fn session() -> (Session, RecordingTransport) {
    session_with(&ClientConfig::default())
}

pub fn session_with(config: &ClientConfig) -> (Session, RecordingTransport) {
    let recorder = RecordingTransport::new();
    let session = Session::with_id(SessionId::from(SESSION), config, Box::new(recorder.clone()));
    (session, recorder)
}

/// Node-info payload over attributes `a`..`d`, splitting on `b`.
pub fn node_info(node_id: &str, instances: u64) -> Value {
    json!({
        "instance_id": SESSION,
        "node_id": node_id,
        "num_instances": instances,
        "relative_num_instances": 0.5,
        "important_features_within_clust": ["a"],
        "important_within_thresholds": [["1", "2"]],
        "important_features_between_cluster": ["b"],
        "important_between_thresholds": [["0", "5"]],
        "quality_indicator": 0.61,
        "attributes": ["a", "b", "c", "d"],
        "sorted_feature_importance_indice": [1, 0, 2, 3],
        "stat_summary": [
            {"a": 10.0, "b": 10.0, "c": 10.0, "d": 10.0},
            {"a": 1.5, "b": 2.5, "c": 0.1, "d": 7.0}
        ],
        "quality_indicator_list": [["silhouette", 0.61, "[-1, 1]"]],
    })
}

pub fn deliver(session: &mut Session, name: &str, payload: &Value) -> DispatchOutcome {
    session.handle_inbound(&topics::frontend(name), payload.to_string().as_bytes())
}

/// Populates `node_id` with [`node_info`].
pub fn populate(session: &mut Session, node_id: &str, instances: u64) {
    let outcome = deliver(session, "nodeInfoUpdateFrontend", &node_info(node_id, instances));
    assert_eq!(outcome, DispatchOutcome::Applied, "node info for {node_id}");
}

pub fn coordinates(version: &str) -> Value {
    json!({
        "instance_id": SESSION,
        "version": version,
        "vis_type": "coordinates",
        "panel_id": 0,
        "attributes": ["a", "b", "class", "cluster"],
        "data": [[1.0, 2.0, "x", 0], [3.0, 4.0, "y", 1]],
    })
}
