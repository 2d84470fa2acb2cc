//! Session context and inbound dispatch.
//!
//! A [`Session`] owns everything one operator works with: the outbox, the
//! tree, the detailed view, the analysis panels and the analysis form.
//! Exactly one thread owns it; transports feed it through
//! [`Session::handle_inbound`].

use std::path::{Path, PathBuf};

use interclust_protocol::{
    decode, DiagramKind, FeatureMethod, Inbound, LegacyMessage, ProtocolError, SessionMessage,
};
use smol_str::SmolStr;
use tracing::{debug, info, warn};

use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::form::AnalysisForm;
use crate::ids::{NodeId, Rgb, SessionId};
use crate::panel::{GraphOutcome, PanelId, PanelRegistry};
use crate::transport::{Outbox, Transport};
use crate::tree::{parse_restrictions, ClusterCountChange, LayoutConfig, Tree, TreeEvent};
use crate::view::DetailedView;

/// File the clustering result is written to inside the download directory.
pub const RESULT_FILE: &str = "clust_result.csv";

/// What happened to one inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    Applied,
    /// Superseded by a newer version or selection.
    Stale,
    /// Refers to a node or panel that does not exist.
    Dropped,
    /// Not for this session, or an unknown topic.
    Ignored,
    /// Payload failed to decode.
    Rejected(SmolStr),
}

#[derive(Debug)]
pub struct Session {
    outbox: Outbox,
    tree: Tree,
    view: DetailedView,
    panels: PanelRegistry,
    analysis: AnalysisForm,
    layout: LayoutConfig,
    download_dir: PathBuf,
}

impl Session {
    /// Session with a fresh random id.
    pub fn new(config: &ClientConfig, transport: Box<dyn Transport>) -> Self {
        Self::with_id(SessionId::generate(), config, transport)
    }

    /// Creates the session and registers its root with the engine.
    pub fn with_id(id: SessionId, config: &ClientConfig, transport: Box<dyn Transport>) -> Self {
        let mut outbox = Outbox::new(id, transport);
        let tree = Tree::new(config.layout, &mut outbox);
        info!(session = %outbox.session_id(), "session started");
        Self {
            outbox,
            tree,
            view: DetailedView::new(config.view.recommend_limit),
            panels: PanelRegistry::with_count(config.view.panels),
            analysis: AnalysisForm::new(&config.dataset, config.view.panels),
            layout: config.layout,
            download_dir: config.view.download_dir.clone(),
        }
    }

    #[must_use]
    pub fn id(&self) -> &SessionId {
        self.outbox.session_id()
    }

    #[must_use]
    pub fn tree(&self) -> &Tree {
        &self.tree
    }

    #[must_use]
    pub fn view(&self) -> &DetailedView {
        &self.view
    }

    #[must_use]
    pub fn panels(&self) -> &PanelRegistry {
        &self.panels
    }

    #[must_use]
    pub fn analysis(&self) -> &AnalysisForm {
        &self.analysis
    }

    #[must_use]
    pub fn outbox(&self) -> &Outbox {
        &self.outbox
    }

    /// Replaces the tree with a fresh one holding only the root.
    pub fn set_tree(&mut self) {
        self.tree = Tree::new(self.layout, &mut self.outbox);
        self.view.clear();
    }

    /// Adds (or resets) an analysis panel.
    pub fn register_panel(&mut self, id: usize) {
        self.panels.register(PanelId(id));
    }

    // ---- inbound ----

    /// Decodes and applies one engine message.
    pub fn handle_inbound(&mut self, topic: &str, payload: &[u8]) -> DispatchOutcome {
        let inbound = match decode(topic, payload, self.id().as_str()) {
            Ok(inbound) => inbound,
            Err(ProtocolError::ForeignTopic(topic)) => {
                debug!(topic = %topic, "ignoring message outside the frontend namespace");
                return DispatchOutcome::Ignored;
            }
            Err(err) => {
                warn!(topic = err.topic(), error = %err, "rejecting engine message");
                return DispatchOutcome::Rejected(err.to_string().into());
            }
        };
        let outcome = match inbound {
            Inbound::Session(message) => self.apply_session(message),
            Inbound::Legacy(message) => self.apply_legacy(message),
            Inbound::Ignored { name, addressing } => {
                debug!(topic = %name, ?addressing, "ignoring message");
                DispatchOutcome::Ignored
            }
        };
        self.flush();
        outcome
    }

    fn apply_session(&mut self, message: SessionMessage) -> DispatchOutcome {
        let topic = message.topic_name();
        match message {
            SessionMessage::NodeInfo(node_info) => {
                if self.tree.is_retired(&node_info.node_id) {
                    debug!(node = %node_info.node_id, "dropping info for deleted node");
                    return DispatchOutcome::Stale;
                }
                match self.tree.update_node_information(node_info) {
                    Ok(()) => DispatchOutcome::Applied,
                    Err(err) => dropped(topic, &err),
                }
            }
            SessionMessage::GraphData(data) => match self.panels.apply_graph_data(&self.tree, data) {
                Ok(GraphOutcome::Applied(_)) => DispatchOutcome::Applied,
                Ok(GraphOutcome::Stale) => DispatchOutcome::Stale,
                Err(err) => dropped(topic, &err),
            },
            SessionMessage::DataTable(table) => {
                if self.view.update_data_table(&self.tree, table) {
                    DispatchOutcome::Applied
                } else {
                    DispatchOutcome::Stale
                }
            }
            SessionMessage::ActiveQuery(query) => {
                if self.view.update_recommendations(&self.tree, &query) {
                    DispatchOutcome::Applied
                } else {
                    DispatchOutcome::Stale
                }
            }
            SessionMessage::ClusteringResult(result) => match self.write_result(&result.data) {
                Ok(path) => {
                    info!(path = %path.display(), "clustering result saved");
                    DispatchOutcome::Applied
                }
                Err(err) => {
                    warn!(error = %err, "could not save clustering result");
                    DispatchOutcome::Dropped
                }
            },
        }
    }

    fn apply_legacy(&mut self, message: LegacyMessage) -> DispatchOutcome {
        match message {
            LegacyMessage::MethodResult(result) => {
                let method = result.method;
                match self.panels.change_content(result) {
                    Ok(()) => DispatchOutcome::Applied,
                    Err(err) => dropped(method.as_str(), &err),
                }
            }
            LegacyMessage::Attributes { attributes, reason } => {
                debug!(count = attributes.len(), reason = %reason, "dataset attributes received");
                self.analysis.set_known_attributes(attributes);
                DispatchOutcome::Applied
            }
            LegacyMessage::GraphData { panel, plot } => match self.panels.apply_legacy_graph(panel, plot) {
                Ok(()) => DispatchOutcome::Applied,
                Err(err) => dropped("graph_data", &err),
            },
            LegacyMessage::Test => {
                info!("engine test message received");
                DispatchOutcome::Applied
            }
        }
    }

    fn write_result(&self, data: &str) -> Result<PathBuf, ClientError> {
        std::fs::create_dir_all(&self.download_dir)?;
        let path = self.download_dir.join(RESULT_FILE);
        std::fs::write(&path, data)?;
        Ok(path)
    }

    /// Path the next clustering result will be written to.
    #[must_use]
    pub fn result_path(&self) -> PathBuf {
        self.download_dir.join(RESULT_FILE)
    }

    /// Forwards pending tree notifications to the detailed view.
    fn flush(&mut self) {
        let mut refreshed: Vec<NodeId> = Vec::new();
        for event in self.tree.drain_events() {
            match event {
                TreeEvent::AttributesAdopted => {
                    self.view.init_attributes(&self.tree);
                    // A selection made before the first node info was skipped.
                    if let Some(node) = self.tree.selected_id().cloned() {
                        self.refresh_selection(node, &mut refreshed);
                    }
                }
                TreeEvent::SelectionRefresh { node } => self.refresh_selection(node, &mut refreshed),
                TreeEvent::SelectionCleared => self.view.clear(),
            }
        }
    }

    fn refresh_selection(&mut self, node: NodeId, refreshed: &mut Vec<NodeId>) {
        if !self.view.is_init() || refreshed.contains(&node) {
            return;
        }
        if let Err(err) = self
            .view
            .update_cluster_selection(&self.tree, &mut self.panels, &mut self.outbox)
        {
            debug!(node = %node, error = %err, "selection refresh failed");
        }
        refreshed.push(node);
    }

    // ---- operator actions ----

    fn resolve(&self, reference: &str) -> Result<NodeId, ClientError> {
        self.tree.resolve(reference)
    }

    pub fn select(&mut self, reference: &str) -> Result<NodeId, ClientError> {
        let id = self.resolve(reference)?;
        self.tree.change_selected_node(id.as_str())?;
        self.flush();
        Ok(id)
    }

    pub fn add_child(&mut self, parent: &str) -> Result<NodeId, ClientError> {
        let parent = self.resolve(parent)?;
        let id = self.tree.add_child(parent.as_str(), &mut self.outbox)?;
        self.flush();
        Ok(id)
    }

    pub fn change_cluster_count(&mut self, reference: &str, k: usize) -> Result<ClusterCountChange, ClientError> {
        let id = self.resolve(reference)?;
        let change = self.tree.change_cluster_count(id.as_str(), k, &mut self.outbox);
        self.flush();
        change
    }

    pub fn rename(&mut self, reference: &str, name: &str) -> Result<(), ClientError> {
        let id = self.resolve(reference)?;
        let result = self.tree.rename(id.as_str(), name, &mut self.outbox);
        self.flush();
        result
    }

    pub fn set_weights(&mut self, reference: &str, weights: Vec<f64>) -> Result<(), ClientError> {
        let id = self.resolve(reference)?;
        self.tree
            .set_attribute_weights(id.as_str(), weights, &mut self.outbox)
    }

    /// Parses `age > 30, city = Bonn` and applies it to the node.
    pub fn set_restrictions(&mut self, reference: &str, text: &str) -> Result<(), ClientError> {
        let id = self.resolve(reference)?;
        let restrictions = parse_restrictions(text, self.tree.attributes())?;
        let result = self
            .tree
            .set_restrictions(id.as_str(), restrictions, &mut self.outbox);
        self.flush();
        result
    }

    pub fn recluster(&mut self, reference: &str) -> Result<(), ClientError> {
        let id = self.resolve(reference)?;
        let result = self.tree.recluster(id.as_str(), &mut self.outbox);
        self.flush();
        result
    }

    pub fn delete(&mut self, reference: &str) -> Result<Vec<NodeId>, ClientError> {
        let id = self.resolve(reference)?;
        let removed = self.tree.delete_node(id.as_str(), &mut self.outbox);
        self.flush();
        removed
    }

    pub fn recolor(&mut self, reference: &str) -> Result<Rgb, ClientError> {
        let id = self.resolve(reference)?;
        self.tree.recolor(id.as_str())
    }

    pub fn drag(&mut self, reference: &str, dx: f64, dy: f64) -> Result<(), ClientError> {
        let id = self.resolve(reference)?;
        self.tree.drag(id.as_str(), dx, dy)
    }

    pub fn zoom(&mut self, zoom_in: bool) -> f64 {
        if zoom_in {
            self.tree.zoom_in()
        } else {
            self.tree.zoom_out()
        }
    }

    pub fn answer_query(&mut self, same_cluster: bool) -> Result<(), ClientError> {
        self.view.answer_query(same_cluster, &mut self.outbox)
    }

    pub fn reassign(&mut self, backend_row_id: &str, target: &str) -> Result<(), ClientError> {
        let target = self.resolve(target)?;
        self.view
            .reassign_row(&self.tree, backend_row_id, &target, &mut self.outbox)
    }

    /// Updates a panel's graph form and requests the graph.
    pub fn set_graph_form(
        &mut self,
        panel: usize,
        attribute: Option<String>,
        cluster: Option<&str>,
        kind: Option<DiagramKind>,
    ) -> Result<bool, ClientError> {
        let cluster = cluster.map(|reference| self.resolve(reference)).transpose()?;
        let id = PanelId(panel);
        self.panels.set_form(id, attribute, cluster, kind)?;
        self.panels.request_graph(id, &self.tree, &mut self.outbox)
    }

    /// Runs the configured analysis; panels go back to their loading state.
    pub fn start_analysis(&mut self) -> Result<FeatureMethod, ClientError> {
        let method = self.analysis.start(&mut self.outbox)?;
        self.panels.reset_all();
        Ok(method)
    }

    pub fn set_dataset(&mut self, path: &str) {
        self.analysis.set_dataset(path, &mut self.outbox);
    }

    pub fn analysis_mut(&mut self) -> &mut AnalysisForm {
        &mut self.analysis
    }

    /// Requests the clustering result; it is saved under [`Session::result_path`].
    pub fn download(&mut self) -> PathBuf {
        self.analysis.request_result(&mut self.outbox);
        self.result_path()
    }

    #[must_use]
    pub fn download_dir(&self) -> &Path {
        &self.download_dir
    }
}

fn dropped(topic: &str, err: &ClientError) -> DispatchOutcome {
    debug!(topic, error = %err, "dropping engine message");
    DispatchOutcome::Dropped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::RecordingTransport;
    use interclust_protocol::topics;
    use serde_json::json;

    fn session() -> (Session, RecordingTransport) {
        let recorder = RecordingTransport::new();
        let session = Session::with_id(
            SessionId::from("s-1"),
            &ClientConfig::default(),
            Box::new(recorder.clone()),
        );
        (session, recorder)
    }

    fn send(session: &mut Session, name: &str, payload: serde_json::Value) -> DispatchOutcome {
        session.handle_inbound(&topics::frontend(name), payload.to_string().as_bytes())
    }

    #[test]
    fn foreign_topic_and_session_are_ignored() {
        let (mut session, _) = session();
        assert_eq!(
            session.handle_inbound("other/topic", b"{}"),
            DispatchOutcome::Ignored
        );
        let outcome = send(
            &mut session,
            "get_data_table",
            json!({ "instance_id": "s-2", "node_id": "root", "table_data": "[]" }),
        );
        assert_eq!(outcome, DispatchOutcome::Ignored);
    }

    #[test]
    fn malformed_payload_is_rejected() {
        let (mut session, _) = session();
        let outcome = session.handle_inbound(&topics::frontend("graph_data"), b"{not json");
        assert!(matches!(outcome, DispatchOutcome::Rejected(_)));
        let outcome = send(
            &mut session,
            "nodeInfoUpdateFrontend",
            json!({ "instance_id": "s-1", "node_id": "root" }),
        );
        assert!(matches!(outcome, DispatchOutcome::Rejected(_)));
        assert!(session.tree().root().analytics().is_none());
    }

    #[test]
    fn info_for_unknown_node_is_dropped() {
        let (mut session, _) = session();
        let outcome = send(
            &mut session,
            "nodeInfoUpdateFrontend",
            json!({ "instance_id": "s-1", "node_id": "ghost", "num_instances": 1, "attributes": [] }),
        );
        assert_eq!(outcome, DispatchOutcome::Dropped);
    }

    #[test]
    fn legacy_method_result_fills_panel() {
        let (mut session, _) = session();
        let outcome = send(
            &mut session,
            "method1",
            json!(["pckmeans", ["a", "b"], [10, 20], [["x"], ["y"]], 0]),
        );
        assert_eq!(outcome, DispatchOutcome::Applied);
        let panel = session.panels().get(PanelId(0)).unwrap();
        assert_eq!(panel.summaries().len(), 2);
        assert_eq!(panel.summaries()[1].header, "Cluster 1");
    }

    #[test]
    fn legacy_attributes_feed_the_form() {
        let (mut session, _) = session();
        send(&mut session, "attributes", json!([["a", "b"], "method3"]));
        assert_eq!(session.analysis().known_attributes(), ["a", "b"]);
    }

    #[test]
    fn clustering_result_is_written_to_download_dir() {
        let dir = std::env::temp_dir().join(format!("interclust-session-{}", std::process::id()));
        let mut config = ClientConfig::default();
        config.view.download_dir = dir.clone();
        let recorder = RecordingTransport::new();
        let mut session = Session::with_id(SessionId::from("s-1"), &config, Box::new(recorder.clone()));
        assert_eq!(session.download(), dir.join(RESULT_FILE));
        assert_eq!(recorder.count("get_clust_result"), 1);
        let outcome = send(
            &mut session,
            "get_clust_result",
            json!({ "instance_id": "s-1", "data": "id,cluster\n1,a\n" }),
        );
        assert_eq!(outcome, DispatchOutcome::Applied);
        let written = std::fs::read_to_string(dir.join(RESULT_FILE)).unwrap();
        assert_eq!(written, "id,cluster\n1,a\n");
        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn set_tree_registers_a_new_root() {
        let (mut session, recorder) = session();
        session.add_child("root").unwrap();
        session.set_tree();
        assert_eq!(session.tree().len(), 1);
        assert_eq!(recorder.count("register_root"), 2);
    }
}
