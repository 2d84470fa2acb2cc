//! Analysis panels: feature-method summaries and per-cluster graphs.
//!
//! Each panel owns a graph form (attribute, cluster, diagram kind). Graph
//! requests carry the panel id and the selection version; replies for an
//! outdated version are discarded so a panel never shows superseded data.

mod content;
mod plot;

pub use content::{summarize, ClusterSummary, PanelTopic, NOISE_LABEL};
pub use plot::{
    normalize_labels, DualHistogram, HistogramBin, ParallelCoordinates, Plot, PlotLine,
    MAX_HISTOGRAM_BINS,
};

use std::collections::BTreeMap;
use std::fmt;

use interclust_protocol::{BackendRequest, DiagramKind, GraphData, GraphRequest, MethodResult, PlotPayload};
use tracing::debug;

use crate::error::ClientError;
use crate::ids::NodeId;
use crate::transport::Outbox;
use crate::tree::Tree;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct PanelId(pub usize);

impl fmt::Display for PanelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Graph selection of one panel.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GraphForm {
    pub attribute: Option<String>,
    pub cluster: Option<NodeId>,
    pub kind: DiagramKind,
}

#[derive(Debug, Clone, Default)]
pub struct ClusterPanel {
    id: PanelId,
    topic: PanelTopic,
    content: Option<MethodResult>,
    summaries: Vec<ClusterSummary>,
    plot: Option<Plot>,
    form: GraphForm,
    /// Children of the selected node offered in the cluster dropdown.
    cluster_options: Vec<(NodeId, String)>,
}

impl ClusterPanel {
    #[must_use]
    pub fn new(id: PanelId) -> Self {
        Self {
            id,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn id(&self) -> PanelId {
        self.id
    }

    #[must_use]
    pub fn topic(&self) -> PanelTopic {
        self.topic
    }

    #[must_use]
    pub fn content(&self) -> Option<&MethodResult> {
        self.content.as_ref()
    }

    #[must_use]
    pub fn summaries(&self) -> &[ClusterSummary] {
        &self.summaries
    }

    #[must_use]
    pub fn plot(&self) -> Option<&Plot> {
        self.plot.as_ref()
    }

    #[must_use]
    pub fn form(&self) -> &GraphForm {
        &self.form
    }

    #[must_use]
    pub fn cluster_options(&self) -> &[(NodeId, String)] {
        &self.cluster_options
    }

    /// Replaces the method result shown by the panel.
    pub fn change_content(&mut self, result: MethodResult) {
        self.topic = PanelTopic::Method(result.method);
        self.summaries = summarize(&result);
        self.content = Some(result);
    }

    /// Back to the loading state after a new analysis was started.
    pub fn reset(&mut self) {
        self.topic = PanelTopic::Starting;
        self.content = None;
        self.summaries.clear();
    }

    fn show(&mut self, payload: PlotPayload) {
        self.plot = Some(Plot::from_payload(payload));
    }
}

/// Outcome of routing inbound graph data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraphOutcome {
    Applied(PanelId),
    /// Computed for a version that is no longer selected.
    Stale,
}

#[derive(Debug, Default)]
pub struct PanelRegistry {
    panels: BTreeMap<PanelId, ClusterPanel>,
}

impl PanelRegistry {
    /// Registry with panels `0..count`.
    #[must_use]
    pub fn with_count(count: usize) -> Self {
        let mut registry = Self::default();
        for id in 0..count {
            registry.register(PanelId(id));
        }
        registry
    }

    /// Adds a panel, replacing any panel registered under the same id.
    pub fn register(&mut self, id: PanelId) -> &mut ClusterPanel {
        let slot = self.panels.entry(id).or_default();
        *slot = ClusterPanel::new(id);
        slot
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.panels.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.panels.is_empty()
    }

    #[must_use]
    pub fn ids(&self) -> Vec<PanelId> {
        self.panels.keys().copied().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ClusterPanel> {
        self.panels.values()
    }

    pub fn get(&self, id: PanelId) -> Result<&ClusterPanel, ClientError> {
        self.panels.get(&id).ok_or(ClientError::UnknownPanel(id.0))
    }

    pub fn get_mut(&mut self, id: PanelId) -> Result<&mut ClusterPanel, ClientError> {
        self.panels
            .get_mut(&id)
            .ok_or(ClientError::UnknownPanel(id.0))
    }

    /// Refills every panel's dropdowns for a new selection and clears the
    /// plots. Form choices that are still valid are kept.
    pub fn prepare_selection(&mut self, children: &[(NodeId, String)], attributes: &[String]) {
        for panel in self.panels.values_mut() {
            panel.cluster_options = children.to_vec();
            panel.plot = None;
            let cluster_valid = panel
                .form
                .cluster
                .as_ref()
                .is_some_and(|cluster| children.iter().any(|(id, _)| id == cluster));
            if !cluster_valid {
                panel.form.cluster = children.first().map(|(id, _)| id.clone());
            }
            let attribute_valid = panel
                .form
                .attribute
                .as_ref()
                .is_some_and(|attribute| attributes.contains(attribute));
            if !attribute_valid {
                panel.form.attribute = attributes.first().cloned();
            }
        }
    }

    /// Updates one panel's graph form. `None` keeps the current value.
    pub fn set_form(
        &mut self,
        id: PanelId,
        attribute: Option<String>,
        cluster: Option<NodeId>,
        kind: Option<DiagramKind>,
    ) -> Result<(), ClientError> {
        let panel = self.get_mut(id)?;
        if let Some(cluster) = cluster {
            if !panel.cluster_options.iter().any(|(option, _)| *option == cluster) {
                return Err(ClientError::InvalidOperation(
                    format!("'{cluster}' is not a child of the selected node").into(),
                ));
            }
            panel.form.cluster = Some(cluster);
        }
        if attribute.is_some() {
            panel.form.attribute = attribute;
        }
        if let Some(kind) = kind {
            panel.form.kind = kind;
        }
        Ok(())
    }

    /// Publishes `get_graph` for the panel's form, tagged with the current
    /// selection version. Returns `false` when the form is incomplete.
    pub fn request_graph(&self, id: PanelId, tree: &Tree, outbox: &mut Outbox) -> Result<bool, ClientError> {
        let panel = self.get(id)?;
        let (Some(selected), Some(version)) = (tree.selected_id(), tree.selected_node_version()) else {
            return Err(ClientError::InvalidOperation("no node is selected".into()));
        };
        let (Some(attribute), Some(cluster)) = (&panel.form.attribute, &panel.form.cluster) else {
            debug!(panel = id.0, "graph form incomplete, nothing requested");
            return Ok(false);
        };
        outbox.send(&BackendRequest::GetGraph(GraphRequest {
            version: version.as_str().to_string(),
            attribute: attribute.clone(),
            cluster: cluster.as_smol().clone(),
            kind: panel.form.kind,
            selected_node_id: selected.as_smol().clone(),
            panel_id: id.0,
        }));
        Ok(true)
    }

    /// Requests graphs for every panel with a complete form.
    pub fn request_all(&self, tree: &Tree, outbox: &mut Outbox) -> Result<usize, ClientError> {
        let mut requested = 0;
        for id in self.panels.keys() {
            if self.request_graph(*id, tree, outbox)? {
                requested += 1;
            }
        }
        Ok(requested)
    }

    /// Routes session graph data to its panel (panel 0 when untagged).
    /// Data for any version other than the current selection's is dropped
    /// and leaves the panel untouched.
    pub fn apply_graph_data(&mut self, tree: &Tree, data: GraphData) -> Result<GraphOutcome, ClientError> {
        if !tree.accepts_version(&data.version) {
            debug!(version = %data.version, "dropping graph data for outdated version");
            return Ok(GraphOutcome::Stale);
        }
        let id = PanelId(data.panel_id.unwrap_or(0));
        self.get_mut(id)?.show(data.plot);
        Ok(GraphOutcome::Applied(id))
    }

    /// Broadcast graph data carries no version and is shown as is.
    pub fn apply_legacy_graph(&mut self, panel: usize, plot: PlotPayload) -> Result<(), ClientError> {
        self.get_mut(PanelId(panel))?.show(plot);
        Ok(())
    }

    pub fn change_content(&mut self, result: MethodResult) -> Result<(), ClientError> {
        self.get_mut(PanelId(result.panel))?.change_content(result);
        Ok(())
    }

    /// Puts every panel back into the loading state.
    pub fn reset_all(&mut self) {
        for panel in self.panels.values_mut() {
            panel.reset();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::SessionId;
    use crate::transport::RecordingTransport;
    use crate::tree::LayoutConfig;
    use serde_json::json;

    fn histogram() -> PlotPayload {
        PlotPayload::Histogram {
            attribute: "x".into(),
            cluster_values: vec![1.0],
            reference_values: vec![],
            range: (0.0, 2.0),
        }
    }

    fn setup() -> (Tree, Outbox, RecordingTransport, PanelRegistry) {
        let recorder = RecordingTransport::new();
        let mut outbox = Outbox::new(SessionId::from("s"), Box::new(recorder.clone()));
        let tree = Tree::new(LayoutConfig::default(), &mut outbox);
        (tree, outbox, recorder, PanelRegistry::with_count(2))
    }

    #[test]
    fn graph_request_carries_version_and_panel() {
        let (mut tree, mut outbox, recorder, mut panels) = setup();
        let child = tree.add_child("root", &mut outbox).unwrap();
        tree.change_selected_node("root").unwrap();
        panels.prepare_selection(&[(child.clone(), "c".into())], &["age".into()]);
        assert!(panels.request_graph(PanelId(1), &tree, &mut outbox).unwrap());
        let sent = recorder.last("get_graph").unwrap();
        assert_eq!(sent.field("version"), tree.selected_node_version().map(|v| v.as_str()));
        assert_eq!(sent.field("cluster"), Some(child.as_str()));
        assert_eq!(sent.field("attribute"), Some("age"));
        assert_eq!(sent.payload["panel_id"], json!(1));
    }

    #[test]
    fn incomplete_form_requests_nothing() {
        let (mut tree, mut outbox, recorder, mut panels) = setup();
        tree.change_selected_node("root").unwrap();
        panels.prepare_selection(&[], &["age".into()]);
        assert_eq!(panels.request_all(&tree, &mut outbox).unwrap(), 0);
        assert_eq!(recorder.count("get_graph"), 0);
    }

    #[test]
    fn graph_data_routes_by_panel_id() {
        let (mut tree, _outbox, _, mut panels) = setup();
        tree.change_selected_node("root").unwrap();
        let version = tree.selected_node_version().unwrap().as_str().into();
        let outcome = panels
            .apply_graph_data(
                &tree,
                GraphData {
                    version,
                    vis_type: "histogram".into(),
                    panel_id: Some(1),
                    plot: histogram(),
                },
            )
            .unwrap();
        assert_eq!(outcome, GraphOutcome::Applied(PanelId(1)));
        assert!(panels.get(PanelId(1)).unwrap().plot().is_some());
        assert!(panels.get(PanelId(0)).unwrap().plot().is_none());
    }

    #[test]
    fn stale_graph_data_leaves_panel_untouched() {
        let (mut tree, _outbox, _, mut panels) = setup();
        tree.change_selected_node("root").unwrap();
        let outcome = panels
            .apply_graph_data(
                &tree,
                GraphData {
                    version: "old".into(),
                    vis_type: "histogram".into(),
                    panel_id: None,
                    plot: histogram(),
                },
            )
            .unwrap();
        assert_eq!(outcome, GraphOutcome::Stale);
        assert!(panels.get(PanelId(0)).unwrap().plot().is_none());
    }

    #[test]
    fn unknown_panel_is_an_error() {
        let mut panels = PanelRegistry::with_count(1);
        assert_eq!(
            panels.apply_legacy_graph(4, histogram()),
            Err(ClientError::UnknownPanel(4))
        );
        panels.register(PanelId(4));
        assert!(panels.apply_legacy_graph(4, histogram()).is_ok());
    }

    #[test]
    fn form_rejects_foreign_cluster() {
        let mut panels = PanelRegistry::with_count(1);
        panels.prepare_selection(&[(NodeId::from("a"), "a".into())], &["x".into()]);
        assert!(panels
            .set_form(PanelId(0), None, Some(NodeId::from("b")), None)
            .is_err());
        panels
            .set_form(PanelId(0), Some("y".into()), None, Some(DiagramKind::Histogram))
            .unwrap();
        let form = panels.get(PanelId(0)).unwrap().form();
        assert_eq!(form.attribute.as_deref(), Some("y"));
        assert_eq!(form.kind, DiagramKind::Histogram);
    }
}
