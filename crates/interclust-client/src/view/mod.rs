//! Detailed view of the selected node.
//!
//! Every refresh re-derives the info section, statistics and weight
//! recommendations from the tree and re-requests graphs, the active query
//! and the data table from the engine. Engine replies addressed to a node
//! that is no longer selected are dropped.

mod recommend;
mod stats;
mod table;

pub use recommend::{recommend_weights, Emphasis, WeightRecommendation, LOWERED_WEIGHT, RAISED_WEIGHT};
pub use stats::{StatisticsRow, StatisticsTable, STAT_LABELS};
pub use table::{DataRow, DataTableView, QueryColumn, QueryView};

use interclust_protocol::{ActiveQuery, BackendRequest, DataTable};
use tracing::debug;

use crate::error::ClientError;
use crate::ids::NodeId;
use crate::panel::PanelRegistry;
use crate::transport::Outbox;
use crate::tree::{Tree, TreeNode};

/// Percentage text cut to five characters, e.g. `33.33%`.
fn share(part: u64, whole: u64) -> String {
    if whole == 0 {
        return "-".into();
    }
    let mut text: String = (part as f64 / whole as f64 * 100.0)
        .to_string()
        .chars()
        .take(5)
        .collect();
    text.push('%');
    text
}

#[derive(Debug, Clone, PartialEq)]
pub struct QualityLine {
    pub name: String,
    pub value: String,
    pub description: String,
}

/// General facts about the selected node.
#[derive(Debug, Clone, PartialEq)]
pub struct InfoSection {
    pub level: usize,
    pub num_instances: Option<u64>,
    pub share_of_total: String,
    pub share_of_parent: String,
    /// Empty for leaves.
    pub quality: Vec<QualityLine>,
}

impl InfoSection {
    #[must_use]
    pub fn build(tree: &Tree, node: &TreeNode) -> Self {
        let instances = |node: &TreeNode| node.analytics().map(|a| a.num_instances);
        let own = instances(node);
        let total = instances(tree.root());
        let parent = node.parent().and_then(|id| tree.node(id.as_str())).and_then(instances);
        let share_of_total = match (own, total) {
            (Some(own), Some(total)) => share(own, total),
            _ => "-".into(),
        };
        let share_of_parent = if node.is_root() {
            "100%".into()
        } else {
            match (own, parent) {
                (Some(own), Some(parent)) => share(own, parent),
                _ => "-".into(),
            }
        };
        let quality = match node.analytics() {
            Some(analytics) if !node.is_leaf() => analytics
                .quality_indicators
                .iter()
                .map(|indicator| QualityLine {
                    name: indicator.name.clone(),
                    value: indicator
                        .value
                        .map_or_else(|| "-".into(), |value| format!("{value:.3}")),
                    description: indicator.description.clone(),
                })
                .collect(),
            _ => Vec::new(),
        };
        Self {
            level: tree.level(node.id().as_str()),
            num_instances: own,
            share_of_total,
            share_of_parent,
            quality,
        }
    }
}

#[derive(Debug, Default)]
pub struct DetailedView {
    is_init: bool,
    recommend_limit: usize,
    attributes: Vec<String>,
    node: Option<NodeId>,
    graph_visible: bool,
    info: Option<InfoSection>,
    statistics: Option<StatisticsTable>,
    table: Option<DataTableView>,
    query: Option<QueryView>,
    recommendations: Vec<WeightRecommendation>,
}

impl DetailedView {
    #[must_use]
    pub fn new(recommend_limit: usize) -> Self {
        Self {
            recommend_limit,
            ..Self::default()
        }
    }

    /// Whether the dataset attributes are known. Refreshes before that are
    /// ignored.
    #[must_use]
    pub fn is_init(&self) -> bool {
        self.is_init
    }

    #[must_use]
    pub fn node(&self) -> Option<&NodeId> {
        self.node.as_ref()
    }

    #[must_use]
    pub fn attributes(&self) -> &[String] {
        &self.attributes
    }

    /// Hidden when the selected node has no children to plot.
    #[must_use]
    pub fn graph_visible(&self) -> bool {
        self.graph_visible
    }

    #[must_use]
    pub fn info(&self) -> Option<&InfoSection> {
        self.info.as_ref()
    }

    #[must_use]
    pub fn statistics(&self) -> Option<&StatisticsTable> {
        self.statistics.as_ref()
    }

    #[must_use]
    pub fn table(&self) -> Option<&DataTableView> {
        self.table.as_ref()
    }

    #[must_use]
    pub fn query(&self) -> Option<&QueryView> {
        self.query.as_ref()
    }

    #[must_use]
    pub fn recommendations(&self) -> &[WeightRecommendation] {
        &self.recommendations
    }

    /// Adopts the dataset attributes from the tree.
    pub fn init_attributes(&mut self, tree: &Tree) {
        self.attributes = tree.attributes().to_vec();
        self.is_init = true;
    }

    /// Rebuilds the view for the tree's selection and re-requests engine
    /// data for it.
    pub fn update_cluster_selection(
        &mut self,
        tree: &Tree,
        panels: &mut PanelRegistry,
        outbox: &mut Outbox,
    ) -> Result<(), ClientError> {
        if !self.is_init {
            debug!("detailed view not initialized, refresh skipped");
            return Ok(());
        }
        let Some(node) = tree.selected() else {
            self.clear();
            return Ok(());
        };
        if self.node.as_ref() != Some(node.id()) {
            self.table = None;
            self.node = Some(node.id().clone());
        }
        let children: Vec<(NodeId, String)> = node
            .children()
            .iter()
            .filter_map(|id| tree.node(id.as_str()))
            .map(|child| (child.id().clone(), child.name().to_string()))
            .collect();

        self.graph_visible = !children.is_empty();
        self.info = Some(InfoSection::build(tree, node));
        panels.prepare_selection(&children, &self.attributes);
        panels.request_all(tree, outbox)?;
        self.statistics = node
            .analytics()
            .and_then(|analytics| StatisticsTable::build(node.attributes(), &analytics.stat_summary));

        self.query = None;
        let node_id = node.id().as_smol().clone();
        if children.len() > 1 {
            outbox.send(&BackendRequest::RequestActiveQuery {
                node_id: node_id.clone(),
            });
        }
        self.recommendations = if children.len() >= 2 {
            self.recommend(node)
        } else {
            Vec::new()
        };
        outbox.send(&BackendRequest::GetDataTable { node_id });
        Ok(())
    }

    fn recommend(&self, node: &TreeNode) -> Vec<WeightRecommendation> {
        let Some(weights) = node.weights() else {
            return Vec::new();
        };
        let relevant: Vec<usize> = (0..node.attributes().len())
            .filter(|index| node.is_relevant_for_clustering(*index))
            .collect();
        recommend_weights(node.attributes(), weights, &relevant, self.recommend_limit)
    }

    /// Shows engine rows for the selected node. Returns `false` when the
    /// table belongs to another node.
    pub fn update_data_table(&mut self, tree: &Tree, table: DataTable) -> bool {
        if tree.selected_id().map(NodeId::as_str) != Some(table.node_id.as_str()) {
            debug!(node = %table.node_id, "dropping data table for unselected node");
            return false;
        }
        self.table = Some(DataTableView::build(tree, table));
        true
    }

    /// Shows a pairwise query for the selected node.
    pub fn update_recommendations(&mut self, tree: &Tree, query: &ActiveQuery) -> bool {
        let Some(node) = tree
            .selected()
            .filter(|node| node.id().as_str() == query.node_id.as_str())
        else {
            debug!(node = %query.node_id, "dropping active query for unselected node");
            return false;
        };
        self.query = Some(QueryView::build(node, query));
        true
    }

    /// Answers the pending query and clears it.
    pub fn answer_query(&mut self, same_cluster: bool, outbox: &mut Outbox) -> Result<(), ClientError> {
        let Some(query) = self.query.take() else {
            return Err(ClientError::InvalidOperation("no query is pending".into()));
        };
        outbox.send(&BackendRequest::QueryAnswer {
            node_id: query.node_id.as_smol().clone(),
            same_cluster,
        });
        Ok(())
    }

    /// Moves one row into another child of the selected node.
    pub fn reassign_row(
        &self,
        tree: &Tree,
        backend_row_id: &str,
        target: &NodeId,
        outbox: &mut Outbox,
    ) -> Result<(), ClientError> {
        let Some(selected) = tree.selected() else {
            return Err(ClientError::InvalidOperation("no node is selected".into()));
        };
        if !selected.children().contains(target) {
            return Err(ClientError::InvalidOperation(
                format!("'{target}' is not a child of the selected node").into(),
            ));
        }
        outbox.send(&BackendRequest::ReassignInstance {
            node_id: selected.id().as_smol().clone(),
            assigned_cluster: target.as_smol().clone(),
            backend_row_id: backend_row_id.to_string(),
        });
        Ok(())
    }

    /// Forgets everything shown for the previous selection.
    pub fn clear(&mut self) {
        self.node = None;
        self.graph_visible = false;
        self.info = None;
        self.statistics = None;
        self.table = None;
        self.query = None;
        self.recommendations.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::SessionId;
    use crate::panel::PanelRegistry;
    use crate::transport::RecordingTransport;
    use crate::tree::LayoutConfig;
    use interclust_protocol::NodeInfo;
    use serde_json::json;

    struct Fixture {
        tree: Tree,
        outbox: Outbox,
        recorder: RecordingTransport,
        panels: PanelRegistry,
        view: DetailedView,
    }

    fn info(id: &str, instances: u64) -> NodeInfo {
        serde_json::from_value(json!({
            "node_id": id,
            "num_instances": instances,
            "important_features_between_cluster": ["b"],
            "important_between_thresholds": [["0", "1"]],
            "quality_indicator": 0.5,
            "attributes": ["a", "b"],
            "sorted_feature_importance_indice": [1, 0],
            "stat_summary": [{"a": 4.0, "b": 4.0}, {"a": 1.0, "b": 2.0}],
            "quality_indicator_list": [["silhouette", 0.512_345, "[-1, 1]"]],
        }))
        .unwrap()
    }

    fn fixture() -> Fixture {
        let recorder = RecordingTransport::new();
        let mut outbox = Outbox::new(SessionId::from("s"), Box::new(recorder.clone()));
        let mut tree = Tree::new(LayoutConfig::default(), &mut outbox);
        tree.update_node_information(info("root", 150)).unwrap();
        let mut view = DetailedView::new(1);
        view.init_attributes(&tree);
        Fixture {
            tree,
            outbox,
            recorder,
            panels: PanelRegistry::with_count(1),
            view,
        }
    }

    #[test]
    fn refresh_before_init_is_ignored() {
        let mut f = fixture();
        let mut view = DetailedView::new(1);
        f.tree.change_selected_node("root").unwrap();
        f.recorder.take();
        view.update_cluster_selection(&f.tree, &mut f.panels, &mut f.outbox)
            .unwrap();
        assert!(view.info().is_none());
        assert!(f.recorder.messages().is_empty());
    }

    #[test]
    fn leaf_selection_requests_only_the_data_table() {
        let mut f = fixture();
        f.tree.change_selected_node("root").unwrap();
        f.recorder.take();
        f.view
            .update_cluster_selection(&f.tree, &mut f.panels, &mut f.outbox)
            .unwrap();
        let names: Vec<String> = f.recorder.take().iter().map(|m| m.name().to_string()).collect();
        assert_eq!(names, ["get_data_table"]);
        assert!(!f.view.graph_visible());
        let info = f.view.info().unwrap();
        assert_eq!(info.share_of_parent, "100%");
        assert_eq!(info.share_of_total, "100%");
        assert!(info.quality.is_empty());
        assert_eq!(f.view.statistics().unwrap().value("mean", "b"), Some(2.0));
    }

    #[test]
    fn split_node_requests_graph_query_and_table_in_order() {
        let mut f = fixture();
        let a = f.tree.add_child("root", &mut f.outbox).unwrap();
        f.tree.add_child("root", &mut f.outbox).unwrap();
        f.tree.update_node_information(info(a.as_str(), 50)).unwrap();
        f.tree.change_selected_node("root").unwrap();
        f.recorder.take();
        f.view
            .update_cluster_selection(&f.tree, &mut f.panels, &mut f.outbox)
            .unwrap();
        let names: Vec<String> = f.recorder.take().iter().map(|m| m.name().to_string()).collect();
        assert_eq!(names, ["get_graph", "request_active_query", "get_data_table"]);
        let info = f.view.info().unwrap();
        assert_eq!(info.quality[0].value, "0.512");
        assert_eq!(info.level, 0);
    }

    #[test]
    fn child_info_reports_shares() {
        let mut f = fixture();
        let a = f.tree.add_child("root", &mut f.outbox).unwrap();
        f.tree.update_node_information(info(a.as_str(), 50)).unwrap();
        let section = InfoSection::build(&f.tree, f.tree.get(a.as_str()).unwrap());
        assert_eq!(section.level, 1);
        assert_eq!(section.share_of_total, "33.33%");
        assert_eq!(section.share_of_parent, "33.33%");
    }

    #[test]
    fn data_table_for_other_node_is_dropped() {
        let mut f = fixture();
        f.tree.change_selected_node("root").unwrap();
        let table: DataTable = serde_json::from_value(json!({
            "node_id": "elsewhere",
            "table_data": "[]",
        }))
        .unwrap();
        assert!(!f.view.update_data_table(&f.tree, table));
        assert!(f.view.table().is_none());
    }

    #[test]
    fn data_rows_carry_assignment_color_and_options() {
        let mut f = fixture();
        let a = f.tree.add_child("root", &mut f.outbox).unwrap();
        let b = f.tree.add_child("root", &mut f.outbox).unwrap();
        f.tree.change_selected_node("root").unwrap();
        let rows = json!([
            { "un_row_id_random12345613": 7, "cluster_assignment": a.as_str(), "a": 1.0 },
            { "un_row_id_random12345613": 8, "cluster_assignment": "-", "a": 2.0 },
        ]);
        let table: DataTable = serde_json::from_value(json!({
            "node_id": "root",
            "table_data": rows.to_string(),
        }))
        .unwrap();
        assert!(f.view.update_data_table(&f.tree, table));
        let view = f.view.table().unwrap();
        let row = view.row("7").unwrap();
        assert_eq!(row.assignment.as_ref(), Some(&a));
        assert_eq!(row.color, Some(f.tree.get(a.as_str()).unwrap().color()));
        assert_eq!(row.options.len(), 1);
        assert_eq!(row.options[0].0, b);
        assert_eq!(row.values, vec![("a".to_string(), json!(1.0))]);
        assert!(view.row("8").unwrap().assignment.is_none());
    }

    #[test]
    fn query_is_sorted_by_importance_and_answered_once() {
        let mut f = fixture();
        f.tree.change_selected_node("root").unwrap();
        let query: ActiveQuery = serde_json::from_value(json!({
            "node_id": "root",
            "query_id": [3, 9],
            "query_data": [[1.0, 2.0], [1.5, 2.5]],
        }))
        .unwrap();
        assert!(f.view.update_recommendations(&f.tree, &query));
        let shown = f.view.query().unwrap();
        assert_eq!(shown.relevant[0].attribute, "b");
        assert_eq!(shown.relevant[0].second, json!(2.5));
        assert_eq!(shown.other[0].attribute, "a");
        f.view.answer_query(false, &mut f.outbox).unwrap();
        let sent = f.recorder.last("q_answer").unwrap();
        assert_eq!(sent.payload["q_answer"], json!(false));
        assert!(f.view.query().is_none());
        assert!(f.view.answer_query(true, &mut f.outbox).is_err());
    }

    #[test]
    fn reassignment_targets_children_of_selection() {
        let mut f = fixture();
        let a = f.tree.add_child("root", &mut f.outbox).unwrap();
        let a1 = f.tree.add_child(a.as_str(), &mut f.outbox).unwrap();
        f.tree.change_selected_node("root").unwrap();
        assert!(f.view.reassign_row(&f.tree, "7", &a1, &mut f.outbox).is_err());
        f.view.reassign_row(&f.tree, "7", &a, &mut f.outbox).unwrap();
        let sent = f.recorder.last("reassign_instance_clust").unwrap();
        assert_eq!(sent.field("assigned_cluster"), Some(a.as_str()));
        assert_eq!(sent.field("backend_row_id"), Some("7"));
        assert_eq!(sent.field("node_id"), Some("root"));
    }
}
