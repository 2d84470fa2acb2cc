//! Cluster hierarchy: node arena, lifecycle operations and the
//! selection/version protocol.
//!
//! Nodes live in an insertion-ordered arena keyed by id; parent and child
//! links are ids. Ids of deleted nodes are retired and never handed out
//! again, so late engine messages for them can be recognized and dropped.

mod layout;
mod node;
mod restriction;

pub use layout::{zoom, Connection, DragOffset, LayoutConfig, Position, MIN_SCALE, ZOOM_STEP};
pub use node::{FeatureBadge, NodeAnalytics, NodeState, TreeNode};
pub use restriction::parse_restrictions;

use indexmap::IndexMap;
use interclust_protocol::{BackendRequest, NodeInfo, Restriction};
use rustc_hash::FxHashSet;
use tracing::debug;

use crate::error::ClientError;
use crate::ids::{NodeId, Rgb, Version};
use crate::transport::Outbox;

/// Notifications for views that depend on the tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeEvent {
    /// The tree adopted its attribute list from the first node-info response.
    AttributesAdopted,
    /// The selection changed, its version rotated, or its data was updated:
    /// dependent views must refresh and re-request engine data.
    SelectionRefresh { node: NodeId },
    /// The selected node was deleted.
    SelectionCleared,
}

/// Outcome of a cluster-count change.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClusterCountChange {
    pub added: Vec<NodeId>,
    pub removed: Vec<NodeId>,
    pub reclustered: bool,
}

#[derive(Debug)]
pub struct Tree {
    nodes: IndexMap<NodeId, TreeNode>,
    retired: FxHashSet<NodeId>,
    selected: Option<NodeId>,
    selected_version: Option<Version>,
    attributes: Vec<String>,
    scale_factor: f64,
    layout: LayoutConfig,
    events: Vec<TreeEvent>,
}

impl Tree {
    /// Creates the tree with its synthetic root and registers the root with
    /// the engine.
    pub fn new(layout: LayoutConfig, outbox: &mut Outbox) -> Self {
        let root_id = NodeId::root();
        let mut root = TreeNode::new(root_id.clone(), None);
        root.position = layout.root_position();
        let mut nodes = IndexMap::new();
        nodes.insert(root_id.clone(), root);
        outbox.send(&BackendRequest::RegisterRoot {
            root_id: root_id.as_smol().clone(),
        });
        Self {
            nodes,
            retired: FxHashSet::default(),
            selected: None,
            selected_version: None,
            attributes: Vec::new(),
            scale_factor: 1.0,
            layout,
            events: Vec::new(),
        }
    }

    #[must_use]
    pub fn root(&self) -> &TreeNode {
        // The root is inserted first and never removed.
        &self.nodes[0]
    }

    #[must_use]
    pub fn node(&self, id: &str) -> Option<&TreeNode> {
        self.nodes.get(id)
    }

    pub fn get(&self, id: &str) -> Result<&TreeNode, ClientError> {
        self.nodes
            .get(id)
            .ok_or_else(|| ClientError::UnknownNode(id.into()))
    }

    fn get_mut(&mut self, id: &str) -> Result<&mut TreeNode, ClientError> {
        self.nodes
            .get_mut(id)
            .ok_or_else(|| ClientError::UnknownNode(id.into()))
    }

    /// Live nodes in creation order.
    pub fn nodes(&self) -> impl Iterator<Item = &TreeNode> {
        self.nodes.values()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Whether `id` belonged to a node that has been deleted.
    #[must_use]
    pub fn is_retired(&self, id: &str) -> bool {
        self.retired.contains(id)
    }

    /// Dataset columns, adopted from the first node-info response.
    #[must_use]
    pub fn attributes(&self) -> &[String] {
        &self.attributes
    }

    #[must_use]
    pub fn layout(&self) -> &LayoutConfig {
        &self.layout
    }

    #[must_use]
    pub fn scale_factor(&self) -> f64 {
        self.scale_factor
    }

    pub fn zoom_in(&mut self) -> f64 {
        self.scale_factor = zoom(self.scale_factor, true);
        self.scale_factor
    }

    pub fn zoom_out(&mut self) -> f64 {
        self.scale_factor = zoom(self.scale_factor, false);
        self.scale_factor
    }

    /// Takes pending notifications, oldest first.
    pub fn drain_events(&mut self) -> Vec<TreeEvent> {
        std::mem::take(&mut self.events)
    }

    /// `id` followed by every descendant, depth first.
    #[must_use]
    pub fn preorder(&self, id: &str) -> Vec<NodeId> {
        let mut order = Vec::new();
        let mut stack: Vec<&NodeId> = match self.nodes.get_key_value(id) {
            Some((key, _)) => vec![key],
            None => return order,
        };
        while let Some(current) = stack.pop() {
            order.push(current.clone());
            if let Some(node) = self.nodes.get(current) {
                stack.extend(node.children.iter().rev());
            }
        }
        order
    }

    /// Distance from the root.
    #[must_use]
    pub fn level(&self, id: &str) -> usize {
        let mut level = 0;
        let mut current = self.nodes.get(id).and_then(TreeNode::parent);
        while let Some(parent) = current {
            level += 1;
            current = self.nodes.get(parent).and_then(TreeNode::parent);
        }
        level
    }

    /// Other children of the node's parent.
    #[must_use]
    pub fn siblings(&self, id: &str) -> Vec<NodeId> {
        self.nodes
            .get(id)
            .and_then(TreeNode::parent)
            .and_then(|parent| self.nodes.get(parent))
            .map(|parent| {
                parent
                    .children
                    .iter()
                    .filter(|child| child.as_str() != id)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Resolves a node by exact id, exact name, or unique id prefix.
    pub fn resolve(&self, reference: &str) -> Result<NodeId, ClientError> {
        let reference = reference.trim();
        if let Some((id, _)) = self.nodes.get_key_value(reference) {
            return Ok(id.clone());
        }
        let unique = |matches: Vec<&NodeId>| -> Result<Option<NodeId>, ClientError> {
            match matches.as_slice() {
                [] => Ok(None),
                [id] => Ok(Some((*id).clone())),
                _ => Err(ClientError::AmbiguousNode(reference.into())),
            }
        };
        let by_name: Vec<&NodeId> = self
            .nodes
            .values()
            .filter(|node| node.name == reference)
            .map(TreeNode::id)
            .collect();
        if let Some(id) = unique(by_name)? {
            return Ok(id);
        }
        let by_prefix: Vec<&NodeId> = self
            .nodes
            .keys()
            .filter(|id| !reference.is_empty() && id.as_str().starts_with(reference))
            .collect();
        unique(by_prefix)?.ok_or_else(|| ClientError::UnknownNode(reference.into()))
    }

    // ---- layout ----

    /// Recomputes every position top-down from the root.
    pub fn rebalance(&mut self) {
        let order = self.preorder(NodeId::ROOT);
        for id in order {
            let Some(node) = self.nodes.get(&id) else {
                continue;
            };
            let Some(parent_id) = node.parent.clone() else {
                let root_position = self.layout.root_position();
                if let Some(root) = self.nodes.get_mut(&id) {
                    root.position = root_position;
                }
                continue;
            };
            let (offset_top, offset_left) = (node.offset_top, node.offset_left);
            let Some(parent) = self.nodes.get(&parent_id) else {
                continue;
            };
            let siblings = parent.children.len();
            let Some(index) = parent.children.iter().position(|child| *child == id) else {
                continue;
            };
            let position =
                self.layout
                    .child_position(parent.position, index, siblings, offset_top, offset_left);
            if let Some(node) = self.nodes.get_mut(&id) {
                node.position = position;
            }
        }
    }

    /// On-screen position including the drag offset.
    #[must_use]
    pub fn visual_position(&self, id: &str) -> Option<Position> {
        self.nodes.get(id).map(|node| Position {
            left: node.position.left + node.drag.x,
            top: node.position.top + node.drag.y,
        })
    }

    /// Line connecting a non-root node to its parent.
    #[must_use]
    pub fn connection(&self, id: &str) -> Option<Connection> {
        let node = self.nodes.get(id)?;
        let parent = self.nodes.get(node.parent.as_ref()?)?;
        Some(
            self.layout
                .connection(parent.position, parent.drag, node.position, node.drag),
        )
    }

    /// Moves a node and its subtree by a drag gesture.
    pub fn drag(&mut self, id: &str, dx: f64, dy: f64) -> Result<(), ClientError> {
        self.get(id)?;
        for member in self.preorder(id) {
            if let Some(node) = self.nodes.get_mut(&member) {
                node.drag = node.drag.shifted(dx, dy);
            }
        }
        Ok(())
    }

    // ---- lifecycle ----

    fn fresh_id(&self) -> NodeId {
        loop {
            let id = NodeId::generate();
            if !self.nodes.contains_key(&id) && !self.retired.contains(&id) {
                return id;
            }
        }
    }

    /// Creates a child under `parent` and registers it with the engine.
    pub fn add_child(&mut self, parent: &str, outbox: &mut Outbox) -> Result<NodeId, ClientError> {
        let parent_drag = self.get(parent)?.drag;
        let parent_id = self.get(parent)?.id().clone();
        let id = self.fresh_id();
        let mut child = TreeNode::new(id.clone(), Some(parent_id.clone()));
        child.offset_top = self.layout.dist_top;
        child.drag = parent_drag;
        outbox.send(&BackendRequest::AddNode {
            node_id: id.as_smol().clone(),
            node_name: child.name.clone(),
            parent_id: parent_id.as_smol().clone(),
            immediate_calc: true,
        });
        self.nodes.insert(id.clone(), child);
        self.get_mut(parent_id.as_str())?.children.push(id.clone());
        self.rebalance();
        Ok(id)
    }

    /// Applies a node-info response from the engine.
    ///
    /// Never rotates the version. Refreshes dependent views when the node is
    /// the current selection.
    pub fn update_node_information(&mut self, info: NodeInfo) -> Result<(), ClientError> {
        if self.retired.contains(info.node_id.as_str()) {
            debug!(node = %info.node_id, "dropping info for deleted node");
            return Ok(());
        }
        let node = self.get_mut(info.node_id.as_str())?;
        let first = node.apply_info(info);
        let id = node.id().clone();
        let adopted = first.then(|| node.attributes.clone());
        if let Some(attributes) = adopted.filter(|_| self.attributes.is_empty()) {
            self.attributes = attributes;
            self.events.push(TreeEvent::AttributesAdopted);
        }
        if self.selected.as_ref() == Some(&id) {
            self.events.push(TreeEvent::SelectionRefresh { node: id });
        }
        Ok(())
    }

    /// Rotates the node's version. For the selected node this goes through
    /// [`Tree::change_selected_node_version`] so the mirror stays aligned.
    fn invalidate(&mut self, id: &str) -> Result<(), ClientError> {
        if self.selected.as_ref().is_some_and(|selected| selected.as_str() == id) {
            self.change_selected_node_version();
        } else {
            self.get_mut(id)?.rotate_version();
        }
        Ok(())
    }

    pub fn rename(&mut self, id: &str, name: &str, outbox: &mut Outbox) -> Result<(), ClientError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ClientError::InvalidOperation("node name cannot be empty".into()));
        }
        let node = self.get_mut(id)?;
        node.name = name.to_string();
        let node_id = node.id().as_smol().clone();
        // Only the selected node's views show the name.
        if self.selected.as_ref().is_some_and(|selected| selected.as_str() == id) {
            self.change_selected_node_version();
        }
        outbox.send(&BackendRequest::ChangeName {
            node_id,
            new_name: name.to_string(),
        });
        Ok(())
    }

    /// Replaces the attribute weights. Does not rotate the version: the
    /// engine answers with a fresh node-info message.
    pub fn set_attribute_weights(
        &mut self,
        id: &str,
        weights: Vec<f64>,
        outbox: &mut Outbox,
    ) -> Result<(), ClientError> {
        let node = self.get_mut(id)?;
        let Some(current) = node.weights.as_mut() else {
            return Err(ClientError::NotPopulated(id.into()));
        };
        if weights.len() != current.len() {
            return Err(ClientError::InvalidOperation(
                format!("expected {} weights, got {}", current.len(), weights.len()).into(),
            ));
        }
        if let Some(bad) = weights.iter().find(|weight| !weight.is_finite() || **weight < 0.0) {
            return Err(ClientError::InvalidOperation(
                format!("invalid weight {bad}").into(),
            ));
        }
        for (slot, weight) in current.iter_mut().zip(&weights) {
            *slot = *weight;
        }
        outbox.send(&BackendRequest::SetAttributeWeights {
            node_id: node.id().as_smol().clone(),
            weights,
        });
        Ok(())
    }

    /// Handles a change of the node's cluster count (parameter k).
    pub fn change_cluster_count(
        &mut self,
        id: &str,
        new_k: usize,
        outbox: &mut Outbox,
    ) -> Result<ClusterCountChange, ClientError> {
        if new_k == 0 {
            return Err(ClientError::InvalidOperation(
                "cluster count must be at least 1".into(),
            ));
        }
        let current = self.get(id)?.num_clusters();
        let mut change = ClusterCountChange::default();
        if current == 0 {
            for _ in 0..new_k {
                change.added.push(self.add_child(id, outbox)?);
            }
            self.recluster(id, outbox)?;
            change.reclustered = true;
        } else if new_k > current {
            for _ in current..new_k {
                change.added.push(self.add_child(id, outbox)?);
            }
        } else if new_k < current {
            for _ in new_k..current {
                if let Some(last) = self.get(id)?.children.last().cloned() {
                    self.remove_last_child(id, &last, outbox);
                    change.removed.push(last);
                }
            }
            self.rebalance();
            self.recluster(id, outbox)?;
            change.reclustered = true;
        }
        Ok(change)
    }

    fn remove_last_child(&mut self, parent: &str, child: &NodeId, outbox: &mut Outbox) {
        let subtree = self.preorder(child.as_str());
        if let Some(parent) = self.nodes.get_mut(parent) {
            parent.children.pop();
        }
        outbox.send(&BackendRequest::RemoveNode {
            node_id: child.as_smol().clone(),
        });
        self.retire(subtree);
    }

    fn retire(&mut self, ids: Vec<NodeId>) {
        for id in ids {
            if self.selected.as_ref() == Some(&id) {
                self.selected = None;
                self.selected_version = None;
                self.events.push(TreeEvent::SelectionCleared);
            }
            self.nodes.shift_remove(&id);
            self.retired.insert(id);
        }
    }

    pub fn set_restrictions(
        &mut self,
        id: &str,
        restrictions: Vec<Restriction>,
        outbox: &mut Outbox,
    ) -> Result<(), ClientError> {
        let node = self.get_mut(id)?;
        if node.is_root() {
            return Err(ClientError::InvalidOperation(
                "the root has no restrictions".into(),
            ));
        }
        node.restrictions.clone_from(&restrictions);
        let node_id = node.id().as_smol().clone();
        outbox.send(&BackendRequest::SetNodeRestrictions {
            node_id,
            restrictions,
        });
        self.invalidate(id)
    }

    /// Asks the engine to recompute the node's clustering.
    pub fn recluster(&mut self, id: &str, outbox: &mut Outbox) -> Result<(), ClientError> {
        let node_id = self.get(id)?.id().as_smol().clone();
        outbox.send(&BackendRequest::Recluster { node_id });
        self.invalidate(id)
    }

    /// Deletes a node and its subtree.
    ///
    /// Exactly one `remove_node` is published, for the node itself; the
    /// engine drops the descendants. Returns every removed id, self first.
    /// An inconsistent parent link aborts without changes.
    pub fn delete_node(&mut self, id: &str, outbox: &mut Outbox) -> Result<Vec<NodeId>, ClientError> {
        let node = self.get(id)?;
        let Some(parent_id) = node.parent.clone() else {
            return Err(ClientError::InvalidOperation("the root cannot be deleted".into()));
        };
        let subtree = self.preorder(id);
        let Some(index) = self
            .nodes
            .get(&parent_id)
            .and_then(|parent| parent.children.iter().position(|child| child.as_str() == id))
        else {
            debug!(node = id, "node missing from its parent's children, delete aborted");
            return Ok(Vec::new());
        };
        if let Some(parent) = self.nodes.get_mut(&parent_id) {
            parent.children.remove(index);
        }
        outbox.send(&BackendRequest::RemoveNode {
            node_id: subtree[0].as_smol().clone(),
        });
        self.retire(subtree.clone());
        self.rebalance();
        if self.selected.as_ref() == Some(&parent_id) {
            self.events.push(TreeEvent::SelectionRefresh { node: parent_id });
        }
        Ok(subtree)
    }

    /// Picks a new random color. Presentation only.
    pub fn recolor(&mut self, id: &str) -> Result<Rgb, ClientError> {
        let node = self.get_mut(id)?;
        node.color = Rgb::random();
        Ok(node.color)
    }

    // ---- selection & version protocol ----

    #[must_use]
    pub fn selected(&self) -> Option<&TreeNode> {
        self.selected.as_ref().and_then(|id| self.nodes.get(id))
    }

    #[must_use]
    pub fn selected_id(&self) -> Option<&NodeId> {
        self.selected.as_ref()
    }

    /// Version mirror that inbound versioned messages are checked against.
    #[must_use]
    pub fn selected_node_version(&self) -> Option<&Version> {
        self.selected_version.as_ref()
    }

    /// Whether an inbound version tag belongs to the current selection.
    #[must_use]
    pub fn accepts_version(&self, tag: &str) -> bool {
        self.selected_version
            .as_ref()
            .is_some_and(|version| version.matches(tag))
    }

    /// Selects a node and asks for a view refresh, also when it already was
    /// the selection. Returns `false` in that case. The version is kept.
    pub fn change_selected_node(&mut self, id: &str) -> Result<bool, ClientError> {
        let node = self.get(id)?;
        let node_id = node.id().clone();
        let version = node.version.clone();
        let changed = self.selected.as_ref() != Some(&node_id);
        self.selected_version = Some(version);
        self.selected = Some(node_id.clone());
        self.events.push(TreeEvent::SelectionRefresh { node: node_id });
        Ok(changed)
    }

    /// Gives the selected node a fresh version and refreshes dependent
    /// views. Every call yields a new token.
    pub fn change_selected_node_version(&mut self) {
        let Some(id) = self.selected.clone() else {
            return;
        };
        let Some(node) = self.nodes.get_mut(&id) else {
            return;
        };
        let version = node.rotate_version().clone();
        self.selected_version = Some(version);
        self.events.push(TreeEvent::SelectionRefresh { node: id });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::SessionId;
    use crate::transport::RecordingTransport;

    fn tree() -> (Tree, Outbox, RecordingTransport) {
        let recorder = RecordingTransport::new();
        let mut outbox = Outbox::new(SessionId::from("s"), Box::new(recorder.clone()));
        let tree = Tree::new(LayoutConfig::default(), &mut outbox);
        (tree, outbox, recorder)
    }

    #[test]
    fn new_tree_registers_root() {
        let (tree, _outbox, recorder) = tree();
        assert_eq!(tree.root().id().as_str(), "root");
        assert!(tree.root().is_root());
        let sent = recorder.last("register_root").unwrap();
        assert_eq!(sent.field("root_id"), Some("root"));
        assert_eq!(sent.field("instance_id"), Some("s"));
    }

    #[test]
    fn preorder_visits_self_then_children_depth_first() {
        let (mut tree, mut outbox, _) = tree();
        let a = tree.add_child("root", &mut outbox).unwrap();
        let b = tree.add_child("root", &mut outbox).unwrap();
        let a1 = tree.add_child(a.as_str(), &mut outbox).unwrap();
        assert_eq!(
            tree.preorder("root"),
            vec![NodeId::root(), a.clone(), a1.clone(), b.clone()]
        );
        assert_eq!(tree.level(a1.as_str()), 2);
        assert_eq!(tree.siblings(a.as_str()), vec![b]);
    }

    #[test]
    fn children_inherit_parent_drag() {
        let (mut tree, mut outbox, _) = tree();
        let a = tree.add_child("root", &mut outbox).unwrap();
        tree.drag(a.as_str(), 15.0, -5.0).unwrap();
        let a1 = tree.add_child(a.as_str(), &mut outbox).unwrap();
        assert_eq!(tree.get(a1.as_str()).unwrap().drag(), DragOffset { x: 15.0, y: -5.0 });
        tree.drag(a.as_str(), 5.0, 5.0).unwrap();
        assert_eq!(tree.get(a1.as_str()).unwrap().drag(), DragOffset { x: 20.0, y: 0.0 });
        assert_eq!(tree.root().drag(), DragOffset::default());
    }

    #[test]
    fn resolve_accepts_name_and_prefix() {
        let (mut tree, mut outbox, _) = tree();
        let a = tree.add_child("root", &mut outbox).unwrap();
        tree.rename(a.as_str(), "setosa", &mut outbox).unwrap();
        assert_eq!(tree.resolve("setosa").unwrap(), a);
        assert_eq!(tree.resolve(&a.as_str()[..8]).unwrap(), a);
        assert_eq!(tree.resolve("root").unwrap(), NodeId::root());
        assert!(matches!(tree.resolve("nothing-like-this"), Err(ClientError::UnknownNode(_))));
    }

    #[test]
    fn root_cannot_be_deleted_or_restricted() {
        let (mut tree, mut outbox, recorder) = tree();
        assert!(tree.delete_node("root", &mut outbox).is_err());
        assert!(tree.set_restrictions("root", Vec::new(), &mut outbox).is_err());
        assert_eq!(recorder.count("remove_node"), 0);
    }

    #[test]
    fn weights_require_population() {
        let (mut tree, mut outbox, recorder) = tree();
        let err = tree
            .set_attribute_weights("root", vec![1.0], &mut outbox)
            .unwrap_err();
        assert_eq!(err, ClientError::NotPopulated("root".into()));
        assert_eq!(recorder.count("set_attribute_weights"), 0);
    }

    #[test]
    fn zero_cluster_count_is_rejected() {
        let (mut tree, mut outbox, _) = tree();
        assert!(tree.change_cluster_count("root", 0, &mut outbox).is_err());
    }

    #[test]
    fn recolor_and_drag_stay_local() {
        let (mut tree, mut outbox, recorder) = tree();
        let a = tree.add_child("root", &mut outbox).unwrap();
        let version = tree.get(a.as_str()).unwrap().version().clone();
        let sent = recorder.messages().len();
        let color = tree.recolor(a.as_str()).unwrap();
        assert_eq!(tree.get(a.as_str()).unwrap().color(), color);
        tree.drag("root", 3.0, 4.0).unwrap();
        assert_eq!(tree.get(a.as_str()).unwrap().drag(), DragOffset { x: 3.0, y: 4.0 });
        assert_eq!(tree.get(a.as_str()).unwrap().version(), &version);
        assert_eq!(recorder.messages().len(), sent);
        assert!(tree.recolor("ghost").is_err());
    }

    #[test]
    fn zoom_steps_change_scale() {
        let (mut tree, _, _) = tree();
        assert_eq!(tree.zoom_in(), 1.1);
        assert_eq!(tree.zoom_out(), 1.0);
    }
}
