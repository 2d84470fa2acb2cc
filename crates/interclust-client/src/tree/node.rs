use std::fmt;

use interclust_protocol::{NodeInfo, QualityIndicator, Restriction, StatRow, ThresholdRange};

use crate::ids::{NodeId, Rgb, Version};
use crate::tree::layout::{DragOffset, Position};

/// Lifecycle state of a live node. Deleted nodes leave the arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeState {
    /// Registered with the engine, no analytic state yet.
    Pending,
    /// Analytic state matches the node's current version.
    Populated,
    /// A local mutation produced a new version; analytic state is outdated.
    Stale,
}

impl NodeState {
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Populated => "populated",
            Self::Stale => "stale",
        }
    }
}

/// Relevant attribute with its value range in the node.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureBadge {
    pub attribute: String,
    pub range: ThresholdRange,
}

impl fmt::Display for FeatureBadge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.range {
            Some((low, high)) => write!(f, "{}: {low}-{high}", self.attribute),
            None => f.write_str(&self.attribute),
        }
    }
}

fn badges(attributes: Vec<String>, ranges: Vec<ThresholdRange>) -> Vec<FeatureBadge> {
    let mut ranges = ranges.into_iter();
    attributes
        .into_iter()
        .map(|attribute| FeatureBadge {
            attribute,
            range: ranges.next().flatten(),
        })
        .collect()
}

/// Engine-computed description of a node.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeAnalytics {
    pub num_instances: u64,
    pub relative_instances: Option<f64>,
    pub quality_indicator: Option<f64>,
    pub quality_indicators: Vec<QualityIndicator>,
    /// Attributes characterizing the node's own content.
    pub relevant_intern: Vec<FeatureBadge>,
    /// Attributes expected to matter for splitting the node further.
    pub relevant_clustering: Vec<FeatureBadge>,
    /// Attribute indices ordered by importance.
    pub importance_order: Vec<usize>,
    pub stat_summary: Vec<StatRow>,
}

/// One cluster of the hierarchy.
#[derive(Debug, Clone)]
pub struct TreeNode {
    id: NodeId,
    pub(crate) name: String,
    pub(crate) version: Version,
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
    pub(crate) state: NodeState,
    pub(crate) attributes: Vec<String>,
    pub(crate) analytics: Option<NodeAnalytics>,
    pub(crate) weights: Option<Vec<f64>>,
    pub(crate) restrictions: Vec<Restriction>,
    pub(crate) position: Position,
    pub(crate) offset_top: f64,
    pub(crate) offset_left: f64,
    pub(crate) drag: DragOffset,
    pub(crate) color: Rgb,
}

impl TreeNode {
    pub(crate) fn new(id: NodeId, parent: Option<NodeId>) -> Self {
        let name = id.short().to_string();
        Self {
            id,
            name,
            version: Version::generate(),
            parent,
            children: Vec::new(),
            state: NodeState::Pending,
            attributes: Vec::new(),
            analytics: None,
            weights: None,
            restrictions: Vec::new(),
            position: Position::default(),
            offset_top: 0.0,
            offset_left: 0.0,
            drag: DragOffset::default(),
            color: Rgb::random(),
        }
    }

    #[must_use]
    pub fn id(&self) -> &NodeId {
        &self.id
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn version(&self) -> &Version {
        &self.version
    }

    #[must_use]
    pub fn parent(&self) -> Option<&NodeId> {
        self.parent.as_ref()
    }

    #[must_use]
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    /// Current cluster count, i.e. number of children.
    #[must_use]
    pub fn num_clusters(&self) -> usize {
        self.children.len()
    }

    #[must_use]
    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    #[must_use]
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    #[must_use]
    pub fn state(&self) -> NodeState {
        self.state
    }

    #[must_use]
    pub fn attributes(&self) -> &[String] {
        &self.attributes
    }

    #[must_use]
    pub fn analytics(&self) -> Option<&NodeAnalytics> {
        self.analytics.as_ref()
    }

    #[must_use]
    pub fn weights(&self) -> Option<&[f64]> {
        self.weights.as_deref()
    }

    #[must_use]
    pub fn restrictions(&self) -> &[Restriction] {
        &self.restrictions
    }

    #[must_use]
    pub fn position(&self) -> Position {
        self.position
    }

    #[must_use]
    pub fn drag(&self) -> DragOffset {
        self.drag
    }

    #[must_use]
    pub fn color(&self) -> Rgb {
        self.color
    }

    /// Name cut to `max` characters with a trailing `...`.
    #[must_use]
    pub fn presentable_name(&self, max: usize) -> String {
        if self.name.chars().count() < max {
            return self.name.clone();
        }
        let mut short: String = self.name.chars().take(max).collect();
        short.push_str("...");
        short
    }

    /// Silhouette score cut to four characters, `-` when not computed.
    #[must_use]
    pub fn quality_text(&self) -> String {
        match self.analytics.as_ref().and_then(|a| a.quality_indicator) {
            Some(value) => value.to_string().chars().take(4).collect(),
            None => "-".into(),
        }
    }

    /// Share of the parent's rows as `xx.x%`, `-` for the root.
    #[must_use]
    pub fn relative_text(&self) -> String {
        match self.analytics.as_ref().and_then(|a| a.relative_instances) {
            Some(share) => {
                let mut text: String = (share * 100.0).to_string().chars().take(4).collect();
                text.push('%');
                text
            }
            None => "-".into(),
        }
    }

    /// Whether attribute `index` is among the clustering-relevant attributes.
    #[must_use]
    pub fn is_relevant_for_clustering(&self, index: usize) -> bool {
        let Some(analytics) = &self.analytics else {
            return false;
        };
        let Some(attribute) = self.attributes.get(index) else {
            return false;
        };
        analytics
            .relevant_clustering
            .iter()
            .any(|badge| &badge.attribute == attribute)
    }

    /// Copies engine state into the node. Returns `true` on first population.
    pub(crate) fn apply_info(&mut self, info: NodeInfo) -> bool {
        let first = self.analytics.is_none();
        let attribute_count = info.attributes.len();
        match &mut self.weights {
            Some(weights) => weights.resize(attribute_count, 1.0),
            None => self.weights = Some(vec![1.0; attribute_count]),
        }
        self.attributes = info.attributes;
        self.analytics = Some(NodeAnalytics {
            num_instances: info.num_instances,
            relative_instances: info.relative_num_instances,
            quality_indicator: info.quality_indicator,
            quality_indicators: info.quality_indicator_list,
            relevant_intern: badges(
                info.important_features_within_clust,
                info.important_within_thresholds,
            ),
            relevant_clustering: badges(
                info.important_features_between_cluster,
                info.important_between_thresholds,
            ),
            importance_order: info.sorted_feature_importance_indice,
            stat_summary: info.stat_summary,
        });
        self.state = NodeState::Populated;
        first
    }

    /// Replaces the version token and marks derived state outdated.
    pub(crate) fn rotate_version(&mut self) -> &Version {
        self.version = Version::generate();
        if self.state == NodeState::Populated {
            self.state = NodeState::Stale;
        }
        &self.version
    }
}
