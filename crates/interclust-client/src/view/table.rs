//! Raw rows and pairwise queries of the selected node.

use interclust_protocol::{ActiveQuery, DataTable, ASSIGNMENT_COLUMN, ROW_ID_COLUMN};
use serde_json::Value;

use crate::ids::{NodeId, Rgb};
use crate::tree::{Tree, TreeNode};

/// Assignment placeholder for rows not yet in any child cluster.
const UNASSIGNED: &str = "-";

#[derive(Debug, Clone, PartialEq)]
pub struct DataRow {
    pub backend_row_id: String,
    pub assignment: Option<NodeId>,
    /// Color of the assigned cluster.
    pub color: Option<Rgb>,
    /// Clusters the row may be moved to: siblings of its current cluster.
    pub options: Vec<(NodeId, String)>,
    pub values: Vec<(String, Value)>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DataTableView {
    pub node_id: NodeId,
    pub rows: Vec<DataRow>,
}

fn text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

impl DataTableView {
    #[must_use]
    pub fn build(tree: &Tree, table: DataTable) -> Self {
        let rows = table
            .rows
            .into_iter()
            .map(|mut row| {
                let backend_row_id = row
                    .shift_remove(ROW_ID_COLUMN)
                    .map(|value| text(&value))
                    .unwrap_or_default();
                let assignment = row
                    .shift_remove(ASSIGNMENT_COLUMN)
                    .map(|value| text(&value))
                    .filter(|id| id != UNASSIGNED)
                    .and_then(|id| tree.node(&id).map(|node| node.id().clone()));
                let color = assignment
                    .as_ref()
                    .and_then(|id| tree.node(id.as_str()))
                    .map(TreeNode::color);
                let options = assignment
                    .as_ref()
                    .map(|id| {
                        tree.siblings(id.as_str())
                            .into_iter()
                            .filter_map(|sibling| {
                                let name = tree.node(sibling.as_str())?.name().to_string();
                                Some((sibling, name))
                            })
                            .collect()
                    })
                    .unwrap_or_default();
                DataRow {
                    backend_row_id,
                    assignment,
                    color,
                    options,
                    values: row.into_iter().collect(),
                }
            })
            .collect();
        Self {
            node_id: table.node_id.into(),
            rows,
        }
    }

    #[must_use]
    pub fn row(&self, backend_row_id: &str) -> Option<&DataRow> {
        self.rows
            .iter()
            .find(|row| row.backend_row_id == backend_row_id)
    }
}

/// One attribute of the two instances being compared.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryColumn {
    pub attribute: String,
    pub first: Value,
    pub second: Value,
}

/// "Same cluster?" question, attributes ordered by importance.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryView {
    pub node_id: NodeId,
    pub relevant: Vec<QueryColumn>,
    pub other: Vec<QueryColumn>,
}

impl QueryView {
    /// Splits the query into clustering-relevant and other attributes. When
    /// none is relevant every attribute is listed as relevant.
    #[must_use]
    pub fn build(node: &TreeNode, query: &ActiveQuery) -> Self {
        let attributes = node.attributes();
        let order: Vec<usize> = match node.analytics() {
            Some(analytics) if !analytics.importance_order.is_empty() => {
                analytics.importance_order.clone()
            }
            _ => (0..attributes.len()).collect(),
        };
        let (first, second) = &query.query_data;
        let mut relevant = Vec::new();
        let mut other = Vec::new();
        for index in order {
            let Some(attribute) = attributes.get(index) else {
                continue;
            };
            let column = QueryColumn {
                attribute: attribute.clone(),
                first: first.get(index).cloned().unwrap_or(Value::Null),
                second: second.get(index).cloned().unwrap_or(Value::Null),
            };
            if node.is_relevant_for_clustering(index) {
                relevant.push(column);
            } else {
                other.push(column);
            }
        }
        if relevant.is_empty() {
            relevant = std::mem::take(&mut other);
        }
        Self {
            node_id: node.id().clone(),
            relevant,
            other,
        }
    }
}
