//! Structural graph models: nodes, edges and the chain rooted at a work request.

use std::collections::{BTreeMap, HashMap, VecDeque};

use serde::{Deserialize, Serialize};

use super::{CreatedFlowItem, NodeType};

/// Horizontal distance between layout columns.
pub const COLUMN_WIDTH: f64 = 280.0;
/// Vertical distance between rows within a column.
pub const ROW_HEIGHT: f64 = 120.0;

/// One business entity placed on the canvas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowNode {
    /// Node identifier, unique within a chain.
    pub id: String,
    /// ID of the backing business record.
    pub entity_id: i64,
    pub node_type: NodeType,
    pub doc_no: String,
    pub title: String,
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee_name: Option<String>,
    /// Deployment version string.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

impl FlowNode {
    /// Detail-page route for the wrapped entity.
    pub fn route(&self) -> String {
        self.node_type.detail_route(self.entity_id)
    }
}

/// A directed structural link between two nodes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowEdge {
    pub id: String,
    pub source: String,
    pub target: String,
}

/// A 2-D canvas coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Position of a layout slot.
    pub fn slot(column: usize, row: usize) -> Self {
        Self::new(column as f64 * COLUMN_WIDTH, row as f64 * ROW_HEIGHT)
    }
}

/// The structural graph rooted at one work request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FlowChain {
    pub nodes: Vec<FlowNode>,
    pub edges: Vec<FlowEdge>,
}

impl FlowChain {
    /// The work-request node. Backends guarantee there is exactly one.
    pub fn root(&self) -> Option<&FlowNode> {
        self.nodes
            .iter()
            .find(|n| n.node_type == NodeType::WorkRequest)
    }

    pub fn node(&self, id: &str) -> Option<&FlowNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// Find the node wrapping a given entity.
    pub fn node_for_entity(&self, node_type: NodeType, entity_id: i64) -> Option<&FlowNode> {
        self.nodes
            .iter()
            .find(|n| n.node_type == node_type && n.entity_id == entity_id)
    }

    /// Direct children of a node, in edge order.
    pub fn children_of(&self, id: &str) -> Vec<&FlowNode> {
        self.edges
            .iter()
            .filter(|e| e.source == id)
            .filter_map(|e| self.node(&e.target))
            .collect()
    }

    /// Merge a freshly created item into the chain.
    ///
    /// Idempotent: re-applying the same response adds nothing. Returns
    /// whether anything changed.
    pub fn apply_created_item(&mut self, item: &CreatedFlowItem) -> bool {
        let mut changed = false;
        if self.node(&item.node_id).is_none() {
            self.nodes.push(item.node());
            changed = true;
        }
        if !self.edges.iter().any(|e| e.id == item.edge_id) {
            self.edges.push(item.edge());
            changed = true;
        }
        changed
    }

    /// Column (BFS depth from the root) of every reachable node.
    pub fn depths(&self) -> HashMap<&str, usize> {
        let mut depths = HashMap::new();
        let Some(root) = self.root() else {
            return depths;
        };

        let mut queue = VecDeque::from([(root.id.as_str(), 0usize)]);
        depths.insert(root.id.as_str(), 0);
        while let Some((id, depth)) = queue.pop_front() {
            for edge in self.edges.iter().filter(|e| e.source == id) {
                if !depths.contains_key(edge.target.as_str()) {
                    depths.insert(edge.target.as_str(), depth + 1);
                    queue.push_back((edge.target.as_str(), depth + 1));
                }
            }
        }
        depths
    }
}

/// Compute a layered left-to-right layout for every node in the chain.
///
/// Column is the BFS depth from the root, row is the order in which nodes
/// appear within that column. Nodes not reachable from the root are stacked
/// in one extra column to the right.
pub fn default_positions(chain: &FlowChain) -> BTreeMap<String, Position> {
    let depths = chain.depths();
    let orphan_column = depths.values().max().map_or(0, |d| d + 1);

    let mut rows: HashMap<usize, usize> = HashMap::new();
    let mut positions = BTreeMap::new();
    for node in &chain.nodes {
        let column = depths.get(node.id.as_str()).copied().unwrap_or(orphan_column);
        let row = rows.entry(column).or_insert(0);
        positions.insert(node.id.clone(), Position::slot(column, *row));
        *row += 1;
    }
    positions
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(id: &str, node_type: NodeType, entity_id: i64) -> FlowNode {
        FlowNode {
            id: id.to_string(),
            entity_id,
            node_type,
            doc_no: format!("{}-{:03}", node_type.ref_type().prefix(), entity_id),
            title: format!("{} {}", node_type.label(), entity_id),
            status: node_type.spec().initial_status.to_string(),
            priority: None,
            assignee_name: None,
            version: None,
        }
    }

    fn edge(source: &str, target: &str) -> FlowEdge {
        FlowEdge {
            id: format!("{}->{}", source, target),
            source: source.to_string(),
            target: target.to_string(),
        }
    }

    fn sample_chain() -> FlowChain {
        FlowChain {
            nodes: vec![
                node("wr", NodeType::WorkRequest, 51),
                node("tk1", NodeType::TechTask, 1),
                node("tk2", NodeType::TechTask, 2),
                node("ts1", NodeType::TestScenario, 1),
            ],
            edges: vec![edge("wr", "tk1"), edge("wr", "tk2"), edge("tk1", "ts1")],
        }
    }

    #[test]
    fn test_node_json_is_camel_case() {
        let json = serde_json::to_value(node("wr", NodeType::WorkRequest, 51)).unwrap();
        assert_eq!(json["entityId"], 51);
        assert_eq!(json["nodeType"], "WORK_REQUEST");
        assert_eq!(json["docNo"], "WR-051");
        assert!(json.get("assigneeName").is_none());
    }

    #[test]
    fn test_root_and_children() {
        let chain = sample_chain();
        assert_eq!(chain.root().unwrap().id, "wr");
        let children: Vec<String> = chain
            .children_of("wr")
            .into_iter()
            .map(|n| n.id.clone())
            .collect();
        assert_eq!(children, vec!["tk1", "tk2"]);
        assert!(chain.children_of("ts1").is_empty());
    }

    #[test]
    fn test_default_positions_are_layered() {
        let positions = default_positions(&sample_chain());
        assert_eq!(positions["wr"], Position::slot(0, 0));
        assert_eq!(positions["tk1"], Position::slot(1, 0));
        assert_eq!(positions["tk2"], Position::slot(1, 1));
        assert_eq!(positions["ts1"], Position::slot(2, 0));
    }

    #[test]
    fn test_default_positions_place_orphans_last() {
        let mut chain = sample_chain();
        chain.nodes.push(node("dp1", NodeType::Deployment, 1));
        let positions = default_positions(&chain);
        assert_eq!(positions["dp1"], Position::slot(3, 0));
    }

    #[test]
    fn test_apply_created_item_is_idempotent() {
        let mut chain = sample_chain();
        let item = CreatedFlowItem {
            node_id: "tk3".to_string(),
            entity_id: 3,
            node_type: NodeType::TechTask,
            doc_no: "TK-003".to_string(),
            title: "Refactor auth".to_string(),
            status: "TODO".to_string(),
            edge_id: "e-tk3".to_string(),
            edge_source: "wr".to_string(),
            edge_target: "tk3".to_string(),
        };

        assert!(chain.apply_created_item(&item));
        assert!(!chain.apply_created_item(&item));
        assert_eq!(chain.nodes.len(), 5);
        assert_eq!(chain.edges.len(), 4);
        assert_eq!(chain.children_of("wr").len(), 3);
    }
}
