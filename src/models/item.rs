//! Flow-item creation payloads.

use serde::{Deserialize, Serialize};

use super::{FlowEdge, FlowNode, NodeType};

/// Body of `POST /work-requests/{id}/flow-items`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateFlowItemRequest {
    pub parent_type: NodeType,
    /// Entity id of the parent.
    pub parent_id: i64,
    pub item_type: NodeType,
    pub title: String,
}

/// Response of the flow-item creation: the new node and the edge splicing it in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedFlowItem {
    pub node_id: String,
    pub entity_id: i64,
    pub node_type: NodeType,
    pub doc_no: String,
    pub title: String,
    pub status: String,
    pub edge_id: String,
    pub edge_source: String,
    pub edge_target: String,
}

impl CreatedFlowItem {
    pub fn node(&self) -> FlowNode {
        FlowNode {
            id: self.node_id.clone(),
            entity_id: self.entity_id,
            node_type: self.node_type,
            doc_no: self.doc_no.clone(),
            title: self.title.clone(),
            status: self.status.clone(),
            priority: None,
            assignee_name: None,
            version: None,
        }
    }

    pub fn edge(&self) -> FlowEdge {
        FlowEdge {
            id: self.edge_id.clone(),
            source: self.edge_source.clone(),
            target: self.edge_target.clone(),
        }
    }
}
