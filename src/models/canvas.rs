//! Canvas state: the versioned human layout overlay for one chain.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{FlowEdge, FlowNode, Position};

/// The persisted layout document for one root work request.
///
/// `version` is assigned by the server and acts as the optimistic
/// concurrency token. A work request that was never saved reports the
/// baseline document at version 0.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanvasState {
    pub version: i64,
    #[serde(default)]
    pub positions: BTreeMap<String, Position>,
    #[serde(default)]
    pub edges: Vec<FlowEdge>,
    #[serde(default)]
    pub custom_nodes: Vec<FlowNode>,
}

impl CanvasState {
    /// The document body without its version.
    pub fn layout(&self) -> CanvasLayout {
        CanvasLayout {
            positions: self.positions.clone(),
            edges: self.edges.clone(),
            custom_nodes: self.custom_nodes.clone(),
        }
    }

    /// Build the state a successful save produced.
    pub fn from_layout(version: i64, layout: CanvasLayout) -> Self {
        Self {
            version,
            positions: layout.positions,
            edges: layout.edges,
            custom_nodes: layout.custom_nodes,
        }
    }
}

/// Layout content as written by a client. Always replaced as a whole.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanvasLayout {
    #[serde(default)]
    pub positions: BTreeMap<String, Position>,
    #[serde(default)]
    pub edges: Vec<FlowEdge>,
    #[serde(default)]
    pub custom_nodes: Vec<FlowNode>,
}

impl CanvasLayout {
    /// Drop every position and edge that mentions one of `ids`.
    pub fn strip_nodes<'a>(&mut self, ids: impl IntoIterator<Item = &'a str>) {
        for id in ids {
            self.positions.remove(id);
            self.edges.retain(|e| e.source != id && e.target != id);
            self.custom_nodes.retain(|n| n.id != id);
        }
    }
}

/// Body of `PUT /work-requests/{id}/flow-ui`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveCanvasRequest {
    /// The version this client last observed.
    pub expected_version: i64,
    #[serde(flatten)]
    pub layout: CanvasLayout,
}

/// Result of an accepted canvas save.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedCanvas {
    /// The version the server assigned to the new document.
    pub version: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_baseline_parses_from_sparse_json() {
        let state: CanvasState = serde_json::from_str(r#"{"version": 0}"#).unwrap();
        assert_eq!(state, CanvasState::default());
    }

    #[test]
    fn test_save_request_wire_shape() {
        let mut layout = CanvasLayout::default();
        layout
            .positions
            .insert("n1".to_string(), Position::new(10.0, 20.0));
        let request = SaveCanvasRequest {
            expected_version: 3,
            layout,
        };

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["expectedVersion"], 3);
        assert_eq!(json["positions"]["n1"]["x"], 10.0);
        assert!(json["edges"].as_array().unwrap().is_empty());
        assert!(json["customNodes"].as_array().unwrap().is_empty());
    }

    #[test]
    fn test_strip_nodes_removes_every_mention() {
        let mut layout = CanvasLayout::default();
        layout.positions.insert("keep".to_string(), Position::default());
        layout.positions.insert("draft".to_string(), Position::default());
        layout.edges.push(FlowEdge {
            id: "e1".to_string(),
            source: "keep".to_string(),
            target: "draft".to_string(),
        });

        layout.strip_nodes(["draft"]);

        assert!(layout.positions.contains_key("keep"));
        assert!(!layout.positions.contains_key("draft"));
        assert!(layout.edges.is_empty());
    }
}
