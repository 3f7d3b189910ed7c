//! Node-type registry.
//!
//! The six node types are a closed set. Everything that varies per type
//! (label, styling, detail route, child eligibility) lives in one static
//! table indexed by the enum, so adding a type is a compile error until
//! every column is filled in.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::reference::RefType;

/// The kind of business entity a node wraps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NodeType {
    WorkRequest,
    TechTask,
    TestScenario,
    Deployment,
    Defect,
    KnowledgeBase,
}

/// Static rendering and structural metadata for a node type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeTypeSpec {
    /// Wire name (`WORK_REQUEST`, ...).
    pub name: &'static str,
    /// Human-readable label.
    pub label: &'static str,
    /// Border/accent color used by the canvas renderer.
    pub accent: &'static str,
    /// Icon identifier.
    pub icon: &'static str,
    /// Detail-page route prefix; the entity id is appended.
    pub route_base: &'static str,
    /// Status assigned when an item of this type is created from the canvas.
    pub initial_status: &'static str,
    /// Whether nodes of this type expose an outgoing connection point.
    pub can_have_children: bool,
    /// Annotation-only types live in the canvas custom-node list, not the chain.
    pub annotation: bool,
}

const CHILD_TYPES: &[NodeType] = &[
    NodeType::TechTask,
    NodeType::TestScenario,
    NodeType::Deployment,
];

static REGISTRY: [NodeTypeSpec; 6] = [
    NodeTypeSpec {
        name: "WORK_REQUEST",
        label: "Work Request",
        accent: "#2563eb",
        icon: "clipboard-list",
        route_base: "/work-requests",
        initial_status: "REQUESTED",
        can_have_children: true,
        annotation: false,
    },
    NodeTypeSpec {
        name: "TECH_TASK",
        label: "Tech Task",
        accent: "#7c3aed",
        icon: "code",
        route_base: "/tech-tasks",
        initial_status: "TODO",
        can_have_children: true,
        annotation: false,
    },
    NodeTypeSpec {
        name: "TEST_SCENARIO",
        label: "Test Scenario",
        accent: "#059669",
        icon: "flask-conical",
        route_base: "/test-scenarios",
        initial_status: "DRAFT",
        can_have_children: false,
        annotation: false,
    },
    NodeTypeSpec {
        name: "DEPLOYMENT",
        label: "Deployment",
        accent: "#ea580c",
        icon: "rocket",
        route_base: "/deployments",
        initial_status: "PLANNED",
        can_have_children: false,
        annotation: false,
    },
    NodeTypeSpec {
        name: "DEFECT",
        label: "Defect",
        accent: "#dc2626",
        icon: "bug",
        route_base: "/defects",
        initial_status: "OPEN",
        can_have_children: false,
        annotation: true,
    },
    NodeTypeSpec {
        name: "KNOWLEDGE_BASE",
        label: "Knowledge Base",
        accent: "#0891b2",
        icon: "book-open",
        route_base: "/knowledge-base",
        initial_status: "PUBLISHED",
        can_have_children: false,
        annotation: true,
    },
];

impl NodeType {
    pub const ALL: [NodeType; 6] = [
        NodeType::WorkRequest,
        NodeType::TechTask,
        NodeType::TestScenario,
        NodeType::Deployment,
        NodeType::Defect,
        NodeType::KnowledgeBase,
    ];

    /// Registry entry for this type.
    pub fn spec(self) -> &'static NodeTypeSpec {
        &REGISTRY[self as usize]
    }

    pub fn as_str(self) -> &'static str {
        self.spec().name
    }

    pub fn label(self) -> &'static str {
        self.spec().label
    }

    pub fn can_have_children(self) -> bool {
        self.spec().can_have_children
    }

    pub fn is_annotation(self) -> bool {
        self.spec().annotation
    }

    /// Item types that may be created under a node of this type.
    ///
    /// Annotation types are never offered: they are placed on the canvas
    /// through the custom-node path only.
    pub fn allowed_child_types(self) -> &'static [NodeType] {
        if self.can_have_children() {
            CHILD_TYPES
        } else {
            &[]
        }
    }

    /// The document-number family this node type belongs to.
    pub fn ref_type(self) -> RefType {
        match self {
            NodeType::WorkRequest => RefType::WorkRequest,
            NodeType::TechTask => RefType::TechTask,
            NodeType::TestScenario => RefType::TestScenario,
            NodeType::Deployment => RefType::Deployment,
            NodeType::Defect => RefType::Defect,
            NodeType::KnowledgeBase => RefType::KnowledgeBase,
        }
    }

    /// Detail-page path for an entity of this type.
    pub fn detail_route(self, entity_id: i64) -> String {
        format!("{}/{}", self.spec().route_base, entity_id)
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NodeType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        NodeType::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| AppError::Validation(format!("Unknown node type: {}", s)))
    }
}

/// Detail-page path for a node type given by its wire name.
///
/// Total: unknown names resolve to `/`.
pub fn route_for(node_type: &str, entity_id: i64) -> String {
    node_type
        .parse::<NodeType>()
        .map(|t| t.detail_route(entity_id))
        .unwrap_or_else(|_| "/".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_matches_variant_order() {
        for node_type in NodeType::ALL {
            let json = serde_json::to_string(&node_type).unwrap();
            assert_eq!(json, format!("\"{}\"", node_type.spec().name));
        }
    }

    #[test]
    fn test_child_eligibility() {
        assert!(NodeType::WorkRequest.can_have_children());
        assert!(NodeType::TechTask.can_have_children());
        for leaf in [
            NodeType::TestScenario,
            NodeType::Deployment,
            NodeType::Defect,
            NodeType::KnowledgeBase,
        ] {
            assert!(!leaf.can_have_children());
            assert!(leaf.allowed_child_types().is_empty());
        }
    }

    #[test]
    fn test_allowed_child_types_exclude_annotations() {
        let allowed = NodeType::WorkRequest.allowed_child_types();
        assert_eq!(allowed, NodeType::TechTask.allowed_child_types());
        assert_eq!(allowed[0], NodeType::TechTask);
        assert!(allowed.iter().all(|t| !t.is_annotation()));
    }

    #[test]
    fn test_detail_routes() {
        assert_eq!(NodeType::WorkRequest.detail_route(51), "/work-requests/51");
        assert_eq!(NodeType::TechTask.detail_route(7), "/tech-tasks/7");
        assert_eq!(NodeType::TestScenario.detail_route(7), "/test-scenarios/7");
        assert_eq!(NodeType::Deployment.detail_route(7), "/deployments/7");
        assert_eq!(NodeType::Defect.detail_route(7), "/defects/7");
        assert_eq!(NodeType::KnowledgeBase.detail_route(7), "/knowledge-base/7");
    }

    #[test]
    fn test_route_for_unknown_type_is_root() {
        assert_eq!(route_for("TECH_TASK", 3), "/tech-tasks/3");
        assert_eq!(route_for("meeting_note", 3), "/");
        assert_eq!(route_for("", 3), "/");
    }

    #[test]
    fn test_parse_node_type() {
        assert_eq!("tech_task".parse::<NodeType>().unwrap(), NodeType::TechTask);
        assert!("TASK".parse::<NodeType>().is_err());
    }
}
