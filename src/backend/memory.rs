//! In-process authority for chains and canvas documents.
//!
//! Holds everything behind one lock, so a creation (entity id, node, edge)
//! and a canvas compare-and-swap are each a single critical section.
//! Used by tests, demos, and anywhere a throwaway portal is enough.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{validate_create, validate_save, FlowBackend};
use crate::error::AppError;
use crate::models::{
    generate_ulid, CanvasState, CreateFlowItemRequest, CreatedFlowItem, FlowChain, FlowEdge,
    FlowNode, NodeType, SaveCanvasRequest, SavedCanvas,
};
use crate::reference::encode;

#[derive(Default)]
struct MemoryState {
    chains: HashMap<i64, FlowChain>,
    canvases: HashMap<i64, CanvasState>,
    /// Last entity id handed out per item type.
    sequences: HashMap<NodeType, i64>,
}

impl MemoryState {
    fn next_entity_id(&mut self, node_type: NodeType) -> i64 {
        let sequence = self.sequences.entry(node_type).or_insert(0);
        *sequence += 1;
        *sequence
    }
}

/// Shared in-memory backend. Clones see the same data.
#[derive(Clone, Default)]
pub struct MemoryBackend {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a work request and its root node. Returns the root node.
    ///
    /// Seeding an existing work request returns its current root unchanged.
    pub fn seed_work_request(&self, work_request_id: i64, title: &str) -> FlowNode {
        let mut state = self.state.lock();
        if let Some(root) = state
            .chains
            .get(&work_request_id)
            .and_then(|chain| chain.root())
        {
            return root.clone();
        }

        let root = FlowNode {
            id: generate_ulid(),
            entity_id: work_request_id,
            node_type: NodeType::WorkRequest,
            doc_no: encode(NodeType::WorkRequest.ref_type(), work_request_id),
            title: title.to_string(),
            status: NodeType::WorkRequest.spec().initial_status.to_string(),
            priority: None,
            assignee_name: None,
            version: None,
        };
        state.chains.insert(
            work_request_id,
            FlowChain {
                nodes: vec![root.clone()],
                edges: Vec::new(),
            },
        );
        root
    }

    fn not_found(work_request_id: i64) -> AppError {
        AppError::NotFound(format!("Work request {} has no flow chain", work_request_id))
    }
}

#[async_trait]
impl FlowBackend for MemoryBackend {
    async fn get_flow_chain(&self, work_request_id: i64) -> Result<FlowChain, AppError> {
        self.state
            .lock()
            .chains
            .get(&work_request_id)
            .cloned()
            .ok_or_else(|| Self::not_found(work_request_id))
    }

    async fn create_flow_item(
        &self,
        work_request_id: i64,
        request: &CreateFlowItemRequest,
    ) -> Result<CreatedFlowItem, AppError> {
        let mut state = self.state.lock();
        let chain = state
            .chains
            .get(&work_request_id)
            .ok_or_else(|| Self::not_found(work_request_id))?;
        let parent_node_id = validate_create(chain, request)?.id.clone();

        let entity_id = state.next_entity_id(request.item_type);
        let node_id = generate_ulid();
        let created = CreatedFlowItem {
            node_id: node_id.clone(),
            entity_id,
            node_type: request.item_type,
            doc_no: encode(request.item_type.ref_type(), entity_id),
            title: request.title.trim().to_string(),
            status: request.item_type.spec().initial_status.to_string(),
            edge_id: generate_ulid(),
            edge_source: parent_node_id,
            edge_target: node_id,
        };

        let chain = state
            .chains
            .get_mut(&work_request_id)
            .ok_or_else(|| Self::not_found(work_request_id))?;
        chain.nodes.push(created.node());
        chain.edges.push(FlowEdge {
            id: created.edge_id.clone(),
            source: created.edge_source.clone(),
            target: created.edge_target.clone(),
        });

        Ok(created)
    }

    async fn get_flow_ui(&self, work_request_id: i64) -> Result<CanvasState, AppError> {
        Ok(self
            .state
            .lock()
            .canvases
            .get(&work_request_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn put_flow_ui(
        &self,
        work_request_id: i64,
        request: &SaveCanvasRequest,
    ) -> Result<SavedCanvas, AppError> {
        validate_save(request)?;

        let mut state = self.state.lock();
        let current = state
            .canvases
            .get(&work_request_id)
            .map_or(0, |canvas| canvas.version);
        if current != request.expected_version {
            return Err(AppError::VersionConflict {
                expected: request.expected_version,
                actual: Some(current),
            });
        }

        let version = current + 1;
        state.canvases.insert(
            work_request_id,
            CanvasState::from_layout(version, request.layout.clone()),
        );
        Ok(SavedCanvas { version })
    }
}
