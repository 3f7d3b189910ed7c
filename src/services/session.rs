//! Canvas session: one open chain with its layout overlay.
//!
//! The session holds the loaded chain, the last saved canvas document, the
//! drafts on screen and the layout edits not yet persisted. Edits are
//! batched: dragging only updates the view, a finished drag records one
//! pending edit, and [`CanvasSession::flush`] writes all pending edits in a
//! single save.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};

use serde::Serialize;
use tracing::{debug, info};

use super::canvas::CanvasStore;
use super::chain::ChainService;
use super::creation::AddItemModal;
use super::draft::{CommittedDraft, DraftCommitOutcome, DraftController};
use crate::context::{AppBackend, Context};
use crate::di::FromRef;
use crate::error::AppError;
use crate::models::{
    default_positions, generate_ulid, CanvasLayout, CanvasState, CreatedFlowItem, FlowChain,
    FlowEdge, FlowNode, NodeType, Position,
};

/// A layout change waiting to be saved.
#[derive(Debug, Clone, PartialEq)]
pub enum LayoutEdit {
    Move { node_id: String, position: Position },
    AddCustomNode { node: FlowNode, position: Position },
    RemoveCustomNode(String),
    Connect(FlowEdge),
    Disconnect(String),
}

impl LayoutEdit {
    fn apply(&self, layout: &mut CanvasLayout) {
        match self {
            LayoutEdit::Move { node_id, position } => {
                layout.positions.insert(node_id.clone(), *position);
            }
            LayoutEdit::AddCustomNode { node, position } => {
                layout.custom_nodes.retain(|n| n.id != node.id);
                layout.custom_nodes.push(node.clone());
                layout.positions.insert(node.id.clone(), *position);
            }
            LayoutEdit::RemoveCustomNode(id) => layout.strip_nodes([id.as_str()]),
            LayoutEdit::Connect(edge) => {
                if !layout.edges.iter().any(|e| e.id == edge.id) {
                    layout.edges.push(edge.clone());
                }
            }
            LayoutEdit::Disconnect(edge_id) => layout.edges.retain(|e| &e.id != edge_id),
        }
    }
}

/// Where a rendered node comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NodeOrigin {
    Chain,
    Custom,
    Draft,
}

/// A node as drawn on the canvas.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderedNode {
    pub id: String,
    pub node_type: NodeType,
    pub label: &'static str,
    pub accent: &'static str,
    pub icon: &'static str,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doc_no: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub route: Option<String>,
    pub position: Position,
    pub origin: NodeOrigin,
    pub is_draft: bool,
    pub is_saving_draft: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub draft_error: Option<String>,
    pub has_outgoing_handle: bool,
}

impl RenderedNode {
    fn from_node(node: &FlowNode, origin: NodeOrigin, position: Position) -> Self {
        let has_outgoing_handle =
            origin == NodeOrigin::Chain && node.node_type.can_have_children();
        let spec = node.node_type.spec();
        Self {
            id: node.id.clone(),
            node_type: node.node_type,
            label: spec.label,
            accent: spec.accent,
            icon: spec.icon,
            title: node.title.clone(),
            doc_no: Some(node.doc_no.clone()),
            status: Some(node.status.clone()),
            route: Some(node.route()),
            position,
            origin,
            is_draft: false,
            is_saving_draft: false,
            draft_error: None,
            has_outgoing_handle,
        }
    }
}

/// An open canvas for one work request.
pub struct CanvasSession {
    work_request_id: i64,
    backend: AppBackend,
    chain: FlowChain,
    saved: CanvasState,
    store: CanvasStore,
    drafts: DraftController,
    pending: Vec<LayoutEdit>,
    dragging: HashMap<String, Position>,
    flush_on_drag_end: bool,
}

impl CanvasSession {
    /// Load the chain and its canvas document.
    pub async fn open(ctx: &Context, work_request_id: i64) -> Result<Self, AppError> {
        let backend = AppBackend::from_ref(ctx);
        let store = CanvasStore::from_ref(ctx);
        let chain = ChainService::from_ref(ctx).load_chain(work_request_id).await?;
        let saved = store.load(work_request_id).await?;

        Ok(Self {
            work_request_id,
            drafts: DraftController::new(backend.clone(), work_request_id),
            backend,
            chain,
            saved,
            store,
            pending: Vec::new(),
            dragging: HashMap::new(),
            flush_on_drag_end: ctx.config.canvas.flush_on_drag_end,
        })
    }

    pub fn work_request_id(&self) -> i64 {
        self.work_request_id
    }

    pub fn chain(&self) -> &FlowChain {
        &self.chain
    }

    /// The canvas document as last loaded or saved.
    pub fn saved(&self) -> &CanvasState {
        &self.saved
    }

    pub fn drafts(&self) -> &DraftController {
        &self.drafts
    }

    pub fn pending(&self) -> &[LayoutEdit] {
        &self.pending
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// A fresh "add item" dialog bound to this chain.
    pub fn add_item_modal(&self) -> AddItemModal {
        AddItemModal::new(self.backend.clone(), self.work_request_id)
    }

    /// The saved document with pending edits applied.
    pub fn layout(&self) -> CanvasLayout {
        compose(self.saved.layout(), &self.pending)
    }

    fn custom_node(&self, layout: &CanvasLayout, id: &str) -> Option<FlowNode> {
        layout.custom_nodes.iter().find(|n| n.id == id).cloned()
    }

    /// Every node to draw, with its resolved position.
    ///
    /// Position precedence: in-progress drag, saved or pending layout, the
    /// draft's own slot, the computed default. Custom nodes without a
    /// position are stacked in a column right of the chain.
    pub fn rendered_nodes(&self) -> Vec<RenderedNode> {
        let layout = self.layout();
        let defaults = default_positions(&self.chain);
        let resolve = |id: &str| {
            self.dragging
                .get(id)
                .or_else(|| layout.positions.get(id))
                .copied()
        };

        let mut rendered: Vec<RenderedNode> = self
            .chain
            .nodes
            .iter()
            .map(|node| {
                let position = resolve(&node.id)
                    .or_else(|| defaults.get(&node.id).copied())
                    .unwrap_or_default();
                RenderedNode::from_node(node, NodeOrigin::Chain, position)
            })
            .collect();

        let annotation_column = self.chain.depths().values().max().map_or(1, |d| d + 2);
        for (row, node) in layout.custom_nodes.iter().enumerate() {
            let position = resolve(&node.id)
                .unwrap_or_else(|| Position::slot(annotation_column, row));
            rendered.push(RenderedNode::from_node(node, NodeOrigin::Custom, position));
        }

        for draft in self.drafts.drafts() {
            let spec = draft.node_type.spec();
            rendered.push(RenderedNode {
                position: resolve(&draft.id).unwrap_or(draft.position),
                id: draft.id,
                node_type: draft.node_type,
                label: spec.label,
                accent: spec.accent,
                icon: spec.icon,
                title: draft.title,
                doc_no: None,
                status: None,
                route: None,
                origin: NodeOrigin::Draft,
                is_draft: true,
                is_saving_draft: draft.is_saving_draft,
                draft_error: draft.draft_error,
                has_outgoing_handle: false,
            });
        }
        rendered
    }

    /// Structural edges, decorative edges and draft connectors.
    pub fn rendered_edges(&self) -> Vec<FlowEdge> {
        let mut edges = merge_edges(&self.chain.edges, self.layout().edges);
        for draft in self.drafts.drafts() {
            edges.push(FlowEdge {
                id: format!("draft-{}", draft.id),
                source: draft.parent.node_id,
                target: draft.id,
            });
        }
        edges
    }

    /// Update the view while a node is dragged. Nothing is recorded.
    pub fn drag_move(&mut self, node_id: &str, position: Position) {
        self.dragging.insert(node_id.to_string(), position);
    }

    /// Finish a drag and record the final position.
    ///
    /// Drafts only move locally. With `canvas.flush_on_drag_end` set the
    /// pending edits are saved immediately.
    pub async fn drag_end(&mut self, node_id: &str, position: Position) -> Result<(), AppError> {
        self.dragging.remove(node_id);
        if self.drafts.set_position(node_id, position) {
            return Ok(());
        }
        if !self.is_known_node(node_id) {
            return Err(AppError::NotFound(format!("Node {} is not on this canvas", node_id)));
        }

        debug!(node_id, x = position.x, y = position.y, "Recorded node move");
        self.pending.push(LayoutEdit::Move {
            node_id: node_id.to_string(),
            position,
        });
        if self.flush_on_drag_end {
            self.flush().await?;
        }
        Ok(())
    }

    fn is_known_node(&self, id: &str) -> bool {
        self.chain.node(id).is_some() || self.custom_node(&self.layout(), id).is_some()
    }

    /// Place an annotation node. Structural types are rejected.
    pub fn add_custom_node(&mut self, node: FlowNode, position: Position) -> Result<(), AppError> {
        if !node.node_type.is_annotation() {
            return Err(AppError::Validation(format!(
                "{} nodes belong to the chain and cannot be added to the canvas",
                node.node_type
            )));
        }
        if self.chain.node(&node.id).is_some() {
            return Err(AppError::Validation(format!(
                "Node {} is already part of the chain",
                node.id
            )));
        }
        self.pending.push(LayoutEdit::AddCustomNode { node, position });
        Ok(())
    }

    pub fn remove_custom_node(&mut self, id: &str) -> Result<(), AppError> {
        if self.custom_node(&self.layout(), id).is_none() {
            return Err(AppError::NotFound(format!("Custom node {}", id)));
        }
        self.pending.push(LayoutEdit::RemoveCustomNode(id.to_string()));
        Ok(())
    }

    /// Draw a decorative edge. The source must have an outgoing handle.
    ///
    /// Self-loops, a second edge between the same pair and edges that would
    /// close a cycle are rejected.
    pub fn connect(&mut self, source: &str, target: &str) -> Result<String, AppError> {
        let source_node = self
            .chain
            .node(source)
            .ok_or_else(|| AppError::NotFound(format!("Node {} has no outgoing handle", source)))?;
        if !source_node.node_type.can_have_children() {
            return Err(AppError::InvalidParent {
                node_type: source_node.node_type.to_string(),
            });
        }
        if !self.is_known_node(target) && !self.drafts.contains(target) {
            return Err(AppError::NotFound(format!("Node {}", target)));
        }
        if source == target {
            return Err(AppError::Validation(format!(
                "Node {} cannot connect to itself",
                source
            )));
        }

        let edges = merge_edges(&self.chain.edges, self.layout().edges);
        if edges.iter().any(|e| e.source == source && e.target == target) {
            return Err(AppError::Validation(format!(
                "{} is already connected to {}",
                source, target
            )));
        }
        if reaches(&edges, target, source) {
            return Err(AppError::Validation(format!(
                "Connecting {} to {} would create a cycle",
                source, target
            )));
        }

        let edge = FlowEdge {
            id: generate_ulid(),
            source: source.to_string(),
            target: target.to_string(),
        };
        let id = edge.id.clone();
        self.pending.push(LayoutEdit::Connect(edge));
        Ok(id)
    }

    /// Remove a decorative edge. Structural edges cannot be removed.
    pub fn disconnect(&mut self, edge_id: &str) -> Result<(), AppError> {
        if self.chain.edges.iter().any(|e| e.id == edge_id) {
            return Err(AppError::Validation(format!(
                "Edge {} is structural",
                edge_id
            )));
        }
        if !self.layout().edges.iter().any(|e| e.id == edge_id) {
            return Err(AppError::NotFound(format!("Edge {}", edge_id)));
        }
        self.pending.push(LayoutEdit::Disconnect(edge_id.to_string()));
        Ok(())
    }

    /// Spawn a draft under a chain node in the next free slot of its child column.
    pub fn spawn_draft(&self, parent_id: &str, node_type: NodeType) -> Result<String, AppError> {
        let parent = self
            .chain
            .node(parent_id)
            .ok_or_else(|| AppError::NotFound(format!("Node {}", parent_id)))?;

        let column = self
            .chain
            .depths()
            .get(parent_id)
            .map_or(1, |d| d + 1);
        let occupied = self
            .rendered_nodes()
            .iter()
            .filter(|n| (n.position.x - Position::slot(column, 0).x).abs() < f64::EPSILON)
            .count();

        self.drafts
            .spawn(parent, node_type, Position::slot(column, occupied))
    }

    /// Commit a draft and splice the result into the chain.
    pub async fn commit_draft(&mut self, draft_id: &str) -> DraftCommitOutcome {
        let outcome = self.drafts.on_draft_title_commit(draft_id).await;
        if let DraftCommitOutcome::Committed(committed) = &outcome {
            self.apply_committed_draft(committed);
        }
        outcome
    }

    /// Put the real node in the draft's slot and add its edge.
    pub fn apply_committed_draft(&mut self, committed: &CommittedDraft) {
        self.chain.apply_created_item(&committed.item);
        self.pending.push(LayoutEdit::Move {
            node_id: committed.node.id.clone(),
            position: committed.position,
        });
    }

    /// Merge an item created through the add-item dialog.
    pub fn apply_created_item(&mut self, item: &CreatedFlowItem) -> bool {
        self.chain.apply_created_item(item)
    }

    /// The document a save would write: structural and decorative edges,
    /// with every draft id removed.
    pub fn save_payload(&self) -> CanvasLayout {
        let draft_ids = self.drafts.ids();
        payload(self.layout(), &self.chain.edges, &draft_ids)
    }

    /// Save all pending edits at once.
    ///
    /// Returns the new version, or `None` when nothing was pending. On a
    /// version conflict the authoritative document is reloaded and the
    /// pending edits are re-applied on top of it once.
    pub async fn flush(&mut self) -> Result<Option<i64>, AppError> {
        if self.pending.is_empty() {
            return Ok(None);
        }

        let layout = self.save_payload();
        let saved = match self.store.save(self.work_request_id, layout.clone()).await {
            Ok(version) => CanvasState::from_layout(version, layout),
            Err(err) if err.is_version_conflict() => {
                let edits = self.pending.clone();
                let chain_edges = self.chain.edges.clone();
                let draft_ids = self.drafts.ids();
                self.store
                    .reload_and_reapply(self.work_request_id, move |fresh| {
                        payload(compose(fresh.layout(), &edits), &chain_edges, &draft_ids)
                    })
                    .await?
            }
            Err(err) => return Err(err),
        };

        info!(
            work_request_id = self.work_request_id,
            edits = self.pending.len(),
            version = saved.version,
            "Flushed canvas edits"
        );
        self.pending.clear();
        self.saved = saved;
        Ok(Some(self.saved.version))
    }
}

fn compose(mut layout: CanvasLayout, edits: &[LayoutEdit]) -> CanvasLayout {
    for edit in edits {
        edit.apply(&mut layout);
    }
    layout
}

fn merge_edges(structural: &[FlowEdge], decorative: Vec<FlowEdge>) -> Vec<FlowEdge> {
    let mut seen: HashSet<String> = structural.iter().map(|e| e.id.clone()).collect();
    let mut edges = structural.to_vec();
    edges.extend(decorative.into_iter().filter(|e| seen.insert(e.id.clone())));
    edges
}

/// Whether `to` is reachable from `from` along `edges`.
fn reaches(edges: &[FlowEdge], from: &str, to: &str) -> bool {
    let mut seen = HashSet::from([from]);
    let mut queue = VecDeque::from([from]);
    while let Some(id) = queue.pop_front() {
        if id == to {
            return true;
        }
        for edge in edges.iter().filter(|e| e.source == id) {
            if seen.insert(edge.target.as_str()) {
                queue.push_back(edge.target.as_str());
            }
        }
    }
    false
}

fn payload(layout: CanvasLayout, structural: &[FlowEdge], draft_ids: &[String]) -> CanvasLayout {
    let mut layout = CanvasLayout {
        edges: merge_edges(structural, layout.edges),
        ..layout
    };
    layout.strip_nodes(draft_ids.iter().map(String::as_str));
    layout
}

/// Positions keyed by node id, for display.
pub fn positions_by_id(nodes: &[RenderedNode]) -> BTreeMap<String, Position> {
    nodes.iter().map(|n| (n.id.clone(), n.position)).collect()
}
