//! Inline draft nodes.
//!
//! A draft is a placeholder spawned on the canvas next to its parent. It is
//! client-only and keyed by a ULID so it can never collide with a server
//! node id. Committing a draft runs the same creation call as the add-item
//! dialog; on success the draft is replaced by the real node in the same
//! slot.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use super::creation::{ParentRef, TITLE_REQUIRED};
use crate::context::AppBackend;
use crate::error::AppError;
use crate::models::{generate_ulid, CreatedFlowItem, FlowEdge, FlowNode, NodeType, Position};

/// A local, unsaved node.
#[derive(Debug, Clone, PartialEq)]
pub struct DraftNode {
    pub id: String,
    pub parent: ParentRef,
    pub node_type: NodeType,
    pub title: String,
    /// Slot the draft occupies. The committed node inherits it.
    pub position: Position,
    pub is_saving_draft: bool,
    pub draft_error: Option<String>,
}

/// A draft that the backend accepted.
#[derive(Debug, Clone, PartialEq)]
pub struct CommittedDraft {
    pub draft_id: String,
    pub node: FlowNode,
    pub edge: FlowEdge,
    pub position: Position,
    pub item: CreatedFlowItem,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DraftCommitOutcome {
    Committed(CommittedDraft),
    /// Blank title. No request was sent.
    Invalid(String),
    /// The request failed; the draft stays editable.
    Failed(String),
    /// A commit for this draft is already running.
    InFlight,
    /// No draft with this id.
    Unknown,
}

/// Owns the drafts of one chain.
#[derive(Clone)]
pub struct DraftController {
    backend: AppBackend,
    work_request_id: i64,
    drafts: Arc<Mutex<BTreeMap<String, DraftNode>>>,
}

impl DraftController {
    pub fn new(backend: AppBackend, work_request_id: i64) -> Self {
        Self {
            backend,
            work_request_id,
            drafts: Arc::new(Mutex::new(BTreeMap::new())),
        }
    }

    /// Place a new draft under `parent` at `position`. Returns its id.
    pub fn spawn(
        &self,
        parent: &FlowNode,
        node_type: NodeType,
        position: Position,
    ) -> Result<String, AppError> {
        let parent = ParentRef::of(parent)?;
        if !parent.node_type.allowed_child_types().contains(&node_type) {
            return Err(AppError::Validation(format!(
                "{} cannot be added under {}",
                node_type, parent.node_type
            )));
        }

        let id = generate_ulid();
        debug!(draft_id = %id, parent = %parent.node_id, "Spawned draft node");
        self.drafts.lock().insert(
            id.clone(),
            DraftNode {
                id: id.clone(),
                parent,
                node_type,
                title: String::new(),
                position,
                is_saving_draft: false,
                draft_error: None,
            },
        );
        Ok(id)
    }

    pub fn drafts(&self) -> Vec<DraftNode> {
        self.drafts.lock().values().cloned().collect()
    }

    pub fn get(&self, id: &str) -> Option<DraftNode> {
        self.drafts.lock().get(id).cloned()
    }

    pub fn ids(&self) -> Vec<String> {
        self.drafts.lock().keys().cloned().collect()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.drafts.lock().contains_key(id)
    }

    /// Move a draft. Drafts are never persisted, so this stays local.
    pub fn set_position(&self, id: &str, position: Position) -> bool {
        match self.drafts.lock().get_mut(id) {
            Some(draft) => {
                draft.position = position;
                true
            }
            None => false,
        }
    }

    pub fn on_draft_title_change(&self, id: &str, value: &str) {
        if let Some(draft) = self.drafts.lock().get_mut(id) {
            if !draft.is_saving_draft {
                draft.title = value.to_string();
            }
        }
    }

    /// Discard a draft. A draft whose commit is in flight is kept.
    pub fn remove(&self, id: &str) -> bool {
        let mut drafts = self.drafts.lock();
        match drafts.get(id) {
            Some(draft) if draft.is_saving_draft => false,
            Some(_) => drafts.remove(id).is_some(),
            None => false,
        }
    }

    /// Persist a draft through the creation call.
    pub async fn on_draft_title_commit(&self, id: &str) -> DraftCommitOutcome {
        let request = {
            let mut drafts = self.drafts.lock();
            let Some(draft) = drafts.get_mut(id) else {
                return DraftCommitOutcome::Unknown;
            };
            if draft.is_saving_draft {
                return DraftCommitOutcome::InFlight;
            }
            if draft.title.trim().is_empty() {
                draft.draft_error = Some(TITLE_REQUIRED.to_string());
                return DraftCommitOutcome::Invalid(TITLE_REQUIRED.to_string());
            }
            draft.is_saving_draft = true;
            draft.draft_error = None;
            draft.parent.create_request(draft.node_type, &draft.title)
        };

        let result = self
            .backend
            .create_flow_item(self.work_request_id, &request)
            .await;

        let mut drafts = self.drafts.lock();
        match result {
            Ok(item) => {
                let position = drafts
                    .remove(id)
                    .map(|d| d.position)
                    .unwrap_or_default();
                info!(
                    work_request_id = self.work_request_id,
                    draft_id = id,
                    node_id = %item.node_id,
                    "Committed draft node"
                );
                DraftCommitOutcome::Committed(CommittedDraft {
                    draft_id: id.to_string(),
                    node: item.node(),
                    edge: item.edge(),
                    position,
                    item,
                })
            }
            Err(err) => {
                let message = err.user_message();
                warn!(
                    work_request_id = self.work_request_id,
                    draft_id = id,
                    "Draft commit failed: {}",
                    err
                );
                if let Some(draft) = drafts.get_mut(id) {
                    draft.is_saving_draft = false;
                    draft.draft_error = Some(message.clone());
                }
                DraftCommitOutcome::Failed(message)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::testing::GatedBackend;
    use crate::backend::{FlowBackend, MemoryBackend};
    use crate::error::GENERIC_CREATE_FAILURE;

    fn setup(backend: GatedBackend) -> (DraftController, FlowNode, GatedBackend) {
        let root = backend.inner.seed_work_request(51, "Login revamp");
        let drafts = DraftController::new(Arc::new(backend.clone()), 51);
        (drafts, root, backend)
    }

    #[tokio::test]
    async fn test_spawn_uses_unique_ids() {
        let (drafts, root, _) = setup(GatedBackend::new(MemoryBackend::new()));
        let a = drafts
            .spawn(&root, NodeType::TechTask, Position::slot(1, 0))
            .unwrap();
        let b = drafts
            .spawn(&root, NodeType::TechTask, Position::slot(1, 1))
            .unwrap();
        assert_ne!(a, b);
        assert_eq!(drafts.drafts().len(), 2);
        assert!(drafts
            .spawn(&root, NodeType::KnowledgeBase, Position::default())
            .is_err());
    }

    #[tokio::test]
    async fn test_empty_title_sets_error_without_request() {
        let (drafts, root, backend) = setup(GatedBackend::new(MemoryBackend::new()));
        let id = drafts
            .spawn(&root, NodeType::TechTask, Position::default())
            .unwrap();
        drafts.on_draft_title_change(&id, "  ");

        assert_eq!(
            drafts.on_draft_title_commit(&id).await,
            DraftCommitOutcome::Invalid(TITLE_REQUIRED.to_string())
        );
        assert_eq!(backend.create_calls(), 0);

        let draft = drafts.get(&id).unwrap();
        assert!(!draft.is_saving_draft);
        assert_eq!(draft.draft_error.as_deref(), Some(TITLE_REQUIRED));
    }

    #[tokio::test]
    async fn test_commit_replaces_draft_in_same_slot() {
        let (drafts, root, backend) = setup(GatedBackend::new(MemoryBackend::new()));
        let slot = Position::slot(1, 2);
        let id = drafts.spawn(&root, NodeType::Deployment, slot).unwrap();
        drafts.on_draft_title_change(&id, "Release 1.4");

        let DraftCommitOutcome::Committed(committed) = drafts.on_draft_title_commit(&id).await
        else {
            panic!("expected commit");
        };
        assert_eq!(committed.draft_id, id);
        assert_eq!(committed.position, slot);
        assert_eq!(committed.node.node_type, NodeType::Deployment);
        assert_eq!(committed.edge.source, root.id);
        assert!(!drafts.contains(&id));

        let chain = backend.get_flow_chain(51).await.unwrap();
        assert!(chain.node(&committed.node.id).is_some());
    }

    #[tokio::test]
    async fn test_second_commit_while_saving_sends_nothing() {
        let (drafts, root, backend) = setup(GatedBackend::gated(MemoryBackend::new()));
        let id = drafts
            .spawn(&root, NodeType::TechTask, Position::default())
            .unwrap();
        drafts.on_draft_title_change(&id, "Refactor auth");

        let first = tokio::spawn({
            let drafts = drafts.clone();
            let id = id.clone();
            async move { drafts.on_draft_title_commit(&id).await }
        });
        while !drafts.get(&id).map_or(false, |d| d.is_saving_draft) {
            tokio::task::yield_now().await;
        }

        assert_eq!(
            drafts.on_draft_title_commit(&id).await,
            DraftCommitOutcome::InFlight
        );
        assert!(!drafts.remove(&id));

        backend.release();
        assert!(matches!(
            first.await.unwrap(),
            DraftCommitOutcome::Committed(_)
        ));
        assert_eq!(backend.create_calls(), 1);
    }

    #[tokio::test]
    async fn test_failure_keeps_draft_editable() {
        let (drafts, root, backend) = setup(GatedBackend::new(MemoryBackend::new()));
        backend.fail_next_create(AppError::Internal("connection reset".to_string()));
        let id = drafts
            .spawn(&root, NodeType::TechTask, Position::default())
            .unwrap();
        drafts.on_draft_title_change(&id, "Refactor auth");

        assert_eq!(
            drafts.on_draft_title_commit(&id).await,
            DraftCommitOutcome::Failed(GENERIC_CREATE_FAILURE.to_string())
        );
        let draft = drafts.get(&id).unwrap();
        assert!(!draft.is_saving_draft);
        assert_eq!(draft.title, "Refactor auth");
        assert_eq!(draft.draft_error.as_deref(), Some(GENERIC_CREATE_FAILURE));

        drafts.on_draft_title_change(&id, "Refactor auth module");
        assert!(matches!(
            drafts.on_draft_title_commit(&id).await,
            DraftCommitOutcome::Committed(_)
        ));
    }

    #[tokio::test]
    async fn test_remove_is_local() {
        let (drafts, root, backend) = setup(GatedBackend::new(MemoryBackend::new()));
        let id = drafts
            .spawn(&root, NodeType::TechTask, Position::default())
            .unwrap();
        assert!(drafts.remove(&id));
        assert!(!drafts.remove(&id));
        assert_eq!(
            drafts.on_draft_title_commit(&id).await,
            DraftCommitOutcome::Unknown
        );
        assert_eq!(backend.create_calls(), 0);
    }
}
